//! Built-in `input` component.
//!
//! Named entry point of a flow used as a widget layout or invoked action.
//! It never runs on its own: when the hosting component forwards a buffered
//! value whose wire id matches this component's, the scheduler propagates
//! that value from this component's `@seqout`.

use crate::traits::{BehaviorMeta, ComponentBehavior};

pub struct InputComponent;

impl ComponentBehavior for InputComponent {
    fn meta(&self) -> BehaviorMeta {
        BehaviorMeta::plain("input").input_source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ComponentKind;

    #[test]
    fn never_auto_runs() {
        let meta = InputComponent.meta();
        assert_eq!(meta.kind, ComponentKind::Plain);
        assert!(meta.input_source);
    }
}
