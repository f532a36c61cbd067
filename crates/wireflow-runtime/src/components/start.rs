//! Built-in `start` component.
//!
//! Entry point of a flow. It runs on the initial `@start` delivery (it has
//! no gating inputs) and its only job is the sequence advancement the
//! scheduler performs after a successful execute, which fires the wire
//! leaving `@seqout` and sets the chain in motion.

use crate::traits::{BehaviorMeta, ComponentBehavior};
use crate::types::START_COMPONENT_TYPE;

pub struct StartComponent;

impl ComponentBehavior for StartComponent {
    fn meta(&self) -> BehaviorMeta {
        BehaviorMeta::action(START_COMPONENT_TYPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ComponentKind;

    #[test]
    fn is_an_action_without_prerequisites() {
        let meta = StartComponent.meta();
        assert_eq!(meta.type_id, "start");
        assert_eq!(meta.kind, ComponentKind::Action);
        assert!(!meta.input_source);
    }
}
