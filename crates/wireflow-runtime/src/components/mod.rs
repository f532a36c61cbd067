//! Built-in component behaviors.

pub mod call_action;
pub mod constant;
pub mod delay;
pub mod end;
pub mod input;
pub mod layout_view;
pub mod log;
pub mod output;
pub mod start;
pub mod variables;

pub use call_action::CallActionComponent;
pub use constant::ConstantComponent;
pub use delay::DelayComponent;
pub use end::EndComponent;
pub use input::InputComponent;
pub use layout_view::LayoutViewComponent;
pub use log::LogComponent;
pub use output::OutputComponent;
pub use start::StartComponent;
pub use variables::{GetVariableComponent, SetVariableComponent, WatchVariableComponent};

use crate::traits::ComponentBehavior;

/// One instance of every built-in behavior, for registration.
pub(crate) fn builtins() -> Vec<Box<dyn ComponentBehavior>> {
    vec![
        Box::new(StartComponent),
        Box::new(EndComponent),
        Box::new(InputComponent),
        Box::new(OutputComponent),
        Box::new(ConstantComponent),
        Box::new(LogComponent),
        Box::new(DelayComponent),
        Box::new(GetVariableComponent),
        Box::new(SetVariableComponent),
        Box::new(WatchVariableComponent),
        Box::new(CallActionComponent),
        Box::new(LayoutViewComponent),
    ]
}
