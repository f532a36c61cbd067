//! Built-in `output` component.
//!
//! Named exit point of a nested flow. Whatever value arrives over its
//! sequence input surfaces in the parent flow through the hosting
//! component's output matching this component's wire id. Without a
//! sequence value the component does nothing.

use async_trait::async_trait;

use crate::component_ctx::ComponentCtx;
use crate::errors::ExecuteError;
use crate::traits::{BehaviorMeta, ComponentBehavior};
use crate::types::SEQ_INPUT;

pub struct OutputComponent;

#[async_trait]
impl ComponentBehavior for OutputComponent {
    fn meta(&self) -> BehaviorMeta {
        BehaviorMeta::action("output")
    }

    async fn execute(&self, ctx: &ComponentCtx) -> Result<(), ExecuteError> {
        if let Some(data) = ctx.input_data(SEQ_INPUT) {
            ctx.propagate_from_host(ctx.component().wire_id(), data.value.clone());
        }
        Ok(())
    }
}
