//! Built-in `call-action` component.
//!
//! Starts the reusable action flow named in its `action` property. The new
//! running flow is scoped under this component: the action's `input`
//! components receive values wired into this one, and its `end` component
//! advances this component's `@seqout` in the calling flow.

use async_trait::async_trait;

use crate::component_ctx::ComponentCtx;
use crate::errors::ExecuteError;
use crate::traits::{BehaviorMeta, ComponentBehavior};

pub struct CallActionComponent;

#[async_trait]
impl ComponentBehavior for CallActionComponent {
    fn meta(&self) -> BehaviorMeta {
        BehaviorMeta::action("call-action")
    }

    async fn execute(&self, ctx: &ComponentCtx) -> Result<(), ExecuteError> {
        let action = ctx
            .property_str("action")
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ExecuteError::failure("call-action requires an 'action' name"))?;
        ctx.execute_action(&action);
        Ok(())
    }
}
