//! Built-in `log` component.
//!
//! Writes the value arriving on its `value` input to the tracing log,
//! tagged with the component label. A static `value` in config works too.

use async_trait::async_trait;

use crate::component_ctx::ComponentCtx;
use crate::errors::ExecuteError;
use crate::traits::{BehaviorMeta, ComponentBehavior};

pub struct LogComponent;

#[async_trait]
impl ComponentBehavior for LogComponent {
    fn meta(&self) -> BehaviorMeta {
        BehaviorMeta::action("log")
    }

    async fn execute(&self, ctx: &ComponentCtx) -> Result<(), ExecuteError> {
        let value = ctx
            .input("value")
            .cloned()
            .or_else(|| ctx.property("value"))
            .ok_or(ExecuteError::MissingInput {
                input: "value".into(),
            })?;
        tracing::info!(
            flow = %ctx.flow_id(),
            component = %ctx.component().label(),
            %value,
            "log"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_ctx::test_support::TestCtx;
    use crate::types::ComponentDef;
    use serde_json::json;

    #[tokio::test]
    async fn logs_the_committed_input() {
        let (ctx, _fx) = TestCtx::new(ComponentDef::new("l", "log"))
            .input("value", json!("hello"))
            .build();
        assert!(LogComponent.execute(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn errors_when_nothing_to_log() {
        let (ctx, _fx) = TestCtx::new(ComponentDef::new("l", "log")).build();
        let err = LogComponent.execute(&ctx).await.unwrap_err();
        assert!(matches!(err, ExecuteError::MissingInput { input } if input == "value"));
    }
}
