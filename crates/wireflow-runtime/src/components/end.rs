//! Built-in `end` component.
//!
//! Terminates an action flow: surfaces `@seqout` at the component hosting
//! this flow (so the caller's chain advances), then asks the scheduler to
//! finish the flow. In a top-level page the host propagation has nowhere to
//! go and is dropped; the finish still applies.

use async_trait::async_trait;
use serde_json::Value;

use crate::component_ctx::ComponentCtx;
use crate::errors::ExecuteError;
use crate::traits::{BehaviorMeta, ComponentBehavior};
use crate::types::SEQ_OUTPUT;

pub struct EndComponent;

#[async_trait]
impl ComponentBehavior for EndComponent {
    fn meta(&self) -> BehaviorMeta {
        BehaviorMeta::action("end")
    }

    async fn execute(&self, ctx: &ComponentCtx) -> Result<(), ExecuteError> {
        ctx.propagate_from_host(SEQ_OUTPUT, Value::Null);
        ctx.finish_flow();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_ctx::test_support::TestCtx;
    use crate::component_ctx::CtxEffect;
    use crate::types::ComponentDef;

    #[tokio::test]
    async fn surfaces_seqout_then_requests_finish() {
        let (ctx, mut fx) = TestCtx::new(ComponentDef::new("e", "end")).build();
        EndComponent.execute(&ctx).await.unwrap();

        assert_eq!(
            fx.try_next(),
            Some(CtxEffect::PropagateFromHost {
                flow: "test-flow".into(),
                output: SEQ_OUTPUT.into(),
                value: Value::Null,
            })
        );
        assert_eq!(
            fx.try_next(),
            Some(CtxEffect::FinishFlow {
                flow: "test-flow".into(),
            })
        );
    }
}
