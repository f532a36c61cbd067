//! Built-in `constant` component.
//!
//! Emits its configured `value` over the `value` output each time it runs.
//! With `value` listed in `input_properties` the emitted value can instead
//! be driven by a wire.

use async_trait::async_trait;
use serde_json::Value;

use crate::component_ctx::ComponentCtx;
use crate::errors::ExecuteError;
use crate::traits::{BehaviorMeta, ComponentBehavior};

pub struct ConstantComponent;

#[async_trait]
impl ComponentBehavior for ConstantComponent {
    fn meta(&self) -> BehaviorMeta {
        BehaviorMeta::action("constant")
    }

    async fn execute(&self, ctx: &ComponentCtx) -> Result<(), ExecuteError> {
        let value = ctx.property("value").unwrap_or(Value::Null);
        ctx.propagate_value("value", value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_ctx::test_support::TestCtx;
    use crate::component_ctx::CtxEffect;
    use crate::types::ComponentDef;
    use serde_json::json;

    #[tokio::test]
    async fn emits_the_configured_value() {
        let mut def = ComponentDef::new("k", "constant");
        def.config = json!({ "value": { "rpm": 1200 } });
        let (ctx, mut fx) = TestCtx::new(def).build();
        ConstantComponent.execute(&ctx).await.unwrap();

        assert_eq!(
            fx.try_next(),
            Some(CtxEffect::Propagate {
                flow: "test-flow".into(),
                component: "k".into(),
                output: "value".into(),
                value: json!({ "rpm": 1200 }),
            })
        );
    }
}
