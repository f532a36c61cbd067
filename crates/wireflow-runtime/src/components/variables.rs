//! Built-in variable components: `get-variable`, `set-variable`, and
//! `watch-variable`.
//!
//! All three name their target through the `variable` config property and
//! resolve it against the flow's scope chain (locals first, then globals).

use async_trait::async_trait;
use serde_json::Value;

use crate::component_ctx::ComponentCtx;
use crate::errors::ExecuteError;
use crate::traits::{BehaviorMeta, ComponentBehavior};

fn variable_name(ctx: &ComponentCtx) -> Result<String, ExecuteError> {
    ctx.property_str("variable")
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ExecuteError::failure("component requires a 'variable' name"))
}

// ---------------------------------------------------------------------------
// get-variable
// ---------------------------------------------------------------------------

/// Reads a variable and emits it over the `value` output.
pub struct GetVariableComponent;

#[async_trait]
impl ComponentBehavior for GetVariableComponent {
    fn meta(&self) -> BehaviorMeta {
        BehaviorMeta::action("get-variable")
    }

    async fn execute(&self, ctx: &ComponentCtx) -> Result<(), ExecuteError> {
        let name = variable_name(ctx)?;
        let value = ctx
            .get_variable(&name)
            .ok_or_else(|| ExecuteError::failure(format!("variable '{name}' is not defined")))?;
        ctx.propagate_value("value", value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// set-variable
// ---------------------------------------------------------------------------

/// Writes the `value` input into a variable.
pub struct SetVariableComponent;

#[async_trait]
impl ComponentBehavior for SetVariableComponent {
    fn meta(&self) -> BehaviorMeta {
        BehaviorMeta::action("set-variable")
    }

    async fn execute(&self, ctx: &ComponentCtx) -> Result<(), ExecuteError> {
        let name = variable_name(ctx)?;
        let value = ctx
            .input("value")
            .cloned()
            .or_else(|| ctx.property("value"))
            .ok_or(ExecuteError::MissingInput {
                input: "value".into(),
            })?;
        ctx.set_variable(&name, value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// watch-variable
// ---------------------------------------------------------------------------

/// Emits the variable's current value, then again on every write to it,
/// until the owning flow finishes.
pub struct WatchVariableComponent;

#[async_trait]
impl ComponentBehavior for WatchVariableComponent {
    fn meta(&self) -> BehaviorMeta {
        BehaviorMeta::action("watch-variable")
    }

    async fn execute(&self, ctx: &ComponentCtx) -> Result<(), ExecuteError> {
        let name = variable_name(ctx)?;
        let current = ctx.get_variable(&name).unwrap_or(Value::Null);
        ctx.propagate_value("value", current);

        let mut changes = ctx.watch_variables();
        let watcher = ctx.clone();
        let watched = name.clone();
        let handle = tokio::spawn(async move {
            while let Some(changed) = changes.recv().await {
                if changed == watched {
                    let value = watcher.get_variable(&watched).unwrap_or(Value::Null);
                    watcher.propagate_value("value", value);
                }
            }
        });
        ctx.set_dispose(move || handle.abort());
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
    use std::time::Duration;

    fn def(component_type: &str, variable: &str) -> ComponentDef {
        let mut def = ComponentDef::new("v1", component_type);
        def.config = json!({ "variable": variable });
        def
    }

    #[tokio::test]
    async fn get_emits_the_current_value() {
        let (ctx, mut fx) = TestCtx::new(def("get-variable", "temp"))
            .global("temp", json!(21.5))
            .build();
        GetVariableComponent.execute(&ctx).await.unwrap();
        assert!(matches!(
            fx.try_next(),
            Some(CtxEffect::Propagate { value, .. }) if value == json!(21.5)
        ));
    }

    #[tokio::test]
    async fn get_fails_on_undefined_variable() {
        let (ctx, _fx) = TestCtx::new(def("get-variable", "ghost")).build();
        assert!(GetVariableComponent.execute(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn set_writes_the_wired_value() {
        let (ctx, _fx) = TestCtx::new(def("set-variable", "temp"))
            .global("temp", json!(0))
            .input("value", json!(42))
            .build();
        SetVariableComponent.execute(&ctx).await.unwrap();
        assert_eq!(ctx.get_variable("temp"), Some(json!(42)));
    }

    #[tokio::test]
    async fn set_without_a_value_is_an_error() {
        let (ctx, _fx) = TestCtx::new(def("set-variable", "temp")).build();
        let err = SetVariableComponent.execute(&ctx).await.unwrap_err();
        assert!(matches!(err, ExecuteError::MissingInput { .. }));
    }

    #[tokio::test]
    async fn missing_variable_name_is_an_error() {
        let (ctx, _fx) = TestCtx::new(ComponentDef::new("v1", "get-variable")).build();
        assert!(GetVariableComponent.execute(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn watch_emits_initial_value_and_subsequent_writes() {
        let (ctx, mut fx) = TestCtx::new(def("watch-variable", "temp"))
            .global("temp", json!(20))
            .build();
        WatchVariableComponent.execute(&ctx).await.unwrap();

        assert!(matches!(
            fx.try_next(),
            Some(CtxEffect::Propagate { value, .. }) if value == json!(20)
        ));

        ctx.set_variable("temp", json!(25));
        let effect = tokio::time::timeout(Duration::from_secs(1), fx.next())
            .await
            .expect("watcher should emit on change");
        assert!(matches!(
            effect,
            Some(CtxEffect::Propagate { value, .. }) if value == json!(25)
        ));
    }

    #[tokio::test]
    async fn watch_ignores_other_variables() {
        let (ctx, mut fx) = TestCtx::new(def("watch-variable", "temp"))
            .global("temp", json!(1))
            .global("other", json!(1))
            .build();
        WatchVariableComponent.execute(&ctx).await.unwrap();
        let _initial = fx.try_next();

        ctx.set_variable("other", json!(2));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fx.try_next().is_none());
    }
}
