//! Built-in `delay` component.
//!
//! Sleeps for `milliseconds` (config or wired input) before the scheduler
//! advances the sequence. Deliveries addressed to it while sleeping are
//! deferred, which is what serializes back-to-back activations.

use std::time::Duration;

use async_trait::async_trait;

use crate::component_ctx::ComponentCtx;
use crate::errors::ExecuteError;
use crate::traits::{BehaviorMeta, ComponentBehavior};

pub struct DelayComponent;

#[async_trait]
impl ComponentBehavior for DelayComponent {
    fn meta(&self) -> BehaviorMeta {
        BehaviorMeta::action("delay")
    }

    async fn execute(&self, ctx: &ComponentCtx) -> Result<(), ExecuteError> {
        let millis = ctx
            .property("milliseconds")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| ExecuteError::failure("delay requires a numeric 'milliseconds'"))?;
        if millis < 0.0 {
            return Err(ExecuteError::failure("delay must not be negative"));
        }
        tokio::time::sleep(Duration::from_millis(millis as u64)).await;
        Ok(())
    }
}
