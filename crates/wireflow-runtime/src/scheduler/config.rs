//! Scheduler tunables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::history::MAX_HISTORY_ITEMS;

/// What the scheduler does after a component's execute fails. The failure
/// itself is always recorded as an execution-error history entry first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the whole runtime. The default: the scheduler cannot know
    /// whether the failed step was safe to skip.
    HaltAll,
    /// Finish the failing flow's top-level tree; unrelated pages keep
    /// running.
    HaltFlow,
    /// Record the entry and keep going.
    LogOnly,
}

/// Tunables for one scheduler instance, applied at build time.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pump period. Each tick drains exactly the tasks queued before it;
    /// tasks enqueued while draining wait for the next tick.
    pub tick_interval: Duration,
    /// History capacity. Appending past it evicts the oldest entry.
    pub history_cap: usize,
    pub on_execution_error: ErrorPolicy,
    /// Defer count at which a task stuck behind a busy component is
    /// reported. The task is never dropped.
    pub starvation_warn_after: u32,
    /// How often the executed-component counter is folded into the
    /// components-per-second gauge.
    pub speed_sample_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1),
            history_cap: MAX_HISTORY_ITEMS,
            on_execution_error: ErrorPolicy::HaltAll,
            starvation_warn_after: 100,
            speed_sample_interval: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_halt_everything_on_error() {
        let config = SchedulerConfig::default();
        assert_eq!(config.on_execution_error, ErrorPolicy::HaltAll);
        assert_eq!(config.history_cap, MAX_HISTORY_ITEMS);
        assert!(config.tick_interval <= Duration::from_millis(10));
    }

    #[test]
    fn error_policy_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorPolicy::HaltFlow).unwrap();
        assert_eq!(json, "\"halt_flow\"");
        let back: ErrorPolicy = serde_json::from_str("\"log_only\"").unwrap();
        assert_eq!(back, ErrorPolicy::LogOnly);
    }
}
