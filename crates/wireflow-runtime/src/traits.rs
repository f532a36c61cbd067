//! Trait seams between the runtime and the code it hosts.
//!
//! [`ComponentBehavior`] is the contract component implementations fulfill:
//! the built-in catalog under [`components`](crate::components) and any
//! embedder-registered widget/action types. [`SettingsStore`] abstracts
//! where persisted runtime settings live.

use async_trait::async_trait;

use crate::component_ctx::ComponentCtx;
use crate::errors::{ExecuteError, SettingsError};
use crate::settings::SettingsMap;

/// How the scheduler treats components of a type. Resolved once when the
/// project is loaded; the hot path never inspects behavior types again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Executes once per activation, then advances along `@seqout`.
    Action,
    /// Hosts an embedded page as a nested running flow; buffered inputs are
    /// forwarded into it instead of executing.
    LayoutHost,
    /// Buffers inputs for external readers (widgets); never executes.
    Plain,
}

/// Static description of a behavior, keyed by `type_id`.
#[derive(Debug, Clone)]
pub struct BehaviorMeta {
    /// The `type` string components use to reference this behavior.
    pub type_id: String,
    pub kind: ComponentKind,
    /// Pure input sources are never auto-run by the readiness check; their
    /// hosting flow fires their outputs directly.
    pub input_source: bool,
}

impl BehaviorMeta {
    pub fn action(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            kind: ComponentKind::Action,
            input_source: false,
        }
    }

    pub fn plain(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            kind: ComponentKind::Plain,
            input_source: false,
        }
    }

    pub fn layout_host(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            kind: ComponentKind::LayoutHost,
            input_source: false,
        }
    }

    pub fn input_source(mut self) -> Self {
        self.input_source = true;
        self
    }
}

/// One component type's implementation.
///
/// `execute` runs on a spawned task and may await freely; the scheduler
/// keeps pumping other components meanwhile and defers anything addressed
/// to a component whose execute is still in flight. Effects requested
/// through the [`ComponentCtx`] (propagation, wire firing, action
/// invocation) are applied by the scheduler in order of arrival.
#[async_trait]
pub trait ComponentBehavior: Send + Sync {
    fn meta(&self) -> BehaviorMeta;

    /// Called once when the owning flow starts.
    fn on_start(&self, _ctx: &ComponentCtx) {}

    /// Called once when the owning flow finishes, before the running-state
    /// slot is disposed.
    fn on_finish(&self, _ctx: &ComponentCtx) {}

    /// One activation. Only invoked for [`ComponentKind::Action`] types.
    async fn execute(&self, _ctx: &ComponentCtx) -> Result<(), ExecuteError> {
        Ok(())
    }
}

/// Behavior implementations keyed by component type id.
pub type BehaviorMap = std::collections::BTreeMap<String, std::sync::Arc<dyn ComponentBehavior>>;

/// Storage seam for persisted runtime settings (see
/// [`settings`](crate::settings)).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load the persisted map. `Ok(None)` when nothing was persisted yet.
    async fn load(&self) -> Result<Option<SettingsMap>, SettingsError>;
    async fn save(&self, settings: &SettingsMap) -> Result<(), SettingsError>;
}
