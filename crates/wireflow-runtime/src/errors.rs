//! Error types for the runtime's trait operations and lifecycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural problems in a project or flow graph, reported at load time.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate flow id: {flow}")]
    DuplicateFlow { flow: String },
    #[error("duplicate component id {component} in flow {flow}")]
    DuplicateComponent { flow: String, component: String },
    #[error("duplicate wire id {wire} in flow {flow}")]
    DuplicateWire { flow: String, wire: String },
    #[error("wire {wire} in flow {flow} references missing component {component}")]
    DanglingWire {
        flow: String,
        wire: String,
        component: String,
    },
    #[error("component {component} in flow {flow} has unregistered type {component_type}")]
    UnknownComponentType {
        flow: String,
        component: String,
        component_type: String,
    },
}

/// Errors from [`RuntimeScheduler`](crate::scheduler::RuntimeScheduler)
/// lifecycle and queries.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("build error: {message}")]
    Build { message: String },
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("scheduler is not running")]
    NotRunning,
    #[error("scheduler was disposed")]
    Disposed,
    #[error("no running flow with id {id}")]
    FlowNotFound { id: String },
    #[error("no component {component} in flow {flow}")]
    ComponentNotFound { flow: String, component: String },
}

/// Errors from [`SettingsStore`](crate::traits::SettingsStore)
/// implementations. Settings failures are diagnostics, never fatal: the
/// scheduler logs them and keeps defaults.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings store error: {message}")]
    Store { message: String },
}

/// Errors returned by
/// [`ComponentBehavior::execute`](crate::traits::ComponentBehavior::execute).
///
/// Serializable so history entries and diagnostics can carry the structured
/// form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
#[non_exhaustive]
pub enum ExecuteError {
    Failure { message: String },
    MissingInput { input: String },
    ActionNotFound { name: String },
    Panic { message: String },
}

impl ExecuteError {
    /// Convenience constructor for the common case.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failure { message } => write!(f, "{message}"),
            Self::MissingInput { input } => write!(f, "missing input: {input}"),
            Self::ActionNotFound { name } => write!(f, "action not found: {name}"),
            Self::Panic { message } => write!(f, "panic: {message}"),
        }
    }
}

impl std::error::Error for ExecuteError {}
