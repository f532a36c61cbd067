//! Wireflow is an embeddable execution runtime for visual dataflow graphs.
//!
//! A project is a set of flow graphs: pages instantiated at start and
//! reusable actions invoked by name. Components in a graph are bound to
//! [`ComponentBehavior`] implementations through a registry; the scheduler
//! pumps queued deliveries into per-component input state and executes
//! components as they become ready, never re-entering one that is already
//! running. Pages can embed other pages as nested running flows, actions run
//! as sibling flows bound back to their invoker, and everything observable
//! lands in a capped history log.
//!
//! The crate has no UI or transport concerns. Embed it, register behaviors
//! for your component types, and drive it through [`RuntimeScheduler`].

pub mod component_ctx;
pub mod components;
pub mod context;
pub mod errors;
pub mod history;
pub mod runtime;
pub mod scheduler;
pub mod settings;
pub mod traits;
pub mod types;

// Re-export the working surface at the crate level.

// component_ctx
#[cfg(any(test, feature = "test-support"))]
pub use component_ctx::test_support::{EffectRecorder, TestCtx};
pub use component_ctx::{ComponentCtx, CtxEffect};

// context
pub use context::DataContext;

// errors
pub use errors::{ExecuteError, GraphError, SchedulerError, SettingsError};

// history
pub use history::{HistoryEntry, HistoryLog, MAX_HISTORY_ITEMS};

// runtime
pub use runtime::{FlowLifecycle, InputData, ResolvedFlow, ResolvedProject};

// scheduler
pub use scheduler::{
    ErrorPolicy, FlowSnapshot, RuntimeScheduler, SchedulerBuilder, SchedulerConfig,
    SchedulerState, Selection,
};

// settings
pub use settings::{FileSettingsStore, MemorySettingsStore, RuntimeSettings, SettingsMap};

// traits
pub use traits::{BehaviorMap, BehaviorMeta, ComponentBehavior, ComponentKind, SettingsStore};

// types
pub use types::{
    ComponentDef, FlowGraph, PortDef, PortType, Position, Project, VariableDef, Wire,
    PROJECT_SCHEMA_VERSION, SEQ_INPUT, SEQ_OUTPUT, START_INPUT,
};
