//! Runtime state: resolved projects, running flows, component state, and
//! the task queue. The scheduler in [`crate::scheduler`] drives these.

pub mod component_state;
pub mod flow;
pub mod queue;
pub mod resolved;

pub use component_state::{ComponentState, InputData, RunningState, RunningStateSlot};
pub use flow::{FlowLifecycle, HostBinding, RunningFlow};
pub use queue::{QueueTask, TaskQueue};
pub use resolved::{ResolvedComponent, ResolvedFlow, ResolvedProject};
