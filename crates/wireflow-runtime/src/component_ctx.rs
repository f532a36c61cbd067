//! Execution context handed to component behaviors.
//!
//! A [`ComponentCtx`] is a self-contained view of one run: the component
//! definition, the committed input snapshot, the flow's variable scope, the
//! component's running-state slot, and a channel for runtime effects. The
//! scheduler builds one per run and the behavior keeps it for the duration
//! of `execute`; nothing in it borrows scheduler internals, so executions
//! proceed while the scheduler keeps pumping.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::context::DataContext;
use crate::errors::ExecuteError;
use crate::runtime::{InputData, RunningStateSlot};
use crate::settings::RuntimeSettings;
use crate::types::ComponentDef;

// ---------------------------------------------------------------------------
// Runtime effects
// ---------------------------------------------------------------------------

/// An action a behavior asks the scheduler to perform on its behalf.
///
/// Behaviors never touch flow state directly; they emit effects and the
/// scheduler applies them on its own thread, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum CtxEffect {
    /// Broadcast `value` over every wire leaving `output`.
    Propagate {
        flow: String,
        component: String,
        output: String,
        value: Value,
    },
    /// Fire the single wire leaving `output` with a null payload, logging
    /// a missing-connection error if no wire is attached.
    ExecuteWire {
        flow: String,
        component: String,
        output: String,
    },
    /// Propagate `value` from the component hosting flow `flow` into the
    /// host's parent flow (how nested outputs surface).
    PropagateFromHost {
        flow: String,
        output: String,
        value: Value,
    },
    /// Start the named action flow on behalf of `component`.
    ExecuteAction {
        flow: String,
        component: String,
        action: String,
    },
    /// Wind down the running flow (what an end component requests once it
    /// has surfaced its outputs).
    FinishFlow { flow: String },
}

/// Outcome of one spawned `execute`.
#[derive(Debug)]
pub(crate) struct Completion {
    pub flow: String,
    pub component: String,
    pub result: Result<(), ExecuteError>,
}

/// Everything flowing back into the scheduler over one channel, so effects
/// emitted during an execute are applied before its completion.
#[derive(Debug)]
pub(crate) enum RuntimeMsg {
    Effect(CtxEffect),
    Completed(Completion),
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a behavior can see and do during one run.
///
/// Cloneable so behaviors that outlive their execute (watchers, timers) can
/// move a copy into a spawned task; pair such tasks with a
/// [`set_dispose`](Self::set_dispose) hook that stops them.
#[derive(Clone)]
pub struct ComponentCtx {
    flow: String,
    component: Arc<ComponentDef>,
    committed: HashMap<String, InputData>,
    data_context: Arc<DataContext>,
    running_state: RunningStateSlot,
    settings: Arc<RwLock<RuntimeSettings>>,
    effects: mpsc::UnboundedSender<RuntimeMsg>,
}

impl ComponentCtx {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        flow: String,
        component: Arc<ComponentDef>,
        committed: HashMap<String, InputData>,
        data_context: Arc<DataContext>,
        running_state: RunningStateSlot,
        settings: Arc<RwLock<RuntimeSettings>>,
        effects: mpsc::UnboundedSender<RuntimeMsg>,
    ) -> Self {
        Self {
            flow,
            component,
            committed,
            data_context,
            running_state,
            settings,
            effects,
        }
    }

    /// Id of the running flow this execution belongs to.
    pub fn flow_id(&self) -> &str {
        &self.flow
    }

    pub fn component(&self) -> &ComponentDef {
        &self.component
    }

    // -- committed inputs ---------------------------------------------------

    /// The committed value of an input, if one was buffered when the run
    /// began. Deliveries after the snapshot are not visible here.
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.committed.get(name).map(|data| &data.value)
    }

    pub fn input_data(&self, name: &str) -> Option<&InputData> {
        self.committed.get(name)
    }

    /// A property value: the committed input when the property is
    /// input-driven, the static configuration value otherwise.
    pub fn property(&self, name: &str) -> Option<Value> {
        if self.component.is_input_property(name) {
            self.input(name).cloned()
        } else {
            self.component.config.get(name).cloned()
        }
    }

    pub fn property_str(&self, name: &str) -> Option<String> {
        match self.property(name)? {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    // -- variables ----------------------------------------------------------

    /// Read a variable, walking from the flow's local scope out to globals.
    pub fn get_variable(&self, name: &str) -> Option<Value> {
        self.data_context.get(name)
    }

    /// Write a variable in its declaring scope, or create a global.
    pub fn set_variable(&self, name: &str, value: Value) {
        self.data_context.set(name, value);
    }

    /// Subscribe to variable writes anywhere in this flow's scope chain.
    /// The receiver yields variable names; read back through
    /// [`get_variable`](Self::get_variable) for current values.
    pub fn watch_variables(&self) -> mpsc::UnboundedReceiver<String> {
        self.data_context.subscribe()
    }

    // -- propagation --------------------------------------------------------

    /// Broadcast a value over every wire attached to `output`.
    pub fn propagate_value(&self, output: &str, value: Value) {
        self.emit(CtxEffect::Propagate {
            flow: self.flow.clone(),
            component: self.component.id.clone(),
            output: output.to_string(),
            value,
        });
    }

    /// Fire the single wire attached to `output` with a null payload.
    pub fn execute_wire(&self, output: &str) {
        self.emit(CtxEffect::ExecuteWire {
            flow: self.flow.clone(),
            component: self.component.id.clone(),
            output: output.to_string(),
        });
    }

    /// Surface a value out of this (nested) flow through its host
    /// component's output in the parent flow.
    pub fn propagate_from_host(&self, output: &str, value: Value) {
        self.emit(CtxEffect::PropagateFromHost {
            flow: self.flow.clone(),
            output: output.to_string(),
            value,
        });
    }

    /// Start the named action flow, scoped under this component.
    pub fn execute_action(&self, action: &str) {
        self.emit(CtxEffect::ExecuteAction {
            flow: self.flow.clone(),
            component: self.component.id.clone(),
            action: action.to_string(),
        });
    }

    /// Ask the scheduler to finish this running flow once the effects
    /// emitted so far have been applied.
    pub fn finish_flow(&self) {
        self.emit(CtxEffect::FinishFlow {
            flow: self.flow.clone(),
        });
    }

    // -- running state ------------------------------------------------------

    /// Install per-run state that survives until the flow finishes.
    pub fn set_running_state<T: std::any::Any + Send>(&self, value: T) {
        self.running_state.lock().set(value);
    }

    /// Borrow the running state for the duration of `f`.
    pub fn with_running_state<T, R>(&self, f: impl FnOnce(Option<&mut T>) -> R) -> R
    where
        T: std::any::Any,
    {
        let mut slot = self.running_state.lock();
        f(slot.get_mut::<T>())
    }

    pub fn take_running_state<T: std::any::Any>(&self) -> Option<T> {
        self.running_state.lock().take()
    }

    /// Register a teardown hook run when the owning flow finishes.
    pub fn set_dispose(&self, f: impl FnOnce() + Send + 'static) {
        self.running_state.lock().set_dispose(f);
    }

    // -- settings -----------------------------------------------------------

    pub fn get_setting(&self, key: &str) -> Option<Value> {
        self.settings.read().get(key)
    }

    pub fn set_setting(&self, key: &str, value: Value) {
        self.settings.write().set(key, value);
    }

    fn emit(&self, effect: CtxEffect) {
        // The scheduler owning the receiver is gone during shutdown.
        let _ = self.effects.send(RuntimeMsg::Effect(effect));
    }
}

impl std::fmt::Debug for ComponentCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentCtx")
            .field("flow", &self.flow)
            .field("component", &self.component.id)
            .field("committed", &self.committed.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    //! Build a [`ComponentCtx`] in isolation and record the effects it
    //! emits. For behavior unit tests; the scheduler is not involved.

    use super::*;
    use crate::runtime::RunningState;
    use crate::types::VariableDef;
    use parking_lot::Mutex;

    pub struct TestCtx {
        component: ComponentDef,
        inputs: HashMap<String, InputData>,
        globals: Vec<VariableDef>,
        settings: RuntimeSettings,
    }

    impl TestCtx {
        pub fn new(component: ComponentDef) -> Self {
            Self {
                component,
                inputs: HashMap::new(),
                globals: Vec::new(),
                settings: RuntimeSettings::default(),
            }
        }

        /// Buffer `value` as a committed input.
        pub fn input(mut self, name: impl Into<String>, value: Value) -> Self {
            self.inputs.insert(name.into(), InputData::new(value));
            self
        }

        pub fn global(mut self, name: impl Into<String>, value: Value) -> Self {
            self.globals.push(VariableDef {
                name: name.into(),
                value,
            });
            self
        }

        pub fn setting(mut self, key: impl Into<String>, value: Value) -> Self {
            self.settings.set(key.into(), value);
            self
        }

        pub fn build(self) -> (ComponentCtx, EffectRecorder) {
            let (tx, rx) = mpsc::unbounded_channel();
            let ctx = ComponentCtx::new(
                "test-flow".to_string(),
                Arc::new(self.component),
                self.inputs,
                DataContext::new_root(&self.globals),
                Arc::new(Mutex::new(RunningState::default())),
                Arc::new(RwLock::new(self.settings)),
                tx,
            );
            (ctx, EffectRecorder { rx })
        }
    }

    /// Receives the effects a context emitted, in order.
    pub struct EffectRecorder {
        rx: mpsc::UnboundedReceiver<RuntimeMsg>,
    }

    impl EffectRecorder {
        pub fn try_next(&mut self) -> Option<CtxEffect> {
            while let Ok(msg) = self.rx.try_recv() {
                if let RuntimeMsg::Effect(effect) = msg {
                    return Some(effect);
                }
            }
            None
        }

        pub async fn next(&mut self) -> Option<CtxEffect> {
            while let Some(msg) = self.rx.recv().await {
                if let RuntimeMsg::Effect(effect) = msg {
                    return Some(effect);
                }
            }
            None
        }

        /// Everything emitted so far.
        pub fn drain(&mut self) -> Vec<CtxEffect> {
            let mut out = Vec::new();
            while let Some(effect) = self.try_next() {
                out.push(effect);
            }
            out
        }
    }
}
