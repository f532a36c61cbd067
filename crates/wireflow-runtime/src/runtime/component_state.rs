//! Per-(running flow, component) execution state.
//!
//! A [`ComponentState`] buffers delivered input values, freezes a committed
//! snapshot of them when a run begins (so an in-flight execution reads
//! stable values while new deliveries keep arriving), and tracks whether an
//! execute is in flight. States are created lazily on first delivery and
//! live exactly as long as their owning running flow.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use crate::types::{ComponentDef, SEQ_INPUT};

/// One delivered value with its arrival time. A later delivery to the same
/// input overwrites this; inputs hold the latest value, not a queue.
#[derive(Debug, Clone)]
pub struct InputData {
    pub time: DateTime<Utc>,
    pub value: Value,
}

impl InputData {
    pub fn new(value: Value) -> Self {
        Self {
            time: Utc::now(),
            value,
        }
    }

    /// The null payload sequence wires carry.
    pub fn null() -> Self {
        Self::new(Value::Null)
    }
}

/// Opaque per-component-type state with an optional teardown hook.
///
/// Behaviors install state from `execute`; the hook runs once when the
/// owning flow finishes (watchers stop, timers cancel).
#[derive(Default)]
pub struct RunningState {
    value: Option<Box<dyn Any + Send>>,
    dispose: Option<Box<dyn FnOnce() + Send>>,
}

impl RunningState {
    pub fn set<T: Any + Send>(&mut self, value: T) {
        self.value = Some(Box::new(value));
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.value.as_mut().and_then(|v| v.downcast_mut())
    }

    pub fn take<T: Any>(&mut self) -> Option<T> {
        let boxed = self.value.take()?;
        match boxed.downcast::<T>() {
            Ok(v) => Some(*v),
            Err(other) => {
                self.value = Some(other);
                None
            }
        }
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Replace the teardown hook. The previous hook, if any, is dropped
    /// without running; behaviors that re-install state are expected to
    /// fold the old teardown into the new one.
    pub fn set_dispose(&mut self, f: impl FnOnce() + Send + 'static) {
        self.dispose = Some(Box::new(f));
    }

    /// Drop the state and run the teardown hook, once.
    pub fn dispose(&mut self) {
        self.value = None;
        if let Some(f) = self.dispose.take() {
            f();
        }
    }
}

impl std::fmt::Debug for RunningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningState")
            .field("value", &self.value.is_some())
            .field("dispose", &self.dispose.is_some())
            .finish()
    }
}

/// Shared handle to a component's running state. The scheduler owns the
/// [`ComponentState`]; in-flight executions hold this slot.
pub type RunningStateSlot = Arc<Mutex<RunningState>>;

/// Execution state of one component within one running flow.
#[derive(Debug)]
pub struct ComponentState {
    inputs_data: HashMap<String, InputData>,
    committed: HashMap<String, InputData>,
    running_state: RunningStateSlot,
    is_running: bool,
}

impl Default for ComponentState {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentState {
    pub fn new() -> Self {
        Self {
            inputs_data: HashMap::new(),
            committed: HashMap::new(),
            running_state: Arc::new(Mutex::new(RunningState::default())),
            is_running: false,
        }
    }

    /// Store a delivered value. Overwrite, no merge: last write wins per
    /// input name.
    pub fn set_input_data(&mut self, input: &str, data: InputData) {
        self.inputs_data.insert(input.to_string(), data);
    }

    pub fn input(&self, name: &str) -> Option<&InputData> {
        self.inputs_data.get(name)
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs_data.contains_key(name)
    }

    /// Every input currently buffered. Layout hosts forward these; data
    /// inputs stay buffered afterwards (sticky values), only the sequence
    /// input is consumed.
    pub fn buffered(&self) -> &HashMap<String, InputData> {
        &self.inputs_data
    }

    /// The snapshot frozen at the start of the current (or latest) run,
    /// backing input-as-property reads.
    pub fn committed_input(&self, name: &str) -> Option<&InputData> {
        self.committed.get(name)
    }

    pub fn committed(&self) -> &HashMap<String, InputData> {
        &self.committed
    }

    /// Freeze the current buffered inputs for the run about to start.
    /// Returns a copy for the execution context.
    pub fn snapshot_inputs(&mut self) -> HashMap<String, InputData> {
        self.committed = self.inputs_data.clone();
        self.committed.clone()
    }

    /// Remove the buffered sequence input. Runs unconditionally after every
    /// run so the next activation must arrive fresh.
    pub fn clear_seq_input(&mut self) {
        self.inputs_data.remove(SEQ_INPUT);
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn set_running(&mut self, running: bool) {
        self.is_running = running;
    }

    /// The readiness predicate. Pure; no side effects.
    ///
    /// `seq_wired` says whether any wire in the graph feeds this
    /// component's sequence input; `input_source` marks pure input sources,
    /// which are driven by their host and never auto-run.
    pub fn is_ready_to_run(
        &self,
        component: &ComponentDef,
        seq_wired: bool,
        input_source: bool,
    ) -> bool {
        if input_source {
            return false;
        }
        if seq_wired && !self.inputs_data.contains_key(SEQ_INPUT) {
            return false;
        }
        component
            .mandatory_data_inputs()
            .all(|port| self.inputs_data.contains_key(&port.name))
    }

    pub fn running_state(&self) -> RunningStateSlot {
        Arc::clone(&self.running_state)
    }

    /// Flow teardown: dispose the running state.
    pub fn finish(&mut self) {
        self.running_state.lock().dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PortDef, SEQ_OUTPUT};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn action_def() -> ComponentDef {
        let mut def = ComponentDef::new("c", "log");
        def.inputs = vec![PortDef::new(SEQ_INPUT), PortDef::new("value")];
        def.outputs = vec![PortDef::new(SEQ_OUTPUT)];
        def
    }

    #[test]
    fn last_write_wins_per_input() {
        let mut state = ComponentState::new();
        state.set_input_data("value", InputData::new(json!(1)));
        state.set_input_data("value", InputData::new(json!(2)));
        assert_eq!(state.input("value").unwrap().value, json!(2));
    }

    #[test]
    fn snapshot_freezes_values_for_the_run() {
        let mut state = ComponentState::new();
        state.set_input_data("value", InputData::new(json!("before")));
        let committed = state.snapshot_inputs();
        assert_eq!(committed["value"].value, json!("before"));

        state.set_input_data("value", InputData::new(json!("after")));
        assert_eq!(state.committed_input("value").unwrap().value, json!("before"));
        assert_eq!(state.input("value").unwrap().value, json!("after"));
    }

    #[test]
    fn readiness_requires_wired_seq_input_and_all_data_inputs() {
        let def = action_def();
        let mut state = ComponentState::new();

        // Nothing buffered.
        assert!(!state.is_ready_to_run(&def, true, false));

        // Data input alone is not enough when @seqin is wired.
        state.set_input_data("value", InputData::new(json!(5)));
        assert!(!state.is_ready_to_run(&def, true, false));

        // Unwired @seqin does not gate.
        assert!(state.is_ready_to_run(&def, false, false));

        state.set_input_data(SEQ_INPUT, InputData::null());
        assert!(state.is_ready_to_run(&def, true, false));

        // Pure input sources never auto-run.
        assert!(!state.is_ready_to_run(&def, true, true));
    }

    #[test]
    fn optional_inputs_do_not_gate_readiness() {
        let mut def = ComponentDef::new("c", "log");
        def.inputs = vec![
            PortDef::new("value"),
            PortDef {
                name: "hint".into(),
                port_type: Default::default(),
                optional: true,
            },
        ];
        let mut state = ComponentState::new();
        state.set_input_data("value", InputData::new(json!(1)));
        assert!(state.is_ready_to_run(&def, false, false));
    }

    #[test]
    fn clear_seq_input_leaves_other_inputs() {
        let mut state = ComponentState::new();
        state.set_input_data(SEQ_INPUT, InputData::null());
        state.set_input_data("value", InputData::new(json!(7)));
        state.clear_seq_input();
        assert!(!state.has_input(SEQ_INPUT));
        assert!(state.has_input("value"));
    }

    #[test]
    fn running_state_dispose_runs_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let mut state = ComponentState::new();
        {
            let slot = state.running_state();
            let mut rs = slot.lock();
            rs.set(42u32);
            rs.set_dispose(|| {
                CALLS.fetch_add(1, Ordering::SeqCst);
            });
        }
        state.finish();
        state.finish();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert!(!state.running_state().lock().is_set());
    }

    #[test]
    fn running_state_downcasts() {
        let mut rs = RunningState::default();
        rs.set(String::from("cursor"));
        assert!(rs.get_mut::<u32>().is_none());
        assert_eq!(rs.get_mut::<String>().unwrap().as_str(), "cursor");
        let taken: String = rs.take().unwrap();
        assert_eq!(taken, "cursor");
        assert!(!rs.is_set());
    }
}
