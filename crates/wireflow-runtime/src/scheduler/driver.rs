//! The scheduler driver task.
//!
//! One spawned task owns every running flow, the task queue, and the
//! execution bookkeeping; nothing here is behind a lock. The outside world
//! reaches it over two channels: commands from the [`RuntimeScheduler`]
//! handle, and a single inbox carrying both behavior effects and execute
//! completions. Because effects and completions share the inbox, everything
//! a behavior emitted during its run is applied before the run's completion
//! is processed.
//!
//! [`RuntimeScheduler`]: super::RuntimeScheduler

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

use crate::component_ctx::{ComponentCtx, Completion, CtxEffect, RuntimeMsg};
use crate::context::DataContext;
use crate::errors::{ExecuteError, SchedulerError};
use crate::history::{next_entry_id, HistoryEntry, HistoryLog};
use crate::runtime::{
    FlowLifecycle, HostBinding, InputData, QueueTask, ResolvedFlow, ResolvedProject, RunningFlow,
    TaskQueue,
};
use crate::settings::RuntimeSettings;
use crate::traits::{ComponentKind, SettingsStore};
use crate::types::{ACTION_OUTPUT, SEQ_INPUT, SEQ_OUTPUT, START_COMPONENT_TYPE, START_INPUT};

use super::config::{ErrorPolicy, SchedulerConfig};
use super::{FlowSnapshot, SchedulerState};

/// Wires that recently carried a delivery, keyed by (running flow id,
/// wire id). Pruned on the speed-sampling cadence.
pub(crate) type ActiveWires = HashMap<(String, String), Instant>;

/// How long a wire stays in the active map after its last delivery.
const WIRE_ACTIVITY_RETENTION: Duration = Duration::from_secs(10);

/// Requests from the scheduler handle.
pub(crate) enum Command {
    Stop {
        ack: oneshot::Sender<()>,
    },
    ExecuteWidgetAction {
        page: String,
        widget: String,
        ack: oneshot::Sender<Result<(), SchedulerError>>,
    },
    GetPropertyValue {
        flow: String,
        component: String,
        property: String,
        reply: oneshot::Sender<Result<Option<Value>, SchedulerError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<FlowSnapshot>>,
    },
}

/// State the driver shares with its handle.
pub(crate) struct Shared {
    pub(crate) resolved: Arc<ResolvedProject>,
    pub(crate) config: SchedulerConfig,
    pub(crate) history: Arc<RwLock<HistoryLog>>,
    pub(crate) settings: Arc<RwLock<RuntimeSettings>>,
    pub(crate) settings_store: Arc<dyn SettingsStore>,
    pub(crate) speed: Arc<AtomicU32>,
    pub(crate) active_wires: Arc<RwLock<ActiveWires>>,
    pub(crate) state: Arc<watch::Sender<SchedulerState>>,
}

/// Why a flow was instantiated; decides where it is registered.
enum FlowOrigin {
    /// Top-level page, instantiated at scheduler start.
    Page,
    /// Embedded layout; a child of the hosting flow, finished with it.
    Layout(HostBinding),
    /// Invoked action; top-level with a host binding back to the invoker,
    /// so it outlives the invoking run but still surfaces outputs there.
    Action(HostBinding),
}

pub(crate) struct Driver {
    resolved: Arc<ResolvedProject>,
    config: SchedulerConfig,

    flows: HashMap<String, RunningFlow>,
    /// Flows finished directly at stop: pages plus invoked actions.
    top_level: Vec<String>,
    queue: TaskQueue,
    globals: Arc<DataContext>,

    history: Arc<RwLock<HistoryLog>>,
    settings: Arc<RwLock<RuntimeSettings>>,
    settings_store: Arc<dyn SettingsStore>,
    speed: Arc<AtomicU32>,
    active_wires: Arc<RwLock<ActiveWires>>,
    state: Arc<watch::Sender<SchedulerState>>,

    inbox_tx: mpsc::UnboundedSender<RuntimeMsg>,
    inbox_rx: mpsc::UnboundedReceiver<RuntimeMsg>,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_closed: bool,

    /// Executes completed since the last speed sample.
    executed_count: u32,
    /// Spawned executes that have not completed yet.
    in_flight: usize,
    stopping: bool,
    stop_acks: Vec<oneshot::Sender<()>>,
}

impl Driver {
    pub(crate) fn new(shared: Shared, commands: mpsc::UnboundedReceiver<Command>) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let globals = DataContext::new_root(shared.resolved.globals());
        Self {
            queue: TaskQueue::new(shared.config.starvation_warn_after),
            resolved: shared.resolved,
            config: shared.config,
            flows: HashMap::new(),
            top_level: Vec::new(),
            globals,
            history: shared.history,
            settings: shared.settings,
            settings_store: shared.settings_store,
            speed: shared.speed,
            active_wires: shared.active_wires,
            state: shared.state,
            inbox_tx,
            inbox_rx,
            commands,
            commands_closed: false,
            executed_count: 0,
            in_flight: 0,
            stopping: false,
            stop_acks: Vec::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        self.load_settings().await;
        self.speed.store(0, Ordering::Relaxed);

        let pages: Vec<Arc<ResolvedFlow>> = self.resolved.runnable_pages().cloned().collect();
        for page in pages {
            self.start_flow(page, FlowOrigin::Page);
        }
        let _ = self.state.send(SchedulerState::Running);
        tracing::info!(
            project = %self.resolved.name(),
            pages = self.top_level.len(),
            "scheduler running"
        );

        let mut pump = tokio::time::interval(self.config.tick_interval);
        pump.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut speed_tick = tokio::time::interval(self.config.speed_sample_interval);
        speed_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                Some(msg) = self.inbox_rx.recv() => match msg {
                    RuntimeMsg::Effect(effect) => self.apply_effect(effect),
                    RuntimeMsg::Completed(completion) => self.on_completed(completion),
                },
                command = self.commands.recv(), if !self.commands_closed => match command {
                    Some(command) => self.handle_command(command),
                    // Handle dropped: wind down.
                    None => {
                        self.commands_closed = true;
                        self.begin_stop();
                    }
                },
                _ = pump.tick(), if !self.stopping => self.pump(),
                _ = speed_tick.tick() => self.sample_speed(),
            }
            if self.stopping && self.in_flight == 0 {
                self.finalize().await;
                return;
            }
        }
    }

    // -- the pump -------------------------------------------------------

    /// Drain the tasks queued before this tick. Tasks addressed to a busy
    /// component are deferred back to the front; everything else is
    /// delivered, and targets that become ready run.
    fn pump(&mut self) {
        let batch = self.queue.drain_tick();
        if batch.is_empty() {
            return;
        }
        let mut deferred = Vec::new();
        for task in batch {
            let Some(flow) = self.flows.get_mut(&task.flow) else {
                // The flow finished while the task was queued.
                continue;
            };
            let resolved = flow.resolved().clone();
            let Some(rc) = resolved.component(&task.component) else {
                tracing::warn!(
                    flow = %task.flow,
                    component = %task.component,
                    "task addressed to a component missing from the graph"
                );
                continue;
            };
            let seq_wired = resolved.is_seq_wired(&task.component);
            let state = flow.state_mut(&task.component);
            if state.is_running() {
                deferred.push(task);
                continue;
            }

            let QueueTask {
                flow: flow_id,
                component,
                input,
                data,
                wire,
                ..
            } = task;
            state.set_input_data(&input, data);
            let ready = state.is_ready_to_run(&rc.def, seq_wired, rc.input_source);
            if ready {
                self.run_component(&flow_id, &component);
            }
            if let Some(wire) = wire {
                self.mark_wire_active(&flow_id, wire);
            }
        }
        self.queue.requeue_front(deferred);
    }

    /// One activation of a ready component. Actions are spawned; layout
    /// hosts forward their buffered inputs; plain components only commit.
    fn run_component(&mut self, flow_id: &str, component_id: &str) {
        let Some(flow) = self.flows.get_mut(flow_id) else {
            return;
        };
        let resolved = flow.resolved().clone();
        let Some(rc) = resolved.component(component_id) else {
            return;
        };
        let data_context = flow.data_context().clone();
        let state = flow.state_mut(component_id);
        let committed = state.snapshot_inputs();

        match rc.kind {
            ComponentKind::Plain => {
                // Buffers are committed for external readers; nothing runs.
                state.clear_seq_input();
            }
            ComponentKind::LayoutHost => {
                let buffered: Vec<(String, InputData)> = state
                    .buffered()
                    .iter()
                    .map(|(name, data)| (name.clone(), data.clone()))
                    .collect();
                state.clear_seq_input();
                self.forward_into_nested(flow_id, component_id, buffered);
            }
            ComponentKind::Action => {
                self.history.write().append(HistoryEntry::ComponentExecuted {
                    id: next_entry_id(),
                    timestamp: Utc::now(),
                    flow: Some(flow_id.to_string()),
                    component: component_id.to_string(),
                    component_label: rc.def.label().to_string(),
                });
                state.set_running(true);
                let ctx = ComponentCtx::new(
                    flow_id.to_string(),
                    rc.def.clone(),
                    committed,
                    data_context,
                    state.running_state(),
                    self.settings.clone(),
                    self.inbox_tx.clone(),
                );
                let behavior = rc.behavior.clone();
                let inbox = self.inbox_tx.clone();
                let flow_id = flow_id.to_string();
                let component_id = component_id.to_string();
                self.in_flight += 1;
                tokio::spawn(async move {
                    let result = AssertUnwindSafe(behavior.execute(&ctx)).catch_unwind().await;
                    let result = result.unwrap_or_else(|panic| {
                        Err(ExecuteError::Panic {
                            message: panic_message(panic.as_ref()),
                        })
                    });
                    let _ = inbox.send(RuntimeMsg::Completed(Completion {
                        flow: flow_id,
                        component: component_id,
                        result,
                    }));
                });
            }
        }
    }

    /// An execute came back. Release the component, and on success advance
    /// along its sequence output.
    fn on_completed(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Completion {
            flow: flow_id,
            component,
            result,
        } = completion;

        let Some(flow) = self.flows.get_mut(&flow_id) else {
            // The flow finished while this execute was in flight.
            return;
        };
        {
            let state = flow.state_mut(&component);
            state.set_running(false);
            state.clear_seq_input();
        }

        match result {
            Ok(()) => {
                self.executed_count += 1;
                let next = flow
                    .graph()
                    .wire_from(&component, SEQ_OUTPUT)
                    .map(|wire| (wire.id.clone(), wire.target.clone(), wire.input.clone()));
                if let Some((wire, target, input)) = next {
                    self.queue
                        .push(&flow_id, target, input, InputData::null(), Some(wire));
                }
            }
            Err(error) => {
                let label = flow
                    .graph()
                    .component(&component)
                    .map(|c| c.label().to_string())
                    .unwrap_or_else(|| component.clone());
                tracing::error!(flow = %flow_id, component = %component, %error, "component execution failed");
                self.history.write().append(HistoryEntry::ExecutionError {
                    id: next_entry_id(),
                    timestamp: Utc::now(),
                    flow: Some(flow_id.clone()),
                    component: component.clone(),
                    component_label: label,
                    error: error.to_string(),
                });
                self.apply_error_policy(&flow_id);
            }
        }
    }

    fn apply_error_policy(&mut self, flow_id: &str) {
        match self.config.on_execution_error {
            ErrorPolicy::LogOnly => {}
            ErrorPolicy::HaltFlow => {
                let root = self.top_level_ancestor(flow_id);
                self.finish_flow(&root);
            }
            ErrorPolicy::HaltAll => self.begin_stop(),
        }
    }

    /// The top of the host chain: the page or invoked action this flow
    /// ultimately belongs to.
    fn top_level_ancestor(&self, flow_id: &str) -> String {
        let mut current = flow_id.to_string();
        while let Some(flow) = self.flows.get(&current) {
            match flow.host() {
                Some(host) if self.flows.contains_key(&host.flow) => {
                    if self.top_level.contains(&current) {
                        break;
                    }
                    current = host.flow.clone();
                }
                _ => break,
            }
        }
        current
    }

    // -- effects ----------------------------------------------------------

    fn apply_effect(&mut self, effect: CtxEffect) {
        match effect {
            CtxEffect::Propagate {
                flow,
                component,
                output,
                value,
            } => self.propagate_value(&flow, &component, &output, value),
            CtxEffect::ExecuteWire {
                flow,
                component,
                output,
            } => self.execute_wire(&flow, &component, &output),
            CtxEffect::PropagateFromHost { flow, output, value } => {
                let Some(host) = self.flows.get(&flow).and_then(|f| f.host().cloned()) else {
                    tracing::trace!(flow = %flow, output = %output, "host propagation from a flow without a host");
                    return;
                };
                self.propagate_value(&host.flow, &host.component, &output, value);
            }
            CtxEffect::ExecuteAction {
                flow,
                component,
                action,
            } => {
                if let Some(invoked) = self.execute_action(&flow, &component, &action) {
                    // The caller's buffered data inputs travel into the
                    // invoked flow through its matching input components.
                    let buffered: Vec<(String, Value)> = self
                        .flows
                        .get(&flow)
                        .and_then(|f| f.state(&component))
                        .map(|state| {
                            state
                                .committed()
                                .iter()
                                .filter(|(name, _)| !name.starts_with('@'))
                                .map(|(name, data)| (name.clone(), data.value.clone()))
                                .collect()
                        })
                        .unwrap_or_default();
                    for (input, value) in buffered {
                        self.forward_named_input(&invoked, &input, value);
                    }
                }
            }
            CtxEffect::FinishFlow { flow } => self.finish_flow(&flow),
        }
    }

    /// Broadcast `value` over every wire leaving `output`, logging one
    /// output-value entry per wire fired.
    fn propagate_value(&mut self, flow_id: &str, source: &str, output: &str, value: Value) {
        let Some(flow) = self.flows.get(flow_id) else {
            return;
        };
        let fired: Vec<(String, String, String, String)> = flow
            .graph()
            .wires_from(source, output)
            .map(|wire| {
                let target_label = flow
                    .graph()
                    .component(&wire.target)
                    .map(|c| c.label().to_string())
                    .unwrap_or_else(|| wire.target.clone());
                (wire.id.clone(), wire.target.clone(), target_label, wire.input.clone())
            })
            .collect();

        for (wire, target, target_label, input) in fired {
            self.history.write().append(HistoryEntry::OutputValue {
                id: next_entry_id(),
                timestamp: Utc::now(),
                flow: Some(flow_id.to_string()),
                wire: wire.clone(),
                output: output.to_string(),
                target: target.clone(),
                target_label,
                input: input.clone(),
                value: value.clone(),
            });
            self.mark_wire_active(flow_id, wire.clone());
            self.queue
                .push(flow_id, target, input, InputData::new(value.clone()), Some(wire));
        }
    }

    /// Fire the single wire leaving `output` with a null payload. A missing
    /// wire is recorded, never thrown.
    fn execute_wire(&mut self, flow_id: &str, source: &str, output: &str) {
        let (hit, source_label) = {
            let Some(flow) = self.flows.get(flow_id) else {
                return;
            };
            let hit = flow
                .graph()
                .wire_from(source, output)
                .map(|wire| (wire.id.clone(), wire.target.clone(), wire.input.clone()));
            let label = flow
                .graph()
                .component(source)
                .map(|c| c.label().to_string())
                .unwrap_or_else(|| source.to_string());
            (hit, label)
        };
        match hit {
            Some((wire, target, input)) => {
                self.mark_wire_active(flow_id, wire.clone());
                self.queue
                    .push(flow_id, target, input, InputData::null(), Some(wire));
            }
            None => {
                tracing::warn!(flow = %flow_id, component = %source, output = %output, "output has no connection");
                self.history.write().append(HistoryEntry::NoConnection {
                    id: next_entry_id(),
                    timestamp: Utc::now(),
                    flow: Some(flow_id.to_string()),
                    component: source.to_string(),
                    component_label: source_label,
                    output: output.to_string(),
                });
            }
        }
    }

    // -- flow lifecycle -----------------------------------------------------

    /// Instantiate a resolved flow: run every component's start hook, queue
    /// the initial `@start` deliveries, and eagerly create nested flows for
    /// its layout hosts.
    fn start_flow(&mut self, resolved: Arc<ResolvedFlow>, origin: FlowOrigin) -> String {
        let host = match &origin {
            FlowOrigin::Page => None,
            FlowOrigin::Layout(host) | FlowOrigin::Action(host) => Some(host.clone()),
        };
        let mut flow = RunningFlow::new(resolved.clone(), &self.globals, host);
        let flow_id = flow.id().to_string();
        flow.advance(FlowLifecycle::Started);
        tracing::debug!(flow = %flow_id, graph = %flow.graph().id, name = %flow.name(), "flow started");

        match origin {
            FlowOrigin::Page | FlowOrigin::Action(_) => self.top_level.push(flow_id.clone()),
            FlowOrigin::Layout(ref binding) => {
                if let Some(parent) = self.flows.get_mut(&binding.flow) {
                    parent.add_child(flow_id.clone());
                }
            }
        }
        let data_context = flow.data_context().clone();
        self.flows.insert(flow_id.clone(), flow);

        for rc in resolved.components() {
            let Some(flow) = self.flows.get_mut(&flow_id) else {
                break;
            };
            let slot = flow.state_mut(&rc.def.id).running_state();
            let ctx = ComponentCtx::new(
                flow_id.clone(),
                rc.def.clone(),
                HashMap::new(),
                data_context.clone(),
                slot,
                self.settings.clone(),
                self.inbox_tx.clone(),
            );
            rc.behavior.on_start(&ctx);
            self.queue
                .push(&flow_id, &rc.def.id, START_INPUT, InputData::null(), None);
        }

        let hosts: Vec<String> = resolved
            .components()
            .filter(|rc| rc.kind == ComponentKind::LayoutHost)
            .map(|rc| rc.def.id.clone())
            .collect();
        for host_component in hosts {
            self.create_nested_flow(&flow_id, &host_component);
        }

        if let Some(flow) = self.flows.get_mut(&flow_id) {
            flow.advance(FlowLifecycle::Running);
        }
        flow_id
    }

    /// Instantiate the layout page a host component embeds. Refuses cyclic
    /// embeddings: a page already running somewhere up the host chain is
    /// not instantiated again beneath itself.
    fn create_nested_flow(&mut self, parent_id: &str, host_component: &str) -> Option<String> {
        let page = {
            let parent = self.flows.get(parent_id)?;
            let rc = parent.resolved().component(host_component)?;
            if rc.def.config_str("data").is_none() && rc.def.config_str("layout").is_none() {
                tracing::warn!(
                    flow = %parent_id,
                    component = %host_component,
                    "layout host has no layout configured"
                );
                return None;
            }
            // A variable named by `data` overrides the static `layout`
            // reference; an unset variable may resolve on a later delivery.
            let from_variable = rc
                .def
                .config_str("data")
                .and_then(|var| parent.data_context().get(var))
                .and_then(|name| name.as_str().and_then(|n| self.resolved.page_named(n)));
            let Some(page) = from_variable.or_else(|| {
                rc.def
                    .config_str("layout")
                    .and_then(|name| self.resolved.page_named(name))
            }) else {
                tracing::debug!(
                    flow = %parent_id,
                    component = %host_component,
                    "layout host page did not resolve"
                );
                return None;
            };
            page.clone()
        };
        if self.embeds_ancestor(parent_id, &page.graph().id) {
            tracing::warn!(
                flow = %parent_id,
                layout = %page.graph().name,
                "refusing cyclic layout embedding"
            );
            return None;
        }
        let binding = HostBinding {
            flow: parent_id.to_string(),
            component: host_component.to_string(),
        };
        Some(self.start_flow(page, FlowOrigin::Layout(binding)))
    }

    /// Whether `graph_id` is already instantiated in `flow_id` or any flow
    /// up its host chain.
    fn embeds_ancestor(&self, flow_id: &str, graph_id: &str) -> bool {
        let mut current = Some(flow_id.to_string());
        while let Some(id) = current {
            let Some(flow) = self.flows.get(&id) else {
                return false;
            };
            if flow.graph().id == graph_id {
                return true;
            }
            current = flow.host().map(|host| host.flow.clone());
        }
        false
    }

    /// Wind down a flow: nested flows first, then every component's finish
    /// hook and running-state teardown, then the flow itself.
    fn finish_flow(&mut self, flow_id: &str) {
        let (children, resolved, data_context, name) = {
            let Some(flow) = self.flows.get_mut(flow_id) else {
                return;
            };
            if !flow.advance(FlowLifecycle::Finishing) {
                return;
            }
            (
                flow.children().to_vec(),
                flow.resolved().clone(),
                flow.data_context().clone(),
                flow.name().to_string(),
            )
        };
        for child in children {
            self.finish_flow(&child);
        }

        for rc in resolved.components() {
            let Some(flow) = self.flows.get_mut(flow_id) else {
                break;
            };
            let state = flow.state_mut(&rc.def.id);
            let committed = state.committed().clone();
            let slot = state.running_state();
            let ctx = ComponentCtx::new(
                flow_id.to_string(),
                rc.def.clone(),
                committed,
                data_context.clone(),
                slot,
                self.settings.clone(),
                self.inbox_tx.clone(),
            );
            rc.behavior.on_finish(&ctx);
            if let Some(flow) = self.flows.get_mut(flow_id) {
                flow.state_mut(&rc.def.id).finish();
            }
        }

        self.history.write().append(HistoryEntry::ActionEnd {
            id: next_entry_id(),
            timestamp: Utc::now(),
            flow: Some(flow_id.to_string()),
            flow_name: name,
        });
        if let Some(mut flow) = self.flows.remove(flow_id) {
            flow.advance(FlowLifecycle::Finished);
            tracing::debug!(flow = %flow_id, graph = %flow.graph().id, "flow finished");
        }
        self.top_level.retain(|id| id != flow_id);
    }

    /// Look up the named action graph and start it as a new top-level flow
    /// bound back to the invoking component. Returns the running flow id.
    fn execute_action(&mut self, flow_id: &str, component: &str, action: &str) -> Option<String> {
        let Some(graph) = self.resolved.action_named(action).cloned() else {
            tracing::warn!(flow = %flow_id, component = %component, action = %action, "action not found in project");
            self.history.write().append(HistoryEntry::WidgetActionNotFound {
                id: next_entry_id(),
                timestamp: Utc::now(),
                flow: None,
                widget: component.to_string(),
                action: action.to_string(),
            });
            return None;
        };
        let name = graph.graph().name.clone();
        let binding = HostBinding {
            flow: flow_id.to_string(),
            component: component.to_string(),
        };
        let invoked = self.start_flow(graph, FlowOrigin::Action(binding));
        self.history.write().append(HistoryEntry::ActionStart {
            id: next_entry_id(),
            timestamp: Utc::now(),
            flow: Some(invoked.clone()),
            flow_name: name,
        });
        Some(invoked)
    }

    // -- nested flows ---------------------------------------------------

    /// Forward a layout host's buffered inputs into the flow it hosts.
    /// `@seqin` triggers the layout's entry points over their sequence
    /// outputs; other inputs address its input components by wire id. Data
    /// inputs stay buffered on the host afterwards.
    fn forward_into_nested(
        &mut self,
        flow_id: &str,
        host_component: &str,
        buffered: Vec<(String, InputData)>,
    ) {
        let nested_id = match self.nested_flow_of(flow_id, host_component) {
            Some(id) => id,
            None => match self.create_nested_flow(flow_id, host_component) {
                Some(id) => id,
                None => return,
            },
        };

        for (input, data) in buffered {
            if input == SEQ_INPUT {
                let starts: Vec<String> = match self.flows.get(&nested_id) {
                    Some(nested) => nested
                        .resolved()
                        .components()
                        .filter(|rc| rc.def.component_type == START_COMPONENT_TYPE)
                        .map(|rc| rc.def.id.clone())
                        .collect(),
                    None => return,
                };
                for start in starts {
                    self.propagate_value(&nested_id, &start, SEQ_OUTPUT, data.value.clone());
                }
            } else if input.starts_with('@') {
                continue;
            } else {
                self.forward_named_input(&nested_id, &input, data.value);
            }
        }
    }

    /// Deliver a named value into a flow through the input components whose
    /// wire id matches `input`, over each component's sequence output.
    fn forward_named_input(&mut self, nested_id: &str, input: &str, value: Value) {
        let entries: Vec<String> = match self.flows.get(nested_id) {
            Some(nested) => nested
                .resolved()
                .components()
                .filter(|rc| rc.input_source && rc.def.wire_id() == input)
                .map(|rc| rc.def.id.clone())
                .collect(),
            None => return,
        };
        if entries.is_empty() {
            tracing::trace!(
                flow = %nested_id,
                input = %input,
                "forwarded input matches no input component"
            );
            return;
        }
        for entry in entries {
            self.propagate_value(nested_id, &entry, SEQ_OUTPUT, value.clone());
        }
    }

    /// The running flow hosted by `host_component` within `flow_id`.
    fn nested_flow_of(&self, flow_id: &str, host_component: &str) -> Option<String> {
        let flow = self.flows.get(flow_id)?;
        flow.children()
            .iter()
            .find(|child| {
                self.flows
                    .get(child.as_str())
                    .and_then(|nested| nested.host())
                    .is_some_and(|host| host.component == host_component)
            })
            .cloned()
    }

    // -- commands ---------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Stop { ack } => {
                self.stop_acks.push(ack);
                self.begin_stop();
            }
            Command::ExecuteWidgetAction { page, widget, ack } => {
                let _ = ack.send(self.execute_widget_action(&page, &widget));
            }
            Command::GetPropertyValue {
                flow,
                component,
                property,
                reply,
            } => {
                let _ = reply.send(self.get_property_value(&flow, &component, &property));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Run whatever a widget's activation means: its wired `action` output
    /// if one is declared, else the action flow it names in configuration.
    /// `page` is the graph id of a running top-level page.
    fn execute_widget_action(&mut self, page: &str, widget: &str) -> Result<(), SchedulerError> {
        let flow_id = self
            .top_level
            .iter()
            .find(|id| {
                self.flows
                    .get(id.as_str())
                    .is_some_and(|flow| flow.graph().id == page)
            })
            .cloned()
            .ok_or_else(|| SchedulerError::FlowNotFound {
                id: page.to_string(),
            })?;

        let (widget_label, wired, named_action) = {
            let flow = self
                .flows
                .get(&flow_id)
                .ok_or_else(|| SchedulerError::FlowNotFound {
                    id: page.to_string(),
                })?;
            let rc = flow.resolved().component(widget).ok_or_else(|| {
                SchedulerError::ComponentNotFound {
                    flow: page.to_string(),
                    component: widget.to_string(),
                }
            })?;
            (
                rc.def.label().to_string(),
                rc.def.has_output(ACTION_OUTPUT),
                rc.def.config_str("action").map(str::to_string),
            )
        };

        if wired {
            self.execute_wire(&flow_id, widget, ACTION_OUTPUT);
        } else if let Some(action) = named_action {
            if let Some(invoked) = self.execute_action(&flow_id, widget, &action) {
                self.history.write().append(HistoryEntry::WidgetActionExecuted {
                    id: next_entry_id(),
                    timestamp: Utc::now(),
                    flow: Some(invoked),
                    widget: widget.to_string(),
                    widget_label,
                });
            }
        } else {
            tracing::warn!(flow = %flow_id, widget = %widget, "widget has no action defined");
            self.history.write().append(HistoryEntry::WidgetActionNotDefined {
                id: next_entry_id(),
                timestamp: Utc::now(),
                flow: None,
                widget: widget.to_string(),
                widget_label,
            });
        }
        Ok(())
    }

    /// A component property as the editor shows it: the committed input for
    /// input-driven properties, the static configuration value otherwise.
    fn get_property_value(
        &self,
        flow_id: &str,
        component: &str,
        property: &str,
    ) -> Result<Option<Value>, SchedulerError> {
        let flow = self
            .flows
            .get(flow_id)
            .ok_or_else(|| SchedulerError::FlowNotFound {
                id: flow_id.to_string(),
            })?;
        let rc = flow.resolved().component(component).ok_or_else(|| {
            SchedulerError::ComponentNotFound {
                flow: flow_id.to_string(),
                component: component.to_string(),
            }
        })?;
        if rc.def.is_input_property(property) {
            Ok(flow
                .state(component)
                .and_then(|state| state.committed_input(property))
                .map(|data| data.value.clone()))
        } else {
            Ok(rc.def.config.get(property).cloned())
        }
    }

    fn snapshot(&self) -> Vec<FlowSnapshot> {
        self.top_level
            .iter()
            .filter_map(|id| self.snapshot_flow(id))
            .collect()
    }

    fn snapshot_flow(&self, flow_id: &str) -> Option<FlowSnapshot> {
        let flow = self.flows.get(flow_id)?;
        Some(FlowSnapshot {
            id: flow_id.to_string(),
            graph: flow.graph().id.clone(),
            name: flow.name().to_string(),
            lifecycle: flow.lifecycle(),
            children: flow
                .children()
                .iter()
                .filter_map(|child| self.snapshot_flow(child))
                .collect(),
        })
    }

    // -- shutdown ---------------------------------------------------------

    fn begin_stop(&mut self) {
        if self.stopping {
            return;
        }
        self.stopping = true;
        let _ = self.state.send(SchedulerState::Stopping);
        tracing::debug!(in_flight = self.in_flight, queued = self.queue.len(), "scheduler stopping");
    }

    /// All executes have drained: finish every flow, persist settings, and
    /// acknowledge pending stop requests.
    async fn finalize(&mut self) {
        let top = std::mem::take(&mut self.top_level);
        for flow_id in top {
            self.finish_flow(&flow_id);
        }
        // Flows whose hosts already disappeared are finished directly.
        let leftover: Vec<String> = self.flows.keys().cloned().collect();
        for flow_id in leftover {
            self.finish_flow(&flow_id);
        }
        self.save_settings().await;
        let _ = self.state.send(SchedulerState::Stopped);
        for ack in self.stop_acks.drain(..) {
            let _ = ack.send(());
        }
        tracing::info!("scheduler stopped");
    }

    // -- observability ----------------------------------------------------

    fn mark_wire_active(&self, flow_id: &str, wire: String) {
        self.active_wires
            .write()
            .insert((flow_id.to_string(), wire), Instant::now());
    }

    fn sample_speed(&mut self) {
        self.speed.store(self.executed_count, Ordering::Relaxed);
        self.executed_count = 0;
        if let Some(horizon) = Instant::now().checked_sub(WIRE_ACTIVITY_RETENTION) {
            self.active_wires.write().retain(|_, at| *at >= horizon);
        }
    }

    // -- settings ---------------------------------------------------------

    /// Failures here are diagnostics, not fatal: the runtime keeps its
    /// in-memory defaults.
    async fn load_settings(&self) {
        match self.settings_store.load().await {
            Ok(Some(values)) => self.settings.write().replace_all(values),
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(%error, "failed to load runtime settings, keeping defaults")
            }
        }
    }

    async fn save_settings(&self) {
        let snapshot = {
            let settings = self.settings.read();
            if !settings.is_modified() {
                return;
            }
            settings.values().clone()
        };
        match self.settings_store.save(&snapshot).await {
            Ok(()) => self.settings.write().mark_saved(),
            Err(error) => tracing::warn!(%error, "failed to save runtime settings"),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "component panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages_surface_str_and_string_payloads() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("kaput"));
        assert_eq!(panic_message(boxed.as_ref()), "kaput");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "component panicked");
    }
}
