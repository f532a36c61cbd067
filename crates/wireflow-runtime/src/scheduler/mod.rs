//! The scheduler: builder, public handle, and the driver task behind it.
//!
//! [`RuntimeScheduler`] is the entry point for running a project. Building
//! one resolves the project against the behavior registry; [`start()`] then
//! spawns the driver task that owns every running flow and pumps the task
//! queue. The handle talks to the driver over a command channel and shares
//! the read side of the history log, settings, speed counter, and wire
//! activity map.
//!
//! ```rust,ignore
//! let scheduler = RuntimeScheduler::builder()
//!     .project(project)
//!     .behavior(MyDeviceComponent)
//!     .build()?;
//!
//! scheduler.start()?;
//! scheduler.execute_widget_action("main", "btn-run").await?;
//! scheduler.stop().await;
//! ```
//!
//! [`start()`]: RuntimeScheduler::start

mod builder;
mod config;
mod driver;

pub use builder::SchedulerBuilder;
pub use config::{ErrorPolicy, SchedulerConfig};

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::errors::SchedulerError;
use crate::history::{HistoryEntry, HistoryLog};
use crate::runtime::{FlowLifecycle, ResolvedProject};
use crate::settings::RuntimeSettings;
use crate::traits::SettingsStore;

use driver::{ActiveWires, Command, Driver, Shared};

// ---------------------------------------------------------------------------
// Observable state
// ---------------------------------------------------------------------------

/// Lifecycle of the scheduler as a whole, observable via
/// [`RuntimeScheduler::watch_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Built, never started.
    Idle,
    /// The driver task is pumping.
    Running,
    /// Stop requested; waiting for in-flight executes to drain.
    Stopping,
    /// The driver task has finished and flows are wound down.
    Stopped,
}

/// What a UI has highlighted. Purely presentational; the driver never
/// reads it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Selection {
    pub running_flow: Option<String>,
    pub history_item: Option<String>,
}

/// Point-in-time view of one running flow and the flows nested under it.
#[derive(Debug, Clone, Serialize)]
pub struct FlowSnapshot {
    /// Running flow id (unique per instantiation).
    pub id: String,
    /// Id of the graph this flow instantiates.
    pub graph: String,
    pub name: String,
    pub lifecycle: FlowLifecycle,
    pub children: Vec<FlowSnapshot>,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a flow runtime.
///
/// Cheap to share behind an `Arc`; every method takes `&self`. The driver
/// task holds the flows themselves, so queries about live state
/// ([`running_flows`], [`get_property_value`]) are messages, while the
/// history log, settings, speed, and wire activity are shared directly and
/// readable even after a stop.
///
/// Dropping the handle closes the command channel, which winds the driver
/// down as if [`stop`] had been called (without waiting for it).
///
/// [`running_flows`]: RuntimeScheduler::running_flows
/// [`get_property_value`]: RuntimeScheduler::get_property_value
/// [`stop`]: RuntimeScheduler::stop
pub struct RuntimeScheduler {
    resolved: Arc<ResolvedProject>,
    config: SchedulerConfig,
    history: Arc<RwLock<HistoryLog>>,
    settings: Arc<RwLock<RuntimeSettings>>,
    settings_store: Arc<dyn SettingsStore>,
    speed: Arc<AtomicU32>,
    active_wires: Arc<RwLock<ActiveWires>>,
    selection: RwLock<Selection>,
    state_tx: Arc<watch::Sender<SchedulerState>>,
    state_rx: watch::Receiver<SchedulerState>,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    disposed: AtomicBool,
}

impl RuntimeScheduler {
    /// Create a new [`SchedulerBuilder`].
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    fn new(
        resolved: Arc<ResolvedProject>,
        config: SchedulerConfig,
        settings_store: Arc<dyn SettingsStore>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        Self {
            history: Arc::new(RwLock::new(HistoryLog::new(config.history_cap))),
            resolved,
            config,
            settings: Arc::new(RwLock::new(RuntimeSettings::default())),
            settings_store,
            speed: Arc::new(AtomicU32::new(0)),
            active_wires: Arc::new(RwLock::new(ActiveWires::new())),
            selection: RwLock::new(Selection::default()),
            state_tx: Arc::new(state_tx),
            state_rx,
            commands: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    // -- lifecycle --------------------------------------------------------

    /// Spawn the driver task: load settings, instantiate every runnable
    /// page, and begin pumping. Returns once the task is spawned; watch
    /// [`watch_state`](Self::watch_state) for [`SchedulerState::Running`].
    ///
    /// A no-op while a driver is already alive. History is kept across
    /// restarts; [`clear_history`](Self::clear_history) resets it.
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(SchedulerError::Disposed);
        }
        let mut commands = self.commands.lock();
        if commands.is_some() && self.state() != SchedulerState::Stopped {
            return Ok(());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = Driver::new(
            Shared {
                resolved: self.resolved.clone(),
                config: self.config.clone(),
                history: self.history.clone(),
                settings: self.settings.clone(),
                settings_store: self.settings_store.clone(),
                speed: self.speed.clone(),
                active_wires: self.active_wires.clone(),
                state: self.state_tx.clone(),
            },
            rx,
        );
        tokio::spawn(driver.run());
        *commands = Some(tx);
        Ok(())
    }

    /// Stop the runtime: in-flight executes drain, every flow is finished
    /// (children first), and modified settings are saved. Resolves once the
    /// driver task has wound down. A no-op when nothing is running.
    pub async fn stop(&self) {
        let sender = self.commands.lock().take();
        let Some(sender) = sender else {
            return;
        };
        let (ack, done) = oneshot::channel();
        if sender.send(Command::Stop { ack }).is_ok() {
            let _ = done.await;
        }
    }

    /// Stop, then refuse any further [`start`](Self::start).
    pub async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.stop().await;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        *self.state_rx.borrow()
    }

    /// A watch receiver for lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state_rx.clone()
    }

    // -- interaction --------------------------------------------------------

    /// Run a widget's activation in the top-level flow whose graph id is
    /// `page`: its wired `action` output when one is declared, else the
    /// action flow named in its `action` config, else a logged
    /// "not defined" entry. Invoked while stopped, the runtime is
    /// restarted first.
    pub async fn execute_widget_action(
        &self,
        page: &str,
        widget: &str,
    ) -> Result<(), SchedulerError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(SchedulerError::Disposed);
        }
        if self.state() != SchedulerState::Running {
            self.start()?;
        }
        let sender = self.command_sender()?;
        let (ack, done) = oneshot::channel();
        sender
            .send(Command::ExecuteWidgetAction {
                page: page.to_string(),
                widget: widget.to_string(),
                ack,
            })
            .map_err(|_| SchedulerError::NotRunning)?;
        done.await.map_err(|_| SchedulerError::NotRunning)?
    }

    /// A component property as a UI should display it while running: the
    /// committed input value for input-driven properties, the static
    /// configuration value otherwise. `flow` is a running flow id.
    pub async fn get_property_value(
        &self,
        flow: &str,
        component: &str,
        property: &str,
    ) -> Result<Option<Value>, SchedulerError> {
        let sender = self.command_sender()?;
        let (reply, value) = oneshot::channel();
        sender
            .send(Command::GetPropertyValue {
                flow: flow.to_string(),
                component: component.to_string(),
                property: property.to_string(),
                reply,
            })
            .map_err(|_| SchedulerError::NotRunning)?;
        value.await.map_err(|_| SchedulerError::NotRunning)?
    }

    /// Snapshot of the top-level running flows and their nested flows.
    /// Empty when nothing is running.
    pub async fn running_flows(&self) -> Vec<FlowSnapshot> {
        let Ok(sender) = self.command_sender() else {
            return Vec::new();
        };
        let (reply, snapshot) = oneshot::channel();
        if sender.send(Command::Snapshot { reply }).is_err() {
            return Vec::new();
        }
        snapshot.await.unwrap_or_default()
    }

    fn command_sender(&self) -> Result<mpsc::UnboundedSender<Command>, SchedulerError> {
        self.commands
            .lock()
            .as_ref()
            .cloned()
            .ok_or(SchedulerError::NotRunning)
    }

    // -- observability ------------------------------------------------------

    /// Everything currently in the history log, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.read().snapshot()
    }

    pub fn clear_history(&self) {
        self.history.write().clear();
    }

    /// Executes completed during the last sampling interval.
    pub fn speed(&self) -> u32 {
        self.speed.load(Ordering::Relaxed)
    }

    /// Wires that carried a delivery within the given window, as
    /// (running flow id, wire id) pairs.
    pub fn active_wires(&self, within: Duration) -> Vec<(String, String)> {
        let wires = self.active_wires.read();
        match Instant::now().checked_sub(within) {
            Some(horizon) => wires
                .iter()
                .filter(|(_, at)| **at >= horizon)
                .map(|(key, _)| key.clone())
                .collect(),
            None => wires.keys().cloned().collect(),
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection.read().clone()
    }

    pub fn select_running_flow(&self, flow: Option<String>) {
        self.selection.write().running_flow = flow;
    }

    pub fn select_history_item(&self, entry: Option<String>) {
        self.selection.write().history_item = entry;
    }

    // -- settings -----------------------------------------------------------

    /// Read a runtime setting. Settings are loaded from the store at start
    /// and saved back at stop when modified.
    pub fn get_setting(&self, key: &str) -> Option<Value> {
        self.settings.read().get(key)
    }

    pub fn set_setting(&self, key: &str, value: Value) {
        self.settings.write().set(key, value);
    }
}

impl std::fmt::Debug for RuntimeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeScheduler")
            .field("project", &self.resolved.name())
            .field("state", &*self.state_rx.borrow())
            .field("disposed", &self.disposed.load(Ordering::SeqCst))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
