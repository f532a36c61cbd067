//! Execution history: the capped audit log of runtime events.
//!
//! Every scheduler-visible event (flow start/end, component execution,
//! widget actions, value propagation, wiring failures, execution errors)
//! is appended as one [`HistoryEntry`]. The log holds at most
//! [`MAX_HISTORY_ITEMS`] entries; the oldest are evicted FIFO.
//!
//! Entries carry ids of the running flow and the graph objects involved so
//! an embedding UI can navigate from an entry to the offending object, plus
//! pre-rendered labels so rendering needs no graph access.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default history capacity. Appending beyond it evicts the oldest entry.
pub const MAX_HISTORY_ITEMS: usize = 1000;

/// Allocates entry ids. Uuid v4, same scheme as running-flow ids.
pub(crate) fn next_entry_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One record in the execution history.
///
/// `flow` is the id of the running flow that produced the entry; global
/// events (a widget action on a flow that no longer exists) leave it unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "entry_type")]
#[non_exhaustive]
pub enum HistoryEntry {
    /// A reusable action graph was instantiated and started.
    ActionStart {
        id: String,
        timestamp: DateTime<Utc>,
        flow: Option<String>,
        flow_name: String,
    },
    /// A running flow finished.
    ActionEnd {
        id: String,
        timestamp: DateTime<Utc>,
        flow: Option<String>,
        flow_name: String,
    },
    /// An action component began executing.
    ComponentExecuted {
        id: String,
        timestamp: DateTime<Utc>,
        flow: Option<String>,
        component: String,
        component_label: String,
    },
    /// A widget's named action was resolved and launched.
    WidgetActionExecuted {
        id: String,
        timestamp: DateTime<Utc>,
        flow: Option<String>,
        widget: String,
        widget_label: String,
    },
    /// A widget was activated but has no action configured.
    WidgetActionNotDefined {
        id: String,
        timestamp: DateTime<Utc>,
        flow: Option<String>,
        widget: String,
        widget_label: String,
    },
    /// A widget names an action that does not exist in the project.
    WidgetActionNotFound {
        id: String,
        timestamp: DateTime<Utc>,
        flow: Option<String>,
        widget: String,
        action: String,
    },
    /// A fired output has no outgoing wire.
    NoConnection {
        id: String,
        timestamp: DateTime<Utc>,
        flow: Option<String>,
        component: String,
        component_label: String,
        output: String,
    },
    /// A value left a component along one wire.
    OutputValue {
        id: String,
        timestamp: DateTime<Utc>,
        flow: Option<String>,
        wire: String,
        output: String,
        target: String,
        target_label: String,
        input: String,
        value: serde_json::Value,
    },
    /// A component's execute failed.
    ExecutionError {
        id: String,
        timestamp: DateTime<Utc>,
        flow: Option<String>,
        component: String,
        component_label: String,
        error: String,
    },
}

impl HistoryEntry {
    pub fn id(&self) -> &str {
        match self {
            Self::ActionStart { id, .. }
            | Self::ActionEnd { id, .. }
            | Self::ComponentExecuted { id, .. }
            | Self::WidgetActionExecuted { id, .. }
            | Self::WidgetActionNotDefined { id, .. }
            | Self::WidgetActionNotFound { id, .. }
            | Self::NoConnection { id, .. }
            | Self::OutputValue { id, .. }
            | Self::ExecutionError { id, .. } => id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ActionStart { timestamp, .. }
            | Self::ActionEnd { timestamp, .. }
            | Self::ComponentExecuted { timestamp, .. }
            | Self::WidgetActionExecuted { timestamp, .. }
            | Self::WidgetActionNotDefined { timestamp, .. }
            | Self::WidgetActionNotFound { timestamp, .. }
            | Self::NoConnection { timestamp, .. }
            | Self::OutputValue { timestamp, .. }
            | Self::ExecutionError { timestamp, .. } => *timestamp,
        }
    }

    /// Id of the running flow the entry belongs to, when it still existed.
    pub fn flow(&self) -> Option<&str> {
        match self {
            Self::ActionStart { flow, .. }
            | Self::ActionEnd { flow, .. }
            | Self::ComponentExecuted { flow, .. }
            | Self::WidgetActionExecuted { flow, .. }
            | Self::WidgetActionNotDefined { flow, .. }
            | Self::WidgetActionNotFound { flow, .. }
            | Self::NoConnection { flow, .. }
            | Self::OutputValue { flow, .. }
            | Self::ExecutionError { flow, .. } => flow.as_deref(),
        }
    }

    /// Entries an embedding UI should highlight as failures.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::WidgetActionNotDefined { .. }
                | Self::WidgetActionNotFound { .. }
                | Self::NoConnection { .. }
                | Self::ExecutionError { .. }
        )
    }

    /// Human-readable label, rendered exactly as the editor displays it.
    pub fn message(&self) -> String {
        match self {
            Self::ActionStart { flow_name, .. } => format!("Action start: {flow_name}"),
            Self::ActionEnd { flow_name, .. } => format!("Action end: {flow_name}"),
            Self::ComponentExecuted {
                component_label, ..
            } => format!("Execute component: {component_label}"),
            Self::WidgetActionExecuted { widget_label, .. } => {
                format!("Execute widget action: {widget_label}")
            }
            Self::WidgetActionNotDefined { widget_label, .. } => {
                format!("Widget action not defined: {widget_label}")
            }
            Self::WidgetActionNotFound { action, .. } => {
                format!("Widget action not found: {action}")
            }
            Self::NoConnection {
                component_label,
                output,
                ..
            } => format!("Action {component_label} has no connection from output {output}"),
            Self::OutputValue {
                output,
                target_label,
                input,
                value,
                ..
            } => {
                let rendered = match value {
                    serde_json::Value::Null => "null".to_string(),
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("Output value from [{output}] to [{target_label}/{input}]: {rendered}")
            }
            Self::ExecutionError {
                component_label,
                error,
                ..
            } => format!("Execution error in {component_label}: {error}"),
        }
    }
}

/// Append-only log with FIFO eviction past its capacity.
#[derive(Debug)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    cap: usize,
}

impl HistoryLog {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap.min(MAX_HISTORY_ITEMS)),
            cap,
        }
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Owned copy of the current entries in arrival order.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(MAX_HISTORY_ITEMS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn executed(label: &str) -> HistoryEntry {
        HistoryEntry::ComponentExecuted {
            id: next_entry_id(),
            timestamp: Utc::now(),
            flow: Some("f1".into()),
            component: label.to_ascii_lowercase(),
            component_label: label.into(),
        }
    }

    #[test]
    fn messages_render_editor_labels() {
        assert_eq!(executed("Blink").message(), "Execute component: Blink");

        let entry = HistoryEntry::NoConnection {
            id: next_entry_id(),
            timestamp: Utc::now(),
            flow: None,
            component: "btn".into(),
            component_label: "Button".into(),
            output: "action".into(),
        };
        assert_eq!(
            entry.message(),
            "Action Button has no connection from output action"
        );
        assert!(entry.is_error());

        let entry = HistoryEntry::OutputValue {
            id: next_entry_id(),
            timestamp: Utc::now(),
            flow: Some("f1".into()),
            wire: "w1".into(),
            output: "value".into(),
            target: "sink".into(),
            target_label: "Sink".into(),
            input: "data".into(),
            value: json!(42),
        };
        assert_eq!(entry.message(), "Output value from [value] to [Sink/data]: 42");
        assert!(!entry.is_error());

        let entry = HistoryEntry::ExecutionError {
            id: next_entry_id(),
            timestamp: Utc::now(),
            flow: Some("f1".into()),
            component: "dev".into(),
            component_label: "Device".into(),
            error: "timeout".into(),
        };
        assert_eq!(entry.message(), "Execution error in Device: timeout");
        assert!(entry.is_error());
    }

    #[test]
    fn null_output_value_renders_null() {
        let entry = HistoryEntry::OutputValue {
            id: next_entry_id(),
            timestamp: Utc::now(),
            flow: None,
            wire: "w".into(),
            output: "@seqout".into(),
            target: "b".into(),
            target_label: "B".into(),
            input: "in".into(),
            value: serde_json::Value::Null,
        };
        assert!(entry.message().ends_with(": null"));
    }

    #[test]
    fn cap_evicts_oldest_in_arrival_order() {
        let mut log = HistoryLog::new(1000);
        for i in 0..1001 {
            log.append(executed(&format!("c{i}")));
        }
        assert_eq!(log.len(), 1000);
        let snapshot = log.snapshot();
        // c0 was evicted; c1..=c1000 remain in order.
        assert_eq!(
            snapshot.first().unwrap().message(),
            "Execute component: c1"
        );
        assert_eq!(
            snapshot.last().unwrap().message(),
            "Execute component: c1000"
        );
    }

    #[test]
    fn entry_round_trip() {
        let entry = HistoryEntry::WidgetActionNotFound {
            id: next_entry_id(),
            timestamp: Utc::now(),
            flow: None,
            widget: "btn".into(),
            action: "Blink".into(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("widget_action_not_found"));
        let back: HistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.message(), "Widget action not found: Blink");
        assert_eq!(back.id(), entry.id());
    }
}
