//! A running flow: one live instantiation of a flow graph.
//!
//! Running flows are plain state owned by the scheduler; all behavior
//! (delivery, readiness, execution) lives in the scheduler loop. A flow
//! holds per-component execution state, its variable scope chained under
//! the project globals, and links to the flows it hosts.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::DataContext;
use crate::runtime::component_state::ComponentState;
use crate::runtime::resolved::ResolvedFlow;
use crate::types::FlowGraph;

/// Lifecycle of a running flow. Strictly ordered; no stage is skipped and
/// `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowLifecycle {
    Created,
    Started,
    Running,
    Finishing,
    Finished,
}

impl FlowLifecycle {
    fn successor(self, next: FlowLifecycle) -> bool {
        use FlowLifecycle::*;
        matches!(
            (self, next),
            (Created, Started) | (Started, Running) | (Running, Finishing) | (Finishing, Finished)
        )
    }
}

/// How a nested or invoked flow hangs off the flow that created it.
#[derive(Debug, Clone)]
pub struct HostBinding {
    /// Running flow the host component lives in.
    pub flow: String,
    /// The layout-host or invoking component's id.
    pub component: String,
}

pub struct RunningFlow {
    id: String,
    resolved: Arc<ResolvedFlow>,
    host: Option<HostBinding>,
    data_context: Arc<DataContext>,
    states: HashMap<String, ComponentState>,
    /// Nested flows this flow hosts, in creation order. Finished before
    /// their parent.
    children: Vec<String>,
    lifecycle: FlowLifecycle,
}

impl RunningFlow {
    /// `globals` is the project-wide variable scope; every flow chains its
    /// locals directly under it.
    pub fn new(
        resolved: Arc<ResolvedFlow>,
        globals: &Arc<DataContext>,
        host: Option<HostBinding>,
    ) -> Self {
        let data_context = globals.create_with_local_variables(&resolved.graph().local_variables);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            resolved,
            host,
            data_context,
            states: HashMap::new(),
            children: Vec::new(),
            lifecycle: FlowLifecycle::Created,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.resolved.graph().name
    }

    pub fn graph(&self) -> &FlowGraph {
        self.resolved.graph()
    }

    pub fn resolved(&self) -> &Arc<ResolvedFlow> {
        &self.resolved
    }

    pub fn host(&self) -> Option<&HostBinding> {
        self.host.as_ref()
    }

    pub fn data_context(&self) -> &Arc<DataContext> {
        &self.data_context
    }

    // -- lifecycle ------------------------------------------------------

    pub fn lifecycle(&self) -> FlowLifecycle {
        self.lifecycle
    }

    /// Advance to `next` if it is the immediate successor stage. Invalid
    /// transitions are refused and logged, never applied.
    pub fn advance(&mut self, next: FlowLifecycle) -> bool {
        if self.lifecycle.successor(next) {
            self.lifecycle = next;
            true
        } else {
            tracing::warn!(
                flow = %self.id,
                from = ?self.lifecycle,
                to = ?next,
                "refusing out-of-order flow lifecycle transition"
            );
            false
        }
    }

    pub fn is_finished(&self) -> bool {
        self.lifecycle == FlowLifecycle::Finished
    }

    // -- component states -------------------------------------------------

    /// The component's execution state, created on first touch.
    pub fn state_mut(&mut self, component: &str) -> &mut ComponentState {
        self.states.entry(component.to_string()).or_default()
    }

    pub fn state(&self, component: &str) -> Option<&ComponentState> {
        self.states.get(component)
    }

    // -- children -----------------------------------------------------------

    pub fn add_child(&mut self, id: impl Into<String>) {
        self.children.push(id.into());
    }

    pub fn children(&self) -> &[String] {
        &self.children
    }
}

impl std::fmt::Debug for RunningFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningFlow")
            .field("id", &self.id)
            .field("graph", &self.resolved.graph().id)
            .field("lifecycle", &self.lifecycle)
            .field("children", &self.children.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::BehaviorMap;
    use crate::types::{Project, VariableDef};
    use serde_json::json;

    fn resolved_flow() -> Arc<ResolvedFlow> {
        let mut graph = FlowGraph::new("f1", "Main");
        graph.local_variables = vec![VariableDef {
            name: "mode".into(),
            value: json!("local"),
        }];
        let mut project = Project::new("demo");
        project.pages = vec![graph];
        let resolved =
            crate::runtime::resolved::ResolvedProject::resolve(&project, &BehaviorMap::new())
                .unwrap();
        resolved.flow("f1").unwrap().clone()
    }

    #[test]
    fn lifecycle_refuses_skips_and_is_terminal() {
        let globals = DataContext::new_root(&[]);
        let mut flow = RunningFlow::new(resolved_flow(), &globals, None);
        assert_eq!(flow.lifecycle(), FlowLifecycle::Created);

        // Created cannot jump straight to Running.
        assert!(!flow.advance(FlowLifecycle::Running));
        assert!(flow.advance(FlowLifecycle::Started));
        assert!(flow.advance(FlowLifecycle::Running));
        assert!(flow.advance(FlowLifecycle::Finishing));
        assert!(flow.advance(FlowLifecycle::Finished));
        assert!(!flow.advance(FlowLifecycle::Finished));
        assert!(flow.is_finished());
    }

    #[test]
    fn locals_shadow_globals_in_the_flow_scope() {
        let globals = DataContext::new_root(&[VariableDef {
            name: "mode".into(),
            value: json!("global"),
        }]);
        let flow = RunningFlow::new(resolved_flow(), &globals, None);
        assert_eq!(flow.data_context().get("mode"), Some(json!("local")));
        assert_eq!(globals.get("mode"), Some(json!("global")));
    }

    #[test]
    fn component_states_are_created_lazily() {
        let globals = DataContext::new_root(&[]);
        let mut flow = RunningFlow::new(resolved_flow(), &globals, None);
        assert!(flow.state("c1").is_none());
        flow.state_mut("c1").set_running(true);
        assert!(flow.state("c1").is_some_and(|s| s.is_running()));
    }
}
