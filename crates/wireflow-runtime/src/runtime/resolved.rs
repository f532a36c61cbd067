//! Load-time resolution of a project.
//!
//! Resolution validates the graphs, binds every component to its registered
//! behavior, and precomputes what the pump asks on every tick: the
//! component's kind, whether it is a pure input source, and whether any
//! wire feeds its sequence input. After this pass the hot path is lookups.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::errors::GraphError;
use crate::traits::{BehaviorMap, ComponentBehavior, ComponentKind};
use crate::types::{FlowGraph, Project, ComponentDef, SEQ_INPUT};

/// One component bound to its behavior, with the per-tick facts precomputed.
pub struct ResolvedComponent {
    pub def: Arc<ComponentDef>,
    pub behavior: Arc<dyn ComponentBehavior>,
    pub kind: ComponentKind,
    pub input_source: bool,
}

/// A validated flow graph with behaviors bound.
pub struct ResolvedFlow {
    graph: Arc<FlowGraph>,
    components: HashMap<String, ResolvedComponent>,
    seq_wired: HashSet<String>,
}

impl ResolvedFlow {
    fn resolve(graph: FlowGraph, behaviors: &BehaviorMap) -> Result<Self, GraphError> {
        let mut components = HashMap::new();
        for def in graph.iter_components() {
            let behavior = behaviors.get(&def.component_type).cloned().ok_or_else(|| {
                GraphError::UnknownComponentType {
                    flow: graph.id.clone(),
                    component: def.id.clone(),
                    component_type: def.component_type.clone(),
                }
            })?;
            let meta = behavior.meta();
            components.insert(
                def.id.clone(),
                ResolvedComponent {
                    def: Arc::new(def.clone()),
                    behavior,
                    kind: meta.kind,
                    input_source: meta.input_source,
                },
            );
        }
        let seq_wired = graph
            .wires
            .iter()
            .filter(|w| w.input == SEQ_INPUT)
            .map(|w| w.target.clone())
            .collect();
        Ok(Self {
            graph: Arc::new(graph),
            components,
            seq_wired,
        })
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn component(&self, id: &str) -> Option<&ResolvedComponent> {
        self.components.get(id)
    }

    pub fn components(&self) -> impl Iterator<Item = &ResolvedComponent> {
        self.components.values()
    }

    /// Whether any wire in this graph feeds `component`'s sequence input.
    pub fn is_seq_wired(&self, component: &str) -> bool {
        self.seq_wired.contains(component)
    }
}

/// The whole project, validated and bound, shared by every running flow.
pub struct ResolvedProject {
    name: String,
    flows: HashMap<String, Arc<ResolvedFlow>>,
    /// Flow ids of pages not used as widget layouts, in project order.
    runnable_pages: Vec<String>,
    /// Action name to flow id.
    actions_by_name: HashMap<String, String>,
    pages_by_name: HashMap<String, String>,
    globals: Vec<crate::types::VariableDef>,
}

impl ResolvedProject {
    pub fn resolve(project: &Project, behaviors: &BehaviorMap) -> Result<Self, GraphError> {
        project.validate()?;

        let mut flows = HashMap::new();
        let mut runnable_pages = Vec::new();
        let mut actions_by_name = HashMap::new();
        let mut pages_by_name = HashMap::new();

        for page in &project.pages {
            if !page.used_as_widget {
                runnable_pages.push(page.id.clone());
            }
            pages_by_name.insert(page.name.clone(), page.id.clone());
            flows.insert(
                page.id.clone(),
                Arc::new(ResolvedFlow::resolve(page.clone(), behaviors)?),
            );
        }
        for action in &project.actions {
            actions_by_name.insert(action.name.clone(), action.id.clone());
            flows.insert(
                action.id.clone(),
                Arc::new(ResolvedFlow::resolve(action.clone(), behaviors)?),
            );
        }

        Ok(Self {
            name: project.name.clone(),
            flows,
            runnable_pages,
            actions_by_name,
            pages_by_name,
            globals: project.globals.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flow(&self, id: &str) -> Option<&Arc<ResolvedFlow>> {
        self.flows.get(id)
    }

    pub fn runnable_pages(&self) -> impl Iterator<Item = &Arc<ResolvedFlow>> {
        self.runnable_pages.iter().filter_map(|id| self.flows.get(id))
    }

    pub fn action_named(&self, name: &str) -> Option<&Arc<ResolvedFlow>> {
        self.actions_by_name.get(name).and_then(|id| self.flows.get(id))
    }

    pub fn page_named(&self, name: &str) -> Option<&Arc<ResolvedFlow>> {
        self.pages_by_name.get(name).and_then(|id| self.flows.get(id))
    }

    pub fn globals(&self) -> &[crate::types::VariableDef] {
        &self.globals
    }
}

impl std::fmt::Debug for ResolvedProject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProject")
            .field("name", &self.name)
            .field("flows", &self.flows.len())
            .field("runnable_pages", &self.runnable_pages)
            .finish()
    }
}
