//! Graph model: projects, flows, components, and wires.
//!
//! A [`Project`] bundles the flows a runtime can instantiate: `pages`
//! (top-level screens, instantiated at start unless marked as reusable
//! widgets) and `actions` (reusable graphs invoked by name). A [`FlowGraph`]
//! is a tree of [`ComponentDef`]s plus the [`Wire`]s joining their named
//! outputs to named inputs.
//!
//! Everything here is plain serializable data. Behavior is bound separately
//! through the behavior registry, which resolves each component's `type`
//! string once at load time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Schema version for serialized projects. Bump on breaking model changes.
pub const PROJECT_SCHEMA_VERSION: u16 = 1;

/// The sequence input: the control-flow port that chains action components.
pub const SEQ_INPUT: &str = "@seqin";

/// The sequence output, paired with [`SEQ_INPUT`].
pub const SEQ_OUTPUT: &str = "@seqout";

/// Synthetic input delivered to every component when its flow starts.
/// Not a declared port; readiness checks ignore it.
pub const START_INPUT: &str = "@start";

/// The conventional output name widgets fire on user interaction.
pub const ACTION_OUTPUT: &str = "action";

/// Type id of the entry-point component. A flow hosting another flow
/// triggers these over the sequence path when it forwards `@seqin`.
pub const START_COMPONENT_TYPE: &str = "start";

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Declared value type of a port. Advisory; runtime values are JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    #[default]
    Any,
    String,
    Number,
    Bool,
    Json,
}

/// A declared input or output of a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDef {
    pub name: String,
    #[serde(default)]
    pub port_type: PortType,
    /// Optional inputs do not gate readiness.
    #[serde(default)]
    pub optional: bool,
}

impl PortDef {
    /// Shorthand for a required port of type `Any`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port_type: PortType::Any,
            optional: false,
        }
    }

    /// True for the sequence input port.
    pub fn is_sequence_input(&self) -> bool {
        self.name == SEQ_INPUT
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Editor canvas position. Carried through for round-tripping; the runtime
/// never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One node of a flow graph.
///
/// `id` must be unique within its flow, including components nested inside
/// `children` of container widgets. `component_type` selects the registered
/// behavior; the kind (action, layout host, plain) is resolved from it once
/// at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDef {
    pub id: String,
    #[serde(rename = "type")]
    pub component_type: String,
    /// Display label. Falls back to `id` when empty.
    #[serde(default)]
    pub name: String,
    /// Stable cross-flow identity used to match a layout host's inputs to
    /// the embedded page's input components. Falls back to `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<PortDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<PortDef>,
    /// Property names whose value is driven by an input wire instead of
    /// static config.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_properties: Vec<String>,
    /// Behavior-specific configuration (constant values, variable names,
    /// the embedded page of a layout host, a widget's named action).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Child components of container widgets. Wires may target children
    /// directly; they participate in scheduling like any other component.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ComponentDef>,
}

impl ComponentDef {
    /// Minimal component with no ports or config.
    pub fn new(id: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            component_type: component_type.into(),
            name: String::new(),
            wire_id: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            input_properties: Vec::new(),
            config: serde_json::Value::Null,
            position: None,
            children: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// The effective wire id (`wire_id` field, or `id` when unset).
    pub fn wire_id(&self) -> &str {
        self.wire_id.as_deref().unwrap_or(&self.id)
    }

    /// Whether the named property reads its value from an input wire.
    pub fn is_input_property(&self, name: &str) -> bool {
        self.input_properties.iter().any(|p| p == name)
    }

    /// Declared inputs that gate readiness: everything except the sequence
    /// input and optional ports.
    pub fn mandatory_data_inputs(&self) -> impl Iterator<Item = &PortDef> {
        self.inputs
            .iter()
            .filter(|p| !p.is_sequence_input() && !p.optional)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|p| p.name == name)
    }

    /// String-valued config key, if present.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Wires
// ---------------------------------------------------------------------------

/// A directed edge from `source`'s named `output` to `target`'s named
/// `input`. Ids must be unique within their flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wire {
    pub id: String,
    pub source: String,
    pub output: String,
    pub target: String,
    pub input: String,
}

impl Wire {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        output: impl Into<String>,
        target: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            output: output.into(),
            target: target.into(),
            input: input.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// A named variable declaration with its initial value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

/// One flow: a page or a reusable action graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    pub id: String,
    pub name: String,
    /// Pages only: marked pages are embedded by layout hosts and are not
    /// instantiated as top-level flows at start.
    #[serde(default)]
    pub used_as_widget: bool,
    #[serde(default)]
    pub components: Vec<ComponentDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wires: Vec<Wire>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_variables: Vec<VariableDef>,
}

impl FlowGraph {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            used_as_widget: false,
            components: Vec::new(),
            wires: Vec::new(),
            local_variables: Vec::new(),
        }
    }

    /// Depth-first walk over every component, including children of
    /// container widgets, in document order.
    pub fn iter_components(&self) -> ComponentIter<'_> {
        ComponentIter {
            stack: self.components.iter().rev().collect(),
        }
    }

    /// Find a component anywhere in the tree.
    pub fn component(&self, id: &str) -> Option<&ComponentDef> {
        self.iter_components().find(|c| c.id == id)
    }

    /// All wires leaving the named output of a component.
    pub fn wires_from<'a>(
        &'a self,
        source: &'a str,
        output: &'a str,
    ) -> impl Iterator<Item = &'a Wire> {
        self.wires
            .iter()
            .filter(move |w| w.source == source && w.output == output)
    }

    /// The unique wire leaving the named output, if any. When several exist
    /// the first declared wins; sequence outputs are expected to be unique.
    pub fn wire_from<'a>(&'a self, source: &'a str, output: &'a str) -> Option<&'a Wire> {
        self.wires_from(source, output).next()
    }

    /// Whether any wire feeds the component's sequence input.
    pub fn has_seq_input_wire(&self, target: &str) -> bool {
        self.wires
            .iter()
            .any(|w| w.target == target && w.input == SEQ_INPUT)
    }

    /// Structural checks: unique component ids (across the whole tree),
    /// unique wire ids, wire endpoints that exist.
    pub fn validate(&self) -> Result<(), crate::errors::GraphError> {
        use crate::errors::GraphError;

        let mut ids = std::collections::HashSet::new();
        for component in self.iter_components() {
            if !ids.insert(component.id.as_str()) {
                return Err(GraphError::DuplicateComponent {
                    flow: self.id.clone(),
                    component: component.id.clone(),
                });
            }
        }

        let mut wire_ids = std::collections::HashSet::new();
        for wire in &self.wires {
            if !wire_ids.insert(wire.id.as_str()) {
                return Err(GraphError::DuplicateWire {
                    flow: self.id.clone(),
                    wire: wire.id.clone(),
                });
            }
            for endpoint in [&wire.source, &wire.target] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(GraphError::DanglingWire {
                        flow: self.id.clone(),
                        wire: wire.id.clone(),
                        component: endpoint.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Iterator returned by [`FlowGraph::iter_components`].
pub struct ComponentIter<'a> {
    stack: Vec<&'a ComponentDef>,
}

impl<'a> Iterator for ComponentIter<'a> {
    type Item = &'a ComponentDef;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        for child in next.children.iter().rev() {
            self.stack.push(child);
        }
        Some(next)
    }
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

/// A complete project: pages, reusable actions, and global variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    pub name: String,
    #[serde(default)]
    pub pages: Vec<FlowGraph>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<FlowGraph>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub globals: Vec<VariableDef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_schema_version() -> u16 {
    PROJECT_SCHEMA_VERSION
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema_version: PROJECT_SCHEMA_VERSION,
            name: name.into(),
            pages: Vec::new(),
            actions: Vec::new(),
            globals: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Pages instantiated as top-level flows at start.
    pub fn runnable_pages(&self) -> impl Iterator<Item = &FlowGraph> {
        self.pages.iter().filter(|p| !p.used_as_widget)
    }

    /// Look up any flow (page or action) by id.
    pub fn flow(&self, id: &str) -> Option<&FlowGraph> {
        self.pages
            .iter()
            .chain(self.actions.iter())
            .find(|f| f.id == id)
    }

    pub fn page_named(&self, name: &str) -> Option<&FlowGraph> {
        self.pages.iter().find(|p| p.name == name)
    }

    pub fn action_named(&self, name: &str) -> Option<&FlowGraph> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn validate(&self) -> Result<(), crate::errors::GraphError> {
        use crate::errors::GraphError;

        let mut flow_ids = std::collections::HashSet::new();
        for flow in self.pages.iter().chain(self.actions.iter()) {
            if !flow_ids.insert(flow.id.as_str()) {
                return Err(GraphError::DuplicateFlow {
                    flow: flow.id.clone(),
                });
            }
            flow.validate()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
