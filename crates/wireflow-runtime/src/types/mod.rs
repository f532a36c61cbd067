//! Core data types shared across the runtime.

mod graph;

pub use graph::{
    ComponentDef, ComponentIter, FlowGraph, PortDef, PortType, Position, Project, VariableDef,
    Wire, ACTION_OUTPUT, PROJECT_SCHEMA_VERSION, SEQ_INPUT, SEQ_OUTPUT, START_COMPONENT_TYPE,
    START_INPUT,
};
