//! Compiled workflow schema.
//!
//! The schema is the execution-ready form of a canvas: typed nodes, the
//! connection set, composite hierarchy, branch tables, and derived
//! streaming/checkpoint requirements. It is produced by the
//! [`compiler`](crate::compiler), never persisted, and cached per
//! `(workflow_id, commit_id)` at runtime.

pub mod configs;
pub mod node_schema;
pub mod type_info;
pub mod workflow_schema;

pub use configs::NodeConfig;
pub use node_schema::{
    BranchSchema, Connection, ExceptionConfig, FieldInfo, FieldSource, GlobalVarScope,
    NodeSchema, StreamConfig, SubWorkflowBasic,
};
pub use type_info::TypeInfo;
pub use workflow_schema::WorkflowSchema;

/// Sentinel target representing the terminal of the current (possibly
/// composite) scope.
pub const END: &str = "END";

/// Port name format for selector branches.
pub fn branch_port(n: usize) -> String {
    format!("branch_{n}")
}

/// Port name for the fall-through branch of selector-like nodes.
pub const PORT_DEFAULT: &str = "default";

/// Port name control flow takes when a node's exception branch fires.
pub const PORT_ERROR: &str = "branch_error";
