//! Error types for the workflow engine.
//!
//! - [`WorkflowError`] — Top-level errors for canvas compilation, draft/version
//!   lifecycle, validation and execution.
//! - [`NodeError`] — Errors raised during individual node execution.

pub mod node_error;
pub mod workflow_error;

pub use node_error::NodeError;
pub use workflow_error::WorkflowError;

/// Convenience alias for workflow-level results.
pub type WorkflowResult<T> = Result<T, WorkflowError>;
/// Convenience alias for node-level results.
pub type NodeResult<T> = Result<T, NodeError>;
