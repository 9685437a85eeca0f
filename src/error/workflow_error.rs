//! Workflow-level error types.

use super::NodeError;
use crate::validate::ValidateIssue;
use thiserror::Error;

/// Workflow-level errors covering the canvas compiler, the draft/version
/// store and the execution runtime.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("serialization failed: {0}")]
    SerializationFail(#[from] serde_json::Error),
    #[error("schema conversion failed for node {node_key}: {reason}")]
    SchemaConversionFail { node_key: String, reason: String },
    #[error("workflow {id} not found (version: {version:?})")]
    WorkflowNotFound { id: i64, version: Option<String> },
    #[error("version {new} does not strictly increment latest published version {latest}")]
    VersionMonotonicity { latest: String, new: String },
    #[error("workflow {0}'s current draft needs to pass a test run before publishing")]
    TestRunRequired(i64),
    #[error("sub-workflow reference cycle detected at workflow {id} (version: {version:?})")]
    ReferenceCycle { id: i64, version: Option<String> },
    #[error("validation failed with {} issue(s)", .0.len())]
    ValidationFailed(Vec<ValidateIssue>),
    #[error("node execution error: node={node_key}, error={error}")]
    NodeExecutionError { node_key: String, error: String },
    #[error("workflow execution timed out")]
    Timeout,
    #[error("workflow aborted: {0}")]
    Aborted(String),
    #[error("operation failed: {0}")]
    OperationFail(String),
    #[error("node error: {0}")]
    NodeError(Box<NodeError>),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<NodeError> for WorkflowError {
    fn from(value: NodeError) -> Self {
        WorkflowError::NodeError(Box::new(value))
    }
}

impl WorkflowError {
    /// Wrap a caught compiler panic as an error, mirroring how the original
    /// conversion pipeline never lets a panic escape.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        WorkflowError::OperationFail(format!("panic during canvas compilation: {msg}"))
    }
}
