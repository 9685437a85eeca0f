//! Node-level error types.

use thiserror::Error;

/// Errors raised while executing a single node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node timed out")]
    Timeout,
    #[error("node cancelled")]
    Cancelled,
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("executor not registered for node type: {0}")]
    ExecutorNotFound(String),
    #[error("external call failed: {0}")]
    ExternalCall(String),
    #[error("awaiting caller input for node {0}")]
    AwaitingInput(String),
    #[error("stream closed before completion")]
    StreamClosed,
    #[error("{0}")]
    Other(String),
}

impl NodeError {
    /// Whether re-attempting the node can reasonably succeed. Config and
    /// wiring problems are permanent; timeouts and external calls are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NodeError::Timeout | NodeError::ExternalCall(_) | NodeError::StreamClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(NodeError::Timeout.is_retryable());
        assert!(NodeError::ExternalCall("503".into()).is_retryable());
        assert!(!NodeError::InvalidConfig("bad".into()).is_retryable());
        assert!(!NodeError::Cancelled.is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(NodeError::Timeout.to_string(), "node timed out");
        assert_eq!(
            NodeError::MissingInput("items".into()).to_string(),
            "missing input: items"
        );
    }
}
