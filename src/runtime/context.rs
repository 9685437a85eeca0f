//! Per-execution context: identity, deadline, cancellation, collaborators.

use crate::infra::{
    ConversationService, DatabaseService, HttpClient, KnowledgeService, LlmFactory,
    PluginService,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;

/// Cooperative cancellation signal, polled at every suspension point.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve when cancelled. Safe to race with [`CancelToken::cancel`].
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// External collaborators a run may call. Every handle is optional; nodes
/// needing an absent service fail with a clear error instead of panicking.
#[derive(Clone, Default)]
pub struct RuntimeServices {
    pub llm: Option<Arc<dyn LlmFactory>>,
    pub knowledge: Option<Arc<dyn KnowledgeService>>,
    pub plugin: Option<Arc<dyn PluginService>>,
    pub database: Option<Arc<dyn DatabaseService>>,
    pub http: Option<Arc<dyn HttpClient>>,
    pub conversation: Option<Arc<dyn ConversationService>>,
}

/// Context shared by all nodes of one workflow execution.
pub struct ExecutionContext {
    pub execution_id: String,
    pub cancel: CancelToken,
    /// Absolute deadline for the whole execution, when configured.
    pub deadline: Option<Instant>,
    pub services: RuntimeServices,
    /// Inputs the caller started the workflow with, consumed by the Entry
    /// node.
    pub caller_inputs: HashMap<String, Value>,
    /// Pre-supplied answers for suspending nodes (InputReceiver,
    /// QuestionAnswer), keyed by node key.
    pub provided_inputs: HashMap<String, Value>,
    /// App/system/user global variables.
    pub globals: HashMap<String, Value>,
    /// Where answer-mode exits and output emitters stream their content.
    pub answer_tx: Option<tokio::sync::mpsc::Sender<String>>,
}

impl ExecutionContext {
    pub fn remaining(&self) -> Option<std::time::Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_token_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
            true
        });
        tokio::task::yield_now().await;
        token.cancel();
        assert!(handle.await.unwrap());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancelled().await;
    }
}
