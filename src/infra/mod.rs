//! Narrow interfaces to external collaborators.
//!
//! The engine consumes these capabilities only through the contracts below;
//! backends are injected. Each trait ships a small in-memory fake used by
//! tests and embedded setups.

use crate::error::{NodeError, NodeResult, WorkflowResult};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// One chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> ChatMessage {
        ChatMessage { role: "user".to_string(), content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> ChatMessage {
        ChatMessage { role: "system".to_string(), content: content.into() }
    }
}

/// Model invocation parameters the factory resolves into a [`ChatModel`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatModelParams {
    pub model_name: String,
    pub model_type: i64,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<i64>,
}

/// A resolved chat model: blocking generation plus chunked streaming.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> NodeResult<String>;

    /// Stream the completion as text chunks through the provided sender.
    async fn stream(
        &self,
        messages: &[ChatMessage],
        tx: mpsc::Sender<String>,
    ) -> NodeResult<()> {
        let full = self.generate(messages).await?;
        let _ = tx.send(full).await;
        Ok(())
    }
}

/// Builds chat models from node-level parameters.
pub trait LlmFactory: Send + Sync {
    fn build(&self, params: &ChatModelParams) -> NodeResult<Arc<dyn ChatModel>>;
}

/// Retrieved knowledge slice.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub document_id: String,
    pub content: String,
    pub score: f64,
}

#[async_trait]
pub trait KnowledgeService: Send + Sync {
    async fn index_document(
        &self,
        knowledge_id: i64,
        document: &str,
        strategy: Option<&Value>,
    ) -> NodeResult<String>;
    async fn retrieve(&self, knowledge_ids: &[i64], query: &str)
        -> NodeResult<Vec<RetrievedChunk>>;
    async fn delete_document(&self, knowledge_id: i64, document_id: &str) -> NodeResult<()>;
}

#[async_trait]
pub trait PluginService: Send + Sync {
    async fn invoke_tool(
        &self,
        plugin_id: i64,
        tool_id: i64,
        args: &Value,
    ) -> NodeResult<Value>;
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    async fn execute(
        &self,
        database_id: i64,
        op: crate::schema::configs::DatabaseOp,
        sql: &str,
        params: &Value,
    ) -> NodeResult<Value>;
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn request(
        &self,
        method: &str,
        url: &str,
        headers: &HashMap<String, String>,
        body: Option<String>,
        timeout: Duration,
    ) -> NodeResult<(i64, String)>;
}

/// Conversation and message store operations the conversation nodes call.
#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn execute(
        &self,
        op: crate::schema::configs::ConversationOp,
        args: &Value,
    ) -> NodeResult<Value>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> WorkflowResult<()>;
    async fn get_object(&self, key: &str) -> WorkflowResult<Option<Vec<u8>>>;
    async fn get_url(&self, key: &str) -> WorkflowResult<String>;
}

/// String/blob cache with TTL, for compiled schemas and hot look-ups.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>);
    fn remove(&self, key: &str);
}

/// Resource-change notifications emitted by the service layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    WorkflowCreated { id: i64 },
    WorkflowPublished { id: i64, version: String },
    WorkflowDeleted { ids: Vec<i64> },
}

pub trait EventBus: Send + Sync {
    fn publish(&self, event: ResourceEvent);
}

// ---- in-memory fakes ----

/// Cache backed by a concurrent map; TTLs are accepted and ignored.
#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<String, Vec<u8>>,
}

impl CacheStore for InMemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).map(|v| v.clone())
    }

    fn set(&self, key: &str, value: Vec<u8>, _ttl: Option<Duration>) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Event bus that records everything it sees.
#[derive(Default)]
pub struct RecordingEventBus {
    events: parking_lot::Mutex<Vec<ResourceEvent>>,
}

impl RecordingEventBus {
    pub fn events(&self) -> Vec<ResourceEvent> {
        self.events.lock().clone()
    }
}

impl EventBus for RecordingEventBus {
    fn publish(&self, event: ResourceEvent) {
        self.events.lock().push(event);
    }
}

/// Event bus that drops everything.
#[derive(Default)]
pub struct NoopEventBus;

impl EventBus for NoopEventBus {
    fn publish(&self, _event: ResourceEvent) {}
}

/// Object storage over a concurrent map.
#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: DashMap<String, Vec<u8>>,
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> WorkflowResult<()> {
        self.objects.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> WorkflowResult<Option<Vec<u8>>> {
        Ok(self.objects.get(key).map(|v| v.clone()))
    }

    async fn get_url(&self, key: &str) -> WorkflowResult<String> {
        Ok(format!("mem://{key}"))
    }
}

/// Chat model that echoes a canned reply, optionally split into streaming
/// chunks.
pub struct FixedReplyModel {
    pub reply: String,
    pub chunk_size: usize,
}

impl FixedReplyModel {
    pub fn new(reply: impl Into<String>) -> FixedReplyModel {
        FixedReplyModel { reply: reply.into(), chunk_size: 0 }
    }

    pub fn chunked(reply: impl Into<String>, chunk_size: usize) -> FixedReplyModel {
        FixedReplyModel { reply: reply.into(), chunk_size }
    }
}

#[async_trait]
impl ChatModel for FixedReplyModel {
    async fn generate(&self, _messages: &[ChatMessage]) -> NodeResult<String> {
        Ok(self.reply.clone())
    }

    async fn stream(
        &self,
        _messages: &[ChatMessage],
        tx: mpsc::Sender<String>,
    ) -> NodeResult<()> {
        if self.chunk_size == 0 {
            let _ = tx.send(self.reply.clone()).await;
            return Ok(());
        }
        let chars: Vec<char> = self.reply.chars().collect();
        for chunk in chars.chunks(self.chunk_size) {
            if tx.send(chunk.iter().collect()).await.is_err() {
                return Err(NodeError::StreamClosed);
            }
        }
        Ok(())
    }
}

/// Factory returning one shared model regardless of params.
pub struct FixedLlmFactory {
    pub model: Arc<dyn ChatModel>,
}

impl FixedLlmFactory {
    pub fn new(model: Arc<dyn ChatModel>) -> FixedLlmFactory {
        FixedLlmFactory { model }
    }
}

impl LlmFactory for FixedLlmFactory {
    fn build(&self, _params: &ChatModelParams) -> NodeResult<Arc<dyn ChatModel>> {
        Ok(Arc::clone(&self.model))
    }
}

/// Model that fails a fixed number of times before succeeding. Used to
/// exercise retry and backup-model policies.
pub struct FlakyModel {
    pub failures_remaining: std::sync::atomic::AtomicI64,
    pub reply: String,
}

impl FlakyModel {
    pub fn failing(times: i64, reply: impl Into<String>) -> FlakyModel {
        FlakyModel {
            failures_remaining: std::sync::atomic::AtomicI64::new(times),
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl ChatModel for FlakyModel {
    async fn generate(&self, _messages: &[ChatMessage]) -> NodeResult<String> {
        let left = self.failures_remaining.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
        if left > 0 {
            return Err(NodeError::ExternalCall("model unavailable".to_string()));
        }
        Ok(self.reply.clone())
    }
}
