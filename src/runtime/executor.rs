//! Node executors and their registry.
//!
//! Pure nodes (entry, exit, selector, json, text, variable ops) are built
//! in; nodes needing external services go through the collaborator handles
//! on the execution context. Composite and sub-workflow nodes are driven by
//! the scheduler itself and have no executor here.

use super::condition::select_branch;
use super::context::ExecutionContext;
use super::state::VariableStore;
use super::stream::{stream_channel, StreamReader};
use crate::canvas::model::TextProcessingMethod;
use crate::canvas::{NodeType, QaAnswerType, TerminatePlan};
use crate::error::{NodeError, NodeResult};
use crate::infra::{ChatMessage, ChatModelParams};
use crate::schema::configs::LlmModelParams;
use crate::schema::{branch_port, NodeConfig, NodeSchema, PORT_DEFAULT};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Control-flow outcome a node can raise inside a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Break,
    Continue,
}

/// Resolved inputs handed to an executor.
#[derive(Default)]
pub struct NodeInput {
    pub values: HashMap<String, Value>,
    pub streams: HashMap<String, StreamReader>,
    /// 0 for the first attempt, incremented per retry.
    pub attempt: u32,
}

/// What a node produced.
#[derive(Default)]
pub struct NodeOutput {
    pub values: HashMap<String, Value>,
    pub streams: HashMap<String, StreamReader>,
    /// Set by branch nodes: the single outgoing port that fires.
    pub chosen_port: Option<String>,
    pub signal: Option<ControlSignal>,
}

impl NodeOutput {
    pub fn from_values(values: HashMap<String, Value>) -> NodeOutput {
        NodeOutput { values, ..Default::default() }
    }

    pub fn value_object(&self) -> Value {
        Value::Object(self.values.clone().into_iter().collect::<Map<String, Value>>())
    }
}

#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        ctx: &ExecutionContext,
        store: &VariableStore,
    ) -> NodeResult<NodeOutput>;
}

/// Registry of executors by node type.
pub struct ExecutorRegistry {
    executors: HashMap<NodeType, Arc<dyn NodeExecutor>>,
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ExecutorRegistry {
    pub fn empty() -> ExecutorRegistry {
        ExecutorRegistry { executors: HashMap::new() }
    }

    pub fn with_builtins() -> ExecutorRegistry {
        let mut registry = ExecutorRegistry::empty();
        registry.register(NodeType::Entry, Arc::new(EntryExecutor));
        registry.register(NodeType::Exit, Arc::new(ExitExecutor));
        registry.register(NodeType::OutputEmitter, Arc::new(EmitterExecutor));
        registry.register(NodeType::Selector, Arc::new(SelectorExecutor));
        registry.register(NodeType::Break, Arc::new(SignalExecutor(ControlSignal::Break)));
        registry.register(NodeType::Continue, Arc::new(SignalExecutor(ControlSignal::Continue)));
        registry.register(NodeType::JsonSerialization, Arc::new(JsonSerializationExecutor));
        registry.register(NodeType::JsonDeserialization, Arc::new(JsonDeserializationExecutor));
        registry.register(NodeType::TextProcessor, Arc::new(TextProcessorExecutor));
        registry.register(NodeType::VariableAssigner, Arc::new(VariableAssignerExecutor));
        registry
            .register(NodeType::VariableAssignerWithinLoop, Arc::new(VariableAssignerExecutor));
        registry.register(NodeType::VariableAggregator, Arc::new(VariableAggregatorExecutor));
        registry.register(NodeType::InputReceiver, Arc::new(InputReceiverExecutor));
        registry.register(NodeType::QuestionAnswer, Arc::new(QuestionAnswerExecutor));
        registry.register(NodeType::LLM, Arc::new(LlmExecutor));
        registry.register(NodeType::IntentDetector, Arc::new(IntentDetectorExecutor));
        registry.register(NodeType::HTTPRequester, Arc::new(HttpExecutor));
        registry.register(NodeType::Plugin, Arc::new(PluginExecutor));
        registry.register(NodeType::CodeRunner, Arc::new(CodeExecutor));
        for t in [
            NodeType::KnowledgeRetriever,
            NodeType::KnowledgeIndexer,
            NodeType::KnowledgeDeleter,
        ] {
            registry.register(t, Arc::new(KnowledgeExecutor));
        }
        for t in [
            NodeType::DatabaseInsert,
            NodeType::DatabaseUpdate,
            NodeType::DatabaseQuery,
            NodeType::DatabaseDelete,
            NodeType::DatabaseCustomSQL,
        ] {
            registry.register(t, Arc::new(DatabaseExecutor));
        }
        for t in [
            NodeType::CreateConversation,
            NodeType::ConversationUpdate,
            NodeType::ConversationDelete,
            NodeType::ConversationList,
            NodeType::ConversationHistory,
            NodeType::ClearConversationHistory,
            NodeType::CreateMessage,
            NodeType::EditMessage,
            NodeType::DeleteMessage,
            NodeType::MessageList,
        ] {
            registry.register(t, Arc::new(ConversationExecutor));
        }
        registry
    }

    pub fn register(&mut self, node_type: NodeType, executor: Arc<dyn NodeExecutor>) {
        self.executors.insert(node_type, executor);
    }

    pub fn get(&self, node_type: NodeType) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(&node_type).cloned()
    }
}

/// `{{name}}` / `{{name.path}}` substitution against resolved values.
pub fn render_template(template: &str, values: &HashMap<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let expr = after[..end].trim();
        let mut parts = expr.split('.');
        let head = parts.next().unwrap_or_default();
        let mut current = values.get(head).cloned().unwrap_or(Value::Null);
        for segment in parts {
            current = current.get(segment).cloned().unwrap_or(Value::Null);
        }
        out.push_str(&value_to_text(&current));
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

struct EntryExecutor;

#[async_trait]
impl NodeExecutor for EntryExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        _input: NodeInput,
        ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let defaults = match &node.configs {
            NodeConfig::Entry(c) => Some(&c.default_values),
            _ => None,
        };
        let mut values = HashMap::new();
        for name in node.output_types.keys() {
            if let Some(value) = ctx.caller_inputs.get(name) {
                values.insert(name.clone(), value.clone());
            } else if let Some(default) = defaults.and_then(|d| d.get(name)) {
                values.insert(name.clone(), default.clone());
            }
        }
        Ok(NodeOutput::from_values(values))
    }
}

struct ExitExecutor;

#[async_trait]
impl NodeExecutor for ExitExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let NodeConfig::Exit(config) = &node.configs else {
            return Err(NodeError::InvalidConfig("exit node without exit config".into()));
        };
        match config.terminate_plan {
            TerminatePlan::ReturnVariables => Ok(NodeOutput::from_values(input.values)),
            TerminatePlan::UseAnswerContent => {
                let answer =
                    emit_answer(config.content_template.as_deref(), input, ctx).await?;
                let mut values = HashMap::new();
                values.insert("output".to_string(), Value::String(answer));
                Ok(NodeOutput::from_values(values))
            }
        }
    }
}

struct EmitterExecutor;

#[async_trait]
impl NodeExecutor for EmitterExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let template = match &node.configs {
            NodeConfig::Emitter(c) => c.content_template.clone(),
            _ => None,
        };
        let answer = emit_answer(template.as_deref(), input, ctx).await?;
        let mut values = HashMap::new();
        values.insert("output".to_string(), Value::String(answer));
        Ok(NodeOutput::from_values(values))
    }
}

/// Drain incoming streams (or render the template) while forwarding chunks
/// to the caller's answer channel.
async fn emit_answer(
    template: Option<&str>,
    mut input: NodeInput,
    ctx: &ExecutionContext,
) -> NodeResult<String> {
    if !input.streams.is_empty() {
        let mut full = String::new();
        for (_, mut reader) in input.streams.drain() {
            while let Some(chunk) = reader.next().await {
                if let Some(tx) = &ctx.answer_tx {
                    let _ = tx.send(chunk.clone()).await;
                }
                full.push_str(&chunk);
            }
        }
        return Ok(full);
    }

    let rendered = match template {
        Some(template) => render_template(template, &input.values),
        None => input
            .values
            .get("content")
            .or_else(|| input.values.get("output"))
            .map(value_to_text)
            .unwrap_or_default(),
    };
    if let Some(tx) = &ctx.answer_tx {
        let _ = tx.send(rendered.clone()).await;
    }
    Ok(rendered)
}

struct SelectorExecutor;

#[async_trait]
impl NodeExecutor for SelectorExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        _ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let NodeConfig::Selector(config) = &node.configs else {
            return Err(NodeError::InvalidConfig("selector node without config".into()));
        };
        let port = match select_branch(config, &input.values) {
            Some(idx) => branch_port(idx),
            None => PORT_DEFAULT.to_string(),
        };
        Ok(NodeOutput { chosen_port: Some(port), ..Default::default() })
    }
}

struct SignalExecutor(ControlSignal);

#[async_trait]
impl NodeExecutor for SignalExecutor {
    async fn execute(
        &self,
        _node: &NodeSchema,
        _input: NodeInput,
        _ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        Ok(NodeOutput { signal: Some(self.0), ..Default::default() })
    }
}

struct JsonSerializationExecutor;

#[async_trait]
impl NodeExecutor for JsonSerializationExecutor {
    async fn execute(
        &self,
        _node: &NodeSchema,
        input: NodeInput,
        _ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let value = input
            .values
            .get("input")
            .or_else(|| input.values.values().next())
            .cloned()
            .unwrap_or(Value::Null);
        let text = serde_json::to_string(&value)
            .map_err(|e| NodeError::Other(format!("serialize: {e}")))?;
        let mut values = HashMap::new();
        values.insert("output".to_string(), Value::String(text));
        Ok(NodeOutput::from_values(values))
    }
}

struct JsonDeserializationExecutor;

#[async_trait]
impl NodeExecutor for JsonDeserializationExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        _ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let text = input
            .values
            .get("input")
            .or_else(|| input.values.values().next())
            .and_then(|v| v.as_str())
            .ok_or_else(|| NodeError::MissingInput("input".to_string()))?;
        let parsed: Value = serde_json::from_str(text)
            .map_err(|e| NodeError::Other(format!("deserialize: {e}")))?;

        let mut values = HashMap::new();
        for name in node.output_types.keys() {
            values.insert(name.clone(), parsed.get(name).cloned().unwrap_or(Value::Null));
        }
        if values.is_empty() {
            values.insert("output".to_string(), parsed);
        }
        Ok(NodeOutput::from_values(values))
    }
}

struct TextProcessorExecutor;

#[async_trait]
impl NodeExecutor for TextProcessorExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        _ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let NodeConfig::TextProcessor(config) = &node.configs else {
            return Err(NodeError::InvalidConfig("text node without config".into()));
        };
        let mut values = HashMap::new();
        match config.method {
            TextProcessingMethod::Concat => {
                let template = config.template.clone().unwrap_or_default();
                values.insert(
                    "output".to_string(),
                    Value::String(render_template(&template, &input.values)),
                );
            }
            TextProcessingMethod::Split => {
                let text = input
                    .values
                    .values()
                    .next()
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let mut pieces = vec![text];
                for separator in &config.separators {
                    pieces = pieces
                        .iter()
                        .flat_map(|p| p.split(separator.as_str()).map(str::to_string))
                        .collect();
                }
                values.insert(
                    "output".to_string(),
                    Value::Array(pieces.into_iter().map(Value::String).collect()),
                );
            }
        }
        Ok(NodeOutput::from_values(values))
    }
}

struct VariableAssignerExecutor;

#[async_trait]
impl NodeExecutor for VariableAssignerExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        _ctx: &ExecutionContext,
        store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let targets = match &node.configs {
            NodeConfig::VariableAssigner(c) | NodeConfig::VariableAssignerWithinLoop(c) => {
                &c.targets
            }
            _ => return Err(NodeError::InvalidConfig("assigner node without config".into())),
        };
        for (idx, target) in targets.iter().enumerate() {
            let value = input
                .values
                .get(&format!("assign_{idx}"))
                .cloned()
                .unwrap_or(Value::Null);
            let (node_key, path) = target
                .split_first()
                .ok_or_else(|| NodeError::InvalidConfig("empty assignment target".into()))?;
            store.set_field(node_key, path, value);
        }
        Ok(NodeOutput::default())
    }
}

struct VariableAggregatorExecutor;

#[async_trait]
impl NodeExecutor for VariableAggregatorExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        _ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let NodeConfig::VariableAggregator(config) = &node.configs else {
            return Err(NodeError::InvalidConfig("aggregator node without config".into()));
        };
        let mut values = HashMap::new();
        for group in &config.groups {
            // first non-null member wins
            let mut idx = 0;
            let winner = loop {
                let key = format!("{group}_{idx}");
                if !node.input_types.contains_key(&key) {
                    break Value::Null;
                }
                match input.values.get(&key) {
                    Some(v) if !v.is_null() => break v.clone(),
                    _ => idx += 1,
                }
            };
            values.insert(group.clone(), winner);
        }
        Ok(NodeOutput::from_values(values))
    }
}

struct InputReceiverExecutor;

#[async_trait]
impl NodeExecutor for InputReceiverExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        _input: NodeInput,
        ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let provided = ctx
            .provided_inputs
            .get(&node.key)
            .ok_or_else(|| NodeError::AwaitingInput(node.key.clone()))?;
        let mut values = HashMap::new();
        if let Value::Object(map) = provided {
            for (k, v) in map {
                values.insert(k.clone(), v.clone());
            }
        }
        Ok(NodeOutput::from_values(values))
    }
}

struct QuestionAnswerExecutor;

#[async_trait]
impl NodeExecutor for QuestionAnswerExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let NodeConfig::QuestionAnswer(config) = &node.configs else {
            return Err(NodeError::InvalidConfig("question node without config".into()));
        };

        // surface the question through the answer channel before waiting
        if let Some(tx) = &ctx.answer_tx {
            let _ = tx.send(render_template(&config.question, &input.values)).await;
        }

        let answer = ctx
            .provided_inputs
            .get(&node.key)
            .ok_or_else(|| NodeError::AwaitingInput(node.key.clone()))?;
        let answer_text = match answer {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let mut values = HashMap::new();
        match config.answer_type {
            QaAnswerType::Text => {
                values.insert("USER_RESPONSE".to_string(), Value::String(answer_text));
                Ok(NodeOutput::from_values(values))
            }
            QaAnswerType::Option => {
                let matched = config.options.iter().position(|o| o == &answer_text);
                let port = match matched {
                    Some(idx) => {
                        values.insert("optionId".to_string(), Value::from(idx as i64));
                        values
                            .insert("optionContent".to_string(), Value::String(answer_text));
                        branch_port(idx)
                    }
                    None => PORT_DEFAULT.to_string(),
                };
                Ok(NodeOutput {
                    values,
                    chosen_port: Some(port),
                    ..Default::default()
                })
            }
        }
    }
}

struct LlmExecutor;

impl LlmExecutor {
    fn chat_params(model: &LlmModelParams) -> ChatModelParams {
        ChatModelParams {
            model_name: model.model_name.clone(),
            model_type: model.model_type,
            temperature: model.temperature,
            top_p: model.top_p,
            max_tokens: model.max_tokens,
        }
    }
}

#[async_trait]
impl NodeExecutor for LlmExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let NodeConfig::Llm(config) = &node.configs else {
            return Err(NodeError::InvalidConfig("llm node without config".into()));
        };
        let factory = ctx
            .services
            .llm
            .as_ref()
            .ok_or_else(|| NodeError::ExternalCall("no llm factory configured".into()))?;

        // retries run against the backup params when the node carries them
        let mut model_params = Self::chat_params(&config.model);
        if input.attempt > 0 {
            if let Some(backup_raw) =
                node.exception_configs.as_ref().and_then(|e| e.backup_llm_param.as_ref())
            {
                if let Ok(backup) = serde_json::from_str::<Value>(backup_raw) {
                    if let Some(name) = backup.get("modelName").and_then(Value::as_str) {
                        model_params.model_name = name.to_string();
                    }
                    if let Some(t) = backup.get("modelType").and_then(Value::as_i64) {
                        model_params.model_type = t;
                    }
                }
            }
        }

        let model = factory.build(&model_params)?;

        let mut messages = Vec::new();
        if !config.model.system_prompt.is_empty() {
            messages.push(ChatMessage::system(render_template(
                &config.model.system_prompt,
                &input.values,
            )));
        }
        messages.push(ChatMessage::user(render_template(&config.prompt, &input.values)));

        // stream and accumulate; chunks are buffered for a downstream
        // consumer that attaches after this node completes
        let (writer, reader) = stream_channel();
        let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(super::stream::STREAM_CAPACITY);

        let model_for_stream = Arc::clone(&model);
        let messages_clone = messages.clone();
        let producer = tokio::spawn(async move {
            model_for_stream.stream(&messages_clone, tx).await
        });

        let mut full = String::new();
        let mut forwarding = true;
        while let Some(chunk) = rx.recv().await {
            full.push_str(&chunk);
            if forwarding && !writer.send(chunk).await {
                forwarding = false;
            }
        }
        drop(writer);

        producer
            .await
            .map_err(|e| NodeError::Other(format!("stream task: {e}")))??;

        let mut values = HashMap::new();
        let out_field = node
            .output_types
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| "output".to_string());
        values.insert(out_field.clone(), Value::String(full));

        let mut output = NodeOutput::from_values(values);
        output.streams.insert(out_field, reader);
        Ok(output)
    }
}

struct IntentDetectorExecutor;

#[async_trait]
impl NodeExecutor for IntentDetectorExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let NodeConfig::IntentDetector(config) = &node.configs else {
            return Err(NodeError::InvalidConfig("intent node without config".into()));
        };
        let factory = ctx
            .services
            .llm
            .as_ref()
            .ok_or_else(|| NodeError::ExternalCall("no llm factory configured".into()))?;
        let model = factory.build(&ChatModelParams {
            model_name: config.model.model_name.clone(),
            model_type: config.model.model_type,
            temperature: config.model.temperature,
            top_p: config.model.top_p,
            max_tokens: config.model.max_tokens,
        })?;

        let query = input
            .values
            .values()
            .next()
            .map(value_to_text)
            .unwrap_or_default();
        let prompt = format!(
            "Classify the query into one of these intents: {}.\nQuery: {query}\nReply with the intent name only.",
            config.intents.join(", ")
        );
        let reply = model.generate(&[ChatMessage::user(prompt)]).await?;
        let reply = reply.trim();

        let matched = config.intents.iter().position(|i| i.eq_ignore_ascii_case(reply));
        let mut values = HashMap::new();
        let port = match matched {
            Some(idx) => {
                values.insert("classificationId".to_string(), Value::from(idx as i64));
                branch_port(idx)
            }
            None => {
                values.insert("classificationId".to_string(), Value::from(-1));
                PORT_DEFAULT.to_string()
            }
        };
        Ok(NodeOutput { values, chosen_port: Some(port), ..Default::default() })
    }
}

struct HttpExecutor;

#[async_trait]
impl NodeExecutor for HttpExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let NodeConfig::HttpRequester(config) = &node.configs else {
            return Err(NodeError::InvalidConfig("http node without config".into()));
        };
        let client = ctx
            .services
            .http
            .as_ref()
            .ok_or_else(|| NodeError::ExternalCall("no http client configured".into()))?;

        let url = render_template(&config.url, &input.values);
        let timeout = std::time::Duration::from_secs(config.timeout_secs.max(1) as u64);
        let (status, body) =
            client.request(&config.method, &url, &HashMap::new(), None, timeout).await?;

        let mut values = HashMap::new();
        values.insert("statusCode".to_string(), Value::from(status));
        values.insert("body".to_string(), Value::String(body));
        values.insert("headers".to_string(), Value::String(String::new()));
        Ok(NodeOutput::from_values(values))
    }
}

struct PluginExecutor;

#[async_trait]
impl NodeExecutor for PluginExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let NodeConfig::Plugin(config) = &node.configs else {
            return Err(NodeError::InvalidConfig("plugin node without config".into()));
        };
        let plugin = ctx
            .services
            .plugin
            .as_ref()
            .ok_or_else(|| NodeError::ExternalCall("no plugin service configured".into()))?;

        let args = Value::Object(input.values.into_iter().collect::<Map<String, Value>>());
        let result = plugin.invoke_tool(config.plugin_id, config.tool_id, &args).await?;

        let mut values = HashMap::new();
        values.insert("output".to_string(), result);
        Ok(NodeOutput::from_values(values))
    }
}

/// Code execution requires a sandbox, which is a collaborator concern; the
/// built-in executor echoes its inputs so pure-engine tests can run.
struct CodeExecutor;

#[async_trait]
impl NodeExecutor for CodeExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        _ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let mut values = HashMap::new();
        for name in node.output_types.keys() {
            values.insert(
                name.clone(),
                input.values.get(name).cloned().unwrap_or(Value::Null),
            );
        }
        Ok(NodeOutput::from_values(values))
    }
}

struct KnowledgeExecutor;

#[async_trait]
impl NodeExecutor for KnowledgeExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let NodeConfig::Knowledge(config) = &node.configs else {
            return Err(NodeError::InvalidConfig("knowledge node without config".into()));
        };
        let service = ctx
            .services
            .knowledge
            .as_ref()
            .ok_or_else(|| NodeError::ExternalCall("no knowledge service configured".into()))?;

        let mut values = HashMap::new();
        match config.op {
            crate::schema::configs::KnowledgeOp::Retrieve => {
                let query = input
                    .values
                    .get("Query")
                    .or_else(|| input.values.values().next())
                    .map(value_to_text)
                    .unwrap_or_default();
                let chunks = service.retrieve(&config.knowledge_ids, &query).await?;
                let list = chunks
                    .into_iter()
                    .map(|c| {
                        serde_json::json!({
                            "documentId": c.document_id,
                            "output": c.content,
                            "score": c.score,
                        })
                    })
                    .collect();
                values.insert("outputList".to_string(), Value::Array(list));
            }
            crate::schema::configs::KnowledgeOp::Index => {
                let knowledge_id = config.knowledge_ids.first().copied().unwrap_or_default();
                let document = input
                    .values
                    .values()
                    .next()
                    .map(value_to_text)
                    .unwrap_or_default();
                let document_id = service
                    .index_document(knowledge_id, &document, config.strategy.as_ref())
                    .await?;
                values.insert("documentId".to_string(), Value::String(document_id));
            }
            crate::schema::configs::KnowledgeOp::Delete => {
                let knowledge_id = config.knowledge_ids.first().copied().unwrap_or_default();
                let document_id = input
                    .values
                    .values()
                    .next()
                    .map(value_to_text)
                    .unwrap_or_default();
                service.delete_document(knowledge_id, &document_id).await?;
                values.insert("isSuccess".to_string(), Value::Bool(true));
            }
        }
        Ok(NodeOutput::from_values(values))
    }
}

struct DatabaseExecutor;

#[async_trait]
impl NodeExecutor for DatabaseExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let NodeConfig::Database(config) = &node.configs else {
            return Err(NodeError::InvalidConfig("database node without config".into()));
        };
        let service = ctx
            .services
            .database
            .as_ref()
            .ok_or_else(|| NodeError::ExternalCall("no database service configured".into()))?;

        let mut params = config.params.clone().unwrap_or(Value::Null);
        if let Value::Object(map) = &mut params {
            map.insert(
                "inputs".to_string(),
                Value::Object(input.values.into_iter().collect::<Map<String, Value>>()),
            );
        }
        let result = service.execute(config.database_id, config.op, &config.sql, &params).await?;

        let mut values = HashMap::new();
        match result {
            Value::Array(rows) => {
                values.insert("rowNum".to_string(), Value::from(rows.len() as i64));
                values.insert("outputList".to_string(), Value::Array(rows));
            }
            other => {
                values.insert("outputList".to_string(), other);
                values.insert("rowNum".to_string(), Value::from(0));
            }
        }
        Ok(NodeOutput::from_values(values))
    }
}

struct ConversationExecutor;

#[async_trait]
impl NodeExecutor for ConversationExecutor {
    async fn execute(
        &self,
        node: &NodeSchema,
        input: NodeInput,
        ctx: &ExecutionContext,
        _store: &VariableStore,
    ) -> NodeResult<NodeOutput> {
        let NodeConfig::Conversation(config) = &node.configs else {
            return Err(NodeError::InvalidConfig("conversation node without config".into()));
        };
        let service = ctx.services.conversation.as_ref().ok_or_else(|| {
            NodeError::ExternalCall("no conversation service configured".into())
        })?;

        let args = Value::Object(input.values.into_iter().collect::<Map<String, Value>>());
        let result = service.execute(config.op, &args).await?;

        let mut values = HashMap::new();
        match result {
            Value::Array(items) => {
                values.insert("outputList".to_string(), Value::Array(items));
            }
            Value::Bool(ok) => {
                values.insert("isSuccess".to_string(), Value::Bool(ok));
            }
            other => {
                values.insert("output".to_string(), other);
            }
        }
        Ok(NodeOutput::from_values(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_template() {
        let mut values = HashMap::new();
        values.insert("name".to_string(), json!("ada"));
        values.insert("usage".to_string(), json!({"tokens": 3}));
        assert_eq!(render_template("hi {{name}}", &values), "hi ada");
        assert_eq!(render_template("t={{usage.tokens}}", &values), "t=3");
        assert_eq!(render_template("{{missing}}!", &values), "!");
        assert_eq!(render_template("no vars", &values), "no vars");
        assert_eq!(render_template("open {{brace", &values), "open {{brace");
    }

    #[test]
    fn test_registry_covers_every_runtime_type() {
        let registry = ExecutorRegistry::with_builtins();
        for meta in crate::canvas::NodeTypeMeta::all() {
            let t = meta.node_type;
            // composites, sub-workflows and comments are scheduler concerns
            if matches!(
                t,
                NodeType::Loop | NodeType::Batch | NodeType::SubWorkflow | NodeType::Comment
            ) {
                continue;
            }
            assert!(registry.get(t).is_some(), "no executor for {t}");
        }
    }
}
