//! Typed, per-node-type configuration values.
//!
//! `configs` on a compiled node is polymorphic in the canvas; here it is a
//! tagged union keyed by node type, each variant carrying the knobs that
//! matter for execution. Anything cosmetic stays behind on the canvas.

use crate::canvas::{
    LoopType, QaAnswerType, QaOptionType, TerminatePlan, TextProcessingMethod,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeConfig {
    Entry(EntryConfig),
    Exit(ExitConfig),
    Emitter(EmitterConfig),
    Selector(SelectorConfig),
    Loop(LoopConfig),
    Batch(BatchConfig),
    Break,
    Continue,
    InputReceiver(InputReceiverConfig),
    JsonSerialization,
    JsonDeserialization,
    VariableAssigner(VariableAssignerConfig),
    VariableAssignerWithinLoop(VariableAssignerConfig),
    VariableAggregator(VariableAggregatorConfig),
    Plugin(PluginConfig),
    CodeRunner(CodeConfig),
    TextProcessor(TextProcessorConfig),
    SubWorkflow(SubWorkflowConfig),
    IntentDetector(IntentDetectorConfig),
    QuestionAnswer(QuestionAnswerConfig),
    HttpRequester(HttpConfig),
    Llm(LlmConfig),
    Knowledge(KnowledgeConfig),
    Database(DatabaseConfig),
    Conversation(ConversationConfig),
}

impl NodeConfig {
    /// Rounds of chat history this node wants, when history is enabled.
    pub fn chat_history_rounds(&self) -> Option<i64> {
        match self {
            NodeConfig::Llm(c) if c.enable_chat_history => Some(c.chat_history_rounds),
            NodeConfig::IntentDetector(c) if c.enable_chat_history => {
                Some(c.chat_history_rounds)
            }
            _ => None,
        }
    }

    /// Nodes that suspend waiting on the caller must be resumable, so they
    /// force checkpointing for the whole workflow.
    pub fn require_checkpoint(&self) -> bool {
        matches!(
            self,
            NodeConfig::QuestionAnswer(_) | NodeConfig::InputReceiver(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntryConfig {
    /// Defaults applied to missing caller inputs, keyed by field name.
    #[serde(default)]
    pub default_values: std::collections::BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitConfig {
    pub terminate_plan: TerminatePlan,
    /// Answer-mode template rendered against the exit inputs.
    #[serde(default)]
    pub content_template: Option<String>,
    #[serde(default)]
    pub streaming_output: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitterConfig {
    #[serde(default)]
    pub content_template: Option<String>,
    #[serde(default)]
    pub streaming_output: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Branch conditions in declaration order; branch N routes to port
    /// `branch_N`, the fall-through routes to `default`.
    pub branches: Vec<BranchCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchCondition {
    pub logic: ConditionLogic,
    pub clauses: Vec<ConditionClause>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionLogic {
    And,
    Or,
}

/// One comparison. Operands are input field names resolved at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionClause {
    pub operator: ConditionOperator,
    pub left_key: String,
    #[serde(default)]
    pub right_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equal,
    NotEqual,
    LengthGreaterThan,
    LengthGreaterThanEqual,
    LengthLessThan,
    LengthLessThanEqual,
    Contain,
    NotContain,
    Empty,
    NotEmpty,
    True,
    False,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    pub loop_type: LoopType,
    /// Iteration count for `count` loops; `array` iterates the bound lists,
    /// `infinite` runs until a Break fires or the execution deadline hits.
    #[serde(default)]
    pub count: Option<i64>,
    /// Loop-local variable names, mutated by VariableAssignerWithinLoop.
    #[serde(default)]
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub batch_size: i64,
    pub concurrent_size: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputReceiverConfig {
    #[serde(default)]
    pub output_schema: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VariableAssignerConfig {
    /// Assignment targets: paths into the variable scope, matched
    /// positionally with the node's input sources.
    pub targets: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VariableAggregatorConfig {
    /// Merge group names in declaration order; each group yields the first
    /// non-null of its member inputs.
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub plugin_id: i64,
    pub tool_id: i64,
    #[serde(default)]
    pub plugin_version: String,
    #[serde(default)]
    pub tool_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeConfig {
    pub code: String,
    pub language: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextProcessorConfig {
    pub method: TextProcessingMethod,
    /// Concat template, for `concat`.
    #[serde(default)]
    pub template: Option<String>,
    /// Separators, for `split`.
    #[serde(default)]
    pub separators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubWorkflowConfig {
    pub workflow_id: i64,
    /// Empty means the draft is referenced.
    #[serde(default)]
    pub workflow_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentDetectorConfig {
    pub intents: Vec<String>,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub model: LlmModelParams,
    #[serde(default)]
    pub enable_chat_history: bool,
    #[serde(default)]
    pub chat_history_rounds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnswerConfig {
    pub question: String,
    pub answer_type: QaAnswerType,
    #[serde(default)]
    pub option_type: Option<QaOptionType>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub extract_output: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub body_type: String,
    #[serde(default)]
    pub timeout_secs: i64,
    #[serde(default)]
    pub retry_times: i64,
    #[serde(default)]
    pub auth_open: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LlmModelParams {
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub model_type: i64,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub response_format: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: LlmModelParams,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub enable_chat_history: bool,
    #[serde(default)]
    pub chat_history_rounds: i64,
    /// Workflows exposed to the model as function-call tools.
    #[serde(default)]
    pub workflow_tools: Vec<ToolWorkflowRef>,
    #[serde(default)]
    pub plugin_tools: Vec<ToolPluginRef>,
    #[serde(default)]
    pub knowledge_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolWorkflowRef {
    pub workflow_id: i64,
    #[serde(default)]
    pub workflow_version: String,
    #[serde(default)]
    pub is_draft: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPluginRef {
    pub plugin_id: i64,
    pub tool_id: i64,
    #[serde(default)]
    pub plugin_version: String,
    #[serde(default)]
    pub is_draft: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeOp {
    Retrieve,
    Index,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    pub op: KnowledgeOp,
    pub knowledge_ids: Vec<i64>,
    /// Parsing/chunking/indexing strategy, opaque to the engine.
    #[serde(default)]
    pub strategy: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseOp {
    Insert,
    Update,
    Query,
    Delete,
    CustomSql,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub op: DatabaseOp,
    pub database_id: i64,
    #[serde(default)]
    pub sql: String,
    /// Operation parameters (condition/field lists), opaque to the engine.
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationOp {
    Create,
    Update,
    Delete,
    List,
    History,
    ClearHistory,
    CreateMessage,
    EditMessage,
    DeleteMessage,
    MessageList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationConfig {
    pub op: ConversationOp,
}
