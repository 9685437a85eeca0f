//! Canvas data structures, mirroring the front-end JSON spelling.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The authored workflow graph: nodes, edges, and canvas-level version tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Canvas {
    #[serde(default)]
    pub nodes: Vec<CanvasNode>,
    #[serde(default)]
    pub edges: Vec<CanvasEdge>,
    /// Canvas feature-version tags, opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Value>,
}

/// A single node on the canvas. Composite nodes (Loop, Batch) carry their
/// children in `blocks` and their internal wiring in `edges`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanvasNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Front-end metadata (position, size). Opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default)]
    pub data: NodeData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<CanvasNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<CanvasEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A connection drawn between two nodes on the canvas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasEdge {
    #[serde(rename = "sourceNodeID")]
    pub source_node_id: String,
    #[serde(rename = "targetNodeID")]
    pub target_node_id: String,
    #[serde(rename = "sourcePortID", default, skip_serializing_if = "String::is_empty")]
    pub source_port_id: String,
    #[serde(rename = "targetPortID", default, skip_serializing_if = "String::is_empty")]
    pub target_port_id: String,
}

/// Per-node configuration payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(rename = "nodeMeta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<NodeMetaFe>,
    /// Output field declarations. Either plain [`Variable`]s (most nodes) or
    /// [`Param`]s referencing child outputs (composite nodes); kept raw and
    /// parsed on demand.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Inputs>,
}

/// Display metadata rendered by the editor only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeMetaFe {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,
    #[serde(rename = "subTitle", default, skip_serializing_if = "String::is_empty")]
    pub sub_title: String,
}

/// All input configuration a node can carry. Each optional section belongs to
/// one node family; the adaptor for the node's type knows which to read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inputs {
    #[serde(rename = "inputParameters", default, skip_serializing_if = "Vec::is_empty")]
    pub input_parameters: Vec<Param>,

    #[serde(rename = "settingOnError", default, skip_serializing_if = "Option::is_none")]
    pub setting_on_error: Option<SettingOnError>,

    /// Single-node batch mode. Distinct from the Batch composite node type.
    #[serde(rename = "batch", default, skip_serializing_if = "Option::is_none")]
    pub node_batch_info: Option<NodeBatch>,

    #[serde(rename = "chatHistorySetting", default, skip_serializing_if = "Option::is_none")]
    pub chat_history_setting: Option<ChatHistorySetting>,

    /// LLM parameter block; shape varies per node family, parsed by adaptors.
    #[serde(rename = "llmParam", default, skip_serializing_if = "Option::is_none")]
    pub llm_param: Option<Value>,

    // Exit / output emitter
    #[serde(rename = "terminatePlan", default, skip_serializing_if = "Option::is_none")]
    pub terminate_plan: Option<TerminatePlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<BlockInput>,
    #[serde(rename = "streamingOutput", default, skip_serializing_if = "std::ops::Not::not")]
    pub streaming_output: bool,

    // Sub-workflow
    #[serde(rename = "workflowId", default, skip_serializing_if = "String::is_empty")]
    pub workflow_id: String,
    #[serde(rename = "workflowVersion", default, skip_serializing_if = "String::is_empty")]
    pub workflow_version: String,

    // LLM function-call tools
    #[serde(rename = "fcParam", default, skip_serializing_if = "Option::is_none")]
    pub fc_param: Option<FcParam>,

    // Loop
    #[serde(rename = "loopType", default, skip_serializing_if = "Option::is_none")]
    pub loop_type: Option<LoopType>,
    #[serde(rename = "loopCount", default, skip_serializing_if = "Option::is_none")]
    pub loop_count: Option<BlockInput>,
    #[serde(rename = "variableParameters", default, skip_serializing_if = "Vec::is_empty")]
    pub variable_parameters: Vec<Param>,

    // Batch composite
    #[serde(rename = "batchSize", default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<BlockInput>,
    #[serde(rename = "concurrentSize", default, skip_serializing_if = "Option::is_none")]
    pub concurrent_size: Option<BlockInput>,

    // Selector
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<SelectorBranch>,

    // Text processor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<TextProcessingMethod>,
    #[serde(rename = "concatParams", default, skip_serializing_if = "Vec::is_empty")]
    pub concat_params: Vec<Param>,
    #[serde(rename = "splitParams", default, skip_serializing_if = "Vec::is_empty")]
    pub split_params: Vec<Param>,

    // Code runner
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<i64>,

    // HTTP requester
    #[serde(rename = "apiInfo", default, skip_serializing_if = "Option::is_none")]
    pub api_info: Option<ApiInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<HttpBody>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Param>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<HttpAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting: Option<HttpSetting>,

    // Knowledge
    #[serde(rename = "datasetParam", default, skip_serializing_if = "Vec::is_empty")]
    pub dataset_param: Vec<Param>,
    #[serde(rename = "strategyParam", default, skip_serializing_if = "Option::is_none")]
    pub strategy_param: Option<Value>,

    // Database
    #[serde(rename = "databaseInfoList", default, skip_serializing_if = "Vec::is_empty")]
    pub database_info_list: Vec<DatabaseInfo>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sql: String,
    #[serde(rename = "selectParam", default, skip_serializing_if = "Option::is_none")]
    pub select_param: Option<Value>,
    #[serde(rename = "insertParam", default, skip_serializing_if = "Option::is_none")]
    pub insert_param: Option<Value>,
    #[serde(rename = "updateParam", default, skip_serializing_if = "Option::is_none")]
    pub update_param: Option<Value>,
    #[serde(rename = "deleteParam", default, skip_serializing_if = "Option::is_none")]
    pub delete_param: Option<Value>,

    // Plugin
    #[serde(rename = "apiParam", default, skip_serializing_if = "Vec::is_empty")]
    pub api_params: Vec<Param>,

    // Variable aggregator
    #[serde(rename = "mergeGroups", default, skip_serializing_if = "Vec::is_empty")]
    pub merge_groups: Vec<Param>,

    // Question-answer
    #[serde(rename = "answer_type", default, skip_serializing_if = "Option::is_none")]
    pub answer_type: Option<QaAnswerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(rename = "option_type", default, skip_serializing_if = "Option::is_none")]
    pub option_type: Option<QaOptionType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QaOption>,

    // Intent detector
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intents: Vec<Intent>,

    // Input receiver
    #[serde(rename = "outputSchema", default, skip_serializing_if = "String::is_empty")]
    pub output_schema: String,
}

/// One branch of a Selector node: a logic connective over conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorBranch {
    pub condition: SelectorCondition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorCondition {
    pub logic: LogicType,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub operator: OperatorType,
    pub left: Param,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Param>,
}

/// Condition connective. Wire format is numeric: 1 = OR, 2 = AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum LogicType {
    Or,
    And,
}

impl TryFrom<i64> for LogicType {
    type Error = String;
    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(LogicType::Or),
            2 => Ok(LogicType::And),
            other => Err(format!("unknown logic type: {other}")),
        }
    }
}

impl From<LogicType> for i64 {
    fn from(v: LogicType) -> i64 {
        match v {
            LogicType::Or => 1,
            LogicType::And => 2,
        }
    }
}

/// Comparison operator used by Selector conditions. Numeric wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum OperatorType {
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

impl TryFrom<i64> for OperatorType {
    type Error = String;
    fn try_from(v: i64) -> Result<Self, Self::Error> {
        use OperatorType::*;
        Ok(match v {
            1 => Equal,
            2 => NotEqual,
            3 => LengthGreaterThan,
            4 => LengthGreaterThanEqual,
            5 => LengthLessThan,
            6 => LengthLessThanEqual,
            7 => Contain,
            8 => NotContain,
            9 => Empty,
            10 => NotEmpty,
            11 => True,
            12 => False,
            13 => GreaterThan,
            14 => GreaterThanEqual,
            15 => LessThan,
            16 => LessThanEqual,
            other => return Err(format!("unknown operator type: {other}")),
        })
    }
}

impl From<OperatorType> for i64 {
    fn from(v: OperatorType) -> i64 {
        use OperatorType::*;
        match v {
            Equal => 1,
            NotEqual => 2,
            LengthGreaterThan => 3,
            LengthGreaterThanEqual => 4,
            LengthLessThan => 5,
            LengthLessThanEqual => 6,
            Contain => 7,
            NotContain => 8,
            Empty => 9,
            NotEmpty => 10,
            True => 11,
            False => 12,
            GreaterThan => 13,
            GreaterThanEqual => 14,
            LessThan => 15,
            LessThanEqual => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextProcessingMethod {
    Concat,
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QaAnswerType {
    Option,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QaOptionType {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaOption {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiInfo {
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpBody {
    #[serde(rename = "bodyType", default)]
    pub body_type: String,
    #[serde(rename = "bodyData", default, skip_serializing_if = "Option::is_none")]
    pub body_data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpAuth {
    #[serde(rename = "authType", default)]
    pub auth_type: String,
    #[serde(rename = "authData", default, skip_serializing_if = "Option::is_none")]
    pub auth_data: Option<Value>,
    #[serde(rename = "authOpen", default)]
    pub auth_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSetting {
    #[serde(default)]
    pub timeout: i64,
    #[serde(rename = "retryTimes", default)]
    pub retry_times: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseInfo {
    #[serde(rename = "databaseInfoID")]
    pub database_info_id: String,
}

/// Function-call tool configuration on LLM nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FcParam {
    #[serde(rename = "workflowFCParam", default, skip_serializing_if = "Option::is_none")]
    pub workflow_fc_param: Option<WorkflowFcParam>,
    #[serde(rename = "pluginFCParam", default, skip_serializing_if = "Option::is_none")]
    pub plugin_fc_param: Option<PluginFcParam>,
    #[serde(rename = "knowledgeFCParam", default, skip_serializing_if = "Option::is_none")]
    pub knowledge_fc_param: Option<KnowledgeFcParam>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowFcParam {
    #[serde(rename = "workflowList", default)]
    pub workflow_list: Vec<WorkflowToolRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowToolRef {
    pub workflow_id: String,
    #[serde(default)]
    pub workflow_version: String,
    #[serde(default)]
    pub is_draft: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginFcParam {
    #[serde(rename = "pluginList", default)]
    pub plugin_list: Vec<PluginToolRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginToolRef {
    pub plugin_id: String,
    pub api_id: String,
    #[serde(default)]
    pub api_name: String,
    #[serde(default)]
    pub plugin_version: String,
    #[serde(default)]
    pub is_draft: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeFcParam {
    #[serde(rename = "knowledgeList", default)]
    pub knowledge_list: Vec<KnowledgeRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRef {
    pub id: String,
}

/// Single-node batch mode settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeBatch {
    #[serde(rename = "batchEnable", default)]
    pub batch_enable: bool,
    #[serde(rename = "batchSize", default)]
    pub batch_size: i64,
    #[serde(rename = "concurrentSize", default)]
    pub concurrent_size: i64,
    #[serde(rename = "inputLists", default)]
    pub input_lists: Vec<Param>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistorySetting {
    #[serde(rename = "enableChatHistory", default)]
    pub enable_chat_history: bool,
    #[serde(rename = "chatHistoryRound", default)]
    pub chat_history_round: i64,
}

/// A node field with type and source info.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Param {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<BlockInput>,
    /// Left half of an assignment expression (VariableAssigner).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<BlockInput>,
    /// Right half of an assignment expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<BlockInput>,
    /// Grouped fields; only used by VariableAggregator merge groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<BlockInput>,
}

/// An output field declaration: name, type, and nested schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    /// Sub-fields of an object, or the element of a list. Either
    /// `Vec<Variable>` or a single nested `Variable`; kept raw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "defaultValue", default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(rename = "readOnly", default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl Variable {
    /// Parse a raw output declaration (the `outputs` array is heterogeneous).
    pub fn parse(raw: &Value) -> Result<Variable, serde_json::Error> {
        serde_json::from_value(raw.clone())
    }
}

/// Typed input slot: a declared type plus where the value comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockInput {
    #[serde(rename = "type", default)]
    pub var_type: VariableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<BlockInputValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInputValue {
    #[serde(rename = "type")]
    pub value_type: BlockInputValueType,
    /// Either a literal (string/number/…) or a serialized
    /// [`BlockInputReference`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockInputValueType {
    Literal,
    Ref,
    ObjectRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInputReference {
    #[serde(rename = "blockID", default)]
    pub block_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    pub source: RefSourceType,
}

impl BlockInputReference {
    /// Full field path within the referenced node's output.
    pub fn field_path(&self) -> Vec<String> {
        if !self.path.is_empty() {
            self.path.clone()
        } else if !self.name.is_empty() {
            self.name.split('.').map(str::to_string).collect()
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefSourceType {
    #[serde(rename = "block-output")]
    BlockOutput,
    #[serde(rename = "global_variable_app")]
    GlobalApp,
    #[serde(rename = "global_variable_system")]
    GlobalSystem,
    #[serde(rename = "global_variable_user")]
    GlobalUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Object,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminatePlan {
    #[serde(rename = "returnVariables")]
    ReturnVariables,
    #[serde(rename = "useAnswerContent")]
    UseAnswerContent,
}

/// How a node reacts to execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ErrorProcessType {
    /// Propagate the error and abort the workflow.
    Throw,
    /// Substitute the configured `dataOnErr` JSON as the node's output.
    ReturnDefaultData,
    /// Route control flow along the node's exception edge.
    ExceptionBranch,
}

impl TryFrom<i64> for ErrorProcessType {
    type Error = String;
    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(ErrorProcessType::Throw),
            2 => Ok(ErrorProcessType::ReturnDefaultData),
            3 => Ok(ErrorProcessType::ExceptionBranch),
            other => Err(format!("unknown error process type: {other}")),
        }
    }
}

impl From<ErrorProcessType> for i64 {
    fn from(v: ErrorProcessType) -> i64 {
        match v {
            ErrorProcessType::Throw => 1,
            ErrorProcessType::ReturnDefaultData => 2,
            ErrorProcessType::ExceptionBranch => 3,
        }
    }
}

/// Common error-handling settings, enabled per node in the editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingOnError {
    /// JSON result substituted on error when process type is
    /// [`ErrorProcessType::ReturnDefaultData`].
    #[serde(rename = "dataOnErr", default, skip_serializing_if = "String::is_empty")]
    pub data_on_err: String,
    /// Whether any error-handling strategy is active at all.
    #[serde(rename = "switch", default)]
    pub switch_on: bool,
    #[serde(rename = "processType", default, skip_serializing_if = "Option::is_none")]
    pub process_type: Option<ErrorProcessType>,
    /// Retry count; retries run immediately after a failure.
    #[serde(rename = "retryTimes", default)]
    pub retry_times: i64,
    /// Timeout budget in milliseconds shared by the attempt and all retries.
    #[serde(rename = "timeoutMs", default)]
    pub timeout_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<SettingOnErrorExt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingOnErrorExt {
    /// LLM nodes only: serialized backup model params, used during retries.
    #[serde(rename = "backupLLMParam", default, skip_serializing_if = "String::is_empty")]
    pub backup_llm_param: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopType {
    Array,
    Count,
    Infinite,
}

impl Inputs {
    /// Extract the typed reference behind a block input, if it is a `ref`.
    pub fn reference_of(input: &BlockInput) -> Option<BlockInputReference> {
        let value = input.value.as_ref()?;
        if value.value_type != BlockInputValueType::Ref {
            return None;
        }
        serde_json::from_value(value.content.clone()?).ok()
    }
}

/// Inner node id generated when expanding a node in batch mode.
pub fn batch_inner_node_id(key: &str) -> String {
    format!("{key}_inner")
}

/// Convenience map lookup of nodes by id, one canvas level deep.
pub fn node_index(nodes: &[CanvasNode]) -> HashMap<&str, &CanvasNode> {
    let mut map = HashMap::new();
    for node in nodes {
        map.insert(node.id.as_str(), node);
        for child in &node.blocks {
            map.insert(child.id.as_str(), child);
        }
    }
    map
}
