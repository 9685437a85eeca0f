//! Compiled node, connection and branch definitions.

use super::configs::NodeConfig;
use super::type_info::TypeInfo;
use super::workflow_schema::WorkflowSchema;
use crate::canvas::{ErrorProcessType, NodeType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A compiled node: typed IO, configuration, exception and stream policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSchema {
    /// Opaque public key, stable across canvas edits.
    pub key: String,
    pub node_type: NodeType,
    pub name: String,

    #[serde(default)]
    pub input_types: BTreeMap<String, TypeInfo>,
    #[serde(default)]
    pub input_sources: Vec<FieldInfo>,
    #[serde(default)]
    pub output_types: BTreeMap<String, TypeInfo>,
    #[serde(default)]
    pub output_sources: Vec<FieldInfo>,

    pub configs: NodeConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_configs: Option<ExceptionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_configs: Option<StreamConfig>,

    /// Identity of the referenced workflow, on sub-workflow nodes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_workflow_basic: Option<SubWorkflowBasic>,
    /// The referenced workflow compiled in place, on sub-workflow nodes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_workflow_schema: Option<Box<WorkflowSchema>>,
}

impl NodeSchema {
    /// Execution equivalence: logical fields only. Cosmetic meta (the
    /// display name), stream flags, and the embedded sub-schema body are
    /// excluded. Used for test-run inheritance.
    pub fn execution_equal(&self, other: &NodeSchema) -> bool {
        self.configs == other.configs
            && self.input_types == other.input_types
            && self.input_sources == other.input_sources
            && self.output_types == other.output_types
            && self.output_sources == other.output_sources
            && self.exception_configs == other.exception_configs
            && self.sub_workflow_basic == other.sub_workflow_basic
    }

    pub fn can_generate_stream(&self) -> bool {
        self.stream_configs.as_ref().map(|s| s.can_generate_stream).unwrap_or(false)
    }

    pub fn requires_streaming_input(&self) -> bool {
        self.stream_configs
            .as_ref()
            .map(|s| s.requires_streaming_input)
            .unwrap_or(false)
    }
}

/// Where one field of a node's IO gets its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Field path within this node's input (or output) object.
    pub path: Vec<String>,
    pub source: FieldSource,
}

impl FieldInfo {
    pub fn literal(path: Vec<String>, value: Value) -> FieldInfo {
        FieldInfo { path, source: FieldSource::Literal { value } }
    }

    pub fn reference(path: Vec<String>, from_node: &str, from_path: Vec<String>) -> FieldInfo {
        FieldInfo {
            path,
            source: FieldSource::Ref { from_node: from_node.to_string(), from_path },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// A constant value authored on the canvas.
    Literal { value: Value },
    /// A reference to another node's output field.
    Ref { from_node: String, from_path: Vec<String> },
    /// A reference to an app/system/user global variable.
    Global { scope: GlobalVarScope, path: Vec<String> },
}

impl FieldSource {
    pub fn ref_node(&self) -> Option<&str> {
        match self {
            FieldSource::Ref { from_node, .. } => Some(from_node),
            _ => None,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, FieldSource::Global { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalVarScope {
    App,
    System,
    User,
}

/// Per-node exception policy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExceptionConfig {
    /// Budget in milliseconds shared by the first attempt and all retries.
    /// 0 = no node-level timeout.
    pub timeout_ms: i64,
    /// Immediate re-attempts after a failure.
    pub max_retry: i64,
    /// JSON substituted as output when the process type is
    /// [`ErrorProcessType::ReturnDefaultData`].
    #[serde(default)]
    pub data_on_err: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_type: Option<ErrorProcessType>,
    /// LLM nodes only: serialized backup model params for retry attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_llm_param: Option<String>,
}

/// Streaming capabilities advertised by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamConfig {
    pub can_generate_stream: bool,
    pub requires_streaming_input: bool,
}

/// Identity of a referenced sub-workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubWorkflowBasic {
    pub workflow_id: i64,
    /// Empty string references the draft.
    #[serde(default)]
    pub workflow_version: String,
}

/// A directed execution dependency between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from_node: String,
    pub to_node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_port: Option<String>,
}

impl Connection {
    pub fn new(from: &str, to: &str) -> Connection {
        Connection { from_node: from.to_string(), to_node: to.to_string(), from_port: None }
    }

    pub fn with_port(from: &str, to: &str, port: &str) -> Connection {
        Connection {
            from_node: from.to_string(),
            to_node: to.to_string(),
            from_port: Some(port.to_string()),
        }
    }

    /// Canonical identity string, used for set comparison.
    pub fn id(&self) -> String {
        match &self.from_port {
            Some(port) => format!("{}:{}:{}", self.from_node, self.to_node, port),
            None => format!("{}:{}", self.from_node, self.to_node),
        }
    }
}

/// Outgoing branch table of a selector-like node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BranchSchema {
    /// Normalized outgoing port names (`branch_0`, …, `default`).
    pub ports: BTreeSet<String>,
}

impl BranchSchema {
    pub fn from_ports<I: IntoIterator<Item = String>>(ports: I) -> BranchSchema {
        BranchSchema { ports: ports.into_iter().collect() }
    }

    pub fn has_port(&self, port: &str) -> bool {
        self.ports.contains(port)
    }
}
