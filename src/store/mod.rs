//! Draft/version store: row types, query policies, and the repository
//! contract with its in-memory backend.

pub mod memory;
pub mod repository;
pub mod version;

pub use memory::InMemoryRepository;
pub use repository::{IdGenerator, Repository};
pub use version::{check_version_increment, is_incremental, parse_version};

use crate::schema::TypeInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Workflow execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    Workflow,
    ChatFlow,
}

/// Persistent workflow identity and display data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMeta {
    pub id: i64,
    pub space_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub icon_uri: String,
    pub mode: WorkflowMode,
    pub creator_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_published_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields supplied when creating a workflow.
#[derive(Debug, Clone)]
pub struct MetaCreate {
    pub space_id: i64,
    pub app_id: Option<i64>,
    pub name: String,
    pub desc: String,
    pub icon_uri: String,
    pub mode: WorkflowMode,
    pub creator_id: i64,
    /// Canvas JSON to seed the draft with; the mode's default template when
    /// absent.
    pub init_canvas: Option<String>,
}

/// Partial meta update.
#[derive(Debug, Clone, Default)]
pub struct MetaUpdate {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub icon_uri: Option<String>,
    pub mode: Option<WorkflowMode>,
}

/// One extracted IO parameter of a workflow (entry outputs / exit inputs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedParam {
    pub name: String,
    #[serde(rename = "type")]
    pub type_info: TypeInfo,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Current editable state of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftInfo {
    pub canvas: String,
    #[serde(default)]
    pub input_params: String,
    #[serde(default)]
    pub output_params: String,
    /// Monotonic snapshot token; changes on every save.
    pub commit_id: String,
    pub test_run_success: bool,
    pub modified: bool,
    pub updated_at: DateTime<Utc>,
}

/// Immutable publish record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub canvas: String,
    #[serde(default)]
    pub input_params: String,
    #[serde(default)]
    pub output_params: String,
    pub commit_id: String,
    pub creator_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Staged-rollout mapping of a published version to a delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorBinding {
    pub app_id: i64,
    pub connector_id: i64,
    pub workflow_id: i64,
    pub version: String,
}

/// Optional per-workflow chat persona, drafted and versioned like the
/// workflow itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatFlowRole {
    #[serde(default)]
    pub id: i64,
    pub workflow_id: i64,
    pub creator_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_info: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_replies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input_config: Option<serde_json::Value>,
    /// Empty = draft role; set when published alongside a version.
    #[serde(default)]
    pub version: String,
}

/// Binding between a conversation and the workflow serving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvRelatedInfo {
    pub workflow_id: i64,
    pub connector_id: i64,
    #[serde(default)]
    pub version: String,
}

/// Which stored state of a workflow a read refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryType {
    #[default]
    Draft,
    SpecificVersion,
    LatestVersion,
}

/// Single-workflow read policy.
#[derive(Debug, Clone, Default)]
pub struct GetPolicy {
    pub id: i64,
    pub query_type: QueryType,
    pub version: Option<String>,
    pub meta_only: bool,
}

/// Meta filter for list reads.
#[derive(Debug, Clone, Default)]
pub struct MetaQuery {
    pub ids: Vec<i64>,
    pub space_id: Option<i64>,
    pub app_id: Option<i64>,
    pub name: Option<String>,
    /// (offset, limit)
    pub page: Option<(usize, usize)>,
}

/// Multi-workflow read policy.
#[derive(Debug, Clone, Default)]
pub struct MGetPolicy {
    pub query: MetaQuery,
    pub query_type: QueryType,
    pub meta_only: bool,
    /// Required for [`QueryType::SpecificVersion`]: id → version.
    pub versions: HashMap<i64, String>,
}

/// Delete policy: one id, an id list, or everything under an app.
#[derive(Debug, Clone, Default)]
pub struct DeletePolicy {
    pub id: Option<i64>,
    pub ids: Vec<i64>,
    pub app_id: Option<i64>,
}

/// Publish policy.
#[derive(Debug, Clone)]
pub struct PublishPolicy {
    pub id: i64,
    pub version: String,
    pub description: String,
    pub creator_id: i64,
    /// Publish a specific draft commit; the current draft when absent.
    pub commit_id: Option<String>,
    /// Skip the test-run gate.
    pub force: bool,
}

/// Copy policy.
#[derive(Debug, Clone, Default)]
pub struct CopyWorkflowPolicy {
    pub target_app_id: Option<i64>,
    /// Replacement canvas (references already rewritten by the caller).
    pub modified_canvas: Option<String>,
}

/// A workflow read result: meta plus the canvas state the policy selected.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub id: i64,
    pub meta: WorkflowMeta,
    pub commit_id: String,
    pub canvas: String,
    pub input_params: Vec<NamedParam>,
    pub output_params: Vec<NamedParam>,
    /// Set when the read was version-based.
    pub version: Option<String>,
}

impl Workflow {
    pub fn version_str(&self) -> &str {
        self.version.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_param_serde() {
        let p = NamedParam {
            name: "input".to_string(),
            type_info: TypeInfo::String,
            required: true,
            description: String::new(),
        };
        let json = serde_json::to_string(&vec![p]).unwrap();
        let back: Vec<NamedParam> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[0].name, "input");
        assert!(back[0].required);
    }
}
