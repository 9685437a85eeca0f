//! The repository contract the workflow service runs against.

use super::{
    ChatFlowRole, ConnectorBinding, ConvRelatedInfo, DraftInfo, MetaCreate, MetaQuery,
    MetaUpdate, VersionInfo, WorkflowMeta,
};
use crate::error::WorkflowResult;
use crate::refs::{ReferenceEdge, ReferringBizType};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Monotonic 64-bit id source.
#[async_trait]
pub trait IdGenerator: Send + Sync {
    async fn gen_id(&self) -> WorkflowResult<i64>;

    async fn gen_multi_ids(&self, n: usize) -> WorkflowResult<Vec<i64>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.gen_id().await?);
        }
        Ok(out)
    }
}

/// Storage for workflow metas, drafts, versions, reference edges, connector
/// bindings, chat roles and conversation bindings.
///
/// `create_version` is transactional: the version row, the replacement of
/// the workflow's reference edges, and the meta's latest-published-version
/// update commit together or not at all.
#[async_trait]
pub trait Repository: Send + Sync {
    // meta
    async fn create_meta(&self, meta: &MetaCreate) -> WorkflowResult<i64>;
    async fn get_meta(&self, id: i64) -> WorkflowResult<WorkflowMeta>;
    async fn update_meta(&self, id: i64, update: &MetaUpdate) -> WorkflowResult<()>;
    async fn mget_metas(
        &self,
        query: &MetaQuery,
    ) -> WorkflowResult<(HashMap<i64, WorkflowMeta>, i64)>;

    // draft
    async fn create_or_update_draft(&self, id: i64, draft: DraftInfo) -> WorkflowResult<()>;
    async fn draft(&self, id: i64) -> WorkflowResult<Option<DraftInfo>>;
    /// All drafts of an app, plus an id → name map for error reporting.
    async fn drafts_by_app(
        &self,
        app_id: i64,
    ) -> WorkflowResult<(HashMap<i64, DraftInfo>, HashMap<i64, String>)>;

    // versions
    async fn get_version(&self, id: i64, version: &str) -> WorkflowResult<Option<VersionInfo>>;
    async fn latest_version(&self, id: i64) -> WorkflowResult<Option<VersionInfo>>;
    async fn create_version(
        &self,
        id: i64,
        version: VersionInfo,
        refs: HashSet<ReferenceEdge>,
    ) -> WorkflowResult<()>;

    // delete (soft)
    async fn delete(&self, id: i64) -> WorkflowResult<()>;
    async fn mdelete(&self, ids: &[i64]) -> WorkflowResult<()>;

    // reference edges
    async fn references_to(
        &self,
        referred_ids: &[i64],
        biz_type: ReferringBizType,
    ) -> WorkflowResult<Vec<ReferenceEdge>>;
    async fn references_from(&self, referring_id: i64) -> WorkflowResult<Vec<ReferenceEdge>>;

    // connector bindings
    async fn bind_connector_versions(
        &self,
        app_id: i64,
        connector_id: i64,
        workflow_ids: &[i64],
        version: &str,
    ) -> WorkflowResult<()>;
    async fn connector_bindings(
        &self,
        connector_id: i64,
        workflow_id: i64,
        limit: usize,
    ) -> WorkflowResult<Vec<ConnectorBinding>>;

    // chatflow roles
    async fn create_role(&self, role: ChatFlowRole) -> WorkflowResult<i64>;
    async fn update_role(&self, workflow_id: i64, role: ChatFlowRole) -> WorkflowResult<()>;
    /// Draft role when `version` is empty.
    async fn get_role(&self, workflow_id: i64, version: &str)
        -> WorkflowResult<Option<ChatFlowRole>>;
    async fn delete_role(&self, id: i64, workflow_id: i64) -> WorkflowResult<()>;

    // conversation bindings
    async fn bind_conv_related_info(
        &self,
        conv_id: i64,
        info: ConvRelatedInfo,
    ) -> WorkflowResult<()>;
    async fn get_conv_related_info(
        &self,
        conv_id: i64,
    ) -> WorkflowResult<Option<ConvRelatedInfo>>;

    // ids
    async fn gen_id(&self) -> WorkflowResult<i64>;
    async fn gen_multi_ids(&self, n: usize) -> WorkflowResult<Vec<i64>>;
}
