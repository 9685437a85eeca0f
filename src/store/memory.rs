//! In-memory repository backend.
//!
//! The default backend for tests and embedded use. Mutations take one write
//! lock, which gives `create_version` its all-or-nothing behavior.

use super::repository::{IdGenerator, Repository};
use super::{
    ChatFlowRole, ConnectorBinding, ConvRelatedInfo, DraftInfo, MetaCreate, MetaQuery,
    MetaUpdate, VersionInfo, WorkflowMeta,
};
use crate::error::{WorkflowError, WorkflowResult};
use crate::refs::{ReferenceEdge, ReferringBizType};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

/// Monotonic in-process id generator.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicI64,
}

impl SequentialIdGenerator {
    pub fn starting_at(start: i64) -> SequentialIdGenerator {
        SequentialIdGenerator { next: AtomicI64::new(start) }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::starting_at(7_000_001)
    }
}

#[async_trait]
impl IdGenerator for SequentialIdGenerator {
    async fn gen_id(&self) -> WorkflowResult<i64> {
        Ok(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Default)]
struct Tables {
    metas: HashMap<i64, WorkflowMeta>,
    drafts: HashMap<i64, DraftInfo>,
    versions: HashMap<i64, Vec<VersionInfo>>,
    references: HashSet<ReferenceEdge>,
    bindings: Vec<ConnectorBinding>,
    roles: Vec<ChatFlowRole>,
    conv_info: HashMap<i64, ConvRelatedInfo>,
    next_role_id: i64,
}

/// In-memory [`Repository`].
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    ids: SequentialIdGenerator,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> InMemoryRepository {
        InMemoryRepository {
            tables: RwLock::new(Tables { next_role_id: 1, ..Default::default() }),
            ids: SequentialIdGenerator::default(),
        }
    }

    fn live_meta(tables: &Tables, id: i64) -> WorkflowResult<&WorkflowMeta> {
        tables
            .metas
            .get(&id)
            .filter(|m| m.deleted_at.is_none())
            .ok_or(WorkflowError::WorkflowNotFound { id, version: None })
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_meta(&self, meta: &MetaCreate) -> WorkflowResult<i64> {
        let id = self.ids.gen_id().await?;
        let now = Utc::now();
        let row = WorkflowMeta {
            id,
            space_id: meta.space_id,
            app_id: meta.app_id,
            name: meta.name.clone(),
            desc: meta.desc.clone(),
            icon_uri: meta.icon_uri.clone(),
            mode: meta.mode,
            creator_id: meta.creator_id,
            latest_published_version: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.tables.write().metas.insert(id, row);
        Ok(id)
    }

    async fn get_meta(&self, id: i64) -> WorkflowResult<WorkflowMeta> {
        let tables = self.tables.read();
        Self::live_meta(&tables, id).cloned()
    }

    async fn update_meta(&self, id: i64, update: &MetaUpdate) -> WorkflowResult<()> {
        let mut tables = self.tables.write();
        let meta = tables
            .metas
            .get_mut(&id)
            .filter(|m| m.deleted_at.is_none())
            .ok_or(WorkflowError::WorkflowNotFound { id, version: None })?;
        if let Some(name) = &update.name {
            meta.name = name.clone();
        }
        if let Some(desc) = &update.desc {
            meta.desc = desc.clone();
        }
        if let Some(icon) = &update.icon_uri {
            meta.icon_uri = icon.clone();
        }
        if let Some(mode) = update.mode {
            meta.mode = mode;
        }
        meta.updated_at = Utc::now();
        Ok(())
    }

    async fn mget_metas(
        &self,
        query: &MetaQuery,
    ) -> WorkflowResult<(HashMap<i64, WorkflowMeta>, i64)> {
        let tables = self.tables.read();
        let mut matched: Vec<&WorkflowMeta> = tables
            .metas
            .values()
            .filter(|m| m.deleted_at.is_none())
            .filter(|m| query.ids.is_empty() || query.ids.contains(&m.id))
            .filter(|m| query.space_id.map(|s| m.space_id == s).unwrap_or(true))
            .filter(|m| query.app_id.map(|a| m.app_id == Some(a)).unwrap_or(true))
            .filter(|m| {
                query.name.as_ref().map(|n| m.name.contains(n.as_str())).unwrap_or(true)
            })
            .collect();
        matched.sort_by_key(|m| m.id);
        let total = matched.len() as i64;

        let page = match query.page {
            Some((offset, limit)) => {
                matched.into_iter().skip(offset).take(limit).collect::<Vec<_>>()
            }
            None => matched,
        };
        Ok((page.into_iter().map(|m| (m.id, m.clone())).collect(), total))
    }

    async fn create_or_update_draft(&self, id: i64, draft: DraftInfo) -> WorkflowResult<()> {
        let mut tables = self.tables.write();
        Self::live_meta(&tables, id)?;
        tables.drafts.insert(id, draft);
        Ok(())
    }

    async fn draft(&self, id: i64) -> WorkflowResult<Option<DraftInfo>> {
        let tables = self.tables.read();
        Self::live_meta(&tables, id)?;
        Ok(tables.drafts.get(&id).cloned())
    }

    async fn drafts_by_app(
        &self,
        app_id: i64,
    ) -> WorkflowResult<(HashMap<i64, DraftInfo>, HashMap<i64, String>)> {
        let tables = self.tables.read();
        let mut drafts = HashMap::new();
        let mut names = HashMap::new();
        for meta in tables.metas.values() {
            if meta.deleted_at.is_some() || meta.app_id != Some(app_id) {
                continue;
            }
            if let Some(draft) = tables.drafts.get(&meta.id) {
                drafts.insert(meta.id, draft.clone());
                names.insert(meta.id, meta.name.clone());
            }
        }
        Ok((drafts, names))
    }

    async fn get_version(&self, id: i64, version: &str) -> WorkflowResult<Option<VersionInfo>> {
        let tables = self.tables.read();
        Self::live_meta(&tables, id)?;
        Ok(tables
            .versions
            .get(&id)
            .and_then(|vs| vs.iter().find(|v| v.version == version))
            .cloned())
    }

    async fn latest_version(&self, id: i64) -> WorkflowResult<Option<VersionInfo>> {
        let tables = self.tables.read();
        let meta = Self::live_meta(&tables, id)?;
        let Some(latest) = &meta.latest_published_version else {
            return Ok(None);
        };
        Ok(tables
            .versions
            .get(&id)
            .and_then(|vs| vs.iter().find(|v| &v.version == latest))
            .cloned())
    }

    async fn create_version(
        &self,
        id: i64,
        version: VersionInfo,
        refs: HashSet<ReferenceEdge>,
    ) -> WorkflowResult<()> {
        let mut tables = self.tables.write();
        Self::live_meta(&tables, id)?;

        let rows = tables.versions.entry(id).or_default();
        if rows.iter().any(|v| v.version == version.version) {
            return Err(WorkflowError::OperationFail(format!(
                "version {} already exists for workflow {id}",
                version.version
            )));
        }
        let version_string = version.version.clone();
        rows.push(version);

        // replace this workflow's outgoing edges atomically with the insert
        tables.references.retain(|e| e.referring_id != id);
        tables.references.extend(refs);

        if let Some(meta) = tables.metas.get_mut(&id) {
            meta.latest_published_version = Some(version_string);
            meta.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> WorkflowResult<()> {
        self.mdelete(&[id]).await
    }

    async fn mdelete(&self, ids: &[i64]) -> WorkflowResult<()> {
        let mut tables = self.tables.write();
        let now = Utc::now();
        for id in ids {
            if let Some(meta) = tables.metas.get_mut(id) {
                meta.deleted_at = Some(now);
            }
            tables.references.retain(|e| e.referring_id != *id);
        }
        Ok(())
    }

    async fn references_to(
        &self,
        referred_ids: &[i64],
        biz_type: ReferringBizType,
    ) -> WorkflowResult<Vec<ReferenceEdge>> {
        let tables = self.tables.read();
        Ok(tables
            .references
            .iter()
            .filter(|e| referred_ids.contains(&e.referred_id) && e.referring_biz_type == biz_type)
            .cloned()
            .collect())
    }

    async fn references_from(&self, referring_id: i64) -> WorkflowResult<Vec<ReferenceEdge>> {
        let tables = self.tables.read();
        Ok(tables.references.iter().filter(|e| e.referring_id == referring_id).cloned().collect())
    }

    async fn bind_connector_versions(
        &self,
        app_id: i64,
        connector_id: i64,
        workflow_ids: &[i64],
        version: &str,
    ) -> WorkflowResult<()> {
        let mut tables = self.tables.write();
        for workflow_id in workflow_ids {
            tables.bindings.push(ConnectorBinding {
                app_id,
                connector_id,
                workflow_id: *workflow_id,
                version: version.to_string(),
            });
        }
        Ok(())
    }

    async fn connector_bindings(
        &self,
        connector_id: i64,
        workflow_id: i64,
        limit: usize,
    ) -> WorkflowResult<Vec<ConnectorBinding>> {
        let tables = self.tables.read();
        Ok(tables
            .bindings
            .iter()
            .rev()
            .filter(|b| b.connector_id == connector_id && b.workflow_id == workflow_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_role(&self, mut role: ChatFlowRole) -> WorkflowResult<i64> {
        let mut tables = self.tables.write();
        let id = tables.next_role_id;
        tables.next_role_id += 1;
        role.id = id;
        tables.roles.push(role);
        Ok(id)
    }

    async fn update_role(&self, workflow_id: i64, role: ChatFlowRole) -> WorkflowResult<()> {
        let mut tables = self.tables.write();
        let existing = tables
            .roles
            .iter_mut()
            .find(|r| r.workflow_id == workflow_id && r.version.is_empty())
            .ok_or(WorkflowError::WorkflowNotFound { id: workflow_id, version: None })?;
        let id = existing.id;
        *existing = ChatFlowRole { id, ..role };
        Ok(())
    }

    async fn get_role(
        &self,
        workflow_id: i64,
        version: &str,
    ) -> WorkflowResult<Option<ChatFlowRole>> {
        let tables = self.tables.read();
        Ok(tables
            .roles
            .iter()
            .rev()
            .find(|r| r.workflow_id == workflow_id && r.version == version)
            .cloned())
    }

    async fn delete_role(&self, id: i64, workflow_id: i64) -> WorkflowResult<()> {
        let mut tables = self.tables.write();
        tables.roles.retain(|r| !(r.id == id && r.workflow_id == workflow_id));
        Ok(())
    }

    async fn bind_conv_related_info(
        &self,
        conv_id: i64,
        info: ConvRelatedInfo,
    ) -> WorkflowResult<()> {
        self.tables.write().conv_info.insert(conv_id, info);
        Ok(())
    }

    async fn get_conv_related_info(
        &self,
        conv_id: i64,
    ) -> WorkflowResult<Option<ConvRelatedInfo>> {
        Ok(self.tables.read().conv_info.get(&conv_id).cloned())
    }

    async fn gen_id(&self) -> WorkflowResult<i64> {
        self.ids.gen_id().await
    }

    async fn gen_multi_ids(&self, n: usize) -> WorkflowResult<Vec<i64>> {
        self.ids.gen_multi_ids(n).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WorkflowMode;

    fn meta_create(name: &str) -> MetaCreate {
        MetaCreate {
            space_id: 1,
            app_id: None,
            name: name.to_string(),
            desc: String::new(),
            icon_uri: String::new(),
            mode: WorkflowMode::Workflow,
            creator_id: 100,
            init_canvas: None,
        }
    }

    fn version(v: &str) -> VersionInfo {
        VersionInfo {
            version: v.to_string(),
            description: String::new(),
            canvas: "{}".to_string(),
            input_params: String::new(),
            output_params: String::new(),
            commit_id: "c1".to_string(),
            creator_id: 100,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_meta() {
        let repo = InMemoryRepository::new();
        let id = repo.create_meta(&meta_create("hello")).await.unwrap();
        let meta = repo.get_meta(id).await.unwrap();
        assert_eq!(meta.name, "hello");
        assert!(meta.latest_published_version.is_none());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_meta() {
        let repo = InMemoryRepository::new();
        let id = repo.create_meta(&meta_create("gone")).await.unwrap();
        repo.delete(id).await.unwrap();
        assert!(matches!(
            repo.get_meta(id).await,
            Err(WorkflowError::WorkflowNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_version_updates_latest_and_refs() {
        let repo = InMemoryRepository::new();
        let id = repo.create_meta(&meta_create("wf")).await.unwrap();

        let mut refs = HashSet::new();
        refs.insert(ReferenceEdge {
            referring_id: id,
            referred_id: 42,
            refer_type: crate::refs::ReferType::SubWorkflow,
            referring_biz_type: ReferringBizType::Workflow,
        });
        repo.create_version(id, version("v0.0.1"), refs).await.unwrap();

        let meta = repo.get_meta(id).await.unwrap();
        assert_eq!(meta.latest_published_version.as_deref(), Some("v0.0.1"));
        assert_eq!(repo.references_from(id).await.unwrap().len(), 1);

        // publishing again replaces edges wholesale
        repo.create_version(id, version("v0.0.2"), HashSet::new()).await.unwrap();
        assert!(repo.references_from(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_version_rejected() {
        let repo = InMemoryRepository::new();
        let id = repo.create_meta(&meta_create("wf")).await.unwrap();
        repo.create_version(id, version("v0.0.1"), HashSet::new()).await.unwrap();
        assert!(repo.create_version(id, version("v0.0.1"), HashSet::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_mget_metas_paging() {
        let repo = InMemoryRepository::new();
        for i in 0..5 {
            repo.create_meta(&meta_create(&format!("wf{i}"))).await.unwrap();
        }
        let (page, total) = repo
            .mget_metas(&MetaQuery { page: Some((1, 2)), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
    }

    #[tokio::test]
    async fn test_role_draft_and_versioned() {
        let repo = InMemoryRepository::new();
        let role = ChatFlowRole {
            id: 0,
            workflow_id: 9,
            creator_id: 1,
            name: "helper".to_string(),
            description: String::new(),
            avatar_uri: String::new(),
            onboarding_info: None,
            suggested_replies: vec![],
            audio_config: None,
            user_input_config: None,
            version: String::new(),
        };
        repo.create_role(role.clone()).await.unwrap();
        repo.create_role(ChatFlowRole { version: "v0.0.1".to_string(), ..role }).await.unwrap();

        assert!(repo.get_role(9, "").await.unwrap().is_some());
        assert!(repo.get_role(9, "v0.0.1").await.unwrap().is_some());
        assert!(repo.get_role(9, "v0.0.2").await.unwrap().is_none());
    }
}
