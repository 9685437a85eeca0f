//! The workflow domain service: lifecycle operations over the repository,
//! the canvas compiler, and the validator.

mod copy;

pub use copy::{CopyToLibraryResult, ReleaseConfig};

use crate::canvas::{
    default_init_canvas, default_init_canvas_chat, Canvas, NodeType, NodeTypeMeta, Variable,
    VariableType, CONVERSATION_NAME_KEY, USER_INPUT_KEY,
};
use crate::compiler::{compile_with_registry, SubCanvasStore, WorkflowIdentity};
use crate::error::{WorkflowError, WorkflowResult};
use crate::infra::{
    CacheStore, EventBus, InMemoryCache, NoopEventBus, ObjectStorage, ResourceEvent,
};
use crate::nodes::AdaptorRegistry;
use crate::refs::{canvas_to_refs, collect_workflow_identities};
use crate::schema::{FieldInfo, NodeSchema, TypeInfo, WorkflowSchema};
use crate::store::{
    check_version_increment, ChatFlowRole, ConvRelatedInfo, DeletePolicy, DraftInfo, GetPolicy,
    MGetPolicy, MetaCreate, MetaQuery, MetaUpdate, NamedParam, PublishPolicy, QueryType,
    Repository, VersionInfo, Workflow, WorkflowMode,
};
use crate::validate::{
    check_canvas, validate_schema, CheckResult, CheckType, ValidateIssue, ValidateTreeInfo,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Per-node properties surfaced to the editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeProperty {
    pub node_type: String,
    pub is_enable_user_query: bool,
    pub is_enable_chat_history: bool,
    pub is_ref_global_variable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_workflow: Option<HashMap<String, NodeProperty>>,
}

/// Tree-validation request.
#[derive(Debug, Clone)]
pub struct ValidateTreeConfig {
    pub canvas: String,
    pub app_id: Option<i64>,
}

/// The workflow domain service. Collaborators are injected; the adaptor
/// registry defaults to the built-in set.
pub struct WorkflowService {
    pub(crate) repo: Arc<dyn Repository>,
    pub(crate) adaptors: Arc<AdaptorRegistry>,
    pub(crate) events: Arc<dyn EventBus>,
    pub(crate) cache: Arc<dyn CacheStore>,
    pub(crate) storage: Option<Arc<dyn ObjectStorage>>,
}

impl WorkflowService {
    pub fn new(repo: Arc<dyn Repository>) -> WorkflowService {
        WorkflowService {
            repo,
            adaptors: Arc::new(AdaptorRegistry::with_builtins()),
            events: Arc::new(NoopEventBus),
            cache: Arc::new(InMemoryCache::default()),
            storage: None,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventBus>) -> WorkflowService {
        self.events = events;
        self
    }

    pub fn with_adaptors(mut self, adaptors: Arc<AdaptorRegistry>) -> WorkflowService {
        self.adaptors = adaptors;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> WorkflowService {
        self.cache = cache;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn ObjectStorage>) -> WorkflowService {
        self.storage = Some(storage);
        self
    }

    /// Node metadata grouped by category, optionally filtered by type.
    pub fn list_node_meta(
        &self,
        type_filter: Option<&HashSet<NodeType>>,
    ) -> (HashMap<&'static str, Vec<&'static NodeTypeMeta>>, Vec<&'static str>) {
        let mut grouped: HashMap<&'static str, Vec<&'static NodeTypeMeta>> = HashMap::new();
        for meta in NodeTypeMeta::all() {
            if meta.disabled {
                continue;
            }
            if let Some(filter) = type_filter {
                if !filter.is_empty() && !filter.contains(&meta.node_type) {
                    continue;
                }
            }
            grouped.entry(meta.category).or_default().push(meta);
        }
        (grouped, NodeTypeMeta::categories())
    }

    /// Create a workflow: meta row plus an initial draft save.
    pub async fn create(&self, meta: MetaCreate) -> WorkflowResult<i64> {
        let init_canvas = meta.init_canvas.clone().unwrap_or_else(|| match meta.mode {
            WorkflowMode::Workflow => default_init_canvas(),
            WorkflowMode::ChatFlow => default_init_canvas_chat("Default"),
        });
        let id = self.repo.create_meta(&meta).await?;
        self.save(id, &init_canvas).await?;
        self.events.publish(ResourceEvent::WorkflowCreated { id });
        Ok(id)
    }

    /// Save a draft: extract IO params best-effort, inherit or reset the
    /// test-run flag, mint a fresh commit id, upsert the draft row.
    pub async fn save(&self, id: i64, canvas_json: &str) -> WorkflowResult<()> {
        let canvas: Canvas = serde_json::from_str(canvas_json)?;

        let (input_params, output_params) = extract_io_params(&canvas);
        let input_params_str = serde_json::to_string(&input_params).unwrap_or_default();
        let output_params_str = serde_json::to_string(&output_params).unwrap_or_default();

        let test_run_success = self.inherit_or_reset(id, &canvas).await?;

        let commit_id = self.repo.gen_id().await?;

        self.repo
            .create_or_update_draft(
                id,
                DraftInfo {
                    canvas: canvas_json.to_string(),
                    input_params: input_params_str,
                    output_params: output_params_str,
                    commit_id: commit_id.to_string(),
                    test_run_success,
                    modified: true,
                    updated_at: Utc::now(),
                },
            )
            .await
    }

    /// The draft keeps its test-run success only when the new canvas
    /// compiles to a schema execution-equivalent to the previous draft's.
    async fn inherit_or_reset(&self, id: i64, canvas: &Canvas) -> WorkflowResult<bool> {
        let new_schema = match self.compile_canvas(canvas).await {
            Ok(schema) => schema,
            Err(_) => return Ok(false),
        };

        let Some(existing) = self.repo.draft(id).await.ok().flatten() else {
            return Ok(false);
        };

        let Ok(existing_canvas) = serde_json::from_str::<Canvas>(&existing.canvas) else {
            return Ok(false);
        };
        let Ok(existing_schema) = self.compile_canvas(&existing_canvas).await else {
            return Ok(false);
        };

        if !existing_schema.is_equal(&new_schema) {
            return Ok(false);
        }
        Ok(existing.test_run_success)
    }

    /// Publish the draft as an immutable version. Atomic with the reference
    /// edge replacement; gated on version monotonicity and the test run.
    pub async fn publish(&self, policy: PublishPolicy) -> WorkflowResult<()> {
        let meta = self.repo.get_meta(policy.id).await?;
        check_version_increment(meta.latest_published_version.as_deref(), &policy.version)?;

        let draft = self
            .repo
            .draft(policy.id)
            .await?
            .ok_or(WorkflowError::WorkflowNotFound { id: policy.id, version: None })?;

        if let Some(commit_id) = &policy.commit_id {
            if &draft.commit_id != commit_id {
                return Err(WorkflowError::OperationFail(format!(
                    "draft commit {} no longer current",
                    commit_id
                )));
            }
        }

        if !policy.force && !draft.test_run_success {
            return Err(WorkflowError::TestRunRequired(policy.id));
        }

        let canvas: Canvas = serde_json::from_str(&draft.canvas)?;
        let refs = canvas_to_refs(policy.id, &canvas)?;

        self.repo
            .create_version(
                policy.id,
                VersionInfo {
                    version: policy.version.clone(),
                    description: policy.description.clone(),
                    canvas: draft.canvas.clone(),
                    input_params: draft.input_params.clone(),
                    output_params: draft.output_params.clone(),
                    commit_id: draft.commit_id.clone(),
                    creator_id: policy.creator_id,
                    created_at: Utc::now(),
                },
                refs,
            )
            .await?;

        self.events.publish(ResourceEvent::WorkflowPublished {
            id: policy.id,
            version: policy.version,
        });
        Ok(())
    }

    /// Delete one workflow, a list, or all of an app's workflows.
    pub async fn delete(&self, policy: DeletePolicy) -> WorkflowResult<Vec<i64>> {
        let mut ids = policy.ids.clone();
        if let Some(id) = policy.id {
            ids.push(id);
        }
        if let Some(app_id) = policy.app_id {
            let (metas, _) = self
                .repo
                .mget_metas(&MetaQuery { app_id: Some(app_id), ..Default::default() })
                .await?;
            ids.extend(metas.keys());
        }
        ids.sort_unstable();
        ids.dedup();

        self.repo.mdelete(&ids).await?;
        self.events.publish(ResourceEvent::WorkflowDeleted { ids: ids.clone() });
        Ok(ids)
    }

    pub async fn get(&self, policy: GetPolicy) -> WorkflowResult<Workflow> {
        let meta = self.repo.get_meta(policy.id).await?;
        if policy.meta_only {
            return Ok(Workflow {
                id: policy.id,
                meta,
                commit_id: String::new(),
                canvas: String::new(),
                input_params: vec![],
                output_params: vec![],
                version: None,
            });
        }

        match policy.query_type {
            QueryType::Draft => {
                let draft = self
                    .repo
                    .draft(policy.id)
                    .await?
                    .ok_or(WorkflowError::WorkflowNotFound { id: policy.id, version: None })?;
                Ok(workflow_from_draft(policy.id, meta, &draft))
            }
            QueryType::SpecificVersion => {
                let version = policy.version.clone().ok_or_else(|| {
                    WorkflowError::InvalidParameter(
                        "version required for version reads".to_string(),
                    )
                })?;
                let info = self.repo.get_version(policy.id, &version).await?.ok_or(
                    WorkflowError::WorkflowNotFound {
                        id: policy.id,
                        version: Some(version.clone()),
                    },
                )?;
                Ok(workflow_from_version(policy.id, meta, &info))
            }
            QueryType::LatestVersion => {
                let info = self.repo.latest_version(policy.id).await?.ok_or(
                    WorkflowError::WorkflowNotFound { id: policy.id, version: None },
                )?;
                Ok(workflow_from_version(policy.id, meta, &info))
            }
        }
    }

    pub async fn mget(&self, policy: MGetPolicy) -> WorkflowResult<(Vec<Workflow>, i64)> {
        let (metas, total) = self.repo.mget_metas(&policy.query).await?;

        if policy.meta_only {
            let mut out: Vec<Workflow> = metas
                .into_iter()
                .map(|(id, meta)| Workflow {
                    id,
                    meta,
                    commit_id: String::new(),
                    canvas: String::new(),
                    input_params: vec![],
                    output_params: vec![],
                    version: None,
                })
                .collect();
            out.sort_by_key(|w| w.id);
            return Ok((out, total));
        }

        let mut out = Vec::new();
        let mut ids: Vec<i64> = metas.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let meta = metas.get(&id).cloned().expect("id from map");
            match policy.query_type {
                QueryType::Draft => {
                    if let Some(draft) = self.repo.draft(id).await? {
                        out.push(workflow_from_draft(id, meta, &draft));
                    }
                }
                QueryType::SpecificVersion => {
                    let version = policy.versions.get(&id).cloned().ok_or_else(|| {
                        WorkflowError::InvalidParameter(format!(
                            "no version supplied for workflow {id}"
                        ))
                    })?;
                    let info = self.repo.get_version(id, &version).await?.ok_or(
                        WorkflowError::WorkflowNotFound { id, version: Some(version) },
                    )?;
                    out.push(workflow_from_version(id, meta, &info));
                }
                QueryType::LatestVersion => {
                    if let Some(info) = self.repo.latest_version(id).await? {
                        out.push(workflow_from_version(id, meta, &info));
                    }
                }
            }
        }
        Ok((out, total))
    }

    /// Workflows referring to this one, as a map id → meta.
    pub async fn get_workflow_reference(
        &self,
        id: i64,
    ) -> WorkflowResult<HashMap<i64, crate::store::WorkflowMeta>> {
        let edges = self
            .repo
            .references_to(&[id], crate::refs::ReferringBizType::Workflow)
            .await?;
        if edges.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<i64> = edges.iter().map(|e| e.referring_id).collect();
        let (metas, _) =
            self.repo.mget_metas(&MetaQuery { ids, ..Default::default() }).await?;
        Ok(metas)
    }

    /// Resolve every canvas the given one references, transitively, reading
    /// drafts or pinned versions from the repository.
    pub(crate) async fn resolve_sub_canvases(
        &self,
        canvas: &Canvas,
    ) -> WorkflowResult<SubCanvasStore> {
        let mut store = SubCanvasStore::new();
        let mut visited: HashSet<WorkflowIdentity> = HashSet::new();
        let mut frontier = collect_workflow_identities(canvas);

        while let Some((id, version)) = frontier.pop() {
            let identity = WorkflowIdentity::from_node_ref(id, &version);
            if !visited.insert(identity.clone()) {
                continue;
            }

            let canvas_json = if identity.version.is_none() {
                self.repo
                    .draft(id)
                    .await?
                    .ok_or(WorkflowError::WorkflowNotFound { id, version: None })?
                    .canvas
            } else {
                self.repo
                    .get_version(id, identity.version.as_deref().unwrap_or(""))
                    .await?
                    .ok_or(WorkflowError::WorkflowNotFound {
                        id,
                        version: identity.version.clone(),
                    })?
                    .canvas
            };

            let sub_canvas: Canvas = serde_json::from_str(&canvas_json)?;
            frontier.extend(collect_workflow_identities(&sub_canvas));
            store.insert(identity, sub_canvas);
        }
        Ok(store)
    }

    /// Compile a canvas with its sub-canvases resolved from the repository.
    pub async fn compile_canvas(&self, canvas: &Canvas) -> WorkflowResult<WorkflowSchema> {
        let sources = self.resolve_sub_canvases(canvas).await?;
        compile_with_registry(canvas, &sources, &self.adaptors)
    }

    /// Compile a workflow's current draft, cached per `(id, commit_id)`.
    /// Saves invalidate implicitly: a new commit id misses the cache.
    pub async fn compiled_draft_schema(&self, id: i64) -> WorkflowResult<WorkflowSchema> {
        let draft = self
            .repo
            .draft(id)
            .await?
            .ok_or(WorkflowError::WorkflowNotFound { id, version: None })?;

        let cache_key = format!("wf_schema:{id}:{}", draft.commit_id);
        if let Some(bytes) = self.cache.get(&cache_key) {
            if let Ok(schema) = serde_json::from_slice::<WorkflowSchema>(&bytes) {
                return Ok(schema);
            }
        }

        let canvas: Canvas = serde_json::from_str(&draft.canvas)?;
        let mut schema = self.compile_canvas(&canvas).await?;
        schema.init();
        if let Ok(bytes) = serde_json::to_vec(&schema) {
            self.cache.set(&cache_key, bytes, Some(std::time::Duration::from_secs(600)));
        }
        Ok(schema)
    }

    /// Store an icon asset and return its stable key.
    pub async fn upload_icon(&self, key: &str, bytes: Vec<u8>) -> WorkflowResult<String> {
        let storage = self.storage.as_ref().ok_or_else(|| {
            WorkflowError::OperationFail("no object storage configured".to_string())
        })?;
        storage.put_object(key, bytes).await?;
        Ok(key.to_string())
    }

    /// Resolve a workflow's icon URI to a serving URL.
    pub async fn icon_url(&self, id: i64) -> WorkflowResult<Option<String>> {
        let meta = self.repo.get_meta(id).await?;
        if meta.icon_uri.is_empty() {
            return Ok(None);
        }
        match &self.storage {
            Some(storage) => Ok(Some(storage.get_url(&meta.icon_uri).await?)),
            None => Ok(Some(meta.icon_uri)),
        }
    }

    /// Validate a canvas and every draft sub-workflow it references,
    /// aggregating findings per workflow. A cycle in the sub-workflow
    /// closure is an operation error, not a finding.
    pub async fn validate_tree(
        &self,
        id: i64,
        config: ValidateTreeConfig,
    ) -> WorkflowResult<Vec<ValidateTreeInfo>> {
        let canvas: Canvas = serde_json::from_str(&config.canvas)?;
        let mut infos = Vec::new();

        let issues = self.validate_one(&canvas).await?;
        if !issues.is_empty() {
            infos.push(ValidateTreeInfo { workflow_id: id, name: String::new(), issues });
        }

        // draft sub-workflows are validated along with the root
        let mut seen = HashSet::new();
        for (sub_id, version) in collect_workflow_identities(&canvas) {
            if !version.is_empty() || !seen.insert(sub_id) {
                continue;
            }
            let Some(draft) = self.repo.draft(sub_id).await? else { continue };
            let sub_canvas: Canvas = serde_json::from_str(&draft.canvas)?;
            let issues = self.validate_one(&sub_canvas).await?;
            if !issues.is_empty() {
                let name =
                    self.repo.get_meta(sub_id).await.map(|m| m.name).unwrap_or_default();
                infos.push(ValidateTreeInfo { workflow_id: sub_id, name, issues });
            }
        }
        Ok(infos)
    }

    pub(crate) async fn validate_one(
        &self,
        canvas: &Canvas,
    ) -> WorkflowResult<Vec<ValidateIssue>> {
        match self.compile_canvas(canvas).await {
            Ok(schema) => Ok(validate_schema(&schema)),
            Err(err @ WorkflowError::ReferenceCycle { .. }) => Err(err),
            Err(err) => Ok(vec![ValidateIssue::error(None, err.to_string())]),
        }
    }

    /// Per-node properties of the draft canvas, recursing into
    /// sub-workflows.
    pub async fn query_node_properties(
        &self,
        id: i64,
    ) -> WorkflowResult<HashMap<String, NodeProperty>> {
        let schema = self.compiled_draft_schema(id).await?;
        Ok(node_properties_of(&schema))
    }

    /// Plugin/knowledge/database ids the draft depends on, following draft
    /// sub-workflows and draft workflow tools.
    pub async fn get_workflow_dependence_resource(
        &self,
        id: i64,
    ) -> WorkflowResult<crate::refs::DependenceResource> {
        let draft = self
            .repo
            .draft(id)
            .await?
            .ok_or(WorkflowError::WorkflowNotFound { id, version: None })?;
        let canvas: Canvas = serde_json::from_str(&draft.canvas)?;

        let mut total = crate::refs::DependenceResource::default();
        let mut visited: HashSet<i64> = HashSet::new();
        let mut frontier = vec![canvas];
        while let Some(canvas) = frontier.pop() {
            let ds = crate::refs::collect_dependence(&canvas)?;
            total.plugin_ids.extend(ds.plugin_ids);
            total.knowledge_ids.extend(ds.knowledge_ids);
            total.database_ids.extend(ds.database_ids);

            for (sub_id, version) in collect_workflow_identities(&canvas) {
                if !version.is_empty() || !visited.insert(sub_id) {
                    continue;
                }
                if let Some(draft) = self.repo.draft(sub_id).await? {
                    frontier.push(serde_json::from_str(&draft.canvas)?);
                }
            }
        }
        Ok(total)
    }

    /// Capability checks over a workflow and its sub-workflow tree, with
    /// `(id, version)` cycle protection.
    pub async fn workflow_schema_check(
        &self,
        workflow: &Workflow,
        checks: &[CheckType],
    ) -> WorkflowResult<Vec<CheckResult>> {
        let canvas: Canvas = serde_json::from_str(&workflow.canvas)?;
        let mut results = Vec::with_capacity(checks.len());

        for check in checks {
            let mut visited: HashSet<(i64, String)> = HashSet::new();
            visited.insert((workflow.id, workflow.version_str().to_string()));

            let mut failure: Option<String> = None;
            let mut frontier = vec![canvas.clone()];
            while let Some(current) = frontier.pop() {
                let issues = check_canvas(&current, *check);
                if let Some(issue) = issues.first() {
                    failure = Some(issue.message.clone());
                    break;
                }
                for (sub_id, version) in collect_workflow_identities(&current) {
                    if !visited.insert((sub_id, version.clone())) {
                        continue;
                    }
                    let sub_canvas_json = if version.is_empty() {
                        self.repo.draft(sub_id).await?.map(|d| d.canvas)
                    } else {
                        self.repo.get_version(sub_id, &version).await?.map(|v| v.canvas)
                    };
                    if let Some(json) = sub_canvas_json {
                        frontier.push(serde_json::from_str(&json)?);
                    }
                }
            }

            results.push(CheckResult {
                check: *check,
                is_pass: failure.is_none(),
                reason: failure.unwrap_or_default(),
            });
        }
        Ok(results)
    }

    /// Update meta; switching a workflow into chat mode retrofits the entry
    /// node with the chat input slots.
    pub async fn update_meta(&self, id: i64, update: MetaUpdate) -> WorkflowResult<()> {
        self.repo.update_meta(id, &update).await?;
        if update.mode == Some(WorkflowMode::ChatFlow) {
            self.adapt_to_chatflow(id).await?;
        }
        Ok(())
    }

    /// Ensure the entry node exposes `USER_INPUT` and `CONVERSATION_NAME`,
    /// appending and re-saving when absent.
    pub(crate) async fn adapt_to_chatflow(&self, id: i64) -> WorkflowResult<()> {
        let draft = self
            .repo
            .draft(id)
            .await?
            .ok_or(WorkflowError::WorkflowNotFound { id, version: None })?;
        let mut canvas: Canvas = serde_json::from_str(&draft.canvas)?;

        let entry = canvas
            .nodes
            .iter_mut()
            .find(|n| NodeType::from_id_str(&n.node_type) == Some(NodeType::Entry))
            .ok_or_else(|| {
                WorkflowError::InvalidParameter("can not find start node".to_string())
            })?;

        let mut existing = HashSet::new();
        for output in &entry.data.outputs {
            if let Ok(v) = Variable::parse(output) {
                existing.insert(v.name);
            }
        }

        let mut changed = false;
        if !existing.contains(USER_INPUT_KEY) {
            entry.data.outputs.push(serde_json::to_value(Variable {
                name: USER_INPUT_KEY.to_string(),
                var_type: VariableType::String,
                required: true,
                ..Default::default()
            })?);
            changed = true;
        }
        if !existing.contains(CONVERSATION_NAME_KEY) {
            entry.data.outputs.push(serde_json::to_value(Variable {
                name: CONVERSATION_NAME_KEY.to_string(),
                var_type: VariableType::String,
                default_value: Some(serde_json::json!("Default")),
                ..Default::default()
            })?);
            changed = true;
        }

        if changed {
            let canvas_json = serde_json::to_string(&canvas)?;
            self.save(id, &canvas_json).await?;
        }
        Ok(())
    }

    // chatflow roles

    pub async fn create_chatflow_role(&self, role: ChatFlowRole) -> WorkflowResult<i64> {
        self.repo.create_role(role).await
    }

    pub async fn update_chatflow_role(
        &self,
        workflow_id: i64,
        role: ChatFlowRole,
    ) -> WorkflowResult<()> {
        self.repo.update_role(workflow_id, role).await
    }

    pub async fn get_chatflow_role(
        &self,
        workflow_id: i64,
        version: &str,
    ) -> WorkflowResult<Option<ChatFlowRole>> {
        let role = self.repo.get_role(workflow_id, version).await?;
        if role.is_none() {
            // the GET may legitimately race the role's creation
            tracing::warn!(workflow_id, version, "chat flow role not found");
        }
        Ok(role)
    }

    pub async fn delete_chatflow_role(&self, id: i64, workflow_id: i64) -> WorkflowResult<()> {
        self.repo.delete_role(id, workflow_id).await
    }

    /// Snapshot the draft role under a published version.
    pub async fn publish_chatflow_role(
        &self,
        workflow_id: i64,
        creator_id: i64,
        version: &str,
    ) -> WorkflowResult<()> {
        if workflow_id == 0 || creator_id == 0 || version.is_empty() {
            return Err(WorkflowError::InvalidParameter(
                "workflow id, creator id and version are all required".to_string(),
            ));
        }
        let meta = self.repo.get_meta(workflow_id).await?;
        if meta.mode != WorkflowMode::ChatFlow {
            return Err(WorkflowError::OperationFail(format!(
                "workflow {workflow_id} is not a chat flow"
            )));
        }
        let draft_role = self.repo.get_role(workflow_id, "").await?.ok_or_else(|| {
            WorkflowError::OperationFail(format!(
                "workflow {workflow_id} has no draft chat flow role"
            ))
        })?;
        self.repo
            .create_role(ChatFlowRole {
                id: 0,
                creator_id,
                version: version.to_string(),
                ..draft_role
            })
            .await?;
        Ok(())
    }

    pub async fn bind_conv_related_info(
        &self,
        conv_id: i64,
        info: ConvRelatedInfo,
    ) -> WorkflowResult<()> {
        self.repo.bind_conv_related_info(conv_id, info).await
    }

    pub async fn get_conv_related_info(
        &self,
        conv_id: i64,
    ) -> WorkflowResult<Option<ConvRelatedInfo>> {
        self.repo.get_conv_related_info(conv_id).await
    }
}

/// Entry outputs become the workflow's input parameters and exit inputs its
/// output parameters. Extraction is best-effort: failures log and yield
/// empty lists, never failing the save.
pub(crate) fn extract_io_params(canvas: &Canvas) -> (Vec<NamedParam>, Vec<NamedParam>) {
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();

    for node in &canvas.nodes {
        match NodeType::from_id_str(&node.node_type) {
            Some(NodeType::Entry) => {
                for raw in &node.data.outputs {
                    match Variable::parse(raw) {
                        Ok(v) => inputs.push(NamedParam {
                            name: v.name.clone(),
                            type_info: TypeInfo::from_variable(&v),
                            required: v.required,
                            description: v.description.clone(),
                        }),
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to extract input param");
                        }
                    }
                }
            }
            Some(NodeType::Exit) => {
                if let Some(node_inputs) = node.data.inputs.as_ref() {
                    for param in &node_inputs.input_parameters {
                        match &param.input {
                            Some(input) => outputs.push(NamedParam {
                                name: param.name.clone(),
                                type_info: TypeInfo::from_block_input(input),
                                required: false,
                                description: String::new(),
                            }),
                            None => {
                                tracing::warn!(name = %param.name, "output param has no input")
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    (inputs, outputs)
}

fn parse_params(raw: &str) -> Vec<NamedParam> {
    if raw.is_empty() {
        return Vec::new();
    }
    serde_json::from_str(raw).unwrap_or_default()
}

fn workflow_from_draft(id: i64, meta: crate::store::WorkflowMeta, draft: &DraftInfo) -> Workflow {
    Workflow {
        id,
        meta,
        commit_id: draft.commit_id.clone(),
        canvas: draft.canvas.clone(),
        input_params: parse_params(&draft.input_params),
        output_params: parse_params(&draft.output_params),
        version: None,
    }
}

fn workflow_from_version(
    id: i64,
    meta: crate::store::WorkflowMeta,
    info: &VersionInfo,
) -> Workflow {
    Workflow {
        id,
        meta,
        commit_id: info.commit_id.clone(),
        canvas: info.canvas.clone(),
        input_params: parse_params(&info.input_params),
        output_params: parse_params(&info.output_params),
        version: Some(info.version.clone()),
    }
}

fn node_properties_of(schema: &WorkflowSchema) -> HashMap<String, NodeProperty> {
    let mut out = HashMap::new();
    for node in &schema.nodes {
        let sub = node
            .sub_workflow_schema
            .as_ref()
            .map(|sub| node_properties_of(sub));
        out.insert(
            node.key.clone(),
            NodeProperty {
                node_type: node.node_type.to_string(),
                is_enable_user_query: is_enable_user_query(node),
                is_enable_chat_history: node.configs.chat_history_rounds().is_some(),
                is_ref_global_variable: refs_global_variable(node),
                sub_workflow: sub,
            },
        );
    }
    out
}

fn is_enable_user_query(node: &NodeSchema) -> bool {
    node.node_type == NodeType::Entry
        && node
            .output_types
            .keys()
            .any(|name| name == USER_INPUT_KEY || name == "BOT_USER_INPUT")
}

fn refs_global_variable(node: &NodeSchema) -> bool {
    let is_global = |fields: &[FieldInfo]| fields.iter().any(|f| f.source.is_global());
    is_global(&node.input_sources) || is_global(&node.output_sources)
}
