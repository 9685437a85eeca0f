//! Copy, duplicate, release and sync operations across apps and the
//! library.

use super::{ValidateTreeConfig, WorkflowService};
use crate::canvas::Canvas;
use crate::error::{WorkflowError, WorkflowResult};
use crate::refs::{
    canvas_to_refs, collect_workflow_identities, rewrite_external_resources,
    ExternalResourceRelated, IdVersionPair,
};
use crate::store::{
    ChatFlowRole, CopyWorkflowPolicy, DraftInfo, GetPolicy, MetaCreate, MetaQuery, QueryType,
    VersionInfo, Workflow, WorkflowMode,
};
use crate::validate::ValidateTreeInfo;
use chrono::Utc;
use std::collections::{HashMap, HashSet};

/// First version given to workflows that land in the library.
const INITIAL_LIBRARY_VERSION: &str = "v0.0.1";

/// Outcome of a copy-to-library operation.
#[derive(Debug, Default)]
pub struct CopyToLibraryResult {
    /// Source id → copied `(id, version)`. Empty when validation failed.
    pub id_map: HashMap<i64, IdVersionPair>,
    pub copied: Vec<Workflow>,
    pub validate_issues: Vec<ValidateTreeInfo>,
}

/// Release request for all (or selected) workflows of an app.
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    pub version: String,
    pub connector_ids: Vec<i64>,
    /// Empty = every workflow in the app.
    pub workflow_ids: Vec<i64>,
    /// App plugins re-pinned to the released version.
    pub plugin_ids: Vec<i64>,
    pub creator_id: i64,
}

impl WorkflowService {
    /// Copy one workflow into a fresh meta + draft. Chat flows carry their
    /// role config along.
    pub async fn copy_workflow(
        &self,
        workflow_id: i64,
        policy: CopyWorkflowPolicy,
    ) -> WorkflowResult<Workflow> {
        let source = self.get(GetPolicy { id: workflow_id, ..Default::default() }).await?;

        let canvas = policy.modified_canvas.unwrap_or_else(|| source.canvas.clone());
        let new_id = self
            .repo
            .create_meta(&MetaCreate {
                space_id: source.meta.space_id,
                app_id: policy.target_app_id.filter(|id| *id != 0),
                name: format!("{}_copy", source.meta.name),
                desc: source.meta.desc.clone(),
                icon_uri: source.meta.icon_uri.clone(),
                mode: source.meta.mode,
                creator_id: source.meta.creator_id,
                init_canvas: None,
            })
            .await?;
        self.save(new_id, &canvas).await?;

        if source.meta.mode == WorkflowMode::ChatFlow {
            let role = self.repo.get_role(workflow_id, "").await?.ok_or_else(|| {
                WorkflowError::OperationFail(format!(
                    "workflow {workflow_id} has no draft chat flow role"
                ))
            })?;
            self.repo
                .create_role(ChatFlowRole { id: 0, workflow_id: new_id, ..role })
                .await?;
        }

        self.get(GetPolicy { id: new_id, ..Default::default() }).await
    }

    /// The transitive closure of draft workflows (within the app) that the
    /// root references through sub-workflow nodes or LLM workflow tools, in
    /// discovery order (root first).
    async fn app_closure(
        &self,
        root_id: i64,
        app_drafts: &HashMap<i64, DraftInfo>,
    ) -> WorkflowResult<Vec<i64>> {
        let mut order: Vec<i64> = Vec::new();
        let mut visited: HashSet<i64> = HashSet::new();
        let mut stack = vec![root_id];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            order.push(id);
            let Some(draft) = app_drafts.get(&id) else { continue };
            let canvas: Canvas = serde_json::from_str(&draft.canvas)?;
            for (sub_id, _) in collect_workflow_identities(&canvas) {
                if app_drafts.contains_key(&sub_id) {
                    stack.push(sub_id);
                }
            }
        }
        Ok(order)
    }

    /// Copy a workflow (and its in-app sub-workflow closure) from an app to
    /// the library, rewriting references and publishing `v0.0.1` for each
    /// copy, children before parents.
    pub async fn copy_workflow_from_app_to_library(
        &self,
        workflow_id: i64,
        app_id: i64,
        related: ExternalResourceRelated,
    ) -> WorkflowResult<CopyToLibraryResult> {
        let (app_drafts, names) = self.repo.drafts_by_app(app_id).await?;
        let root_draft = match app_drafts.get(&workflow_id) {
            Some(draft) => draft.clone(),
            None => self
                .repo
                .draft(workflow_id)
                .await?
                .ok_or(WorkflowError::WorkflowNotFound { id: workflow_id, version: None })?,
        };

        let mut app_drafts = app_drafts;
        app_drafts.entry(workflow_id).or_insert(root_draft);

        let order = self.app_closure(workflow_id, &app_drafts).await?;

        // validate the whole closure before copying anything
        let mut result = CopyToLibraryResult::default();
        for id in &order {
            let Some(draft) = app_drafts.get(id) else { continue };
            let issues = self
                .validate_tree(
                    *id,
                    ValidateTreeConfig { canvas: draft.canvas.clone(), app_id: Some(app_id) },
                )
                .await?;
            for mut info in issues {
                if info.name.is_empty() {
                    info.name = names.get(&info.workflow_id).cloned().unwrap_or_default();
                }
                result.validate_issues.push(info);
            }
        }
        if !result.validate_issues.is_empty() {
            return Ok(result);
        }

        // copy bottom-up so parents can point at already-copied children
        let mut copy_order = order.clone();
        copy_order.reverse();

        for id in copy_order {
            if result.id_map.contains_key(&id) {
                continue;
            }
            let Some(draft) = app_drafts.get(&id) else { continue };

            let mut canvas: Canvas = serde_json::from_str(&draft.canvas)?;
            rewrite_external_resources(&mut canvas.nodes, &result.id_map, &related)?;
            let modified = serde_json::to_string(&canvas)?;

            let copied = self
                .copy_workflow(
                    id,
                    CopyWorkflowPolicy {
                        target_app_id: Some(0),
                        modified_canvas: Some(modified.clone()),
                    },
                )
                .await?;

            let refs = canvas_to_refs(copied.id, &canvas)?;
            self.repo
                .create_version(
                    copied.id,
                    VersionInfo {
                        version: INITIAL_LIBRARY_VERSION.to_string(),
                        description: String::new(),
                        canvas: modified,
                        input_params: draft.input_params.clone(),
                        output_params: draft.output_params.clone(),
                        commit_id: copied.commit_id.clone(),
                        creator_id: copied.meta.creator_id,
                        created_at: Utc::now(),
                    },
                    refs,
                )
                .await?;

            result.id_map.insert(
                id,
                IdVersionPair {
                    id: copied.id,
                    version: INITIAL_LIBRARY_VERSION.to_string(),
                },
            );
            result.copied.push(copied);
        }

        Ok(result)
    }

    /// Duplicate every workflow of an app into another app, rewriting
    /// references to stay within the copy, children before parents.
    pub async fn duplicate_workflows_by_app_id(
        &self,
        source_app_id: i64,
        target_app_id: i64,
        related: ExternalResourceRelated,
    ) -> WorkflowResult<Vec<Workflow>> {
        let (app_drafts, _) = self.repo.drafts_by_app(source_app_id).await?;
        let mut copied: Vec<Workflow> = Vec::new();
        let mut id_map: HashMap<i64, IdVersionPair> = HashMap::new();

        let mut ids: Vec<i64> = app_drafts.keys().copied().collect();
        ids.sort_unstable();

        for root in ids {
            if id_map.contains_key(&root) {
                continue;
            }
            let order = self.app_closure(root, &app_drafts).await?;
            for id in order.into_iter().rev() {
                if id_map.contains_key(&id) {
                    continue;
                }
                let Some(draft) = app_drafts.get(&id) else { continue };
                let mut canvas: Canvas = serde_json::from_str(&draft.canvas)?;
                rewrite_external_resources(&mut canvas.nodes, &id_map, &related)?;
                let modified = serde_json::to_string(&canvas)?;

                let new_wf = self
                    .copy_workflow(
                        id,
                        CopyWorkflowPolicy {
                            target_app_id: Some(target_app_id),
                            modified_canvas: Some(modified),
                        },
                    )
                    .await?;

                // duplicated drafts stay drafts
                id_map.insert(id, IdVersionPair { id: new_wf.id, version: String::new() });
                copied.push(new_wf);
            }
        }
        Ok(copied)
    }

    /// Release an app: validate every workflow, rewrite references to the
    /// released versions, publish the same version string for all, publish
    /// chat roles, and record connector bindings.
    pub async fn release_application_workflows(
        &self,
        app_id: i64,
        config: &ReleaseConfig,
    ) -> WorkflowResult<Vec<ValidateTreeInfo>> {
        if config.connector_ids.is_empty() {
            return Err(WorkflowError::InvalidParameter(
                "connector ids are required".to_string(),
            ));
        }

        let (all_drafts, names) = self.repo.drafts_by_app(app_id).await?;

        let selected: HashMap<i64, DraftInfo> = if config.workflow_ids.is_empty() {
            all_drafts.clone()
        } else {
            all_drafts
                .iter()
                .filter(|(id, _)| config.workflow_ids.contains(id))
                .map(|(id, d)| (*id, d.clone()))
                .collect()
        };

        // every released workflow pins its references to the release version
        let related_workflows: HashMap<i64, IdVersionPair> = all_drafts
            .keys()
            .map(|id| {
                (*id, IdVersionPair { id: *id, version: config.version.clone() })
            })
            .collect();
        let related = ExternalResourceRelated {
            plugin_map: config
                .plugin_ids
                .iter()
                .map(|id| {
                    (*id, IdVersionPair { id: *id, version: config.version.clone() })
                })
                .collect(),
            ..Default::default()
        };

        let mut issues_out: Vec<ValidateTreeInfo> = Vec::new();
        for (id, draft) in &selected {
            let infos = self
                .validate_tree(
                    *id,
                    ValidateTreeConfig { canvas: draft.canvas.clone(), app_id: Some(app_id) },
                )
                .await?;
            for mut info in infos {
                if info.name.is_empty() {
                    info.name = names.get(&info.workflow_id).cloned().unwrap_or_default();
                }
                issues_out.push(info);
            }
        }
        if !issues_out.is_empty() {
            return Ok(issues_out);
        }

        let mut published_ids: Vec<i64> = Vec::new();
        let mut ids: Vec<i64> = selected.keys().copied().collect();
        ids.sort_unstable();

        for id in &ids {
            // idempotent: versions already released are skipped
            if self.repo.get_version(*id, &config.version).await?.is_some() {
                continue;
            }
            let draft = selected.get(id).expect("selected id");
            let mut canvas: Canvas = serde_json::from_str(&draft.canvas)?;
            rewrite_external_resources(&mut canvas.nodes, &related_workflows, &related)?;
            let modified = serde_json::to_string(&canvas)?;

            let refs = canvas_to_refs(*id, &canvas)?;
            self.repo
                .create_version(
                    *id,
                    VersionInfo {
                        version: config.version.clone(),
                        description: String::new(),
                        canvas: modified,
                        input_params: draft.input_params.clone(),
                        output_params: draft.output_params.clone(),
                        commit_id: draft.commit_id.clone(),
                        creator_id: config.creator_id,
                        created_at: Utc::now(),
                    },
                    refs,
                )
                .await?;
            published_ids.push(*id);
        }

        for id in &ids {
            let meta = self.repo.get_meta(*id).await?;
            if meta.mode == WorkflowMode::ChatFlow {
                self.publish_chatflow_role(*id, config.creator_id, &config.version).await?;
            }
        }

        for connector_id in &config.connector_ids {
            self.repo
                .bind_connector_versions(app_id, *connector_id, &published_ids, &config.version)
                .await?;
        }

        Ok(Vec::new())
    }

    /// For app workflows outside `related_map`, rewrite their references via
    /// the map and mint fresh draft commits with the test-run flag reset.
    pub async fn sync_related_workflow_resources(
        &self,
        app_id: i64,
        related_map: &HashMap<i64, IdVersionPair>,
        related: &ExternalResourceRelated,
    ) -> WorkflowResult<()> {
        let (drafts, _) = self.repo.drafts_by_app(app_id).await?;
        let pending: Vec<(i64, DraftInfo)> = drafts
            .into_iter()
            .filter(|(id, _)| !related_map.contains_key(id))
            .collect();

        let commit_ids = self.repo.gen_multi_ids(pending.len()).await?;

        for ((id, draft), commit_id) in pending.into_iter().zip(commit_ids) {
            let mut canvas: Canvas = serde_json::from_str(&draft.canvas)?;
            rewrite_external_resources(&mut canvas.nodes, related_map, related)?;
            let modified = serde_json::to_string(&canvas)?;

            self.repo
                .create_or_update_draft(
                    id,
                    DraftInfo {
                        canvas: modified,
                        input_params: draft.input_params.clone(),
                        output_params: draft.output_params.clone(),
                        commit_id: commit_id.to_string(),
                        test_run_success: false,
                        modified: true,
                        updated_at: Utc::now(),
                    },
                )
                .await?;
        }
        Ok(())
    }

    /// Published version strings recorded for a connector, newest first.
    pub async fn get_workflow_versions_by_connector(
        &self,
        connector_id: i64,
        workflow_id: i64,
        limit: usize,
    ) -> WorkflowResult<Vec<String>> {
        Ok(self
            .repo
            .connector_bindings(connector_id, workflow_id, limit)
            .await?
            .into_iter()
            .map(|b| b.version)
            .collect())
    }

    /// Read a workflow by the mode the policy selects, mirroring `get` but
    /// from the app-release perspective (drafts only).
    pub async fn app_workflows(&self, app_id: i64) -> WorkflowResult<Vec<Workflow>> {
        let (workflows, _) = self
            .mget(crate::store::MGetPolicy {
                query: MetaQuery { app_id: Some(app_id), ..Default::default() },
                query_type: QueryType::Draft,
                ..Default::default()
            })
            .await?;
        Ok(workflows)
    }
}
