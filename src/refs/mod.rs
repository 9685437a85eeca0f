//! Workflow reference graph: sub-workflow and tool edges, dependence
//! resources, and external-resource rewriting for copy/release flows.

use crate::canvas::{Canvas, CanvasNode, NodeType};
use crate::error::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How one workflow refers to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferType {
    SubWorkflow,
    Tool,
}

/// What kind of entity holds the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferringBizType {
    Workflow,
}

/// Directed reference between workflows, rebuilt from the canvas on publish.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub referring_id: i64,
    pub referred_id: i64,
    pub refer_type: ReferType,
    pub referring_biz_type: ReferringBizType,
}

/// Identity pair used when rewriting references during copy/release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdVersionPair {
    pub id: i64,
    pub version: String,
}

/// External resource remapping applied to a canvas when it moves between
/// apps, spaces, or the library.
#[derive(Debug, Clone, Default)]
pub struct ExternalResourceRelated {
    pub plugin_map: HashMap<i64, IdVersionPair>,
    pub plugin_tool_map: HashMap<i64, i64>,
    pub knowledge_map: HashMap<i64, i64>,
    pub database_map: HashMap<i64, i64>,
}

/// Resources a workflow depends on, collected recursively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependenceResource {
    pub plugin_ids: Vec<i64>,
    pub knowledge_ids: Vec<i64>,
    pub database_ids: Vec<i64>,
}

/// Extract the set of reference edges a canvas holds: one `SubWorkflow` edge
/// per sub-workflow node, one `Tool` edge per workflow exposed to an LLM
/// node as a function-call tool. Walks composite children recursively.
pub fn canvas_to_refs(referring_id: i64, canvas: &Canvas) -> WorkflowResult<HashSet<ReferenceEdge>> {
    let mut refs = HashSet::new();
    collect_refs(referring_id, &canvas.nodes, &mut refs)?;
    Ok(refs)
}

fn collect_refs(
    referring_id: i64,
    nodes: &[CanvasNode],
    refs: &mut HashSet<ReferenceEdge>,
) -> WorkflowResult<()> {
    for node in nodes {
        match NodeType::from_id_str(&node.node_type) {
            Some(NodeType::SubWorkflow) => {
                if let Some(inputs) = node.data.inputs.as_ref() {
                    let referred_id: i64 = inputs.workflow_id.parse().map_err(|_| {
                        WorkflowError::SchemaConversionFail {
                            node_key: node.id.clone(),
                            reason: format!("bad workflow id: {}", inputs.workflow_id),
                        }
                    })?;
                    refs.insert(ReferenceEdge {
                        referring_id,
                        referred_id,
                        refer_type: ReferType::SubWorkflow,
                        referring_biz_type: ReferringBizType::Workflow,
                    });
                }
            }
            Some(NodeType::LLM) => {
                let tool_workflows = node
                    .data
                    .inputs
                    .as_ref()
                    .and_then(|i| i.fc_param.as_ref())
                    .and_then(|fc| fc.workflow_fc_param.as_ref());
                if let Some(wf) = tool_workflows {
                    for item in &wf.workflow_list {
                        let referred_id: i64 = item.workflow_id.parse().map_err(|_| {
                            WorkflowError::SchemaConversionFail {
                                node_key: node.id.clone(),
                                reason: format!("bad tool workflow id: {}", item.workflow_id),
                            }
                        })?;
                        refs.insert(ReferenceEdge {
                            referring_id,
                            referred_id,
                            refer_type: ReferType::Tool,
                            referring_biz_type: ReferringBizType::Workflow,
                        });
                    }
                }
            }
            _ => {}
        }

        if !node.blocks.is_empty() {
            collect_refs(referring_id, &node.blocks, refs)?;
        }
    }
    Ok(())
}

/// Identity (id, version) of every workflow a canvas references directly,
/// through sub-workflow nodes or LLM workflow tools.
pub fn collect_workflow_identities(canvas: &Canvas) -> Vec<(i64, String)> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    collect_identities(&canvas.nodes, &mut out, &mut seen);
    out
}

fn collect_identities(
    nodes: &[CanvasNode],
    out: &mut Vec<(i64, String)>,
    seen: &mut HashSet<(i64, String)>,
) {
    for node in nodes {
        match NodeType::from_id_str(&node.node_type) {
            Some(NodeType::SubWorkflow) => {
                if let Some(inputs) = node.data.inputs.as_ref() {
                    if let Ok(id) = inputs.workflow_id.parse::<i64>() {
                        let key = (id, inputs.workflow_version.clone());
                        if seen.insert(key.clone()) {
                            out.push(key);
                        }
                    }
                }
            }
            Some(NodeType::LLM) => {
                let tool_workflows = node
                    .data
                    .inputs
                    .as_ref()
                    .and_then(|i| i.fc_param.as_ref())
                    .and_then(|fc| fc.workflow_fc_param.as_ref());
                if let Some(wf) = tool_workflows {
                    for item in &wf.workflow_list {
                        if let Ok(id) = item.workflow_id.parse::<i64>() {
                            let key = (id, item.workflow_version.clone());
                            if seen.insert(key.clone()) {
                                out.push(key);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        collect_identities(&node.blocks, out, seen);
    }
}

/// Rewrite workflow references and external resource ids in place.
///
/// `related_workflows` maps old workflow ids to their copied `(id, version)`;
/// `related` remaps plugin, plugin-tool, knowledge, and database ids.
pub fn rewrite_external_resources(
    nodes: &mut [CanvasNode],
    related_workflows: &HashMap<i64, IdVersionPair>,
    related: &ExternalResourceRelated,
) -> WorkflowResult<()> {
    for node in nodes.iter_mut() {
        let node_type = NodeType::from_id_str(&node.node_type);
        let Some(node_type) = node_type else {
            rewrite_external_resources(&mut node.blocks, related_workflows, related)?;
            continue;
        };
        let meta = node_type.meta();

        if let Some(inputs) = node.data.inputs.as_mut() {
            if meta.uses_database && !related.database_map.is_empty() {
                for info in inputs.database_info_list.iter_mut() {
                    if let Ok(old) = info.database_info_id.parse::<i64>() {
                        if let Some(new_id) = related.database_map.get(&old) {
                            info.database_info_id = new_id.to_string();
                        }
                    }
                }
            }

            if meta.uses_knowledge && !related.knowledge_map.is_empty() {
                if let Some(param) = inputs.dataset_param.first_mut() {
                    if let Some(content) = param
                        .input
                        .as_mut()
                        .and_then(|i| i.value.as_mut())
                        .and_then(|v| v.content.as_mut())
                    {
                        if let serde_json::Value::Array(items) = content {
                            for item in items.iter_mut() {
                                if let Some(old) =
                                    item.as_str().and_then(|s| s.parse::<i64>().ok())
                                {
                                    if let Some(new_id) = related.knowledge_map.get(&old) {
                                        *item = serde_json::Value::String(new_id.to_string());
                                    }
                                }
                            }
                        }
                    }
                }
            }

            if meta.uses_plugin && !related.plugin_map.is_empty() {
                rewrite_plugin_params(node.id.as_str(), inputs, related)?;
            }

            match node_type {
                NodeType::SubWorkflow => {
                    if let Ok(old) = inputs.workflow_id.parse::<i64>() {
                        if let Some(new_ref) = related_workflows.get(&old) {
                            inputs.workflow_id = new_ref.id.to_string();
                            inputs.workflow_version = new_ref.version.clone();
                        }
                    }
                }
                NodeType::LLM => {
                    if let Some(fc) = inputs.fc_param.as_mut() {
                        if let Some(wf) = fc.workflow_fc_param.as_mut() {
                            for item in wf.workflow_list.iter_mut() {
                                if let Ok(old) = item.workflow_id.parse::<i64>() {
                                    if let Some(new_ref) = related_workflows.get(&old) {
                                        item.workflow_id = new_ref.id.to_string();
                                        item.workflow_version = new_ref.version.clone();
                                        item.is_draft = new_ref.version.is_empty();
                                    }
                                }
                            }
                        }
                        if let Some(pl) = fc.plugin_fc_param.as_mut() {
                            for item in pl.plugin_list.iter_mut() {
                                if let Ok(old) = item.plugin_id.parse::<i64>() {
                                    if let Some(new_plugin) = related.plugin_map.get(&old) {
                                        item.plugin_id = new_plugin.id.to_string();
                                        if !new_plugin.version.is_empty() {
                                            item.plugin_version = new_plugin.version.clone();
                                            item.is_draft = false;
                                        }
                                    }
                                }
                                if let Ok(old) = item.api_id.parse::<i64>() {
                                    if let Some(new_tool) = related.plugin_tool_map.get(&old) {
                                        item.api_id = new_tool.to_string();
                                    }
                                }
                            }
                        }
                        if let Some(kn) = fc.knowledge_fc_param.as_mut() {
                            for item in kn.knowledge_list.iter_mut() {
                                if let Ok(old) = item.id.parse::<i64>() {
                                    if let Some(new_id) = related.knowledge_map.get(&old) {
                                        item.id = new_id.to_string();
                                    }
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        rewrite_external_resources(&mut node.blocks, related_workflows, related)?;
    }
    Ok(())
}

fn rewrite_plugin_params(
    node_key: &str,
    inputs: &mut crate::canvas::Inputs,
    related: &ExternalResourceRelated,
) -> WorkflowResult<()> {
    let mut plugin_idx = None;
    let mut version_idx = None;
    let mut api_idx = None;
    for (idx, param) in inputs.api_params.iter().enumerate() {
        match param.name.as_str() {
            "pluginID" => plugin_idx = Some(idx),
            "pluginVersion" => version_idx = Some(idx),
            "apiID" => api_idx = Some(idx),
            _ => {}
        }
    }

    let missing = |name: &str| WorkflowError::SchemaConversionFail {
        node_key: node_key.to_string(),
        reason: format!("{name} param is not found"),
    };
    let plugin_idx = plugin_idx.ok_or_else(|| missing("pluginID"))?;
    let version_idx = version_idx.ok_or_else(|| missing("pluginVersion"))?;
    let api_idx = api_idx.ok_or_else(|| missing("apiID"))?;

    let literal_of = |inputs: &crate::canvas::Inputs, idx: usize| -> Option<i64> {
        inputs.api_params[idx]
            .input
            .as_ref()
            .and_then(|i| i.value.as_ref())
            .and_then(|v| v.content.as_ref())
            .and_then(|c| c.as_str())
            .and_then(|s| s.parse().ok())
    };

    if let Some(old_plugin) = literal_of(inputs, plugin_idx) {
        if let Some(new_plugin) = related.plugin_map.get(&old_plugin) {
            let new_id = new_plugin.id.to_string();
            let new_version = new_plugin.version.clone();
            if let Some(value) =
                inputs.api_params[plugin_idx].input.as_mut().and_then(|i| i.value.as_mut())
            {
                value.content = Some(serde_json::Value::String(new_id));
            }
            if !new_version.is_empty() {
                if let Some(value) =
                    inputs.api_params[version_idx].input.as_mut().and_then(|i| i.value.as_mut())
                {
                    value.content = Some(serde_json::Value::String(new_version));
                }
            }
        }
    }

    if let Some(old_api) = literal_of(inputs, api_idx) {
        if let Some(new_api) = related.plugin_tool_map.get(&old_api) {
            if let Some(value) =
                inputs.api_params[api_idx].input.as_mut().and_then(|i| i.value.as_mut())
            {
                value.content = Some(serde_json::Value::String(new_api.to_string()));
            }
        }
    }

    Ok(())
}

/// Collect the plugin/knowledge/database ids a canvas depends on, without
/// recursion into other workflows (the service layer follows draft
/// references itself).
pub fn collect_dependence(canvas: &Canvas) -> WorkflowResult<DependenceResource> {
    let mut ds = DependenceResource::default();
    collect_dependence_nodes(&canvas.nodes, &mut ds)?;
    Ok(ds)
}

fn collect_dependence_nodes(
    nodes: &[CanvasNode],
    ds: &mut DependenceResource,
) -> WorkflowResult<()> {
    for node in nodes {
        let Some(node_type) = NodeType::from_id_str(&node.node_type) else {
            continue;
        };
        let meta = node_type.meta();
        let Some(inputs) = node.data.inputs.as_ref() else {
            collect_dependence_nodes(&node.blocks, ds)?;
            continue;
        };

        if meta.uses_database {
            if inputs.database_info_list.is_empty() {
                return Err(WorkflowError::InvalidParameter(
                    "database info is required".to_string(),
                ));
            }
            for info in &inputs.database_info_list {
                let id = info.database_info_id.parse::<i64>().map_err(|_| {
                    WorkflowError::InvalidParameter(format!(
                        "bad database id: {}",
                        info.database_info_id
                    ))
                })?;
                ds.database_ids.push(id);
            }
        } else if meta.uses_knowledge {
            ds.knowledge_ids.extend(crate::nodes::knowledge::knowledge_ids(node)?);
        } else if meta.uses_plugin {
            // version "0" marks an app-local plugin that must be tracked
            let version = inputs
                .api_params
                .iter()
                .find(|p| p.name == "pluginVersion")
                .and_then(|p| p.input.as_ref())
                .and_then(crate::nodes::helpers::literal_string);
            if version.as_deref() == Some("0") {
                if let Some(id) = inputs
                    .api_params
                    .iter()
                    .find(|p| p.name == "pluginID")
                    .and_then(|p| p.input.as_ref())
                    .and_then(crate::nodes::helpers::literal_string)
                    .and_then(|s| s.parse::<i64>().ok())
                {
                    ds.plugin_ids.push(id);
                }
            }
        } else if node_type == NodeType::LLM {
            if let Some(fc) = &inputs.fc_param {
                if let Some(pl) = &fc.plugin_fc_param {
                    for item in &pl.plugin_list {
                        if item.is_draft {
                            if let Ok(id) = item.plugin_id.parse::<i64>() {
                                ds.plugin_ids.push(id);
                            }
                        }
                    }
                }
                if let Some(kn) = &fc.knowledge_fc_param {
                    for item in &kn.knowledge_list {
                        if let Ok(id) = item.id.parse::<i64>() {
                            ds.knowledge_ids.push(id);
                        }
                    }
                }
            }
        }

        collect_dependence_nodes(&node.blocks, ds)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canvas_with_subworkflow(id: &str, version: &str) -> Canvas {
        serde_json::from_value(json!({
            "nodes": [{
                "id": "sub1",
                "type": "9",
                "data": {"inputs": {"workflowId": id, "workflowVersion": version}}
            }],
            "edges": []
        }))
        .unwrap()
    }

    #[test]
    fn test_sub_workflow_ref() {
        let canvas = canvas_with_subworkflow("42", "v0.0.1");
        let refs = canvas_to_refs(7, &canvas).unwrap();
        assert_eq!(refs.len(), 1);
        let edge = refs.iter().next().unwrap();
        assert_eq!(edge.referring_id, 7);
        assert_eq!(edge.referred_id, 42);
        assert_eq!(edge.refer_type, ReferType::SubWorkflow);
    }

    #[test]
    fn test_llm_tool_ref() {
        let canvas: Canvas = serde_json::from_value(json!({
            "nodes": [{
                "id": "llm",
                "type": "3",
                "data": {"inputs": {"fcParam": {"workflowFCParam": {"workflowList": [
                    {"workflow_id": "99", "workflow_version": "v0.0.3"}
                ]}}}}
            }],
            "edges": []
        }))
        .unwrap();
        let refs = canvas_to_refs(7, &canvas).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs.iter().next().unwrap().refer_type, ReferType::Tool);
    }

    #[test]
    fn test_refs_walk_composite_children() {
        let canvas: Canvas = serde_json::from_value(json!({
            "nodes": [{
                "id": "loop1",
                "type": "21",
                "blocks": [{
                    "id": "sub1",
                    "type": "9",
                    "data": {"inputs": {"workflowId": "43", "workflowVersion": ""}}
                }],
                "data": {}
            }],
            "edges": []
        }))
        .unwrap();
        let refs = canvas_to_refs(7, &canvas).unwrap();
        assert_eq!(refs.iter().next().unwrap().referred_id, 43);
    }

    #[test]
    fn test_bad_workflow_id_rejected() {
        let canvas = canvas_with_subworkflow("nope", "");
        assert!(canvas_to_refs(7, &canvas).is_err());
    }

    #[test]
    fn test_rewrite_sub_workflow_reference() {
        let mut canvas = canvas_with_subworkflow("42", "");
        let mut related_workflows = HashMap::new();
        related_workflows
            .insert(42, IdVersionPair { id: 1042, version: "v0.0.1".to_string() });
        rewrite_external_resources(
            &mut canvas.nodes,
            &related_workflows,
            &ExternalResourceRelated::default(),
        )
        .unwrap();
        let inputs = canvas.nodes[0].data.inputs.as_ref().unwrap();
        assert_eq!(inputs.workflow_id, "1042");
        assert_eq!(inputs.workflow_version, "v0.0.1");
    }

    #[test]
    fn test_collect_identities_dedup() {
        let canvas: Canvas = serde_json::from_value(json!({
            "nodes": [
                {"id": "a", "type": "9", "data": {"inputs": {"workflowId": "42"}}},
                {"id": "b", "type": "9", "data": {"inputs": {"workflowId": "42"}}}
            ],
            "edges": []
        }))
        .unwrap();
        assert_eq!(collect_workflow_identities(&canvas), vec![(42, String::new())]);
    }

    #[test]
    fn test_collect_dependence_database_required() {
        let canvas: Canvas = serde_json::from_value(json!({
            "nodes": [{"id": "d", "type": "43", "data": {"inputs": {}}}],
            "edges": []
        }))
        .unwrap();
        assert!(collect_dependence(&canvas).is_err());
    }
}
