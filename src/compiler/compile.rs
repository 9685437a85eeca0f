//! The canvas → schema compilation pipeline.

use super::batch::parse_batch_mode;
use super::ports::{build_branches, edge_to_connection, normalize_ports};
use super::prune::prune_isolated_nodes;
use super::{SubCanvasStore, WorkflowIdentity};
use crate::canvas::model::batch_inner_node_id;
use crate::canvas::{Canvas, CanvasNode, NodeType};
use crate::error::{WorkflowError, WorkflowResult};
use crate::nodes::{AdaptContext, AdaptorRegistry};
use crate::schema::configs::SubWorkflowConfig;
use crate::schema::{
    Connection, ExceptionConfig, NodeConfig, NodeSchema, StreamConfig, SubWorkflowBasic,
    WorkflowSchema,
};
use crate::canvas::ErrorProcessType;
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Compile a canvas into an executable schema using the global adaptor
/// registry. Panics inside the pipeline are captured and returned as errors.
pub fn compile(canvas: &Canvas, sources: &SubCanvasStore) -> WorkflowResult<WorkflowSchema> {
    compile_with_registry(canvas, sources, AdaptorRegistry::global())
}

/// Compile with an explicit registry (tests swap adaptors this way).
pub fn compile_with_registry(
    canvas: &Canvas,
    sources: &SubCanvasStore,
    registry: &AdaptorRegistry,
) -> WorkflowResult<WorkflowSchema> {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut stack = Vec::new();
        compile_inner(canvas, sources, registry, &mut stack)
    }));
    match result {
        Ok(inner) => inner,
        Err(payload) => Err(WorkflowError::from_panic(payload)),
    }
}

fn compile_inner(
    canvas: &Canvas,
    sources: &SubCanvasStore,
    registry: &AdaptorRegistry,
    stack: &mut Vec<WorkflowIdentity>,
) -> WorkflowResult<WorkflowSchema> {
    let (nodes, edges) =
        prune_isolated_nodes(canvas.nodes.clone(), canvas.edges.clone(), None)?;

    let mut sc = WorkflowSchema::default();
    let mut node_types: HashMap<String, NodeType> = HashMap::new();

    for node in &nodes {
        // composite children are validated and recorded before any rewrite
        for child in &node.blocks {
            if !child.blocks.is_empty() {
                return Err(WorkflowError::SchemaConversionFail {
                    node_key: child.id.clone(),
                    reason: "nested inner-workflow is not supported".to_string(),
                });
            }
            if !child.edges.is_empty() {
                return Err(WorkflowError::SchemaConversionFail {
                    node_key: child.id.clone(),
                    reason: "nodes in inner-workflow should not have edges info".to_string(),
                });
            }
            let child_type = NodeType::from_id_str(&child.node_type);
            if matches!(child_type, Some(NodeType::Break) | Some(NodeType::Continue)) {
                sc.connections.push(Connection::new(&child.id, &node.id));
            }
        }

        // batch-mode rewrite
        let expanded;
        let node = match parse_batch_mode(node)? {
            Some(parent) => {
                sc.generated_nodes.push(batch_inner_node_id(&node.id));
                expanded = parent;
                &expanded
            }
            None => node,
        };

        record_node_types(node, &mut node_types);

        let (ns_list, hierarchy) = adapt_node(node, canvas, registry, sources, stack)?;
        sc.nodes.extend(ns_list);
        for (child, parent) in hierarchy {
            sc.hierarchy.insert(child, parent);
        }

        for edge in &node.edges {
            sc.connections.push(edge_to_connection(edge));
        }
    }

    for edge in &edges {
        sc.connections.push(edge_to_connection(edge));
    }

    sc.connections = normalize_ports(std::mem::take(&mut sc.connections), &node_types)?;
    sc.branches = build_branches(&sc)?;
    sc.init();
    Ok(sc)
}

fn record_node_types(node: &CanvasNode, node_types: &mut HashMap<String, NodeType>) {
    if let Some(t) = NodeType::from_id_str(&node.node_type) {
        node_types.insert(node.id.clone(), t);
    }
    for child in &node.blocks {
        record_node_types(child, node_types);
    }
}

/// Adapt one canvas node (plus composite children) into compiled schemas and
/// a child → parent hierarchy fragment.
fn adapt_node(
    node: &CanvasNode,
    canvas: &Canvas,
    registry: &AdaptorRegistry,
    sources: &SubCanvasStore,
    stack: &mut Vec<WorkflowIdentity>,
) -> WorkflowResult<(Vec<NodeSchema>, BTreeMap<String, String>)> {
    let node_type = match NodeType::from_id_str(&node.node_type) {
        Some(t) => t,
        None => {
            return Err(WorkflowError::SchemaConversionFail {
                node_key: node.id.clone(),
                reason: format!("unsupported block type: {}", node.node_type),
            })
        }
    };

    if node_type == NodeType::Comment {
        return Ok((vec![], BTreeMap::new()));
    }

    if node_type == NodeType::SubWorkflow {
        let mut ns = sub_workflow_schema(node, canvas, registry, sources, stack)?;
        ns.exception_configs = to_exception_config(node, node_type)?;
        return Ok((vec![ns], BTreeMap::new()));
    }

    let adaptor =
        registry.get(node_type).ok_or_else(|| WorkflowError::SchemaConversionFail {
            node_key: node.id.clone(),
            reason: format!("unsupported block type: {}", node.node_type),
        })?;

    let mut ns = adaptor.adapt(node, &AdaptContext { canvas })?;
    ns.exception_configs = to_exception_config(node, node_type)?;

    if node.blocks.is_empty() {
        return Ok((vec![ns], BTreeMap::new()));
    }

    let mut all = Vec::new();
    let mut hierarchy = BTreeMap::new();
    for child in &node.blocks {
        let (child_schemas, _) = adapt_node(child, canvas, registry, sources, stack)?;
        all.extend(child_schemas);
        hierarchy.insert(child.id.clone(), node.id.clone());
    }
    all.push(ns);
    Ok((all, hierarchy))
}

/// Compile the referenced workflow in place and wrap it as a node schema.
fn sub_workflow_schema(
    node: &CanvasNode,
    _canvas: &Canvas,
    registry: &AdaptorRegistry,
    sources: &SubCanvasStore,
    stack: &mut Vec<WorkflowIdentity>,
) -> WorkflowResult<NodeSchema> {
    let inputs = node.data.inputs.as_ref().ok_or_else(|| {
        WorkflowError::SchemaConversionFail {
            node_key: node.id.clone(),
            reason: "sub workflow node has no inputs".to_string(),
        }
    })?;

    if inputs.workflow_id.is_empty() {
        return Err(WorkflowError::SchemaConversionFail {
            node_key: node.id.clone(),
            reason: "sub workflow node's workflowID is empty".to_string(),
        });
    }
    let workflow_id: i64 = inputs.workflow_id.parse().map_err(|_| {
        WorkflowError::SchemaConversionFail {
            node_key: node.id.clone(),
            reason: format!("sub workflow node's workflowID is not a number: {}", inputs.workflow_id),
        }
    })?;

    let identity = WorkflowIdentity::from_node_ref(workflow_id, &inputs.workflow_version);

    if stack.contains(&identity) {
        return Err(WorkflowError::ReferenceCycle {
            id: identity.id,
            version: identity.version,
        });
    }

    let sub_canvas = sources.get(&identity).ok_or_else(|| WorkflowError::WorkflowNotFound {
        id: identity.id,
        version: identity.version.clone(),
    })?;

    stack.push(identity.clone());
    let sub_schema = compile_inner(sub_canvas, sources, registry, stack);
    stack.pop();
    let sub_schema = sub_schema?;

    let config = SubWorkflowConfig {
        workflow_id,
        workflow_version: inputs.workflow_version.clone(),
    };

    let mut ns = crate::nodes::helpers::base_schema(
        node,
        NodeType::SubWorkflow,
        NodeConfig::SubWorkflow(config),
    )?;
    ns.stream_configs = Some(StreamConfig {
        can_generate_stream: sub_schema.require_streaming,
        requires_streaming_input: false,
    });
    ns.sub_workflow_basic = Some(SubWorkflowBasic {
        workflow_id,
        workflow_version: inputs.workflow_version.clone(),
    });
    ns.sub_workflow_schema = Some(Box::new(sub_schema));

    crate::nodes::helpers::set_inputs(&mut ns, &inputs.input_parameters);
    crate::nodes::helpers::set_outputs_auto(&mut ns, &node.data.outputs)?;

    Ok(ns)
}

/// Convert the node's error-handling settings, applying the node type's
/// default timeout when the author configured nothing.
pub fn to_exception_config(
    node: &CanvasNode,
    node_type: NodeType,
) -> WorkflowResult<Option<ExceptionConfig>> {
    let meta = node_type.meta();
    let setting = node.data.inputs.as_ref().and_then(|i| i.setting_on_error.as_ref());

    let Some(setting) = setting else {
        if meta.default_timeout_ms == 0 {
            return Ok(None);
        }
        return Ok(Some(ExceptionConfig {
            timeout_ms: meta.default_timeout_ms,
            ..Default::default()
        }));
    };

    let mut config = ExceptionConfig {
        timeout_ms: setting.timeout_ms,
        max_retry: setting.retry_times,
        data_on_err: setting.data_on_err.clone(),
        process_type: setting.process_type,
        backup_llm_param: setting
            .ext
            .as_ref()
            .map(|e| e.backup_llm_param.clone())
            .filter(|s| !s.is_empty()),
    };

    if config.process_type == Some(ErrorProcessType::ReturnDefaultData)
        && config.data_on_err.is_empty()
    {
        return Err(WorkflowError::InvalidParameter(
            "error process type is returning default value, but dataOnErr is not specified"
                .to_string(),
        ));
    }

    if config.process_type.is_none() && !config.data_on_err.is_empty() && setting.switch_on {
        config.process_type = Some(ErrorProcessType::ReturnDefaultData);
    }

    Ok(Some(config))
}
