//! Batch-mode expansion.
//!
//! A node with `node_batch_info.enabled` is rewritten into a Batch composite
//! whose single child is the original node under a `{id}_inner` key. The
//! parent owns the list inputs and concurrency knobs; the inner node keeps
//! the original input parameters and emits one list element per run.

use crate::canvas::model::batch_inner_node_id;
use crate::canvas::{
    BlockInput, BlockInputValue, BlockInputValueType, CanvasEdge, CanvasNode, Inputs, NodeData,
    NodeMetaFe, NodeType, Variable, VariableType,
};
use crate::error::{WorkflowError, WorkflowResult};
use serde_json::{json, Value};

pub const BATCH_INLINE_OUTPUT_PORT: &str = "batch-function-inline-output";
pub const BATCH_INLINE_INPUT_PORT: &str = "batch-function-inline-input";

/// Expand a batch-enabled node into a Batch parent plus inner child.
/// Returns `None` when the node has no batch mode configured.
pub fn parse_batch_mode(node: &CanvasNode) -> WorkflowResult<Option<CanvasNode>> {
    let Some(inputs) = node.data.inputs.as_ref() else {
        return Ok(None);
    };
    let Some(batch_info) = inputs.node_batch_info.as_ref() else {
        return Ok(None);
    };
    if !batch_info.batch_enable {
        return Ok(None);
    }

    // The outer output must be exactly one list<object>; the inner node
    // emits the element object.
    if node.data.outputs.len() != 1 {
        return Err(WorkflowError::SchemaConversionFail {
            node_key: node.id.clone(),
            reason: format!(
                "node batch mode output should be one list, actual count: {}",
                node.data.outputs.len()
            ),
        });
    }

    let out = Variable::parse(&node.data.outputs[0]).map_err(|e| {
        WorkflowError::SchemaConversionFail {
            node_key: node.id.clone(),
            reason: format!("failed to parse batch output: {e}"),
        }
    })?;

    if out.var_type != VariableType::List {
        return Err(WorkflowError::SchemaConversionFail {
            node_key: node.id.clone(),
            reason: format!(
                "node batch mode output should be list, actual type: {:?}",
                out.var_type
            ),
        });
    }

    let element_raw = out.schema.clone().ok_or_else(|| WorkflowError::SchemaConversionFail {
        node_key: node.id.clone(),
        reason: "node batch mode list output is missing its element schema".to_string(),
    })?;
    let element = Variable::parse(&element_raw).map_err(|e| {
        WorkflowError::SchemaConversionFail {
            node_key: node.id.clone(),
            reason: format!("node batch mode output schema should be variable, parse err: {e}"),
        }
    })?;

    if element.var_type != VariableType::Object {
        return Err(WorkflowError::SchemaConversionFail {
            node_key: node.id.clone(),
            reason: format!(
                "node batch mode output element should be object, actual type: {:?}",
                element.var_type
            ),
        });
    }

    // Object fields of the element become the inner node's outputs.
    let inner_outputs: Vec<Value> = match &element.schema {
        Some(Value::Array(fields)) => fields.clone(),
        _ => Vec::new(),
    };

    let inner_id = batch_inner_node_id(&node.id);
    let title = node
        .data
        .meta
        .as_ref()
        .map(|m| m.title.clone())
        .unwrap_or_default();

    // Outer output references the inner node's full output object.
    let outer_output = json!({
        "name": out.name,
        "input": {
            "type": "list",
            "schema": element_raw,
            "value": {
                "type": "ref",
                "content": {
                    "source": "block-output",
                    "blockID": inner_id,
                    "name": ""
                }
            }
        }
    });

    let literal_int = |v: i64| BlockInput {
        var_type: VariableType::Integer,
        schema: None,
        value: Some(BlockInputValue {
            value_type: BlockInputValueType::Literal,
            content: Some(json!(v.to_string())),
        }),
    };

    let mut parent = CanvasNode {
        id: node.id.clone(),
        node_type: NodeType::Batch.id_str().to_string(),
        meta: None,
        data: NodeData {
            meta: Some(NodeMetaFe { title: title.clone(), ..Default::default() }),
            outputs: vec![outer_output],
            inputs: Some(Inputs {
                input_parameters: batch_info.input_lists.clone(),
                batch_size: Some(literal_int(batch_info.batch_size)),
                concurrent_size: Some(literal_int(batch_info.concurrent_size)),
                ..Default::default()
            }),
        },
        blocks: vec![],
        edges: vec![],
        version: None,
    };

    let inner_inputs = Inputs {
        input_parameters: inputs.input_parameters.clone(),
        llm_param: inputs.llm_param.clone(),
        fc_param: inputs.fc_param.clone(),
        setting_on_error: inputs.setting_on_error.clone(),
        workflow_id: inputs.workflow_id.clone(),
        workflow_version: inputs.workflow_version.clone(),
        api_params: inputs.api_params.clone(),
        ..Default::default()
    };

    let inner = CanvasNode {
        id: inner_id.clone(),
        node_type: node.node_type.clone(),
        meta: None,
        data: NodeData {
            meta: Some(NodeMetaFe { title: format!("{title}_inner"), ..Default::default() }),
            outputs: inner_outputs,
            inputs: Some(inner_inputs),
        },
        blocks: vec![],
        edges: vec![],
        version: None,
    };

    parent.blocks = vec![inner];
    parent.edges = vec![
        CanvasEdge {
            source_node_id: node.id.clone(),
            target_node_id: inner_id.clone(),
            source_port_id: BATCH_INLINE_OUTPUT_PORT.to_string(),
            target_port_id: String::new(),
        },
        CanvasEdge {
            source_node_id: inner_id,
            target_node_id: node.id.clone(),
            source_port_id: String::new(),
            target_port_id: BATCH_INLINE_INPUT_PORT.to_string(),
        },
    ];

    Ok(Some(parent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{NodeBatch, NodeType, Param};
    use serde_json::json;

    fn batch_llm_node(outputs: Vec<Value>) -> CanvasNode {
        CanvasNode {
            id: "N".to_string(),
            node_type: NodeType::LLM.id_str().to_string(),
            data: NodeData {
                meta: Some(NodeMetaFe { title: "Ask".into(), ..Default::default() }),
                outputs,
                inputs: Some(Inputs {
                    node_batch_info: Some(NodeBatch {
                        batch_enable: true,
                        batch_size: 4,
                        concurrent_size: 2,
                        input_lists: vec![Param { name: "items".into(), ..Default::default() }],
                    }),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }
    }

    fn list_of_objects_output() -> Value {
        json!({
            "name": "results",
            "type": "list",
            "schema": {"name": "", "type": "object", "schema": [
                {"name": "answer", "type": "string"}
            ]}
        })
    }

    #[test]
    fn test_expansion_shape() {
        let node = batch_llm_node(vec![list_of_objects_output()]);
        let parent = parse_batch_mode(&node).unwrap().unwrap();

        assert_eq!(parent.node_type, NodeType::Batch.id_str());
        assert_eq!(parent.blocks.len(), 1);
        assert_eq!(parent.blocks[0].id, "N_inner");
        assert_eq!(parent.blocks[0].node_type, NodeType::LLM.id_str());
        assert_eq!(parent.edges.len(), 2);
        assert_eq!(parent.edges[0].source_port_id, BATCH_INLINE_OUTPUT_PORT);
        assert_eq!(parent.edges[1].target_port_id, BATCH_INLINE_INPUT_PORT);
    }

    #[test]
    fn test_inner_gets_original_inputs_and_element_outputs() {
        let node = batch_llm_node(vec![list_of_objects_output()]);
        let parent = parse_batch_mode(&node).unwrap().unwrap();
        let inner = &parent.blocks[0];
        let inner_out = Variable::parse(&inner.data.outputs[0]).unwrap();
        assert_eq!(inner_out.name, "answer");
        assert_eq!(inner_out.var_type, VariableType::String);
    }

    #[test]
    fn test_not_enabled_passthrough() {
        let mut node = batch_llm_node(vec![list_of_objects_output()]);
        node.data.inputs.as_mut().unwrap().node_batch_info.as_mut().unwrap().batch_enable = false;
        assert!(parse_batch_mode(&node).unwrap().is_none());
    }

    #[test]
    fn test_rejects_multiple_outputs() {
        let node = batch_llm_node(vec![list_of_objects_output(), list_of_objects_output()]);
        let err = parse_batch_mode(&node).unwrap_err();
        assert!(err.to_string().contains("should be one list"));
    }

    #[test]
    fn test_rejects_non_list_output() {
        let node = batch_llm_node(vec![json!({"name": "answer", "type": "string"})]);
        let err = parse_batch_mode(&node).unwrap_err();
        assert!(err.to_string().contains("should be list"));
    }

    #[test]
    fn test_rejects_non_object_element() {
        let node = batch_llm_node(vec![json!({
            "name": "results",
            "type": "list",
            "schema": {"name": "", "type": "string"}
        })]);
        let err = parse_batch_mode(&node).unwrap_err();
        assert!(err.to_string().contains("element should be object"));
    }
}
