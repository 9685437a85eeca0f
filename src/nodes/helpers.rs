//! Shared plumbing for node adaptors.

use crate::canvas::{
    BlockInput, BlockInputReference, BlockInputValueType, CanvasNode, Inputs, NodeType, Param,
    RefSourceType, Variable,
};
use crate::error::{WorkflowError, WorkflowResult};
use crate::schema::{
    FieldInfo, FieldSource, GlobalVarScope, NodeConfig, NodeSchema, TypeInfo,
};
use serde_json::Value;

/// Start a schema with key/type/name filled from the canvas node.
pub fn base_schema(
    node: &CanvasNode,
    node_type: NodeType,
    configs: NodeConfig,
) -> WorkflowResult<NodeSchema> {
    let name = node
        .data
        .meta
        .as_ref()
        .map(|m| m.title.clone())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| node_type.meta().name.to_string());

    Ok(NodeSchema {
        key: node.id.clone(),
        node_type,
        name,
        input_types: Default::default(),
        input_sources: vec![],
        output_types: Default::default(),
        output_sources: vec![],
        configs,
        exception_configs: None,
        stream_configs: None,
        sub_workflow_basic: None,
        sub_workflow_schema: None,
    })
}

/// Translate a canvas input slot into a compiled field source.
pub fn field_source(input: &BlockInput) -> Option<FieldSource> {
    let value = input.value.as_ref()?;
    match value.value_type {
        BlockInputValueType::Literal => Some(FieldSource::Literal {
            value: value.content.clone().unwrap_or(Value::Null),
        }),
        BlockInputValueType::Ref | BlockInputValueType::ObjectRef => {
            let raw = value.content.clone()?;
            let reference: BlockInputReference = serde_json::from_value(raw).ok()?;
            Some(match reference.source {
                RefSourceType::BlockOutput => FieldSource::Ref {
                    from_node: reference.block_id.clone(),
                    from_path: reference.field_path(),
                },
                RefSourceType::GlobalApp => FieldSource::Global {
                    scope: GlobalVarScope::App,
                    path: reference.field_path(),
                },
                RefSourceType::GlobalSystem => FieldSource::Global {
                    scope: GlobalVarScope::System,
                    path: reference.field_path(),
                },
                RefSourceType::GlobalUser => FieldSource::Global {
                    scope: GlobalVarScope::User,
                    path: reference.field_path(),
                },
            })
        }
    }
}

/// Register one named input on the schema: declared type plus source.
pub fn add_input(ns: &mut NodeSchema, name: &str, input: &BlockInput) {
    ns.input_types.insert(name.to_string(), TypeInfo::from_block_input(input));
    if let Some(source) = field_source(input) {
        ns.input_sources.push(FieldInfo { path: vec![name.to_string()], source });
    }
}

/// Register every `input_parameters` entry as a typed input.
pub fn set_inputs(ns: &mut NodeSchema, params: &[Param]) {
    for param in params {
        if let Some(input) = &param.input {
            add_input(ns, &param.name, input);
        }
    }
}

/// Register plain output declarations (`Vec<Variable>` shape).
pub fn set_output_variables(ns: &mut NodeSchema, outputs: &[Value]) -> WorkflowResult<()> {
    for raw in outputs {
        let v = Variable::parse(raw).map_err(|e| WorkflowError::SchemaConversionFail {
            node_key: ns.key.clone(),
            reason: format!("bad output declaration: {e}"),
        })?;
        ns.output_types.insert(v.name.clone(), TypeInfo::from_variable(&v));
    }
    Ok(())
}

/// Register composite-style outputs (`Vec<Param>` shape, values referencing
/// child node outputs).
pub fn set_output_params(ns: &mut NodeSchema, outputs: &[Value]) -> WorkflowResult<()> {
    for raw in outputs {
        let param: Param =
            serde_json::from_value(raw.clone()).map_err(|e| WorkflowError::SchemaConversionFail {
                node_key: ns.key.clone(),
                reason: format!("bad output param: {e}"),
            })?;
        if let Some(input) = &param.input {
            ns.output_types.insert(param.name.clone(), TypeInfo::from_block_input(input));
            if let Some(source) = field_source(input) {
                ns.output_sources.push(FieldInfo { path: vec![param.name.clone()], source });
            }
        }
    }
    Ok(())
}

/// Outputs arrays are heterogeneous; route each entry by shape.
pub fn set_outputs_auto(ns: &mut NodeSchema, outputs: &[Value]) -> WorkflowResult<()> {
    for raw in outputs {
        let is_param = raw.get("input").is_some();
        if is_param {
            set_output_params(ns, std::slice::from_ref(raw))?;
        } else {
            set_output_variables(ns, std::slice::from_ref(raw))?;
        }
    }
    Ok(())
}

/// The node's `inputs` block, or an error naming the node.
pub fn require_inputs<'a>(node: &'a CanvasNode) -> WorkflowResult<&'a Inputs> {
    node.data.inputs.as_ref().ok_or_else(|| WorkflowError::SchemaConversionFail {
        node_key: node.id.clone(),
        reason: "node has no inputs block".to_string(),
    })
}

/// Literal integer content of a block input (the editor writes numbers as
/// strings).
pub fn literal_i64(input: &BlockInput) -> Option<i64> {
    let value = input.value.as_ref()?;
    if value.value_type != BlockInputValueType::Literal {
        return None;
    }
    match value.content.as_ref()? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Literal string content of a block input.
pub fn literal_string(input: &BlockInput) -> Option<String> {
    let value = input.value.as_ref()?;
    if value.value_type != BlockInputValueType::Literal {
        return None;
    }
    match value.content.as_ref()? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
