//! JSON serialization / deserialization nodes.

use super::helpers::{base_schema, set_inputs, set_output_variables};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType};
use crate::error::WorkflowResult;
use crate::schema::{NodeConfig, NodeSchema, TypeInfo};

pub struct JsonSerializationAdaptor;

impl NodeAdaptor for JsonSerializationAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let mut ns = base_schema(node, NodeType::JsonSerialization, NodeConfig::JsonSerialization)?;
        if let Some(inputs) = node.data.inputs.as_ref() {
            set_inputs(&mut ns, &inputs.input_parameters);
        }
        ns.output_types.insert("output".to_string(), TypeInfo::String);
        Ok(ns)
    }
}

pub struct JsonDeserializationAdaptor;

impl NodeAdaptor for JsonDeserializationAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let mut ns =
            base_schema(node, NodeType::JsonDeserialization, NodeConfig::JsonDeserialization)?;
        if let Some(inputs) = node.data.inputs.as_ref() {
            set_inputs(&mut ns, &inputs.input_parameters);
        }
        set_output_variables(&mut ns, &node.data.outputs)?;
        Ok(ns)
    }
}
