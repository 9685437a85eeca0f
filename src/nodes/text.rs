//! Text processor node: concat or split.

use super::helpers::{base_schema, literal_string, set_inputs};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::model::TextProcessingMethod;
use crate::canvas::{CanvasNode, NodeType};
use crate::error::{WorkflowError, WorkflowResult};
use crate::schema::configs::TextProcessorConfig;
use crate::schema::{NodeConfig, NodeSchema, TypeInfo};

pub struct TextProcessorAdaptor;

impl NodeAdaptor for TextProcessorAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let inputs = super::helpers::require_inputs(node)?;
        let method = inputs.method.ok_or_else(|| WorkflowError::SchemaConversionFail {
            node_key: node.id.clone(),
            reason: "text processor has no method".to_string(),
        })?;

        let template = inputs
            .concat_params
            .iter()
            .find(|p| p.name == "concatResult")
            .and_then(|p| p.input.as_ref())
            .and_then(literal_string);

        let separators = inputs
            .split_params
            .iter()
            .filter(|p| p.name == "delimiters" || p.name == "delimiter")
            .filter_map(|p| p.input.as_ref())
            .filter_map(|i| i.value.as_ref())
            .filter_map(|v| v.content.clone())
            .flat_map(|content| match content {
                serde_json::Value::String(s) => vec![s],
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect(),
                _ => vec![],
            })
            .collect();

        let config = TextProcessorConfig { method, template, separators };
        let mut ns = base_schema(node, NodeType::TextProcessor, NodeConfig::TextProcessor(config))?;
        set_inputs(&mut ns, &inputs.input_parameters);

        match method {
            TextProcessingMethod::Concat => {
                ns.output_types.insert("output".to_string(), TypeInfo::String);
            }
            TextProcessingMethod::Split => {
                ns.output_types
                    .insert("output".to_string(), TypeInfo::list(TypeInfo::String));
            }
        }
        Ok(ns)
    }
}
