//! Plugin node: invokes one tool of a registered plugin.

use super::helpers::{base_schema, literal_string, set_inputs, set_output_variables};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType, Param};
use crate::error::{WorkflowError, WorkflowResult};
use crate::schema::configs::PluginConfig;
use crate::schema::{NodeConfig, NodeSchema, TypeInfo};

pub struct PluginAdaptor;

fn api_param<'a>(params: &'a [Param], name: &str) -> Option<&'a Param> {
    params.iter().find(|p| p.name == name)
}

impl NodeAdaptor for PluginAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let inputs = super::helpers::require_inputs(node)?;

        let id_of = |name: &str| -> WorkflowResult<i64> {
            api_param(&inputs.api_params, name)
                .and_then(|p| p.input.as_ref())
                .and_then(literal_string)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| WorkflowError::SchemaConversionFail {
                    node_key: node.id.clone(),
                    reason: format!("{name} param is not found"),
                })
        };

        let config = PluginConfig {
            plugin_id: id_of("pluginID")?,
            tool_id: id_of("apiID")?,
            plugin_version: api_param(&inputs.api_params, "pluginVersion")
                .and_then(|p| p.input.as_ref())
                .and_then(literal_string)
                .unwrap_or_default(),
            tool_name: api_param(&inputs.api_params, "apiName")
                .and_then(|p| p.input.as_ref())
                .and_then(literal_string)
                .unwrap_or_default(),
        };

        let mut ns = base_schema(node, NodeType::Plugin, NodeConfig::Plugin(config))?;
        set_inputs(&mut ns, &inputs.input_parameters);
        if node.data.outputs.is_empty() {
            ns.output_types
                .insert("output".to_string(), TypeInfo::Object { fields: Default::default() });
        } else {
            set_output_variables(&mut ns, &node.data.outputs)?;
        }
        Ok(ns)
    }
}
