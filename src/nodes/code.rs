//! Code runner and HTTP requester adaptors.

use super::helpers::{base_schema, set_inputs, set_output_variables};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType};
use crate::error::{WorkflowError, WorkflowResult};
use crate::schema::configs::{CodeConfig, HttpConfig};
use crate::schema::{NodeConfig, NodeSchema, TypeInfo};

pub struct CodeAdaptor;

impl NodeAdaptor for CodeAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let inputs = super::helpers::require_inputs(node)?;
        if inputs.code.is_empty() {
            return Err(WorkflowError::SchemaConversionFail {
                node_key: node.id.clone(),
                reason: "code node has no code".to_string(),
            });
        }
        let config = CodeConfig { code: inputs.code.clone(), language: inputs.language.unwrap_or(0) };

        let mut ns = base_schema(node, NodeType::CodeRunner, NodeConfig::CodeRunner(config))?;
        set_inputs(&mut ns, &inputs.input_parameters);
        set_output_variables(&mut ns, &node.data.outputs)?;
        Ok(ns)
    }
}

pub struct HttpAdaptor;

impl NodeAdaptor for HttpAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let inputs = super::helpers::require_inputs(node)?;
        let api = inputs.api_info.as_ref().ok_or_else(|| WorkflowError::SchemaConversionFail {
            node_key: node.id.clone(),
            reason: "http node has no apiInfo".to_string(),
        })?;

        let config = HttpConfig {
            method: api.method.clone(),
            url: api.url.clone(),
            body_type: inputs.body.as_ref().map(|b| b.body_type.clone()).unwrap_or_default(),
            timeout_secs: inputs.setting.as_ref().map(|s| s.timeout).unwrap_or(0),
            retry_times: inputs.setting.as_ref().map(|s| s.retry_times).unwrap_or(0),
            auth_open: inputs.auth.as_ref().map(|a| a.auth_open).unwrap_or(false),
        };

        let mut ns = base_schema(node, NodeType::HTTPRequester, NodeConfig::HttpRequester(config))?;
        set_inputs(&mut ns, &inputs.input_parameters);
        set_inputs(&mut ns, &inputs.headers);
        set_inputs(&mut ns, &inputs.params);

        if node.data.outputs.is_empty() {
            ns.output_types.insert("body".to_string(), TypeInfo::String);
            ns.output_types.insert("statusCode".to_string(), TypeInfo::Integer);
            ns.output_types.insert("headers".to_string(), TypeInfo::String);
        } else {
            set_output_variables(&mut ns, &node.data.outputs)?;
        }
        Ok(ns)
    }
}
