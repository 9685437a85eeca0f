//! LLM node: chat-model invocation with optional function-call tools.

use super::helpers::{base_schema, set_inputs, set_output_variables};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType, Param};
use crate::error::{WorkflowError, WorkflowResult};
use crate::schema::configs::{LlmConfig, LlmModelParams, ToolPluginRef, ToolWorkflowRef};
use crate::schema::{NodeConfig, NodeSchema, StreamConfig, TypeInfo};
use serde_json::Value;

pub struct LlmAdaptor;

impl NodeAdaptor for LlmAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let inputs = super::helpers::require_inputs(node)?;

        let mut config = LlmConfig::default();
        if let Some(raw) = &inputs.llm_param {
            config = parse_llm_param(raw, &node.id)?;
        }

        if let Some(history) = &inputs.chat_history_setting {
            config.enable_chat_history = history.enable_chat_history;
            config.chat_history_rounds = history.chat_history_round;
        }

        if let Some(fc) = &inputs.fc_param {
            if let Some(wf) = &fc.workflow_fc_param {
                for item in &wf.workflow_list {
                    let workflow_id = item.workflow_id.parse::<i64>().map_err(|_| {
                        WorkflowError::SchemaConversionFail {
                            node_key: node.id.clone(),
                            reason: format!("bad tool workflow id: {}", item.workflow_id),
                        }
                    })?;
                    config.workflow_tools.push(ToolWorkflowRef {
                        workflow_id,
                        workflow_version: item.workflow_version.clone(),
                        is_draft: item.is_draft,
                    });
                }
            }
            if let Some(pl) = &fc.plugin_fc_param {
                for item in &pl.plugin_list {
                    let plugin_id = item.plugin_id.parse::<i64>().unwrap_or_default();
                    let tool_id = item.api_id.parse::<i64>().unwrap_or_default();
                    config.plugin_tools.push(ToolPluginRef {
                        plugin_id,
                        tool_id,
                        plugin_version: item.plugin_version.clone(),
                        is_draft: item.is_draft,
                    });
                }
            }
            if let Some(kn) = &fc.knowledge_fc_param {
                for item in &kn.knowledge_list {
                    if let Ok(id) = item.id.parse::<i64>() {
                        config.knowledge_ids.push(id);
                    }
                }
            }
        }

        let mut ns = base_schema(node, NodeType::LLM, NodeConfig::Llm(config))?;
        set_inputs(&mut ns, &inputs.input_parameters);
        if node.data.outputs.is_empty() {
            ns.output_types.insert("output".to_string(), TypeInfo::String);
        } else {
            set_output_variables(&mut ns, &node.data.outputs)?;
        }
        ns.stream_configs = Some(StreamConfig {
            can_generate_stream: true,
            requires_streaming_input: false,
        });
        Ok(ns)
    }
}

/// The editor writes LLM params either as a param list (`[{name, input}]`)
/// or as a flat object; accept both.
fn parse_llm_param(raw: &Value, node_key: &str) -> WorkflowResult<LlmConfig> {
    let mut model = LlmModelParams::default();
    let mut prompt = String::new();
    let mut enable_chat_history = false;
    let mut chat_history_rounds = 0i64;

    let mut apply = |name: &str, content: &Value| {
        let as_str = || content.as_str().map(str::to_string).unwrap_or_else(|| content.to_string());
        let as_i64 = || {
            content
                .as_i64()
                .or_else(|| content.as_str().and_then(|s| s.parse().ok()))
                .unwrap_or_default()
        };
        let as_f64 =
            || content.as_f64().or_else(|| content.as_str().and_then(|s| s.parse().ok()));
        match name {
            "modelName" => model.model_name = as_str(),
            "modelType" => model.model_type = as_i64(),
            "temperature" => model.temperature = as_f64(),
            "topP" => model.top_p = as_f64(),
            "maxTokens" => model.max_tokens = Some(as_i64()),
            "systemPrompt" => model.system_prompt = as_str(),
            "responseFormat" => model.response_format = as_i64(),
            "prompt" => prompt = as_str(),
            "enableChatHistory" => enable_chat_history = content.as_bool().unwrap_or(false),
            "chatHistoryRound" => chat_history_rounds = as_i64(),
            _ => {}
        }
    };

    match raw {
        Value::Array(_) => {
            let params: Vec<Param> = serde_json::from_value(raw.clone()).map_err(|e| {
                WorkflowError::SchemaConversionFail {
                    node_key: node_key.to_string(),
                    reason: format!("bad llmParam list: {e}"),
                }
            })?;
            for param in &params {
                let content = param
                    .input
                    .as_ref()
                    .and_then(|i| i.value.as_ref())
                    .and_then(|v| v.content.clone())
                    .unwrap_or(Value::Null);
                apply(&param.name, &content);
            }
        }
        Value::Object(map) => {
            for (name, content) in map {
                apply(name, content);
            }
        }
        other => {
            return Err(WorkflowError::SchemaConversionFail {
                node_key: node_key.to_string(),
                reason: format!("unexpected llmParam shape: {other}"),
            })
        }
    }

    Ok(LlmConfig {
        model,
        prompt,
        enable_chat_history,
        chat_history_rounds,
        workflow_tools: vec![],
        plugin_tools: vec![],
        knowledge_ids: vec![],
    })
}
