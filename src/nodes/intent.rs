//! Intent detector node.

use super::helpers::{base_schema, set_inputs};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType};
use crate::error::WorkflowResult;
use crate::schema::configs::{IntentDetectorConfig, LlmModelParams};
use crate::schema::{NodeConfig, NodeSchema, TypeInfo};
use serde_json::Value;

pub struct IntentDetectorAdaptor;

impl NodeAdaptor for IntentDetectorAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let inputs = node.data.inputs.as_ref();

        let intents = inputs
            .map(|i| i.intents.iter().map(|x| x.name.clone()).collect())
            .unwrap_or_default();

        // intent detectors carry their LLM params as a flat map
        let mut model = LlmModelParams::default();
        if let Some(Value::Object(map)) = inputs.and_then(|i| i.llm_param.as_ref()) {
            if let Some(name) = map.get("modelName").and_then(Value::as_str) {
                model.model_name = name.to_string();
            }
            if let Some(t) = map.get("modelType").and_then(Value::as_i64) {
                model.model_type = t;
            }
            model.temperature = map.get("temperature").and_then(Value::as_f64);
            model.top_p = map.get("topP").and_then(Value::as_f64);
            if let Some(mt) = map.get("maxTokens").and_then(Value::as_i64) {
                model.max_tokens = Some(mt);
            }
            if let Some(sp) = map.get("systemPrompt") {
                model.system_prompt = match sp {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
        }

        let (enable_chat_history, chat_history_rounds) = inputs
            .and_then(|i| i.chat_history_setting.as_ref())
            .map(|h| (h.enable_chat_history, h.chat_history_round))
            .unwrap_or((false, 0));

        let config = IntentDetectorConfig {
            intents,
            mode: inputs
                .and_then(|i| i.llm_param.as_ref())
                .and_then(|v| v.get("mode"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            model,
            enable_chat_history,
            chat_history_rounds,
        };

        let mut ns =
            base_schema(node, NodeType::IntentDetector, NodeConfig::IntentDetector(config))?;
        if let Some(inputs) = inputs {
            set_inputs(&mut ns, &inputs.input_parameters);
        }
        ns.output_types.insert("classificationId".to_string(), TypeInfo::Integer);
        Ok(ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use serde_json::json;

    #[test]
    fn test_intent_detector_config() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "intent",
            "type": "22",
            "data": {"inputs": {
                "intents": [{"name": "refund"}, {"name": "praise"}],
                "llmParam": {"modelName": "m1", "modelType": 2},
                "chatHistorySetting": {"enableChatHistory": true, "chatHistoryRound": 3}
            }}
        }))
        .unwrap();
        let canvas = Canvas::default();
        let ns =
            IntentDetectorAdaptor.adapt(&node, &AdaptContext { canvas: &canvas }).unwrap();
        match &ns.configs {
            NodeConfig::IntentDetector(c) => {
                assert_eq!(c.intents, vec!["refund".to_string(), "praise".to_string()]);
                assert_eq!(c.model.model_name, "m1");
                assert!(c.enable_chat_history);
            }
            other => panic!("unexpected config: {other:?}"),
        }
        assert_eq!(ns.configs.chat_history_rounds(), Some(3));
        assert_eq!(ns.output_types.get("classificationId"), Some(&TypeInfo::Integer));
    }
}
