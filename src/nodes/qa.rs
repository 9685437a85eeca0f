//! Question-answer node: asks the user and waits for a reply.

use super::helpers::{base_schema, set_inputs, set_output_variables};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType, QaAnswerType};
use crate::error::{WorkflowError, WorkflowResult};
use crate::schema::configs::QuestionAnswerConfig;
use crate::schema::{NodeConfig, NodeSchema, TypeInfo};

pub struct QuestionAnswerAdaptor;

impl NodeAdaptor for QuestionAnswerAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let inputs = super::helpers::require_inputs(node)?;

        let answer_type =
            inputs.answer_type.ok_or_else(|| WorkflowError::SchemaConversionFail {
                node_key: node.id.clone(),
                reason: "question node has no answer type".to_string(),
            })?;

        let config = QuestionAnswerConfig {
            question: inputs.question.clone().unwrap_or_default(),
            answer_type,
            option_type: inputs.option_type,
            options: inputs.options.iter().map(|o| o.name.clone()).collect(),
            extract_output: false,
        };

        let mut ns =
            base_schema(node, NodeType::QuestionAnswer, NodeConfig::QuestionAnswer(config))?;
        set_inputs(&mut ns, &inputs.input_parameters);

        if node.data.outputs.is_empty() {
            match answer_type {
                QaAnswerType::Text => {
                    ns.output_types.insert("USER_RESPONSE".to_string(), TypeInfo::String);
                }
                QaAnswerType::Option => {
                    ns.output_types.insert("optionId".to_string(), TypeInfo::Integer);
                    ns.output_types.insert("optionContent".to_string(), TypeInfo::String);
                }
            }
        } else {
            set_output_variables(&mut ns, &node.data.outputs)?;
        }
        Ok(ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use serde_json::json;

    #[test]
    fn test_qa_option_mode() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "qa",
            "type": "18",
            "data": {"inputs": {
                "answer_type": "option",
                "question": "Which one?",
                "option_type": "static",
                "options": [{"name": "A"}, {"name": "B"}]
            }}
        }))
        .unwrap();
        let canvas = Canvas::default();
        let ns = QuestionAnswerAdaptor.adapt(&node, &AdaptContext { canvas: &canvas }).unwrap();
        assert!(ns.configs.require_checkpoint());
        assert!(ns.output_types.contains_key("optionId"));
        match &ns.configs {
            NodeConfig::QuestionAnswer(c) => {
                assert_eq!(c.options, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }
}
