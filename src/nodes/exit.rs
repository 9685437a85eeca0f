//! Exit node: returns variables or emits answer content.

use super::helpers::{base_schema, literal_string, set_inputs};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType, TerminatePlan};
use crate::error::WorkflowResult;
use crate::schema::configs::ExitConfig;
use crate::schema::{NodeConfig, NodeSchema, StreamConfig};

pub struct ExitAdaptor;

impl NodeAdaptor for ExitAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let inputs = node.data.inputs.as_ref();

        let terminate_plan = inputs
            .and_then(|i| i.terminate_plan)
            .unwrap_or(TerminatePlan::ReturnVariables);
        let content_template =
            inputs.and_then(|i| i.content.as_ref()).and_then(literal_string);
        let streaming_output = inputs.map(|i| i.streaming_output).unwrap_or(false);

        let config = ExitConfig { terminate_plan, content_template, streaming_output };
        let mut ns = base_schema(node, NodeType::Exit, NodeConfig::Exit(config))?;

        if let Some(inputs) = inputs {
            set_inputs(&mut ns, &inputs.input_parameters);
        }

        if terminate_plan == TerminatePlan::UseAnswerContent {
            ns.stream_configs = Some(StreamConfig {
                can_generate_stream: false,
                requires_streaming_input: true,
            });
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
    fn test_exit_answer_mode_consumes_streams() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "900001",
            "type": "2",
            "data": {
                "nodeMeta": {"title": "End"},
                "inputs": {
                    "terminatePlan": "useAnswerContent",
                    "streamingOutput": true,
                    "inputParameters": [{
                        "name": "output",
                        "input": {
                            "type": "string",
                            "value": {"type": "ref", "content": {
                                "source": "block-output", "blockID": "llm", "name": "output"
                            }}
                        }
                    }]
                }
            }
        }))
        .unwrap();

        let canvas = Canvas::default();
        let ns = ExitAdaptor.adapt(&node, &AdaptContext { canvas: &canvas }).unwrap();
        assert!(ns.requires_streaming_input());
        assert_eq!(ns.input_sources.len(), 1);
        match &ns.configs {
            NodeConfig::Exit(c) => {
                assert_eq!(c.terminate_plan, TerminatePlan::UseAnswerContent);
                assert!(c.streaming_output);
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn test_exit_defaults_to_return_variables() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "900001",
            "type": "2",
            "data": {"inputs": {"inputParameters": []}}
        }))
        .unwrap();
        let canvas = Canvas::default();
        let ns = ExitAdaptor.adapt(&node, &AdaptContext { canvas: &canvas }).unwrap();
        assert!(ns.stream_configs.is_none());
        match &ns.configs {
            NodeConfig::Exit(c) => assert_eq!(c.terminate_plan, TerminatePlan::ReturnVariables),
            other => panic!("unexpected config: {other:?}"),
        }
    }
}
