//! Output emitter: streams intermediate content to the caller.

use super::helpers::{add_input, base_schema, field_source, literal_string, set_inputs};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType};
use crate::error::WorkflowResult;
use crate::schema::configs::EmitterConfig;
use crate::schema::{NodeConfig, NodeSchema, StreamConfig};

pub struct EmitterAdaptor;

impl NodeAdaptor for EmitterAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let inputs = node.data.inputs.as_ref();

        let content = inputs.and_then(|i| i.content.as_ref());
        let content_template = content.and_then(literal_string);
        let streaming_output = inputs.map(|i| i.streaming_output).unwrap_or(false);

        let config = EmitterConfig { content_template: content_template.clone(), streaming_output };
        let mut ns = base_schema(node, NodeType::OutputEmitter, NodeConfig::Emitter(config))?;

        if let Some(inputs) = inputs {
            set_inputs(&mut ns, &inputs.input_parameters);
        }
        // referenced content becomes an input slot rather than a template
        if let Some(content) = content {
            if content_template.is_none() && field_source(content).is_some() {
                add_input(&mut ns, "content", content);
            }
        }

        // an emitter both consumes upstream streams and re-emits
        ns.stream_configs = Some(StreamConfig {
            can_generate_stream: true,
            requires_streaming_input: true,
        });
        Ok(ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use serde_json::json;

    #[test]
    fn test_emitter_with_referenced_content() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "emit",
            "type": "13",
            "data": {
                "inputs": {
                    "streamingOutput": true,
                    "content": {
                        "type": "string",
                        "value": {"type": "ref", "content": {
                            "source": "block-output", "blockID": "llm", "name": "output"
                        }}
                    }
                }
            }
        }))
        .unwrap();
        let canvas = Canvas::default();
        let ns = EmitterAdaptor.adapt(&node, &AdaptContext { canvas: &canvas }).unwrap();
        assert!(ns.can_generate_stream());
        assert!(ns.requires_streaming_input());
        assert_eq!(ns.input_sources.len(), 1);
    }
}
