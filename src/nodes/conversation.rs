//! Conversation and message nodes.

use super::helpers::{base_schema, set_inputs, set_output_variables};
use super::{AdaptContext, AdaptorFactory, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType};
use crate::error::WorkflowResult;
use crate::schema::configs::{ConversationConfig, ConversationOp};
use crate::schema::{NodeConfig, NodeSchema, TypeInfo};

pub struct ConversationAdaptor {
    pub op: ConversationOp,
    pub node_type: NodeType,
}

pub static CONVERSATION_OPS: &[(NodeType, AdaptorFactory)] = &[
    (NodeType::CreateConversation, || {
        Box::new(ConversationAdaptor { op: ConversationOp::Create, node_type: NodeType::CreateConversation })
    }),
    (NodeType::ConversationUpdate, || {
        Box::new(ConversationAdaptor { op: ConversationOp::Update, node_type: NodeType::ConversationUpdate })
    }),
    (NodeType::ConversationDelete, || {
        Box::new(ConversationAdaptor { op: ConversationOp::Delete, node_type: NodeType::ConversationDelete })
    }),
    (NodeType::ConversationList, || {
        Box::new(ConversationAdaptor { op: ConversationOp::List, node_type: NodeType::ConversationList })
    }),
    (NodeType::ConversationHistory, || {
        Box::new(ConversationAdaptor { op: ConversationOp::History, node_type: NodeType::ConversationHistory })
    }),
    (NodeType::ClearConversationHistory, || {
        Box::new(ConversationAdaptor { op: ConversationOp::ClearHistory, node_type: NodeType::ClearConversationHistory })
    }),
    (NodeType::CreateMessage, || {
        Box::new(ConversationAdaptor { op: ConversationOp::CreateMessage, node_type: NodeType::CreateMessage })
    }),
    (NodeType::EditMessage, || {
        Box::new(ConversationAdaptor { op: ConversationOp::EditMessage, node_type: NodeType::EditMessage })
    }),
    (NodeType::DeleteMessage, || {
        Box::new(ConversationAdaptor { op: ConversationOp::DeleteMessage, node_type: NodeType::DeleteMessage })
    }),
    (NodeType::MessageList, || {
        Box::new(ConversationAdaptor { op: ConversationOp::MessageList, node_type: NodeType::MessageList })
    }),
];

impl NodeAdaptor for ConversationAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let mut ns = base_schema(
            node,
            self.node_type,
            NodeConfig::Conversation(ConversationConfig { op: self.op }),
        )?;
        if let Some(inputs) = node.data.inputs.as_ref() {
            set_inputs(&mut ns, &inputs.input_parameters);
        }
        if node.data.outputs.is_empty() {
            match self.op {
                ConversationOp::List | ConversationOp::History | ConversationOp::MessageList => {
                    ns.output_types.insert(
                        "outputList".to_string(),
                        TypeInfo::list(TypeInfo::Object { fields: Default::default() }),
                    );
                }
                ConversationOp::Delete
                | ConversationOp::ClearHistory
                | ConversationOp::DeleteMessage => {
                    ns.output_types.insert("isSuccess".to_string(), TypeInfo::Boolean);
                }
                _ => {
                    ns.output_types.insert(
                        "output".to_string(),
                        TypeInfo::Object { fields: Default::default() },
                    );
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
    fn test_history_default_outputs() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "conv",
            "type": "50",
            "data": {"inputs": {"inputParameters": []}}
        }))
        .unwrap();
        let canvas = Canvas::default();
        let adaptor = ConversationAdaptor {
            op: ConversationOp::History,
            node_type: NodeType::ConversationHistory,
        };
        let ns = adaptor.adapt(&node, &AdaptContext { canvas: &canvas }).unwrap();
        assert!(ns.output_types.contains_key("outputList"));
    }
}
