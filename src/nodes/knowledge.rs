//! Knowledge nodes: retrieval, indexing, deletion.

use super::helpers::{base_schema, set_inputs, set_output_variables};
use super::{AdaptContext, AdaptorFactory, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType};
use crate::error::{WorkflowError, WorkflowResult};
use crate::schema::configs::{KnowledgeConfig, KnowledgeOp};
use crate::schema::{NodeConfig, NodeSchema, TypeInfo};
use serde_json::Value;

pub struct KnowledgeAdaptor {
    pub op: KnowledgeOp,
    pub node_type: NodeType,
}

pub static KNOWLEDGE_OPS: &[(NodeType, AdaptorFactory)] = &[
    (NodeType::KnowledgeRetriever, || {
        Box::new(KnowledgeAdaptor { op: KnowledgeOp::Retrieve, node_type: NodeType::KnowledgeRetriever })
    }),
    (NodeType::KnowledgeIndexer, || {
        Box::new(KnowledgeAdaptor { op: KnowledgeOp::Index, node_type: NodeType::KnowledgeIndexer })
    }),
    (NodeType::KnowledgeDeleter, || {
        Box::new(KnowledgeAdaptor { op: KnowledgeOp::Delete, node_type: NodeType::KnowledgeDeleter })
    }),
];

/// Dataset ids arrive as the literal content of the first `datasetParam`
/// entry: an array of id strings.
pub fn knowledge_ids(node: &CanvasNode) -> WorkflowResult<Vec<i64>> {
    let Some(inputs) = node.data.inputs.as_ref() else {
        return Ok(vec![]);
    };
    let Some(param) = inputs.dataset_param.first() else {
        return Ok(vec![]);
    };
    let content = param
        .input
        .as_ref()
        .and_then(|i| i.value.as_ref())
        .and_then(|v| v.content.as_ref());

    let mut ids = Vec::new();
    if let Some(Value::Array(items)) = content {
        for item in items {
            let id = match item {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            match id {
                Some(id) => ids.push(id),
                None => {
                    return Err(WorkflowError::SchemaConversionFail {
                        node_key: node.id.clone(),
                        reason: format!("bad knowledge id: {item}"),
                    })
                }
            }
        }
    }
    Ok(ids)
}

impl NodeAdaptor for KnowledgeAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let ids = knowledge_ids(node)?;
        let strategy = node.data.inputs.as_ref().and_then(|i| i.strategy_param.clone());

        let config = KnowledgeConfig { op: self.op, knowledge_ids: ids, strategy };
        let mut ns = base_schema(node, self.node_type, NodeConfig::Knowledge(config))?;

        if let Some(inputs) = node.data.inputs.as_ref() {
            set_inputs(&mut ns, &inputs.input_parameters);
        }
        if node.data.outputs.is_empty() {
            if self.op == KnowledgeOp::Retrieve {
                ns.output_types.insert(
                    "outputList".to_string(),
                    TypeInfo::list(TypeInfo::Object { fields: Default::default() }),
                );
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
    fn test_knowledge_ids_parsed() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "k1",
            "type": "6",
            "data": {"inputs": {"datasetParam": [{
                "name": "datasetList",
                "input": {"type": "list", "value": {"type": "literal", "content": ["101", "102"]}}
            }]}}
        }))
        .unwrap();
        assert_eq!(knowledge_ids(&node).unwrap(), vec![101, 102]);

        let canvas = Canvas::default();
        let adaptor =
            KnowledgeAdaptor { op: KnowledgeOp::Retrieve, node_type: NodeType::KnowledgeRetriever };
        let ns = adaptor.adapt(&node, &AdaptContext { canvas: &canvas }).unwrap();
        match &ns.configs {
            NodeConfig::Knowledge(c) => assert_eq!(c.knowledge_ids, vec![101, 102]),
            other => panic!("unexpected config: {other:?}"),
        }
        assert!(ns.output_types.contains_key("outputList"));
    }

    #[test]
    fn test_bad_knowledge_id() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "k1",
            "type": "6",
            "data": {"inputs": {"datasetParam": [{
                "input": {"type": "list", "value": {"type": "literal", "content": ["abc"]}}
            }]}}
        }))
        .unwrap();
        assert!(knowledge_ids(&node).is_err());
    }
}
