//! Variable assigner and aggregator nodes.

use super::helpers::{add_input, base_schema, field_source, set_outputs_auto};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType};
use crate::error::{WorkflowError, WorkflowResult};
use crate::schema::configs::{VariableAggregatorConfig, VariableAssignerConfig};
use crate::schema::{FieldSource, NodeConfig, NodeSchema, TypeInfo};

/// Assigns values to workflow (or loop-local) variables. Each
/// `input_parameters` entry is a `left := right` pair.
pub struct VariableAssignerAdaptor {
    pub within_loop: bool,
}

impl NodeAdaptor for VariableAssignerAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let mut targets = Vec::new();
        let mut pending = Vec::new();

        if let Some(inputs) = node.data.inputs.as_ref() {
            for (idx, param) in inputs.input_parameters.iter().enumerate() {
                let left = param.left.as_ref().ok_or_else(|| {
                    WorkflowError::SchemaConversionFail {
                        node_key: node.id.clone(),
                        reason: format!("assignment {idx} has no left side"),
                    }
                })?;
                let target = match field_source(left) {
                    Some(FieldSource::Ref { from_node, mut from_path }) => {
                        // loop-local variables address the enclosing scope
                        let mut path = vec![from_node];
                        path.append(&mut from_path);
                        path
                    }
                    Some(FieldSource::Global { mut path, .. }) => {
                        let mut full = vec!["global".to_string()];
                        full.append(&mut path);
                        full
                    }
                    _ => {
                        return Err(WorkflowError::SchemaConversionFail {
                            node_key: node.id.clone(),
                            reason: format!("assignment {idx} left side must be a reference"),
                        })
                    }
                };
                targets.push(target);

                if let Some(right) = &param.right {
                    pending.push((format!("assign_{idx}"), right.clone()));
                }
            }
        }

        let config = VariableAssignerConfig { targets };
        let node_type = if self.within_loop {
            NodeType::VariableAssignerWithinLoop
        } else {
            NodeType::VariableAssigner
        };
        let configs = if self.within_loop {
            NodeConfig::VariableAssignerWithinLoop(config)
        } else {
            NodeConfig::VariableAssigner(config)
        };

        let mut ns = base_schema(node, node_type, configs)?;
        for (key, input) in &pending {
            add_input(&mut ns, key, input);
        }
        Ok(ns)
    }
}

/// Merges groups of candidate values; each group yields its first non-null
/// member.
pub struct VariableAggregatorAdaptor;

impl NodeAdaptor for VariableAggregatorAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let mut groups = Vec::new();
        let mut pending = Vec::new();

        if let Some(inputs) = node.data.inputs.as_ref() {
            for group in &inputs.merge_groups {
                groups.push(group.name.clone());
                for (idx, member) in group.variables.iter().enumerate() {
                    pending.push((format!("{}_{idx}", group.name), member.clone()));
                }
            }
        }

        let mut ns = base_schema(
            node,
            NodeType::VariableAggregator,
            NodeConfig::VariableAggregator(VariableAggregatorConfig { groups: groups.clone() }),
        )?;
        for (key, input) in &pending {
            add_input(&mut ns, key, input);
        }
        if node.data.outputs.is_empty() {
            for group in groups {
                ns.output_types.insert(group, TypeInfo::Any);
            }
        } else {
            set_outputs_auto(&mut ns, &node.data.outputs)?;
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
    fn test_assigner_targets() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "setter",
            "type": "40",
            "data": {"inputs": {"inputParameters": [{
                "name": "pair0",
                "left": {"type": "integer", "value": {"type": "ref", "content": {
                    "source": "block-output", "blockID": "loop1", "name": "counter"
                }}},
                "right": {"type": "integer", "value": {"type": "literal", "content": "5"}}
            }]}}
        }))
        .unwrap();
        let canvas = Canvas::default();
        let adaptor = VariableAssignerAdaptor { within_loop: true };
        let ns = adaptor.adapt(&node, &AdaptContext { canvas: &canvas }).unwrap();
        match &ns.configs {
            NodeConfig::VariableAssignerWithinLoop(c) => {
                assert_eq!(c.targets, vec![vec!["loop1".to_string(), "counter".to_string()]]);
            }
            other => panic!("unexpected config: {other:?}"),
        }
        assert_eq!(ns.input_sources.len(), 1);
    }

    #[test]
    fn test_assigner_rejects_literal_left() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "setter",
            "type": "20",
            "data": {"inputs": {"inputParameters": [{
                "name": "pair0",
                "left": {"type": "string", "value": {"type": "literal", "content": "x"}},
                "right": {"type": "string", "value": {"type": "literal", "content": "y"}}
            }]}}
        }))
        .unwrap();
        let canvas = Canvas::default();
        let adaptor = VariableAssignerAdaptor { within_loop: false };
        assert!(adaptor.adapt(&node, &AdaptContext { canvas: &canvas }).is_err());
    }

    #[test]
    fn test_aggregator_groups() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "agg",
            "type": "32",
            "data": {"inputs": {"mergeGroups": [{
                "name": "Group1",
                "variables": [
                    {"type": "string", "value": {"type": "ref", "content": {
                        "source": "block-output", "blockID": "a", "name": "x"
                    }}},
                    {"type": "string", "value": {"type": "ref", "content": {
                        "source": "block-output", "blockID": "b", "name": "y"
                    }}}
                ]
            }]}}
        }))
        .unwrap();
        let canvas = Canvas::default();
        let ns =
            VariableAggregatorAdaptor.adapt(&node, &AdaptContext { canvas: &canvas }).unwrap();
        match &ns.configs {
            NodeConfig::VariableAggregator(c) => assert_eq!(c.groups, vec!["Group1".to_string()]),
            other => panic!("unexpected config: {other:?}"),
        }
        assert_eq!(ns.input_sources.len(), 2);
        assert!(ns.output_types.contains_key("Group1"));
    }
}
