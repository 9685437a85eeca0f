//! Selector node: multi-branch conditional routing.

use super::helpers::{add_input, base_schema};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::model::{LogicType, OperatorType};
use crate::canvas::{CanvasNode, NodeType};
use crate::error::WorkflowResult;
use crate::schema::configs::{
    BranchCondition, ConditionClause, ConditionLogic, ConditionOperator, SelectorConfig,
};
use crate::schema::{NodeConfig, NodeSchema};

pub struct SelectorAdaptor;

impl NodeAdaptor for SelectorAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let mut branches = Vec::new();
        let mut pending_inputs: Vec<(String, crate::canvas::BlockInput)> = Vec::new();

        if let Some(inputs) = node.data.inputs.as_ref() {
            for (bi, branch) in inputs.branches.iter().enumerate() {
                let mut clauses = Vec::new();
                for (ci, cond) in branch.condition.conditions.iter().enumerate() {
                    let left_key = format!("branch_{bi}_clause_{ci}_left");
                    let mut right_key = None;

                    if let Some(left) = &cond.left.input {
                        pending_inputs.push((left_key.clone(), left.clone()));
                    }
                    if let Some(right) = cond.right.as_ref().and_then(|p| p.input.as_ref()) {
                        let key = format!("branch_{bi}_clause_{ci}_right");
                        pending_inputs.push((key.clone(), right.clone()));
                        right_key = Some(key);
                    }

                    clauses.push(ConditionClause {
                        operator: convert_operator(cond.operator),
                        left_key,
                        right_key,
                    });
                }
                branches.push(BranchCondition {
                    logic: match branch.condition.logic {
                        LogicType::And => ConditionLogic::And,
                        LogicType::Or => ConditionLogic::Or,
                    },
                    clauses,
                });
            }
        }

        let mut ns = base_schema(
            node,
            NodeType::Selector,
            NodeConfig::Selector(SelectorConfig { branches }),
        )?;
        for (key, input) in &pending_inputs {
            add_input(&mut ns, key, input);
        }
        Ok(ns)
    }
}

fn convert_operator(op: OperatorType) -> ConditionOperator {
    use ConditionOperator as C;
    use OperatorType as O;
    match op {
        O::Equal => C::Equal,
        O::NotEqual => C::NotEqual,
        O::LengthGreaterThan => C::LengthGreaterThan,
        O::LengthGreaterThanEqual => C::LengthGreaterThanEqual,
        O::LengthLessThan => C::LengthLessThan,
        O::LengthLessThanEqual => C::LengthLessThanEqual,
        O::Contain => C::Contain,
        O::NotContain => C::NotContain,
        O::Empty => C::Empty,
        O::NotEmpty => C::NotEmpty,
        O::True => C::True,
        O::False => C::False,
        O::GreaterThan => C::GreaterThan,
        O::GreaterThanEqual => C::GreaterThanEqual,
        O::LessThan => C::LessThan,
        O::LessThanEqual => C::LessThanEqual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use serde_json::json;

    #[test]
    fn test_selector_branches_and_condition_inputs() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "sel",
            "type": "8",
            "data": {
                "inputs": {
                    "branches": [{
                        "condition": {
                            "logic": 2,
                            "conditions": [{
                                "operator": 1,
                                "left": {"input": {
                                    "type": "string",
                                    "value": {"type": "ref", "content": {
                                        "source": "block-output", "blockID": "100001", "name": "input"
                                    }}
                                }},
                                "right": {"input": {
                                    "type": "string",
                                    "value": {"type": "literal", "content": "yes"}
                                }}
                            }]
                        }
                    }]
                }
            }
        }))
        .unwrap();

        let canvas = Canvas::default();
        let ns = SelectorAdaptor.adapt(&node, &AdaptContext { canvas: &canvas }).unwrap();
        match &ns.configs {
            NodeConfig::Selector(c) => {
                assert_eq!(c.branches.len(), 1);
                assert_eq!(c.branches[0].logic, ConditionLogic::And);
                let clause = &c.branches[0].clauses[0];
                assert_eq!(clause.operator, ConditionOperator::Equal);
                assert_eq!(clause.left_key, "branch_0_clause_0_left");
                assert_eq!(clause.right_key.as_deref(), Some("branch_0_clause_0_right"));
            }
            other => panic!("unexpected config: {other:?}"),
        }
        assert_eq!(ns.input_sources.len(), 2);
    }
}
