//! Selector condition evaluation over resolved input values.

use crate::schema::configs::{
    BranchCondition, ConditionClause, ConditionLogic, ConditionOperator, SelectorConfig,
};
use serde_json::Value;
use std::collections::HashMap;

/// Index of the first branch whose condition holds, or `None` for the
/// default fall-through.
pub fn select_branch(
    config: &SelectorConfig,
    inputs: &HashMap<String, Value>,
) -> Option<usize> {
    for (idx, branch) in config.branches.iter().enumerate() {
        if branch_holds(branch, inputs) {
            return Some(idx);
        }
    }
    None
}

fn branch_holds(branch: &BranchCondition, inputs: &HashMap<String, Value>) -> bool {
    if branch.clauses.is_empty() {
        return false;
    }
    match branch.logic {
        ConditionLogic::And => branch.clauses.iter().all(|c| clause_holds(c, inputs)),
        ConditionLogic::Or => branch.clauses.iter().any(|c| clause_holds(c, inputs)),
    }
}

fn clause_holds(clause: &ConditionClause, inputs: &HashMap<String, Value>) -> bool {
    let left = inputs.get(&clause.left_key).unwrap_or(&Value::Null);
    let right = clause
        .right_key
        .as_ref()
        .and_then(|k| inputs.get(k))
        .unwrap_or(&Value::Null);
    evaluate(clause.operator, left, right)
}

fn evaluate(op: ConditionOperator, left: &Value, right: &Value) -> bool {
    use ConditionOperator::*;
    match op {
        Equal => loose_eq(left, right),
        NotEqual => !loose_eq(left, right),
        Contain => match (left, right) {
            (Value::String(l), Value::String(r)) => l.contains(r.as_str()),
            (Value::Array(items), r) => items.iter().any(|i| loose_eq(i, r)),
            _ => false,
        },
        NotContain => !evaluate(Contain, left, right),
        Empty => is_empty(left),
        NotEmpty => !is_empty(left),
        True => left.as_bool() == Some(true),
        False => left.as_bool() == Some(false),
        GreaterThan => compare(left, right).map(|o| o.is_gt()).unwrap_or(false),
        GreaterThanEqual => compare(left, right).map(|o| o.is_ge()).unwrap_or(false),
        LessThan => compare(left, right).map(|o| o.is_lt()).unwrap_or(false),
        LessThanEqual => compare(left, right).map(|o| o.is_le()).unwrap_or(false),
        LengthGreaterThan => length_of(left).map(|l| (l as i64) > int_of(right)).unwrap_or(false),
        LengthGreaterThanEqual => {
            length_of(left).map(|l| (l as i64) >= int_of(right)).unwrap_or(false)
        }
        LengthLessThan => length_of(left).map(|l| (l as i64) < int_of(right)).unwrap_or(false),
        LengthLessThanEqual => {
            length_of(left).map(|l| (l as i64) <= int_of(right)).unwrap_or(false)
        }
    }
}

/// Equality with numeric coercion: `1` and `1.0` compare equal, as do a
/// numeric string and its number when one side is a string.
fn loose_eq(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (number_of(left), number_of(right)) {
        (Some(l), Some(r)) => (l - r).abs() < f64::EPSILON,
        _ => false,
    }
}

fn number_of(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn int_of(v: &Value) -> i64 {
    number_of(v).map(|f| f as i64).unwrap_or(0)
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (number_of(left), number_of(right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r),
        _ => match (left, right) {
            (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
            _ => None,
        },
    }
}

fn length_of(v: &Value) -> Option<usize> {
    match v {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clause(op: ConditionOperator) -> ConditionClause {
        ConditionClause {
            operator: op,
            left_key: "l".to_string(),
            right_key: Some("r".to_string()),
        }
    }

    fn config(branches: Vec<BranchCondition>) -> SelectorConfig {
        SelectorConfig { branches }
    }

    #[test]
    fn test_first_matching_branch_wins() {
        let cfg = config(vec![
            BranchCondition { logic: ConditionLogic::And, clauses: vec![clause(ConditionOperator::Equal)] },
            BranchCondition { logic: ConditionLogic::And, clauses: vec![clause(ConditionOperator::NotEqual)] },
        ]);
        let mut inputs = HashMap::new();
        inputs.insert("l".to_string(), json!("x"));
        inputs.insert("r".to_string(), json!("y"));
        assert_eq!(select_branch(&cfg, &inputs), Some(1));

        inputs.insert("r".to_string(), json!("x"));
        assert_eq!(select_branch(&cfg, &inputs), Some(0));
    }

    #[test]
    fn test_no_match_falls_to_default() {
        let cfg = config(vec![BranchCondition {
            logic: ConditionLogic::And,
            clauses: vec![clause(ConditionOperator::Equal)],
        }]);
        let mut inputs = HashMap::new();
        inputs.insert("l".to_string(), json!(1));
        inputs.insert("r".to_string(), json!(2));
        assert_eq!(select_branch(&cfg, &inputs), None);
    }

    #[test]
    fn test_numeric_coercion() {
        assert!(evaluate(ConditionOperator::Equal, &json!("3"), &json!(3)));
        assert!(evaluate(ConditionOperator::GreaterThan, &json!(10), &json!("9")));
        assert!(!evaluate(ConditionOperator::GreaterThan, &json!("a"), &json!(1)));
    }

    #[test]
    fn test_contain_and_length() {
        assert!(evaluate(ConditionOperator::Contain, &json!("hello"), &json!("ell")));
        assert!(evaluate(ConditionOperator::Contain, &json!(["a", "b"]), &json!("b")));
        assert!(evaluate(ConditionOperator::LengthGreaterThan, &json!("hello"), &json!(3)));
        assert!(evaluate(ConditionOperator::LengthLessThanEqual, &json!(["a"]), &json!(1)));
    }

    #[test]
    fn test_empty_checks() {
        assert!(evaluate(ConditionOperator::Empty, &json!(""), &Value::Null));
        assert!(evaluate(ConditionOperator::Empty, &Value::Null, &Value::Null));
        assert!(evaluate(ConditionOperator::NotEmpty, &json!([1]), &Value::Null));
    }

    #[test]
    fn test_or_logic() {
        let cfg = config(vec![BranchCondition {
            logic: ConditionLogic::Or,
            clauses: vec![
                ConditionClause {
                    operator: ConditionOperator::Equal,
                    left_key: "a".to_string(),
                    right_key: Some("b".to_string()),
                },
                ConditionClause {
                    operator: ConditionOperator::True,
                    left_key: "flag".to_string(),
                    right_key: None,
                },
            ],
        }]);
        let mut inputs = HashMap::new();
        inputs.insert("a".to_string(), json!(1));
        inputs.insert("b".to_string(), json!(2));
        inputs.insert("flag".to_string(), json!(true));
        assert_eq!(select_branch(&cfg, &inputs), Some(0));
    }
}
