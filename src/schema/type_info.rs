//! Structural type model for node IO fields.

use crate::canvas::{BlockInput, Variable, VariableType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Structural type of a field. Object fields and list elements nest.
///
/// `Any` stands for a declaration with no schema information attached; it
/// unifies with everything and keeps the validator from rejecting canvases
/// the editor considers legal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeInfo {
    Any,
    String,
    Integer,
    Float,
    Boolean,
    Object { fields: BTreeMap<String, TypeInfo> },
    List { element: Box<TypeInfo> },
}

impl TypeInfo {
    pub fn object(fields: BTreeMap<String, TypeInfo>) -> TypeInfo {
        TypeInfo::Object { fields }
    }

    pub fn list(element: TypeInfo) -> TypeInfo {
        TypeInfo::List { element: Box::new(element) }
    }

    /// Build from a canvas output declaration.
    pub fn from_variable(v: &Variable) -> TypeInfo {
        Self::from_parts(v.var_type, v.schema.as_ref())
    }

    /// Build from a canvas input slot.
    pub fn from_block_input(input: &BlockInput) -> TypeInfo {
        Self::from_parts(input.var_type, input.schema.as_ref())
    }

    fn from_parts(var_type: VariableType, schema: Option<&Value>) -> TypeInfo {
        match var_type {
            VariableType::String => TypeInfo::String,
            VariableType::Integer => TypeInfo::Integer,
            VariableType::Float => TypeInfo::Float,
            VariableType::Boolean => TypeInfo::Boolean,
            VariableType::Object => {
                let mut fields = BTreeMap::new();
                if let Some(Value::Array(items)) = schema {
                    for item in items {
                        if let Ok(sub) = Variable::parse(item) {
                            fields.insert(sub.name.clone(), TypeInfo::from_variable(&sub));
                        }
                    }
                }
                TypeInfo::Object { fields }
            }
            VariableType::List => {
                let element = match schema {
                    Some(raw) => match Variable::parse(raw) {
                        Ok(sub) => TypeInfo::from_variable(&sub),
                        Err(_) => TypeInfo::Any,
                    },
                    None => TypeInfo::Any,
                };
                TypeInfo::list(element)
            }
        }
    }

    /// Resolve the type at a nested field path.
    pub fn at_path(&self, path: &[String]) -> Option<&TypeInfo> {
        let mut current = self;
        for segment in path {
            match current {
                TypeInfo::Object { fields } => {
                    current = fields.get(segment)?;
                }
                TypeInfo::Any => return Some(current),
                _ => return None,
            }
        }
        Some(current)
    }

    /// Whether a value of type `self` (the producer) can satisfy a consumer
    /// declared as `other`. Objects are width-subtyped: every field the
    /// consumer declares must exist on the producer and unify.
    pub fn assignable_to(&self, other: &TypeInfo) -> bool {
        match (self, other) {
            (TypeInfo::Any, _) | (_, TypeInfo::Any) => true,
            (TypeInfo::Integer, TypeInfo::Float) => true,
            (TypeInfo::Object { fields: produced }, TypeInfo::Object { fields: wanted }) => {
                wanted.iter().all(|(name, want)| {
                    produced.get(name).map(|have| have.assignable_to(want)).unwrap_or(false)
                })
            }
            (TypeInfo::List { element: a }, TypeInfo::List { element: b }) => a.assignable_to(b),
            (a, b) => a == b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list_of_objects() -> TypeInfo {
        let mut fields = BTreeMap::new();
        fields.insert("answer".to_string(), TypeInfo::String);
        TypeInfo::list(TypeInfo::object(fields))
    }

    #[test]
    fn test_from_variable_nested() {
        let raw = json!({
            "name": "results",
            "type": "list",
            "schema": {"name": "", "type": "object", "schema": [
                {"name": "answer", "type": "string"}
            ]}
        });
        let v = Variable::parse(&raw).unwrap();
        assert_eq!(TypeInfo::from_variable(&v), list_of_objects());
    }

    #[test]
    fn test_at_path() {
        let mut inner = BTreeMap::new();
        inner.insert("text".to_string(), TypeInfo::String);
        let mut outer = BTreeMap::new();
        outer.insert("msg".to_string(), TypeInfo::object(inner));
        let t = TypeInfo::object(outer);

        let path = vec!["msg".to_string(), "text".to_string()];
        assert_eq!(t.at_path(&path), Some(&TypeInfo::String));
        assert_eq!(t.at_path(&["missing".to_string()]), None);
        assert_eq!(t.at_path(&[]), Some(&t));
    }

    #[test]
    fn test_assignability() {
        assert!(TypeInfo::String.assignable_to(&TypeInfo::String));
        assert!(TypeInfo::Integer.assignable_to(&TypeInfo::Float));
        assert!(!TypeInfo::Float.assignable_to(&TypeInfo::Integer));
        assert!(TypeInfo::Any.assignable_to(&TypeInfo::Boolean));
        assert!(list_of_objects().assignable_to(&TypeInfo::list(TypeInfo::Any)));

        // consumer wanting fewer object fields is fine; wanting more is not
        let mut narrow = BTreeMap::new();
        narrow.insert("answer".to_string(), TypeInfo::String);
        let mut wide = narrow.clone();
        wide.insert("score".to_string(), TypeInfo::Float);
        assert!(TypeInfo::object(wide.clone()).assignable_to(&TypeInfo::object(narrow.clone())));
        assert!(!TypeInfo::object(narrow).assignable_to(&TypeInfo::object(wide)));
    }
}
