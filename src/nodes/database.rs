//! Database nodes: typed row operations and custom SQL over user tables.

use super::helpers::{base_schema, set_inputs, set_output_variables};
use super::{AdaptContext, AdaptorFactory, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType};
use crate::error::{WorkflowError, WorkflowResult};
use crate::schema::configs::{DatabaseConfig, DatabaseOp};
use crate::schema::{NodeConfig, NodeSchema, TypeInfo};

pub struct DatabaseAdaptor {
    pub op: DatabaseOp,
    pub node_type: NodeType,
}

pub static DATABASE_OPS: &[(NodeType, AdaptorFactory)] = &[
    (NodeType::DatabaseInsert, || {
        Box::new(DatabaseAdaptor { op: DatabaseOp::Insert, node_type: NodeType::DatabaseInsert })
    }),
    (NodeType::DatabaseUpdate, || {
        Box::new(DatabaseAdaptor { op: DatabaseOp::Update, node_type: NodeType::DatabaseUpdate })
    }),
    (NodeType::DatabaseQuery, || {
        Box::new(DatabaseAdaptor { op: DatabaseOp::Query, node_type: NodeType::DatabaseQuery })
    }),
    (NodeType::DatabaseDelete, || {
        Box::new(DatabaseAdaptor { op: DatabaseOp::Delete, node_type: NodeType::DatabaseDelete })
    }),
    (NodeType::DatabaseCustomSQL, || {
        Box::new(DatabaseAdaptor { op: DatabaseOp::CustomSql, node_type: NodeType::DatabaseCustomSQL })
    }),
];

/// The referenced user-table id, from the node's `databaseInfoList`.
pub fn database_id(node: &CanvasNode) -> WorkflowResult<i64> {
    let info = node
        .data
        .inputs
        .as_ref()
        .and_then(|i| i.database_info_list.first())
        .ok_or_else(|| WorkflowError::SchemaConversionFail {
            node_key: node.id.clone(),
            reason: "database info is required".to_string(),
        })?;
    info.database_info_id.parse::<i64>().map_err(|_| WorkflowError::SchemaConversionFail {
        node_key: node.id.clone(),
        reason: format!("bad database id: {}", info.database_info_id),
    })
}

impl NodeAdaptor for DatabaseAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let id = database_id(node)?;
        let inputs = node.data.inputs.as_ref();

        let sql = inputs.map(|i| i.sql.clone()).unwrap_or_default();
        if self.op == DatabaseOp::CustomSql && sql.is_empty() {
            return Err(WorkflowError::SchemaConversionFail {
                node_key: node.id.clone(),
                reason: "custom SQL node has no sql".to_string(),
            });
        }

        let params = inputs.and_then(|i| match self.op {
            DatabaseOp::Insert => i.insert_param.clone(),
            DatabaseOp::Update => i.update_param.clone(),
            DatabaseOp::Query => i.select_param.clone(),
            DatabaseOp::Delete => i.delete_param.clone(),
            DatabaseOp::CustomSql => None,
        });

        let config = DatabaseConfig { op: self.op, database_id: id, sql, params };
        let mut ns = base_schema(node, self.node_type, NodeConfig::Database(config))?;

        if let Some(inputs) = inputs {
            set_inputs(&mut ns, &inputs.input_parameters);
        }
        if node.data.outputs.is_empty() {
            ns.output_types.insert(
                "outputList".to_string(),
                TypeInfo::list(TypeInfo::Object { fields: Default::default() }),
            );
            ns.output_types.insert("rowNum".to_string(), TypeInfo::Integer);
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
    fn test_database_id_required() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "d1",
            "type": "43",
            "data": {"inputs": {}}
        }))
        .unwrap();
        assert!(database_id(&node).is_err());
    }

    #[test]
    fn test_custom_sql_requires_statement() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "d2",
            "type": "12",
            "data": {"inputs": {"databaseInfoList": [{"databaseInfoID": "31"}]}}
        }))
        .unwrap();
        let canvas = Canvas::default();
        let adaptor =
            DatabaseAdaptor { op: DatabaseOp::CustomSql, node_type: NodeType::DatabaseCustomSQL };
        assert!(adaptor.adapt(&node, &AdaptContext { canvas: &canvas }).is_err());
    }

    #[test]
    fn test_query_defaults() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "d3",
            "type": "43",
            "data": {"inputs": {
                "databaseInfoList": [{"databaseInfoID": "31"}],
                "selectParam": {"limit": 100}
            }}
        }))
        .unwrap();
        let canvas = Canvas::default();
        let adaptor =
            DatabaseAdaptor { op: DatabaseOp::Query, node_type: NodeType::DatabaseQuery };
        let ns = adaptor.adapt(&node, &AdaptContext { canvas: &canvas }).unwrap();
        match &ns.configs {
            NodeConfig::Database(c) => {
                assert_eq!(c.database_id, 31);
                assert!(c.params.is_some());
            }
            other => panic!("unexpected config: {other:?}"),
        }
        assert!(ns.output_types.contains_key("rowNum"));
    }
}
