//! Edge → connection mapping, port normalization, and branch tables.

use crate::canvas::{CanvasEdge, NodeType};
use crate::error::{WorkflowError, WorkflowResult};
use crate::schema::{branch_port, BranchSchema, Connection, WorkflowSchema, END, PORT_DEFAULT};
use std::collections::{BTreeMap, HashMap};

const INLINE_OUTPUT_PORTS: &[&str] = &[
    "loop-function-inline-output",
    "loop-output",
    "batch-function-inline-output",
    "batch-output",
];

const INLINE_INPUT_PORTS: &[&str] =
    &["loop-function-inline-input", "batch-function-inline-input"];

/// Map a canvas edge to an execution connection. Inline loop/batch outputs
/// whose target port is the composite's inline input re-target to the
/// terminal sentinel of the composite scope.
pub fn edge_to_connection(edge: &CanvasEdge) -> Connection {
    let to_node = if !edge.source_port_id.is_empty()
        && INLINE_INPUT_PORTS.contains(&edge.target_port_id.as_str())
    {
        END.to_string()
    } else {
        edge.target_node_id.clone()
    };

    Connection {
        from_node: edge.source_node_id.clone(),
        to_node,
        from_port: Some(edge.source_port_id.clone()),
    }
}

/// Normalize connection ports: erase empty ports, nullify loop/batch inline
/// ports, and rewrite selector ports (`true` → `branch_0`, `false` →
/// `default`, `true_N` → `branch_N`).
pub fn normalize_ports(
    connections: Vec<Connection>,
    node_types: &HashMap<String, NodeType>,
) -> WorkflowResult<Vec<Connection>> {
    let mut normalized = Vec::with_capacity(connections.len());

    for mut conn in connections {
        let Some(port) = conn.from_port.take() else {
            normalized.push(conn);
            continue;
        };

        if port.is_empty() {
            normalized.push(conn);
            continue;
        }

        if INLINE_OUTPUT_PORTS.contains(&port.as_str()) {
            normalized.push(conn);
            continue;
        }

        let node_type = node_types.get(&conn.from_node).copied().ok_or_else(|| {
            WorkflowError::SchemaConversionFail {
                node_key: conn.from_node.clone(),
                reason: format!("node {} not found in node map", conn.from_node),
            }
        })?;

        let new_port = match node_type {
            NodeType::Selector => {
                if port == "true" {
                    branch_port(0)
                } else if port == "false" {
                    PORT_DEFAULT.to_string()
                } else if let Some(n) = port.strip_prefix("true_") {
                    let n: usize = n.parse().map_err(|_| {
                        WorkflowError::SchemaConversionFail {
                            node_key: conn.from_node.clone(),
                            reason: format!("invalid port name: {port}"),
                        }
                    })?;
                    branch_port(n)
                } else {
                    port
                }
            }
            _ => port,
        };

        conn.from_port = Some(new_port);
        normalized.push(conn);
    }

    Ok(normalized)
}

/// Build branch tables for selector-like nodes from their outgoing port
/// sets, checking that `branch_i` ports are contiguous from zero.
pub fn build_branches(
    schema: &WorkflowSchema,
) -> WorkflowResult<BTreeMap<String, BranchSchema>> {
    let mut branches = BTreeMap::new();

    for node in &schema.nodes {
        if !matches!(
            node.node_type,
            NodeType::Selector | NodeType::IntentDetector | NodeType::QuestionAnswer
        ) {
            continue;
        }

        let ports: Vec<String> = schema
            .connections
            .iter()
            .filter(|c| c.from_node == node.key)
            .filter_map(|c| c.from_port.clone())
            .collect();

        if ports.is_empty() {
            continue;
        }

        let mut indices: Vec<usize> = Vec::new();
        for port in &ports {
            if port == PORT_DEFAULT || port == crate::schema::PORT_ERROR {
                continue;
            }
            match port.strip_prefix("branch_").and_then(|n| n.parse::<usize>().ok()) {
                Some(n) => indices.push(n),
                None => {
                    return Err(WorkflowError::SchemaConversionFail {
                        node_key: node.key.clone(),
                        reason: format!("unexpected branch port {port}"),
                    })
                }
            }
        }
        indices.sort_unstable();
        indices.dedup();
        for (expected, actual) in indices.iter().enumerate() {
            if expected != *actual {
                return Err(WorkflowError::SchemaConversionFail {
                    node_key: node.key.clone(),
                    reason: format!("branch ports are not contiguous: missing branch_{expected}"),
                });
            }
        }

        branches.insert(node.key.clone(), BranchSchema::from_ports(ports));
    }

    Ok(branches)
}
