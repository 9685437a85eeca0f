//! Schema and tree validation.
//!
//! Operates on compiled schemas (reachability, type compatibility, exception
//! wiring) and on canvases (capability checks). Tree-level traversal across
//! sub-workflow references lives in the service layer, which owns the
//! repository access and the `(id, version)` visited set.

use crate::canvas::{Canvas, CanvasNode, ErrorProcessType, NodeType, TerminatePlan};
use crate::schema::{NodeConfig, TypeInfo, WorkflowSchema, PORT_ERROR};
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// A single validation finding, anchored to a node when possible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_key: Option<String>,
    pub message: String,
    pub severity: IssueSeverity,
}

impl ValidateIssue {
    pub fn error(node_key: Option<String>, message: impl Into<String>) -> ValidateIssue {
        ValidateIssue { node_key, message: message.into(), severity: IssueSeverity::Error }
    }

    pub fn warning(node_key: Option<String>, message: impl Into<String>) -> ValidateIssue {
        ValidateIssue { node_key, message: message.into(), severity: IssueSeverity::Warning }
    }
}

/// Validation findings aggregated per workflow, for tree validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateTreeInfo {
    pub workflow_id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub issues: Vec<ValidateIssue>,
}

/// Capability constraint families callers can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    BotAgent,
}

/// Result of one capability check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: CheckType,
    pub is_pass: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

/// Validate a compiled schema: reachability to Exit, input/output type
/// compatibility, and exception-branch wiring.
pub fn validate_schema(schema: &WorkflowSchema) -> Vec<ValidateIssue> {
    let mut issues = Vec::new();
    check_reachability(schema, &mut issues);
    check_type_compatibility(schema, &mut issues);
    check_exception_wiring(schema, &mut issues);
    issues
}

/// Every top-level non-terminal node must reach the Exit node. Composite
/// internals are the composite runner's concern and are skipped here.
fn check_reachability(schema: &WorkflowSchema, issues: &mut Vec<ValidateIssue>) {
    let Some(exit) = schema.nodes.iter().find(|n| n.node_type == NodeType::Exit) else {
        issues.push(ValidateIssue::error(None, "workflow has no exit node"));
        return;
    };

    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();
    for node in schema.top_level_nodes() {
        index.insert(node.key.as_str(), graph.add_node(node.key.as_str()));
    }
    for conn in &schema.connections {
        if let (Some(&from), Some(&to)) =
            (index.get(conn.from_node.as_str()), index.get(conn.to_node.as_str()))
        {
            graph.add_edge(from, to, ());
        }
    }

    let exit_idx = index[exit.key.as_str()];
    for node in schema.top_level_nodes() {
        if node.node_type == NodeType::Exit {
            continue;
        }
        let idx = index[node.key.as_str()];
        if !has_path_connecting(&graph, idx, exit_idx, None) {
            issues.push(ValidateIssue::error(
                Some(node.key.clone()),
                format!("node {} has no path to the exit node", node.key),
            ));
        }
    }
}

/// Each input source's declared type must unify with the producer's output
/// type at the referenced path.
fn check_type_compatibility(schema: &WorkflowSchema, issues: &mut Vec<ValidateIssue>) {
    for node in &schema.nodes {
        for source in &node.input_sources {
            let crate::schema::FieldSource::Ref { from_node, from_path } = &source.source else {
                continue;
            };
            // a child's reference into its own composite parent is an
            // element/variable binding supplied by the composite runner
            if schema.hierarchy.get(&node.key) == Some(from_node) {
                continue;
            }
            let Some(producer) = schema.get_node(from_node) else {
                issues.push(ValidateIssue::error(
                    Some(node.key.clone()),
                    format!("input {} references unknown node {}", source.path.join("."), from_node),
                ));
                continue;
            };

            let produced_object = TypeInfo::object(producer.output_types.clone());
            let Some(produced) = produced_object.at_path(from_path) else {
                issues.push(ValidateIssue::error(
                    Some(node.key.clone()),
                    format!(
                        "input {} references missing output {}.{}",
                        source.path.join("."),
                        from_node,
                        from_path.join(".")
                    ),
                ));
                continue;
            };

            let wanted_object = TypeInfo::object(node.input_types.clone());
            let Some(wanted) = wanted_object.at_path(&source.path) else {
                continue;
            };

            if !produced.assignable_to(wanted) {
                issues.push(ValidateIssue::error(
                    Some(node.key.clone()),
                    format!(
                        "input {} expects {:?} but {}.{} produces {:?}",
                        source.path.join("."),
                        wanted,
                        from_node,
                        from_path.join("."),
                        produced
                    ),
                ));
            }
        }
    }
}

/// Exception-branch nodes need exactly one designated exception edge, and
/// default-data nodes need parseable JSON payloads.
fn check_exception_wiring(schema: &WorkflowSchema, issues: &mut Vec<ValidateIssue>) {
    for node in &schema.nodes {
        let Some(exception) = &node.exception_configs else { continue };
        match exception.process_type {
            Some(ErrorProcessType::ExceptionBranch) => {
                let error_edges = schema
                    .connections
                    .iter()
                    .filter(|c| c.from_node == node.key && c.from_port.as_deref() == Some(PORT_ERROR))
                    .count();
                if error_edges != 1 {
                    issues.push(ValidateIssue::error(
                        Some(node.key.clone()),
                        format!(
                            "exception branch configured but {error_edges} exception edges found"
                        ),
                    ));
                }
            }
            Some(ErrorProcessType::ReturnDefaultData) => {
                match serde_json::from_str::<serde_json::Value>(&exception.data_on_err) {
                    Ok(serde_json::Value::Object(_)) => {}
                    _ => issues.push(ValidateIssue::error(
                        Some(node.key.clone()),
                        "dataOnErr is not a JSON object".to_string(),
                    )),
                }
            }
            _ => {}
        }
    }
}

/// Run one capability check over a canvas, walking composite children. The
/// caller feeds sub-workflow canvases through repeated calls.
pub fn check_canvas(canvas: &Canvas, check: CheckType) -> Vec<ValidateIssue> {
    let mut issues = Vec::new();
    match check {
        CheckType::BotAgent => check_bot_agent(&canvas.nodes, &mut issues),
    }
    issues
}

fn check_bot_agent(nodes: &[CanvasNode], issues: &mut Vec<ValidateIssue>) {
    for node in nodes {
        if let Some(node_type) = NodeType::from_id_str(&node.node_type) {
            if node_type.is_conversation_management() {
                issues.push(ValidateIssue::error(
                    Some(node.id.clone()),
                    "conversation-related nodes are not supported in chatflow",
                ));
            }
        }
        check_bot_agent(&node.blocks, issues);
    }
}

/// Chat flows must expose answer-mode termination on their exit node.
pub fn check_chatflow_exit(schema: &WorkflowSchema) -> Option<ValidateIssue> {
    let exit = schema.nodes.iter().find(|n| n.node_type == NodeType::Exit)?;
    match &exit.configs {
        NodeConfig::Exit(config) if config.terminate_plan == TerminatePlan::UseAnswerContent => {
            None
        }
        _ => Some(ValidateIssue::warning(
            Some(exit.key.clone()),
            "chat flow exit does not use answer content",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::configs::{CodeConfig, ExitConfig};
    use crate::schema::{Connection, ExceptionConfig, FieldInfo, NodeSchema};
    use std::collections::BTreeMap;

    fn node(key: &str, node_type: NodeType, configs: NodeConfig) -> NodeSchema {
        NodeSchema {
            key: key.to_string(),
            node_type,
            name: key.to_string(),
            input_types: BTreeMap::new(),
            input_sources: vec![],
            output_types: BTreeMap::new(),
            output_sources: vec![],
            configs,
            exception_configs: None,
            stream_configs: None,
            sub_workflow_basic: None,
            sub_workflow_schema: None,
        }
    }

    fn exit_node(key: &str) -> NodeSchema {
        node(
            key,
            NodeType::Exit,
            NodeConfig::Exit(ExitConfig {
                terminate_plan: TerminatePlan::ReturnVariables,
                content_template: None,
                streaming_output: false,
            }),
        )
    }

    fn code_node(key: &str) -> NodeSchema {
        node(key, NodeType::CodeRunner, NodeConfig::CodeRunner(CodeConfig { code: "x".into(), language: 1 }))
    }

    #[test]
    fn test_unreachable_node_flagged() {
        let mut schema = WorkflowSchema::default();
        schema.nodes.push(code_node("a"));
        schema.nodes.push(code_node("b"));
        schema.nodes.push(exit_node("exit"));
        schema.connections.push(Connection::new("a", "exit"));
        // b has no path to exit
        let issues = validate_schema(&schema);
        assert!(issues.iter().any(|i| i.node_key.as_deref() == Some("b")));
        assert!(!issues.iter().any(|i| i.node_key.as_deref() == Some("a")));
    }

    #[test]
    fn test_type_mismatch_flagged() {
        let mut schema = WorkflowSchema::default();
        let mut producer = code_node("p");
        producer.output_types.insert("n".to_string(), TypeInfo::Integer);
        let mut consumer = exit_node("exit");
        consumer.input_types.insert("s".to_string(), TypeInfo::Boolean);
        consumer
            .input_sources
            .push(FieldInfo::reference(vec!["s".into()], "p", vec!["n".into()]));
        schema.nodes.push(producer);
        schema.nodes.push(consumer);
        schema.connections.push(Connection::new("p", "exit"));

        let issues = validate_schema(&schema);
        assert!(issues.iter().any(|i| i.message.contains("expects")));
    }

    #[test]
    fn test_missing_output_field_flagged() {
        let mut schema = WorkflowSchema::default();
        let producer = code_node("p");
        let mut consumer = exit_node("exit");
        consumer
            .input_sources
            .push(FieldInfo::reference(vec!["s".into()], "p", vec!["missing".into()]));
        schema.nodes.push(producer);
        schema.nodes.push(consumer);
        schema.connections.push(Connection::new("p", "exit"));

        let issues = validate_schema(&schema);
        assert!(issues.iter().any(|i| i.message.contains("missing output")));
    }

    #[test]
    fn test_exception_branch_requires_edge() {
        let mut schema = WorkflowSchema::default();
        let mut risky = code_node("risky");
        risky.exception_configs = Some(ExceptionConfig {
            process_type: Some(ErrorProcessType::ExceptionBranch),
            ..Default::default()
        });
        schema.nodes.push(risky);
        schema.nodes.push(exit_node("exit"));
        schema.connections.push(Connection::new("risky", "exit"));

        let issues = validate_schema(&schema);
        assert!(issues.iter().any(|i| i.message.contains("exception edges")));

        // adding the designated edge clears the finding
        schema.connections.push(Connection::with_port("risky", "exit", PORT_ERROR));
        let issues = validate_schema(&schema);
        assert!(!issues.iter().any(|i| i.message.contains("exception edges")));
    }

    #[test]
    fn test_non_json_default_data_flagged() {
        let mut schema = WorkflowSchema::default();
        let mut risky = code_node("risky");
        risky.exception_configs = Some(ExceptionConfig {
            process_type: Some(ErrorProcessType::ReturnDefaultData),
            data_on_err: "not-json".to_string(),
            ..Default::default()
        });
        schema.nodes.push(risky);
        schema.nodes.push(exit_node("exit"));
        schema.connections.push(Connection::new("risky", "exit"));

        let issues = validate_schema(&schema);
        assert!(issues.iter().any(|i| i.message.contains("JSON object")));
    }

    #[test]
    fn test_bot_agent_check() {
        let canvas: Canvas = serde_json::from_value(serde_json::json!({
            "nodes": [
                {"id": "c1", "type": "52", "data": {}},
                {"id": "llm", "type": "3", "data": {}}
            ],
            "edges": []
        }))
        .unwrap();
        let issues = check_canvas(&canvas, CheckType::BotAgent);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].node_key.as_deref(), Some("c1"));
    }
}
