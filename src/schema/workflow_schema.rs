//! The compiled, execution-ready workflow graph.

use super::node_schema::{BranchSchema, Connection, NodeSchema};
use crate::canvas::NodeType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Compiled form of a canvas: nodes, connections, composite hierarchy,
/// branch tables, and derived execution requirements.
///
/// Built by the compiler, finalized with [`WorkflowSchema::init`], then
/// treated as immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowSchema {
    pub nodes: Vec<NodeSchema>,
    pub connections: Vec<Connection>,
    /// Child key → parent key for nodes inside composites.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hierarchy: BTreeMap<String, String>,
    /// Branch tables of selector-like nodes, keyed by node.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub branches: BTreeMap<String, BranchSchema>,
    /// Inner nodes produced by batch-mode expansion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_nodes: Vec<String>,

    // Derived at init; deterministic functions of the fields above.
    #[serde(default)]
    pub require_checkpoint: bool,
    #[serde(default)]
    pub require_streaming: bool,
    #[serde(default)]
    pub history_rounds: i64,
}

impl WorkflowSchema {
    /// Compute the derived execution requirements. Called once by the
    /// compiler after assembly; safe to call again.
    pub fn init(&mut self) {
        let mut history_rounds = 0i64;
        let mut require_checkpoint = false;

        for node in &self.nodes {
            if let Some(sub) = &node.sub_workflow_schema {
                history_rounds = history_rounds.max(sub.history_rounds);
                if sub.require_checkpoint {
                    require_checkpoint = true;
                }
            }
            if let Some(rounds) = node.configs.chat_history_rounds() {
                history_rounds = history_rounds.max(rounds);
                require_checkpoint = true;
            }
            if node.configs.require_checkpoint() {
                require_checkpoint = true;
            }
        }

        self.history_rounds = history_rounds;
        self.require_checkpoint = require_checkpoint;
        self.require_streaming = self.compute_require_streaming();
    }

    pub fn get_node(&self, key: &str) -> Option<&NodeSchema> {
        self.nodes.iter().find(|n| n.key == key)
    }

    /// Node count as seen by the author (batch-generated inner nodes hidden).
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.generated_nodes.len()
    }

    pub fn get_branch(&self, key: &str) -> Option<&BranchSchema> {
        self.branches.get(key)
    }

    /// Composite parents paired with their children, from the hierarchy map.
    pub fn composite_nodes(&self) -> Vec<(&NodeSchema, Vec<&NodeSchema>)> {
        let mut children_of: HashMap<&str, Vec<&NodeSchema>> = HashMap::new();
        for (child_key, parent_key) in &self.hierarchy {
            if let Some(child) = self.get_node(child_key) {
                children_of.entry(parent_key.as_str()).or_default().push(child);
            }
        }
        let mut out = Vec::new();
        for (parent_key, mut children) in children_of {
            if let Some(parent) = self.get_node(parent_key) {
                children.sort_by(|a, b| a.key.cmp(&b.key));
                out.push((parent, children));
            }
        }
        out.sort_by(|a, b| a.0.key.cmp(&b.0.key));
        out
    }

    /// Keys of nodes at the top level of the workflow (not inside any
    /// composite).
    pub fn top_level_nodes(&self) -> Vec<&NodeSchema> {
        self.nodes.iter().filter(|n| !self.hierarchy.contains_key(&n.key)).collect()
    }

    /// Whether two nodes live at the same nesting level.
    pub fn in_same_scope(&self, a: &str, b: &str) -> bool {
        self.hierarchy.get(a) == self.hierarchy.get(b)
    }

    /// Execution equivalence per the draft-inheritance contract: equal
    /// connection-id sets and node maps equal on the logical fields.
    pub fn is_equal(&self, other: &WorkflowSchema) -> bool {
        let my_conns: HashSet<String> = self.connections.iter().map(Connection::id).collect();
        let their_conns: HashSet<String> = other.connections.iter().map(Connection::id).collect();
        if my_conns != their_conns {
            return false;
        }

        if self.nodes.len() != other.nodes.len() {
            return false;
        }
        for node in &self.nodes {
            match other.get_node(&node.key) {
                Some(theirs) if node.execution_equal(theirs) => {}
                _ => return false,
            }
        }
        true
    }

    /// A workflow requires streaming iff some stream producer reaches some
    /// stream consumer through the data-flow graph built from input sources.
    fn compute_require_streaming(&self) -> bool {
        let producers: Vec<&str> = self
            .nodes
            .iter()
            .filter(|n| n.can_generate_stream())
            .map(|n| n.key.as_str())
            .collect();
        let consumers: HashSet<&str> = self
            .nodes
            .iter()
            .filter(|n| n.requires_streaming_input())
            .map(|n| n.key.as_str())
            .collect();

        if producers.is_empty() || consumers.is_empty() {
            return false;
        }

        let mut adj: HashMap<&str, HashSet<&str>> = HashMap::new();
        for node in &self.nodes {
            for source in &node.input_sources {
                if let Some(from) = source.source.ref_node() {
                    adj.entry(from).or_default().insert(node.key.as_str());
                }
            }
        }

        for producer in producers {
            let mut queue = VecDeque::from([producer]);
            let mut visited = HashSet::from([producer]);
            while let Some(current) = queue.pop_front() {
                if consumers.contains(current) {
                    return true;
                }
                if let Some(nexts) = adj.get(current) {
                    for next in nexts {
                        if visited.insert(next) {
                            queue.push_back(next);
                        }
                    }
                }
            }
        }
        false
    }

    /// All sub-workflow nodes in this schema, non-recursively.
    pub fn sub_workflow_nodes(&self) -> Vec<&NodeSchema> {
        self.nodes.iter().filter(|n| n.node_type == NodeType::SubWorkflow).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::NodeType;
    use crate::schema::configs::{EmitterConfig, LlmConfig, NodeConfig};
    use crate::schema::node_schema::{FieldInfo, StreamConfig};
    use std::collections::BTreeMap;

    fn bare_node(key: &str, node_type: NodeType, configs: NodeConfig) -> NodeSchema {
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

    #[test]
    fn test_is_equal_same_schema() {
        let mut a = WorkflowSchema::default();
        a.nodes.push(bare_node("n1", NodeType::LLM, NodeConfig::Llm(LlmConfig::default())));
        a.connections.push(Connection::new("n1", "n2"));
        let b = a.clone();
        assert!(a.is_equal(&b));
    }

    #[test]
    fn test_is_equal_connection_diff() {
        let mut a = WorkflowSchema::default();
        a.connections.push(Connection::new("n1", "n2"));
        let mut b = a.clone();
        b.connections.push(Connection::with_port("n1", "n3", "branch_0"));
        assert!(!a.is_equal(&b));
    }

    #[test]
    fn test_require_streaming_path() {
        let mut schema = WorkflowSchema::default();

        let mut llm = bare_node("llm", NodeType::LLM, NodeConfig::Llm(LlmConfig::default()));
        llm.stream_configs = Some(StreamConfig { can_generate_stream: true, requires_streaming_input: false });

        let mut emitter = bare_node(
            "emit",
            NodeType::OutputEmitter,
            NodeConfig::Emitter(EmitterConfig { content_template: None, streaming_output: true }),
        );
        emitter.stream_configs =
            Some(StreamConfig { can_generate_stream: true, requires_streaming_input: true });
        emitter.input_sources.push(FieldInfo::reference(
            vec!["content".into()],
            "llm",
            vec!["output".into()],
        ));

        schema.nodes.push(llm);
        schema.nodes.push(emitter);
        schema.init();
        assert!(schema.require_streaming);
    }

    #[test]
    fn test_require_streaming_no_consumer() {
        let mut schema = WorkflowSchema::default();
        let mut llm = bare_node("llm", NodeType::LLM, NodeConfig::Llm(LlmConfig::default()));
        llm.stream_configs = Some(StreamConfig { can_generate_stream: true, requires_streaming_input: false });
        schema.nodes.push(llm);
        schema.init();
        assert!(!schema.require_streaming);
    }

    #[test]
    fn test_history_rounds_and_checkpoint() {
        let mut schema = WorkflowSchema::default();
        let mut cfg = LlmConfig::default();
        cfg.enable_chat_history = true;
        cfg.chat_history_rounds = 7;
        schema.nodes.push(bare_node("llm", NodeType::LLM, NodeConfig::Llm(cfg)));
        schema.init();
        assert_eq!(schema.history_rounds, 7);
        assert!(schema.require_checkpoint);
    }

    #[test]
    fn test_node_count_excludes_generated() {
        let mut schema = WorkflowSchema::default();
        schema.nodes.push(bare_node("b", NodeType::Batch, NodeConfig::Break));
        schema.nodes.push(bare_node("b_inner", NodeType::LLM, NodeConfig::Llm(LlmConfig::default())));
        schema.generated_nodes.push("b_inner".to_string());
        assert_eq!(schema.node_count(), 1);
    }
}
