//! Isolation pruning: drop nodes no connection can reach.

use crate::canvas::{CanvasEdge, CanvasNode, NodeType, ENTRY_NODE_ID, EXIT_NODE_ID};
use crate::error::{WorkflowError, WorkflowResult};
use std::collections::{HashMap, HashSet};

/// Remove isolated nodes and the edges sourced from them.
///
/// A node is isolated when nothing depends on it: its inbound-edge count is
/// zero after seeding Entry/Exit as reachable. Break/Continue children count
/// as a dependency on their parent composite. Composite internals are pruned
/// first, recursively.
pub fn prune_isolated_nodes(
    nodes: Vec<CanvasNode>,
    edges: Vec<CanvasEdge>,
    parent: Option<&CanvasNode>,
) -> WorkflowResult<(Vec<CanvasNode>, Vec<CanvasEdge>)> {
    let mut dependency_count: HashMap<String, i64> = HashMap::new();
    if let Some(parent) = parent {
        dependency_count.insert(parent.id.clone(), 0);
    }

    let mut nodes = nodes;
    for node in &mut nodes {
        if !node.blocks.is_empty() && !node.edges.is_empty() {
            let inner_nodes = std::mem::take(&mut node.blocks);
            let inner_edges = std::mem::take(&mut node.edges);
            let parent_view = node.clone();
            let (kept_nodes, kept_edges) =
                prune_isolated_nodes(inner_nodes, inner_edges, Some(&parent_view))?;
            node.blocks = kept_nodes;
            node.edges = kept_edges;
        }

        dependency_count.insert(node.id.clone(), 0);

        let node_type = NodeType::from_id_str(&node.node_type);
        if matches!(node_type, Some(NodeType::Break) | Some(NodeType::Continue)) {
            if let Some(parent) = parent {
                *dependency_count.entry(parent.id.clone()).or_insert(0) += 1;
            }
        }
    }

    dependency_count.insert(ENTRY_NODE_ID.to_string(), 1);
    dependency_count.insert(EXIT_NODE_ID.to_string(), 1);

    for edge in &edges {
        match dependency_count.get_mut(&edge.target_node_id) {
            Some(count) => *count += 1,
            None => {
                return Err(WorkflowError::InvalidParameter(format!(
                    "node id {} not existed, but appears in the edge",
                    edge.target_node_id
                )))
            }
        }
    }

    let isolated: HashSet<&String> =
        dependency_count.iter().filter(|(_, c)| **c == 0).map(|(id, _)| id).collect();

    let kept_nodes: Vec<CanvasNode> =
        nodes.into_iter().filter(|n| !isolated.contains(&n.id)).collect();
    let kept_edges: Vec<CanvasEdge> =
        edges.into_iter().filter(|e| !isolated.contains(&e.source_node_id)).collect();

    Ok((kept_nodes, kept_edges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::NodeType;

    fn node(id: &str, node_type: NodeType) -> CanvasNode {
        CanvasNode {
            id: id.to_string(),
            node_type: node_type.id_str().to_string(),
            ..Default::default()
        }
    }

    fn edge(from: &str, to: &str) -> CanvasEdge {
        CanvasEdge {
            source_node_id: from.to_string(),
            target_node_id: to.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_keeps_connected_chain() {
        let nodes = vec![
            node(ENTRY_NODE_ID, NodeType::Entry),
            node("llm", NodeType::LLM),
            node(EXIT_NODE_ID, NodeType::Exit),
        ];
        let edges = vec![edge(ENTRY_NODE_ID, "llm"), edge("llm", EXIT_NODE_ID)];
        let (kept_nodes, kept_edges) = prune_isolated_nodes(nodes, edges, None).unwrap();
        assert_eq!(kept_nodes.len(), 3);
        assert_eq!(kept_edges.len(), 2);
    }

    #[test]
    fn test_drops_isolated_node_and_its_edges() {
        let nodes = vec![
            node(ENTRY_NODE_ID, NodeType::Entry),
            node(EXIT_NODE_ID, NodeType::Exit),
            node("orphan", NodeType::LLM),
        ];
        // orphan has no inbound edge; its outbound edge must go too
        let edges = vec![edge(ENTRY_NODE_ID, EXIT_NODE_ID), edge("orphan", EXIT_NODE_ID)];
        let (kept_nodes, kept_edges) = prune_isolated_nodes(nodes, edges, None).unwrap();
        assert_eq!(kept_nodes.len(), 2);
        assert!(kept_nodes.iter().all(|n| n.id != "orphan"));
        assert_eq!(kept_edges.len(), 1);
    }

    #[test]
    fn test_break_counts_toward_parent_in_inner_scope() {
        let mut looper = node("loop1", NodeType::Loop);
        looper.blocks = vec![node("brk", NodeType::Break)];
        // the only thing keeping loop1 non-isolated inside its own scope is
        // the Break child; without it the loop's internal edge would be
        // dropped as sourced from an isolated node
        looper.edges = vec![edge("loop1", "brk")];

        let nodes = vec![
            node(ENTRY_NODE_ID, NodeType::Entry),
            looper,
            node(EXIT_NODE_ID, NodeType::Exit),
        ];
        let edges = vec![
            edge(ENTRY_NODE_ID, "loop1"),
            edge("loop1", EXIT_NODE_ID),
        ];
        let (kept_nodes, _) = prune_isolated_nodes(nodes, edges, None).unwrap();
        let looper = kept_nodes.iter().find(|n| n.id == "loop1").unwrap();
        assert_eq!(looper.blocks.len(), 1);
        assert_eq!(looper.edges.len(), 1);
    }

    #[test]
    fn test_edge_to_unknown_node_is_rejected() {
        let nodes = vec![node(ENTRY_NODE_ID, NodeType::Entry)];
        let edges = vec![edge(ENTRY_NODE_ID, "ghost")];
        let err = prune_isolated_nodes(nodes, edges, None).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidParameter(_)));
    }
}
