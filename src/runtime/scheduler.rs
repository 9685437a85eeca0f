//! DAG scheduler: runs one scope (the top level, or a composite's children)
//! with data-independent nodes in parallel.
//!
//! Edge bookkeeping: a node becomes ready when every inbound connection in
//! its scope is resolved and at least one was taken; it is skipped (and its
//! outgoing edges skipped transitively) when all inbound connections were
//! skipped. Branch nodes take exactly one outgoing port per evaluation.

use super::checkpoint::CheckpointStore;
use super::composite;
use super::context::ExecutionContext;
use super::exception::execute_with_policy;
use super::executor::{ControlSignal, ExecutorRegistry, NodeInput, NodeOutput};
use super::state::VariableStore;
use crate::canvas::NodeType;
use crate::error::{NodeError, WorkflowError, WorkflowResult};
use crate::schema::{Connection, NodeSchema, WorkflowSchema, PORT_ERROR};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Immutable state shared by every node task of one execution.
pub(crate) struct Execution {
    pub schema: Arc<WorkflowSchema>,
    pub registry: Arc<ExecutorRegistry>,
    pub ctx: Arc<ExecutionContext>,
    pub checkpoint: Option<Arc<dyn CheckpointStore>>,
    /// Node keys with persisted outputs to restore instead of re-running.
    pub resume_nodes: HashSet<String>,
}

/// Completion record of one node, as seen by the scheduler.
pub(crate) struct ExecDone {
    pub chosen_port: Option<String>,
    pub signal: Option<ControlSignal>,
}

/// Serialized checkpoint payload per node.
#[derive(Serialize, Deserialize)]
pub(crate) struct PersistedNode {
    pub values: Value,
    pub chosen_port: Option<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum EdgeState {
    Pending,
    Taken,
    Skipped,
}

/// Run a set of nodes and the connections among them to completion.
/// Connections leaving the scope (to `END` or to the composite parent) are
/// sinks, not dependencies.
pub(crate) async fn run_scope(
    exec: Arc<Execution>,
    scope_keys: Vec<String>,
    connections: Vec<Connection>,
    store: VariableStore,
) -> WorkflowResult<Option<ControlSignal>> {
    let scope: HashSet<&str> = scope_keys.iter().map(String::as_str).collect();
    let in_scope: Vec<(usize, &Connection)> = connections
        .iter()
        .enumerate()
        .filter(|(_, c)| scope.contains(c.from_node.as_str()) && scope.contains(c.to_node.as_str()))
        .collect();

    let mut edge_states: HashMap<usize, EdgeState> =
        in_scope.iter().map(|(i, _)| (*i, EdgeState::Pending)).collect();
    let mut inbound: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut outgoing: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, conn) in &in_scope {
        inbound.entry(conn.to_node.as_str()).or_default().push(*idx);
        outgoing.entry(conn.from_node.as_str()).or_default().push(*idx);
    }

    let mut done: HashSet<String> = HashSet::new();
    let mut running: HashSet<String> = HashSet::new();
    let mut tasks: JoinSet<(String, WorkflowResult<ExecDone>)> = JoinSet::new();

    let spawn_node = |tasks: &mut JoinSet<(String, WorkflowResult<ExecDone>)>,
                      key: String,
                      exec: Arc<Execution>,
                      store: VariableStore| {
        tasks.spawn(async move {
            let result = exec_node(&exec, &store, &key).await;
            (key, result)
        });
    };

    for key in &scope_keys {
        if inbound.get(key.as_str()).map(|v| v.is_empty()).unwrap_or(true) {
            running.insert(key.clone());
            spawn_node(&mut tasks, key.clone(), Arc::clone(&exec), store.clone());
        }
    }

    // nothing to do in an empty scope
    if running.is_empty() && scope_keys.is_empty() {
        return Ok(None);
    }

    while done.len() + running.len() < scope_keys.len() || !running.is_empty() {
        let joined = tokio::select! {
            joined = tasks.join_next() => joined,
            _ = exec.ctx.cancel.cancelled() => {
                return Err(WorkflowError::Aborted("execution cancelled".to_string()));
            }
        };

        let Some(joined) = joined else { break };
        let (key, result) =
            joined.map_err(|e| WorkflowError::InternalError(format!("node task: {e}")))?;
        running.remove(&key);
        done.insert(key.clone());

        let outcome = result?;
        if let Some(signal) = outcome.signal {
            tasks.shutdown().await;
            return Ok(Some(signal));
        }

        // resolve this node's outgoing edges
        let mut newly_resolved: Vec<&str> = Vec::new();
        if let Some(edges) = outgoing.get(key.as_str()) {
            for idx in edges {
                let conn = connections.get(*idx).expect("edge index in range");
                let taken = edge_taken(outcome.chosen_port.as_deref(), conn.from_port.as_deref());
                edge_states
                    .insert(*idx, if taken { EdgeState::Taken } else { EdgeState::Skipped });
                newly_resolved.push(conn.to_node.as_str());
            }
        }

        // fan out: ready targets run, fully-skipped targets cascade
        let mut queue: Vec<String> = newly_resolved.iter().map(|s| s.to_string()).collect();
        while let Some(target) = queue.pop() {
            if done.contains(&target) || running.contains(&target) {
                continue;
            }
            let Some(in_edges) = inbound.get(target.as_str()) else { continue };
            let all_resolved =
                in_edges.iter().all(|i| edge_states[i] != EdgeState::Pending);
            if !all_resolved {
                continue;
            }
            let any_taken = in_edges.iter().any(|i| edge_states[i] == EdgeState::Taken);
            if any_taken {
                running.insert(target.clone());
                spawn_node(&mut tasks, target, Arc::clone(&exec), store.clone());
            } else {
                // skipped node: cascade skips downstream without executing
                done.insert(target.clone());
                if let Some(out_edges) = outgoing.get(target.as_str()) {
                    for idx in out_edges {
                        edge_states.insert(*idx, EdgeState::Skipped);
                        let conn = connections.get(*idx).expect("edge index in range");
                        queue.push(conn.to_node.clone());
                    }
                }
            }
        }
    }

    Ok(None)
}

/// Whether an edge with `from_port` fires given the node's chosen port.
/// Unported edges fire on any outcome except exception routing; the
/// exception edge fires only when chosen.
fn edge_taken(chosen: Option<&str>, port: Option<&str>) -> bool {
    match (chosen, port) {
        (None, None) => true,
        (None, Some(port)) => port != PORT_ERROR,
        (Some(chosen), None) => chosen != PORT_ERROR,
        (Some(chosen), Some(port)) => chosen == port,
    }
}

pub(crate) async fn exec_node(
    exec: &Arc<Execution>,
    store: &VariableStore,
    key: &str,
) -> WorkflowResult<ExecDone> {
    let node = exec
        .schema
        .get_node(key)
        .ok_or_else(|| WorkflowError::InternalError(format!("node {key} missing from schema")))?;

    if exec.ctx.cancel.is_cancelled() {
        return Err(WorkflowError::Aborted("execution cancelled".to_string()));
    }
    if exec.ctx.deadline_passed() {
        return Err(WorkflowError::Timeout);
    }

    // resume: persisted nodes publish their stored outputs and are skipped
    if exec.resume_nodes.contains(key) {
        if let Some(cp) = &exec.checkpoint {
            if let Some(bytes) = cp.get(&exec.ctx.execution_id, key).await? {
                let persisted: PersistedNode = serde_json::from_slice(&bytes)?;
                store.set_node_output(key, persisted.values);
                return Ok(ExecDone { chosen_port: persisted.chosen_port, signal: None });
            }
        }
    }

    let output = match node.node_type {
        NodeType::Loop => composite::run_loop(exec, store, node).await?,
        NodeType::Batch => composite::run_batch(exec, store, node).await?,
        NodeType::SubWorkflow => composite::run_sub_workflow(exec, store, node).await?,
        _ => run_plain_node(exec, store, node).await?,
    };

    publish_output(exec, store, node, output).await
}

/// Publish a node's outputs atomically, register its streams, and persist
/// the checkpoint when the workflow requires one.
pub(crate) async fn publish_output(
    exec: &Arc<Execution>,
    store: &VariableStore,
    node: &NodeSchema,
    mut output: NodeOutput,
) -> WorkflowResult<ExecDone> {
    store.set_node_output(&node.key, output.value_object());
    for (field, reader) in output.streams.drain() {
        store.register_stream(&node.key, &field, reader);
    }

    if exec.schema.require_checkpoint {
        if let Some(cp) = &exec.checkpoint {
            let persisted = PersistedNode {
                values: store.get_node_output(&node.key).unwrap_or(Value::Null),
                chosen_port: output.chosen_port.clone(),
            };
            cp.put(&exec.ctx.execution_id, &node.key, serde_json::to_vec(&persisted)?)
                .await?;
        }
    }

    Ok(ExecDone { chosen_port: output.chosen_port, signal: output.signal })
}

async fn run_plain_node(
    exec: &Arc<Execution>,
    store: &VariableStore,
    node: &NodeSchema,
) -> WorkflowResult<NodeOutput> {
    let executor = exec
        .registry
        .get(node.node_type)
        .ok_or_else(|| NodeError::ExecutorNotFound(node.node_type.to_string()))?;

    let (values, streams) = resolve_inputs(exec, store, node);
    let mut streams_slot = Some(streams);

    let ctx = Arc::clone(&exec.ctx);
    let policy_run = execute_with_policy(node, |attempt| {
        let input = NodeInput {
            values: values.clone(),
            streams: streams_slot.take().unwrap_or_default(),
            attempt,
        };
        let executor = Arc::clone(&executor);
        let ctx = Arc::clone(&ctx);
        let store = store.clone();
        async move { executor.execute(node, input, &ctx, &store).await }
    });

    let output = match exec.ctx.deadline {
        Some(deadline) => {
            tokio::select! {
                result = policy_run => result,
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    return Err(WorkflowError::Timeout);
                }
                _ = exec.ctx.cancel.cancelled() => {
                    return Err(WorkflowError::Aborted("execution cancelled".to_string()));
                }
            }
        }
        None => {
            tokio::select! {
                result = policy_run => result,
                _ = exec.ctx.cancel.cancelled() => {
                    return Err(WorkflowError::Aborted("execution cancelled".to_string()));
                }
            }
        }
    };

    output.map_err(|e| WorkflowError::NodeExecutionError {
        node_key: node.key.clone(),
        error: e.to_string(),
    })
}

/// Resolve a node's declared input sources against the store, taking
/// ownership of any streams the node is entitled to consume.
pub(crate) fn resolve_inputs(
    exec: &Arc<Execution>,
    store: &VariableStore,
    node: &NodeSchema,
) -> (HashMap<String, Value>, HashMap<String, super::stream::StreamReader>) {
    let mut values = HashMap::new();
    let mut streams = HashMap::new();

    for source in &node.input_sources {
        let field = source.path.join(".");
        if node.requires_streaming_input() {
            if let crate::schema::FieldSource::Ref { from_node, from_path } = &source.source {
                if from_path.len() == 1 {
                    if let Some(reader) = store.take_stream(from_node, &from_path[0]) {
                        streams.insert(field.clone(), reader);
                    }
                }
            }
        }
        if let Some(value) = store.resolve(&source.source, &exec.ctx.globals) {
            values.insert(field, value);
        }
    }

    (values, streams)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_taken_rules() {
        // unported edges always fire on normal completion
        assert!(edge_taken(None, None));
        // branch edges fire only on their chosen port
        assert!(edge_taken(Some("branch_0"), Some("branch_0")));
        assert!(!edge_taken(Some("branch_0"), Some("branch_1")));
        assert!(!edge_taken(Some("branch_0"), Some("default")));
        // continuation edges fire alongside a chosen branch
        assert!(edge_taken(Some("branch_0"), None));
        // exception edges fire only when the exception branch was chosen,
        // and exception routing suppresses the normal continuation
        assert!(!edge_taken(None, Some(PORT_ERROR)));
        assert!(edge_taken(Some(PORT_ERROR), Some(PORT_ERROR)));
        assert!(!edge_taken(Some(PORT_ERROR), None));
    }
}
