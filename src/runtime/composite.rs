//! Composite runners: Loop, Batch, and embedded sub-workflows.

use super::context::ExecutionContext;
use super::executor::{ControlSignal, NodeOutput};
use super::scheduler::{resolve_inputs, run_scope, Execution};
use super::state::VariableStore;
use crate::canvas::LoopType;
use crate::error::{WorkflowError, WorkflowResult};
use crate::schema::{Connection, NodeConfig, NodeSchema, WorkflowSchema};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Boxed future type used to break the recursive-opaque-type cycle between
/// the scheduler and the composite runners, which otherwise defeats rustc's
/// auto-trait (Send) inference for these mutually-recursive async fns.
type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Children and in-scope connections of a composite parent.
fn child_scope(schema: &WorkflowSchema, parent_key: &str) -> (Vec<String>, Vec<Connection>) {
    let children: Vec<String> = schema
        .hierarchy
        .iter()
        .filter(|(_, parent)| parent.as_str() == parent_key)
        .map(|(child, _)| child.clone())
        .collect();
    let member: std::collections::HashSet<&str> =
        children.iter().map(String::as_str).collect();
    let connections: Vec<Connection> = schema
        .connections
        .iter()
        .filter(|c| member.contains(c.from_node.as_str()) || member.contains(c.to_node.as_str()))
        .cloned()
        .collect();
    (children, connections)
}

/// Input parameter values that are lists, in declaration order.
fn list_inputs(
    node: &NodeSchema,
    values: &HashMap<String, Value>,
    exclude: &[String],
) -> Vec<(String, Vec<Value>)> {
    let mut out = Vec::new();
    for source in &node.input_sources {
        let name = source.path.join(".");
        if exclude.contains(&name) {
            continue;
        }
        if let Some(Value::Array(items)) = values.get(&name) {
            out.push((name, items.clone()));
        }
    }
    out
}

/// Resolve the composite's declared outputs against an iteration store.
fn resolve_outputs(
    node: &NodeSchema,
    store: &VariableStore,
    globals: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    for field in &node.output_sources {
        if let Some(value) = store.resolve(&field.source, globals) {
            out.insert(field.path.join("."), value);
        }
    }
    out
}

pub(crate) fn run_loop<'a>(
    exec: &'a Arc<Execution>,
    store: &'a VariableStore,
    node: &'a NodeSchema,
) -> BoxFuture<'a, WorkflowResult<NodeOutput>> {
    Box::pin(run_loop_inner(exec, store, node))
}

async fn run_loop_inner(
    exec: &Arc<Execution>,
    store: &VariableStore,
    node: &NodeSchema,
) -> WorkflowResult<NodeOutput> {
    let NodeConfig::Loop(config) = &node.configs else {
        return Err(WorkflowError::InternalError(format!(
            "node {} is not a loop",
            node.key
        )));
    };

    let (values, _) = resolve_inputs(exec, store, node);

    // loop variables live on the parent node's output object in the shared
    // frame, so assigners inside the body persist across iterations
    let mut initial = serde_json::Map::new();
    for var in &config.variables {
        initial.insert(var.clone(), values.get(var).cloned().unwrap_or(Value::Null));
    }
    store.set_node_output(&node.key, Value::Object(initial));

    let mut exclude = config.variables.clone();
    exclude.push("loopCount".to_string());
    let lists = list_inputs(node, &values, &exclude);

    let plan = match config.loop_type {
        LoopType::Array => {
            let shortest = lists.iter().map(|(_, l)| l.len()).min().unwrap_or(0);
            Some(shortest)
        }
        LoopType::Count => {
            let count = config
                .count
                .or_else(|| values.get("loopCount").and_then(Value::as_i64))
                .unwrap_or(0);
            Some(count.max(0) as usize)
        }
        LoopType::Infinite => None,
    };

    let (children, connections) = child_scope(&exec.schema, &node.key);
    let mut last_outputs: HashMap<String, Value> = HashMap::new();

    let mut index: usize = 0;
    loop {
        match plan {
            Some(n) if index >= n => break,
            _ => {}
        }
        if exec.ctx.cancel.is_cancelled() {
            return Err(WorkflowError::Aborted("execution cancelled".to_string()));
        }
        if exec.ctx.deadline_passed() {
            return Err(WorkflowError::Timeout);
        }

        let iteration = store.overlay();
        iteration.set_local_field(&node.key, &["index".to_string()], Value::from(index as i64));
        for (name, list) in &lists {
            let element = list.get(index).cloned().unwrap_or(Value::Null);
            iteration.set_local_field(&node.key, &[name.clone()], element);
        }

        let signal = run_scope(
            Arc::clone(exec),
            children.clone(),
            connections.clone(),
            iteration.clone(),
        )
        .await?;

        last_outputs = resolve_outputs(node, &iteration, &exec.ctx.globals);

        match signal {
            Some(ControlSignal::Break) => break,
            Some(ControlSignal::Continue) | None => {}
        }
        index += 1;
    }

    // final values: declared outputs from the last iteration plus the loop
    // variables' terminal state
    let mut out_values = last_outputs;
    for var in &config.variables {
        if let Some(value) = store.get_field(&node.key, &[var.clone()]) {
            out_values.insert(var.clone(), value);
        }
    }
    Ok(NodeOutput::from_values(out_values))
}

pub(crate) fn run_batch<'a>(
    exec: &'a Arc<Execution>,
    store: &'a VariableStore,
    node: &'a NodeSchema,
) -> BoxFuture<'a, WorkflowResult<NodeOutput>> {
    Box::pin(run_batch_inner(exec, store, node))
}

async fn run_batch_inner(
    exec: &Arc<Execution>,
    store: &VariableStore,
    node: &NodeSchema,
) -> WorkflowResult<NodeOutput> {
    let NodeConfig::Batch(config) = &node.configs else {
        return Err(WorkflowError::InternalError(format!(
            "node {} is not a batch",
            node.key
        )));
    };

    let (values, _) = resolve_inputs(exec, store, node);
    let lists = list_inputs(node, &values, &[]);
    let total = lists.iter().map(|(_, l)| l.len()).min().unwrap_or(0);

    let (children, connections) = child_scope(&exec.schema, &node.key);
    let semaphore = Arc::new(Semaphore::new(config.concurrent_size.max(1) as usize));
    let batch_size = config.batch_size.max(1) as usize;

    let mut element_outputs: Vec<HashMap<String, Value>> = Vec::with_capacity(total);
    element_outputs.resize_with(total, HashMap::new);

    for wave in (0..total).collect::<Vec<_>>().chunks(batch_size) {
        let mut tasks: JoinSet<(usize, WorkflowResult<HashMap<String, Value>>)> = JoinSet::new();

        for &index in wave {
            let exec = Arc::clone(exec);
            let store = store.clone();
            let node_key = node.key.clone();
            let children = children.clone();
            let connections = connections.clone();
            let lists = lists.clone();
            let semaphore = Arc::clone(&semaphore);
            let output_sources = node.output_sources.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire().await;
                let element = store.overlay();
                element.set_local_field(
                    &node_key,
                    &["index".to_string()],
                    Value::from(index as i64),
                );
                for (name, list) in &lists {
                    let item = list.get(index).cloned().unwrap_or(Value::Null);
                    element.set_local_field(&node_key, &[name.clone()], item);
                }

                let run = run_scope(
                    Arc::clone(&exec),
                    children.clone(),
                    connections.clone(),
                    element.clone(),
                )
                .await;
                let result = match run {
                    Ok(_) => {
                        let mut out = HashMap::new();
                        for field in &output_sources {
                            if let Some(value) =
                                element.resolve(&field.source, &exec.ctx.globals)
                            {
                                out.insert(field.path.join("."), value);
                            }
                        }
                        Ok(out)
                    }
                    Err(e) => Err(e),
                };
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, result) =
                joined.map_err(|e| WorkflowError::InternalError(format!("batch task: {e}")))?;
            element_outputs[index] = result?;
        }
    }

    // aggregate positionally into the declared list outputs
    let mut out_values = HashMap::new();
    for field in &node.output_sources {
        let name = field.path.join(".");
        let items: Vec<Value> = element_outputs
            .iter()
            .map(|e| e.get(&name).cloned().unwrap_or(Value::Null))
            .collect();
        out_values.insert(name, Value::Array(items));
    }
    Ok(NodeOutput::from_values(out_values))
}

pub(crate) fn run_sub_workflow<'a>(
    exec: &'a Arc<Execution>,
    store: &'a VariableStore,
    node: &'a NodeSchema,
) -> BoxFuture<'a, WorkflowResult<NodeOutput>> {
    Box::pin(run_sub_workflow_inner(exec, store, node))
}

async fn run_sub_workflow_inner(
    exec: &Arc<Execution>,
    store: &VariableStore,
    node: &NodeSchema,
) -> WorkflowResult<NodeOutput> {
    let sub_schema = node.sub_workflow_schema.as_ref().ok_or_else(|| {
        WorkflowError::InternalError(format!("sub workflow node {} has no schema", node.key))
    })?;

    let (values, _) = resolve_inputs(exec, store, node);

    let parent_ctx = &exec.ctx;
    let sub_ctx = ExecutionContext {
        execution_id: format!("{}/{}", parent_ctx.execution_id, node.key),
        cancel: parent_ctx.cancel.clone(),
        deadline: parent_ctx.deadline,
        services: parent_ctx.services.clone(),
        caller_inputs: values,
        provided_inputs: parent_ctx.provided_inputs.clone(),
        globals: parent_ctx.globals.clone(),
        answer_tx: parent_ctx.answer_tx.clone(),
    };

    let sub_exec = Arc::new(Execution {
        schema: Arc::new((**sub_schema).clone()),
        registry: Arc::clone(&exec.registry),
        ctx: Arc::new(sub_ctx),
        checkpoint: exec.checkpoint.clone(),
        resume_nodes: Default::default(),
    });

    let sub_store = VariableStore::new();
    let scope_keys: Vec<String> =
        sub_exec.schema.top_level_nodes().iter().map(|n| n.key.clone()).collect();
    let connections = sub_exec.schema.connections.clone();
    run_scope(Arc::clone(&sub_exec), scope_keys, connections, sub_store.clone()).await?;

    // the sub-workflow's result is its exit node's output object
    let exit_output = sub_exec
        .schema
        .nodes
        .iter()
        .find(|n| n.node_type == crate::canvas::NodeType::Exit)
        .and_then(|exit| sub_store.get_node_output(&exit.key))
        .unwrap_or(Value::Null);

    let mut out_values = HashMap::new();
    if let Value::Object(map) = exit_output {
        for (k, v) in map {
            out_values.insert(k, v);
        }
    }
    Ok(NodeOutput::from_values(out_values))
}
