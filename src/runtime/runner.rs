//! Workflow runner: builder-configured execution entry point.

use super::checkpoint::CheckpointStore;
use super::context::{CancelToken, ExecutionContext, RuntimeServices};
use super::executor::ExecutorRegistry;
use super::scheduler::{run_scope, Execution};
use super::state::VariableStore;
use crate::canvas::NodeType;
use crate::error::{WorkflowError, WorkflowResult};
use crate::schema::WorkflowSchema;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Terminal status of one execution.
#[derive(Debug, Clone)]
pub enum ExecutionStatus {
    Completed(HashMap<String, Value>),
    Failed(String),
}

/// Result of a completed run.
pub struct ExecutionOutcome {
    pub execution_id: String,
    pub outputs: HashMap<String, Value>,
}

pub struct WorkflowRunner;

impl WorkflowRunner {
    pub fn builder(schema: WorkflowSchema) -> WorkflowRunnerBuilder {
        WorkflowRunnerBuilder {
            schema: Arc::new(schema),
            registry: None,
            services: RuntimeServices::default(),
            caller_inputs: HashMap::new(),
            provided_inputs: HashMap::new(),
            globals: HashMap::new(),
            checkpoint: None,
            execution_id: None,
            timeout: None,
            cancel: CancelToken::new(),
            answer_tx: None,
            resume: false,
        }
    }
}

pub struct WorkflowRunnerBuilder {
    schema: Arc<WorkflowSchema>,
    registry: Option<Arc<ExecutorRegistry>>,
    services: RuntimeServices,
    caller_inputs: HashMap<String, Value>,
    provided_inputs: HashMap<String, Value>,
    globals: HashMap<String, Value>,
    checkpoint: Option<Arc<dyn CheckpointStore>>,
    execution_id: Option<String>,
    timeout: Option<Duration>,
    cancel: CancelToken,
    answer_tx: Option<mpsc::Sender<String>>,
    resume: bool,
}

impl WorkflowRunnerBuilder {
    pub fn caller_inputs(mut self, inputs: HashMap<String, Value>) -> Self {
        self.caller_inputs = inputs;
        self
    }

    pub fn services(mut self, services: RuntimeServices) -> Self {
        self.services = services;
        self
    }

    pub fn registry(mut self, registry: Arc<ExecutorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn globals(mut self, globals: HashMap<String, Value>) -> Self {
        self.globals = globals;
        self
    }

    /// Pre-supply the answer a suspending node (InputReceiver,
    /// QuestionAnswer) would otherwise wait for.
    pub fn provided_input(mut self, node_key: &str, value: Value) -> Self {
        self.provided_inputs.insert(node_key.to_string(), value);
        self
    }

    pub fn checkpoint(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint = Some(store);
        self
    }

    pub fn execution_id(mut self, id: impl Into<String>) -> Self {
        self.execution_id = Some(id.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Resume from persisted checkpoints under the configured execution id.
    pub fn resume(mut self) -> Self {
        self.resume = true;
        self
    }

    /// Attach an answer stream; chatflow exits and output emitters write
    /// their content here chunk by chunk.
    pub fn answer_stream(mut self) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(super::stream::STREAM_CAPACITY);
        self.answer_tx = Some(tx);
        (self, rx)
    }

    pub async fn run(self) -> WorkflowResult<ExecutionOutcome> {
        let execution_id =
            self.execution_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let ctx = ExecutionContext {
            execution_id: execution_id.clone(),
            cancel: self.cancel.clone(),
            deadline: self.timeout.map(|t| Instant::now() + t),
            services: self.services.clone(),
            caller_inputs: self.caller_inputs.clone(),
            provided_inputs: self.provided_inputs.clone(),
            globals: self.globals.clone(),
            answer_tx: self.answer_tx.clone(),
        };

        let mut resume_nodes = HashSet::new();
        if self.resume {
            let Some(cp) = &self.checkpoint else {
                return Err(WorkflowError::InvalidParameter(
                    "resume requested without a checkpoint store".to_string(),
                ));
            };
            resume_nodes = cp.list(&execution_id).await?.into_iter().collect();
        }

        let exec = Arc::new(Execution {
            schema: Arc::clone(&self.schema),
            registry: self.registry.unwrap_or_else(|| Arc::new(ExecutorRegistry::with_builtins())),
            ctx: Arc::new(ctx),
            checkpoint: self.checkpoint.clone(),
            resume_nodes,
        });

        let store = VariableStore::new();
        let scope_keys: Vec<String> =
            exec.schema.top_level_nodes().iter().map(|n| n.key.clone()).collect();
        let connections = exec.schema.connections.clone();

        run_scope(Arc::clone(&exec), scope_keys, connections, store.clone()).await?;

        let outputs = exec
            .schema
            .nodes
            .iter()
            .find(|n| n.node_type == NodeType::Exit)
            .and_then(|exit| store.get_node_output(&exit.key))
            .and_then(|v| match v {
                Value::Object(map) => Some(map.into_iter().collect::<HashMap<_, _>>()),
                _ => None,
            })
            .unwrap_or_default();

        // a finished run has no use for its checkpoints
        if let Some(cp) = &self.checkpoint {
            if exec.schema.require_checkpoint {
                cp.clear(&execution_id).await?;
            }
        }

        Ok(ExecutionOutcome { execution_id, outputs })
    }

    /// Run and fold the result into a status value.
    pub async fn run_to_status(self) -> ExecutionStatus {
        match self.run().await {
            Ok(outcome) => ExecutionStatus::Completed(outcome.outputs),
            Err(e) => ExecutionStatus::Failed(e.to_string()),
        }
    }
}
