//! Execution runtime: DAG scheduling, streaming, checkpointing, exception
//! policy, and composite (loop/batch) runners.
//!
//! The runtime consumes a compiled [`WorkflowSchema`](crate::schema::WorkflowSchema)
//! and drives it on the tokio runtime. Nodes that are mutually
//! data-independent run in parallel; composites fork child executions with
//! their own concurrency limits.

pub mod checkpoint;
pub mod composite;
pub mod condition;
pub mod context;
pub mod exception;
pub mod executor;
pub mod runner;
pub mod scheduler;
pub mod state;
pub mod stream;

pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use context::{CancelToken, ExecutionContext, RuntimeServices};
pub use executor::{ControlSignal, ExecutorRegistry, NodeExecutor, NodeInput, NodeOutput};
pub use runner::{ExecutionStatus, WorkflowRunner, WorkflowRunnerBuilder};
pub use state::VariableStore;
pub use stream::{StreamReader, StreamWriter};
