//! flowforge — a versioned, DAG-based workflow orchestration engine.
//!
//! The crate compiles a visual canvas into an executable
//! [`WorkflowSchema`](schema::WorkflowSchema), manages the draft/version
//! lifecycle of workflows ([`service::WorkflowService`]), and runs compiled
//! schemas on an async scheduler with streaming, checkpointing, exception
//! policies and batch/loop composites ([`runtime::WorkflowRunner`]).

pub mod canvas;
pub mod compiler;
pub mod error;
pub mod infra;
pub mod nodes;
pub mod refs;
pub mod runtime;
pub mod schema;
pub mod service;
pub mod store;
pub mod validate;

pub use crate::canvas::{Canvas, NodeType};
pub use crate::compiler::{compile, SubCanvasStore, WorkflowIdentity};
pub use crate::error::{NodeError, WorkflowError, WorkflowResult};
pub use crate::nodes::{AdaptorRegistry, NodeAdaptor};
pub use crate::runtime::{
    CancelToken, CheckpointStore, ExecutorRegistry, RuntimeServices, WorkflowRunner,
};
pub use crate::schema::{NodeSchema, WorkflowSchema};
pub use crate::service::{ValidateTreeConfig, WorkflowService};
pub use crate::store::{
    DeletePolicy, GetPolicy, InMemoryRepository, MGetPolicy, MetaCreate, PublishPolicy,
    QueryType, Repository, WorkflowMode,
};
pub use crate::validate::{CheckType, ValidateIssue};
