//! Canvas → schema compiler.
//!
//! Turns an authored [`Canvas`](crate::canvas::Canvas) into an executable
//! [`WorkflowSchema`](crate::schema::WorkflowSchema): prunes isolated nodes,
//! expands batch-mode nodes, adapts every node through the
//! [adaptor registry](crate::nodes::AdaptorRegistry), assembles connections,
//! normalizes ports and builds branch tables.
//!
//! Sub-workflow nodes are compiled recursively from a pre-resolved
//! [`SubCanvasStore`]; the compiler itself never performs I/O.

mod batch;
mod compile;
mod ports;
mod prune;

pub use compile::{compile, compile_with_registry, to_exception_config};
pub use ports::{build_branches, edge_to_connection, normalize_ports};
pub use prune::prune_isolated_nodes;

use crate::canvas::Canvas;
use std::collections::HashMap;

/// Identity of a workflow canvas: id plus an optional published version.
/// `None` references the draft.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkflowIdentity {
    pub id: i64,
    pub version: Option<String>,
}

impl WorkflowIdentity {
    pub fn draft(id: i64) -> WorkflowIdentity {
        WorkflowIdentity { id, version: None }
    }

    pub fn versioned(id: i64, version: &str) -> WorkflowIdentity {
        WorkflowIdentity { id, version: Some(version.to_string()) }
    }

    /// Parse the version spelling used on canvas nodes, where the empty
    /// string means draft.
    pub fn from_node_ref(id: i64, version: &str) -> WorkflowIdentity {
        if version.is_empty() {
            Self::draft(id)
        } else {
            Self::versioned(id, version)
        }
    }
}

/// Pre-resolved canvases for every workflow the compiled canvas references,
/// directly or transitively. The service layer populates this from the
/// repository before invoking the compiler.
#[derive(Debug, Default)]
pub struct SubCanvasStore {
    canvases: HashMap<WorkflowIdentity, Canvas>,
}

impl SubCanvasStore {
    pub fn new() -> SubCanvasStore {
        SubCanvasStore::default()
    }

    pub fn insert(&mut self, identity: WorkflowIdentity, canvas: Canvas) {
        self.canvases.insert(identity, canvas);
    }

    pub fn get(&self, identity: &WorkflowIdentity) -> Option<&Canvas> {
        self.canvases.get(identity)
    }

    pub fn is_empty(&self) -> bool {
        self.canvases.is_empty()
    }
}
