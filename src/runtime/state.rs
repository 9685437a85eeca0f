//! Per-execution variable state.
//!
//! Node outputs are published atomically as one JSON object per node key;
//! downstream readers never observe partial objects. Composite runners push
//! an overlay frame for per-iteration bindings (current element, index)
//! while loop-local variables keep living in the frame that declared them.

use crate::schema::{FieldSource, GlobalVarScope};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::stream::StreamReader;

type Frame = Arc<RwLock<HashMap<String, Value>>>;

/// Layered variable store. Reads walk frames from the innermost overlay
/// outwards at field granularity; writes land in the frame that already
/// holds the node, else the innermost frame.
#[derive(Clone)]
pub struct VariableStore {
    frames: Vec<Frame>,
    /// Pending output streams, single-consumer, keyed `(node, field)`.
    streams: Arc<Mutex<HashMap<(String, String), StreamReader>>>,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore {
    pub fn new() -> VariableStore {
        VariableStore {
            frames: vec![Arc::new(RwLock::new(HashMap::new()))],
            streams: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// A child store sharing every existing frame plus a fresh overlay.
    pub fn overlay(&self) -> VariableStore {
        let mut frames = self.frames.clone();
        frames.push(Arc::new(RwLock::new(HashMap::new())));
        VariableStore { frames, streams: Arc::clone(&self.streams) }
    }

    /// Publish a node's outputs as one atomic object.
    pub fn set_node_output(&self, node_key: &str, output: Value) {
        let frame = self
            .frames
            .iter()
            .rev()
            .find(|f| f.read().contains_key(node_key))
            .unwrap_or_else(|| self.frames.last().expect("at least one frame"));
        frame.write().insert(node_key.to_string(), output);
    }

    /// Merge one field into a node's output object, creating it on demand.
    ///
    /// The write lands in the frame that already declares the field (so a
    /// loop variable keeps living in its declaring frame even when an
    /// overlay holds other fields of the same node), else the frame holding
    /// the node, else the innermost frame.
    pub fn set_field(&self, node_key: &str, path: &[String], value: Value) {
        let declaring = self.frames.iter().rev().find(|f| {
            let guard = f.read();
            guard
                .get(node_key)
                .map(|obj| get_at_path(obj, path).is_some())
                .unwrap_or(false)
        });
        let frame = declaring
            .or_else(|| self.frames.iter().rev().find(|f| f.read().contains_key(node_key)))
            .unwrap_or_else(|| self.frames.last().expect("at least one frame"));
        let mut guard = frame.write();
        let entry = guard.entry(node_key.to_string()).or_insert_with(|| Value::Object(Map::new()));
        set_at_path(entry, path, value);
    }

    /// Write a field into the innermost frame unconditionally, masking any
    /// outer value. Composite runners use this for per-iteration bindings.
    pub fn set_local_field(&self, node_key: &str, path: &[String], value: Value) {
        let frame = self.frames.last().expect("at least one frame");
        let mut guard = frame.write();
        let entry = guard.entry(node_key.to_string()).or_insert_with(|| Value::Object(Map::new()));
        set_at_path(entry, path, value);
    }

    /// Read one field of a node's output, innermost frame first.
    pub fn get_field(&self, node_key: &str, path: &[String]) -> Option<Value> {
        for frame in self.frames.iter().rev() {
            let guard = frame.read();
            if let Some(obj) = guard.get(node_key) {
                if let Some(found) = get_at_path(obj, path) {
                    return Some(found.clone());
                }
            }
        }
        None
    }

    /// The node's whole output object (innermost frame that has it).
    pub fn get_node_output(&self, node_key: &str) -> Option<Value> {
        for frame in self.frames.iter().rev() {
            let guard = frame.read();
            if let Some(obj) = guard.get(node_key) {
                return Some(obj.clone());
            }
        }
        None
    }

    pub fn register_stream(&self, node_key: &str, field: &str, reader: StreamReader) {
        self.streams.lock().insert((node_key.to_string(), field.to_string()), reader);
    }

    /// Take the stream for a field, transferring consumption rights.
    pub fn take_stream(&self, node_key: &str, field: &str) -> Option<StreamReader> {
        self.streams.lock().remove(&(node_key.to_string(), field.to_string()))
    }

    pub fn has_stream(&self, node_key: &str, field: &str) -> bool {
        self.streams.lock().contains_key(&(node_key.to_string(), field.to_string()))
    }

    /// Resolve a compiled field source against this store.
    pub fn resolve(
        &self,
        source: &FieldSource,
        globals: &HashMap<String, Value>,
    ) -> Option<Value> {
        match source {
            FieldSource::Literal { value } => Some(value.clone()),
            FieldSource::Ref { from_node, from_path } => self.get_field(from_node, from_path),
            FieldSource::Global { scope, path } => {
                let key = global_key(*scope, path);
                globals.get(&key).cloned()
            }
        }
    }
}

fn global_key(scope: GlobalVarScope, path: &[String]) -> String {
    let prefix = match scope {
        GlobalVarScope::App => "app",
        GlobalVarScope::System => "system",
        GlobalVarScope::User => "user",
    };
    format!("{prefix}.{}", path.join("."))
}

fn get_at_path<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

fn set_at_path(target: &mut Value, path: &[String], value: Value) {
    if path.is_empty() {
        *target = value;
        return;
    }
    let mut current = target;
    for segment in &path[..path.len() - 1] {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = current
            .as_object_mut()
            .expect("just ensured object")
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    current
        .as_object_mut()
        .expect("just ensured object")
        .insert(path[path.len() - 1].clone(), value);
}
