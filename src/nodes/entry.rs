//! Entry node: exposes the workflow's input parameters.

use super::helpers::{base_schema, set_output_variables};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType, Variable};
use crate::error::WorkflowResult;
use crate::schema::configs::EntryConfig;
use crate::schema::{NodeConfig, NodeSchema};

pub struct EntryAdaptor;

impl NodeAdaptor for EntryAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let mut config = EntryConfig::default();
        for raw in &node.data.outputs {
            if let Ok(v) = Variable::parse(raw) {
                if let Some(default) = v.default_value.clone() {
                    config.default_values.insert(v.name.clone(), default);
                }
            }
        }

        let mut ns = base_schema(node, NodeType::Entry, NodeConfig::Entry(config))?;
        set_output_variables(&mut ns, &node.data.outputs)?;
        Ok(ns)
    }
}
