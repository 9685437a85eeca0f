//! Input receiver: suspends the workflow until the caller supplies input.

use super::helpers::{base_schema, set_output_variables};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::{CanvasNode, NodeType};
use crate::error::WorkflowResult;
use crate::schema::configs::InputReceiverConfig;
use crate::schema::{NodeConfig, NodeSchema};

pub struct InputReceiverAdaptor;

impl NodeAdaptor for InputReceiverAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let output_schema = node
            .data
            .inputs
            .as_ref()
            .map(|i| i.output_schema.clone())
            .unwrap_or_default();

        let mut ns = base_schema(
            node,
            NodeType::InputReceiver,
            NodeConfig::InputReceiver(InputReceiverConfig { output_schema }),
        )?;
        set_output_variables(&mut ns, &node.data.outputs)?;
        Ok(ns)
    }
}
