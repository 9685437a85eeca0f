//! Composite nodes: Loop, Batch, and the Break/Continue control signals.

use super::helpers::{base_schema, literal_i64, set_inputs, set_outputs_auto};
use super::{AdaptContext, NodeAdaptor};
use crate::canvas::{CanvasNode, LoopType, NodeType};
use crate::error::{WorkflowError, WorkflowResult};
use crate::schema::configs::{BatchConfig, LoopConfig};
use crate::schema::{NodeConfig, NodeSchema};

pub struct LoopAdaptor;

impl NodeAdaptor for LoopAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let inputs = node.data.inputs.as_ref();

        let loop_type = inputs.and_then(|i| i.loop_type).unwrap_or(LoopType::Array);
        let count = inputs.and_then(|i| i.loop_count.as_ref()).and_then(literal_i64);
        let variables = inputs
            .map(|i| i.variable_parameters.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default();

        if loop_type == LoopType::Count && count.is_none() {
            // the count may also arrive as a reference; only a missing slot
            // altogether is a config error
            let has_slot = inputs.map(|i| i.loop_count.is_some()).unwrap_or(false);
            if !has_slot {
                return Err(WorkflowError::SchemaConversionFail {
                    node_key: node.id.clone(),
                    reason: "count loop requires a loopCount input".to_string(),
                });
            }
        }

        let config = LoopConfig { loop_type, count, variables };
        let mut ns = base_schema(node, NodeType::Loop, NodeConfig::Loop(config))?;

        if let Some(inputs) = inputs {
            set_inputs(&mut ns, &inputs.input_parameters);
            // loop-local variables carry their initial values as inputs
            set_inputs(&mut ns, &inputs.variable_parameters);
            if let Some(count_input) = &inputs.loop_count {
                super::helpers::add_input(&mut ns, "loopCount", count_input);
            }
        }
        set_outputs_auto(&mut ns, &node.data.outputs)?;
        Ok(ns)
    }
}

pub struct BatchAdaptor;

impl NodeAdaptor for BatchAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        let inputs = node.data.inputs.as_ref();

        let batch_size = inputs
            .and_then(|i| i.batch_size.as_ref())
            .and_then(literal_i64)
            .unwrap_or(1)
            .max(1);
        let concurrent_size = inputs
            .and_then(|i| i.concurrent_size.as_ref())
            .and_then(literal_i64)
            .unwrap_or(1)
            .max(1);

        let config = BatchConfig { batch_size, concurrent_size };
        let mut ns = base_schema(node, NodeType::Batch, NodeConfig::Batch(config))?;

        if let Some(inputs) = inputs {
            set_inputs(&mut ns, &inputs.input_parameters);
        }
        set_outputs_auto(&mut ns, &node.data.outputs)?;
        Ok(ns)
    }
}

pub struct BreakAdaptor;

impl NodeAdaptor for BreakAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        base_schema(node, NodeType::Break, NodeConfig::Break)
    }
}

pub struct ContinueAdaptor;

impl NodeAdaptor for ContinueAdaptor {
    fn adapt(&self, node: &CanvasNode, _ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema> {
        base_schema(node, NodeType::Continue, NodeConfig::Continue)
    }
}
