//! Node adaptors: per-type translation of canvas nodes into typed schemas.
//!
//! The registry is process-wide and write-once; tests build their own via
//! [`AdaptorRegistryBuilder`] to swap entries. Adaptors are stateless — each
//! `adapt` call produces a fresh config value.

pub mod code;
pub mod conversation;
pub mod database;
pub mod emitter;
pub mod entry;
pub mod exit;
pub mod helpers;
pub mod intent;
pub mod json;
pub mod knowledge;
pub mod llm;
pub mod loop_node;
pub mod plugin;
pub mod qa;
pub mod receiver;
pub mod selector;
pub mod text;
pub mod variable;

use crate::canvas::{Canvas, CanvasNode, NodeType};
use crate::error::WorkflowResult;
use crate::schema::NodeSchema;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Context handed to adaptors: the full canvas, for cross-node lookups.
pub struct AdaptContext<'a> {
    pub canvas: &'a Canvas,
}

/// Converts one canvas node into a compiled [`NodeSchema`].
pub trait NodeAdaptor: Send + Sync {
    fn adapt(&self, node: &CanvasNode, ctx: &AdaptContext<'_>) -> WorkflowResult<NodeSchema>;
}

pub type AdaptorFactory = fn() -> Box<dyn NodeAdaptor>;

/// Registry mapping node types to adaptor factories.
pub struct AdaptorRegistry {
    factories: HashMap<NodeType, AdaptorFactory>,
}

impl AdaptorRegistry {
    pub fn builder() -> AdaptorRegistryBuilder {
        AdaptorRegistryBuilder { factories: HashMap::new() }
    }

    /// Registry with every built-in node type registered.
    pub fn with_builtins() -> AdaptorRegistry {
        use NodeType::*;
        let mut b = Self::builder();
        b = b
            .register(Entry, || Box::new(entry::EntryAdaptor))
            .register(Exit, || Box::new(exit::ExitAdaptor))
            .register(OutputEmitter, || Box::new(emitter::EmitterAdaptor))
            .register(Selector, || Box::new(selector::SelectorAdaptor))
            .register(Loop, || Box::new(loop_node::LoopAdaptor))
            .register(Batch, || Box::new(loop_node::BatchAdaptor))
            .register(Break, || Box::new(loop_node::BreakAdaptor))
            .register(Continue, || Box::new(loop_node::ContinueAdaptor))
            .register(InputReceiver, || Box::new(receiver::InputReceiverAdaptor))
            .register(JsonSerialization, || Box::new(json::JsonSerializationAdaptor))
            .register(JsonDeserialization, || Box::new(json::JsonDeserializationAdaptor))
            .register(VariableAssigner, || Box::new(variable::VariableAssignerAdaptor { within_loop: false }))
            .register(VariableAssignerWithinLoop, || {
                Box::new(variable::VariableAssignerAdaptor { within_loop: true })
            })
            .register(VariableAggregator, || Box::new(variable::VariableAggregatorAdaptor))
            .register(Plugin, || Box::new(plugin::PluginAdaptor))
            .register(CodeRunner, || Box::new(code::CodeAdaptor))
            .register(TextProcessor, || Box::new(text::TextProcessorAdaptor))
            .register(IntentDetector, || Box::new(intent::IntentDetectorAdaptor))
            .register(QuestionAnswer, || Box::new(qa::QuestionAnswerAdaptor))
            .register(HTTPRequester, || Box::new(code::HttpAdaptor))
            .register(LLM, || Box::new(llm::LlmAdaptor));

        for (node_type, op) in knowledge::KNOWLEDGE_OPS {
            b.factories.insert(*node_type, *op);
        }
        for (node_type, op) in database::DATABASE_OPS {
            b.factories.insert(*node_type, *op);
        }
        for (node_type, op) in conversation::CONVERSATION_OPS {
            b.factories.insert(*node_type, *op);
        }
        b.build()
    }

    /// The process-wide registry, built on first use.
    pub fn global() -> &'static AdaptorRegistry {
        static REGISTRY: OnceLock<AdaptorRegistry> = OnceLock::new();
        REGISTRY.get_or_init(AdaptorRegistry::with_builtins)
    }

    /// Fresh adaptor instance for a node type, if registered.
    pub fn get(&self, node_type: NodeType) -> Option<Box<dyn NodeAdaptor>> {
        self.factories.get(&node_type).map(|f| f())
    }

    pub fn is_registered(&self, node_type: NodeType) -> bool {
        self.factories.contains_key(&node_type)
    }
}

/// Builder so tests can assemble a registry with swapped entries.
pub struct AdaptorRegistryBuilder {
    factories: HashMap<NodeType, AdaptorFactory>,
}

impl AdaptorRegistryBuilder {
    pub fn register(mut self, node_type: NodeType, factory: AdaptorFactory) -> Self {
        self.factories.insert(node_type, factory);
        self
    }

    pub fn build(self) -> AdaptorRegistry {
        AdaptorRegistry { factories: self.factories }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_cover_all_executable_types() {
        let registry = AdaptorRegistry::with_builtins();
        for meta in crate::canvas::NodeTypeMeta::all() {
            let t = meta.node_type;
            // comments are skipped, sub-workflows are compiled in place
            if t == NodeType::Comment || t == NodeType::SubWorkflow {
                continue;
            }
            assert!(registry.is_registered(t), "no adaptor for {t}");
        }
    }

    #[test]
    fn test_builder_swaps_entries() {
        struct Nop;
        impl NodeAdaptor for Nop {
            fn adapt(
                &self,
                node: &CanvasNode,
                _ctx: &AdaptContext<'_>,
            ) -> WorkflowResult<NodeSchema> {
                helpers::base_schema(node, NodeType::CodeRunner, crate::schema::NodeConfig::Break)
            }
        }
        let registry =
            AdaptorRegistry::builder().register(NodeType::CodeRunner, || Box::new(Nop)).build();
        assert!(registry.is_registered(NodeType::CodeRunner));
        assert!(!registry.is_registered(NodeType::LLM));
    }
}
