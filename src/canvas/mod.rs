//! Front-end canvas model.
//!
//! The canvas is the author-facing JSON graph produced by the visual editor:
//! nodes, edges, and per-node configuration. It is the input to the
//! [`compiler`](crate::compiler), which turns it into an executable
//! [`WorkflowSchema`](crate::schema::WorkflowSchema).

pub mod model;
pub mod node_type;
pub mod template;

pub use model::{
    BlockInput, BlockInputReference, BlockInputValue, BlockInputValueType, Canvas, CanvasEdge,
    CanvasNode, ChatHistorySetting, Condition, ErrorProcessType, Inputs, LogicType, LoopType,
    NodeBatch, NodeData, NodeMetaFe, Param, QaAnswerType, QaOptionType, RefSourceType,
    SettingOnError, TerminatePlan, TextProcessingMethod, Variable, VariableType,
};
pub use node_type::{NodeType, NodeTypeMeta, ENTRY_NODE_ID, EXIT_NODE_ID};
pub use template::{default_init_canvas, default_init_canvas_chat, CONVERSATION_NAME_KEY, USER_INPUT_KEY};
