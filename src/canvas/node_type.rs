//! The closed set of node types and their static metadata.

use serde::{Deserialize, Serialize};

/// Canvas id of the Entry node, fixed by the editor.
pub const ENTRY_NODE_ID: &str = "100001";
/// Canvas id of the Exit node, fixed by the editor.
pub const EXIT_NODE_ID: &str = "900001";

/// Every node type the engine understands. The canvas carries these as
/// numeric id strings; [`NodeType::from_id_str`] maps them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Entry,
    Exit,
    LLM,
    Plugin,
    CodeRunner,
    KnowledgeRetriever,
    SubWorkflow,
    Selector,
    TextProcessor,
    QuestionAnswer,
    OutputEmitter,
    Loop,
    IntentDetector,
    KnowledgeIndexer,
    DatabaseCustomSQL,
    HTTPRequester,
    ConversationHistory,
    Continue,
    Break,
    VariableAssigner,
    VariableAssignerWithinLoop,
    ClearConversationHistory,
    CreateConversation,
    VariableAggregator,
    Batch,
    MessageList,
    JsonSerialization,
    JsonDeserialization,
    KnowledgeDeleter,
    InputReceiver,
    DatabaseUpdate,
    DatabaseQuery,
    DatabaseDelete,
    DatabaseInsert,
    ConversationList,
    ConversationUpdate,
    ConversationDelete,
    CreateMessage,
    EditMessage,
    DeleteMessage,
    Comment,
}

impl NodeType {
    /// Numeric id string used by the front end.
    pub fn id_str(&self) -> &'static str {
        use NodeType::*;
        match self {
            Entry => "1",
            Exit => "2",
            LLM => "3",
            Plugin => "4",
            CodeRunner => "5",
            KnowledgeRetriever => "6",
            SubWorkflow => "9",
            Selector => "8",
            TextProcessor => "15",
            QuestionAnswer => "18",
            OutputEmitter => "13",
            Loop => "21",
            IntentDetector => "22",
            KnowledgeIndexer => "27",
            DatabaseCustomSQL => "12",
            HTTPRequester => "45",
            ConversationHistory => "50",
            Continue => "29",
            Break => "19",
            VariableAssigner => "20",
            VariableAssignerWithinLoop => "40",
            ClearConversationHistory => "51",
            CreateConversation => "52",
            VariableAggregator => "32",
            Batch => "28",
            MessageList => "54",
            JsonSerialization => "58",
            JsonDeserialization => "59",
            KnowledgeDeleter => "60",
            InputReceiver => "30",
            DatabaseUpdate => "42",
            DatabaseQuery => "43",
            DatabaseDelete => "44",
            DatabaseInsert => "41",
            ConversationList => "53",
            ConversationUpdate => "55",
            ConversationDelete => "56",
            CreateMessage => "37",
            EditMessage => "38",
            DeleteMessage => "39",
            Comment => "8886",
        }
    }

    /// Map a canvas id string to a node type.
    pub fn from_id_str(id: &str) -> Option<NodeType> {
        use NodeType::*;
        Some(match id {
            "1" => Entry,
            "2" => Exit,
            "3" => LLM,
            "4" => Plugin,
            "5" => CodeRunner,
            "6" => KnowledgeRetriever,
            "9" => SubWorkflow,
            "8" => Selector,
            "15" => TextProcessor,
            "18" => QuestionAnswer,
            "13" => OutputEmitter,
            "21" => Loop,
            "22" => IntentDetector,
            "27" => KnowledgeIndexer,
            "12" => DatabaseCustomSQL,
            "45" => HTTPRequester,
            "50" => ConversationHistory,
            "29" => Continue,
            "19" => Break,
            "20" => VariableAssigner,
            "40" => VariableAssignerWithinLoop,
            "51" => ClearConversationHistory,
            "52" => CreateConversation,
            "32" => VariableAggregator,
            "28" => Batch,
            "54" => MessageList,
            "58" => JsonSerialization,
            "59" => JsonDeserialization,
            "60" => KnowledgeDeleter,
            "30" => InputReceiver,
            "42" => DatabaseUpdate,
            "43" => DatabaseQuery,
            "44" => DatabaseDelete,
            "41" => DatabaseInsert,
            "53" => ConversationList,
            "55" => ConversationUpdate,
            "56" => ConversationDelete,
            "37" => CreateMessage,
            "38" => EditMessage,
            "39" => DeleteMessage,
            "8886" => Comment,
            _ => return None,
        })
    }

    /// Composite nodes carry children in `blocks`.
    pub fn is_composite(&self) -> bool {
        matches!(self, NodeType::Loop | NodeType::Batch)
    }

    /// Terminal sentinels seeded as reachable during isolation pruning.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeType::Entry | NodeType::Exit)
    }

    pub fn is_conversation_management(&self) -> bool {
        matches!(
            self,
            NodeType::CreateConversation
                | NodeType::ConversationUpdate
                | NodeType::ConversationDelete
                | NodeType::ConversationList
        )
    }

    pub fn meta(&self) -> &'static NodeTypeMeta {
        NodeTypeMeta::of(*self)
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Static per-type metadata: display grouping, default timeout, and which
/// external resources the node consumes.
#[derive(Debug, Clone, Serialize)]
pub struct NodeTypeMeta {
    pub node_type: NodeType,
    pub name: &'static str,
    pub category: &'static str,
    /// Default timeout applied when the author configured none. 0 = none.
    pub default_timeout_ms: i64,
    pub uses_database: bool,
    pub uses_knowledge: bool,
    pub uses_plugin: bool,
    pub disabled: bool,
}

macro_rules! meta {
    ($t:ident, $name:expr, $cat:expr) => {
        meta!($t, $name, $cat, 0, false, false, false)
    };
    ($t:ident, $name:expr, $cat:expr, $timeout:expr) => {
        meta!($t, $name, $cat, $timeout, false, false, false)
    };
    ($t:ident, $name:expr, $cat:expr, $timeout:expr, $db:expr, $kn:expr, $pl:expr) => {
        NodeTypeMeta {
            node_type: NodeType::$t,
            name: $name,
            category: $cat,
            default_timeout_ms: $timeout,
            uses_database: $db,
            uses_knowledge: $kn,
            uses_plugin: $pl,
            disabled: false,
        }
    };
}

static NODE_TYPE_METAS: &[NodeTypeMeta] = &[
    meta!(Entry, "Start", "base"),
    meta!(Exit, "End", "base"),
    meta!(LLM, "LLM", "model", 600_000),
    meta!(Plugin, "Plugin", "plugin", 180_000, false, false, true),
    meta!(CodeRunner, "Code", "logic", 60_000),
    meta!(KnowledgeRetriever, "Knowledge retrieval", "knowledge", 60_000, false, true, false),
    meta!(KnowledgeIndexer, "Knowledge writing", "knowledge", 120_000, false, true, false),
    meta!(KnowledgeDeleter, "Knowledge deletion", "knowledge", 60_000, false, true, false),
    meta!(SubWorkflow, "Workflow", "sub_workflow"),
    meta!(Selector, "Condition", "logic"),
    meta!(TextProcessor, "Text processing", "utility"),
    meta!(QuestionAnswer, "Question", "conversation"),
    meta!(OutputEmitter, "Output", "base"),
    meta!(Loop, "Loop", "logic"),
    meta!(Batch, "Batch", "logic"),
    meta!(Break, "Break", "logic"),
    meta!(Continue, "Continue", "logic"),
    meta!(IntentDetector, "Intent recognition", "model", 600_000),
    meta!(DatabaseCustomSQL, "SQL customization", "data", 60_000, true, false, false),
    meta!(DatabaseInsert, "Add data", "data", 60_000, true, false, false),
    meta!(DatabaseUpdate, "Update data", "data", 60_000, true, false, false),
    meta!(DatabaseQuery, "Query data", "data", 60_000, true, false, false),
    meta!(DatabaseDelete, "Delete data", "data", 60_000, true, false, false),
    meta!(HTTPRequester, "HTTP request", "utility", 120_000),
    meta!(VariableAssigner, "Variable assign", "variable"),
    meta!(VariableAssignerWithinLoop, "Set variable", "variable"),
    meta!(VariableAggregator, "Variable merge", "variable"),
    meta!(JsonSerialization, "JSON serialization", "utility"),
    meta!(JsonDeserialization, "JSON deserialization", "utility"),
    meta!(InputReceiver, "Input", "conversation"),
    meta!(ConversationHistory, "Query conversation history", "conversation_history"),
    meta!(ClearConversationHistory, "Clear conversation history", "conversation_history"),
    meta!(CreateConversation, "Create conversation", "conversation_management"),
    meta!(ConversationUpdate, "Update conversation", "conversation_management"),
    meta!(ConversationDelete, "Delete conversation", "conversation_management"),
    meta!(ConversationList, "Query conversation list", "conversation_management"),
    meta!(CreateMessage, "Create message", "message"),
    meta!(EditMessage, "Edit message", "message"),
    meta!(DeleteMessage, "Delete message", "message"),
    meta!(MessageList, "Query message list", "message"),
    meta!(Comment, "Comment", "utility"),
];

impl NodeTypeMeta {
    pub fn of(node_type: NodeType) -> &'static NodeTypeMeta {
        NODE_TYPE_METAS
            .iter()
            .find(|m| m.node_type == node_type)
            .expect("every NodeType has a meta entry")
    }

    pub fn all() -> &'static [NodeTypeMeta] {
        NODE_TYPE_METAS
    }

    /// The ordered list of display categories.
    pub fn categories() -> Vec<&'static str> {
        let mut seen = Vec::new();
        for m in NODE_TYPE_METAS {
            if !seen.contains(&m.category) {
                seen.push(m.category);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_str_roundtrip() {
        for meta in NodeTypeMeta::all() {
            let id = meta.node_type.id_str();
            assert_eq!(NodeType::from_id_str(id), Some(meta.node_type), "id {id}");
        }
    }

    #[test]
    fn test_unknown_id() {
        assert_eq!(NodeType::from_id_str("99999"), None);
    }

    #[test]
    fn test_every_type_has_meta() {
        assert_eq!(NodeTypeMeta::of(NodeType::LLM).default_timeout_ms, 600_000);
        assert!(NodeTypeMeta::of(NodeType::DatabaseQuery).uses_database);
        assert!(NodeTypeMeta::of(NodeType::KnowledgeRetriever).uses_knowledge);
        assert!(NodeTypeMeta::of(NodeType::Plugin).uses_plugin);
    }

    #[test]
    fn test_composite_and_terminal() {
        assert!(NodeType::Loop.is_composite());
        assert!(NodeType::Batch.is_composite());
        assert!(!NodeType::LLM.is_composite());
        assert!(NodeType::Entry.is_terminal());
        assert!(NodeType::Exit.is_terminal());
    }

    #[test]
    fn test_categories_deduplicated() {
        let cats = NodeTypeMeta::categories();
        assert!(cats.contains(&"logic"));
        let unique: std::collections::HashSet<_> = cats.iter().collect();
        assert_eq!(unique.len(), cats.len());
    }
}
