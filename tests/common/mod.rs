//! Shared canvas fixtures for the integration tests.
#![allow(dead_code)]

use serde_json::{json, Value};

pub fn entry_node(outputs: Value) -> Value {
    json!({
        "id": "100001",
        "type": "1",
        "data": {
            "nodeMeta": {"title": "Start"},
            "outputs": outputs
        }
    })
}

pub fn exit_node_returning(params: Value) -> Value {
    json!({
        "id": "900001",
        "type": "2",
        "data": {
            "nodeMeta": {"title": "End"},
            "inputs": {
                "terminatePlan": "returnVariables",
                "inputParameters": params
            }
        }
    })
}

pub fn ref_input(var_type: &str, block_id: &str, name: &str) -> Value {
    json!({
        "type": var_type,
        "value": {
            "type": "ref",
            "content": {"source": "block-output", "blockID": block_id, "name": name}
        }
    })
}

pub fn literal_input(var_type: &str, content: Value) -> Value {
    json!({
        "type": var_type,
        "value": {"type": "literal", "content": content}
    })
}

pub fn edge(from: &str, to: &str) -> Value {
    json!({"sourceNodeID": from, "targetNodeID": to})
}

pub fn edge_with_port(from: &str, to: &str, port: &str) -> Value {
    json!({"sourceNodeID": from, "targetNodeID": to, "sourcePortID": port})
}

/// Entry(input) → LLM(prompt over q) → Exit(answer).
pub fn linear_llm_canvas() -> String {
    json!({
        "nodes": [
            entry_node(json!([{"type": "string", "name": "input", "required": true}])),
            {
                "id": "llm1",
                "type": "3",
                "data": {
                    "nodeMeta": {"title": "Ask"},
                    "inputs": {
                        "llmParam": [
                            {"name": "modelName", "input": literal_input("string", json!("fake-model"))},
                            {"name": "prompt", "input": literal_input("string", json!("Answer: {{q}}"))}
                        ],
                        "inputParameters": [
                            {"name": "q", "input": ref_input("string", "100001", "input")}
                        ]
                    },
                    "outputs": [{"name": "output", "type": "string"}]
                }
            },
            exit_node_returning(json!([
                {"name": "answer", "input": ref_input("string", "llm1", "output")}
            ]))
        ],
        "edges": [edge("100001", "llm1"), edge("llm1", "900001")]
    })
    .to_string()
}

/// A canvas whose single LLM node runs in batch mode over `items`.
pub fn batch_llm_canvas() -> String {
    json!({
        "nodes": [
            entry_node(json!([{
                "type": "list", "name": "items",
                "schema": {"type": "string", "name": ""}
            }])),
            {
                "id": "N",
                "type": "3",
                "data": {
                    "nodeMeta": {"title": "Ask"},
                    "inputs": {
                        "llmParam": [
                            {"name": "modelName", "input": literal_input("string", json!("fake-model"))},
                            {"name": "prompt", "input": literal_input("string", json!("Item: {{q}}"))}
                        ],
                        "inputParameters": [
                            {"name": "q", "input": ref_input("string", "N", "items")}
                        ],
                        "batch": {
                            "batchEnable": true,
                            "batchSize": 4,
                            "concurrentSize": 2,
                            "inputLists": [
                                {"name": "items", "input": {
                                    "type": "list",
                                    "schema": {"type": "string", "name": ""},
                                    "value": {"type": "ref", "content": {
                                        "source": "block-output", "blockID": "100001", "name": "items"
                                    }}
                                }}
                            ]
                        }
                    },
                    "outputs": [{
                        "name": "results",
                        "type": "list",
                        "schema": {"name": "", "type": "object", "schema": [
                            {"name": "answer", "type": "string"}
                        ]}
                    }]
                }
            },
            exit_node_returning(json!([
                {"name": "results", "input": {
                    "type": "list",
                    "schema": {"name": "", "type": "object", "schema": [
                        {"name": "answer", "type": "string"}
                    ]},
                    "value": {"type": "ref", "content": {
                        "source": "block-output", "blockID": "N", "name": "results"
                    }}
                }}
            ]))
        ],
        "edges": [edge("100001", "N"), edge("N", "900001")]
    })
    .to_string()
}

/// Entry → Selector(`input == "yes"` / `input == "maybe"` / default) with
/// three outgoing ports spelled the way the editor writes them.
pub fn selector_canvas() -> String {
    let condition = |right: &str| {
        json!({
            "condition": {
                "logic": 2,
                "conditions": [{
                    "operator": 1,
                    "left": {"input": ref_input("string", "100001", "input")},
                    "right": {"input": literal_input("string", json!(right))}
                }]
            }
        })
    };
    let text_node = |id: &str, text: &str| {
        json!({
            "id": id,
            "type": "15",
            "data": {
                "nodeMeta": {"title": id},
                "inputs": {
                    "method": "concat",
                    "concatParams": [{
                        "name": "concatResult",
                        "input": literal_input("string", json!(text))
                    }]
                }
            }
        })
    };
    json!({
        "nodes": [
            entry_node(json!([{"type": "string", "name": "input", "required": true}])),
            {
                "id": "sel",
                "type": "8",
                "data": {
                    "nodeMeta": {"title": "Condition"},
                    "inputs": {"branches": [condition("yes"), condition("maybe")]}
                }
            },
            text_node("yes_path", "went yes"),
            text_node("maybe_path", "went maybe"),
            text_node("no_path", "went default"),
            exit_node_returning(json!([
                {"name": "yes", "input": ref_input("string", "yes_path", "output")},
                {"name": "maybe", "input": ref_input("string", "maybe_path", "output")},
                {"name": "no", "input": ref_input("string", "no_path", "output")}
            ]))
        ],
        "edges": [
            edge("100001", "sel"),
            edge_with_port("sel", "yes_path", "true"),
            edge_with_port("sel", "maybe_path", "true_1"),
            edge_with_port("sel", "no_path", "false"),
            edge("yes_path", "900001"),
            edge("maybe_path", "900001"),
            edge("no_path", "900001")
        ]
    })
    .to_string()
}

/// A canvas with one sub-workflow node pointing at `(id, version)`.
pub fn sub_workflow_canvas(sub_id: i64, version: &str) -> String {
    json!({
        "nodes": [
            entry_node(json!([{"type": "string", "name": "input"}])),
            {
                "id": "sub1",
                "type": "9",
                "data": {
                    "nodeMeta": {"title": "Call"},
                    "inputs": {
                        "workflowId": sub_id.to_string(),
                        "workflowVersion": version,
                        "inputParameters": [
                            {"name": "input", "input": ref_input("string", "100001", "input")}
                        ]
                    },
                    "outputs": [{"name": "answer", "type": "string"}]
                }
            },
            exit_node_returning(json!([
                {"name": "result", "input": ref_input("string", "sub1", "answer")}
            ]))
        ],
        "edges": [edge("100001", "sub1"), edge("sub1", "900001")]
    })
    .to_string()
}

/// Minimal empty canvas: Entry and Exit only, no edges.
pub fn empty_canvas() -> String {
    json!({
        "nodes": [
            entry_node(json!([{"type": "string", "name": "input"}])),
            exit_node_returning(json!([]))
        ],
        "edges": []
    })
    .to_string()
}
