//! Canvas → schema compilation, end to end.

mod common;

use flowforge::canvas::{Canvas, NodeType};
use flowforge::compiler::{compile, SubCanvasStore, WorkflowIdentity};
use flowforge::error::WorkflowError;
use flowforge::schema::{NodeConfig, PORT_DEFAULT};
use serde_json::json;

fn parse(canvas: &str) -> Canvas {
    serde_json::from_str(canvas).expect("fixture canvas parses")
}

#[test]
fn test_empty_canvas_compiles() {
    let canvas = parse(&common::empty_canvas());
    let schema = compile(&canvas, &SubCanvasStore::new()).unwrap();
    assert_eq!(schema.node_count(), 2);
    assert!(!schema.require_streaming);
    assert!(!schema.require_checkpoint);
    assert_eq!(schema.history_rounds, 0);
}

#[test]
fn test_linear_canvas_connections_reference_existing_nodes() {
    let canvas = parse(&common::linear_llm_canvas());
    let schema = compile(&canvas, &SubCanvasStore::new()).unwrap();
    for conn in &schema.connections {
        assert!(schema.get_node(&conn.from_node).is_some(), "{} exists", conn.from_node);
        if conn.to_node != flowforge::schema::END {
            assert!(schema.get_node(&conn.to_node).is_some(), "{} exists", conn.to_node);
        }
    }
    let llm = schema.get_node("llm1").unwrap();
    assert!(llm.can_generate_stream());
    // LLM nodes inherit their type's default timeout
    assert_eq!(llm.exception_configs.as_ref().unwrap().timeout_ms, 600_000);
}

#[test]
fn test_isolated_node_pruned() {
    let mut raw: serde_json::Value = serde_json::from_str(&common::linear_llm_canvas()).unwrap();
    raw["nodes"].as_array_mut().unwrap().push(json!({
        "id": "orphan",
        "type": "15",
        "data": {"inputs": {"method": "concat", "concatParams": []}}
    }));
    let canvas: Canvas = serde_json::from_value(raw).unwrap();
    let schema = compile(&canvas, &SubCanvasStore::new()).unwrap();
    assert!(schema.get_node("orphan").is_none());
    assert_eq!(schema.node_count(), 3);
}

#[test]
fn test_batch_expansion() {
    let canvas = parse(&common::batch_llm_canvas());
    let schema = compile(&canvas, &SubCanvasStore::new()).unwrap();

    let parent = schema.get_node("N").expect("batch parent");
    assert_eq!(parent.node_type, NodeType::Batch);
    match &parent.configs {
        NodeConfig::Batch(c) => {
            assert_eq!(c.batch_size, 4);
            assert_eq!(c.concurrent_size, 2);
        }
        other => panic!("unexpected parent config: {other:?}"),
    }

    let inner = schema.get_node("N_inner").expect("generated inner node");
    assert_eq!(inner.node_type, NodeType::LLM);
    assert_eq!(schema.generated_nodes, vec!["N_inner".to_string()]);
    assert_eq!(schema.hierarchy.get("N_inner"), Some(&"N".to_string()));

    // the two internal connections: parent → inner and inner → parent
    let internal: Vec<String> = schema
        .connections
        .iter()
        .filter(|c| c.from_node.contains("N") && c.to_node.contains("N"))
        .map(|c| c.id())
        .collect();
    assert!(internal.contains(&"N:N_inner".to_string()), "{internal:?}");
    assert!(internal.contains(&"N_inner:N".to_string()), "{internal:?}");

    // the parent's output references the inner node's element object
    assert_eq!(parent.output_sources.len(), 1);
    assert_eq!(parent.output_sources[0].path, vec!["results".to_string()]);

    // author-visible node count hides the generated inner node
    assert_eq!(schema.node_count(), schema.nodes.len() - 1);
}

#[test]
fn test_batch_bad_output_shape() {
    let mut raw: serde_json::Value = serde_json::from_str(&common::batch_llm_canvas()).unwrap();
    raw["nodes"][1]["data"]["outputs"] = json!([{"name": "results", "type": "string"}]);
    let canvas: Canvas = serde_json::from_value(raw).unwrap();
    let err = compile(&canvas, &SubCanvasStore::new()).unwrap_err();
    assert!(err.to_string().contains("should be list"), "{err}");
}

#[test]
fn test_selector_port_normalization_and_branches() {
    let canvas = parse(&common::selector_canvas());
    let schema = compile(&canvas, &SubCanvasStore::new()).unwrap();

    let ports: Vec<String> = schema
        .connections
        .iter()
        .filter(|c| c.from_node == "sel")
        .filter_map(|c| c.from_port.clone())
        .collect();
    assert_eq!(ports.len(), 3);
    assert!(ports.contains(&"branch_0".to_string()));
    assert!(ports.contains(&"branch_1".to_string()));
    assert!(ports.contains(&PORT_DEFAULT.to_string()));

    let branch = schema.get_branch("sel").expect("selector branch schema");
    assert_eq!(branch.ports.len(), 3);
    assert!(branch.has_port("branch_0"));
    assert!(branch.has_port("branch_1"));
    assert!(branch.has_port(PORT_DEFAULT));
}

#[test]
fn test_unknown_node_type_rejected() {
    let mut raw: serde_json::Value = serde_json::from_str(&common::empty_canvas()).unwrap();
    raw["nodes"].as_array_mut().unwrap().push(json!({
        "id": "mystery", "type": "31337", "data": {}
    }));
    raw["edges"].as_array_mut().unwrap().push(json!({
        "sourceNodeID": "100001", "targetNodeID": "mystery"
    }));
    let canvas: Canvas = serde_json::from_value(raw).unwrap();
    let err = compile(&canvas, &SubCanvasStore::new()).unwrap_err();
    assert!(err.to_string().contains("unsupported block type"), "{err}");
}

#[test]
fn test_comment_nodes_skipped() {
    let mut raw: serde_json::Value = serde_json::from_str(&common::empty_canvas()).unwrap();
    raw["nodes"].as_array_mut().unwrap().push(json!({
        "id": "note", "type": "8886", "data": {}
    }));
    raw["edges"].as_array_mut().unwrap().push(json!({
        "sourceNodeID": "100001", "targetNodeID": "note"
    }));
    let canvas: Canvas = serde_json::from_value(raw).unwrap();
    let schema = compile(&canvas, &SubCanvasStore::new()).unwrap();
    assert!(schema.get_node("note").is_none());
}

#[test]
fn test_nested_composites_rejected() {
    let raw = json!({
        "nodes": [
            {"id": "100001", "type": "1", "data": {"outputs": [{"type": "string", "name": "input"}]}},
            {
                "id": "outer", "type": "21",
                "data": {"inputs": {"loopType": "infinite"}},
                "blocks": [{
                    "id": "inner_loop", "type": "21",
                    "data": {"inputs": {"loopType": "infinite"}},
                    "blocks": [{"id": "deep", "type": "19", "data": {}}]
                }],
                "edges": [{"sourceNodeID": "outer", "targetNodeID": "inner_loop"}]
            },
            {"id": "900001", "type": "2", "data": {"inputs": {"inputParameters": []}}}
        ],
        "edges": [
            {"sourceNodeID": "100001", "targetNodeID": "outer"},
            {"sourceNodeID": "outer", "targetNodeID": "900001"}
        ]
    });
    let canvas: Canvas = serde_json::from_value(raw).unwrap();
    let err = compile(&canvas, &SubCanvasStore::new()).unwrap_err();
    assert!(err.to_string().contains("nested inner-workflow"), "{err}");
}

#[test]
fn test_sub_workflow_compiled_in_place() {
    let sub_canvas: Canvas = serde_json::from_str(&common::linear_llm_canvas()).unwrap();
    let mut sources = SubCanvasStore::new();
    sources.insert(WorkflowIdentity::versioned(42, "v0.0.1"), sub_canvas);

    let root = parse(&common::sub_workflow_canvas(42, "v0.0.1"));
    let schema = compile(&root, &sources).unwrap();

    let sub = schema.get_node("sub1").expect("sub workflow node");
    assert_eq!(sub.node_type, NodeType::SubWorkflow);
    let basic = sub.sub_workflow_basic.as_ref().unwrap();
    assert_eq!(basic.workflow_id, 42);
    assert_eq!(basic.workflow_version, "v0.0.1");
    let embedded = sub.sub_workflow_schema.as_ref().unwrap();
    assert!(embedded.get_node("llm1").is_some());
}

#[test]
fn test_missing_sub_workflow_reported_with_id() {
    let root = parse(&common::sub_workflow_canvas(42, "v0.0.1"));
    let err = compile(&root, &SubCanvasStore::new()).unwrap_err();
    match err {
        WorkflowError::WorkflowNotFound { id, version } => {
            assert_eq!(id, 42);
            assert_eq!(version.as_deref(), Some("v0.0.1"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_sub_workflow_cycle_detected() {
    // 1 references 2, 2 references 1 — both drafts
    let canvas_one: Canvas = serde_json::from_str(&common::sub_workflow_canvas(2, "")).unwrap();
    let canvas_two: Canvas = serde_json::from_str(&common::sub_workflow_canvas(1, "")).unwrap();

    let mut sources = SubCanvasStore::new();
    sources.insert(WorkflowIdentity::draft(1), canvas_one.clone());
    sources.insert(WorkflowIdentity::draft(2), canvas_two);

    let err = compile(&canvas_one, &sources).unwrap_err();
    assert!(matches!(err, WorkflowError::ReferenceCycle { .. }), "{err}");
}

#[test]
fn test_schema_equality_inheritance_contract() {
    let canvas = parse(&common::linear_llm_canvas());
    let schema_a = compile(&canvas, &SubCanvasStore::new()).unwrap();

    // same canvas, cosmetic title change: execution-equivalent
    let mut raw: serde_json::Value = serde_json::from_str(&common::linear_llm_canvas()).unwrap();
    raw["nodes"][1]["data"]["nodeMeta"]["title"] = json!("Ask (renamed)");
    let canvas_b: Canvas = serde_json::from_value(raw).unwrap();
    let schema_b = compile(&canvas_b, &SubCanvasStore::new()).unwrap();
    assert!(schema_a.is_equal(&schema_b));

    // prompt change alters configs: no longer equivalent
    let mut raw: serde_json::Value = serde_json::from_str(&common::linear_llm_canvas()).unwrap();
    raw["nodes"][1]["data"]["inputs"]["llmParam"][1]["input"]["value"]["content"] =
        json!("Different: {{q}}");
    let canvas_c: Canvas = serde_json::from_value(raw).unwrap();
    let schema_c = compile(&canvas_c, &SubCanvasStore::new()).unwrap();
    assert!(!schema_a.is_equal(&schema_c));
}

#[test]
fn test_streaming_derivation_chat_exit() {
    let raw = json!({
        "nodes": [
            common::entry_node(json!([{"type": "string", "name": "USER_INPUT", "required": true}])),
            serde_json::from_str::<serde_json::Value>(&common::linear_llm_canvas()).unwrap()["nodes"][1].clone(),
            {
                "id": "900001", "type": "2",
                "data": {"inputs": {
                    "terminatePlan": "useAnswerContent",
                    "streamingOutput": true,
                    "inputParameters": [
                        {"name": "output", "input": common::ref_input("string", "llm1", "output")}
                    ]
                }}
            }
        ],
        "edges": [common::edge("100001", "llm1"), common::edge("llm1", "900001")]
    });
    let mut canvas: Canvas = serde_json::from_value(raw).unwrap();
    // the llm fixture references "input"; rebind to USER_INPUT
    canvas.nodes[1].data.inputs.as_mut().unwrap().input_parameters[0].input =
        serde_json::from_value(common::ref_input("string", "100001", "USER_INPUT")).ok();
    let schema = compile(&canvas, &SubCanvasStore::new()).unwrap();
    assert!(schema.require_streaming);
}
