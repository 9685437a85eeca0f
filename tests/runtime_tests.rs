//! Execution runtime: scheduling, branching, composites, streaming,
//! checkpoint resume and exception policy.

mod common;

use flowforge::canvas::Canvas;
use flowforge::compiler::{compile, SubCanvasStore, WorkflowIdentity};
use flowforge::error::NodeResult;
use flowforge::infra::{
    ChatMessage, ChatModel, ChatModelParams, FixedLlmFactory, FixedReplyModel, LlmFactory,
};
use flowforge::runtime::{CheckpointStore, MemoryCheckpointStore, RuntimeServices, WorkflowRunner};
use flowforge::schema::WorkflowSchema;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

fn compiled(canvas_json: &str) -> WorkflowSchema {
    let canvas: Canvas = serde_json::from_str(canvas_json).unwrap();
    compile(&canvas, &SubCanvasStore::new()).unwrap()
}

fn llm_services(reply: &str) -> RuntimeServices {
    RuntimeServices {
        llm: Some(Arc::new(FixedLlmFactory::new(Arc::new(FixedReplyModel::new(reply))))),
        ..Default::default()
    }
}

fn inputs(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[tokio::test]
async fn test_linear_execution() {
    let schema = compiled(&common::linear_llm_canvas());
    let outcome = WorkflowRunner::builder(schema)
        .services(llm_services("forty-two"))
        .caller_inputs(inputs(&[("input", json!("meaning of life"))]))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.outputs.get("answer"), Some(&json!("forty-two")));
}

#[tokio::test]
async fn test_selector_branches() {
    for (input, expect_field) in
        [("yes", "yes"), ("maybe", "maybe"), ("anything else", "no")]
    {
        let schema = compiled(&common::selector_canvas());
        let outcome = WorkflowRunner::builder(schema)
            .caller_inputs(inputs(&[("input", json!(input))]))
            .run()
            .await
            .unwrap();
        assert!(
            outcome.outputs.get(expect_field).is_some(),
            "input {input} should reach the {expect_field} path: {:?}",
            outcome.outputs
        );
        // the untaken paths produced nothing
        let produced =
            ["yes", "maybe", "no"].iter().filter(|f| outcome.outputs.contains_key(**f)).count();
        assert_eq!(produced, 1, "exactly one branch fires: {:?}", outcome.outputs);
    }
}

#[tokio::test]
async fn test_batch_execution_aggregates_positionally() {
    let schema = compiled(&common::batch_llm_canvas());
    let outcome = WorkflowRunner::builder(schema)
        .services(llm_services("ok"))
        .caller_inputs(inputs(&[("items", json!(["a", "b", "c"]))]))
        .run()
        .await
        .unwrap();

    let results = outcome.outputs.get("results").expect("batch output");
    let results = results.as_array().expect("list output");
    assert_eq!(results.len(), 3);
    for element in results {
        assert_eq!(element.get("answer"), Some(&json!("ok")));
    }
}

#[tokio::test]
async fn test_batch_serial_configuration() {
    // batch_size=1, concurrent_size=1 runs the inner node sequentially
    let mut raw: serde_json::Value =
        serde_json::from_str(&common::batch_llm_canvas()).unwrap();
    raw["nodes"][1]["data"]["inputs"]["batch"]["batchSize"] = json!(1);
    raw["nodes"][1]["data"]["inputs"]["batch"]["concurrentSize"] = json!(1);
    let schema = compiled(&raw.to_string());

    let outcome = WorkflowRunner::builder(schema)
        .services(llm_services("one"))
        .caller_inputs(inputs(&[("items", json!(["x", "y"]))]))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.outputs.get("results").unwrap().as_array().unwrap().len(), 2);
}

fn count_loop_canvas() -> String {
    json!({
        "nodes": [
            common::entry_node(json!([{"type": "string", "name": "input"}])),
            {
                "id": "loop1",
                "type": "21",
                "data": {
                    "nodeMeta": {"title": "Loop"},
                    "inputs": {
                        "loopType": "count",
                        "loopCount": common::literal_input("integer", json!("3")),
                        "variableParameters": [
                            {"name": "counter", "input": common::literal_input("integer", json!(0))}
                        ]
                    },
                    "outputs": [
                        {"name": "counter", "input": common::ref_input("integer", "loop1", "counter")}
                    ]
                },
                "blocks": [{
                    "id": "setter",
                    "type": "40",
                    "data": {"inputs": {"inputParameters": [{
                        "name": "pair0",
                        "left": common::ref_input("integer", "loop1", "counter"),
                        "right": common::ref_input("integer", "loop1", "index")
                    }]}}
                }],
                "edges": [
                    {"sourceNodeID": "loop1", "targetNodeID": "setter", "sourcePortID": "loop-function-inline-output"}
                ]
            },
            common::exit_node_returning(json!([
                {"name": "counter", "input": common::ref_input("integer", "loop1", "counter")}
            ]))
        ],
        "edges": [common::edge("100001", "loop1"), common::edge("loop1", "900001")]
    })
    .to_string()
}

#[tokio::test]
async fn test_count_loop_runs_all_iterations() {
    let schema = compiled(&count_loop_canvas());
    let outcome = WorkflowRunner::builder(schema).run().await.unwrap();
    // the assigner stored the index each round: 0, 1, 2
    assert_eq!(outcome.outputs.get("counter"), Some(&json!(2)));
}

fn infinite_loop_canvas() -> String {
    json!({
        "nodes": [
            common::entry_node(json!([{"type": "string", "name": "input"}])),
            {
                "id": "loop1",
                "type": "21",
                "data": {
                    "nodeMeta": {"title": "Loop"},
                    "inputs": {
                        "loopType": "infinite",
                        "variableParameters": [
                            {"name": "last", "input": common::literal_input("integer", json!(-1))}
                        ]
                    },
                    "outputs": [
                        {"name": "last", "input": common::ref_input("integer", "loop1", "last")}
                    ]
                },
                "blocks": [
                    {
                        "id": "gate",
                        "type": "8",
                        "data": {"inputs": {"branches": [{
                            "condition": {
                                "logic": 2,
                                "conditions": [{
                                    "operator": 14,
                                    "left": {"input": common::ref_input("integer", "loop1", "index")},
                                    "right": {"input": common::literal_input("integer", json!(2))}
                                }]
                            }
                        }]}}
                    },
                    {"id": "stop", "type": "19", "data": {}},
                    {
                        "id": "setter",
                        "type": "40",
                        "data": {"inputs": {"inputParameters": [{
                            "name": "pair0",
                            "left": common::ref_input("integer", "loop1", "last"),
                            "right": common::ref_input("integer", "loop1", "index")
                        }]}}
                    }
                ],
                "edges": [
                    {"sourceNodeID": "loop1", "targetNodeID": "gate", "sourcePortID": "loop-function-inline-output"},
                    {"sourceNodeID": "gate", "targetNodeID": "stop", "sourcePortID": "true"},
                    {"sourceNodeID": "gate", "targetNodeID": "setter", "sourcePortID": "false"}
                ]
            },
            common::exit_node_returning(json!([
                {"name": "last", "input": common::ref_input("integer", "loop1", "last")}
            ]))
        ],
        "edges": [common::edge("100001", "loop1"), common::edge("loop1", "900001")]
    })
    .to_string()
}

#[tokio::test]
async fn test_infinite_loop_terminates_via_break() {
    let schema = compiled(&infinite_loop_canvas());
    let outcome = WorkflowRunner::builder(schema).run().await.unwrap();
    // iterations 0 and 1 assign; iteration 2 breaks before assigning
    assert_eq!(outcome.outputs.get("last"), Some(&json!(1)));
}

#[tokio::test]
async fn test_chatflow_streams_answer_chunks() {
    let raw = json!({
        "nodes": [
            common::entry_node(json!([{"type": "string", "name": "USER_INPUT", "required": true}])),
            {
                "id": "llm1",
                "type": "3",
                "data": {
                    "inputs": {
                        "llmParam": [
                            {"name": "modelName", "input": common::literal_input("string", json!("fake"))},
                            {"name": "prompt", "input": common::literal_input("string", json!("{{q}}"))}
                        ],
                        "inputParameters": [
                            {"name": "q", "input": common::ref_input("string", "100001", "USER_INPUT")}
                        ]
                    },
                    "outputs": [{"name": "output", "type": "string"}]
                }
            },
            {
                "id": "900001",
                "type": "2",
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
    let schema = compiled(&raw.to_string());
    assert!(schema.require_streaming);

    let services = RuntimeServices {
        llm: Some(Arc::new(FixedLlmFactory::new(Arc::new(FixedReplyModel::chunked(
            "hello streaming world",
            4,
        ))))),
        ..Default::default()
    };

    let (builder, mut answers) = WorkflowRunner::builder(schema)
        .services(services)
        .caller_inputs(inputs(&[("USER_INPUT", json!("hi"))]))
        .answer_stream();
    let outcome = builder.run().await.unwrap();

    assert_eq!(outcome.outputs.get("output"), Some(&json!("hello streaming world")));

    let mut chunks = Vec::new();
    while let Ok(chunk) = answers.try_recv() {
        chunks.push(chunk);
    }
    assert!(chunks.len() > 1, "expected multiple chunks, got {chunks:?}");
    assert_eq!(chunks.concat(), "hello streaming world");
}

#[tokio::test]
async fn test_checkpoint_resume_after_suspension() {
    let raw = json!({
        "nodes": [
            common::entry_node(json!([{"type": "string", "name": "input"}])),
            {
                "id": "qa1",
                "type": "18",
                "data": {
                    "inputs": {"answer_type": "text", "question": "Continue?"},
                    "outputs": [{"name": "USER_RESPONSE", "type": "string"}]
                }
            },
            common::exit_node_returning(json!([
                {"name": "reply", "input": common::ref_input("string", "qa1", "USER_RESPONSE")}
            ]))
        ],
        "edges": [common::edge("100001", "qa1"), common::edge("qa1", "900001")]
    });
    let schema = compiled(&raw.to_string());
    assert!(schema.require_checkpoint);

    let store = Arc::new(MemoryCheckpointStore::new());

    // first run suspends at the question node
    let failed = WorkflowRunner::builder(schema.clone())
        .caller_inputs(inputs(&[("input", json!("start"))]))
        .checkpoint(store.clone())
        .execution_id("exec-1")
        .run()
        .await;
    assert!(failed.is_err());
    // the entry's output was checkpointed before the failure
    assert!(store.get("exec-1", "100001").await.unwrap().is_some());

    // resume with the answer supplied; completed nodes are restored
    let outcome = WorkflowRunner::builder(schema)
        .checkpoint(store.clone())
        .execution_id("exec-1")
        .resume()
        .provided_input("qa1", json!("yes, go on"))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.outputs.get("reply"), Some(&json!("yes, go on")));

    // checkpoints are cleared once the run completes
    assert!(store.list("exec-1").await.unwrap().is_empty());
}

/// Factory that fails on the main model and answers on the backup.
struct MainBrokenFactory;

struct BrokenModel;

#[async_trait::async_trait]
impl ChatModel for BrokenModel {
    async fn generate(&self, _messages: &[ChatMessage]) -> NodeResult<String> {
        Err(flowforge::error::NodeError::ExternalCall("main model down".to_string()))
    }
}

impl LlmFactory for MainBrokenFactory {
    fn build(&self, params: &ChatModelParams) -> NodeResult<Arc<dyn ChatModel>> {
        if params.model_name == "backup-model" {
            Ok(Arc::new(FixedReplyModel::new("saved by backup")))
        } else {
            Ok(Arc::new(BrokenModel))
        }
    }
}

#[tokio::test]
async fn test_llm_retry_uses_backup_model() {
    let mut raw: serde_json::Value =
        serde_json::from_str(&common::linear_llm_canvas()).unwrap();
    raw["nodes"][1]["data"]["inputs"]["settingOnError"] = json!({
        "timeoutMs": 5000,
        "retryTimes": 2,
        "ext": {"backupLLMParam": "{\"modelName\":\"backup-model\"}"}
    });
    let schema = compiled(&raw.to_string());

    let services = RuntimeServices {
        llm: Some(Arc::new(MainBrokenFactory)),
        ..Default::default()
    };
    let start = std::time::Instant::now();
    let outcome = WorkflowRunner::builder(schema)
        .services(services)
        .caller_inputs(inputs(&[("input", json!("q"))]))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.outputs.get("answer"), Some(&json!("saved by backup")));
    assert!(start.elapsed().as_millis() < 5000);
}

#[tokio::test]
async fn test_return_default_data_policy() {
    let mut raw: serde_json::Value =
        serde_json::from_str(&common::linear_llm_canvas()).unwrap();
    raw["nodes"][1]["data"]["inputs"]["settingOnError"] = json!({
        "switch": true,
        "dataOnErr": "{\"output\": \"fallback answer\"}"
    });
    let schema = compiled(&raw.to_string());

    // no llm service configured: every attempt fails, the default kicks in
    let outcome = WorkflowRunner::builder(schema)
        .caller_inputs(inputs(&[("input", json!("q"))]))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.outputs.get("answer"), Some(&json!("fallback answer")));
}

#[tokio::test]
async fn test_sub_workflow_execution() {
    let sub_canvas: Canvas =
        serde_json::from_str(&common::linear_llm_canvas()).unwrap();
    let mut sources = SubCanvasStore::new();
    sources.insert(WorkflowIdentity::versioned(42, "v0.0.1"), sub_canvas);

    let root: Canvas =
        serde_json::from_str(&common::sub_workflow_canvas(42, "v0.0.1")).unwrap();
    let schema = compile(&root, &sources).unwrap();

    let outcome = WorkflowRunner::builder(schema)
        .services(llm_services("from the inside"))
        .caller_inputs(inputs(&[("input", json!("outer question"))]))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.outputs.get("result"), Some(&json!("from the inside")));
}

#[tokio::test]
async fn test_cancellation_aborts_execution() {
    let schema = compiled(&common::linear_llm_canvas());
    let token = flowforge::runtime::CancelToken::new();
    token.cancel();

    let result = WorkflowRunner::builder(schema)
        .services(llm_services("never"))
        .caller_inputs(inputs(&[("input", json!("q"))]))
        .cancel_token(token)
        .run()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_workflow_deadline() {
    struct SlowModel;

    #[async_trait::async_trait]
    impl ChatModel for SlowModel {
        async fn generate(&self, _messages: &[ChatMessage]) -> NodeResult<String> {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    let schema = compiled(&common::linear_llm_canvas());
    let services = RuntimeServices {
        llm: Some(Arc::new(FixedLlmFactory::new(Arc::new(SlowModel)))),
        ..Default::default()
    };
    let start = std::time::Instant::now();
    let result = WorkflowRunner::builder(schema)
        .services(services)
        .caller_inputs(inputs(&[("input", json!("q"))]))
        .timeout(std::time::Duration::from_millis(200))
        .run()
        .await;
    assert!(result.is_err());
    assert!(start.elapsed().as_secs() < 5);
}
