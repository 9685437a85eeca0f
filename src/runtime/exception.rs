//! Per-node exception policy enforcement: timeout across retries, immediate
//! re-attempts, and the configured error disposition.

use super::executor::NodeOutput;
use crate::canvas::ErrorProcessType;
use crate::error::{NodeError, NodeResult};
use crate::schema::{NodeSchema, PORT_ERROR};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Run one node's attempt function under its exception policy.
///
/// `timeout_ms` bounds the first attempt plus all retries combined. Retries
/// re-invoke the attempt with an incremented index (LLM executors switch to
/// their backup params on index > 0). When every attempt fails, the
/// configured process type decides the outcome: propagate, substitute the
/// default payload, or route the exception branch.
pub async fn execute_with_policy<F, Fut>(node: &NodeSchema, mut attempt: F) -> NodeResult<NodeOutput>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = NodeResult<NodeOutput>>,
{
    let config = node.exception_configs.clone().unwrap_or_default();
    let attempts = 1 + config.max_retry.max(0) as u32;

    let all_attempts = async {
        let mut last = NodeError::Other("no attempt ran".to_string());
        for index in 0..attempts {
            match attempt(index).await {
                Ok(output) => return Ok(output),
                Err(err) => {
                    if index + 1 < attempts {
                        tracing::warn!(
                            node = %node.key,
                            attempt = index,
                            error = %err,
                            "node attempt failed, retrying"
                        );
                    }
                    last = err;
                }
            }
        }
        Err(last)
    };

    let result = if config.timeout_ms > 0 {
        match tokio::time::timeout(Duration::from_millis(config.timeout_ms as u64), all_attempts)
            .await
        {
            Ok(result) => result,
            Err(_) => Err(NodeError::Timeout),
        }
    } else {
        all_attempts.await
    };

    let err = match result {
        Ok(output) => return Ok(output),
        Err(err) => err,
    };

    match config.process_type {
        Some(ErrorProcessType::ReturnDefaultData) => {
            let parsed: Value = serde_json::from_str(&config.data_on_err).map_err(|e| {
                NodeError::InvalidConfig(format!("dataOnErr is not valid JSON: {e}"))
            })?;
            let Value::Object(map) = parsed else {
                return Err(NodeError::InvalidConfig(
                    "dataOnErr is not a JSON object".to_string(),
                ));
            };
            let values: HashMap<String, Value> = map.into_iter().collect();
            Ok(NodeOutput::from_values(values))
        }
        Some(ErrorProcessType::ExceptionBranch) => {
            let mut values = HashMap::new();
            values.insert(
                "errorBody".to_string(),
                serde_json::json!({ "errorMessage": err.to_string() }),
            );
            Ok(NodeOutput {
                values,
                chosen_port: Some(PORT_ERROR.to_string()),
                ..Default::default()
            })
        }
        Some(ErrorProcessType::Throw) | None => Err(err),
    }
}
