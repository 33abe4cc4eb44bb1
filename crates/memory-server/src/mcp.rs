//! MCP-shaped tool surface (spec §4.12): a minimal hand-rolled JSON-RPC
//! 2.0 envelope, since no MCP SDK is available in the dependency pack.
//! A `match` over `method` dispatches to the same engine calls the REST
//! surface uses — both egress surfaces are thin wrappers over one
//! engine contract, never a second implementation of it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use memory_capture::CaptureRequest;
use memory_context::ContextRequest;
use memory_core::model::SearchFilters;

use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

fn ok(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        result: Some(result),
        error: None,
        id,
    }
}

fn err(id: Value, code: i64, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.into(),
        }),
        id,
    }
}

/// Dispatch one JSON-RPC request. Never panics on malformed params: a
/// deserialize failure becomes an `INVALID_PARAMS` response, matching
/// the envelope's "report, don't crash" contract.
pub async fn dispatch(state: &AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    if request.jsonrpc != "2.0" {
        return err(request.id, PARSE_ERROR, "jsonrpc must be \"2.0\"");
    }

    match request.method.as_str() {
        "remember" => remember(state, request.id, request.params).await,
        "recall" => recall(state, request.id, request.params).await,
        "forget" => forget(state, request.id, request.params).await,
        "search" => search(state, request.id, request.params).await,
        "stats" => stats(state, request.id).await,
        other => err(request.id, METHOD_NOT_FOUND, format!("unknown method: {other}")),
    }
}

#[derive(Deserialize)]
struct RememberParams {
    user_message: String,
    assistant_message: String,
    #[serde(default)]
    session_id: String,
    project: Option<String>,
}

async fn remember(state: &AppState, id: Value, params: Value) -> JsonRpcResponse {
    let parsed: RememberParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return err(id, INVALID_PARAMS, e.to_string()),
    };
    match state
        .capture
        .capture_turn(&CaptureRequest {
            user_message: parsed.user_message,
            assistant_message: parsed.assistant_message,
            session_id: parsed.session_id,
            project: parsed.project,
        })
        .await
    {
        Ok(report) => ok(id, serde_json::to_value(report).unwrap_or(Value::Null)),
        Err(e) => err(id, INTERNAL_ERROR, e.to_string()),
    }
}

#[derive(Deserialize)]
struct RecallParams {
    query: String,
    project: Option<String>,
    #[serde(default)]
    token_budget: usize,
}

async fn recall(state: &AppState, id: Value, params: Value) -> JsonRpcResponse {
    let parsed: RecallParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return err(id, INVALID_PARAMS, e.to_string()),
    };
    match state
        .context
        .assemble_context(&ContextRequest {
            query: parsed.query,
            project: parsed.project,
            token_budget: parsed.token_budget,
        })
        .await
    {
        Ok(result) => ok(id, serde_json::to_value(result).unwrap_or(Value::Null)),
        Err(e) => err(id, INTERNAL_ERROR, e.to_string()),
    }
}

#[derive(Deserialize)]
struct ForgetParams {
    memory_id: String,
}

async fn forget(state: &AppState, id: Value, params: Value) -> JsonRpcResponse {
    let parsed: ForgetParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return err(id, INVALID_PARAMS, e.to_string()),
    };
    match state.store.delete(&parsed.memory_id).await {
        Ok(()) => ok(id, serde_json::json!({"deleted": true})),
        Err(e) => err(id, INTERNAL_ERROR, e.to_string()),
    }
}

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    project: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

async fn search(state: &AppState, id: Value, params: Value) -> JsonRpcResponse {
    let parsed: SearchParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return err(id, INVALID_PARAMS, e.to_string()),
    };
    let vector = match state.embedder.embed_one(&parsed.query).await {
        Ok(v) => v,
        Err(e) => return err(id, INTERNAL_ERROR, e.to_string()),
    };
    let filters = match parsed.project {
        Some(p) => SearchFilters::with_project(p),
        None => SearchFilters::default(),
    };
    match state.store.search(&vector, parsed.limit, &filters).await {
        Ok(hits) => {
            let results: Vec<Value> = hits
                .into_iter()
                .map(|h| serde_json::json!({"id": h.memory.id, "content": h.memory.content, "score": h.score}))
                .collect();
            ok(id, Value::Array(results))
        }
        Err(e) => err(id, INTERNAL_ERROR, e.to_string()),
    }
}

async fn stats(state: &AppState, id: Value) -> JsonRpcResponse {
    match state.store.stats().await {
        Ok(store_stats) => ok(
            id,
            serde_json::json!({
                "metrics": state.metrics.snapshot(),
                "store_total": store_stats.total,
            }),
        ),
        Err(e) => err(id, INTERNAL_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use memory_core::config::RankerConfig;
    use memory_core::errors::EmbeddingError;
    use memory_core::model::Vector;
    use memory_core::traits::{CapturedItem, Embedder, MemoryExtractor};
    use memory_llm::RuleBasedClassifier;
    use memory_storage::InMemoryStore;
    use std::sync::Arc;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_one(&self, _text: &str) -> Result<Vector, EmbeddingError> {
            Ok(Vector::new(vec![1.0, 0.0]))
        }
        fn dimension(&self) -> usize {
            2
        }
    }

    struct EmptyExtractor;

    #[async_trait]
    impl MemoryExtractor for EmptyExtractor {
        async fn extract(
            &self,
            _user: &str,
            _assistant: &str,
        ) -> Result<Vec<CapturedItem>, memory_core::errors::LlmError> {
            Ok(vec![])
        }
    }

    fn build_state() -> AppState {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(FixedEmbedder);
        let metrics = Arc::new(memory_metrics::Metrics::new());
        let capture = Arc::new(memory_capture::CapturePipeline::new(
            store.clone(),
            embedder.clone(),
            Arc::new(EmptyExtractor),
            Arc::new(RuleBasedClassifier::new()),
            metrics.clone(),
            memory_capture::CaptureConfig::default(),
        ));
        let context = Arc::new(memory_context::ContextAssembler::new(
            store.clone(),
            embedder.clone(),
            RankerConfig::default(),
            metrics.clone(),
            2000,
        ));
        AppState {
            store,
            embedder,
            capture,
            context,
            metrics,
        }
    }

    #[tokio::test]
    async fn unknown_method_returns_method_not_found() {
        let state = build_state();
        let response = dispatch(
            &state,
            JsonRpcRequest {
                jsonrpc: "2.0".to_string(),
                method: "bogus".to_string(),
                params: Value::Null,
                id: Value::from(1),
            },
        )
        .await;
        assert!(response.error.is_some());
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_params_return_invalid_params_not_a_panic() {
        let state = build_state();
        let response = dispatch(
            &state,
            JsonRpcRequest {
                jsonrpc: "2.0".to_string(),
                method: "recall".to_string(),
                params: serde_json::json!({"nope": true}),
                id: Value::from(2),
            },
        )
        .await;
        assert!(response.error.is_some());
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn wrong_jsonrpc_version_is_rejected() {
        let state = build_state();
        let response = dispatch(
            &state,
            JsonRpcRequest {
                jsonrpc: "1.0".to_string(),
                method: "stats".to_string(),
                params: Value::Null,
                id: Value::from(3),
            },
        )
        .await;
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn stats_call_succeeds_and_returns_a_result() {
        let state = build_state();
        let response = dispatch(
            &state,
            JsonRpcRequest {
                jsonrpc: "2.0".to_string(),
                method: "stats".to_string(),
                params: Value::Null,
                id: Value::from(4),
            },
        )
        .await;
        assert!(response.result.is_some());
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn remember_then_forget_round_trips_through_the_dispatcher() {
        let state = build_state();
        let remember_response = dispatch(
            &state,
            JsonRpcRequest {
                jsonrpc: "2.0".to_string(),
                method: "remember".to_string(),
                params: serde_json::json!({
                    "user_message": "hi",
                    "assistant_message": "hello",
                    "session_id": "s1",
                }),
                id: Value::from(5),
            },
        )
        .await;
        assert!(remember_response.error.is_none());

        let forget_response = dispatch(
            &state,
            JsonRpcRequest {
                jsonrpc: "2.0".to_string(),
                method: "forget".to_string(),
                params: serde_json::json!({"memory_id": "nonexistent"}),
                id: Value::from(6),
            },
        )
        .await;
        assert!(forget_response.error.is_none());
    }
}
