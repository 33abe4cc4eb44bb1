//! The axum-backed REST surface. Route/handler/error-response shape
//! grounded on the pack's `rust-backend` demo — a `thiserror` app error
//! mapped to a status code plus a `{error, code}` JSON body — adapted
//! from actix's `ResponseError` to axum's `IntoResponse`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use memory_capture::CaptureRequest;
use memory_context::ContextRequest;
use memory_core::errors::MemoryError;
use memory_core::model::SearchFilters;

use crate::AppState;

/// Wraps `MemoryError` so it can be returned directly from a handler;
/// the status code follows the same category the error taxonomy
/// already computes, so there is no second mapping to keep in sync.
pub struct ApiError(MemoryError);

impl From<MemoryError> for ApiError {
    fn from(err: MemoryError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.category() {
            "not_found" => StatusCode::NOT_FOUND,
            "invalid_input" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "cancelled" => StatusCode::REQUEST_TIMEOUT,
            "transient" | "storage" | "embedding" | "llm" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.category(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/remember", post(remember))
        .route("/v1/recall", post(recall))
        .route("/v1/memories/:id", delete(forget))
        .route("/v1/search", get(search))
        .route("/v1/stats", get(stats))
        .with_state(Arc::new(state))
}

#[derive(Deserialize)]
struct RememberBody {
    user_message: String,
    assistant_message: String,
    session_id: String,
    project: Option<String>,
}

async fn remember(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RememberBody>,
) -> Result<Json<memory_capture::CaptureReport>, ApiError> {
    let report = state
        .capture
        .capture_turn(&CaptureRequest {
            user_message: body.user_message,
            assistant_message: body.assistant_message,
            session_id: body.session_id,
            project: body.project,
        })
        .await?;
    Ok(Json(report))
}

#[derive(Deserialize)]
struct RecallBody {
    query: String,
    project: Option<String>,
    #[serde(default)]
    token_budget: usize,
}

async fn recall(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RecallBody>,
) -> Result<Json<memory_context::AssembledContext>, ApiError> {
    let result = state
        .context
        .assemble_context(&ContextRequest {
            query: body.query,
            project: body.project,
            token_budget: body.token_budget,
        })
        .await?;
    Ok(Json(result))
}

async fn forget(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.store.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SearchQuery {
    query: String,
    project: Option<String>,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_limit() -> usize {
    10
}

#[derive(Serialize)]
struct SearchResult {
    id: String,
    content: String,
    score: f32,
}

async fn search(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<SearchResult>>, ApiError> {
    let vector = state.embedder.embed_one(&q.query).await.map_err(MemoryError::from)?;
    let filters = match q.project {
        Some(p) => SearchFilters::with_project(p),
        None => SearchFilters::default(),
    };
    let hits = state.store.search(&vector, q.limit, &filters).await?;
    Ok(Json(
        hits.into_iter()
            .map(|h| SearchResult {
                id: h.memory.id,
                content: h.memory.content,
                score: h.score,
            })
            .collect(),
    ))
}

#[derive(Serialize)]
struct StatsResponse {
    metrics: memory_metrics::MetricsSnapshot,
    store: StoreStatsResponse,
}

#[derive(Serialize)]
struct StoreStatsResponse {
    total: u64,
}

async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    let store_stats = state.store.stats().await?;
    Ok(Json(StatsResponse {
        metrics: state.metrics.snapshot(),
        store: StoreStatsResponse {
            total: store_stats.total,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use memory_core::config::RankerConfig;
    use memory_core::errors::EmbeddingError;
    use memory_core::model::Vector;
    use memory_core::traits::{CapturedItem, Embedder, MemoryExtractor};
    use memory_llm::RuleBasedClassifier;
    use memory_storage::InMemoryStore;
    use tower::ServiceExt;

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
    async fn stats_endpoint_returns_zeroed_counters_initially() {
        let app = build_router(build_state());
        let response = app
            .oneshot(Request::builder().uri("/v1/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn forget_on_missing_id_is_idempotent() {
        let app = build_router(build_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/v1/memories/does-not-exist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        // delete is idempotent at the store layer (InMemoryStore::delete
        // succeeds even for a missing id), so this returns 204.
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn remember_with_no_extracted_items_returns_an_empty_report() {
        let app = build_router(build_state());
        let body = serde_json::json!({
            "user_message": "hi",
            "assistant_message": "hello",
            "session_id": "s1",
            "project": null
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/remember")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
