//! Entry point for the `memory-server` binary: loads configuration,
//! wires the store/embedder/LLM clients into the engine crates, and
//! serves both egress surfaces (REST under `/v1/*`, MCP-shaped
//! JSON-RPC under `/mcp`) over one `axum` listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::post;
use axum::{Json, Router};

use memory_capture::{CaptureConfig, CapturePipeline};
use memory_context::ContextAssembler;
use memory_core::config::CortexMemoryConfig;
use memory_core::traits::{Embedder, MemoryStore};
use memory_llm::{ChatClient, ChatClientConfig, HttpConflictDetector, HttpEmbedder, HttpEmbedderConfig, HttpMemoryExtractor, HttpReasoner, RuleBasedClassifier};
use memory_metrics::Metrics;
use memory_server::mcp::{self, JsonRpcRequest};
use memory_server::{build_router, AppState};
use memory_storage::QdrantStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config_path = std::env::var("CORTEX_MEMORY_CONFIG").unwrap_or_else(|_| "cortex-memory.toml".to_string());
    let mut config = match std::fs::read_to_string(&config_path) {
        Ok(raw) => CortexMemoryConfig::from_toml(&raw)?,
        Err(_) => {
            tracing::warn!(path = %config_path, "no config file found, using defaults");
            CortexMemoryConfig::default()
        }
    };
    config.apply_env_overrides();
    if let Err(msg) = config.validate() {
        anyhow::bail!("invalid configuration: {msg}");
    }

    let store: Arc<dyn MemoryStore> = Arc::new(QdrantStore::new(&config.storage, config.embedding.dimension));
    store.ensure_collection().await?;

    let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(HttpEmbedderConfig {
        url: config.embedding.url.clone(),
        model: config.embedding.model.clone(),
        dimension: config.embedding.dimension,
        max_batch_workers: config.embedding.max_batch_workers,
    }));

    let llm_url = std::env::var("CORTEX_MEMORY_LLM_URL").unwrap_or_else(|_| "http://localhost:8082/complete".to_string());
    let llm_model = std::env::var("CORTEX_MEMORY_LLM_MODEL").unwrap_or_else(|_| "default".to_string());
    let chat_config = ChatClientConfig {
        url: llm_url,
        model: llm_model,
    };

    let metrics = Arc::new(Metrics::new());

    let extractor = Arc::new(HttpMemoryExtractor::new(ChatClient::new(chat_config.clone())));
    let classifier = Arc::new(RuleBasedClassifier::new());
    let conflict_detector = Arc::new(HttpConflictDetector::new(ChatClient::new(chat_config.clone())));
    let reasoner = Arc::new(HttpReasoner::new(ChatClient::new(chat_config)));

    let capture = Arc::new(
        CapturePipeline::new(
            store.clone(),
            embedder.clone(),
            extractor,
            classifier,
            metrics.clone(),
            CaptureConfig {
                dedup_threshold: config.engine.dedup_threshold_hook as f32,
                min_confidence: config.engine.min_capture_confidence,
                ..CaptureConfig::default()
            },
        )
        .with_conflict_detector(conflict_detector),
    );

    let context = Arc::new(
        ContextAssembler::new(
            store.clone(),
            embedder.clone(),
            config.ranker,
            metrics.clone(),
            config.engine.default_context_token_budget,
        )
        .with_search_limit(config.engine.default_search_limit)
        .with_reasoner(reasoner),
    );

    let state = AppState {
        store,
        embedder,
        capture,
        context,
        metrics,
    };

    let app = build_router(state.clone()).merge(Router::new().route("/mcp", post(mcp_handler)).with_state(Arc::new(state)));

    let addr: SocketAddr = std::env::var("CORTEX_MEMORY_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8090".to_string())
        .parse()?;
    tracing::info!(%addr, "memory-server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn mcp_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<mcp::JsonRpcResponse> {
    Json(mcp::dispatch(&state, request).await)
}
