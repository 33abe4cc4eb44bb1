//! Egress surfaces (spec §4.12, §6): the five primitives — remember,
//! recall, forget, search, stats — exposed twice, once as an `axum`
//! REST router and once as a hand-rolled JSON-RPC 2.0 dispatcher shaped
//! like an MCP tool call. Both surfaces are thin: they validate the
//! wire shape and delegate straight to the engine crates.

pub mod mcp;
pub mod rest;

use std::sync::Arc;

use memory_capture::CapturePipeline;
use memory_context::ContextAssembler;
use memory_core::traits::{Embedder, MemoryStore};
use memory_metrics::Metrics;

/// Shared application state injected into every handler. Constructed
/// once at startup and cloned (cheap: every field is an `Arc`) into
/// each request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MemoryStore>,
    pub embedder: Arc<dyn Embedder>,
    pub capture: Arc<CapturePipeline>,
    pub context: Arc<ContextAssembler>,
    pub metrics: Arc<Metrics>,
}

pub use rest::build_router;
