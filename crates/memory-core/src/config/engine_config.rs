use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Tuning knobs for the memory engine proper: the markdown indexer's
/// chunker, the capture pipeline's dedup thresholds, and context
/// assembly's default token budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chunk_size: usize,
    pub chunk_overlap: i64,
    /// Dedup threshold used by the markdown indexer's capture path.
    pub dedup_threshold: f64,
    /// Dedup threshold used by hook-driven (post-turn) capture. Kept as
    /// an independent knob from `dedup_threshold` per the reference
    /// behavior: file indexing and live capture tolerate different
    /// amounts of near-duplication.
    pub dedup_threshold_hook: f64,
    pub default_ttl_hours: i64,
    pub default_context_token_budget: usize,
    pub default_search_limit: usize,
    pub min_capture_confidence: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            dedup_threshold_hook: DEFAULT_DEDUP_THRESHOLD_HOOK,
            default_ttl_hours: DEFAULT_TTL_HOURS,
            default_context_token_budget: DEFAULT_CONTEXT_TOKEN_BUDGET,
            default_search_limit: DEFAULT_SEARCH_LIMIT,
            min_capture_confidence: DEFAULT_MIN_CAPTURE_CONFIDENCE,
        }
    }
}
