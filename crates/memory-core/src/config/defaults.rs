//! Numeric defaults shared across config sections, pulled out so the
//! engine's own code (ranker, capture pipeline, context assembly) can
//! reference the same constants the config defaults to rather than
//! duplicating magic numbers.

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: i64 = 200;
pub const DEFAULT_DEDUP_THRESHOLD: f64 = 0.95;
pub const DEFAULT_DEDUP_THRESHOLD_HOOK: f64 = 0.95;
pub const DEFAULT_TTL_HOURS: i64 = 0;
pub const DEFAULT_CONTEXT_TOKEN_BUDGET: usize = 2000;
pub const DEFAULT_SEARCH_LIMIT: usize = 20;
pub const DEFAULT_MIN_CAPTURE_CONFIDENCE: f64 = 0.5;

pub const DEFAULT_WEIGHT_SIMILARITY: f64 = 0.30;
pub const DEFAULT_WEIGHT_RECENCY: f64 = 0.25;
pub const DEFAULT_WEIGHT_FREQUENCY: f64 = 0.10;
pub const DEFAULT_WEIGHT_TYPE_BOOST: f64 = 0.25;
pub const DEFAULT_WEIGHT_SCOPE_BOOST: f64 = 0.10;
