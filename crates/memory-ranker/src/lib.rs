//! Re-scores vector-similarity results using recency, frequency, type
//! priority, and project/scope affinity, combining them into one final
//! score. Given a set of (memory, similarity) pairs and an optional
//! project hint, `rank` produces ranked results with per-factor
//! sub-scores, sorted strictly descending by the weighted combination.

use chrono::{DateTime, Utc};

use memory_core::config::RankerConfig;
use memory_core::model::{MemoryRecord, MemoryType, Scope};

/// Half-life for the recency decay: one week. Chosen so that
/// 1 day ≈ 0.91, 1 week ≈ 0.50, 1 month ≈ 0.05 — within the documented
/// target bands.
const RECENCY_HALF_LIFE_HOURS: f64 = 168.0;

/// Reference access count against which `frequency` saturates. Access
/// counts above this still increase the score, just with diminishing
/// returns (logarithmic).
const FREQUENCY_REFERENCE_COUNT: f64 = 20.0;

const TYPE_BOOST_TABLE: &[(MemoryType, f64)] = &[
    (MemoryType::Rule, 1.5),
    (MemoryType::Procedure, 1.3),
    (MemoryType::Fact, 1.0),
    (MemoryType::Episode, 0.8),
    (MemoryType::Preference, 0.7),
];
const TYPE_BOOST_UNKNOWN: f64 = 1.0;
const TYPE_BOOST_MAX: f64 = 1.5;

const SCOPE_BOOST_MAX: f64 = 1.5;

/// One memory's per-factor sub-scores plus the weighted final score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedMemory {
    pub memory: MemoryRecord,
    pub similarity: f64,
    pub recency: f64,
    pub frequency: f64,
    pub type_boost: f64,
    pub scope_boost: f64,
    pub final_score: f64,
}

/// Exponential decay on hours since `last_accessed`. Zero timestamp
/// (never meaningfully accessed) yields 0.1; a timestamp in the future
/// (clock skew) clamps to 0.
pub fn recency_score(last_accessed: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    if last_accessed.timestamp() <= 0 {
        return 0.1;
    }
    let hours = (now - last_accessed).num_milliseconds() as f64 / 3_600_000.0;
    if hours < 0.0 {
        return 0.0;
    }
    (-std::f64::consts::LN_2 / RECENCY_HALF_LIFE_HOURS * hours).exp()
}

/// Monotone-increasing, saturating function of `access_count`. Zero
/// accesses scores zero.
pub fn frequency_score(access_count: u64) -> f64 {
    if access_count == 0 {
        return 0.0;
    }
    let n = access_count as f64;
    (1.0 + n).ln() / (1.0 + FREQUENCY_REFERENCE_COUNT).ln()
}

/// Lookup-table boost for memory type, normalized so the maximum table
/// entry maps to 1.0.
pub fn type_boost_score(memory_type: MemoryType) -> f64 {
    let raw = TYPE_BOOST_TABLE
        .iter()
        .find(|(t, _)| *t == memory_type)
        .map(|(_, v)| *v)
        .unwrap_or(TYPE_BOOST_UNKNOWN);
    raw / TYPE_BOOST_MAX
}

/// Raw scope affinity, normalized so the maximum raw value (project
/// scope with a matching project) maps to 1.0.
pub fn scope_boost_score(scope: Scope, record_project: &str, query_project: Option<&str>) -> f64 {
    let raw = match scope {
        Scope::Permanent => 1.0,
        Scope::Project => {
            let matches = query_project
                .map(|p| !p.is_empty() && p == record_project)
                .unwrap_or(false);
            if matches {
                1.5
            } else {
                0.8
            }
        }
        Scope::Session => 0.9,
        Scope::Ttl => 0.7,
    };
    raw / SCOPE_BOOST_MAX
}

/// Rank a batch of (memory, similarity) pairs. Stable: ties in
/// `final_score` preserve input order. `weights` is expected to already
/// be `validated()` by the caller (the config layer falls back to
/// defaults on invalid weights, per spec).
pub fn rank(
    pairs: Vec<(MemoryRecord, f32)>,
    project: Option<&str>,
    weights: &RankerConfig,
) -> Vec<RankedMemory> {
    let weights = if weights.is_valid() {
        *weights
    } else {
        tracing::warn!("ranker weights invalid at rank() call site, falling back to defaults");
        RankerConfig::default()
    };
    let now = Utc::now();

    let mut ranked: Vec<RankedMemory> = pairs
        .into_iter()
        .enumerate()
        .map(|(_idx, (memory, similarity))| {
            let similarity = similarity as f64;
            let recency = recency_score(memory.last_accessed, now);
            let frequency = frequency_score(memory.access_count);
            let type_boost = type_boost_score(memory.memory_type);
            let scope_boost = scope_boost_score(memory.scope, &memory.project, project);
            let final_score = weights.weight_similarity * similarity
                + weights.weight_recency * recency
                + weights.weight_frequency * frequency
                + weights.weight_type_boost * type_boost
                + weights.weight_scope_boost * scope_boost;
            RankedMemory {
                memory,
                similarity,
                recency,
                frequency,
                type_boost,
                scope_boost,
                final_score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}
