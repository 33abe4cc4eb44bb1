//! Lifecycle manager (spec §4.7): four independent phases run
//! sequentially over paginated scans of the store — TTL expiry, session
//! decay, permanent-record consolidation, and validity retirement.
//! Errors are collected per phase and joined rather than aborting the
//! run; a `dry_run` flag suppresses deletes while still counting what
//! would have been deleted.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use memory_core::errors::MemoryResult;
use memory_core::model::{cosine_similarity, MemoryRecord, Scope, SearchFilters, Vector};
use memory_core::traits::{Embedder, MemoryStore};
use memory_metrics::Metrics;

/// Page size used by the paginated scan (`list_all`).
pub const DEFAULT_PAGE_SIZE: usize = 500;
/// Global safety cap on how many records a single scan will accumulate,
/// to bound memory use on pathological collections.
pub const DEFAULT_SAFETY_CAP: usize = 50_000;

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub page_size: usize,
    pub safety_cap: usize,
    pub session_decay: Duration,
    pub consolidation_similarity_threshold: f32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            safety_cap: DEFAULT_SAFETY_CAP,
            session_decay: Duration::hours(24),
            consolidation_similarity_threshold: 0.92,
        }
    }
}

/// One phase's failure, tagged by phase name so the joined error is
/// legible without re-deriving which scan produced it.
#[derive(Debug, thiserror::Error)]
#[error("{phase}: {message}")]
pub struct LifecycleError {
    pub phase: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecycleReport {
    pub ttl_expired: usize,
    pub session_decayed: usize,
    pub consolidated: usize,
    pub validity_retired: usize,
    pub scans_truncated: bool,
    pub dry_run: bool,
}

pub struct LifecycleManager {
    store: Arc<dyn MemoryStore>,
    embedder: Option<Arc<dyn Embedder>>,
    metrics: Arc<Metrics>,
    config: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn MemoryStore>, metrics: Arc<Metrics>, config: LifecycleConfig) -> Self {
        Self {
            store,
            embedder: None,
            metrics,
            config,
        }
    }

    /// Consolidation (phase 3) is skipped entirely without an embedder.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Walks `list` with the configured page size until `next_cursor` is
    /// empty, or until `safety_cap` records have been accumulated (in
    /// which case the walk is truncated and the caller is told so).
    async fn list_all(&self, filters: &SearchFilters) -> MemoryResult<(Vec<MemoryRecord>, bool)> {
        let mut out = Vec::new();
        let mut cursor = String::new();
        loop {
            let page = self.store.list(filters, self.config.page_size, &cursor).await?;
            out.extend(page.records);
            if out.len() >= self.config.safety_cap {
                out.truncate(self.config.safety_cap);
                tracing::warn!(
                    cap = self.config.safety_cap,
                    "lifecycle scan hit the safety cap, truncating"
                );
                return Ok((out, true));
            }
            if page.next_cursor.is_empty() {
                break;
            }
            cursor = page.next_cursor;
        }
        Ok((out, false))
    }

    pub async fn run(&self, dry_run: bool) -> (LifecycleReport, Vec<LifecycleError>) {
        let mut report = LifecycleReport {
            dry_run,
            ..Default::default()
        };
        let mut errors = Vec::new();
        let now = Utc::now();

        match self.run_ttl_expiry(dry_run, now).await {
            Ok((count, truncated)) => {
                report.ttl_expired = count;
                report.scans_truncated |= truncated;
            }
            Err(e) => errors.push(LifecycleError {
                phase: "ttl_expiry",
                message: e.to_string(),
            }),
        }

        match self.run_session_decay(dry_run, now).await {
            Ok((count, truncated)) => {
                report.session_decayed = count;
                report.scans_truncated |= truncated;
            }
            Err(e) => errors.push(LifecycleError {
                phase: "session_decay",
                message: e.to_string(),
            }),
        }

        match self.run_consolidation(dry_run).await {
            Ok((count, truncated)) => {
                report.consolidated = count;
                report.scans_truncated |= truncated;
            }
            Err(e) => errors.push(LifecycleError {
                phase: "consolidation",
                message: e.to_string(),
            }),
        }

        match self.run_validity_retirement(dry_run, now).await {
            Ok((count, truncated)) => {
                report.validity_retired = count;
                report.scans_truncated |= truncated;
            }
            Err(e) => errors.push(LifecycleError {
                phase: "validity_retirement",
                message: e.to_string(),
            }),
        }

        (report, errors)
    }

    async fn delete_one(&self, id: &str, dry_run: bool, record_metric: impl FnOnce(&Metrics)) -> MemoryResult<()> {
        if !dry_run {
            self.store.delete(id).await?;
            record_metric(&self.metrics);
        }
        Ok(())
    }

    async fn run_ttl_expiry(&self, dry_run: bool, now: DateTime<Utc>) -> MemoryResult<(usize, bool)> {
        let filters = SearchFilters {
            scope: Some(Scope::Ttl),
            ..Default::default()
        };
        let (records, truncated) = self.list_all(&filters).await?;
        let mut count = 0;
        for record in &records {
            if !record.has_active_ttl() {
                continue;
            }
            let expires_at = record.created_at + Duration::seconds(record.ttl_seconds as i64);
            if now > expires_at {
                self.delete_one(&record.id, dry_run, Metrics::record_ttl_expired).await?;
                count += 1;
            }
        }
        Ok((count, truncated))
    }

    async fn run_session_decay(&self, dry_run: bool, now: DateTime<Utc>) -> MemoryResult<(usize, bool)> {
        let filters = SearchFilters {
            scope: Some(Scope::Session),
            ..Default::default()
        };
        let (records, truncated) = self.list_all(&filters).await?;
        let mut count = 0;
        for record in &records {
            let anchor = record.last_accessed.max(record.created_at);
            if now - anchor > self.config.session_decay {
                self.delete_one(&record.id, dry_run, Metrics::record_session_decayed).await?;
                count += 1;
            }
        }
        Ok((count, truncated))
    }

    /// Skipped entirely (returns `(0, false)`) when no embedder is
    /// configured. Otherwise embeds each content on demand rather than
    /// trusting a stored vector, since the embedder may not be
    /// deterministic across model versions; embeddings are memoized per
    /// id within this run so no content is embedded twice.
    async fn run_consolidation(&self, dry_run: bool) -> MemoryResult<(usize, bool)> {
        let Some(embedder) = self.embedder.clone() else {
            return Ok((0, false));
        };
        let filters = SearchFilters {
            scope: Some(Scope::Permanent),
            ..Default::default()
        };
        let (records, truncated) = self.list_all(&filters).await?;

        let mut deleted: HashSet<String> = HashSet::new();
        let mut vector_cache: HashMap<String, Vector> = HashMap::new();

        for i in 0..records.len() {
            if deleted.contains(&records[i].id) {
                continue;
            }
            let vector_i = self.embed_cached(&embedder, &records[i], &mut vector_cache).await?;

            for j in (i + 1)..records.len() {
                if deleted.contains(&records[j].id) {
                    continue;
                }
                let vector_j = self.embed_cached(&embedder, &records[j], &mut vector_cache).await?;
                let similarity = cosine_similarity(&vector_i.0, &vector_j.0);
                if similarity <= self.config.consolidation_similarity_threshold {
                    continue;
                }

                // Reference behavior compares with `>` (strict): a tie
                // keeps the first-seen (`i`), matching the asymmetry
                // noted as an open question rather than inventing a
                // different tie-break.
                if records[j].confidence > records[i].confidence {
                    deleted.insert(records[i].id.clone());
                    // The outer anchor was just deleted: its cached
                    // vector is now meaningless for further comparisons
                    // against it, so stop the inner loop immediately
                    // rather than comparing against a stale vector.
                    break;
                } else {
                    deleted.insert(records[j].id.clone());
                }
            }
        }

        for id in &deleted {
            self.delete_one(id, dry_run, Metrics::record_consolidated).await?;
        }
        Ok((deleted.len(), truncated))
    }

    async fn embed_cached(
        &self,
        embedder: &Arc<dyn Embedder>,
        record: &MemoryRecord,
        cache: &mut HashMap<String, Vector>,
    ) -> MemoryResult<Vector> {
        if let Some(v) = cache.get(&record.id) {
            return Ok(v.clone());
        }
        let vector = embedder.embed_one(&record.content).await.map_err(memory_core::errors::MemoryError::from)?;
        cache.insert(record.id.clone(), vector.clone());
        Ok(vector)
    }

    async fn run_validity_retirement(&self, dry_run: bool, now: DateTime<Utc>) -> MemoryResult<(usize, bool)> {
        // `valid_until` applies to permanent and project scopes; since
        // the store filters by a single scope value, scan both and
        // concatenate rather than adding an "in" filter to the
        // contract.
        let mut count = 0;
        let mut truncated = false;
        for scope in [Scope::Permanent, Scope::Project] {
            let filters = SearchFilters {
                scope: Some(scope),
                ..Default::default()
            };
            let (records, scan_truncated) = self.list_all(&filters).await?;
            truncated |= scan_truncated;
            for record in &records {
                if let Some(valid_until) = record.valid_until {
                    if valid_until < now {
                        self.delete_one(&record.id, dry_run, Metrics::record_validity_retired)
                            .await?;
                        count += 1;
                    }
                }
            }
        }
        Ok((count, truncated))
    }
}
