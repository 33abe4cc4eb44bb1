//! Post-turn capture pipeline: delegate to an external extractor,
//! classify items that arrived without a type, drop low-confidence
//! items, batch-embed the rest in one call, reject near duplicates,
//! optionally run a contradiction filter, and upsert what survives.
//! The batch-embed step fails atomically (one bad text fails the whole
//! turn's batch); every later step is tolerant of partial failure, one
//! item's duplicate-check, conflict-check, or storage error is logged
//! and skipped without aborting the loop.

use std::sync::Arc;

use chrono::Utc;

use memory_core::errors::{MemoryError, MemoryResult};
use memory_core::model::{MemoryRecord, MemoryType, Scope, SearchFilters, Visibility};
use memory_core::traits::{
    Classifier, ConflictDetector, Embedder, MemoryExtractor, MemoryStore,
};
use memory_metrics::Metrics;

/// Default scope assigned to memories captured from a live dialogue
/// turn. Post-turn captures are short-lived by nature of the hook that
/// produces them; the lifecycle manager's session decay phase (§4.7)
/// is what eventually retires them, not an explicit TTL.
pub const CAPTURE_DEFAULT_SCOPE: Scope = Scope::Session;
pub const CAPTURE_SOURCE: &str = "hook:post-turn";

/// How many near-neighbors are offered to the conflict detector as
/// "existing" context for a candidate memory.
const DEFAULT_CONFLICT_TOP_N: usize = 5;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub dedup_threshold: f32,
    pub min_confidence: f64,
    pub conflict_top_n: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: 0.95,
            min_confidence: 0.5,
            conflict_top_n: DEFAULT_CONFLICT_TOP_N,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub user_message: String,
    pub assistant_message: String,
    pub session_id: String,
    pub project: Option<String>,
}

/// Best-effort tally of what happened to the items the extractor
/// returned. The pipeline returns success with this report even when
/// individual items were skipped or failed; only extractor failure
/// propagates as an `Err`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureReport {
    pub extracted: usize,
    pub confidence_filtered: usize,
    pub embedding_failed: usize,
    pub dedup_skipped: usize,
    pub conflict_skipped: usize,
    pub stored: usize,
    pub store_errors: usize,
}

pub struct CapturePipeline {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn MemoryExtractor>,
    classifier: Arc<dyn Classifier>,
    conflict_detector: Option<Arc<dyn ConflictDetector>>,
    metrics: Arc<Metrics>,
    config: CaptureConfig,
}

impl CapturePipeline {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn MemoryExtractor>,
        classifier: Arc<dyn Classifier>,
        metrics: Arc<Metrics>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            extractor,
            classifier,
            conflict_detector: None,
            metrics,
            config,
        }
    }

    pub fn with_conflict_detector(mut self, detector: Arc<dyn ConflictDetector>) -> Self {
        self.conflict_detector = Some(detector);
        self
    }

    pub async fn capture_turn(&self, request: &CaptureRequest) -> MemoryResult<CaptureReport> {
        let mut report = CaptureReport::default();

        // Step 1: extraction failures propagate — nothing to capture if
        // the extractor itself can't be reached.
        let items = self
            .extractor
            .extract(&request.user_message, &request.assistant_message)
            .await
            .map_err(MemoryError::from)?;
        report.extracted = items.len();

        // Step 2: classify-if-missing, drop low-confidence items.
        let mut eligible = Vec::with_capacity(items.len());
        for item in items {
            if item.confidence < self.config.min_confidence {
                report.confidence_filtered += 1;
                continue;
            }
            let memory_type = item
                .memory_type
                .unwrap_or_else(|| self.classifier.classify(&item.content));
            eligible.push((item.content, memory_type, item.confidence, item.tags));
        }

        if eligible.is_empty() {
            return Ok(report);
        }

        // Step 3: one batch call to the embedding service for every
        // eligible item (see memory-llm's `HttpEmbedder::embed_batch` for
        // the bounded-parallel worker pool this fans out to under the
        // hood). A batch-level failure drops the whole turn's eligible
        // items rather than aborting capture entirely.
        let contents: Vec<String> = eligible.iter().map(|(c, ..)| c.clone()).collect();
        let vectors = match self.embedder.embed_batch(&contents).await {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(error = %err, count = eligible.len(), "batch embedding failed, skipping turn's items");
                report.embedding_failed += eligible.len();
                return Ok(report);
            }
        };

        for ((content, memory_type, confidence, tags), vector) in eligible.into_iter().zip(vectors) {
            self.metrics.record_capture_attempt();

            // Step 4: near-duplicate rejection.
            match self
                .store
                .find_duplicates(&vector, self.config.dedup_threshold)
                .await
            {
                Ok(hits) if !hits.is_empty() => {
                    self.metrics.record_dedup_skipped();
                    report.dedup_skipped += 1;
                    continue;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "duplicate check failed, proceeding to store anyway");
                }
                _ => {}
            }

            // Step 5: optional contradiction filter. Any failure is
            // non-fatal — the item is stored as if no contradiction
            // were found, per spec's "degrades silently" policy.
            if let Some(detector) = &self.conflict_detector {
                let filters = match &request.project {
                    Some(p) => SearchFilters::with_project(p.clone()),
                    None => SearchFilters::default(),
                };
                let neighbors = self
                    .store
                    .search(&vector, self.config.conflict_top_n, &filters)
                    .await
                    .unwrap_or_default();
                let existing: Vec<String> = neighbors.into_iter().map(|s| s.memory.content).collect();

                match detector.check(&content, &existing).await {
                    Ok(verdict) if verdict.contradicts => {
                        self.metrics.record_conflict_skipped();
                        report.conflict_skipped += 1;
                        tracing::info!(
                            reason = ?verdict.reason,
                            "captured item skipped: contradicts an existing memory"
                        );
                        continue;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::debug!(error = %err, "conflict detector unavailable, storing item anyway");
                    }
                }
            }

            // Step 6: build and store the record.
            let now = Utc::now();
            let mut record = MemoryRecord::new(content, memory_type, CAPTURE_DEFAULT_SCOPE);
            record.visibility = Visibility::Private;
            record.confidence = confidence;
            record.source = CAPTURE_SOURCE.to_string();
            record.tags = tags;
            record.project = request.project.clone().unwrap_or_default();
            record.created_at = now;
            record.updated_at = now;
            record.last_accessed = now;

            match self.store.upsert(&record, &vector).await {
                Ok(()) => {
                    self.metrics.record_capture_stored();
                    report.stored += 1;
                }
                Err(err) => {
                    tracing::warn!(error = %err, id = %record.id, "failed to store captured memory, continuing");
                    report.store_errors += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use memory_core::errors::{EmbeddingError, LlmError};
    use memory_core::model::Vector;
    use memory_core::traits::CapturedItem;
    use memory_llm::RuleBasedClassifier;
    use memory_storage::InMemoryStore;

    struct FakeExtractor {
        items: Vec<CapturedItem>,
    }

    #[async_trait]
    impl MemoryExtractor for FakeExtractor {
        async fn extract(&self, _user: &str, _assistant: &str) -> Result<Vec<CapturedItem>, LlmError> {
            Ok(self.items.clone())
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl MemoryExtractor for FailingExtractor {
        async fn extract(&self, _user: &str, _assistant: &str) -> Result<Vec<CapturedItem>, LlmError> {
            Err(LlmError::Transient("extractor unreachable".to_string()))
        }
    }

    /// Deterministic fake: maps specific content strings to fixed
    /// vectors so dedup/embedding-failure scenarios are reproducible.
    struct FakeEmbedder {
        by_content: Mutex<HashMap<String, Vector>>,
        fail_on: Vec<String>,
    }

    impl FakeEmbedder {
        fn new(mapping: &[(&str, Vec<f32>)]) -> Self {
            let mut by_content = HashMap::new();
            for (content, values) in mapping {
                by_content.insert(content.to_string(), Vector::new(values.clone()));
            }
            Self {
                by_content: Mutex::new(by_content),
                fail_on: Vec::new(),
            }
        }

        fn failing_on(mut self, content: &str) -> Self {
            self.fail_on.push(content.to_string());
            self
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed_one(&self, text: &str) -> Result<Vector, EmbeddingError> {
            if self.fail_on.iter().any(|c| c == text) {
                return Err(EmbeddingError::Transient("simulated failure".to_string()));
            }
            Ok(self
                .by_content
                .lock()
                .unwrap()
                .get(text)
                .cloned()
                .unwrap_or_else(|| Vector::new(vec![0.0, 0.0, 1.0])))
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    fn request(user: &str, assistant: &str) -> CaptureRequest {
        CaptureRequest {
            user_message: user.to_string(),
            assistant_message: assistant.to_string(),
            session_id: "s-1".to_string(),
            project: None,
        }
    }

    #[tokio::test]
    async fn dedup_skips_item_with_identical_vector_to_an_existing_record() {
        let store = Arc::new(InMemoryStore::new());
        let existing = MemoryRecord::new("existing fact", MemoryType::Fact, Scope::Permanent);
        store
            .upsert(&existing, &Vector::new(vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let extractor = Arc::new(FakeExtractor {
            items: vec![CapturedItem {
                content: "a duplicate-looking fact".to_string(),
                memory_type: Some(MemoryType::Fact),
                confidence: 0.9,
                tags: vec![],
            }],
        });
        let embedder = Arc::new(FakeEmbedder::new(&[(
            "a duplicate-looking fact",
            vec![1.0, 0.0, 0.0],
        )]));
        let metrics = Arc::new(Metrics::new());
        let pipeline = CapturePipeline::new(
            store.clone(),
            embedder,
            extractor,
            Arc::new(RuleBasedClassifier::new()),
            metrics.clone(),
            CaptureConfig::default(),
        );

        let report = pipeline.capture_turn(&request("u", "a")).await.unwrap();
        assert_eq!(report.dedup_skipped, 1);
        assert_eq!(report.stored, 0);
        assert_eq!(store.len(), 1);
        assert_eq!(metrics.snapshot().captures_dedup_skipped, 1);
    }

    #[tokio::test]
    async fn low_confidence_items_are_filtered_before_embedding() {
        let store = Arc::new(InMemoryStore::new());
        let extractor = Arc::new(FakeExtractor {
            items: vec![CapturedItem {
                content: "low confidence thing".to_string(),
                memory_type: None,
                confidence: 0.1,
                tags: vec![],
            }],
        });
        let embedder = Arc::new(FakeEmbedder::new(&[]));
        let pipeline = CapturePipeline::new(
            store.clone(),
            embedder,
            extractor,
            Arc::new(RuleBasedClassifier::new()),
            Arc::new(Metrics::new()),
            CaptureConfig::default(),
        );

        let report = pipeline.capture_turn(&request("u", "a")).await.unwrap();
        assert_eq!(report.confidence_filtered, 1);
        assert_eq!(report.stored, 0);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn extractor_failure_propagates() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = CapturePipeline::new(
            store,
            Arc::new(FakeEmbedder::new(&[])),
            Arc::new(FailingExtractor),
            Arc::new(RuleBasedClassifier::new()),
            Arc::new(Metrics::new()),
            CaptureConfig::default(),
        );

        let result = pipeline.capture_turn(&request("u", "a")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn one_failing_item_fails_the_whole_batch_embed_call() {
        // capture_turn makes a single embed_batch call for all eligible
        // items; one failing text fails the call atomically rather than
        // only dropping its own slot, so every eligible item for the turn
        // is counted as embedding-failed and none are stored.
        let store = Arc::new(InMemoryStore::new());
        let extractor = Arc::new(FakeExtractor {
            items: vec![
                CapturedItem {
                    content: "will fail".to_string(),
                    memory_type: Some(MemoryType::Fact),
                    confidence: 0.9,
                    tags: vec![],
                },
                CapturedItem {
                    content: "will succeed".to_string(),
                    memory_type: Some(MemoryType::Fact),
                    confidence: 0.9,
                    tags: vec![],
                },
            ],
        });
        let embedder = Arc::new(
            FakeEmbedder::new(&[("will succeed", vec![1.0, 0.0, 0.0])]).failing_on("will fail"),
        );
        let pipeline = CapturePipeline::new(
            store.clone(),
            embedder,
            extractor,
            Arc::new(RuleBasedClassifier::new()),
            Arc::new(Metrics::new()),
            CaptureConfig::default(),
        );

        let report = pipeline.capture_turn(&request("u", "a")).await.unwrap();
        assert_eq!(report.embedding_failed, 2);
        assert_eq!(report.stored, 0);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn missing_memory_type_is_locally_classified() {
        let store = Arc::new(InMemoryStore::new());
        let extractor = Arc::new(FakeExtractor {
            items: vec![CapturedItem {
                content: "You must always run tests before merging".to_string(),
                memory_type: None,
                confidence: 0.9,
                tags: vec![],
            }],
        });
        let embedder = Arc::new(FakeEmbedder::new(&[(
            "You must always run tests before merging",
            vec![1.0, 0.0, 0.0],
        )]));
        let pipeline = CapturePipeline::new(
            store.clone(),
            embedder,
            extractor,
            Arc::new(RuleBasedClassifier::new()),
            Arc::new(Metrics::new()),
            CaptureConfig::default(),
        );

        pipeline.capture_turn(&request("u", "a")).await.unwrap();
        let stored = store
            .list(&SearchFilters::default(), 10, "")
            .await
            .unwrap()
            .records;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].memory_type, MemoryType::Rule);
    }

    #[tokio::test]
    async fn store_upsert_failure_is_logged_and_does_not_abort_remaining_items() {
        struct FailingUpsertStore {
            inner: InMemoryStore,
        }

        #[async_trait]
        impl MemoryStore for FailingUpsertStore {
            async fn ensure_collection(&self) -> MemoryResult<()> {
                self.inner.ensure_collection().await
            }
            async fn upsert(&self, memory: &MemoryRecord, vector: &Vector) -> MemoryResult<()> {
                if memory.content.contains("poison") {
                    return Err(MemoryError::Transient("simulated store outage".to_string()));
                }
                self.inner.upsert(memory, vector).await
            }
            async fn search(
                &self,
                vector: &Vector,
                limit: usize,
                filters: &SearchFilters,
            ) -> MemoryResult<Vec<memory_core::traits::ScoredMemory>> {
                self.inner.search(vector, limit, filters).await
            }
            async fn get(&self, id: &str) -> MemoryResult<MemoryRecord> {
                self.inner.get(id).await
            }
            async fn delete(&self, id: &str) -> MemoryResult<()> {
                self.inner.delete(id).await
            }
            async fn list(
                &self,
                filters: &SearchFilters,
                limit: usize,
                cursor: &str,
            ) -> MemoryResult<memory_core::traits::ListPage> {
                self.inner.list(filters, limit, cursor).await
            }
            async fn find_duplicates(
                &self,
                vector: &Vector,
                threshold: f32,
            ) -> MemoryResult<Vec<memory_core::traits::ScoredMemory>> {
                self.inner.find_duplicates(vector, threshold).await
            }
            async fn update_access_metadata(&self, id: &str) -> MemoryResult<()> {
                self.inner.update_access_metadata(id).await
            }
            async fn stats(&self) -> MemoryResult<memory_core::traits::StoreStats> {
                self.inner.stats().await
            }
            async fn upsert_entity(&self, entity: &memory_core::model::EntityRecord) -> MemoryResult<()> {
                self.inner.upsert_entity(entity).await
            }
            async fn get_entity(&self, id: &str) -> MemoryResult<memory_core::model::EntityRecord> {
                self.inner.get_entity(id).await
            }
            async fn search_entities(&self, substring: &str) -> MemoryResult<Vec<memory_core::model::EntityRecord>> {
                self.inner.search_entities(substring).await
            }
            async fn link_memory_to_entity(&self, entity_id: &str, memory_id: &str) -> MemoryResult<()> {
                self.inner.link_memory_to_entity(entity_id, memory_id).await
            }
            async fn close(&self) -> MemoryResult<()> {
                self.inner.close().await
            }
        }

        let store = Arc::new(FailingUpsertStore {
            inner: InMemoryStore::new(),
        });
        let extractor = Arc::new(FakeExtractor {
            items: vec![
                CapturedItem {
                    content: "poison pill".to_string(),
                    memory_type: Some(MemoryType::Fact),
                    confidence: 0.9,
                    tags: vec![],
                },
                CapturedItem {
                    content: "clean item".to_string(),
                    memory_type: Some(MemoryType::Fact),
                    confidence: 0.9,
                    tags: vec![],
                },
            ],
        });
        let embedder = Arc::new(FakeEmbedder::new(&[
            ("poison pill", vec![1.0, 0.0, 0.0]),
            ("clean item", vec![0.0, 1.0, 0.0]),
        ]));
        let pipeline = CapturePipeline::new(
            store,
            embedder,
            extractor,
            Arc::new(RuleBasedClassifier::new()),
            Arc::new(Metrics::new()),
            CaptureConfig::default(),
        );

        let report = pipeline.capture_turn(&request("u", "a")).await.unwrap();
        assert_eq!(report.store_errors, 1);
        assert_eq!(report.stored, 1);
    }
}
