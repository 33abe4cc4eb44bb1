//! Pre-turn context assembly (spec §4.6): embed the incoming message,
//! run a filtered similarity search, apply the multi-factor ranker, then
//! pack the result under a token budget. An optional external reasoner
//! may re-rank the top-M candidates first; on reasoner failure the
//! ranker's order is preserved.

use std::sync::Arc;

use memory_core::config::RankerConfig;
use memory_core::errors::{MemoryError, MemoryResult};
use memory_core::model::SearchFilters;
use memory_core::traits::{Embedder, MemoryStore, Reasoner};
use memory_metrics::Metrics;

/// Default number of nearest neighbors pulled from the store before
/// ranking, matching spec's "K ≈ 20".
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// How many of the top-ranked candidates are offered to the reasoner
/// for re-ranking. Candidates beyond this stay in their ranked
/// positions after the re-ranked prefix.
pub const DEFAULT_REASONER_TOP_M: usize = 8;

#[derive(Debug, Clone)]
pub struct ContextRequest {
    pub query: String,
    pub project: Option<String>,
    /// 0 means "use the assembler's configured default".
    pub token_budget: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub context_string: String,
    pub memory_count: usize,
    pub tokens_used: usize,
}

pub struct ContextAssembler {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    ranker_config: RankerConfig,
    reasoner: Option<Arc<dyn Reasoner>>,
    metrics: Arc<Metrics>,
    search_limit: usize,
    reasoner_top_m: usize,
    default_token_budget: usize,
}

impl ContextAssembler {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        ranker_config: RankerConfig,
        metrics: Arc<Metrics>,
        default_token_budget: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            ranker_config,
            reasoner: None,
            metrics,
            search_limit: DEFAULT_SEARCH_LIMIT,
            reasoner_top_m: DEFAULT_REASONER_TOP_M,
            default_token_budget,
        }
    }

    pub fn with_reasoner(mut self, reasoner: Arc<dyn Reasoner>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    pub async fn assemble_context(&self, request: &ContextRequest) -> MemoryResult<AssembledContext> {
        let vector = self
            .embedder
            .embed_one(&request.query)
            .await
            .map_err(MemoryError::from)?;

        let filters = match &request.project {
            Some(project) => SearchFilters::with_project(project.clone()),
            None => SearchFilters::default(),
        };

        let hits = self.store.search(&vector, self.search_limit, &filters).await?;
        let pairs = hits.into_iter().map(|s| (s.memory, s.score)).collect();
        let mut ranked = memory_ranker::rank(pairs, request.project.as_deref(), &self.ranker_config);

        if let Some(reasoner) = &self.reasoner {
            let m = self.reasoner_top_m.min(ranked.len());
            if m > 0 {
                let top_contents: Vec<String> = ranked[..m].iter().map(|r| r.memory.content.clone()).collect();
                match reasoner.rerank(&request.query, &top_contents).await {
                    Ok(order) => {
                        let mut prefix: Vec<Option<_>> = ranked.drain(..m).map(Some).collect();
                        let reordered: Vec<_> = order
                            .into_iter()
                            .map(|i| prefix[i].take().expect("reasoner returns a valid permutation"))
                            .collect();
                        ranked.splice(0..0, reordered);
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "reasoner unavailable, preserving ranker order");
                    }
                }
            }
        }

        let contents: Vec<String> = ranked.iter().map(|r| r.memory.content.clone()).collect();
        let budget = if request.token_budget == 0 {
            self.default_token_budget
        } else {
            request.token_budget
        };
        let (context_string, memory_count) = memory_format::format_with_budget(&contents, budget as i64);
        let tokens_used = memory_format::estimate_tokens(&context_string);

        self.metrics.record_recall();

        Ok(AssembledContext {
            context_string,
            memory_count,
            tokens_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use memory_core::errors::{EmbeddingError, LlmError};
    use memory_core::model::{MemoryRecord, MemoryType, Scope, Vector};
    use memory_storage::InMemoryStore;

    struct FixedEmbedder(Vector);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_one(&self, _text: &str) -> Result<Vector, EmbeddingError> {
            Ok(self.0.clone())
        }
        fn dimension(&self) -> usize {
            self.0.dimension()
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed_one(&self, _text: &str) -> Result<Vector, EmbeddingError> {
            Err(EmbeddingError::Transient("down".to_string()))
        }
        fn dimension(&self) -> usize {
            3
        }
    }

    struct ReversingReasoner;

    #[async_trait]
    impl Reasoner for ReversingReasoner {
        async fn rerank(&self, _query: &str, candidates: &[String]) -> Result<Vec<usize>, LlmError> {
            Ok((0..candidates.len()).rev().collect())
        }
    }

    struct FailingReasoner;

    #[async_trait]
    impl Reasoner for FailingReasoner {
        async fn rerank(&self, _query: &str, _candidates: &[String]) -> Result<Vec<usize>, LlmError> {
            Err(LlmError::Transient("reasoner down".to_string()))
        }
    }

    async fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        let mut a = MemoryRecord::new("alpha fact", MemoryType::Fact, Scope::Permanent);
        a.id = "a".to_string();
        let mut b = MemoryRecord::new("beta fact", MemoryType::Fact, Scope::Permanent);
        b.id = "b".to_string();
        store.upsert(&a, &Vector::new(vec![1.0, 0.0])).await.unwrap();
        store.upsert(&b, &Vector::new(vec![0.9, 0.1])).await.unwrap();
        store
    }

    #[tokio::test]
    async fn assembles_context_string_from_ranked_search_results() {
        let store = seeded_store().await;
        let assembler = ContextAssembler::new(
            store,
            Arc::new(FixedEmbedder(Vector::new(vec![1.0, 0.0]))),
            RankerConfig::default(),
            Arc::new(Metrics::new()),
            2000,
        );

        let result = assembler
            .assemble_context(&ContextRequest {
                query: "tell me about alpha".to_string(),
                project: None,
                token_budget: 0,
            })
            .await
            .unwrap();

        assert_eq!(result.memory_count, 2);
        assert!(result.context_string.contains("alpha fact"));
        assert!(result.tokens_used > 0);
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        let store = seeded_store().await;
        let assembler = ContextAssembler::new(
            store,
            Arc::new(FailingEmbedder),
            RankerConfig::default(),
            Arc::new(Metrics::new()),
            2000,
        );

        let result = assembler
            .assemble_context(&ContextRequest {
                query: "anything".to_string(),
                project: None,
                token_budget: 0,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn zero_budget_request_falls_back_to_assembler_default() {
        let store = seeded_store().await;
        let assembler = ContextAssembler::new(
            store,
            Arc::new(FixedEmbedder(Vector::new(vec![1.0, 0.0]))),
            RankerConfig::default(),
            Arc::new(Metrics::new()),
            10_000,
        );
        let result = assembler
            .assemble_context(&ContextRequest {
                query: "q".to_string(),
                project: None,
                token_budget: 0,
            })
            .await
            .unwrap();
        assert_eq!(result.memory_count, 2);
    }

    #[tokio::test]
    async fn reasoner_reorders_the_top_m_prefix() {
        let store = seeded_store().await;
        let assembler = ContextAssembler::new(
            store,
            Arc::new(FixedEmbedder(Vector::new(vec![1.0, 0.0]))),
            RankerConfig::default(),
            Arc::new(Metrics::new()),
            2000,
        )
        .with_reasoner(Arc::new(ReversingReasoner));

        let result = assembler
            .assemble_context(&ContextRequest {
                query: "q".to_string(),
                project: None,
                token_budget: 0,
            })
            .await
            .unwrap();
        // Both records still present; reversing a 2-element prefix just
        // swaps which one is numbered "1." in the formatted output.
        assert_eq!(result.memory_count, 2);
        assert!(result.context_string.contains("beta fact") || result.context_string.contains("alpha fact"));
    }

    #[tokio::test]
    async fn reasoner_failure_preserves_ranker_order() {
        let store = seeded_store().await;
        let assembler = ContextAssembler::new(
            store,
            Arc::new(FixedEmbedder(Vector::new(vec![1.0, 0.0]))),
            RankerConfig::default(),
            Arc::new(Metrics::new()),
            2000,
        )
        .with_reasoner(Arc::new(FailingReasoner));

        let result = assembler
            .assemble_context(&ContextRequest {
                query: "q".to_string(),
                project: None,
                token_budget: 0,
            })
            .await
            .unwrap();
        assert_eq!(result.memory_count, 2);
    }
}
