use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{EmbeddingError, LlmError};
use crate::model::{MemoryType, Vector};

/// HTTP client contract for the embedding service: a model name plus
/// either a single text or a batch, returning one vector per input in
/// input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_one(&self, text: &str) -> Result<Vector, EmbeddingError>;

    /// Batch embed, preserving input order. The default implementation
    /// embeds sequentially; HTTP-backed implementations override this
    /// with the bounded-parallel batcher from `memory-net`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_one(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize;
}

/// One item captured by the extractor from a dialogue turn or markdown
/// chunk, before classification and dedup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedItem {
    pub content: String,
    pub memory_type: Option<MemoryType>,
    pub confidence: f64,
    pub tags: Vec<String>,
}

/// LLM-backed extraction of salient facts/rules/procedures from a
/// dialogue turn or document chunk. Extractor failures propagate; the
/// caller is responsible for swallowing them if desired.
#[async_trait]
pub trait MemoryExtractor: Send + Sync {
    async fn extract(
        &self,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<Vec<CapturedItem>, LlmError>;
}

/// Local rule-based classifier assigning a `MemoryType` to a captured
/// item that arrived without one.
pub trait Classifier: Send + Sync {
    fn classify(&self, content: &str) -> MemoryType;
}

/// Outcome of asking the conflict detector about a candidate memory
/// against the top-N existing candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictVerdict {
    pub contradicts: bool,
    pub reason: Option<String>,
}

/// External LLM-backed contradiction check. Degrades silently: any
/// failure is non-fatal and the item is stored as if no contradiction
/// were found.
#[async_trait]
pub trait ConflictDetector: Send + Sync {
    async fn check(
        &self,
        candidate: &str,
        existing: &[String],
    ) -> Result<ConflictVerdict, LlmError>;
}

/// External LLM-backed re-ranker applied to the top-M candidates before
/// formatting. On failure, callers preserve the ranker's order.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Returns a re-ordering of `0..candidates.len()` indices.
    async fn rerank(&self, query: &str, candidates: &[String]) -> Result<Vec<usize>, LlmError>;
}
