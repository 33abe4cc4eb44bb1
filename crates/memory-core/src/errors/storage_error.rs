/// Errors surfaced by a `MemoryStore` implementation.
///
/// Mirrors the split the engine makes between a clean `NotFound` (which
/// callers branch on) and everything else collapsing into an opaque
/// transport/serialization failure.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record not found: {id}")]
    NotFound { id: String },

    #[error("request to vector store timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("vector store transport error: {0}")]
    Transport(String),

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("operation cancelled")]
    Cancelled,
}
