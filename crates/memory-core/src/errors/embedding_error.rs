/// Errors from the embedding service client.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request transient failure: {0}")]
    Transient(String),

    #[error("embedding request permanently rejected: {0}")]
    Permanent(String),

    #[error("embedding request cancelled")]
    Cancelled,

    #[error("embedding response shape mismatch: expected {expected} vectors, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}
