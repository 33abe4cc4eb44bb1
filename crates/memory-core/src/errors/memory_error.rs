use super::{EmbeddingError, LlmError, StorageError};

/// Top-level error type for the memory engine.
///
/// All subsystem errors convert into this via `From` impls, and every
/// variant is one of the taxonomy categories from the error handling
/// design: NotFound, InvalidInput, Transient, Permanent, Cancelled,
/// Conflict.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("permanent failure: {0}")]
    Permanent(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("conflict detected: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MemoryError {
    /// Whether this error class is worth a caller retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MemoryError::Transient(_)
                | MemoryError::Storage(StorageError::Timeout { .. })
                | MemoryError::Storage(StorageError::Transport(_))
                | MemoryError::Embedding(EmbeddingError::Transient(_))
                | MemoryError::Llm(LlmError::Transient(_))
        )
    }

    /// A short category tag for user-visible rendering (CLI/server error
    /// bodies render this alongside the message, per the error handling
    /// design's "short category tag" requirement).
    pub fn category(&self) -> &'static str {
        match self {
            MemoryError::NotFound(_) | MemoryError::Storage(StorageError::NotFound { .. }) => {
                "not_found"
            }
            MemoryError::InvalidInput(_) => "invalid_input",
            MemoryError::Transient(_) => "transient",
            MemoryError::Permanent(_) => "permanent",
            MemoryError::Cancelled | MemoryError::Storage(StorageError::Cancelled) => "cancelled",
            MemoryError::Conflict(_) => "conflict",
            MemoryError::Storage(_) => "storage",
            MemoryError::Embedding(_) => "embedding",
            MemoryError::Llm(_) => "llm",
            MemoryError::Config(_) => "config",
            MemoryError::Serialization(_) => "serialization",
        }
    }
}

impl From<StorageError> for MemoryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id } => MemoryError::NotFound(id),
            StorageError::Cancelled => MemoryError::Cancelled,
            other => MemoryError::Storage(other),
        }
    }
}

/// Convenience alias used throughout the engine.
pub type MemoryResult<T> = Result<T, MemoryError>;
