use serde::{Deserialize, Serialize};

/// Embedding service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub url: String,
    pub model: String,
    pub dimension: usize,
    pub request_timeout_secs: u64,
    pub max_batch_workers: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8081/embed".to_string(),
            model: "text-embedding-default".to_string(),
            dimension: 768,
            request_timeout_secs: 30,
            max_batch_workers: 8,
        }
    }
}
