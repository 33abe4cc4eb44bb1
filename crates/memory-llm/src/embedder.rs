//! HTTP client for the embedding service: a model name plus either a
//! single text or a batch, returning one vector per input in input
//! order. Float64 response payloads are converted to float32 on the
//! way in. `embed_batch` dispatches one single-text request per input,
//! fanned out across up to `max_batch_workers` workers through
//! `memory_net`'s bounded-parallel batcher; each request is retried
//! through the backoff wrapper independently.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use memory_core::errors::EmbeddingError;
use memory_core::model::Vector;
use memory_core::traits::Embedder;
use memory_net::retry::{is_retryable_status, parse_retry_after_secs, retry_with_backoff, AttemptFailure, RetryError};

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    pub url: String,
    pub model: String,
    pub dimension: usize,
    pub max_batch_workers: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponseItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f64>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedResponseItem>,
}

/// One HTTP call to the embedding service for up to `texts.len()`
/// inputs, retried through `memory_net::retry`. Free function (rather
/// than a method borrowing `&HttpEmbedder`) so it can be called from
/// inside the `'static` closures `bounded_parallel_map` spawns.
async fn request_batch(
    client: &reqwest::Client,
    config: &HttpEmbedderConfig,
    texts: &[String],
) -> Result<Vec<Vector>, EmbeddingError> {
    let cancel = CancellationToken::new();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

    let response = retry_with_backoff(&cancel, |_attempt| {
        let refs = refs.clone();
        async {
            let body = EmbedRequest {
                model: &config.model,
                input: refs,
            };
            let result = tokio::time::timeout(
                std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS),
                client.post(&config.url).json(&body).send(),
            )
            .await;

            let response = match result {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => return Err(AttemptFailure::transient(e.to_string())),
                Err(_) => return Err(AttemptFailure::transient("embedding request timed out")),
            };

            let status = response.status();
            if !status.is_success() {
                let retry_after = parse_retry_after_secs(
                    response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok()),
                );
                let body_text = response.text().await.unwrap_or_default();
                if is_retryable_status(status.as_u16()) {
                    return Err(AttemptFailure {
                        message: format!("{status}: {body_text}"),
                        retryable: true,
                        retry_after,
                    });
                }
                return Err(AttemptFailure::permanent(format!("{status}: {body_text}")));
            }

            response
                .json::<EmbedResponse>()
                .await
                .map_err(|e| AttemptFailure::permanent(e.to_string()))
        }
    })
    .await;

    let parsed = match response {
        Ok(parsed) => parsed,
        Err(RetryError::Cancelled) => {
            return Err(EmbeddingError::Cancelled);
        }
        Err(RetryError::Exhausted(msg)) => {
            return Err(EmbeddingError::Transient(msg));
        }
    };

    if parsed.data.len() != texts.len() {
        return Err(EmbeddingError::ShapeMismatch {
            expected: texts.len(),
            actual: parsed.data.len(),
        });
    }

    // Re-sort by explicit index if the service returned one, since
    // the contract allows either positional or indexed responses.
    let mut items = parsed.data;
    if items.iter().all(|item| item.index.is_some()) {
        items.sort_by_key(|item| item.index.unwrap_or(0));
    }

    Ok(items
        .into_iter()
        .map(|item| Vector::new(item.embedding.into_iter().map(|v| v as f32).collect()))
        .collect())
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    config: HttpEmbedderConfig,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_one(&self, text: &str) -> Result<Vector, EmbeddingError> {
        let mut vectors = request_batch(&self.client, &self.config, std::slice::from_ref(&text.to_string())).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::ShapeMismatch { expected: 1, actual: 0 })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // One single-text request per input, fanned out across up to
        // `max_batch_workers` workers. On the first failure the rest are
        // cancelled, matching `bounded_parallel_map`'s first-error,
        // order-preserving-by-slot semantics.
        let client = self.client.clone();
        let config = self.config.clone();
        let workers = self.config.max_batch_workers.max(1);

        memory_net::bounded_parallel_map(texts.to_vec(), workers, move |text| {
            let client = client.clone();
            let config = config.clone();
            async move {
                let mut vectors = request_batch(&client, &config, std::slice::from_ref(&text)).await?;
                vectors
                    .pop()
                    .ok_or_else(|| EmbeddingError::ShapeMismatch { expected: 1, actual: 0 })
            }
        })
        .await
        .map_err(|(_, err)| err)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_carries_dimension_through() {
        let embedder = HttpEmbedder::new(HttpEmbedderConfig {
            url: "http://localhost/embed".into(),
            model: "test-model".into(),
            dimension: 768,
            max_batch_workers: 8,
        });
        assert_eq!(embedder.dimension(), 768);
    }
}
