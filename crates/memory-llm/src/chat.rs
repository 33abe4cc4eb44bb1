//! Shared low-level plumbing for talking to the LLM chat service: a
//! single POST-prompt-get-text call wrapped in the retry policy. The
//! extractor, conflict detector, and reasoner all build their specific
//! prompts/parsing on top of this.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use memory_core::errors::LlmError;
use memory_net::retry::{is_retryable_status, parse_retry_after_secs, retry_with_backoff, AttemptFailure, RetryError};

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub url: String,
    pub model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

pub struct ChatClient {
    client: reqwest::Client,
    config: ChatClientConfig,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let cancel = CancellationToken::new();
        let outcome = retry_with_backoff(&cancel, |_attempt| async {
            let body = ChatRequest {
                model: &self.config.model,
                prompt,
            };
            let result = tokio::time::timeout(
                std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS),
                self.client.post(&self.config.url).json(&body).send(),
            )
            .await;

            let response = match result {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => return Err(AttemptFailure::transient(e.to_string())),
                Err(_) => return Err(AttemptFailure::transient("llm request timed out")),
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
                .json::<ChatResponse>()
                .await
                .map(|r| r.response)
                .map_err(|e| AttemptFailure::permanent(e.to_string()))
        })
        .await;

        match outcome {
            Ok(text) => Ok(text),
            Err(RetryError::Cancelled) => Err(LlmError::Cancelled),
            Err(RetryError::Exhausted(msg)) => Err(LlmError::Transient(msg)),
        }
    }
}
