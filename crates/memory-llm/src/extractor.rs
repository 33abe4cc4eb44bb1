//! LLM-backed extraction of salient facts/rules/procedures from a
//! dialogue turn. Extractor failures propagate to the caller per spec —
//! unlike the conflict detector and reasoner, this is not a "degrade
//! silently" helper, since a failed extraction means there is simply
//! nothing to capture from this turn.

use async_trait::async_trait;
use serde::Deserialize;

use memory_core::errors::LlmError;
use memory_core::model::MemoryType;
use memory_core::traits::{CapturedItem, MemoryExtractor};

use crate::chat::ChatClient;

#[derive(Deserialize)]
struct RawCapturedItem {
    content: String,
    #[serde(default)]
    memory_type: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    tags: Vec<String>,
}

fn default_confidence() -> f64 {
    0.8
}

pub struct HttpMemoryExtractor {
    chat: ChatClient,
}

impl HttpMemoryExtractor {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }

    fn build_prompt(user_message: &str, assistant_message: &str) -> String {
        format!(
            "Extract durable facts, rules, procedures, episodes, or \
             preferences worth remembering from this exchange. Respond \
             with a JSON array of objects, each with \"content\", \
             optional \"memory_type\" (one of rule/fact/episode/\
             procedure/preference), \"confidence\" (0-1), and \"tags\" \
             (array of strings). Respond with [] if nothing is worth \
             keeping.\n\nUser: {user_message}\nAssistant: {assistant_message}"
        )
    }
}

#[async_trait]
impl MemoryExtractor for HttpMemoryExtractor {
    async fn extract(
        &self,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<Vec<CapturedItem>, LlmError> {
        let prompt = Self::build_prompt(user_message, assistant_message);
        let response = self.chat.complete(&prompt).await?;
        parse_captured_items(&response)
    }
}

/// Extracts the JSON array from a raw LLM response, tolerating markdown
/// code fences around it, and maps it onto `CapturedItem`.
fn parse_captured_items(raw: &str) -> Result<Vec<CapturedItem>, LlmError> {
    let json_slice = extract_json_array(raw)
        .ok_or_else(|| LlmError::MalformedResponse("no JSON array found in response".to_string()))?;
    let raw_items: Vec<RawCapturedItem> = serde_json::from_str(json_slice)
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    Ok(raw_items
        .into_iter()
        .map(|item| CapturedItem {
            content: item.content,
            memory_type: item
                .memory_type
                .and_then(|s| s.parse::<MemoryType>().ok()),
            confidence: item.confidence,
            tags: item.tags,
        })
        .collect())
}

fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}
