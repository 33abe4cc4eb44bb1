//! External LLM-backed contradiction check against the top-N existing
//! candidates. This helper degrades silently per spec: callers in
//! `memory-capture` treat any `Err` from `check` as "no signal" and
//! store the item anyway, so this client simply surfaces failures
//! rather than swallowing them itself — that policy belongs to the
//! caller, matching the teacher's "polymorphism over a small capability
//! set" design note.

use async_trait::async_trait;
use serde::Deserialize;

use memory_core::errors::LlmError;
use memory_core::traits::{ConflictDetector, ConflictVerdict};

use crate::chat::ChatClient;

#[derive(Deserialize)]
struct RawVerdict {
    contradicts: bool,
    #[serde(default)]
    reason: Option<String>,
}

pub struct HttpConflictDetector {
    chat: ChatClient,
}

impl HttpConflictDetector {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }

    fn build_prompt(candidate: &str, existing: &[String]) -> String {
        let existing_list = existing
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}. {e}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Does this candidate memory contradict any of the existing \
             memories below? Respond with a JSON object: \
             {{\"contradicts\": bool, \"reason\": string or null}}.\n\n\
             Candidate: {candidate}\n\nExisting:\n{existing_list}"
        )
    }
}

#[async_trait]
impl ConflictDetector for HttpConflictDetector {
    async fn check(&self, candidate: &str, existing: &[String]) -> Result<ConflictVerdict, LlmError> {
        if existing.is_empty() {
            return Ok(ConflictVerdict {
                contradicts: false,
                reason: None,
            });
        }
        let prompt = Self::build_prompt(candidate, existing);
        let response = self.chat.complete(&prompt).await?;
        let json_slice = extract_json_object(&response)
            .ok_or_else(|| LlmError::MalformedResponse("no JSON object found in response".to_string()))?;
        let raw: RawVerdict =
            serde_json::from_str(json_slice).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
        Ok(ConflictVerdict {
            contradicts: raw.contradicts,
            reason: raw.reason,
        })
    }
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}
