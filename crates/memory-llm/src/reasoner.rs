//! External LLM-backed re-ranker applied to the top-M candidates before
//! formatting. On failure (transport, timeout, malformed response, or a
//! response that isn't a valid permutation of the input indices), the
//! caller in `memory-context` preserves the ranker's original order.

use async_trait::async_trait;

use memory_core::errors::LlmError;
use memory_core::traits::Reasoner;

use crate::chat::ChatClient;

pub struct HttpReasoner {
    chat: ChatClient,
}

impl HttpReasoner {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }

    fn build_prompt(query: &str, candidates: &[String]) -> String {
        let numbered = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{i}. {c}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Given the query below, reorder these candidate memories \
             from most to least relevant. Respond with a JSON array of \
             their zero-based indices, a permutation of 0..{}.\n\n\
             Query: {query}\n\nCandidates:\n{numbered}",
            candidates.len()
        )
    }
}

#[async_trait]
impl Reasoner for HttpReasoner {
    async fn rerank(&self, query: &str, candidates: &[String]) -> Result<Vec<usize>, LlmError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = Self::build_prompt(query, candidates);
        let response = self.chat.complete(&prompt).await?;
        let json_slice = extract_json_array(&response)
            .ok_or_else(|| LlmError::MalformedResponse("no JSON array found in response".to_string()))?;
        let indices: Vec<usize> =
            serde_json::from_str(json_slice).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        if !is_permutation(&indices, candidates.len()) {
            return Err(LlmError::MalformedResponse(
                "reasoner response is not a permutation of the candidate indices".to_string(),
            ));
        }
        Ok(indices)
    }
}

fn is_permutation(indices: &[usize], len: usize) -> bool {
    if indices.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &i in indices {
        if i >= len || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    true
}

fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_permutation_is_accepted() {
        assert!(is_permutation(&[2, 0, 1], 3));
    }

    #[test]
    fn duplicate_index_is_rejected() {
        assert!(!is_permutation(&[0, 0, 1], 3));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        assert!(!is_permutation(&[0, 1, 5], 3));
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(!is_permutation(&[0, 1], 3));
    }

    #[test]
    fn empty_candidates_short_circuits_without_calling_chat() {
        assert!(is_permutation(&[], 0));
    }
}
