//! Local rule-based classifier assigning a `MemoryType` to a captured
//! item that arrived from the extractor without one. Pure keyword
//! heuristics — no network call, so it never fails and never blocks
//! the capture loop.

use memory_core::model::MemoryType;
use memory_core::traits::Classifier;

const RULE_MARKERS: &[&str] = &["always", "never", "must", "should not", "do not", "rule:"];
const PROCEDURE_MARKERS: &[&str] = &["step 1", "first,", "then ", "to do this", "procedure:"];
const PREFERENCE_MARKERS: &[&str] = &["i prefer", "i like", "i don't like", "i dislike", "favorite"];
const EPISODE_MARKERS: &[&str] = &["yesterday", "last time", "on ", "happened", "we discussed", "during the call"];

#[derive(Debug, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Classifier for RuleBasedClassifier {
    fn classify(&self, content: &str) -> MemoryType {
        let lower = content.to_ascii_lowercase();
        if RULE_MARKERS.iter().any(|m| lower.contains(m)) {
            return MemoryType::Rule;
        }
        if PROCEDURE_MARKERS.iter().any(|m| lower.contains(m)) {
            return MemoryType::Procedure;
        }
        if PREFERENCE_MARKERS.iter().any(|m| lower.contains(m)) {
            return MemoryType::Preference;
        }
        if EPISODE_MARKERS.iter().any(|m| lower.contains(m)) {
            return MemoryType::Episode;
        }
        MemoryType::Fact
    }
}
