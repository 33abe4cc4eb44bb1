/// Errors from the LLM chat service clients (extractor, classifier
/// fallback, conflict detector, reasoner, summarizer).
///
/// All LLM-backed helpers degrade gracefully on these — see
/// `MemoryError`'s `From<LlmError>` impl, which callers are expected to
/// swallow rather than propagate for non-essential helpers.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request transient failure: {0}")]
    Transient(String),

    #[error("llm request permanently rejected: {0}")]
    Permanent(String),

    #[error("llm request cancelled")]
    Cancelled,

    #[error("llm response could not be parsed: {0}")]
    MalformedResponse(String),
}
