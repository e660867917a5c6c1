/// Result type alias used across every stage of the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The error taxonomy shared by C1-C8. Every stage boundary converts its
/// internal failures into one of these variants before surfacing a
/// structured result record; nothing escapes as a raw panic or exception.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Network failure, 5xx, or body-extraction failure. Safe to retry locally.
    #[error("transient failure: {0}")]
    Transient(String),

    /// LLM provider signaled rate limiting or quota exhaustion. Escalates to
    /// a global cooldown and the retry queue.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// A group could not be neutralized because too few valid sources
    /// remained after filtering. Not an error condition, just a skip.
    #[error("insufficient sources for group {group_id}")]
    InsufficientSources { group_id: i64 },

    /// The LLM response did not conform to the expected JSON schema.
    #[error("invalid payload for group {group_id}: {reason}")]
    InvalidPayload { group_id: i64, reason: String },

    /// A batched store write failed outright. The batch is dropped and the
    /// caller increments its failure counters; processing continues.
    #[error("store write failure: {0}")]
    StoreWriteFailure(String),

    /// Misconfiguration severe enough to abort the run: missing API key,
    /// unreadable outlet registry, unreachable database at startup.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Classify an LLM provider error by substring match, per the contract
    /// in the external LLM interface: `"429" | "rate_limit" |
    /// "insufficient_quota" | "context_length_exceeded"`.
    pub fn classify_llm_error(message: &str) -> LlmErrorClass {
        let lower = message.to_lowercase();
        if lower.contains("context_length_exceeded") {
            LlmErrorClass::ContextLengthExceeded
        } else if lower.contains("429")
            || lower.contains("rate_limit")
            || lower.contains("insufficient_quota")
        {
            LlmErrorClass::RateLimited
        } else {
            LlmErrorClass::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorClass {
    RateLimited,
    ContextLengthExceeded,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rate_limit_substrings() {
        assert_eq!(
            PipelineError::classify_llm_error("HTTP 429 Too Many Requests"),
            LlmErrorClass::RateLimited
        );
        assert_eq!(
            PipelineError::classify_llm_error("Error: insufficient_quota"),
            LlmErrorClass::RateLimited
        );
        assert_eq!(
            PipelineError::classify_llm_error("rate_limit_exceeded"),
            LlmErrorClass::RateLimited
        );
    }

    #[test]
    fn classifies_context_length() {
        assert_eq!(
            PipelineError::classify_llm_error("this model's maximum context_length_exceeded"),
            LlmErrorClass::ContextLengthExceeded
        );
    }

    #[test]
    fn classifies_other() {
        assert_eq!(
            PipelineError::classify_llm_error("internal server error"),
            LlmErrorClass::Other
        );
    }
}
