use std::time::Duration;

use thiserror::Error;

/// Failure of a call to an external capability (completion or embedding)
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("response contained no usable content")]
    EmptyResponse,
    #[error("circuit breaker open, call not attempted")]
    CircuitOpen,
}

impl LlmError {
    /// Whether retrying the same call might succeed
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Timeout(_) | LlmError::RateLimited(_) | LlmError::Transport(_) => true,
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::Decode(_) | LlmError::EmptyResponse | LlmError::CircuitOpen => false,
        }
    }
}

/// The capability answered, but the answer could not be used
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("no JSON object found in response")]
    NoJson,
    #[error("response JSON did not match schema: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("response failed validation: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Top-level failures of one interview processing attempt
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transcript is empty")]
    EmptyTranscript,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("chunk {chunk_index} extraction failed: {source}")]
    ChunkExtraction {
        chunk_index: usize,
        #[source]
        source: ResponseError,
    },
    #[error("extraction failed: {0}")]
    Extraction(#[source] ResponseError),
    #[error("scoring failed: {0}")]
    Scoring(#[source] ResponseError),
    #[error("cancelled after {completed} of {total} chunks")]
    Cancelled { completed: usize, total: usize },
}

/// Failure of the chunk persistence collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(LlmError::RateLimited("slow down".into()).is_transient());
        assert!(LlmError::Api { status: 503, body: String::new() }.is_transient());
        assert!(!LlmError::Api { status: 400, body: String::new() }.is_transient());
        assert!(!LlmError::CircuitOpen.is_transient());
        assert!(!LlmError::Decode("missing field `content`".into()).is_transient());
    }

    #[test]
    fn test_invalid_message_joins_errors() {
        let err = ResponseError::Invalid(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "response failed validation: a; b");
    }
}
