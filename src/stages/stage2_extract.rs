use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, ResponseError};
use crate::llm::{
    build_chunk_prompt, extract_json_object, validate_extraction, CompletionBackend, ResponseFormat,
    ValidationConfig,
};
use crate::models::{Chunk, ChunkExtraction, ExtractionMeta, ExtractionPayload, KnownIds};

/// What to do when a chunk's extraction cannot be obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Substitute an empty extraction and continue with the next chunk
    SkipChunk,
    /// Fail the whole transcript
    Abort,
}

/// Configuration for the extraction stage
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub failure_policy: FailurePolicy,
    /// Re-asks after an unusable (unparseable or invalid) response
    pub validation_retries: u32,
    pub validation: ValidationConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::SkipChunk,
            validation_retries: 1,
            validation: ValidationConfig::default(),
        }
    }
}

/// A chunk whose extraction could not be obtained
#[derive(Debug)]
pub struct ChunkFailure {
    pub error: ResponseError,
    pub attempts: u32,
}

/// Result of the extraction stage
#[derive(Debug)]
pub struct ExtractionStageResult {
    /// One extraction per chunk, in chunk order
    pub extractions: Vec<ChunkExtraction>,
    /// Ids known after the last chunk
    pub known_ids: KnownIds,
    /// Chunks replaced by an empty extraction
    pub failures: usize,
}

/// Execute the extraction stage over all chunks
///
/// Chunks are processed strictly one after another: each call sees the ids
/// minted by every earlier chunk. The known-id set is local to this call, so
/// concurrent transcripts never share a namespace. Cancellation is checked
/// before each chunk call; an in-flight call is allowed to finish.
pub async fn execute_extraction<B: CompletionBackend>(
    backend: &B,
    product_summary: &str,
    chunks: &[Chunk],
    config: &ExtractionConfig,
    cancel: &CancellationToken,
) -> Result<ExtractionStageResult, PipelineError> {
    let mut known_ids = KnownIds::default();
    let mut extractions = Vec::with_capacity(chunks.len());
    let mut failures = 0;

    info!("Extraction: processing {} chunks sequentially", chunks.len());

    for chunk in chunks {
        if cancel.is_cancelled() {
            warn!(
                "Extraction cancelled before chunk {} ({} of {} done)",
                chunk.index,
                extractions.len(),
                chunks.len()
            );
            return Err(PipelineError::Cancelled {
                completed: extractions.len(),
                total: chunks.len(),
            });
        }

        let extraction = match extract_chunk(
            backend,
            product_summary,
            &known_ids,
            &chunk.text,
            chunk.index,
            config,
        )
        .await
        {
            Ok(extraction) => {
                info!(
                    "Chunk {}: {} pains, {} features, {} needs, {} quotes",
                    chunk.index,
                    extraction.pains.len(),
                    extraction.feature_requests.len(),
                    extraction.needs.len(),
                    extraction.quotes.len()
                );
                extraction
            }
            Err(failure) => match config.failure_policy {
                FailurePolicy::Abort => {
                    return Err(PipelineError::ChunkExtraction {
                        chunk_index: chunk.index,
                        source: failure.error,
                    });
                }
                FailurePolicy::SkipChunk => {
                    warn!(
                        "Chunk {} failed after {} attempts, continuing with empty extraction: {}",
                        chunk.index, failure.attempts, failure.error
                    );
                    failures += 1;
                    ChunkExtraction::skipped(chunk.index, failure.error.to_string(), failure.attempts)
                }
            },
        };

        known_ids.absorb(&extraction);
        extractions.push(extraction);
    }

    Ok(ExtractionStageResult {
        extractions,
        known_ids,
        failures,
    })
}

/// Extract and validate one piece of text
///
/// Unusable responses are re-asked up to `validation_retries` times. Capability
/// errors are returned at once; transport retries belong to the backend.
pub async fn extract_chunk<B: CompletionBackend>(
    backend: &B,
    product_summary: &str,
    known_ids: &KnownIds,
    text: &str,
    chunk_index: usize,
    config: &ExtractionConfig,
) -> Result<ChunkExtraction, ChunkFailure> {
    let prompt = build_chunk_prompt(product_summary, known_ids, text, chunk_index);
    debug!(
        "Chunk {}: prompt is {} chars, {} known ids",
        chunk_index,
        prompt.char_len(),
        known_ids.pains.len() + known_ids.features.len()
    );

    let mut attempts = 0;
    loop {
        attempts += 1;
        let response = match backend.complete(&prompt, ResponseFormat::Json).await {
            Ok(response) => response,
            Err(e) => {
                return Err(ChunkFailure {
                    error: ResponseError::Llm(e),
                    attempts,
                });
            }
        };

        match parse_extraction(&response, text, chunk_index, &config.validation) {
            Ok((payload, dropped_evidence)) => {
                let meta = ExtractionMeta {
                    skipped: false,
                    error: None,
                    attempts,
                    dropped_evidence,
                };
                return Ok(ChunkExtraction::from_payload(chunk_index, payload, meta));
            }
            Err(error) if attempts > config.validation_retries => {
                return Err(ChunkFailure { error, attempts });
            }
            Err(error) => {
                warn!(
                    "Chunk {}: unusable response (attempt {}), asking again: {}",
                    chunk_index, attempts, error
                );
            }
        }
    }
}

/// Turn a raw response into a validated payload and the count of dropped evidence
fn parse_extraction(
    response: &str,
    source_text: &str,
    chunk_index: usize,
    config: &ValidationConfig,
) -> Result<(ExtractionPayload, usize), ResponseError> {
    let value = extract_json_object(response).ok_or(ResponseError::NoJson)?;
    let mut payload: ExtractionPayload = serde_json::from_value(value)?;

    let validation = validate_extraction(&mut payload, source_text, chunk_index, config);
    if !validation.is_valid {
        return Err(ResponseError::Invalid(validation.errors));
    }
    Ok((payload, validation.dropped_evidence))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::scripted::ScriptedBackend;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            text: text.to_string(),
            char_start: 0,
            char_end: text.chars().count(),
            speaker_stats: BTreeMap::new(),
        }
    }

    fn chunks() -> Vec<Chunk> {
        vec![
            chunk(0, "Bob: It's slow to sync."),
            chunk(1, "Bob: Sync is still slow. I want offline mode."),
            chunk(2, "Alice: Exporting to CSV breaks."),
        ]
    }

    fn pain_json(id: &str, evidence: &str) -> String {
        format!(
            r#"{{"pains": [{{"id": "{}", "description": "Sync is slow", "severity": 3, "evidence": ["{}"]}}], "feature_requests": [], "needs": [], "quotes": []}}"#,
            id, evidence
        )
    }

    #[tokio::test]
    async fn test_extract_chunk_from_fenced_response() {
        let backend = ScriptedBackend::new(|_, _| {
            Ok(format!("Sure!\n```json\n{}\n```", pain_json("slow-sync", "It's slow to sync.")))
        });

        let extraction = extract_chunk(
            &backend,
            "Sync tool",
            &KnownIds::default(),
            "Bob: It's slow to sync.",
            0,
            &ExtractionConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(extraction.pains[0].id, "slow-sync");
        assert_eq!(extraction.meta.attempts, 1);
        assert!(!extraction.meta.skipped);
    }

    #[tokio::test]
    async fn test_bracketed_prose_before_payload() {
        let backend = ScriptedBackend::new(|_, _| {
            Ok(format!(
                "Findings for slice [1]:\n{}",
                pain_json("slow-sync", "It's slow to sync.")
            ))
        });

        let extraction = extract_chunk(
            &backend,
            "Sync tool",
            &KnownIds::default(),
            "Bob: It's slow to sync.",
            0,
            &ExtractionConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(extraction.pains[0].id, "slow-sync");
        assert_eq!(extraction.meta.attempts, 1);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_unusable_response_is_asked_again() {
        let backend = ScriptedBackend::new(|_, call| {
            if call == 0 {
                Ok("I'm not sure what you mean.".to_string())
            } else {
                Ok(pain_json("slow-sync", "It's slow to sync."))
            }
        });

        let extraction = extract_chunk(
            &backend,
            "Sync tool",
            &KnownIds::default(),
            "Bob: It's slow to sync.",
            0,
            &ExtractionConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(extraction.meta.attempts, 2);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalid_response_fails_after_retries() {
        let backend = ScriptedBackend::new(|_, _| {
            Ok(r#"{"pains": [{"id": "x", "description": "d", "severity": 9}]}"#.to_string())
        });

        let failure = extract_chunk(
            &backend,
            "Sync tool",
            &KnownIds::default(),
            "text",
            0,
            &ExtractionConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(failure.error, ResponseError::Invalid(_)));
        assert_eq!(failure.attempts, 2);
    }

    #[tokio::test]
    async fn test_capability_error_is_not_reasked() {
        let backend = ScriptedBackend::new(|_, _| Err(LlmError::CircuitOpen));

        let failure = extract_chunk(
            &backend,
            "Sync tool",
            &KnownIds::default(),
            "text",
            0,
            &ExtractionConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(failure.error, ResponseError::Llm(LlmError::CircuitOpen)));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_known_ids_are_threaded_between_chunks() {
        let backend = ScriptedBackend::new(|prompt, _| {
            if prompt.user.contains("Transcript slice 1") {
                Ok(pain_json("slow-sync", "It's slow to sync."))
            } else if prompt.user.contains("Transcript slice 2") {
                Ok(r#"{"feature_requests": [{"id": "offline-mode", "description": "Work offline", "rationale": "travel", "evidence": ["I want offline mode."]}]}"#.to_string())
            } else {
                Ok("{}".to_string())
            }
        });

        let result = execute_extraction(
            &backend,
            "Sync tool",
            &chunks(),
            &ExtractionConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].user.contains("(none yet)"));
        assert!(prompts[1].user.contains("Pains: slow-sync"));
        assert!(prompts[2].user.contains("Pains: slow-sync"));
        assert!(prompts[2].user.contains("Features: offline-mode"));

        assert_eq!(result.extractions.len(), 3);
        assert_eq!(result.known_ids.pains, vec!["slow-sync"]);
        assert_eq!(result.known_ids.features, vec!["offline-mode"]);
        assert_eq!(result.failures, 0);
    }

    #[tokio::test]
    async fn test_skip_policy_continues_past_bad_chunk() {
        let backend = ScriptedBackend::new(|prompt, _| {
            if prompt.user.contains("Transcript slice 2") {
                Ok("not json at all".to_string())
            } else {
                Ok("{}".to_string())
            }
        });

        let result = execute_extraction(
            &backend,
            "Sync tool",
            &chunks(),
            &ExtractionConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.failures, 1);
        assert_eq!(result.extractions.len(), 3);
        assert!(result.extractions[1].meta.skipped);
        assert!(result.extractions[1].is_empty());
        assert!(!result.extractions[2].meta.skipped);
        // chunk 1 asked twice, the others once
        assert_eq!(backend.calls(), 4);
    }

    #[tokio::test]
    async fn test_abort_policy_fails_transcript() {
        let backend = ScriptedBackend::new(|prompt, _| {
            if prompt.user.contains("Transcript slice 2") {
                Err(LlmError::Timeout(std::time::Duration::from_secs(1)))
            } else {
                Ok("{}".to_string())
            }
        });
        let config = ExtractionConfig {
            failure_policy: FailurePolicy::Abort,
            ..Default::default()
        };

        let err = execute_extraction(&backend, "Sync tool", &chunks(), &config, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::ChunkExtraction { chunk_index: 1, .. }));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_stops_new_chunk_calls() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let backend = ScriptedBackend::new(move |_, _| {
            // Cancelled while the first call is in flight; the call still completes.
            trigger.cancel();
            Ok("{}".to_string())
        });

        let err = execute_extraction(
            &backend,
            "Sync tool",
            &chunks(),
            &ExtractionConfig::default(),
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled { completed: 1, total: 3 }));
        assert_eq!(backend.calls(), 1);
    }
}
