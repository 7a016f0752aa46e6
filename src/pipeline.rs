use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::PipelineError;
use crate::llm::CompletionBackend;
use crate::models::{approximate_tokens, Chunk, ChunkExtraction, KnownIds, ProcessingOutcome};
use crate::stages::{
    chunk_turns, compress_for_scoring, execute_extraction, extract_chunk,
    merge_chunk_extractions, parse_turns, score_insights, ChunkerConfig, CompressionConfig,
    ExtractionConfig, MergeConfig,
};

/// Configuration for the whole processing pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Transcripts estimated below this many tokens take the single-call path
    pub simple_mode_max_tokens: usize,
    pub chunker: ChunkerConfig,
    pub extraction: ExtractionConfig,
    pub merge: MergeConfig,
    pub compression: CompressionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            simple_mode_max_tokens: 6000,
            chunker: ChunkerConfig::default(),
            extraction: ExtractionConfig::default(),
            merge: MergeConfig::default(),
            compression: CompressionConfig::default(),
        }
    }
}

/// Chunks and their extractions, kept for the indexing stage
#[derive(Debug, Clone)]
pub struct ChunkArtifacts {
    pub chunks: Vec<Chunk>,
    pub extractions: Vec<ChunkExtraction>,
}

/// Outcome plus the intermediate artifacts that produced it
#[derive(Debug, Clone)]
pub struct ProcessedInterview {
    pub outcome: ProcessingOutcome,
    pub artifacts: ChunkArtifacts,
}

/// Routes each transcript to the simple or hierarchical path
///
/// A pipeline holds no per-transcript state, so one instance can process any
/// number of transcripts concurrently.
pub struct Pipeline<B> {
    backend: B,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl<B: CompletionBackend> Pipeline<B> {
    pub fn new(backend: B, config: PipelineConfig) -> Self {
        Self {
            backend,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop chunk processing once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn process_interview(
        &self,
        interview_id: &str,
        transcript: &str,
        product_summary: &str,
    ) -> Result<ProcessingOutcome, PipelineError> {
        self.process_interview_with_artifacts(interview_id, transcript, product_summary)
            .await
            .map(|processed| processed.outcome)
    }

    pub async fn process_interview_with_artifacts(
        &self,
        interview_id: &str,
        transcript: &str,
        product_summary: &str,
    ) -> Result<ProcessedInterview, PipelineError> {
        if transcript.trim().is_empty() {
            return Err(PipelineError::EmptyTranscript);
        }
        self.config.chunker.validate()?;

        let token_estimate = approximate_tokens(transcript);
        if token_estimate < self.config.simple_mode_max_tokens {
            info!(
                "Interview {}: ~{} tokens, simple mode",
                interview_id, token_estimate
            );
            self.process_simple(interview_id, transcript, product_summary, token_estimate)
                .await
        } else {
            info!(
                "Interview {}: ~{} tokens, hierarchical mode",
                interview_id, token_estimate
            );
            self.process_hierarchical(interview_id, transcript, product_summary, token_estimate)
                .await
        }
    }

    async fn process_simple(
        &self,
        interview_id: &str,
        transcript: &str,
        product_summary: &str,
        token_estimate: usize,
    ) -> Result<ProcessedInterview, PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                completed: 0,
                total: 1,
            });
        }

        let extraction = extract_chunk(
            &self.backend,
            product_summary,
            &KnownIds::default(),
            transcript,
            0,
            &self.config.extraction,
        )
        .await
        .map_err(|failure| PipelineError::Extraction(failure.error))?;

        let scoring = score_insights(&self.backend, product_summary, &extraction)
            .await
            .map_err(PipelineError::Scoring)?;

        let artifacts = ChunkArtifacts {
            chunks: vec![whole_transcript_chunk(transcript)],
            extractions: vec![extraction.clone()],
        };

        Ok(ProcessedInterview {
            outcome: ProcessingOutcome::Simple {
                interview_id: interview_id.to_string(),
                token_estimate,
                extraction,
                scoring,
            },
            artifacts,
        })
    }

    async fn process_hierarchical(
        &self,
        interview_id: &str,
        transcript: &str,
        product_summary: &str,
        token_estimate: usize,
    ) -> Result<ProcessedInterview, PipelineError> {
        let turns = parse_turns(transcript);
        let chunks = chunk_turns(&turns, &self.config.chunker)?;
        info!(
            "Interview {}: {} turns in {} chunks",
            interview_id,
            turns.len(),
            chunks.len()
        );

        let extracted = execute_extraction(
            &self.backend,
            product_summary,
            &chunks,
            &self.config.extraction,
            &self.cancel,
        )
        .await?;

        let mut merged =
            merge_chunk_extractions(&extracted.extractions, token_estimate, &self.config.merge);
        let compressed = compress_for_scoring(&merged, product_summary, &self.config.compression);
        merged.stats.compression_ratio = Some(compressed.meta.compression_ratio);

        let scoring = score_insights(&self.backend, product_summary, &compressed)
            .await
            .map_err(PipelineError::Scoring)?;

        Ok(ProcessedInterview {
            outcome: ProcessingOutcome::Hierarchical {
                interview_id: interview_id.to_string(),
                token_estimate,
                chunks: chunks.len(),
                merged,
                compressed,
                scoring,
            },
            artifacts: ChunkArtifacts {
                chunks,
                extractions: extracted.extractions,
            },
        })
    }
}

/// The single chunk a simple-mode transcript is indexed as
fn whole_transcript_chunk(transcript: &str) -> Chunk {
    let mut speaker_stats: BTreeMap<String, usize> = BTreeMap::new();
    for turn in parse_turns(transcript) {
        *speaker_stats.entry(turn.speaker.clone()).or_default() += approximate_tokens(&turn.render());
    }
    Chunk {
        index: 0,
        text: transcript.to_string(),
        char_start: 0,
        char_end: transcript.chars().count(),
        speaker_stats,
    }
}
