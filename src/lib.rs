pub mod error;
pub mod io;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod stages;

pub use error::{LlmError, PipelineError, ResponseError, StoreError};
pub use io::{read_transcript, write_outcome_json, ChunkStore, JsonlChunkStore, SummaryReport};
pub use llm::{
    AnthropicClient, AnthropicConfig, CompletionBackend, EmbeddingBackend, EmbeddingConfig,
    OpenAiEmbeddingClient, ResilienceConfig, ResilientBackend,
};
pub use models::{approximate_tokens, ProcessingOutcome, ScoringResult};
pub use pipeline::{ChunkArtifacts, Pipeline, PipelineConfig, ProcessedInterview};
pub use stages::{
    chunk_turns, index_chunks, parse_turns, ChunkerConfig, CompressionConfig, ExtractionConfig,
    FailurePolicy, IndexConfig, MergeConfig,
};
