use std::collections::BTreeMap;

use tracing::debug;

use crate::error::PipelineError;
use crate::models::{tokens_for_chars, approximate_tokens, Chunk, Turn};

/// Appended to a split segment whose utterance continues in the next chunk
pub const CONTINUED_MARKER: &str = "<CONTINUED>";

/// Configuration for chunking
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Flush the accumulated turns once they reach this many tokens
    pub target_tokens: usize,
    /// A single turn above this many tokens is split on word boundaries
    pub max_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_tokens: 1400,
            max_tokens: 1700,
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.target_tokens == 0 {
            return Err(PipelineError::InvalidConfig(
                "target_tokens must be positive".to_string(),
            ));
        }
        if self.target_tokens > self.max_tokens {
            return Err(PipelineError::InvalidConfig(format!(
                "target_tokens ({}) exceeds max_tokens ({})",
                self.target_tokens, self.max_tokens
            )));
        }
        Ok(())
    }
}

/// Group turns into token-bounded chunks
///
/// Turns are appended greedily until the accumulated text reaches
/// `target_tokens`. A turn that alone exceeds `max_tokens` is hard-split on
/// word boundaries; every segment but the last is flushed as its own chunk
/// tagged with [`CONTINUED_MARKER`], and the tail joins the accumulator.
pub fn chunk_turns(turns: &[Turn], config: &ChunkerConfig) -> Result<Vec<Chunk>, PipelineError> {
    config.validate()?;

    let mut builder = ChunkBuilder::default();

    for turn in turns {
        let line = turn.render();
        if approximate_tokens(&line) > config.max_tokens {
            builder.flush();
            split_oversized_turn(&mut builder, turn, config);
            continue;
        }

        builder.push_line(&turn.speaker, line);
        if builder.accumulated_tokens() >= config.target_tokens {
            builder.flush();
        }
    }
    builder.flush();

    debug!(
        "Chunked {} turns into {} chunks (target {}, max {})",
        turns.len(),
        builder.chunks.len(),
        config.target_tokens,
        config.max_tokens
    );

    Ok(builder.chunks)
}

/// Hard-split one oversized turn into word groups of roughly `target_tokens`
fn split_oversized_turn(builder: &mut ChunkBuilder, turn: &Turn, config: &ChunkerConfig) {
    let prefix_chars = turn.speaker.chars().count() + 2;
    let mut segments: Vec<Vec<&str>> = Vec::new();
    let mut group: Vec<&str> = Vec::new();
    let mut group_chars = prefix_chars;

    for word in turn.text.split_whitespace() {
        if !group.is_empty() {
            group_chars += 1;
        }
        group_chars += word.chars().count();
        group.push(word);

        if tokens_for_chars(group_chars) >= config.target_tokens {
            segments.push(std::mem::take(&mut group));
            group_chars = prefix_chars;
        }
    }

    debug!(
        "Splitting oversized turn from {} into {} segments",
        turn.speaker,
        segments.len() + usize::from(!group.is_empty())
    );

    let segment_count = segments.len();
    for (i, segment) in segments.into_iter().enumerate() {
        let continues = i + 1 < segment_count || !group.is_empty();
        let line = format!("{}: {}", turn.speaker, segment.join(" "));
        builder.push_line(&turn.speaker, line);
        builder.flush_with_marker(continues);
    }

    if !group.is_empty() {
        builder.push_line(&turn.speaker, format!("{}: {}", turn.speaker, group.join(" ")));
    }
}

/// In-progress chunk accumulator plus the global character cursor
#[derive(Debug, Default)]
struct ChunkBuilder {
    chunks: Vec<Chunk>,
    lines: Vec<String>,
    line_chars: usize,
    speaker_stats: BTreeMap<String, usize>,
    cursor: usize,
}

impl ChunkBuilder {
    fn push_line(&mut self, speaker: &str, line: String) {
        *self.speaker_stats.entry(speaker.to_string()).or_default() += approximate_tokens(&line);
        self.line_chars += line.chars().count();
        self.lines.push(line);
    }

    /// Token estimate of the lines joined by newlines
    fn accumulated_tokens(&self) -> usize {
        tokens_for_chars(self.line_chars + self.lines.len().saturating_sub(1))
    }

    fn flush(&mut self) {
        self.flush_with_marker(false);
    }

    fn flush_with_marker(&mut self, continued: bool) {
        if self.lines.is_empty() {
            return;
        }

        let body = self.lines.join("\n");
        let char_start = self.cursor;
        let char_end = char_start + body.chars().count();
        self.cursor = char_end + 1;

        let text = if continued {
            format!("{} {}", body, CONTINUED_MARKER)
        } else {
            body
        };

        self.chunks.push(Chunk {
            index: self.chunks.len(),
            text,
            char_start,
            char_end,
            speaker_stats: std::mem::take(&mut self.speaker_stats),
        });
        self.lines.clear();
        self.line_chars = 0;
    }
}
