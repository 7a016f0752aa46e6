use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Speaker used for text that appears before any recognized speaker label
pub const UNKNOWN_SPEAKER: &str = "Unknown";

/// One contiguous utterance attributed to a single speaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker label as written in the transcript
    pub speaker: String,
    /// Utterance text, continuation lines joined with a space
    pub text: String,
}

impl Turn {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }

    /// The turn rendered as a single `speaker: text` line
    pub fn render(&self) -> String {
        format!("{}: {}", self.speaker, self.text)
    }
}

/// A token-bounded slice of the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of this chunk in the transcript (0-based)
    pub index: usize,
    /// Speaker-prefixed lines joined by newlines
    pub text: String,
    /// Global character offset where this chunk's body starts
    pub char_start: usize,
    /// Global character offset one past this chunk's body
    pub char_end: usize,
    /// Approximate tokens contributed by each speaker
    pub speaker_stats: BTreeMap<String, usize>,
}

impl Chunk {
    /// Approximate token size of the chunk text
    pub fn token_estimate(&self) -> usize {
        super::approximate_tokens(&self.text)
    }
}
