use serde::{Deserialize, Serialize};

/// Persisted form of one chunk with its embedding and extracted key points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub interview_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    pub token_estimate: usize,
    /// Pain and feature descriptions plus needs found in this chunk
    pub key_points: Vec<String>,
    pub embedding: Vec<f32>,
    /// RFC 3339 creation timestamp
    pub created_at: String,
}
