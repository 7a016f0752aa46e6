use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

/// A user-reported problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pain {
    /// Stable kebab-case key, shared across chunks for the same concept
    pub id: String,
    pub description: String,
    /// 1 = trivial friction, 5 = mission-critical
    pub severity: u8,
    /// Verbatim quotes supporting the pain
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// A user-suggested capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// A representative verbatim quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub speaker: String,
    pub text: String,
}

/// Structured output the extraction capability is asked to produce
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionPayload {
    #[serde(default)]
    pub pains: Vec<Pain>,
    #[serde(default)]
    pub feature_requests: Vec<Feature>,
    #[serde(default)]
    pub needs: Vec<String>,
    #[serde(default)]
    pub quotes: Vec<Quote>,
}

/// How an extraction was obtained
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionMeta {
    /// True when the chunk failed and an empty extraction was substituted
    pub skipped: bool,
    /// Cause of the failure for skipped chunks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of capability calls made for this chunk
    pub attempts: u32,
    /// Evidence or quote strings removed during validation
    pub dropped_evidence: usize,
}

/// Validated extraction for one chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkExtraction {
    pub chunk_index: usize,
    pub pains: Vec<Pain>,
    pub feature_requests: Vec<Feature>,
    pub needs: Vec<String>,
    pub quotes: Vec<Quote>,
    pub meta: ExtractionMeta,
}

impl ChunkExtraction {
    pub fn from_payload(chunk_index: usize, payload: ExtractionPayload, meta: ExtractionMeta) -> Self {
        Self {
            chunk_index,
            pains: payload.pains,
            feature_requests: payload.feature_requests,
            needs: payload.needs,
            quotes: payload.quotes,
            meta,
        }
    }

    /// Empty extraction standing in for a chunk that failed
    pub fn skipped(chunk_index: usize, error: String, attempts: u32) -> Self {
        Self::from_payload(
            chunk_index,
            ExtractionPayload::default(),
            ExtractionMeta {
                skipped: true,
                error: Some(error),
                attempts,
                dropped_evidence: 0,
            },
        )
    }

    /// Check if nothing was extracted
    pub fn is_empty(&self) -> bool {
        self.pains.is_empty()
            && self.feature_requests.is_empty()
            && self.needs.is_empty()
            && self.quotes.is_empty()
    }
}

/// Ids already minted earlier in the same transcript
///
/// Lives only inside one pipeline invocation and is threaded from chunk to
/// chunk; first-seen order is kept so prompts are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownIds {
    pub pains: Vec<String>,
    pub features: Vec<String>,
}

impl KnownIds {
    /// Add the ids of an extraction, ignoring ones already known
    pub fn absorb(&mut self, extraction: &ChunkExtraction) {
        push_unique(&mut self.pains, extraction.pains.iter().map(|p| p.id.as_str()));
        push_unique(
            &mut self.features,
            extraction.feature_requests.iter().map(|f| f.id.as_str()),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.pains.is_empty() && self.features.is_empty()
    }
}

fn push_unique<'a>(target: &mut Vec<String>, ids: impl Iterator<Item = &'a str>) {
    let mut seen: HashSet<String> = target.iter().cloned().collect();
    for id in ids {
        if seen.insert(id.to_string()) {
            target.push(id.to_string());
        }
    }
}

/// Merge bookkeeping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeStats {
    pub total_chunks: usize,
    pub original_token_estimate: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    /// Chunks whose extraction was substituted with an empty one
    pub skipped_chunks: usize,
    /// Repeated ids whose descriptions looked like different concepts
    pub suspect_id_collisions: usize,
}

/// All chunk extractions folded into one deduplicated structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergedExtraction {
    pub pains: Vec<Pain>,
    pub feature_requests: Vec<Feature>,
    pub quotes: Vec<Quote>,
    pub needs: BTreeSet<String>,
    pub stats: MergeStats,
}

impl MergedExtraction {
    pub fn pain(&self, id: &str) -> Option<&Pain> {
        self.pains.iter().find(|p| p.id == id)
    }

    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.feature_requests.iter().find(|f| f.id == id)
    }
}

/// Size metadata attached to the scoring payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionMeta {
    pub original_token_estimate: usize,
    pub compression_ratio: f64,
}

/// Bounded payload handed to the scorer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedForScoring {
    pub product_context_summary: String,
    pub pains: Vec<Pain>,
    pub feature_requests: Vec<Feature>,
    pub needs: Vec<String>,
    pub representative_quotes: Vec<Quote>,
    pub meta: CompressionMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pain(id: &str) -> Pain {
        Pain {
            id: id.to_string(),
            description: "d".to_string(),
            severity: 3,
            evidence: vec![],
        }
    }

    #[test]
    fn test_parse_payload_with_missing_arrays() {
        let json = r#"{
            "pains": [
                {"id": "slow-sync", "description": "Sync is slow", "severity": 4, "evidence": ["it takes ages"]}
            ]
        }"#;

        let payload: ExtractionPayload = serde_json::from_str(json).unwrap();

        assert_eq!(payload.pains.len(), 1);
        assert_eq!(payload.pains[0].severity, 4);
        assert!(payload.feature_requests.is_empty());
        assert!(payload.quotes.is_empty());
    }

    #[test]
    fn test_known_ids_absorb_dedupes_in_order() {
        let mut known = KnownIds::default();
        let first = ChunkExtraction::from_payload(
            0,
            ExtractionPayload {
                pains: vec![pain("b"), pain("a")],
                ..Default::default()
            },
            ExtractionMeta::default(),
        );
        let second = ChunkExtraction::from_payload(
            1,
            ExtractionPayload {
                pains: vec![pain("a"), pain("c")],
                ..Default::default()
            },
            ExtractionMeta::default(),
        );

        known.absorb(&first);
        known.absorb(&second);

        assert_eq!(known.pains, vec!["b", "a", "c"]);
        assert!(known.features.is_empty());
    }

    #[test]
    fn test_skipped_extraction_is_empty() {
        let extraction = ChunkExtraction::skipped(3, "bad json".to_string(), 2);
        assert!(extraction.is_empty());
        assert!(extraction.meta.skipped);
        assert_eq!(extraction.meta.attempts, 2);
    }
}
