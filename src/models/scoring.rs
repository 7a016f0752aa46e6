use serde::{Deserialize, Serialize};

use super::{ChunkExtraction, CompressedForScoring, MergedExtraction};

/// Product-market-fit assessment returned by the scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    /// 0 (no fit) to 100 (strong fit)
    pub pmf_score: f64,
    /// Scorer's confidence in the score (0-1)
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl ScoringResult {
    /// Range checks on the numeric fields
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(0.0..=100.0).contains(&self.pmf_score) {
            errors.push(format!("pmf_score {} outside 0-100", self.pmf_score));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            errors.push(format!("confidence {} outside 0-1", self.confidence));
        }
        errors
    }
}

/// Result of processing one interview, tagged by the mode that ran
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Simple {
        interview_id: String,
        token_estimate: usize,
        extraction: ChunkExtraction,
        scoring: ScoringResult,
    },
    Hierarchical {
        interview_id: String,
        token_estimate: usize,
        chunks: usize,
        merged: MergedExtraction,
        compressed: CompressedForScoring,
        scoring: ScoringResult,
    },
}

impl ProcessingOutcome {
    pub fn mode(&self) -> &'static str {
        match self {
            ProcessingOutcome::Simple { .. } => "simple",
            ProcessingOutcome::Hierarchical { .. } => "hierarchical",
        }
    }

    pub fn interview_id(&self) -> &str {
        match self {
            ProcessingOutcome::Simple { interview_id, .. }
            | ProcessingOutcome::Hierarchical { interview_id, .. } => interview_id,
        }
    }

    pub fn token_estimate(&self) -> usize {
        match self {
            ProcessingOutcome::Simple { token_estimate, .. }
            | ProcessingOutcome::Hierarchical { token_estimate, .. } => *token_estimate,
        }
    }

    pub fn scoring(&self) -> &ScoringResult {
        match self {
            ProcessingOutcome::Simple { scoring, .. }
            | ProcessingOutcome::Hierarchical { scoring, .. } => scoring,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scoring_with_defaults() {
        let scoring: ScoringResult = serde_json::from_str(r#"{"pmf_score": 72.5}"#).unwrap();
        assert_eq!(scoring.pmf_score, 72.5);
        assert!(scoring.strengths.is_empty());
        assert!(scoring.validation_errors().is_empty());
    }

    #[test]
    fn test_out_of_range_scores() {
        let scoring = ScoringResult {
            pmf_score: 140.0,
            confidence: 1.5,
            summary: String::new(),
            strengths: vec![],
            risks: vec![],
            recommendations: vec![],
        };
        assert_eq!(scoring.validation_errors().len(), 2);
    }

    #[test]
    fn test_outcome_is_tagged_by_mode() {
        let outcome = ProcessingOutcome::Simple {
            interview_id: "int-1".to_string(),
            token_estimate: 12,
            extraction: ChunkExtraction::skipped(0, "x".to_string(), 1),
            scoring: serde_json::from_str(r#"{"pmf_score": 10}"#).unwrap(),
        };

        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["mode"], "simple");
        assert_eq!(value["token_estimate"], 12);
        assert_eq!(outcome.mode(), "simple");
    }
}
