use serde::Serialize;
use tracing::info;

use crate::models::{
    approximate_tokens, CompressedForScoring, CompressionMeta, Feature, MergedExtraction, Pain,
    Quote,
};

/// Configuration for the scoring payload
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Evidence kept per pain and per feature request
    pub max_quotes_per_pain: usize,
    /// Representative quotes kept
    pub max_representative_quotes: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_quotes_per_pain: 2,
            max_representative_quotes: 80,
        }
    }
}

/// Fields whose serialized size the compression ratio is measured against
#[derive(Serialize)]
struct CoreFields<'a> {
    product_context_summary: &'a str,
    pains: &'a [Pain],
    feature_requests: &'a [Feature],
    needs: &'a [String],
    representative_quotes: &'a [Quote],
}

/// Trim a merged extraction to a bounded payload for the scorer
///
/// Evidence per pain and feature is cut to `max_quotes_per_pain` and the quote
/// list to its first `max_representative_quotes` entries. The compression
/// ratio is the original transcript estimate over the estimate of the
/// serialized core fields.
pub fn compress_for_scoring(
    merged: &MergedExtraction,
    product_summary: &str,
    config: &CompressionConfig,
) -> CompressedForScoring {
    let pains: Vec<Pain> = merged
        .pains
        .iter()
        .map(|p| Pain {
            evidence: p.evidence.iter().take(config.max_quotes_per_pain).cloned().collect(),
            ..p.clone()
        })
        .collect();

    let feature_requests: Vec<Feature> = merged
        .feature_requests
        .iter()
        .map(|f| Feature {
            evidence: f.evidence.iter().take(config.max_quotes_per_pain).cloned().collect(),
            ..f.clone()
        })
        .collect();

    let needs: Vec<String> = merged.needs.iter().cloned().collect();
    let representative_quotes: Vec<Quote> = merged
        .quotes
        .iter()
        .take(config.max_representative_quotes)
        .cloned()
        .collect();

    let core = CoreFields {
        product_context_summary: product_summary,
        pains: &pains,
        feature_requests: &feature_requests,
        needs: &needs,
        representative_quotes: &representative_quotes,
    };
    // Serializing plain strings and numbers cannot fail; fall back to zero size.
    let core_tokens = serde_json::to_string(&core)
        .map(|json| approximate_tokens(&json))
        .unwrap_or(0);
    let original = merged.stats.original_token_estimate;
    let compression_ratio = original as f64 / core_tokens.max(1) as f64;

    info!(
        "Compression: {} tokens -> ~{} tokens (ratio {:.2})",
        original, core_tokens, compression_ratio
    );

    CompressedForScoring {
        product_context_summary: product_summary.to_string(),
        pains,
        feature_requests,
        needs,
        representative_quotes,
        meta: CompressionMeta {
            original_token_estimate: original,
            compression_ratio,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MergeStats;

    fn merged_with(pains: usize, evidence: usize, quotes: usize, original: usize) -> MergedExtraction {
        let evidence: Vec<String> = (0..evidence).map(|i| format!("evidence {}", i)).collect();
        MergedExtraction {
            pains: (0..pains)
                .map(|i| Pain {
                    id: format!("pain-{}", i),
                    description: "A problem".to_string(),
                    severity: 3,
                    evidence: evidence.clone(),
                })
                .collect(),
            feature_requests: vec![Feature {
                id: "offline-mode".to_string(),
                description: "Offline".to_string(),
                rationale: String::new(),
                evidence: evidence.clone(),
            }],
            quotes: (0..quotes)
                .map(|i| Quote {
                    id: format!("q{}", i),
                    speaker: "Bob".to_string(),
                    text: format!("quote {}", i),
                })
                .collect(),
            needs: ["offline".to_string()].into_iter().collect(),
            stats: MergeStats {
                total_chunks: 4,
                original_token_estimate: original,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_evidence_and_quotes_are_capped() {
        let merged = merged_with(10, 6, 120, 50_000);

        let compressed = compress_for_scoring(&merged, "Sync tool", &CompressionConfig::default());

        assert_eq!(compressed.pains.len(), 10);
        assert!(compressed.pains.iter().all(|p| p.evidence.len() <= 2));
        assert_eq!(compressed.pains[0].evidence, vec!["evidence 0", "evidence 1"]);
        assert!(compressed.feature_requests.iter().all(|f| f.evidence.len() <= 2));
        assert_eq!(compressed.representative_quotes.len(), 80);
        assert_eq!(compressed.representative_quotes[79].text, "quote 79");
        assert_eq!(compressed.product_context_summary, "Sync tool");
    }

    #[test]
    fn test_small_inputs_pass_through() {
        let merged = merged_with(1, 1, 3, 8_000);

        let compressed = compress_for_scoring(&merged, "Sync tool", &CompressionConfig::default());

        assert_eq!(compressed.pains[0].evidence.len(), 1);
        assert_eq!(compressed.representative_quotes.len(), 3);
        assert_eq!(compressed.needs, vec!["offline"]);
    }

    #[test]
    fn test_compression_ratio() {
        let merged = merged_with(2, 2, 2, 40_000);

        let compressed = compress_for_scoring(&merged, "Sync tool", &CompressionConfig::default());

        assert_eq!(compressed.meta.original_token_estimate, 40_000);
        assert!(compressed.meta.compression_ratio > 1.0);
    }

    #[test]
    fn test_ratio_of_empty_original_is_zero() {
        let merged = MergedExtraction::default();

        let compressed = compress_for_scoring(&merged, "", &CompressionConfig::default());

        assert_eq!(compressed.meta.compression_ratio, 0.0);
    }

    #[test]
    fn test_custom_quote_budget() {
        let merged = merged_with(1, 5, 10, 1_000);
        let config = CompressionConfig {
            max_quotes_per_pain: 4,
            max_representative_quotes: 5,
        };

        let compressed = compress_for_scoring(&merged, "Sync tool", &config);

        assert_eq!(compressed.pains[0].evidence.len(), 4);
        assert_eq!(compressed.representative_quotes.len(), 5);
    }
}
