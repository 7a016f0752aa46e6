use std::collections::HashSet;

use tracing::warn;

use crate::models::ExtractionPayload;

/// Configuration for extraction validation
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Maximum words in a pain or feature evidence string
    pub max_evidence_words: usize,
    /// Maximum words in a quote
    pub max_quote_words: usize,
    /// Reject the response instead of dropping non-verbatim or over-long evidence
    pub strict_evidence: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_evidence_words: 30,
            max_quote_words: 40,
            strict_evidence: false,
        }
    }
}

/// Validation result for an extraction payload
#[derive(Debug, Clone)]
pub struct ExtractionValidation {
    /// Whether the payload is usable
    pub is_valid: bool,
    /// Hard errors that make the payload unusable
    pub errors: Vec<String>,
    /// Evidence and quote strings removed from the payload
    pub dropped_evidence: usize,
}

/// Normalize and validate an extraction payload against its source text
///
/// Ids are normalized to kebab-case in place and quotes without an id get one
/// derived from `chunk_index`. Evidence or quotes that are not verbatim in
/// `source_text`, or too long, are dropped (or reported as errors in strict
/// mode). Bad severities, empty ids or descriptions, and ids repeated within
/// the payload are always errors.
pub fn validate_extraction(
    payload: &mut ExtractionPayload,
    source_text: &str,
    chunk_index: usize,
    config: &ValidationConfig,
) -> ExtractionValidation {
    let mut errors = Vec::new();
    let mut dropped = 0;
    let source = collapse_whitespace(source_text);

    // 1. Pains: id, description, severity, evidence
    let mut pain_ids = HashSet::new();
    for pain in &mut payload.pains {
        pain.id = to_kebab_case(&pain.id);
        check_item(&pain.id, &pain.description, "pain", &mut pain_ids, &mut errors);
        if !(1..=5).contains(&pain.severity) {
            errors.push(format!(
                "Pain {} has severity {} outside 1-5",
                pain.id, pain.severity
            ));
        }
        dropped += filter_evidence(
            &mut pain.evidence,
            &source,
            config.max_evidence_words,
            config.strict_evidence,
            &format!("pain {}", pain.id),
            &mut errors,
        );
    }

    // 2. Feature requests
    let mut feature_ids = HashSet::new();
    for feature in &mut payload.feature_requests {
        feature.id = to_kebab_case(&feature.id);
        check_item(
            &feature.id,
            &feature.description,
            "feature",
            &mut feature_ids,
            &mut errors,
        );
        dropped += filter_evidence(
            &mut feature.evidence,
            &source,
            config.max_evidence_words,
            config.strict_evidence,
            &format!("feature {}", feature.id),
            &mut errors,
        );
    }

    // 3. Needs: trim, drop blanks
    payload.needs = payload
        .needs
        .iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();

    // 4. Quotes: verbatim and bounded, ids filled in
    let mut kept = Vec::with_capacity(payload.quotes.len());
    for (n, mut quote) in std::mem::take(&mut payload.quotes).into_iter().enumerate() {
        quote.text = quote.text.trim().to_string();
        if quote.text.is_empty() {
            errors.push(format!("Quote {} has empty text", n));
            continue;
        }
        if let Some(problem) = evidence_problem(&quote.text, &source, config.max_quote_words) {
            if config.strict_evidence {
                errors.push(format!("Quote {}: {}", n, problem));
            } else {
                warn!("Chunk {}: dropping quote {}: {}", chunk_index, n, problem);
                dropped += 1;
            }
            continue;
        }
        if quote.id.trim().is_empty() {
            quote.id = format!("q{}-{}", chunk_index, n + 1);
        }
        kept.push(quote);
    }
    payload.quotes = kept;

    ExtractionValidation {
        is_valid: errors.is_empty(),
        errors,
        dropped_evidence: dropped,
    }
}

fn check_item(
    id: &str,
    description: &str,
    kind: &str,
    seen: &mut HashSet<String>,
    errors: &mut Vec<String>,
) {
    if id.is_empty() {
        errors.push(format!("A {} has an empty id", kind));
    } else if !seen.insert(id.to_string()) {
        errors.push(format!("Duplicate {} id {} in one response", kind, id));
    }
    if description.trim().is_empty() {
        errors.push(format!("The {} {} has an empty description", kind, id));
    }
}

/// Remove unusable evidence strings, returning how many were removed
fn filter_evidence(
    evidence: &mut Vec<String>,
    source: &str,
    max_words: usize,
    strict: bool,
    owner: &str,
    errors: &mut Vec<String>,
) -> usize {
    let before = evidence.len();
    evidence.retain_mut(|e| {
        *e = e.trim().to_string();
        match evidence_problem(e, source, max_words) {
            None => true,
            Some(problem) => {
                if strict {
                    errors.push(format!("Evidence for {}: {}", owner, problem));
                } else {
                    warn!("Dropping evidence for {}: {}", owner, problem);
                }
                false
            }
        }
    });
    before - evidence.len()
}

fn evidence_problem(text: &str, source: &str, max_words: usize) -> Option<String> {
    let words = text.split_whitespace().count();
    if words == 0 {
        return Some("empty string".to_string());
    }
    if words > max_words {
        return Some(format!("{} words exceeds limit of {}", words, max_words));
    }
    if !source.contains(&collapse_whitespace(text)) {
        return Some(format!("not verbatim in transcript: {:?}", text));
    }
    None
}

/// Lowercase, with runs of non-alphanumeric characters turned into single hyphens
pub fn to_kebab_case(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut pending_hyphen = false;
    for c in id.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
