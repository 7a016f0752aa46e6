use super::backend::Prompt;
use crate::models::KnownIds;

/// System prompt for per-chunk extraction (non-negotiable contract)
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract structured product insights from a slice of a customer interview transcript. You MUST follow these rules:

1. Emit only items that are newly evidenced in THIS transcript slice.
2. Reuse an id from the KNOWN IDS list only when the item is the exact same concept recurring. Otherwise mint a fresh, unique, kebab-case id (lowercase letters, digits and hyphens).
3. Every evidence string and every quote text MUST be copied verbatim from the transcript slice. Do not paraphrase, fix grammar or merge sentences.
4. Pain evidence strings are at most 30 words. Quotes are at most 40 words.
5. Severity is an integer from 1 to 5: 1 = trivial friction, 3 = recurring annoyance with a workaround, 5 = mission-critical blocker.
6. Empty arrays are valid and mean nothing new was found.
7. Output MUST be a single JSON object matching the schema below.

SCHEMA:
{
  "pains": [{"id": "kebab-id", "description": "string", "severity": 1, "evidence": ["verbatim quote"]}],
  "feature_requests": [{"id": "kebab-id", "description": "string", "rationale": "string", "evidence": ["verbatim quote"]}],
  "needs": ["short statement of an underlying user need"],
  "quotes": [{"id": "q1", "speaker": "speaker label", "text": "verbatim quote"}]
}"#;

/// System prompt for the final scoring call
pub const SCORING_SYSTEM_PROMPT: &str = r#"You assess product-market fit from structured interview insights. Base your assessment only on the provided data.

Output MUST be a single JSON object:
{
  "pmf_score": 0-100 (0 = no fit, 100 = strong pull from the customer),
  "confidence": 0.0-1.0,
  "summary": "two or three sentences",
  "strengths": ["signals of fit"],
  "risks": ["signals against fit"],
  "recommendations": ["concrete next steps for the product team"]
}"#;

/// Build the user prompt for one chunk
pub fn build_chunk_prompt(
    product_summary: &str,
    known_ids: &KnownIds,
    chunk_text: &str,
    chunk_index: usize,
) -> Prompt {
    let mut user = String::new();

    user.push_str("# Product\n");
    user.push_str(product_summary.trim());
    user.push_str("\n\n");

    user.push_str(&format!("# Transcript slice {}\n\n", chunk_index + 1));

    user.push_str("## KNOWN IDS\n");
    if known_ids.is_empty() {
        user.push_str("(none yet)\n");
    } else {
        user.push_str(&format!("Pains: {}\n", format_ids(&known_ids.pains)));
        user.push_str(&format!("Features: {}\n", format_ids(&known_ids.features)));
    }
    user.push('\n');

    user.push_str("## Transcript\n");
    user.push_str("<<<TRANSCRIPT\n");
    user.push_str(chunk_text);
    user.push_str("\nTRANSCRIPT>>>\n\n");

    user.push_str("Extract pains, feature requests, needs and quotes from this slice as JSON.\n");

    Prompt::new(EXTRACTION_SYSTEM_PROMPT, user)
}

/// Build the scoring prompt from an already-serialized insight payload
pub fn build_scoring_prompt(product_summary: &str, insights_json: &str) -> Prompt {
    let mut user = String::new();

    user.push_str("# Product\n");
    user.push_str(product_summary.trim());
    user.push_str("\n\n");

    user.push_str("# Interview insights\n");
    user.push_str("```json\n");
    user.push_str(insights_json);
    user.push_str("\n```\n\n");

    user.push_str("Score the product-market fit signalled by this interview.\n");

    Prompt::new(SCORING_SYSTEM_PROMPT, user)
}

fn format_ids(ids: &[String]) -> String {
    if ids.is_empty() {
        "(none)".to_string()
    } else {
        ids.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_prompt_without_known_ids() {
        let prompt = build_chunk_prompt("A sync tool", &KnownIds::default(), "Alice: hi", 0);

        assert_eq!(prompt.system, EXTRACTION_SYSTEM_PROMPT);
        assert!(prompt.user.contains("A sync tool"));
        assert!(prompt.user.contains("Transcript slice 1"));
        assert!(prompt.user.contains("(none yet)"));
        assert!(prompt.user.contains("Alice: hi"));
    }

    #[test]
    fn test_chunk_prompt_lists_known_ids() {
        let known = KnownIds {
            pains: vec!["slow-sync".to_string(), "lost-data".to_string()],
            features: vec![],
        };

        let prompt = build_chunk_prompt("A sync tool", &known, "Bob: still slow", 3);

        assert!(prompt.user.contains("Pains: slow-sync, lost-data"));
        assert!(prompt.user.contains("Features: (none)"));
        assert!(prompt.user.contains("Transcript slice 4"));
    }

    #[test]
    fn test_scoring_prompt_embeds_payload() {
        let prompt = build_scoring_prompt("A sync tool", r#"{"pains": []}"#);

        assert_eq!(prompt.system, SCORING_SYSTEM_PROMPT);
        assert!(prompt.user.contains(r#"{"pains": []}"#));
    }
}
