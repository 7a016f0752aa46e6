use serde::Serialize;
use tracing::info;

use crate::error::ResponseError;
use crate::llm::{build_scoring_prompt, extract_json_object, CompletionBackend, ResponseFormat};
use crate::models::ScoringResult;

/// Make the single scoring call over a serializable insight payload
///
/// Any failure is returned to the caller; there is no partial result without
/// a score.
pub async fn score_insights<B: CompletionBackend, T: Serialize>(
    backend: &B,
    product_summary: &str,
    insights: &T,
) -> Result<ScoringResult, ResponseError> {
    let insights_json = serde_json::to_string_pretty(insights)?;
    let prompt = build_scoring_prompt(product_summary, &insights_json);

    let response = backend.complete(&prompt, ResponseFormat::Json).await?;
    let value = extract_json_object(&response).ok_or(ResponseError::NoJson)?;
    let scoring: ScoringResult = serde_json::from_value(value)?;

    let errors = scoring.validation_errors();
    if !errors.is_empty() {
        return Err(ResponseError::Invalid(errors));
    }

    info!(
        "Scoring: pmf_score={:.1} confidence={:.2}",
        scoring.pmf_score, scoring.confidence
    );
    Ok(scoring)
}
