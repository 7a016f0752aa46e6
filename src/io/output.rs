use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{Feature, Pain, ProcessingOutcome, Quote};

/// Envelope written to the JSON output file
#[derive(Debug, Serialize)]
struct OutcomeFile<'a> {
    processed_at: String,
    outcome: &'a ProcessingOutcome,
}

/// Write an outcome as pretty JSON stamped with the processing time
pub fn write_outcome_json(outcome: &ProcessingOutcome, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    let envelope = OutcomeFile {
        processed_at: chrono::Utc::now().to_rfc3339(),
        outcome,
    };
    serde_json::to_writer_pretty(file, &envelope).context("Failed to write JSON")?;
    Ok(())
}

/// Human-readable report of one processed interview
pub struct SummaryReport<'a> {
    outcome: &'a ProcessingOutcome,
}

/// Quotes listed in the report
const REPORT_QUOTES: usize = 10;

impl<'a> SummaryReport<'a> {
    pub fn new(outcome: &'a ProcessingOutcome) -> Self {
        Self { outcome }
    }

    /// Format the report as wrapped plain text
    pub fn format(&self) -> String {
        let (pains, features, needs, quotes): (&[Pain], &[Feature], Vec<&str>, &[Quote]) =
            match self.outcome {
                ProcessingOutcome::Simple { extraction, .. } => (
                    extraction.pains.as_slice(),
                    extraction.feature_requests.as_slice(),
                    extraction.needs.iter().map(String::as_str).collect(),
                    extraction.quotes.as_slice(),
                ),
                ProcessingOutcome::Hierarchical { merged, .. } => (
                    merged.pains.as_slice(),
                    merged.feature_requests.as_slice(),
                    merged.needs.iter().map(String::as_str).collect(),
                    merged.quotes.as_slice(),
                ),
            };
        let scoring = self.outcome.scoring();

        let mut output = String::new();
        output.push_str(&format!("Interview {}\n", self.outcome.interview_id()));
        output.push_str(&format!(
            "Mode: {} (~{} tokens)\n",
            self.outcome.mode(),
            self.outcome.token_estimate()
        ));
        if let ProcessingOutcome::Hierarchical {
            chunks, compressed, ..
        } = self.outcome
        {
            output.push_str(&format!(
                "Chunks: {}, compression ratio {:.2}\n",
                chunks, compressed.meta.compression_ratio
            ));
        }
        output.push('\n');

        output.push_str(&format!(
            "PMF score: {:.0}/100 (confidence {:.2})\n",
            scoring.pmf_score, scoring.confidence
        ));
        if !scoring.summary.is_empty() {
            output.push_str(&wrap_text(&scoring.summary, 80));
            output.push('\n');
        }
        push_list(&mut output, "Strengths", &scoring.strengths);
        push_list(&mut output, "Risks", &scoring.risks);
        push_list(&mut output, "Recommendations", &scoring.recommendations);

        let mut sorted_pains: Vec<&Pain> = pains.iter().collect();
        sorted_pains.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.id.cmp(&b.id)));
        output.push_str(&format!("\nPains ({})\n", pains.len()));
        for pain in sorted_pains {
            push_item(
                &mut output,
                &format!("[{}] {}: {}", pain.severity, pain.id, pain.description),
            );
            for evidence in &pain.evidence {
                push_evidence(&mut output, evidence);
            }
        }

        output.push_str(&format!("\nFeature requests ({})\n", features.len()));
        for feature in features {
            let mut line = format!("{}: {}", feature.id, feature.description);
            if !feature.rationale.is_empty() {
                line.push_str(&format!(" ({})", feature.rationale));
            }
            push_item(&mut output, &line);
        }

        output.push_str(&format!("\nNeeds ({})\n", needs.len()));
        for need in needs {
            push_item(&mut output, need);
        }

        output.push_str(&format!("\nQuotes ({})\n", quotes.len()));
        for quote in quotes.iter().take(REPORT_QUOTES) {
            push_item(&mut output, &format!("{}: \"{}\"", quote.speaker, quote.text));
        }

        output
    }

    /// Write to a text file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        write!(file, "{}", self.format())?;
        Ok(())
    }
}

fn push_list(output: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    output.push_str(&format!("{}:\n", title));
    for item in items {
        push_item(output, item);
    }
}

fn push_item(output: &mut String, text: &str) {
    output.push_str(&indent(&wrap_text(text, 76), "  - ", "    "));
    output.push('\n');
}

fn push_evidence(output: &mut String, text: &str) {
    output.push_str(&indent(&wrap_text(&format!("\"{}\"", text), 72), "      ", "      "));
    output.push('\n');
}

fn indent(text: &str, first: &str, rest: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| format!("{}{}", if i == 0 { first } else { rest }, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap text at approximately the given width
fn wrap_text(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if line_len + word_len + 1 > width && line_len > 0 {
            result.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            result.push(' ');
            line_len += 1;
        }
        result.push_str(word);
        line_len += word_len;
    }

    result
}
