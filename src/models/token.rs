/// Approximate token count of a piece of text
///
/// Uses the `chars / 4` proxy. Every sizing decision in the pipeline (mode
/// selection, chunk accumulation, compression ratio) goes through this one
/// function so chunk sizes stay predictable.
pub fn approximate_tokens(text: &str) -> usize {
    tokens_for_chars(text.chars().count())
}

/// Same proxy for a character count that is already known
pub fn tokens_for_chars(chars: usize) -> usize {
    (chars as f64 / 4.0).round() as usize
}
