//! Token estimation.

/// Estimate tokens as whitespace-separated words.
///
/// Used for both the output guard's length limit and usage telemetry, so the
/// two always agree on what a "token" is.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}
