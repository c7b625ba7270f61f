//! Text patterns used by the output guard.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// A run of non-terminal characters closed by terminal punctuation.
    pub static ref SENTENCE_PATTERN: Regex = Regex::new(r"[^.!?]+[.!?]").unwrap();
}

/// Default call-to-action phrases permitted in suggestions.
pub const DEFAULT_CTA_PATTERN: &str = r"(?i)\b(Follow up|Review|Delay)\b";

/// Count sentences by terminal punctuation.
///
/// Non-empty text without terminal punctuation is one sentence; blank text
/// has none.
pub fn count_sentences(text: &str) -> usize {
    match SENTENCE_PATTERN.find_iter(text).count() {
        0 if !text.trim().is_empty() => 1,
        n => n,
    }
}

/// Count non-overlapping matches of a pattern.
pub fn count_matches(pattern: &Regex, text: &str) -> usize {
    pattern.find_iter(text).count()
}
