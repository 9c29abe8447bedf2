use std::sync::LazyLock;

use regex::Regex;

use super::types::{SignalDetector, SignalError, SignalKind, SignalReport, TextStats};

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid regex"));

/// Compute surface statistics. Empty text yields all zeros.
pub fn analyze_text_stats(text: &str) -> TextStats {
    let char_count = text.chars().count();
    if char_count == 0 {
        return TextStats::default();
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let word_chars: usize = words.iter().map(|w| w.chars().count()).sum();
    let avg_word_length = if words.is_empty() {
        0.0
    } else {
        word_chars as f64 / words.len() as f64
    };

    let sentence_count = SENTENCE_BREAK
        .split(text)
        .filter(|s| !s.trim().is_empty())
        .count();

    let uppercase = text.chars().filter(|c| c.is_uppercase()).count();

    TextStats {
        char_count,
        word_count: words.len(),
        sentence_count,
        avg_word_length,
        uppercase_ratio: uppercase as f64 / char_count as f64,
        exclamation_count: text.matches('!').count(),
        question_count: text.matches('?').count(),
    }
}

/// Detector wrapper for [`analyze_text_stats`].
pub struct TextStatsDetector;

impl SignalDetector for TextStatsDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::TextStats
    }

    fn detect(&self, text: &str) -> Result<SignalReport, SignalError> {
        Ok(SignalReport::TextStats(analyze_text_stats(text)))
    }
}
