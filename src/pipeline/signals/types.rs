use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SentimentLabel;

/// Which detector produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    TextStats,
    Lexical,
    Statistical,
    Sentiment,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextStats => "text_stats",
            Self::Lexical => "lexical",
            Self::Statistical => "statistical",
            Self::Sentiment => "sentiment",
        }
    }
}

/// Surface statistics of the complaint text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStats {
    pub char_count: usize,
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_word_length: f64,
    pub uppercase_ratio: f64,
    pub exclamation_count: usize,
    pub question_count: usize,
}

/// Dictionary lookup result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalFinding {
    pub has_profanity: bool,
    /// Distinct matched terms, normalized to lowercase, sorted.
    pub flagged_words: Vec<String>,
    pub word_count: usize,
    /// Text with matched words masked, capped at 100 characters.
    pub censored_preview: String,
}

/// Logistic classifier output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalFinding {
    pub is_profane: bool,
    pub profanity_probability: f64,
    pub confidence: f64,
    pub model: String,
}

/// Valence model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentFinding {
    pub sentiment: SentimentLabel,
    pub compound_score: f64,
    pub positive_score: f64,
    pub negative_score: f64,
    pub neutral_score: f64,
    pub intensity: f64,
}

/// One detector's finding about a text, or the error it hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalReport {
    TextStats(TextStats),
    Lexical(LexicalFinding),
    Statistical(StatisticalFinding),
    Sentiment(SentimentFinding),
    Failed { source: SignalKind, error: String },
}

impl SignalReport {
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::TextStats(_) => SignalKind::TextStats,
            Self::Lexical(_) => SignalKind::Lexical,
            Self::Statistical(_) => SignalKind::Statistical,
            Self::Sentiment(_) => SignalKind::Sentiment,
            Self::Failed { source, .. } => *source,
        }
    }

    /// Method tag recorded with the finding.
    pub fn method(&self) -> &'static str {
        match self.kind() {
            SignalKind::TextStats => "text_stats",
            SignalKind::Lexical => "dictionary_based",
            SignalKind::Statistical => "ml_based",
            SignalKind::Sentiment => "valence_lexicon",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::TextStats(_) | Self::Lexical(_) => 1.0,
            Self::Statistical(f) => f.confidence,
            Self::Sentiment(f) => f
                .positive_score
                .max(f.negative_score)
                .max(f.neutral_score),
            Self::Failed { .. } => 0.0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Detector reports keyed by kind. Keying makes every consumer
/// independent of the order detectors ran in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    reports: BTreeMap<SignalKind, SignalReport>,
}

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a report, replacing any earlier report of the same kind.
    pub fn insert(&mut self, report: SignalReport) {
        self.reports.insert(report.kind(), report);
    }

    /// Builder form of [`SignalSet::insert`].
    pub fn with(mut self, report: SignalReport) -> Self {
        self.insert(report);
        self
    }

    pub fn get(&self, kind: SignalKind) -> Option<&SignalReport> {
        self.reports.get(&kind)
    }

    pub fn reports(&self) -> impl Iterator<Item = &SignalReport> {
        self.reports.values()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn text_stats(&self) -> Option<&TextStats> {
        match self.get(SignalKind::TextStats) {
            Some(SignalReport::TextStats(s)) => Some(s),
            _ => None,
        }
    }

    pub fn lexical(&self) -> Option<&LexicalFinding> {
        match self.get(SignalKind::Lexical) {
            Some(SignalReport::Lexical(f)) => Some(f),
            _ => None,
        }
    }

    pub fn statistical(&self) -> Option<&StatisticalFinding> {
        match self.get(SignalKind::Statistical) {
            Some(SignalReport::Statistical(f)) => Some(f),
            _ => None,
        }
    }

    pub fn sentiment(&self) -> Option<&SentimentFinding> {
        match self.get(SignalKind::Sentiment) {
            Some(SignalReport::Sentiment(f)) => Some(f),
            _ => None,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = (SignalKind, &str)> {
        self.reports.values().filter_map(|r| match r {
            SignalReport::Failed { source, error } => Some((*source, error.as_str())),
            _ => None,
        })
    }

    /// Whether either profanity detector reported a hit.
    pub fn profanity_detected(&self) -> bool {
        self.statistical().is_some_and(|f| f.is_profane)
            || self.lexical().is_some_and(|f| f.has_profanity)
    }
}

impl FromIterator<SignalReport> for SignalSet {
    fn from_iter<I: IntoIterator<Item = SignalReport>>(iter: I) -> Self {
        let mut set = Self::new();
        for report in iter {
            set.insert(report);
        }
        set
    }
}

/// Detector errors. Always captured into a `SignalReport::Failed`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("Input too large for {detector}: {actual} characters (limit {limit})")]
    InputTooLarge {
        detector: &'static str,
        actual: usize,
        limit: usize,
    },

    #[error("Detector produced a non-finite score")]
    NonFiniteScore,

    #[error("Detector unavailable: {0}")]
    Unavailable(String),
}

/// A single text detector. Implementations are stateless per call and
/// share their lexicon or model read-only.
pub trait SignalDetector: Send + Sync {
    fn kind(&self) -> SignalKind;

    fn detect(&self, text: &str) -> Result<SignalReport, SignalError>;
}
