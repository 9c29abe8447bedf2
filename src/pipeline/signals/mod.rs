//! Independent text detectors.
//!
//! Every detector is a pure function of the text. Lexicons and model
//! weights are process-wide statics, built once by [`warm_up`] before a
//! batch starts and shared read-only afterwards.

pub mod classifier;
pub mod lexicon;
pub mod sentiment;
pub mod text_stats;
pub mod types;

pub use classifier::StatisticalProfanityClassifier;
pub use lexicon::LexicalProfanityDetector;
pub use sentiment::SentimentAnalyzer;
pub use text_stats::TextStatsDetector;
pub use types::*;

/// The detectors run against every extracted text.
pub struct SignalSuite {
    detectors: Vec<Box<dyn SignalDetector>>,
}

impl SignalSuite {
    pub fn new(detectors: Vec<Box<dyn SignalDetector>>) -> Self {
        Self { detectors }
    }

    /// Text statistics, dictionary, classifier and sentiment.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(TextStatsDetector),
            Box::new(LexicalProfanityDetector),
            Box::new(StatisticalProfanityClassifier),
            Box::new(SentimentAnalyzer),
        ])
    }

    /// Run all detectors. A detector error becomes a `Failed` report for
    /// that kind and never stops the others.
    pub fn run(&self, text: &str) -> SignalSet {
        self.detectors
            .iter()
            .map(|detector| match detector.detect(text) {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!(
                        detector = detector.kind().as_str(),
                        error = %e,
                        "Signal detector failed"
                    );
                    SignalReport::Failed {
                        source: detector.kind(),
                        error: e.to_string(),
                    }
                }
            })
            .collect()
    }
}

impl Default for SignalSuite {
    fn default() -> Self {
        Self::standard()
    }
}

/// Build every lexicon and weight table. Returns the number of entries loaded.
pub fn warm_up() -> usize {
    let loaded = lexicon::warm_up() + classifier::warm_up() + sentiment::warm_up();
    tracing::debug!(entries = loaded, "Signal tables loaded");
    loaded
}
