//! Statistical profanity classifier.
//!
//! A fixed-weight logistic model over folded unigrams. Each distinct token
//! contributes its weight once; stems marked as prefixes also cover their
//! inflections ("fucking", "shitty"). Weights are compiled in, nothing is
//! learned at runtime.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use super::lexicon::normalize_word;
use super::types::{
    SignalDetector, SignalError, SignalKind, SignalReport, StatisticalFinding,
};

pub const MODEL_NAME: &str = "unigram-logit-v2";

/// Texts longer than this are rejected rather than scored.
pub const MAX_INPUT_CHARS: usize = 50_000;

/// Decision boundary on the probability.
pub const PROFANE_THRESHOLD: f64 = 0.5;

const BIAS: f64 = -3.0;

struct ModelWeights {
    exact: HashMap<&'static str, f64>,
    prefixes: Vec<(&'static str, f64)>,
}

static WEIGHTS: LazyLock<ModelWeights> = LazyLock::new(|| {
    let exact = [
        ("ass", 3.2),
        ("asshole", 4.6),
        ("bastard", 4.1),
        ("crap", 2.6),
        ("damn", 2.1),
        ("dick", 3.6),
        ("idiot", 4.5),
        ("idiots", 4.5),
        ("moron", 4.2),
        ("morons", 4.2),
        ("imbecile", 4.0),
        ("stupid", 2.4),
        ("dumb", 2.0),
        ("dumbass", 4.6),
        ("jerk", 2.5),
        ("loser", 2.3),
        ("scum", 3.4),
        ("scumbag", 4.0),
        ("pathetic", 1.4),
        ("useless", 0.9),
        ("garbage", 0.8),
        ("trash", 0.8),
        ("hell", 1.1),
        ("hate", 1.3),
        ("kill", 1.8),
        ("wtf", 3.6),
        ("stfu", 4.1),
        ("fck", 4.6),
        ("sht", 4.0),
        ("dmn", 2.0),
        ("btch", 4.2),
        ("prick", 3.9),
        ("twat", 4.5),
        ("wanker", 4.5),
        ("bollocks", 3.3),
        ("thank", -1.0),
        ("thanks", -1.0),
        ("please", -0.5),
        ("appreciate", -1.0),
        ("sorry", -0.4),
        ("help", -0.3),
    ]
    .into_iter()
    .collect();

    let prefixes = vec![
        ("fuck", 5.2),
        ("shit", 4.6),
        ("bitch", 4.6),
        ("bullshit", 4.8),
        ("cunt", 5.0),
        ("piss", 2.6),
        ("douche", 3.4),
        ("slut", 4.4),
        ("whore", 4.6),
        ("retard", 4.4),
        ("suck", 1.9),
        ("resolv", -0.3),
    ];

    ModelWeights { exact, prefixes }
});

impl ModelWeights {
    fn weight(&self, token: &str) -> f64 {
        if let Some(w) = self.exact.get(token) {
            return *w;
        }
        self.prefixes
            .iter()
            .find(|(stem, _)| token.starts_with(stem))
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Probability that `text` is profane.
pub fn profanity_probability(text: &str) -> f64 {
    let tokens: BTreeSet<String> = text
        .split_whitespace()
        .map(normalize_word)
        .filter(|t| !t.is_empty())
        .collect();

    let z = tokens
        .iter()
        .fold(BIAS, |acc, token| acc + WEIGHTS.weight(token));
    sigmoid(z)
}

/// Score `text`, enforcing the input size limit.
pub fn classify(text: &str) -> Result<StatisticalFinding, SignalError> {
    let actual = text.chars().count();
    if actual > MAX_INPUT_CHARS {
        return Err(SignalError::InputTooLarge {
            detector: "statistical_classifier",
            actual,
            limit: MAX_INPUT_CHARS,
        });
    }

    let probability = profanity_probability(text);
    if !probability.is_finite() {
        return Err(SignalError::NonFiniteScore);
    }

    let is_profane = probability >= PROFANE_THRESHOLD;
    Ok(StatisticalFinding {
        is_profane,
        profanity_probability: probability,
        confidence: if is_profane { probability } else { 1.0 - probability },
        model: MODEL_NAME.to_string(),
    })
}

/// Logistic-model profanity detector.
pub struct StatisticalProfanityClassifier;

impl SignalDetector for StatisticalProfanityClassifier {
    fn kind(&self) -> SignalKind {
        SignalKind::Statistical
    }

    fn detect(&self, text: &str) -> Result<SignalReport, SignalError> {
        classify(text).map(SignalReport::Statistical)
    }
}

pub(crate) fn warm_up() -> usize {
    WEIGHTS.exact.len() + WEIGHTS.prefixes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_clean() {
        let finding = classify("").unwrap();
        assert!(!finding.is_profane);
        assert!(finding.profanity_probability < 0.1);
    }

    #[test]
    fn insult_is_profane() {
        let finding = classify("YOU ARE AN IDIOT!!!!").unwrap();
        assert!(finding.is_profane);
        assert!(finding.profanity_probability > 0.75);
        assert_eq!(finding.confidence, finding.profanity_probability);
    }

    #[test]
    fn polite_text_is_clean_with_high_confidence() {
        let finding = classify("Thank you for resolving this quickly").unwrap();
        assert!(!finding.is_profane);
        assert!(finding.confidence > 0.95);
        assert!((finding.confidence + finding.profanity_probability - 1.0).abs() < 1e-12);
    }

    #[test]
    fn prefix_stems_cover_inflections() {
        assert!(classify("this fucking company").unwrap().is_profane);
        assert!(classify("shitty support").unwrap().is_profane);
    }

    #[test]
    fn repeated_tokens_count_once() {
        let once = profanity_probability("damn service");
        let many = profanity_probability("damn damn damn service");
        assert_eq!(once, many);
    }

    #[test]
    fn probability_in_unit_interval() {
        for text in ["", "fuck shit bitch cunt idiot moron", "thanks please appreciate sorry"] {
            let p = profanity_probability(text);
            assert!((0.0..=1.0).contains(&p), "{text}: {p}");
        }
    }

    #[test]
    fn oversized_input_is_an_error() {
        let text = "a".repeat(MAX_INPUT_CHARS + 1);
        let err = classify(&text).unwrap_err();
        assert!(matches!(err, SignalError::InputTooLarge { .. }));
    }

    #[test]
    fn mild_word_alone_stays_below_threshold() {
        let finding = classify("the process was stupid").unwrap();
        assert!(!finding.is_profane);
    }
}
