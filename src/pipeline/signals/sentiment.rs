//! Lexicon-and-rule sentiment model.
//!
//! Each word found in the valence lexicon contributes its valence, adjusted
//! by preceding boosters and negations and by all-caps emphasis. A "but"
//! shifts weight to the clause after it. Exclamation and question marks
//! amplify the sum away from zero before it is squashed into [-1, 1].

use std::collections::HashMap;
use std::sync::LazyLock;

use super::types::{SentimentFinding, SignalDetector, SignalError, SignalKind, SignalReport};
use crate::models::SentimentLabel;

pub const MAX_INPUT_CHARS: usize = 50_000;

/// Compound at or beyond this magnitude is labelled positive or negative.
pub const LABEL_THRESHOLD: f64 = 0.05;

const BOOST_INCREMENT: f64 = 0.293;
const BOOST_DECREMENT: f64 = -0.293;
const CAPS_INCREMENT: f64 = 0.733;
const NEGATION_SCALAR: f64 = -0.74;
const NORMALIZATION_ALPHA: f64 = 15.0;
const EXCLAMATION_STEP: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;
const QUESTION_STEP: f64 = 0.18;
const QUESTION_CAP: f64 = 0.96;
/// Damping applied to boosters two and three words back.
const DISTANCE_DAMPING: [f64; 3] = [1.0, 0.95, 0.9];

static VALENCE: LazyLock<HashMap<&'static str, f64>> = LazyLock::new(|| {
    [
        // negative
        ("abuse", -3.2),
        ("abusive", -3.2),
        ("angry", -2.3),
        ("annoyed", -1.6),
        ("annoying", -1.8),
        ("awful", -2.0),
        ("bad", -2.5),
        ("broken", -1.7),
        ("cheat", -2.1),
        ("cheated", -2.3),
        ("complain", -1.5),
        ("crap", -1.6),
        ("damn", -1.7),
        ("dead", -3.3),
        ("die", -2.9),
        ("disappointed", -1.9),
        ("disappointing", -2.2),
        ("disgusting", -2.4),
        ("dumb", -2.3),
        ("fail", -2.5),
        ("failed", -2.3),
        ("failure", -2.3),
        ("fraud", -2.6),
        ("frustrated", -1.5),
        ("frustrating", -1.9),
        ("fuck", -2.5),
        ("fucking", -1.8),
        ("furious", -2.7),
        ("garbage", -1.9),
        ("hate", -2.7),
        ("hell", -3.6),
        ("horrible", -2.5),
        ("idiot", -2.3),
        ("idiots", -2.3),
        ("incompetent", -2.3),
        ("kill", -3.7),
        ("liar", -2.6),
        ("lied", -1.6),
        ("moron", -2.2),
        ("pathetic", -2.2),
        ("poor", -2.1),
        ("problem", -1.7),
        ("ridiculous", -1.6),
        ("rude", -2.0),
        ("sad", -2.1),
        ("scam", -2.4),
        ("shit", -2.6),
        ("stupid", -2.4),
        ("sucks", -1.5),
        ("terrible", -2.1),
        ("threat", -2.4),
        ("trash", -1.9),
        ("unacceptable", -2.0),
        ("unhappy", -1.8),
        ("upset", -1.6),
        ("useless", -1.8),
        ("waste", -1.8),
        ("worst", -3.1),
        ("wrong", -2.1),
        // positive
        ("amazing", 2.8),
        ("appreciate", 1.7),
        ("appreciated", 2.3),
        ("awesome", 3.1),
        ("best", 3.2),
        ("excellent", 2.7),
        ("fantastic", 2.6),
        ("fine", 0.8),
        ("friendly", 2.2),
        ("glad", 2.0),
        ("good", 1.9),
        ("great", 3.1),
        ("happy", 2.7),
        ("helpful", 1.8),
        ("kind", 2.4),
        ("love", 3.2),
        ("nice", 1.8),
        ("perfect", 2.7),
        ("pleased", 1.9),
        ("polite", 1.9),
        ("satisfied", 1.8),
        ("thank", 1.5),
        ("thanks", 1.9),
        ("wonderful", 2.7),
    ]
    .into_iter()
    .collect()
});

static BOOSTERS: LazyLock<HashMap<&'static str, f64>> = LazyLock::new(|| {
    [
        ("absolutely", BOOST_INCREMENT),
        ("completely", BOOST_INCREMENT),
        ("deeply", BOOST_INCREMENT),
        ("especially", BOOST_INCREMENT),
        ("extremely", BOOST_INCREMENT),
        ("highly", BOOST_INCREMENT),
        ("hugely", BOOST_INCREMENT),
        ("incredibly", BOOST_INCREMENT),
        ("really", BOOST_INCREMENT),
        ("seriously", BOOST_INCREMENT),
        ("so", BOOST_INCREMENT),
        ("totally", BOOST_INCREMENT),
        ("truly", BOOST_INCREMENT),
        ("utterly", BOOST_INCREMENT),
        ("very", BOOST_INCREMENT),
        ("barely", BOOST_DECREMENT),
        ("marginally", BOOST_DECREMENT),
        ("partly", BOOST_DECREMENT),
        ("scarcely", BOOST_DECREMENT),
        ("slightly", BOOST_DECREMENT),
        ("somewhat", BOOST_DECREMENT),
    ]
    .into_iter()
    .collect()
});

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "nothing", "nowhere", "neither", "nor", "without", "hardly",
    "cannot", "aint", "isnt", "arent", "wasnt", "werent", "dont", "doesnt", "didnt", "wont",
    "cant", "couldnt", "shouldnt", "wouldnt", "havent", "hasnt", "hadnt",
];

struct Token<'a> {
    raw: &'a str,
    lower: String,
}

impl Token<'_> {
    fn is_shouted(&self) -> bool {
        self.raw.chars().any(char::is_alphabetic)
            && self
                .raw
                .chars()
                .filter(|c| c.is_alphabetic())
                .all(char::is_uppercase)
    }

    fn is_negation(&self) -> bool {
        let squashed: String = self.lower.chars().filter(|c| *c != '\'').collect();
        NEGATIONS.contains(&squashed.as_str()) || self.lower.ends_with("n't")
    }
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(|raw| Token {
            raw,
            lower: raw.to_lowercase(),
        })
        .collect()
}

fn token_valence(tokens: &[Token<'_>], i: usize, caps_differ: bool) -> f64 {
    let token = &tokens[i];
    if BOOSTERS.contains_key(token.lower.as_str()) {
        return 0.0;
    }
    let Some(&base) = VALENCE.get(token.lower.as_str()) else {
        return 0.0;
    };

    let sign = base.signum();
    let mut valence = base;
    if caps_differ && token.is_shouted() {
        valence += sign * CAPS_INCREMENT;
    }

    let mut negated = false;
    for (distance, damping) in DISTANCE_DAMPING.iter().enumerate() {
        let Some(prev) = i.checked_sub(distance + 1).map(|j| &tokens[j]) else {
            break;
        };
        if let Some(&boost) = BOOSTERS.get(prev.lower.as_str()) {
            let mut scalar = boost * sign;
            if caps_differ && prev.is_shouted() {
                scalar += sign * CAPS_INCREMENT;
            }
            valence += scalar * damping;
        }
        negated |= prev.is_negation();
    }
    if negated {
        valence *= NEGATION_SCALAR;
    }
    valence
}

fn punctuation_emphasis(text: &str) -> f64 {
    let exclamations = text.matches('!').count().min(MAX_EXCLAMATIONS);
    let questions = text.matches('?').count();
    let question_emphasis = match questions {
        0 | 1 => 0.0,
        2..=3 => questions as f64 * QUESTION_STEP,
        _ => QUESTION_CAP,
    };
    exclamations as f64 * EXCLAMATION_STEP + question_emphasis
}

fn normalize(score: f64) -> f64 {
    (score / (score * score + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn label_for(compound: f64) -> SentimentLabel {
    if compound >= LABEL_THRESHOLD {
        SentimentLabel::Positive
    } else if compound <= -LABEL_THRESHOLD {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

/// Score `text`. Empty text is neutral with all sub-scores zero.
pub fn analyze_sentiment(text: &str) -> Result<SentimentFinding, SignalError> {
    let actual = text.chars().count();
    if actual > MAX_INPUT_CHARS {
        return Err(SignalError::InputTooLarge {
            detector: "sentiment_analyzer",
            actual,
            limit: MAX_INPUT_CHARS,
        });
    }

    let tokens = tokenize(text);
    let shouted = tokens.iter().filter(|t| t.is_shouted()).count();
    let caps_differ = shouted > 0 && shouted < tokens.len();

    let mut valences: Vec<f64> = (0..tokens.len())
        .map(|i| token_valence(&tokens, i, caps_differ))
        .collect();

    if let Some(pivot) = tokens.iter().position(|t| t.lower == "but") {
        for (i, v) in valences.iter_mut().enumerate() {
            *v *= if i < pivot { 0.5 } else { 1.5 };
        }
    }

    let emphasis = punctuation_emphasis(text);
    let mut sum: f64 = valences.iter().sum();
    if sum > 0.0 {
        sum += emphasis;
    } else if sum < 0.0 {
        sum -= emphasis;
    }
    let compound = if valences.iter().any(|v| *v != 0.0) {
        round_to(normalize(sum), 4)
    } else {
        0.0
    };

    let mut positive_sum: f64 = valences.iter().filter(|v| **v > 0.0).map(|v| v + 1.0).sum();
    let mut negative_sum: f64 = valences.iter().filter(|v| **v < 0.0).map(|v| v - 1.0).sum();
    let neutral_count = valences.iter().filter(|v| **v == 0.0).count() as f64;
    if positive_sum > negative_sum.abs() {
        positive_sum += emphasis;
    } else if positive_sum < negative_sum.abs() {
        negative_sum -= emphasis;
    }
    let total = positive_sum + negative_sum.abs() + neutral_count;
    let (positive, negative, neutral) = if total > 0.0 {
        (
            round_to(positive_sum / total, 3),
            round_to(negative_sum.abs() / total, 3),
            round_to(neutral_count / total, 3),
        )
    } else {
        (0.0, 0.0, 0.0)
    };

    if !compound.is_finite() || !positive.is_finite() || !negative.is_finite() {
        return Err(SignalError::NonFiniteScore);
    }

    Ok(SentimentFinding {
        sentiment: label_for(compound),
        compound_score: compound,
        positive_score: positive,
        negative_score: negative,
        neutral_score: neutral,
        intensity: compound.abs(),
    })
}

/// Valence-lexicon sentiment detector.
pub struct SentimentAnalyzer;

impl SignalDetector for SentimentAnalyzer {
    fn kind(&self) -> SignalKind {
        SignalKind::Sentiment
    }

    fn detect(&self, text: &str) -> Result<SignalReport, SignalError> {
        analyze_sentiment(text).map(SignalReport::Sentiment)
    }
}

pub(crate) fn warm_up() -> usize {
    VALENCE.len() + BOOSTERS.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compound(text: &str) -> f64 {
        analyze_sentiment(text).unwrap().compound_score
    }

    #[test]
    fn empty_text_is_neutral_zero() {
        let f = analyze_sentiment("").unwrap();
        assert_eq!(f.sentiment, SentimentLabel::Neutral);
        assert_eq!(f.compound_score, 0.0);
        assert_eq!(f.positive_score, 0.0);
        assert_eq!(f.negative_score, 0.0);
        assert_eq!(f.neutral_score, 0.0);
        assert_eq!(f.intensity, 0.0);
    }

    #[test]
    fn shouted_insult_is_strongly_negative() {
        let f = analyze_sentiment("YOU ARE AN IDIOT!!!!").unwrap();
        assert_eq!(f.sentiment, SentimentLabel::Negative);
        assert!(f.intensity > 0.6, "intensity {}", f.intensity);
        assert_eq!(f.intensity, f.compound_score.abs());
    }

    #[test]
    fn thanks_is_positive() {
        let f = analyze_sentiment("Thank you for resolving this quickly").unwrap();
        assert_eq!(f.sentiment, SentimentLabel::Positive);
        assert!(f.positive_score > 0.0);
        assert_eq!(f.negative_score, 0.0);
    }

    #[test]
    fn neutral_text_without_lexicon_words() {
        let f = analyze_sentiment("The parcel arrived on Tuesday").unwrap();
        assert_eq!(f.sentiment, SentimentLabel::Neutral);
        assert_eq!(f.neutral_score, 1.0);
    }

    #[test]
    fn negation_flips_polarity() {
        assert!(compound("the support was good") > 0.0);
        assert!(compound("the support was not good") < 0.0);
        assert!(compound("the support wasn't good") < 0.0);
    }

    #[test]
    fn boosters_increase_magnitude() {
        assert!(compound("the service is very bad") < compound("the service is bad"));
        assert!(compound("the service is slightly bad") > compound("the service is bad"));
    }

    #[test]
    fn caps_emphasis_only_with_mixed_case() {
        assert!(compound("the service is BAD today") < compound("the service is bad today"));
    }

    #[test]
    fn but_shifts_weight_to_second_clause() {
        let f = analyze_sentiment("The product is good but the staff were rude").unwrap();
        assert_eq!(f.sentiment, SentimentLabel::Negative);
    }

    #[test]
    fn exclamations_amplify() {
        assert!(compound("this is terrible!!!") < compound("this is terrible"));
    }

    #[test]
    fn scores_stay_bounded() {
        let text = "worst worst hate hate kill kill abuse abuse hell hell!!!!!!".repeat(20);
        let f = analyze_sentiment(&text).unwrap();
        assert!((-1.0..=1.0).contains(&f.compound_score));
        let sum = f.positive_score + f.negative_score + f.neutral_score;
        assert!((sum - 1.0).abs() < 0.01, "sub-scores sum {sum}");
    }

    #[test]
    fn label_thresholds() {
        assert_eq!(label_for(0.05), SentimentLabel::Positive);
        assert_eq!(label_for(-0.05), SentimentLabel::Negative);
        assert_eq!(label_for(0.049), SentimentLabel::Neutral);
    }

    #[test]
    fn oversized_input_is_rejected() {
        let text = "a ".repeat(MAX_INPUT_CHARS);
        assert!(matches!(
            analyze_sentiment(&text),
            Err(SignalError::InputTooLarge { .. })
        ));
    }
}
