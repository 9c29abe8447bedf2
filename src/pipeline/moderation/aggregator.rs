//! Weighted scoring of detector findings.
//!
//! Each rule reads one finding from the [`SignalSet`] and adds a fixed
//! contribution. Because the set is keyed by signal kind, the score does
//! not depend on the order detectors ran in.

use std::collections::BTreeSet;

use super::escalation;
use super::types::{AggregateAssessment, AggregationError};
use crate::models::{Recommendation, SentimentLabel, Severity, TriggeredMethod};
use crate::pipeline::signals::{SignalKind, SignalSet};

pub const DEFAULT_SEVERITY_THRESHOLD: f64 = 3.0;

/// Divisor mapping total score onto [0, 1] confidence.
pub const CONFIDENCE_NORMALIZER: f64 = 6.0;
pub const CRITICAL_SCORE: f64 = 5.0;
pub const HIGH_SCORE: f64 = 3.5;

const ML_WEIGHT: f64 = 4.0;
const DICTIONARY_WEIGHT_PER_TERM: f64 = 1.5;
const DICTIONARY_CAP: f64 = 3.0;
const STRONG_SENTIMENT_INTENSITY: f64 = 0.6;
const MODERATE_SENTIMENT_INTENSITY: f64 = 0.3;
const STRONG_SENTIMENT_WEIGHT: f64 = 2.0;
const CAPS_RATIO: f64 = 0.3;
const CAPS_BONUS: f64 = 0.5;
const EXCLAMATION_LIMIT: usize = 3;
const EXCLAMATION_BONUS: f64 = 0.3;
const DICTIONARY_TERMS_SHOWN: usize = 3;

/// Severity and recommendation for a total score.
/// Bands apply only once the score reaches the flag threshold.
pub fn severity_for(total_score: f64, threshold: f64) -> (bool, Severity, Recommendation) {
    let should_flag = total_score >= threshold;
    if !should_flag {
        return (false, Severity::Low, Recommendation::Approve);
    }
    let (severity, action) = if total_score >= CRITICAL_SCORE {
        (Severity::Critical, Recommendation::Escalate)
    } else if total_score >= HIGH_SCORE {
        (Severity::High, Recommendation::Flag)
    } else {
        (Severity::Medium, Recommendation::Review)
    };
    (true, severity, action)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregator {
    severity_threshold: f64,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_SEVERITY_THRESHOLD)
    }
}

impl Aggregator {
    pub fn new(severity_threshold: f64) -> Self {
        Self { severity_threshold }
    }

    pub fn severity_threshold(&self) -> f64 {
        self.severity_threshold
    }

    /// Score `signals`, or explain why they cannot be scored.
    pub fn try_aggregate(&self, signals: &SignalSet) -> Result<AggregateAssessment, AggregationError> {
        if !self.severity_threshold.is_finite() || self.severity_threshold <= 0.0 {
            return Err(AggregationError::InvalidThreshold(self.severity_threshold));
        }
        if signals.lexical().is_none()
            && signals.statistical().is_none()
            && signals.sentiment().is_none()
        {
            return Err(AggregationError::NoUsableSignals);
        }

        let mut total = 0.0;
        let mut triggered = BTreeSet::new();
        let mut concerns = Vec::new();

        if let Some(ml) = signals.statistical() {
            if !ml.profanity_probability.is_finite() {
                return Err(AggregationError::NonFiniteSignal(SignalKind::Statistical));
            }
            if ml.is_profane {
                triggered.insert(TriggeredMethod::MlProfanity);
                total += ml.profanity_probability * ML_WEIGHT;
                concerns.push(format!(
                    "ML detected profanity (confidence: {:.2})",
                    ml.profanity_probability
                ));
            }
        }

        if let Some(dict) = signals.lexical() {
            if dict.has_profanity {
                triggered.insert(TriggeredMethod::DictionaryProfanity);
                total += (dict.word_count as f64 * DICTIONARY_WEIGHT_PER_TERM).min(DICTIONARY_CAP);
                let shown = &dict.flagged_words[..dict.flagged_words.len().min(DICTIONARY_TERMS_SHOWN)];
                concerns.push(format!(
                    "Dictionary flagged {} word(s): {:?}",
                    dict.flagged_words.len(),
                    shown
                ));
            }
        }

        if let Some(sentiment) = signals.sentiment() {
            if !sentiment.intensity.is_finite() {
                return Err(AggregationError::NonFiniteSignal(SignalKind::Sentiment));
            }
            if sentiment.sentiment == SentimentLabel::Negative {
                let intensity = sentiment.intensity;
                if intensity > STRONG_SENTIMENT_INTENSITY {
                    triggered.insert(TriggeredMethod::StrongNegativeSentiment);
                    total += intensity * STRONG_SENTIMENT_WEIGHT;
                    concerns.push(format!("Strong negative sentiment (intensity: {intensity:.2})"));
                } else if intensity > MODERATE_SENTIMENT_INTENSITY {
                    triggered.insert(TriggeredMethod::ModerateNegativeSentiment);
                    total += intensity;
                    concerns.push(format!("Moderate negative sentiment (intensity: {intensity:.2})"));
                }
            }
        }

        if let Some(stats) = signals.text_stats() {
            if !stats.uppercase_ratio.is_finite() {
                return Err(AggregationError::NonFiniteSignal(SignalKind::TextStats));
            }
            if stats.uppercase_ratio > CAPS_RATIO {
                triggered.insert(TriggeredMethod::ExcessiveCaps);
                total += CAPS_BONUS;
                concerns.push("Excessive capital letters detected".to_string());
            }
            if stats.exclamation_count > EXCLAMATION_LIMIT {
                total += EXCLAMATION_BONUS;
                concerns.push("Multiple exclamation marks".to_string());
            }
        }

        let confidence = (total / CONFIDENCE_NORMALIZER).min(1.0);
        let (should_flag, severity_level, recommended_action) =
            severity_for(total, self.severity_threshold);
        let escalation_reason = escalation::evaluate(confidence, &triggered);

        Ok(AggregateAssessment {
            total_score: total,
            should_flag,
            severity_level,
            triggered_methods: triggered,
            concerns,
            confidence,
            recommended_action,
            requires_secondary_analysis: escalation_reason.is_some(),
            escalation_reason,
            error: None,
        })
    }

    /// Score `signals`, degrading to the review fail-safe on any error.
    pub fn assess(&self, signals: &SignalSet) -> AggregateAssessment {
        self.try_aggregate(signals).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Aggregation failed, using fail-safe assessment");
            AggregateAssessment::fail_safe(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::moderation::fixtures::*;
    use crate::pipeline::signals::{SignalReport, SignalSuite};

    #[test]
    fn shouted_insult_is_critical() {
        let signals = SignalSuite::standard().run("YOU ARE AN IDIOT!!!!");
        let a = Aggregator::default().assess(&signals);
        assert!(a.total_score >= 5.0, "score {}", a.total_score);
        assert_eq!(a.severity_level, Severity::Critical);
        assert_eq!(a.recommended_action, Recommendation::Escalate);
        assert!(a.should_flag);
        assert!(a.triggered_methods.contains(&TriggeredMethod::MlProfanity));
        assert!(a.triggered_methods.contains(&TriggeredMethod::DictionaryProfanity));
        assert!(a.triggered_methods.contains(&TriggeredMethod::ExcessiveCaps));
        assert!(a.concerns.contains(&"Multiple exclamation marks".to_string()));
        assert!(a.requires_secondary_analysis);
    }

    #[test]
    fn polite_text_scores_zero() {
        let signals = SignalSuite::standard().run("Thank you for resolving this quickly");
        let a = Aggregator::default().assess(&signals);
        assert_eq!(a.total_score, 0.0);
        assert_eq!(a.confidence, 0.0);
        assert_eq!(a.severity_level, Severity::Low);
        assert_eq!(a.recommended_action, Recommendation::Approve);
        assert!(!a.should_flag);
        assert!(!a.requires_secondary_analysis);
        assert!(a.triggered_methods.is_empty());
        assert!(a.concerns.is_empty());
    }

    #[test]
    fn sole_strong_sentiment_escalates() {
        let signals = clean_signals().with(negative_sentiment(0.8));
        let a = Aggregator::default().assess(&signals);
        assert!((a.total_score - 1.6).abs() < 1e-9);
        assert!((a.confidence - 1.6 / 6.0).abs() < 1e-9);
        assert_eq!(a.severity_level, Severity::Low);
        assert_eq!(
            a.triggered_methods.iter().copied().collect::<Vec<_>>(),
            vec![TriggeredMethod::StrongNegativeSentiment]
        );
        assert!(a.requires_secondary_analysis);
        assert_eq!(
            a.escalation_reason,
            Some(crate::pipeline::moderation::EscalationReason::SoleStrongSentiment)
        );
    }

    #[test]
    fn moderate_sentiment_adds_intensity() {
        let signals = clean_signals().with(negative_sentiment(0.45));
        let a = Aggregator::default().assess(&signals);
        assert!((a.total_score - 0.45).abs() < 1e-9);
        assert!(a.triggered_methods.contains(&TriggeredMethod::ModerateNegativeSentiment));
        assert_eq!(a.concerns, vec!["Moderate negative sentiment (intensity: 0.45)"]);
    }

    #[test]
    fn dictionary_contribution_is_capped() {
        let signals = clean_signals().with(lexical_hit(&["crap", "damn", "idiot", "moron"]));
        let a = Aggregator::default().assess(&signals);
        assert_eq!(a.total_score, 3.0);
        assert_eq!(a.severity_level, Severity::Medium);
        assert_eq!(a.recommended_action, Recommendation::Review);
        assert_eq!(
            a.concerns,
            vec![r#"Dictionary flagged 4 word(s): ["crap", "damn", "idiot"]"#]
        );
    }

    #[test]
    fn ml_contribution_scales_probability() {
        let signals = clean_signals().with(ml_hit(0.9));
        let a = Aggregator::default().assess(&signals);
        assert!((a.total_score - 3.6).abs() < 1e-9);
        assert_eq!(a.severity_level, Severity::High);
        assert_eq!(a.recommended_action, Recommendation::Flag);
        assert_eq!(a.concerns, vec!["ML detected profanity (confidence: 0.90)"]);
    }

    #[test]
    fn concerns_follow_rule_order() {
        let signals = clean_signals()
            .with(stats(0.8, 5))
            .with(negative_sentiment(0.9))
            .with(lexical_hit(&["damn"]))
            .with(ml_hit(0.7));
        let a = Aggregator::default().assess(&signals);
        assert!(a.concerns[0].starts_with("ML detected"));
        assert!(a.concerns[1].starts_with("Dictionary flagged"));
        assert!(a.concerns[2].starts_with("Strong negative"));
        assert_eq!(a.concerns[3], "Excessive capital letters detected");
        assert_eq!(a.concerns[4], "Multiple exclamation marks");
    }

    #[test]
    fn detector_order_does_not_change_result() {
        let reports = vec![stats(0.5, 4), ml_hit(0.8), lexical_hit(&["damn"]), negative_sentiment(0.7)];
        let forward: SignalSet = reports.iter().cloned().collect();
        let backward: SignalSet = reports.into_iter().rev().collect();
        let agg = Aggregator::default();
        let a = serde_json::to_string(&agg.assess(&forward)).unwrap();
        let b = serde_json::to_string(&agg.assess(&backward)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, serde_json::to_string(&agg.assess(&forward)).unwrap());
    }

    #[test]
    fn confidence_bounded_at_maximum_score() {
        let signals = clean_signals()
            .with(ml_hit(1.0))
            .with(lexical_hit(&["a1", "b1", "c1"]))
            .with(negative_sentiment(1.0))
            .with(stats(1.0, 10));
        let a = Aggregator::default().assess(&signals);
        assert!((a.total_score - 9.8).abs() < 1e-9);
        assert_eq!(a.confidence, 1.0);
    }

    #[test]
    fn severity_is_monotonic_in_score() {
        let mut last_rank = 0;
        for step in 0..=80 {
            let score = step as f64 * 0.1;
            let (_, severity, _) = severity_for(score, DEFAULT_SEVERITY_THRESHOLD);
            assert!(severity.rank() >= last_rank, "dropped at {score}");
            last_rank = severity.rank();
        }
    }

    #[test]
    fn severity_breakpoints() {
        assert_eq!(severity_for(2.99, 3.0), (false, Severity::Low, Recommendation::Approve));
        assert_eq!(severity_for(3.0, 3.0), (true, Severity::Medium, Recommendation::Review));
        assert_eq!(severity_for(3.5, 3.0), (true, Severity::High, Recommendation::Flag));
        assert_eq!(severity_for(5.0, 3.0), (true, Severity::Critical, Recommendation::Escalate));
    }

    #[test]
    fn custom_threshold_moves_flag_point() {
        let signals = clean_signals().with(negative_sentiment(0.8));
        let a = Aggregator::new(1.5).assess(&signals);
        assert!(a.should_flag);
        assert_eq!(a.severity_level, Severity::Medium);
    }

    #[test]
    fn all_scoring_signals_failed_gives_fail_safe() {
        let signals: SignalSet = vec![
            stats(0.0, 0),
            failed(SignalKind::Lexical),
            failed(SignalKind::Statistical),
            failed(SignalKind::Sentiment),
        ]
        .into_iter()
        .collect();
        let agg = Aggregator::default();
        assert_eq!(agg.try_aggregate(&signals), Err(AggregationError::NoUsableSignals));
        let a = agg.assess(&signals);
        assert!(a.should_flag);
        assert_eq!(a.severity_level, Severity::High);
        assert_eq!(a.recommended_action, Recommendation::Review);
        assert!(a.error.is_some());
    }

    #[test]
    fn one_failed_detector_still_scores() {
        let signals = clean_signals().with(failed(SignalKind::Statistical)).with(lexical_hit(&["damn"]));
        let a = Aggregator::default().try_aggregate(&signals).unwrap();
        assert_eq!(a.total_score, 1.5);
    }

    #[test]
    fn non_finite_probability_is_an_error() {
        let signals = clean_signals().with(ml_hit(f64::NAN));
        assert_eq!(
            Aggregator::default().try_aggregate(&signals),
            Err(AggregationError::NonFiniteSignal(SignalKind::Statistical))
        );
        assert!(Aggregator::default().assess(&signals).is_fail_safe());
    }

    #[test]
    fn invalid_threshold_is_an_error() {
        let result = Aggregator::new(f64::INFINITY).try_aggregate(&clean_signals());
        assert!(matches!(result, Err(AggregationError::InvalidThreshold(_))));
    }

    #[test]
    fn failed_report_kind_is_kept() {
        let r = failed(SignalKind::Lexical);
        assert!(matches!(r, SignalReport::Failed { source: SignalKind::Lexical, .. }));
    }
}
