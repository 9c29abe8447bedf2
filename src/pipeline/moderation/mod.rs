//! Scoring, escalation and merging of one complaint text.
//!
//! [`ModerationEngine::decide`] is the whole per-text decision: run the
//! detectors, aggregate, consult the secondary analyzer when the policy (or
//! forced mode) asks for it, and merge. It never fails; every error path has
//! a designated fail-safe value recorded in the envelope.

pub mod aggregator;
pub mod escalation;
pub mod merge;
pub mod types;

pub use aggregator::Aggregator;
pub use types::*;

use crate::models::UserContext;
use crate::pipeline::secondary::{SecondaryAnalyzer, SecondaryError, SecondaryJudgment};
use crate::pipeline::signals::SignalSuite;

pub struct ModerationEngine {
    suite: SignalSuite,
    aggregator: Aggregator,
}

impl ModerationEngine {
    pub fn new(suite: SignalSuite, aggregator: Aggregator) -> Self {
        Self { suite, aggregator }
    }

    /// Standard detectors with the given flag threshold.
    pub fn standard(severity_threshold: f64) -> Self {
        Self::new(SignalSuite::standard(), Aggregator::new(severity_threshold))
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Decide on `text`. With `force_secondary` the escalation policy is
    /// bypassed and the secondary analyzer alone decides; detectors still
    /// run so the envelope keeps a full audit trail.
    pub fn decide(
        &self,
        text: &str,
        context: Option<&UserContext>,
        analyzer: &dyn SecondaryAnalyzer,
        force_secondary: bool,
    ) -> DecisionEnvelope {
        let signals = self.suite.run(text);
        let assessment = self.aggregator.assess(&signals);

        let (secondary, final_decision) = if force_secondary {
            let result = analyzer.analyze(text, context);
            let decision = merge::secondary_only(result.as_ref(), &assessment.triggered_methods);
            (outcome_of(result, analyzer.model_id()), decision)
        } else if assessment.requires_secondary_analysis {
            let result = analyzer.analyze(text, context);
            let decision = merge::combine(&assessment, result.as_ref().ok());
            (outcome_of(result, analyzer.model_id()), decision)
        } else {
            (SecondaryOutcome::NotRequested, merge::combine(&assessment, None))
        };

        tracing::debug!(
            score = assessment.total_score,
            severity = %final_decision.severity_level,
            method = %final_decision.primary_method,
            escalation = ?assessment.escalation_reason,
            "Decision reached"
        );

        DecisionEnvelope {
            signals,
            assessment,
            secondary,
            final_decision,
            processing_timestamp: chrono::Utc::now().naive_utc(),
        }
    }
}

fn outcome_of(result: Result<SecondaryJudgment, SecondaryError>, model_id: &str) -> SecondaryOutcome {
    match result {
        Ok(judgment) => SecondaryOutcome::Completed { judgment },
        Err(e) => {
            tracing::warn!(model = model_id, error = %e, "Secondary analysis unavailable");
            SecondaryOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::SentimentLabel;
    use crate::pipeline::secondary::SecondaryJudgment;
    use crate::pipeline::signals::{
        LexicalFinding, SentimentFinding, SignalKind, SignalReport, SignalSet, StatisticalFinding,
        TextStats,
    };

    pub fn stats(uppercase_ratio: f64, exclamation_count: usize) -> SignalReport {
        SignalReport::TextStats(TextStats {
            char_count: 40,
            word_count: 8,
            sentence_count: 1,
            avg_word_length: 4.0,
            uppercase_ratio,
            exclamation_count,
            question_count: 0,
        })
    }

    pub fn lexical_hit(words: &[&str]) -> SignalReport {
        SignalReport::Lexical(LexicalFinding {
            has_profanity: !words.is_empty(),
            flagged_words: words.iter().map(|w| w.to_string()).collect(),
            word_count: words.len(),
            censored_preview: String::new(),
        })
    }

    pub fn ml_hit(probability: f64) -> SignalReport {
        SignalReport::Statistical(StatisticalFinding {
            is_profane: true,
            profanity_probability: probability,
            confidence: probability,
            model: "test".into(),
        })
    }

    pub fn ml_clean() -> SignalReport {
        SignalReport::Statistical(StatisticalFinding {
            is_profane: false,
            profanity_probability: 0.05,
            confidence: 0.95,
            model: "test".into(),
        })
    }

    pub fn negative_sentiment(intensity: f64) -> SignalReport {
        SignalReport::Sentiment(SentimentFinding {
            sentiment: SentimentLabel::Negative,
            compound_score: -intensity,
            positive_score: 0.0,
            negative_score: 0.5,
            neutral_score: 0.5,
            intensity,
        })
    }

    pub fn neutral_sentiment() -> SignalReport {
        SignalReport::Sentiment(SentimentFinding {
            sentiment: SentimentLabel::Neutral,
            compound_score: 0.0,
            positive_score: 0.0,
            negative_score: 0.0,
            neutral_score: 1.0,
            intensity: 0.0,
        })
    }

    pub fn failed(kind: SignalKind) -> SignalReport {
        SignalReport::Failed {
            source: kind,
            error: "detector failed".into(),
        }
    }

    /// Signals of a text that triggers nothing.
    pub fn clean_signals() -> SignalSet {
        SignalSet::new()
            .with(stats(0.0, 0))
            .with(lexical_hit(&[]))
            .with(ml_clean())
            .with(neutral_sentiment())
    }

    pub fn judgment(urgency: &str, action: &str, confidence: Option<f64>) -> SecondaryJudgment {
        SecondaryJudgment {
            toxicity_score: 5.0,
            threat_level: "LOW".into(),
            issues: vec!["personal attacks".into()],
            urgency: urgency.into(),
            recommended_action: action.into(),
            summary: "Test summary".into(),
            confidence,
            requires_human_review: false,
            model_id: "mock".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::fixtures::judgment;
    use super::*;
    use crate::models::{DecisionMethod, Severity};

    struct StubAnalyzer {
        result: Result<SecondaryJudgment, SecondaryError>,
        calls: Cell<usize>,
    }

    impl StubAnalyzer {
        fn ok(j: SecondaryJudgment) -> Self {
            Self { result: Ok(j), calls: Cell::new(0) }
        }

        fn err(e: SecondaryError) -> Self {
            Self { result: Err(e), calls: Cell::new(0) }
        }
    }

    impl SecondaryAnalyzer for StubAnalyzer {
        fn analyze(
            &self,
            _text: &str,
            _context: Option<&UserContext>,
        ) -> Result<SecondaryJudgment, SecondaryError> {
            self.calls.set(self.calls.get() + 1);
            self.result.clone()
        }

        fn model_id(&self) -> &str {
            "stub"
        }
    }

    fn engine() -> ModerationEngine {
        ModerationEngine::standard(3.0)
    }

    #[test]
    fn clean_text_skips_secondary() {
        let analyzer = StubAnalyzer::ok(judgment("CRITICAL", "ESCALATE", Some(1.0)));
        let env = engine().decide("Thank you for resolving this quickly", None, &analyzer, false);
        assert_eq!(analyzer.calls.get(), 0);
        assert_eq!(env.secondary, SecondaryOutcome::NotRequested);
        assert_eq!(env.final_decision.primary_method, DecisionMethod::LibrariesOnly);
        assert_eq!(env.final_decision.severity_level, Severity::Low);
        assert!(!env.final_decision.should_flag);
    }

    #[test]
    fn escalated_text_is_combined() {
        let analyzer = StubAnalyzer::ok(judgment("LOW", "APPROVE", Some(0.9)));
        let env = engine().decide("YOU ARE AN IDIOT!!!!", None, &analyzer, false);
        assert_eq!(analyzer.calls.get(), 1);
        assert_eq!(env.final_decision.primary_method, DecisionMethod::CombinedAnalysis);
        assert_eq!(env.final_decision.severity_level, Severity::Critical);
        assert!(env.final_decision.should_flag);
        assert!(env.secondary_used());
    }

    #[test]
    fn secondary_timeout_keeps_assessment() {
        let analyzer = StubAnalyzer::err(SecondaryError::Timeout(30));
        let env = engine().decide("YOU ARE AN IDIOT!!!!", None, &analyzer, false);
        assert_eq!(analyzer.calls.get(), 1);
        let d = &env.final_decision;
        assert_eq!(d.primary_method, DecisionMethod::LibrariesOnly);
        assert_eq!(d.severity_level, env.assessment.severity_level);
        assert_eq!(d.recommended_action, env.assessment.recommended_action);
        assert_eq!(d.confidence, env.assessment.confidence);
        assert_eq!(d.reasoning, env.assessment.concerns);
        assert!(matches!(env.secondary, SecondaryOutcome::Failed { .. }));
        assert!(!env.secondary_used());
    }

    #[test]
    fn forced_mode_always_calls_secondary() {
        let analyzer = StubAnalyzer::ok(judgment("MEDIUM", "REVIEW", None));
        let env = engine().decide("Thank you for resolving this quickly", None, &analyzer, true);
        assert_eq!(analyzer.calls.get(), 1);
        assert_eq!(env.final_decision.primary_method, DecisionMethod::AiOnly);
        assert!(env.final_decision.should_flag);
        assert_eq!(env.signals.len(), 4);
    }

    #[test]
    fn forced_mode_failure_falls_back_to_review() {
        let analyzer = StubAnalyzer::err(SecondaryError::Connection("http://x".into()));
        let env = engine().decide("Thank you for resolving this quickly", None, &analyzer, true);
        assert_eq!(env.final_decision.primary_method, DecisionMethod::AiErrorFallback);
        assert_eq!(env.final_decision.severity_level, Severity::High);
        assert!(env.final_decision.should_flag);
    }

    #[test]
    fn envelope_serializes() {
        let analyzer = StubAnalyzer::ok(judgment("LOW", "APPROVE", None));
        let env = engine().decide("The courier left my parcel in the rain", None, &analyzer, false);
        let json = serde_json::to_value(&env).unwrap();
        assert!(json["final_decision"]["primary_method"].is_string());
        assert!(json["signals"]["reports"].is_object());
        let back: DecisionEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back.final_decision.primary_method, env.final_decision.primary_method);
        assert_eq!(back.signals.len(), env.signals.len());
    }
}
