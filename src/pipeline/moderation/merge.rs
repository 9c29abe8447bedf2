//! Combining the aggregate assessment with a secondary judgment.
//!
//! The secondary analyzer may raise severity but never lower it: its
//! judgment replaces the aggregate's only when its severity rank is
//! strictly greater.

use std::collections::BTreeSet;

use super::types::{AggregateAssessment, FinalDecision, SecondaryInsights};
use crate::models::{DecisionMethod, Recommendation, Severity, TriggeredMethod};
use crate::pipeline::secondary::{SecondaryError, SecondaryJudgment};

pub const RAISED_SEVERITY_NOTE: &str = "Secondary analysis raised severity assessment";

/// Confidence assumed when a forced secondary judgment reports none.
pub const DEFAULT_SECONDARY_CONFIDENCE: f64 = 0.8;

/// Confidence recorded with the forced-mode fallback decision.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Decision from the aggregate alone.
pub fn from_assessment(assessment: &AggregateAssessment) -> FinalDecision {
    FinalDecision {
        should_flag: assessment.should_flag,
        severity_level: assessment.severity_level,
        confidence: assessment.confidence,
        recommended_action: assessment.recommended_action,
        primary_method: DecisionMethod::LibrariesOnly,
        reasoning: assessment.concerns.clone(),
        detection_methods: assessment.triggered_methods.clone(),
        secondary_insights: None,
        error: assessment.error.clone(),
    }
}

/// Merge an aggregate with an optional successful secondary judgment.
/// Without a judgment the aggregate decides alone ("libraries_only").
pub fn combine(
    assessment: &AggregateAssessment,
    secondary: Option<&SecondaryJudgment>,
) -> FinalDecision {
    let mut decision = from_assessment(assessment);
    let Some(judgment) = secondary else {
        return decision;
    };
    decision.primary_method = DecisionMethod::CombinedAnalysis;

    let secondary_severity = judgment.severity();
    if secondary_severity.rank() <= assessment.severity_level.rank() {
        return decision;
    }

    decision.severity_level = secondary_severity;
    // An unreadable action on a raised severity goes to review.
    decision.recommended_action = judgment.recommendation().unwrap_or(Recommendation::Review);
    decision.confidence = assessment.confidence.max(judgment.confidence_or(0.0));
    decision.should_flag |= decision.recommended_action.is_flagging();
    decision.secondary_insights = Some(SecondaryInsights::from(judgment));
    decision.reasoning.push(RAISED_SEVERITY_NOTE.to_string());
    decision
}

/// Forced mode: the secondary analyzer decides alone. A failure yields the
/// review fail-safe ("ai_error_fallback").
pub fn secondary_only(
    outcome: Result<&SecondaryJudgment, &SecondaryError>,
    detection_methods: &BTreeSet<TriggeredMethod>,
) -> FinalDecision {
    match outcome {
        Ok(judgment) => {
            let action = forced_recommendation(judgment);
            let summary = judgment.summary.trim();
            FinalDecision {
                should_flag: action.is_flagging(),
                severity_level: judgment.severity(),
                confidence: judgment.confidence_or(DEFAULT_SECONDARY_CONFIDENCE),
                recommended_action: action,
                primary_method: DecisionMethod::AiOnly,
                reasoning: vec![if summary.is_empty() {
                    "Secondary analysis completed".to_string()
                } else {
                    summary.to_string()
                }],
                detection_methods: detection_methods.clone(),
                secondary_insights: Some(SecondaryInsights::from(judgment)),
                error: None,
            }
        }
        Err(e) => FinalDecision {
            should_flag: true,
            severity_level: Severity::High,
            confidence: FALLBACK_CONFIDENCE,
            recommended_action: Recommendation::Review,
            primary_method: DecisionMethod::AiErrorFallback,
            reasoning: vec!["Secondary analysis failed; manual review required".to_string()],
            detection_methods: detection_methods.clone(),
            secondary_insights: None,
            error: Some(e.to_string()),
        },
    }
}

// A missing action means approve; an unrecognized one goes to review.
fn forced_recommendation(judgment: &SecondaryJudgment) -> Recommendation {
    if judgment.recommended_action.trim().is_empty() {
        return Recommendation::Approve;
    }
    judgment.recommendation().unwrap_or(Recommendation::Review)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::moderation::aggregator::Aggregator;
    use crate::pipeline::moderation::fixtures::*;

    fn assessment_with(severity_score: f64) -> AggregateAssessment {
        // ML hit with probability p contributes 4p.
        let signals = clean_signals().with(ml_hit(severity_score / 4.0));
        Aggregator::default().assess(&signals)
    }

    #[test]
    fn no_judgment_keeps_assessment() {
        let a = assessment_with(3.6);
        let d = combine(&a, None);
        assert_eq!(d.primary_method, DecisionMethod::LibrariesOnly);
        assert_eq!(d.severity_level, a.severity_level);
        assert_eq!(d.recommended_action, a.recommended_action);
        assert_eq!(d.confidence, a.confidence);
        assert_eq!(d.should_flag, a.should_flag);
        assert_eq!(d.reasoning, a.concerns);
        assert_eq!(d.detection_methods, a.triggered_methods);
        assert!(d.secondary_insights.is_none());
    }

    #[test]
    fn higher_secondary_severity_overrides() {
        let a = assessment_with(3.6);
        assert_eq!(a.severity_level, Severity::High);
        let j = judgment("CRITICAL", "ESCALATE", Some(0.95));
        let d = combine(&a, Some(&j));
        assert_eq!(d.primary_method, DecisionMethod::CombinedAnalysis);
        assert_eq!(d.severity_level, Severity::Critical);
        assert_eq!(d.recommended_action, Recommendation::Escalate);
        assert_eq!(d.confidence, 0.95);
        assert_eq!(d.reasoning.last().map(String::as_str), Some(RAISED_SEVERITY_NOTE));
        assert!(d.secondary_insights.is_some());
    }

    #[test]
    fn confidence_takes_the_larger() {
        let a = assessment_with(3.6);
        let j = judgment("CRITICAL", "ESCALATE", Some(0.1));
        assert_eq!(combine(&a, Some(&j)).confidence, a.confidence);
    }

    #[test]
    fn equal_or_lower_secondary_severity_ignored() {
        let a = assessment_with(3.6);
        for urgency in ["LOW", "MEDIUM", "HIGH", "bogus", ""] {
            let j = judgment(urgency, "APPROVE", Some(0.99));
            let d = combine(&a, Some(&j));
            assert_eq!(d.primary_method, DecisionMethod::CombinedAnalysis);
            assert_eq!(d.severity_level, Severity::High, "urgency {urgency}");
            assert_eq!(d.recommended_action, Recommendation::Flag);
            assert_eq!(d.confidence, a.confidence);
            assert!(d.secondary_insights.is_none());
        }
    }

    #[test]
    fn merge_never_lowers_severity() {
        let urgencies = ["LOW", "MEDIUM", "HIGH", "CRITICAL", "unknown"];
        for score in [0.0, 3.0, 3.6, 5.2] {
            let a = assessment_with(score);
            for urgency in urgencies {
                for action in ["APPROVE", "REVIEW", "FLAG", "ESCALATE", "?"] {
                    let j = judgment(urgency, action, Some(0.5));
                    let d = combine(&a, Some(&j));
                    assert!(d.severity_level.rank() >= a.severity_level.rank());
                }
            }
        }
    }

    #[test]
    fn raised_low_assessment_becomes_flagged() {
        let a = Aggregator::default().assess(&clean_signals());
        assert!(!a.should_flag);
        let j = judgment("HIGH", "FLAG", Some(0.7));
        let d = combine(&a, Some(&j));
        assert_eq!(d.severity_level, Severity::High);
        assert!(d.should_flag);
    }

    #[test]
    fn raised_severity_with_unreadable_action_goes_to_review() {
        let a = Aggregator::default().assess(&clean_signals());
        for action in ["shrug", "", "  "] {
            let j = judgment("MEDIUM", action, None);
            let d = combine(&a, Some(&j));
            assert_eq!(d.severity_level, Severity::Medium);
            assert_eq!(d.recommended_action, Recommendation::Review, "action {action:?}");
            assert!(d.should_flag);
        }
    }

    #[test]
    fn raised_severity_with_explicit_approve_stays_unflagged() {
        let a = Aggregator::default().assess(&clean_signals());
        let j = judgment("HIGH", "APPROVE", Some(0.6));
        let d = combine(&a, Some(&j));
        assert_eq!(d.severity_level, Severity::High);
        assert_eq!(d.recommended_action, Recommendation::Approve);
        assert!(!d.should_flag);
    }

    #[test]
    fn forced_success_uses_judgment() {
        let j = judgment("MEDIUM", "REVIEW", None);
        let d = secondary_only(Ok(&j), &BTreeSet::new());
        assert_eq!(d.primary_method, DecisionMethod::AiOnly);
        assert!(d.should_flag);
        assert_eq!(d.severity_level, Severity::Medium);
        assert_eq!(d.confidence, DEFAULT_SECONDARY_CONFIDENCE);
        assert_eq!(d.reasoning, vec!["Test summary"]);
    }

    #[test]
    fn forced_approve_is_not_flagged() {
        let j = judgment("LOW", "APPROVE", Some(0.9));
        let d = secondary_only(Ok(&j), &BTreeSet::new());
        assert!(!d.should_flag);
        assert_eq!(d.recommended_action, Recommendation::Approve);
    }

    #[test]
    fn forced_missing_action_approves_unknown_reviews() {
        let missing = judgment("LOW", "", None);
        assert_eq!(
            secondary_only(Ok(&missing), &BTreeSet::new()).recommended_action,
            Recommendation::Approve
        );
        let unknown = judgment("LOW", "QUARANTINE", None);
        let d = secondary_only(Ok(&unknown), &BTreeSet::new());
        assert_eq!(d.recommended_action, Recommendation::Review);
        assert!(d.should_flag);
    }

    #[test]
    fn forced_failure_is_fail_safe() {
        let err = SecondaryError::Timeout(30);
        let methods: BTreeSet<_> = [TriggeredMethod::ExcessiveCaps].into_iter().collect();
        let d = secondary_only(Err(&err), &methods);
        assert_eq!(d.primary_method, DecisionMethod::AiErrorFallback);
        assert!(d.should_flag);
        assert_eq!(d.severity_level, Severity::High);
        assert_eq!(d.recommended_action, Recommendation::Review);
        assert!(d.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(d.detection_methods, methods);
    }
}
