use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DecisionMethod, Recommendation, Severity, TriggeredMethod};
use crate::pipeline::secondary::SecondaryJudgment;
use crate::pipeline::signals::{SignalKind, SignalSet};

/// Why the escalation policy asked for secondary analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    HighConfidence,
    MultipleSignals,
    Borderline,
    SoleStrongSentiment,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighConfidence => "high_confidence",
            Self::MultipleSignals => "multiple_signals",
            Self::Borderline => "borderline",
            Self::SoleStrongSentiment => "sole_strong_sentiment",
        }
    }
}

/// Scored view of one text's signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateAssessment {
    pub total_score: f64,
    pub should_flag: bool,
    pub severity_level: Severity,
    pub triggered_methods: BTreeSet<TriggeredMethod>,
    /// Human-readable notes in rule order.
    pub concerns: Vec<String>,
    /// total_score / 6, capped at 1.
    pub confidence: f64,
    pub recommended_action: Recommendation,
    pub requires_secondary_analysis: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<EscalationReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AggregateAssessment {
    /// The fixed assessment used when scoring itself fails: route to review.
    pub fn fail_safe(error: impl Into<String>) -> Self {
        Self {
            total_score: 0.0,
            should_flag: true,
            severity_level: Severity::High,
            triggered_methods: BTreeSet::new(),
            concerns: vec!["Automatic assessment unavailable; manual review required".into()],
            confidence: 0.5,
            recommended_action: Recommendation::Review,
            requires_secondary_analysis: false,
            escalation_reason: None,
            error: Some(error.into()),
        }
    }

    pub fn is_fail_safe(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    #[error("Signal {} carries a non-finite value", .0.as_str())]
    NonFiniteSignal(SignalKind),

    #[error("No usable profanity or sentiment signal")]
    NoUsableSignals,

    #[error("Severity threshold must be finite and positive, got {0}")]
    InvalidThreshold(f64),
}

/// The parts of a secondary judgment kept with a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryInsights {
    pub toxicity_score: f64,
    pub threat_level: String,
    pub content_issues: Vec<String>,
    pub summary: String,
    pub requires_human_review: bool,
    pub model_id: String,
}

impl From<&SecondaryJudgment> for SecondaryInsights {
    fn from(j: &SecondaryJudgment) -> Self {
        Self {
            toxicity_score: j.toxicity_score,
            threat_level: j.threat_level.clone(),
            content_issues: j.issues.clone(),
            summary: j.summary.clone(),
            requires_human_review: j.requires_human_review,
            model_id: j.model_id.clone(),
        }
    }
}

/// The decision persisted for a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDecision {
    pub should_flag: bool,
    pub severity_level: Severity,
    pub confidence: f64,
    pub recommended_action: Recommendation,
    /// Which method produced the final severity.
    pub primary_method: DecisionMethod,
    pub reasoning: Vec<String>,
    pub detection_methods: BTreeSet<TriggeredMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_insights: Option<SecondaryInsights>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What happened with the secondary analyzer for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SecondaryOutcome {
    NotRequested,
    Completed { judgment: SecondaryJudgment },
    Failed { error: String },
}

impl SecondaryOutcome {
    pub fn was_attempted(&self) -> bool {
        !matches!(self, Self::NotRequested)
    }

    pub fn judgment(&self) -> Option<&SecondaryJudgment> {
        match self {
            Self::Completed { judgment } => Some(judgment),
            _ => None,
        }
    }
}

/// Full audit record of one processing attempt: the snapshot written to
/// the result store and archived for flagged records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEnvelope {
    pub signals: SignalSet,
    pub assessment: AggregateAssessment,
    pub secondary: SecondaryOutcome,
    pub final_decision: FinalDecision,
    pub processing_timestamp: NaiveDateTime,
}

impl DecisionEnvelope {
    /// Whether the secondary analyzer contributed a judgment.
    pub fn secondary_used(&self) -> bool {
        matches!(
            self.final_decision.primary_method,
            DecisionMethod::CombinedAnalysis | DecisionMethod::AiOnly
        )
    }
}
