//! When an aggregate assessment is sent to the secondary analyzer.
//!
//! Rules are checked in order and the first match is reported as the
//! escalation reason.

use std::collections::BTreeSet;

use super::types::EscalationReason;
use crate::models::TriggeredMethod;

pub const HIGH_CONFIDENCE: f64 = 0.7;
pub const BORDERLINE_LOW: f64 = 0.3;
pub const BORDERLINE_HIGH: f64 = 0.7;
pub const MULTI_SIGNAL_COUNT: usize = 2;

/// First escalation rule that holds, if any.
///
/// The high-confidence and borderline bands overlap at 0.7; both rules are
/// kept as stated so changing either one alone keeps its meaning.
pub fn evaluate(
    confidence: f64,
    triggered: &BTreeSet<TriggeredMethod>,
) -> Option<EscalationReason> {
    if confidence > HIGH_CONFIDENCE {
        return Some(EscalationReason::HighConfidence);
    }
    if triggered.len() >= MULTI_SIGNAL_COUNT {
        return Some(EscalationReason::MultipleSignals);
    }
    if (BORDERLINE_LOW..=BORDERLINE_HIGH).contains(&confidence) {
        return Some(EscalationReason::Borderline);
    }
    if triggered.len() == 1 && triggered.contains(&TriggeredMethod::StrongNegativeSentiment) {
        return Some(EscalationReason::SoleStrongSentiment);
    }
    None
}

pub fn requires_secondary(confidence: f64, triggered: &BTreeSet<TriggeredMethod>) -> bool {
    evaluate(confidence, triggered).is_some()
}
