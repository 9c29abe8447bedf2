//! Moderation lifecycle of a single complaint.
//!
//! ```text
//! pending ─┐
//!          ├─> processing ─> flagged | approved | failed_processing
//! retry ───┘              └> retry
//! ```
//!
//! `processing` is never persisted; it lives in a [`ProcessingAttempt`] for
//! the duration of one pass through the pipeline. Every resolution produces
//! exactly one [`StatusUpdate`], written atomically by the result sink.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::models::{ComplaintRecord, ModerationStatus, Severity};
use crate::pipeline::moderation::DecisionEnvelope;

pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Complaint {record_id} is {status} and cannot be selected")]
    NotSelectable {
        record_id: i64,
        status: ModerationStatus,
    },

    #[error("Complaint {record_id}: transition {from} -> {to} is not allowed")]
    IllegalTransition {
        record_id: i64,
        from: ModerationStatus,
        to: ModerationStatus,
    },
}

/// Whether a record in `status` may be picked up by a run.
pub fn is_selectable(status: ModerationStatus) -> bool {
    matches!(status, ModerationStatus::Pending | ModerationStatus::Retry)
}

pub fn is_terminal(status: ModerationStatus) -> bool {
    matches!(
        status,
        ModerationStatus::Flagged | ModerationStatus::Approved | ModerationStatus::FailedProcessing
    )
}

/// Check one edge of the lifecycle graph.
pub fn validate_transition(
    record_id: i64,
    from: ModerationStatus,
    to: ModerationStatus,
) -> Result<(), StateError> {
    use ModerationStatus::*;
    let allowed = match from {
        Pending | Retry => to == Processing,
        Processing => matches!(to, Flagged | Approved | FailedProcessing | Retry),
        Flagged | Approved | FailedProcessing => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(StateError::IllegalTransition { record_id, from, to })
    }
}

/// The write that resolves one processing attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: ModerationStatus,
    /// Serialized decision envelope, or an error record.
    pub snapshot: serde_json::Value,
    pub severity_level: Option<Severity>,
    pub retry_count: u32,
    pub updated_at: NaiveDateTime,
}

/// A record that has been taken into `processing`. Resolving does not
/// consume it, so a failed write can still be resolved as an error.
#[derive(Debug)]
pub struct ProcessingAttempt {
    record_id: i64,
    retry_count: u32,
    max_retries: u32,
}

impl ProcessingAttempt {
    /// Move a selectable record into `processing`.
    pub fn begin(record: &ComplaintRecord, max_retries: u32) -> Result<Self, StateError> {
        if !is_selectable(record.status) {
            return Err(StateError::NotSelectable {
                record_id: record.id,
                status: record.status,
            });
        }
        validate_transition(record.id, record.status, ModerationStatus::Processing)?;
        Ok(Self {
            record_id: record.id,
            retry_count: record.retry_count,
            max_retries,
        })
    }

    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    /// Resolve with a decision: `flagged` or `approved`.
    pub fn resolve_decision(
        &self,
        envelope: &DecisionEnvelope,
    ) -> Result<StatusUpdate, super::ModerationError> {
        let status = if envelope.final_decision.should_flag {
            ModerationStatus::Flagged
        } else {
            ModerationStatus::Approved
        };
        let snapshot = serde_json::to_value(envelope)?;
        self.finish(status, snapshot, Some(envelope.final_decision.severity_level), self.retry_count)
            .map_err(Into::into)
    }

    /// Resolve a record whose markup held no usable text. Not retried.
    pub fn resolve_unusable(&self) -> StatusUpdate {
        let snapshot = json!({
            "error": "Failed to parse complaint markup or extract complaint text",
            "error_type": "extraction_failure",
            "processed_at": now(),
        });
        self.settle(ModerationStatus::FailedProcessing, snapshot, self.retry_count)
    }

    /// Resolve after an unhandled pipeline error: `retry` with the counter
    /// incremented, or `failed_processing` once the cutoff is exceeded.
    pub fn resolve_error(&self, error: &str) -> StatusUpdate {
        let attempts = self.retry_count.saturating_add(1);
        let exhausted = attempts > self.max_retries;
        let snapshot = json!({
            "error": error,
            "retry_count": attempts,
            "retries_exhausted": exhausted,
            "last_error_at": now(),
        });
        let status = if exhausted {
            ModerationStatus::FailedProcessing
        } else {
            ModerationStatus::Retry
        };
        self.settle(status, snapshot, attempts)
    }

    fn finish(
        &self,
        to: ModerationStatus,
        snapshot: serde_json::Value,
        severity_level: Option<Severity>,
        retry_count: u32,
    ) -> Result<StatusUpdate, StateError> {
        validate_transition(self.record_id, ModerationStatus::Processing, to)?;
        Ok(StatusUpdate {
            status: to,
            snapshot,
            severity_level,
            retry_count,
            updated_at: now(),
        })
    }

    // Edges out of `processing` used here are always legal.
    fn settle(&self, to: ModerationStatus, snapshot: serde_json::Value, retry_count: u32) -> StatusUpdate {
        StatusUpdate {
            status: to,
            snapshot,
            severity_level: None,
            retry_count,
            updated_at: now(),
        }
    }
}

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}
