//! Collaborator boundaries of the batch orchestrator.
//!
//! - TextSource: which records a run picks up
//! - UserContextStore: author history passed to the secondary analyzer
//! - ResultSink: the one write that resolves each record
//! - ArchiveStore: durable copy of flagged decisions
//! - Notifier: alert for flagged decisions
//!
//! Text normalization ([`TextNormalizer`]) and secondary analysis
//! ([`SecondaryAnalyzer`]) are defined next to their implementations.
//!
//! [`TextNormalizer`]: crate::pipeline::normalize::TextNormalizer
//! [`SecondaryAnalyzer`]: crate::pipeline::secondary::SecondaryAnalyzer

use thiserror::Error;

use super::state::StatusUpdate;
use crate::db::DatabaseError;
use crate::models::{ComplaintRecord, UserContext};
use crate::pipeline::moderation::DecisionEnvelope;

pub trait TextSource {
    /// Up to `limit` selectable records whose workflow status matches
    /// `status_filter`. Ordering is not relied upon.
    fn fetch_pending(
        &self,
        limit: u32,
        status_filter: &str,
    ) -> Result<Vec<ComplaintRecord>, DatabaseError>;
}

pub trait UserContextStore {
    fn user_context(&self, user_id: &str) -> Result<UserContext, DatabaseError>;
}

pub trait ResultSink {
    /// Persist status, snapshot, severity and timestamp in one write.
    fn write(&self, record_id: i64, update: &StatusUpdate) -> Result<(), DatabaseError>;
}

pub trait ArchiveStore {
    /// Store a flagged decision. Returns its location, or `None` on failure.
    fn archive(&self, record: &ComplaintRecord, envelope: &DecisionEnvelope) -> Option<String>;
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification transport failed: {0}")]
    Transport(String),

    #[error("Notification endpoint returned HTTP {0}")]
    Rejected(u16),

    #[error("Alert could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub trait Notifier {
    fn notify(
        &self,
        envelope: &DecisionEnvelope,
        record: &ComplaintRecord,
        location: Option<&str>,
    ) -> Result<(), NotifyError>;
}
