use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::{priority_rank, ModerationStatus, Severity};

/// A complaint row as read from the complaint store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplaintRecord {
    pub id: i64,
    pub user_id: String,
    /// Raw markup as submitted (XML).
    pub raw_text_source: String,
    pub created_at: NaiveDateTime,
    pub category: String,
    pub priority: String,
    /// Workflow status of the complaint itself (what `status_filter` matches).
    pub workflow_status: String,
    /// Moderation lifecycle status. A NULL column reads as `Pending`.
    pub status: ModerationStatus,
    pub moderation_result: Option<String>,
    pub severity_level: Option<Severity>,
    pub retry_count: u32,
}

impl ComplaintRecord {
    pub fn priority_rank(&self) -> u8 {
        priority_rank(&self.priority)
    }
}

/// Rolling 90-day history for the complaint's author.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserContext {
    pub user_id: String,
    pub complaint_count: u32,
    pub flagged_count: u32,
    pub last_complaint_time: Option<NaiveDateTime>,
}

impl UserContext {
    /// Context used when history lookup fails: no history known.
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Self::default()
        }
    }
}

/// Order records for processing: priority tier first, FIFO within a tier.
pub fn order_for_processing(records: &mut [ComplaintRecord]) {
    records.sort_by(|a, b| {
        a.priority_rank()
            .cmp(&b.priority_rank())
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

#[cfg(test)]
pub(crate) fn sample_record(id: i64, priority: &str, created_at: &str) -> ComplaintRecord {
    ComplaintRecord {
        id,
        user_id: format!("user-{id}"),
        raw_text_source: "<complaint><complaint_text>The parcel arrived late</complaint_text></complaint>".into(),
        created_at: NaiveDateTime::parse_from_str(created_at, "%Y-%m-%d %H:%M:%S").unwrap(),
        category: "general".into(),
        priority: priority.into(),
        workflow_status: "pending".into(),
        status: ModerationStatus::Pending,
        moderation_result: None,
        severity_level: None,
        retry_count: 0,
    }
}
