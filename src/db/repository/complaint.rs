use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::*;
use crate::pipeline::batch::{ResultSink, StatusUpdate, TextSource, UserContextStore};

/// Days of history counted into a [`UserContext`].
pub const CONTEXT_WINDOW_DAYS: i64 = 90;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const COMPLAINT_COLUMNS: &str = "id, user_id, xml_content, created_at, category, priority, status,
     moderation_status, moderation_result, severity_level, retry_count";

/// A complaint to be inserted.
#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub user_id: String,
    pub xml_content: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    /// Defaults to the current time.
    pub created_at: Option<NaiveDateTime>,
}

impl NewComplaint {
    pub fn new(user_id: &str, xml_content: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            xml_content: xml_content.to_string(),
            category: "general".to_string(),
            priority: "normal".to_string(),
            status: "pending".to_string(),
            created_at: None,
        }
    }
}

pub fn insert_complaint(conn: &Connection, complaint: &NewComplaint) -> Result<i64, DatabaseError> {
    let created_at = complaint
        .created_at
        .unwrap_or_else(|| chrono::Utc::now().naive_utc());
    conn.execute(
        "INSERT INTO complaints (user_id, xml_content, category, priority, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            complaint.user_id,
            complaint.xml_content,
            complaint.category,
            complaint.priority,
            complaint.status,
            fmt_ts(created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_complaint(conn: &Connection, id: i64) -> Result<Option<ComplaintRecord>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = ?1"),
            params![id],
            read_row,
        )
        .optional()?;
    row.map(ComplaintRow::into_record).transpose()
}

/// Selectable complaints in processing order: priority tier, then oldest
/// first.
pub fn fetch_pending_complaints(
    conn: &Connection,
    limit: u32,
    status_filter: &str,
) -> Result<Vec<ComplaintRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMPLAINT_COLUMNS}
         FROM complaints
         WHERE status = ?1
           AND (moderation_status IS NULL OR moderation_status IN ('pending', 'retry'))
         ORDER BY
           CASE priority
             WHEN 'urgent' THEN 1
             WHEN 'high' THEN 2
             WHEN 'normal' THEN 3
             ELSE 4
           END,
           created_at ASC,
           id ASC
         LIMIT ?2"
    ))?;

    let rows = stmt
        .query_map(params![status_filter, limit], read_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row.id;
        match row.into_record() {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(complaint_id = id, error = %e, "Unreadable complaint row, marking failed");
                quarantine_row(conn, id, &e);
            }
        }
    }
    Ok(records)
}

/// Take a row that cannot be read out of selection so it does not hold up
/// later runs. A failure here is only logged; the row is skipped either way.
fn quarantine_row(conn: &Connection, id: i64, error: &DatabaseError) {
    let snapshot = serde_json::json!({
        "error": error.to_string(),
        "error_type": "corrupt_row",
    });
    let result = conn.execute(
        "UPDATE complaints
         SET moderation_status = 'failed_processing',
             moderation_result = ?1,
             moderation_timestamp = ?2,
             severity_level = NULL
         WHERE id = ?3",
        params![
            snapshot.to_string(),
            fmt_ts(chrono::Utc::now().naive_utc()),
            id
        ],
    );
    if let Err(e) = result {
        tracing::error!(complaint_id = id, error = %e, "Failed to mark unreadable complaint");
    }
}

/// Complaint history of `user_id` in the [`CONTEXT_WINDOW_DAYS`] before `now`.
pub fn load_user_context(
    conn: &Connection,
    user_id: &str,
    now: NaiveDateTime,
) -> Result<UserContext, DatabaseError> {
    let since = now - Duration::days(CONTEXT_WINDOW_DAYS);
    let (complaint_count, flagged_count, last): (u32, u32, Option<String>) = conn.query_row(
        "SELECT COUNT(*),
                COUNT(CASE WHEN moderation_status = 'flagged' THEN 1 END),
                MAX(created_at)
         FROM complaints
         WHERE user_id = ?1 AND created_at >= ?2",
        params![user_id, fmt_ts(since)],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    Ok(UserContext {
        user_id: user_id.to_string(),
        complaint_count,
        flagged_count,
        last_complaint_time: last.and_then(|s| parse_ts(&s)),
    })
}

/// Record the outcome of a processing attempt in one statement.
pub fn write_moderation_status(
    conn: &Connection,
    id: i64,
    update: &StatusUpdate,
) -> Result<(), DatabaseError> {
    let snapshot = serde_json::to_string(&update.snapshot)?;

    let changed = conn.execute(
        "UPDATE complaints
         SET moderation_status = ?1,
             moderation_result = ?2,
             moderation_timestamp = ?3,
             severity_level = ?4,
             retry_count = ?5
         WHERE id = ?6",
        params![
            update.status.as_str(),
            snapshot,
            fmt_ts(update.updated_at),
            update.severity_level.map(|s| s.as_str()),
            update.retry_count,
            id,
        ],
    )?;

    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "complaint".into(),
            id: id.to_string(),
        });
    }
    tracing::info!(complaint_id = id, status = %update.status, "Updated moderation status");
    Ok(())
}

/// Raw complaint row before enum and timestamp parsing.
struct ComplaintRow {
    id: i64,
    user_id: String,
    xml_content: String,
    created_at: String,
    category: String,
    priority: String,
    status: String,
    moderation_status: Option<String>,
    moderation_result: Option<String>,
    severity_level: Option<String>,
    retry_count: i64,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ComplaintRow> {
    Ok(ComplaintRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        xml_content: row.get(2)?,
        created_at: row.get(3)?,
        category: row.get(4)?,
        priority: row.get(5)?,
        status: row.get(6)?,
        moderation_status: row.get(7)?,
        moderation_result: row.get(8)?,
        severity_level: row.get(9)?,
        retry_count: row.get(10)?,
    })
}

impl ComplaintRow {
    fn into_record(self) -> Result<ComplaintRecord, DatabaseError> {
        let created_at = parse_ts(&self.created_at).ok_or_else(|| DatabaseError::CorruptRow {
            id: self.id,
            field: "created_at",
            value: self.created_at.clone(),
        })?;
        let status = match self.moderation_status.as_deref() {
            None => ModerationStatus::Pending,
            Some(s) => ModerationStatus::from_str(s)?,
        };
        let severity_level = self
            .severity_level
            .as_deref()
            .map(Severity::from_str)
            .transpose()?;

        Ok(ComplaintRecord {
            id: self.id,
            user_id: self.user_id,
            raw_text_source: self.xml_content,
            created_at,
            category: self.category,
            priority: self.priority,
            workflow_status: self.status,
            status,
            moderation_result: self.moderation_result,
            severity_level,
            retry_count: u32::try_from(self.retry_count).unwrap_or(0),
        })
    }
}

fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

// Accepts SQLite's `datetime('now')` form, ISO-8601 with `T`, RFC 3339
// with an offset (converted to UTC) and a bare date (midnight).
fn parse_ts(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// The complaint store behind one connection.
pub struct SqliteComplaintStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteComplaintStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl TextSource for SqliteComplaintStore<'_> {
    fn fetch_pending(
        &self,
        limit: u32,
        status_filter: &str,
    ) -> Result<Vec<ComplaintRecord>, DatabaseError> {
        fetch_pending_complaints(self.conn, limit, status_filter)
    }
}

impl UserContextStore for SqliteComplaintStore<'_> {
    fn user_context(&self, user_id: &str) -> Result<UserContext, DatabaseError> {
        load_user_context(self.conn, user_id, chrono::Utc::now().naive_utc())
    }
}

impl ResultSink for SqliteComplaintStore<'_> {
    fn write(&self, record_id: i64, update: &StatusUpdate) -> Result<(), DatabaseError> {
        write_moderation_status(self.conn, record_id, update)
    }
}
