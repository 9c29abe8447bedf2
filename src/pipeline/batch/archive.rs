//! Durable archive of flagged decisions on the local filesystem.
//!
//! Entries land at `<root>/flagged/YYYY/MM/DD/<user>/<id>.json`, written to a
//! temp file in the target directory and renamed into place.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::traits::ArchiveStore;
use crate::models::ComplaintRecord;
use crate::pipeline::moderation::DecisionEnvelope;
use crate::pipeline::normalize::{TextNormalizer, XmlTextNormalizer};

pub const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct ArchiveEntry<'a> {
    record_id: i64,
    user_id: &'a str,
    created_at: NaiveDateTime,
    category: &'a str,
    priority: &'a str,
    moderation_analysis: &'a DecisionEnvelope,
    flagged_at: NaiveDateTime,
    complaint_preview: String,
    /// SHA-256 of the compact envelope JSON, hex.
    envelope_sha256: String,
}

pub struct FsArchiveStore {
    root: PathBuf,
}

impl FsArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write_entry(
        &self,
        record: &ComplaintRecord,
        envelope: &DecisionEnvelope,
    ) -> Result<String, ArchiveError> {
        let flagged_at = chrono::Utc::now().naive_utc();
        let key = archive_key(flagged_at, &record.user_id, record.id);

        let preview_source = XmlTextNormalizer
            .normalize(&record.raw_text_source)
            .map(|t| t.into_inner())
            .unwrap_or_default();

        let entry = ArchiveEntry {
            record_id: record.id,
            user_id: &record.user_id,
            created_at: record.created_at,
            category: &record.category,
            priority: &record.priority,
            moderation_analysis: envelope,
            flagged_at,
            complaint_preview: preview(&preview_source),
            envelope_sha256: envelope_digest(envelope)?,
        };
        let body = serde_json::to_vec_pretty(&entry)?;

        let path = self.root.join(&key);
        let dir = path.parent().ok_or_else(|| ArchiveError::Path(key.clone()))?;
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| ArchiveError::Io(e.error))?;

        Ok(key)
    }
}

impl ArchiveStore for FsArchiveStore {
    fn archive(&self, record: &ComplaintRecord, envelope: &DecisionEnvelope) -> Option<String> {
        match self.write_entry(record, envelope) {
            Ok(key) => {
                tracing::info!(complaint_id = record.id, key = %key, "Archived flagged complaint");
                Some(key)
            }
            Err(e) => {
                tracing::error!(complaint_id = record.id, error = %e, "Failed to archive flagged complaint");
                None
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive key has no parent directory: {0}")]
    Path(String),
}

/// `flagged/YYYY/MM/DD/<user>/<id>.json`, partitioned by flag date.
pub fn archive_key(flagged_at: NaiveDateTime, user_id: &str, record_id: i64) -> String {
    format!(
        "flagged/{}/{}/{record_id}.json",
        flagged_at.format("%Y/%m/%d"),
        path_component(user_id)
    )
}

// User ids come from the store; keep them from escaping the partition.
fn path_component(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '@' | '.') { c } else { '_' })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// First [`PREVIEW_CHARS`] characters, with `...` when cut.
pub fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{head}...")
}

fn envelope_digest(envelope: &DecisionEnvelope) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(envelope)?;
    let hash = Sha256::digest(&bytes);
    Ok(hash.iter().map(|b| format!("{b:02x}")).collect())
}
