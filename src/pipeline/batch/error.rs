//! Record-level and run-level failure taxonomy.
//!
//! Detector, aggregation and secondary-analysis failures never reach this
//! layer: they are absorbed into the decision envelope with fail-safe values.

use thiserror::Error;

use super::state::StateError;
use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ModerationError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Illegal state transition: {0}")]
    State(#[from] StateError),

    #[error("Result snapshot could not be serialized: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Result write failed for complaint {record_id}: {source}")]
    Persistence {
        record_id: i64,
        #[source]
        source: DatabaseError,
    },

    #[error("Collaborator configuration error: {0}")]
    Configuration(String),
}
