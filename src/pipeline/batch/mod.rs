//! Batch moderation of stored complaints.
//!
//! Pipeline per record:
//! extract text → user context → signals → escalation/merge → persist →
//! (flagged) archive → notify

pub mod archive;
pub mod error;
pub mod notify;
pub mod runner;
pub mod state;
pub mod traits;
pub mod types;

pub use archive::FsArchiveStore;
pub use error::ModerationError;
pub use notify::{TracingNotifier, WebhookNotifier};
pub use runner::{run_batch, Collaborators};
pub use state::{ProcessingAttempt, StateError, StatusUpdate};
pub use traits::*;
pub use types::*;
