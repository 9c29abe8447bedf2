use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::batch::state::DEFAULT_MAX_RETRIES;
use crate::pipeline::moderation::aggregator::DEFAULT_SEVERITY_THRESHOLD;

/// Application-level constants
pub const APP_NAME: &str = "complaint-moderator";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_AI_USAGE_THRESHOLD: f64 = 0.6;
pub const DEFAULT_SECONDARY_MODEL: &str = "llama3.1:8b";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_SECONDARY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TIME_BUDGET_SECS: u64 = 840;
pub const DEFAULT_DEADLINE_MARGIN_SECS: u64 = 30;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "complaint_moderator=debug,warn"
    } else {
        "complaint_moderator=info,warn"
    }
}

/// Application data directory: `<data dir>/complaint-moderator`.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Aggregate score at which a complaint is flagged.
    pub severity_threshold: f64,
    /// Reported in the run summary; escalation uses its own fixed bands.
    pub ai_usage_threshold: f64,
    pub secondary_model_id: String,
    pub ollama_url: String,
    pub secondary_timeout_secs: u64,
    pub db_path: PathBuf,
    pub archive_dir: PathBuf,
    pub notify_webhook_url: Option<String>,
    pub batch_time_budget_secs: u64,
    pub batch_deadline_margin_secs: u64,
    pub max_retries: u32,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        let data = app_data_dir();
        Self {
            severity_threshold: DEFAULT_SEVERITY_THRESHOLD,
            ai_usage_threshold: DEFAULT_AI_USAGE_THRESHOLD,
            secondary_model_id: DEFAULT_SECONDARY_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            secondary_timeout_secs: DEFAULT_SECONDARY_TIMEOUT_SECS,
            db_path: data.join("moderation.db"),
            archive_dir: data.join("archive"),
            notify_webhook_url: None,
            batch_time_budget_secs: DEFAULT_TIME_BUDGET_SECS,
            batch_deadline_margin_secs: DEFAULT_DEADLINE_MARGIN_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ModerationConfig {
    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("SEVERITY_THRESHOLD") {
            config.severity_threshold = positive_f64("SEVERITY_THRESHOLD", &v)?;
        }
        if let Some(v) = get("AI_USAGE_THRESHOLD") {
            let t = parse::<f64>("AI_USAGE_THRESHOLD", &v)?;
            if !(0.0..=1.0).contains(&t) {
                return Err(invalid("AI_USAGE_THRESHOLD", &v, "must be between 0 and 1"));
            }
            config.ai_usage_threshold = t;
        }
        if let Some(v) = get("SECONDARY_MODEL_ID") {
            config.secondary_model_id = v;
        }
        if let Some(v) = get("OLLAMA_URL") {
            if !(v.starts_with("http://") || v.starts_with("https://")) {
                return Err(invalid("OLLAMA_URL", &v, "must be an http(s) URL"));
            }
            config.ollama_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("SECONDARY_TIMEOUT_SECS") {
            config.secondary_timeout_secs = parse("SECONDARY_TIMEOUT_SECS", &v)?;
            if config.secondary_timeout_secs == 0 {
                return Err(invalid("SECONDARY_TIMEOUT_SECS", &v, "must be at least 1"));
            }
        }
        if let Some(v) = get("MODERATION_DB_PATH") {
            config.db_path = PathBuf::from(v);
        }
        if let Some(v) = get("FLAGGED_ARCHIVE_DIR") {
            config.archive_dir = PathBuf::from(v);
        }
        if let Some(v) = get("NOTIFY_WEBHOOK_URL") {
            config.notify_webhook_url = Some(v);
        }
        if let Some(v) = get("BATCH_TIME_BUDGET_SECS") {
            config.batch_time_budget_secs = parse("BATCH_TIME_BUDGET_SECS", &v)?;
        }
        if let Some(v) = get("BATCH_DEADLINE_MARGIN_SECS") {
            config.batch_deadline_margin_secs = parse("BATCH_DEADLINE_MARGIN_SECS", &v)?;
        }
        if let Some(v) = get("MAX_RETRIES") {
            config.max_retries = parse("MAX_RETRIES", &v)?;
        }

        Ok(config)
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| invalid(key, value, &e.to_string()))
}

fn positive_f64(key: &'static str, value: &str) -> Result<f64, ConfigError> {
    let v = parse::<f64>(key, value)?;
    if !v.is_finite() || v <= 0.0 {
        return Err(invalid(key, value, "must be a positive number"));
    }
    Ok(v)
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
