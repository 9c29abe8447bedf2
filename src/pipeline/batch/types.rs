//! Options, metrics and events of a batch run.

use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BATCH_SIZE: u32 = 50;
pub const MAX_BATCH_SIZE: u32 = 200;
pub const DEFAULT_STATUS_FILTER: &str = "pending";

/// Generate a new run ID.
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ═══════════════════════════════════════════
// Invocation options
// ═══════════════════════════════════════════

/// Per-invocation options. Parsed from CLI flags or a JSON event such as
/// `{"batch_size": 20, "status_filter": "pending", "force_ai_analysis": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    pub batch_size: u32,
    pub status_filter: String,
    /// Bypass the escalation policy and let the secondary analyzer decide.
    #[serde(alias = "force_ai_analysis")]
    pub force_secondary_analysis: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            status_filter: DEFAULT_STATUS_FILTER.to_string(),
            force_secondary_analysis: false,
        }
    }
}

impl BatchOptions {
    pub fn from_event(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::clamped)
    }

    /// Apply the hard batch size limit.
    pub fn clamped(mut self) -> Self {
        if self.batch_size > MAX_BATCH_SIZE {
            tracing::warn!(
                requested = self.batch_size,
                limit = MAX_BATCH_SIZE,
                "Batch size too large, limiting"
            );
            self.batch_size = MAX_BATCH_SIZE;
        }
        if self.status_filter.trim().is_empty() {
            self.status_filter = DEFAULT_STATUS_FILTER.to_string();
        }
        self
    }
}

// ═══════════════════════════════════════════
// Time budget
// ═══════════════════════════════════════════

/// Wall-clock budget of one run. Checked before each record is selected;
/// a record already in the pipeline always finishes.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
    margin: Duration,
}

impl Deadline {
    pub fn new(budget: Duration, margin: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
            margin,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    /// Less than the safety margin is left.
    pub fn exhausted(&self) -> bool {
        self.remaining() <= self.margin
    }
}

// ═══════════════════════════════════════════
// Metrics
// ═══════════════════════════════════════════

/// Counters owned by the orchestrator for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub fetched: u32,
    /// Records resolved to flagged or approved.
    pub processed_count: u32,
    pub flagged_count: u32,
    pub secondary_used_count: u32,
    pub library_only_count: u32,
    /// Unusable text plus unhandled record errors.
    pub error_count: u32,
    pub failed_processing_count: u32,
    /// Records fetched but left for the next run when the budget ran out.
    pub deferred_by_deadline: u32,
}

impl RunMetrics {
    pub fn efficiency_rate_percent(&self) -> f64 {
        percent(self.library_only_count, self.processed_count)
    }

    pub fn secondary_usage_rate_percent(&self) -> f64 {
        percent(self.secondary_used_count, self.processed_count)
    }
}

fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, 1)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ═══════════════════════════════════════════
// Run summary
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub total_fetched: u32,
    pub successfully_processed: u32,
    pub flagged_for_review: u32,
    pub processing_errors: u32,
    pub failed_processing: u32,
    pub deferred_by_deadline: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    pub library_only_processing: u32,
    pub secondary_enhanced_processing: u32,
    pub efficiency_rate_percent: f64,
    pub secondary_usage_rate_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_processing_time_seconds: f64,
    pub avg_time_per_complaint_ms: f64,
    pub throughput_per_minute: f64,
}

/// Echo of the settings a run used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub batch_size: u32,
    pub status_filter: String,
    pub force_secondary_analysis: bool,
    pub secondary_model_id: String,
    pub severity_threshold: f64,
    pub ai_usage_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub message: String,
    pub processing_summary: ProcessingSummary,
    pub efficiency_metrics: EfficiencyMetrics,
    pub performance_metrics: PerformanceMetrics,
    pub configuration: RunConfiguration,
    pub processed_at: NaiveDateTime,
}

impl RunSummary {
    pub fn new(
        run_id: &str,
        metrics: &RunMetrics,
        elapsed: Duration,
        configuration: RunConfiguration,
    ) -> Self {
        let seconds = elapsed.as_secs_f64();
        let processed = metrics.processed_count;
        let avg_ms = if processed > 0 {
            round_to(seconds * 1000.0 / processed as f64, 2)
        } else {
            0.0
        };
        let throughput = if seconds > 0.0 {
            round_to(processed as f64 / seconds * 60.0, 1)
        } else {
            0.0
        };

        Self {
            run_id: run_id.to_string(),
            message: "Content moderation completed successfully".to_string(),
            processing_summary: ProcessingSummary {
                total_fetched: metrics.fetched,
                successfully_processed: processed,
                flagged_for_review: metrics.flagged_count,
                processing_errors: metrics.error_count,
                failed_processing: metrics.failed_processing_count,
                deferred_by_deadline: metrics.deferred_by_deadline,
            },
            efficiency_metrics: EfficiencyMetrics {
                library_only_processing: metrics.library_only_count,
                secondary_enhanced_processing: metrics.secondary_used_count,
                efficiency_rate_percent: metrics.efficiency_rate_percent(),
                secondary_usage_rate_percent: metrics.secondary_usage_rate_percent(),
            },
            performance_metrics: PerformanceMetrics {
                total_processing_time_seconds: round_to(seconds, 2),
                avg_time_per_complaint_ms: avg_ms,
                throughput_per_minute: throughput,
            },
            configuration,
            processed_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// A run that could not complete, with whatever was counted before it
/// stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub message: String,
    pub error: String,
    pub partial_metrics: RunMetrics,
    pub failed_at: NaiveDateTime,
}

impl RunFailure {
    pub fn new(error: impl std::fmt::Display, partial_metrics: RunMetrics) -> Self {
        Self {
            message: "Content moderation failed".to_string(),
            error: error.to_string(),
            partial_metrics,
            failed_at: chrono::Utc::now().naive_utc(),
        }
    }
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.message, self.error)
    }
}

impl std::error::Error for RunFailure {}

// ═══════════════════════════════════════════
// Batch Status Events
// ═══════════════════════════════════════════

/// Progress of a run, delivered to an optional callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BatchStatusEvent {
    Started {
        record_count: u32,
    },
    Progress {
        completed: u32,
        total: u32,
        record_id: i64,
    },
    Completed {
        processed: u32,
        flagged: u32,
        duration_ms: u64,
    },
    Failed {
        error: String,
    },
}
