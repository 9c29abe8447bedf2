//! Batch orchestrator: fetch → order → per-record pipeline → summary.
//!
//! Runs strictly sequentially, one secondary call at a time. A record's
//! failure is contained at the record boundary; only a failed fetch aborts
//! the run.

use std::time::{Duration, Instant};

use super::error::ModerationError;
use super::state::{ProcessingAttempt, StatusUpdate};
use super::traits::*;
use super::types::*;
use crate::config::ModerationConfig;
use crate::models::{order_for_processing, ComplaintRecord, ModerationStatus, UserContext};
use crate::pipeline::moderation::{DecisionEnvelope, ModerationEngine};
use crate::pipeline::normalize::TextNormalizer;
use crate::pipeline::secondary::SecondaryAnalyzer;

/// Everything a run talks to outside the decision engine.
pub struct Collaborators<'a> {
    pub source: &'a dyn TextSource,
    pub normalizer: &'a dyn TextNormalizer,
    pub contexts: &'a dyn UserContextStore,
    pub analyzer: &'a dyn SecondaryAnalyzer,
    pub sink: &'a dyn ResultSink,
    pub archive: &'a dyn ArchiveStore,
    pub notifier: &'a dyn Notifier,
}

/// What the pipeline made of one record before persistence.
enum Evaluation {
    Unusable,
    Decided(DecisionEnvelope),
}

/// Run one batch.
pub fn run_batch(
    engine: &ModerationEngine,
    collaborators: &Collaborators<'_>,
    config: &ModerationConfig,
    options: &BatchOptions,
    progress_fn: Option<&dyn Fn(BatchStatusEvent)>,
) -> Result<RunSummary, RunFailure> {
    let start = Instant::now();
    let run_id = new_run_id();
    let options = options.clone().clamped();
    let deadline = Deadline::new(
        Duration::from_secs(config.batch_time_budget_secs),
        Duration::from_secs(config.batch_deadline_margin_secs),
    );
    let mut metrics = RunMetrics::default();

    tracing::info!(
        run_id = %run_id,
        batch_size = options.batch_size,
        status_filter = %options.status_filter,
        force_secondary = options.force_secondary_analysis,
        "Starting content moderation run"
    );

    let mut records = match collaborators
        .source
        .fetch_pending(options.batch_size, &options.status_filter)
    {
        Ok(records) => records,
        Err(e) => {
            let error = ModerationError::from(e);
            tracing::error!(error = %error, "Failed to fetch complaints");
            if let Some(progress) = progress_fn {
                progress(BatchStatusEvent::Failed {
                    error: error.to_string(),
                });
            }
            return Err(RunFailure::new(error, metrics));
        }
    };
    order_for_processing(&mut records);
    records.truncate(options.batch_size as usize);

    let total = records.len() as u32;
    metrics.fetched = total;
    tracing::info!(count = total, "Processing complaints");

    if let Some(progress) = progress_fn {
        progress(BatchStatusEvent::Started {
            record_count: total,
        });
    }

    for (i, record) in records.iter().enumerate() {
        if deadline.exhausted() {
            metrics.deferred_by_deadline = total - i as u32;
            tracing::warn!(
                deferred = metrics.deferred_by_deadline,
                remaining_ms = deadline.remaining().as_millis() as u64,
                "Time budget exhausted, leaving remaining complaints for the next run"
            );
            break;
        }

        if let Some(progress) = progress_fn {
            progress(BatchStatusEvent::Progress {
                completed: i as u32,
                total,
                record_id: record.id,
            });
        }

        process_record(engine, collaborators, config, &options, record, &mut metrics);
    }

    let elapsed = start.elapsed();
    if let Some(progress) = progress_fn {
        progress(BatchStatusEvent::Completed {
            processed: metrics.processed_count,
            flagged: metrics.flagged_count,
            duration_ms: elapsed.as_millis() as u64,
        });
    }

    let summary = RunSummary::new(
        &run_id,
        &metrics,
        elapsed,
        RunConfiguration {
            batch_size: options.batch_size,
            status_filter: options.status_filter.clone(),
            force_secondary_analysis: options.force_secondary_analysis,
            secondary_model_id: collaborators.analyzer.model_id().to_string(),
            severity_threshold: engine.aggregator().severity_threshold(),
            ai_usage_threshold: config.ai_usage_threshold,
        },
    );

    tracing::info!(
        run_id = %run_id,
        processed = metrics.processed_count,
        flagged = metrics.flagged_count,
        errors = metrics.error_count,
        secondary_used = metrics.secondary_used_count,
        deferred = metrics.deferred_by_deadline,
        duration_ms = elapsed.as_millis() as u64,
        "Content moderation run completed"
    );

    Ok(summary)
}

/// Take one record through the pipeline and resolve it. Never fails: any
/// error is recorded against the record.
fn process_record(
    engine: &ModerationEngine,
    c: &Collaborators<'_>,
    config: &ModerationConfig,
    options: &BatchOptions,
    record: &ComplaintRecord,
    metrics: &mut RunMetrics,
) {
    let _span = tracing::info_span!("complaint", complaint_id = record.id).entered();

    let attempt = match ProcessingAttempt::begin(record, config.max_retries) {
        Ok(attempt) => attempt,
        Err(e) => {
            tracing::warn!(complaint_id = record.id, error = %e, "Skipping complaint");
            metrics.error_count += 1;
            return;
        }
    };

    let evaluation = evaluate(engine, c, options, record);

    let update = match persist(c, &attempt, &evaluation) {
        Ok(update) => update,
        Err(e) => {
            tracing::error!(complaint_id = record.id, error = %e, "Error processing complaint");
            metrics.error_count += 1;
            resolve_as_error(c, &attempt, &e, metrics);
            return;
        }
    };

    let envelope = match evaluation {
        Evaluation::Unusable => {
            tracing::warn!(complaint_id = record.id, "No usable complaint text");
            metrics.error_count += 1;
            metrics.failed_processing_count += 1;
            return;
        }
        Evaluation::Decided(envelope) => envelope,
    };

    if envelope.secondary_used() {
        metrics.secondary_used_count += 1;
    } else if !options.force_secondary_analysis {
        metrics.library_only_count += 1;
    }

    if update.status == ModerationStatus::Flagged {
        let location = c.archive.archive(record, &envelope);
        if let Err(e) = c.notifier.notify(&envelope, record, location.as_deref()) {
            tracing::error!(complaint_id = record.id, error = %e, "Failed to send notification");
        }
        metrics.flagged_count += 1;

        let decision = &envelope.final_decision;
        tracing::info!(
            complaint_id = record.id,
            method = %decision.primary_method,
            severity = %decision.severity_level,
            confidence = decision.confidence,
            "Flagged complaint"
        );
    }

    metrics.processed_count += 1;
}

fn evaluate(
    engine: &ModerationEngine,
    c: &Collaborators<'_>,
    options: &BatchOptions,
    record: &ComplaintRecord,
) -> Evaluation {
    let Some(text) = c.normalizer.normalize(&record.raw_text_source) else {
        return Evaluation::Unusable;
    };

    let context = c.contexts.user_context(&record.user_id).unwrap_or_else(|e| {
        tracing::warn!(complaint_id = record.id, error = %e, "User context unavailable, using empty history");
        UserContext::empty(&record.user_id)
    });

    Evaluation::Decided(engine.decide(
        text.as_str(),
        Some(&context),
        c.analyzer,
        options.force_secondary_analysis,
    ))
}

fn persist(
    c: &Collaborators<'_>,
    attempt: &ProcessingAttempt,
    evaluation: &Evaluation,
) -> Result<StatusUpdate, ModerationError> {
    let update = match evaluation {
        Evaluation::Unusable => attempt.resolve_unusable(),
        Evaluation::Decided(envelope) => attempt.resolve_decision(envelope)?,
    };
    c.sink
        .write(attempt.record_id(), &update)
        .map_err(|source| ModerationError::Persistence {
            record_id: attempt.record_id(),
            source,
        })?;
    Ok(update)
}

// If this write fails too the stored status is left as it was.
fn resolve_as_error(
    c: &Collaborators<'_>,
    attempt: &ProcessingAttempt,
    error: &ModerationError,
    metrics: &mut RunMetrics,
) {
    let update = attempt.resolve_error(&error.to_string());
    match c.sink.write(attempt.record_id(), &update) {
        Ok(()) => {
            if update.status == ModerationStatus::FailedProcessing {
                tracing::warn!(
                    complaint_id = attempt.record_id(),
                    retry_count = update.retry_count,
                    "Retry limit exceeded, giving up on complaint"
                );
                metrics.failed_processing_count += 1;
            }
        }
        Err(e) => {
            tracing::error!(
                complaint_id = attempt.record_id(),
                error = %e,
                "Failed to record error status, leaving complaint unchanged"
            );
        }
    }
}
