//! Alerts for flagged complaints.
//!
//! Delivery is best-effort: the orchestrator logs a [`NotifyError`] and
//! moves on; the record's status is already persisted.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::traits::{Notifier, NotifyError};
use crate::models::{ComplaintRecord, DecisionMethod, Recommendation, Severity, TriggeredMethod};
use crate::pipeline::moderation::DecisionEnvelope;

pub const ALERT_TYPE: &str = "CONTENT_MODERATION_ALERT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintDetails {
    pub record_id: i64,
    pub user_id: String,
    pub category: String,
    pub priority: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationResults {
    pub severity_level: Severity,
    pub confidence_score: f64,
    pub recommendation: Recommendation,
    pub primary_method: DecisionMethod,
    pub detection_methods: BTreeSet<TriggeredMethod>,
    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub profanity_detected: bool,
    /// Sentiment label, or "UNKNOWN" if the analyzer failed.
    pub sentiment: String,
    pub secondary_analysis_used: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequired {
    pub requires_immediate_attention: bool,
    pub suggested_action: Recommendation,
    pub human_review_required: bool,
}

/// Body of an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub alert_type: String,
    pub alert_id: String,
    pub complaint_details: ComplaintDetails,
    pub moderation_results: ModerationResults,
    pub analysis_summary: AnalysisSummary,
    pub action_required: ActionRequired,
    pub storage_location: Option<String>,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub subject: String,
    pub severity: Severity,
    pub message: AlertMessage,
}

pub fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "🟢",
        Severity::Medium => "🟡",
        Severity::High => "🟠",
        Severity::Critical => "🔴",
    }
}

pub fn alert_subject(severity: Severity, record_id: i64) -> String {
    format!("{} Content Alert - {severity} - ID: {record_id}", severity_icon(severity))
}

pub fn build_alert(
    envelope: &DecisionEnvelope,
    record: &ComplaintRecord,
    location: Option<&str>,
) -> Alert {
    let now = chrono::Utc::now();
    let decision = &envelope.final_decision;
    let severity = decision.severity_level;

    let message = AlertMessage {
        alert_type: ALERT_TYPE.to_string(),
        alert_id: format!("alert_{}_{}", record.id, now.timestamp()),
        complaint_details: ComplaintDetails {
            record_id: record.id,
            user_id: record.user_id.clone(),
            category: record.category.clone(),
            priority: record.priority.clone(),
            created_at: record.created_at,
        },
        moderation_results: ModerationResults {
            severity_level: severity,
            confidence_score: decision.confidence,
            recommendation: decision.recommended_action,
            primary_method: decision.primary_method,
            detection_methods: decision.detection_methods.clone(),
            reasoning: decision.reasoning.clone(),
        },
        analysis_summary: AnalysisSummary {
            profanity_detected: envelope.signals.profanity_detected(),
            sentiment: envelope
                .signals
                .sentiment()
                .map(|s| s.sentiment.to_string())
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            secondary_analysis_used: envelope.secondary_used(),
        },
        action_required: ActionRequired {
            requires_immediate_attention: severity.requires_immediate_attention(),
            suggested_action: decision.recommended_action,
            human_review_required: envelope
                .secondary
                .judgment()
                .is_some_and(|j| j.requires_human_review),
        },
        storage_location: location.map(str::to_string),
        generated_at: now.naive_utc(),
    };

    Alert {
        subject: alert_subject(severity, record.id),
        severity,
        message,
    }
}

/// Writes alerts to the log.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(
        &self,
        envelope: &DecisionEnvelope,
        record: &ComplaintRecord,
        location: Option<&str>,
    ) -> Result<(), NotifyError> {
        let alert = build_alert(envelope, record, location);
        let body = serde_json::to_string(&alert.message)?;
        tracing::warn!(
            complaint_id = record.id,
            severity = %alert.severity,
            method = %alert.message.moderation_results.primary_method,
            subject = %alert.subject,
            alert = %body,
            "Content moderation alert"
        );
        Ok(())
    }
}

/// POSTs alerts as JSON to a webhook.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn notify(
        &self,
        envelope: &DecisionEnvelope,
        record: &ComplaintRecord,
        location: Option<&str>,
    ) -> Result<(), NotifyError> {
        let alert = build_alert(envelope, record, location);
        let response = self
            .client
            .post(&self.url)
            .json(&alert)
            .send()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        tracing::info!(complaint_id = record.id, severity = %alert.severity, "Alert delivered");
        Ok(())
    }
}
