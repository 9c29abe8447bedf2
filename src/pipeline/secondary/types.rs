use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Recommendation, Severity, UserContext};

/// A semantic judgment returned by the secondary analyzer.
/// Every field is optional on the wire. Missing, null or wrongly typed
/// values take their defaults instead of rejecting the whole reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryJudgment {
    /// 0 to 10.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub toxicity_score: f64,
    #[serde(default = "default_threat_level", deserialize_with = "lenient_threat_level")]
    pub threat_level: String,
    #[serde(
        default,
        rename = "content_issues",
        alias = "issues",
        deserialize_with = "lenient_string_list"
    )]
    pub issues: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub urgency: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub recommended_action: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub requires_human_review: bool,
    /// Model that produced the judgment; filled in by the analyzer.
    #[serde(default, deserialize_with = "lenient_string")]
    pub model_id: String,
}

fn default_threat_level() -> String {
    "NONE".to_string()
}

fn number_from(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn text_from(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_from(&value).unwrap_or_default())
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_from(&value))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(text_from(value).unwrap_or_default())
}

fn lenient_threat_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(text_from(value)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(default_threat_level))
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    })
}

// A single string is taken as a one-item list.
fn lenient_string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(text_from)
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

impl SecondaryJudgment {
    /// Urgency mapped onto the severity scale (unknown → LOW).
    pub fn severity(&self) -> Severity {
        Severity::from_urgency(&self.urgency)
    }

    pub fn recommendation(&self) -> Option<Recommendation> {
        Recommendation::from_label(&self.recommended_action)
    }

    /// Reported confidence clamped to [0, 1], or `fallback` if absent or not finite.
    pub fn confidence_or(&self, fallback: f64) -> f64 {
        match self.confidence {
            Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
            _ => fallback,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SecondaryError {
    #[error("Secondary analyzer is not reachable at {0}")]
    Connection(String),

    #[error("Secondary analyzer timed out after {0}s")]
    Timeout(u64),

    #[error("Secondary analyzer returned error (status {status}): {body}")]
    Http { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed analyzer response: {0}")]
    MalformedResponse(String),

    #[error("Analyzer input rejected: {0}")]
    InvalidInput(String),
}

impl SecondaryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Raw text generation against a model server.
pub trait LlmClient {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, SecondaryError>;

    fn list_models(&self) -> Result<Vec<String>, SecondaryError>;
}

/// Higher-cost semantic judgment of a complaint text.
pub trait SecondaryAnalyzer {
    fn analyze(
        &self,
        text: &str,
        context: Option<&UserContext>,
    ) -> Result<SecondaryJudgment, SecondaryError>;

    fn model_id(&self) -> &str;
}
