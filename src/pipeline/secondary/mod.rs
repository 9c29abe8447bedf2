//! Secondary semantic analyzer.
//!
//! A language model served by a local Ollama instance judges the complaint
//! when the escalation policy (or the forced mode) asks for it. Every
//! failure is a [`SecondaryError`]; callers decide how to degrade.

pub mod ollama;
pub mod prompt;
pub mod types;

pub use ollama::{MockLlmClient, OllamaClient};
pub use types::*;

use crate::models::UserContext;

/// The production analyzer: a local Ollama server.
pub type OllamaAnalyzer = LlmSecondaryAnalyzer<OllamaClient>;

/// Secondary analyzer backed by any [`LlmClient`].
pub struct LlmSecondaryAnalyzer<C: LlmClient> {
    client: C,
    model_id: String,
}

impl<C: LlmClient> LlmSecondaryAnalyzer<C> {
    pub fn new(client: C, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: LlmClient> SecondaryAnalyzer for LlmSecondaryAnalyzer<C> {
    fn analyze(
        &self,
        text: &str,
        context: Option<&UserContext>,
    ) -> Result<SecondaryJudgment, SecondaryError> {
        if text.trim().is_empty() {
            return Err(SecondaryError::InvalidInput("empty text".into()));
        }

        let prompt = prompt::build_moderation_prompt(text, context);
        let started = std::time::Instant::now();
        let reply = self
            .client
            .generate(&self.model_id, &prompt, prompt::MODERATOR_SYSTEM_PROMPT)?;

        let mut judgment = prompt::parse_judgment(&reply)?;
        judgment.model_id = self.model_id.clone();

        tracing::debug!(
            model = %self.model_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            urgency = %judgment.urgency,
            "Secondary analysis complete"
        );
        Ok(judgment)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"```json
{"toxicity_score": 8, "threat_level": "MEDIUM", "content_issues": ["personal attacks"],
 "urgency": "CRITICAL", "recommended_action": "ESCALATE", "summary": "Abusive",
 "confidence": 0.92, "requires_human_review": true}
```"#;

    #[test]
    fn analyzer_parses_and_stamps_model() {
        let analyzer = LlmSecondaryAnalyzer::new(MockLlmClient::new(REPLY), "moderator-7b");
        let judgment = analyzer.analyze("You people are useless", None).unwrap();
        assert_eq!(judgment.model_id, "moderator-7b");
        assert_eq!(judgment.severity(), crate::models::Severity::Critical);
        assert_eq!(analyzer.model_id(), "moderator-7b");
    }

    #[test]
    fn analyzer_sends_user_context() {
        let analyzer = LlmSecondaryAnalyzer::new(MockLlmClient::new(REPLY), "m");
        let ctx = UserContext {
            user_id: "u-1".into(),
            complaint_count: 12,
            flagged_count: 3,
            last_complaint_time: None,
        };
        analyzer.analyze("Where is my refund", Some(&ctx)).unwrap();
        let prompts = analyzer.client().prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Previous complaints (90 days): 12"));
    }

    #[test]
    fn transport_error_propagates() {
        let analyzer =
            LlmSecondaryAnalyzer::new(MockLlmClient::failing(SecondaryError::Timeout(30)), "m");
        let err = analyzer.analyze("Where is my refund", None).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn non_json_reply_is_malformed() {
        let analyzer = LlmSecondaryAnalyzer::new(MockLlmClient::new("no idea"), "m");
        assert!(matches!(
            analyzer.analyze("Where is my refund", None),
            Err(SecondaryError::MalformedResponse(_))
        ));
    }

    #[test]
    fn empty_text_rejected_without_call() {
        let analyzer = LlmSecondaryAnalyzer::new(MockLlmClient::new(REPLY), "m");
        assert!(matches!(
            analyzer.analyze("   ", None),
            Err(SecondaryError::InvalidInput(_))
        ));
        assert_eq!(analyzer.client().call_count(), 0);
    }
}
