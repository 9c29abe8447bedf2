use std::cell::RefCell;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::types::{LlmClient, SecondaryError};

/// Ollama HTTP client for the secondary analyzer.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, SecondaryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SecondaryError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the server answers at all.
    pub fn is_reachable(&self) -> bool {
        self.list_models().is_ok()
    }

    fn map_send_error(&self, e: reqwest::Error) -> SecondaryError {
        if e.is_connect() {
            SecondaryError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            SecondaryError::Timeout(self.timeout_secs)
        } else {
            SecondaryError::HttpClient(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl LlmClient for OllamaClient {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, SecondaryError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model,
            prompt,
            system,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SecondaryError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response.json().map_err(|e| {
            if e.is_timeout() {
                SecondaryError::Timeout(self.timeout_secs)
            } else {
                SecondaryError::MalformedResponse(e.to_string())
            }
        })?;

        Ok(parsed.response)
    }

    fn list_models(&self) -> Result<Vec<String>, SecondaryError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SecondaryError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| SecondaryError::MalformedResponse(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

/// Scripted client for tests: replays queued outcomes, then repeats the
/// fallback reply. Records every prompt it receives.
pub struct MockLlmClient {
    fallback: Result<String, SecondaryError>,
    queued: RefCell<VecDeque<Result<String, SecondaryError>>>,
    prompts: RefCell<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            fallback: Ok(response.to_string()),
            queued: RefCell::new(VecDeque::new()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(error: SecondaryError) -> Self {
        Self {
            fallback: Err(error),
            queued: RefCell::new(VecDeque::new()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn then(self, outcome: Result<String, SecondaryError>) -> Self {
        self.queued.borrow_mut().push_back(outcome);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, _model: &str, prompt: &str, _system: &str) -> Result<String, SecondaryError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        match self.queued.borrow_mut().pop_front() {
            Some(outcome) => outcome,
            None => self.fallback.clone(),
        }
    }

    fn list_models(&self) -> Result<Vec<String>, SecondaryError> {
        Ok(vec!["mock-moderator".to_string()])
    }
}
