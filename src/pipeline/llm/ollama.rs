use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::LlmClient;
use super::LlmError;
use crate::config::LlmSettings;

/// Ollama HTTP client for local LLM inference.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    pub fn from_settings(settings: &LlmSettings) -> Result<Self, LlmError> {
        Self::new(&settings.base_url, &settings.model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e, None))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    pub fn is_model_available(&self) -> Result<bool, LlmError> {
        let models = self.list_models()?;
        Ok(self.is_listed(&models))
    }

    /// Installed tags carry a suffix (`gemma3:latest`), so a configured
    /// `gemma3` matches by prefix.
    fn is_listed(&self, models: &[String]) -> bool {
        models.iter().any(|m| m.starts_with(&self.model))
    }

    fn map_send_error(&self, e: reqwest::Error, timeout: Option<Duration>) -> LlmError {
        if e.is_connect() {
            LlmError::Unavailable(self.base_url.clone())
        } else if e.is_timeout() {
            LlmError::Timeout(timeout.map_or(0, |t| t.as_millis() as u64))
        } else {
            LlmError::Http(e.to_string())
        }
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    format: &'a str,
    stream: bool,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl LlmClient for OllamaClient {
    fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            format: "json",
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e, Some(timeout)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        if parsed.response.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(parsed.response)
    }
}

/// Mock LLM client that returns a configurable response.
pub struct MockLlmClient {
    response: String,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for MockLlmClient {
    fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Mock LLM client that always fails with the given error.
pub struct FailingLlmClient {
    error: LlmError,
    calls: AtomicUsize,
}

impl FailingLlmClient {
    pub fn new(error: LlmError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for FailingLlmClient {
    fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Mock LLM client that ignores the timeout and answers after `delay`.
pub struct SlowLlmClient {
    delay: Duration,
    response: String,
}

impl SlowLlmClient {
    pub fn new(delay: Duration, response: &str) -> Self {
        Self {
            delay,
            response: response.to_string(),
        }
    }
}

impl LlmClient for SlowLlmClient {
    fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
        std::thread::sleep(self.delay);
        Ok(self.response.clone())
    }
}

/// Mock LLM client that plays back a fixed sequence of outcomes, repeating
/// the last one once the script runs out.
pub struct ScriptedLlmClient {
    script: Mutex<Vec<Result<String, LlmError>>>,
    calls: AtomicUsize,
}

impl ScriptedLlmClient {
    pub fn new(mut script: Vec<Result<String, LlmError>>) -> Self {
        script.reverse();
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for ScriptedLlmClient {
    fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self
            .script
            .lock()
            .map_err(|_| LlmError::Unavailable("script lock poisoned".into()))?;
        match script.len() {
            0 => Err(LlmError::EmptyResponse),
            1 => script[0].clone(),
            _ => script.pop().unwrap_or(Err(LlmError::EmptyResponse)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_secs(1);

    #[test]
    fn mock_client_returns_configured_response() {
        let client = MockLlmClient::new("test response");
        assert_eq!(client.complete("prompt", T).unwrap(), "test response");
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn failing_client_counts_calls() {
        let client = FailingLlmClient::new(LlmError::Timeout(10));
        assert_eq!(client.complete("p", T), Err(LlmError::Timeout(10)));
        assert_eq!(client.complete("p", T), Err(LlmError::Timeout(10)));
        assert_eq!(client.calls(), 2);
    }

    #[test]
    fn scripted_client_plays_in_order_then_repeats_last() {
        let client = ScriptedLlmClient::new(vec![
            Err(LlmError::EmptyResponse),
            Ok("first".into()),
            Ok("last".into()),
        ]);
        assert_eq!(client.complete("p", T), Err(LlmError::EmptyResponse));
        assert_eq!(client.complete("p", T).unwrap(), "first");
        assert_eq!(client.complete("p", T).unwrap(), "last");
        assert_eq!(client.complete("p", T).unwrap(), "last");
        assert_eq!(client.calls(), 4);
    }

    #[test]
    fn ollama_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", "gemma3:latest").unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.model(), "gemma3:latest");
    }

    #[test]
    fn from_settings_uses_configured_backend() {
        let settings = LlmSettings::default();
        let client = OllamaClient::from_settings(&settings).unwrap();
        assert_eq!(client.base_url, settings.base_url.trim_end_matches('/'));
        assert_eq!(client.model(), settings.model);
    }

    #[test]
    fn model_listing_matches_by_tag_prefix() {
        let body = r#"{"models": [{"name": "gemma3:latest"}, {"name": "llama3.2:3b"}]}"#;
        let parsed: OllamaTagsResponse = serde_json::from_str(body).unwrap();
        let names: Vec<String> = parsed.models.into_iter().map(|m| m.name).collect();

        let client = OllamaClient::new("http://localhost:11434", "gemma3").unwrap();
        assert!(client.is_listed(&names));
        let client = OllamaClient::new("http://localhost:11434", "mistral").unwrap();
        assert!(!client.is_listed(&names));
    }

    #[test]
    fn model_listing_on_unreachable_backend_fails() {
        let client = OllamaClient::new("http://127.0.0.1:9", "gemma3:latest").unwrap();
        assert!(matches!(
            client.list_models().unwrap_err(),
            LlmError::Unavailable(_) | LlmError::Http(_) | LlmError::Timeout(_)
        ));
        assert!(matches!(
            client.is_model_available().unwrap_err(),
            LlmError::Unavailable(_) | LlmError::Http(_) | LlmError::Timeout(_)
        ));
    }

    #[test]
    fn unreachable_backend_is_unavailable() {
        // Port 9 (discard) is closed on test hosts
        let client = OllamaClient::new("http://127.0.0.1:9", "gemma3:latest").unwrap();
        let err = client.complete("p", Duration::from_secs(2)).unwrap_err();
        assert!(matches!(
            err,
            LlmError::Unavailable(_) | LlmError::Http(_) | LlmError::Timeout(_)
        ));
    }
}
