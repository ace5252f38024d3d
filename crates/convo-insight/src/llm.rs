//! Generative-language model seam and the Gemini `generateContent` client.
//!
//! The extractor only needs single-shot text completion: one prompt in, raw
//! text out. No streaming, no multi-turn context.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use convo_core::config::AnalysisConfig;

use crate::error::LlmError;

/// Single-shot text completion.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Send `prompt` and return the model's raw text.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

// =============================================================================
// Gemini wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

// =============================================================================
// Gemini client
// =============================================================================

/// Google Gemini client for the `generateContent` endpoint.
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    /// Create a client for `model` with a default HTTP client.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: AnalysisConfig::default().base_url,
            client: Client::new(),
        }
    }

    /// Build a client from configuration.
    ///
    /// Returns `Ok(None)` when no API key is configured.
    pub fn from_config(config: &AnalysisConfig) -> Result<Option<Self>, LlmError> {
        let Some(api_key) = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
        else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Some(Self {
            api_key: api_key.to_string(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        }))
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn build_request(prompt: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }

    /// Concatenate the text parts of the first candidate.
    fn extract_text(response: &GeminiResponse) -> Result<String, LlmError> {
        let text: String = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            Err(LlmError::EmptyResponse)
        } else {
            Ok(text)
        }
    }

    fn map_api_error(status: u16, body: &str) -> LlmError {
        let message = serde_json::from_str::<GeminiResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .map_or_else(|| body.to_string(), |e| e.message);

        match status {
            429 => LlmError::RateLimited(message),
            _ => LlmError::Api { status, message },
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = Self::build_request(prompt);
        debug!(prompt_len = prompt.len(), "Sending generateContent request");

        let response = self
            .client
            .post(self.build_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.without_url().to_string()))?;

        if !status.is_success() {
            error!(status = %status, "Gemini API error");
            return Err(Self::map_api_error(status.as_u16(), &body));
        }

        let parsed: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Failed to parse Gemini response");
            LlmError::Api {
                status: status.as_u16(),
                message: format!("malformed response: {}", e),
            }
        })?;

        if let Some(err) = parsed.error {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: err.message,
            });
        }

        Self::extract_text(&parsed)
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Scripted language model for tests and offline use.
///
/// Replies are consumed in order; once the script is exhausted every call
/// fails with `LlmError::EmptyResponse`. Prompts are recorded.
#[derive(Debug, Default)]
pub struct MockLanguageModel {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queue a failing reply.
    pub fn with_failure(self, err: LlmError) -> Self {
        self.push(Err(err));
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, reply: Result<String, LlmError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_contains_model_and_key() {
        let client = GeminiClient::new("k3y", "gemini-pro").with_base_url("https://example.test/v1/");
        assert_eq!(
            client.build_url(),
            "https://example.test/v1/models/gemini-pro:generateContent?key=k3y"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = GeminiClient::new("super-secret", "gemini-pro");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_from_config_without_key() {
        let config = AnalysisConfig::default();
        assert!(GeminiClient::from_config(&config).unwrap().is_none());

        let blank = AnalysisConfig {
            api_key: Some("   ".into()),
            ..AnalysisConfig::default()
        };
        assert!(GeminiClient::from_config(&blank).unwrap().is_none());
    }

    #[test]
    fn test_from_config_with_key() {
        let config = AnalysisConfig {
            api_key: Some("abc".into()),
            model: "gemini-1.5-flash".into(),
            ..AnalysisConfig::default()
        };
        let client = GeminiClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.model(), "gemini-1.5-flash");
    }

    #[test]
    fn test_build_request_shape() {
        let value = serde_json::to_value(GeminiClient::build_request("hello")).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"[\"a\","},{"text":"\"b\"]"}]}}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(GeminiClient::extract_text(&parsed).unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn test_extract_text_empty() {
        let parsed: GeminiResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(
            GeminiClient::extract_text(&parsed),
            Err(LlmError::EmptyResponse)
        ));
    }

    #[test]
    fn test_map_api_error() {
        let body = r#"{"error":{"message":"Quota exceeded"}}"#;
        assert!(matches!(
            GeminiClient::map_api_error(429, body),
            LlmError::RateLimited(m) if m == "Quota exceeded"
        ));
        match GeminiClient::map_api_error(500, "plain text") {
            LlmError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "plain text");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mock_replays_script_in_order() {
        let model = MockLanguageModel::new()
            .with_reply("first")
            .with_failure(LlmError::Http("down".into()));

        assert_eq!(model.generate("p1").await.unwrap(), "first");
        assert!(matches!(model.generate("p2").await, Err(LlmError::Http(_))));
        assert!(matches!(
            model.generate("p3").await,
            Err(LlmError::EmptyResponse)
        ));
        assert_eq!(model.prompts(), vec!["p1", "p2", "p3"]);
    }
}
