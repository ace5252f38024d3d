//! Key-point extraction.
//!
//! `extract` never fails: a missing credential yields no key points, and any
//! remote failure yields the single [`ANALYSIS_FAILED`] marker. Unstructured
//! model output goes through a line-based fallback parser.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use convo_core::config::AnalysisConfig;

use crate::error::LlmError;
use crate::llm::{GeminiClient, LanguageModel};

/// Key point returned when the model could not be reached or answered badly.
pub const ANALYSIS_FAILED: &str = "Unable to analyze response";

const ELLIPSIS: &str = "...";

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*\n?(.*?)\n?\s*```\s*$").expect("Invalid fence regex")
});

/// Bounds applied to every extracted list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPointLimits {
    pub max_points: usize,
    /// Maximum characters per point, ellipsis included.
    pub max_chars: usize,
}

impl Default for KeyPointLimits {
    fn default() -> Self {
        Self {
            max_points: 3,
            max_chars: 100,
        }
    }
}

impl From<&AnalysisConfig> for KeyPointLimits {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            max_points: config.max_key_points,
            max_chars: config.max_point_chars.max(ELLIPSIS.len() + 1),
        }
    }
}

/// Turns free-text response content into a short list of key points.
#[derive(Clone)]
pub struct KeyPointExtractor {
    model: Option<Arc<dyn LanguageModel>>,
    limits: KeyPointLimits,
    timeout: Duration,
}

impl std::fmt::Debug for KeyPointExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPointExtractor")
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .field("limits", &self.limits)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl KeyPointExtractor {
    /// Create an extractor. `None` means no credential is configured.
    pub fn new(model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self {
            model,
            limits: KeyPointLimits::default(),
            timeout: Duration::from_secs(AnalysisConfig::default().timeout_secs),
        }
    }

    /// Build an extractor backed by Gemini when an API key is configured.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let model: Option<Arc<dyn LanguageModel>> = match GeminiClient::from_config(config) {
            Ok(Some(client)) => {
                info!(model = %client.model(), "Key-point extraction enabled");
                Some(Arc::new(client))
            }
            Ok(None) => {
                info!("No analysis API key configured; key points disabled");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to build analysis client; key points disabled");
                None
            }
        };

        Self::new(model)
            .with_limits(KeyPointLimits::from(config))
            .with_timeout(Duration::from_secs(config.timeout_secs.max(1)))
    }

    pub fn with_limits(mut self, limits: KeyPointLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether a language model is available.
    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    /// Extract at most `max_points` key points from `content`.
    pub async fn extract(&self, content: &str) -> Vec<String> {
        let content = content.trim();
        let Some(model) = self.model.as_ref() else {
            debug!("Extractor has no credential; returning no key points");
            return Vec::new();
        };
        if content.is_empty() {
            return Vec::new();
        }

        let prompt = build_prompt(content);
        let outcome = match tokio::time::timeout(self.timeout, model.generate(&prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout.as_secs())),
        };

        match outcome {
            Ok(raw) => {
                let points = parse_key_points(&raw, self.limits);
                debug!(count = points.len(), provider = model.name(), "Key points extracted");
                points
            }
            Err(e) => {
                warn!(error = %e, provider = model.name(), "Key-point analysis failed");
                vec![ANALYSIS_FAILED.to_string()]
            }
        }
    }
}

/// Prompt sent to the model for one response.
pub fn build_prompt(content: &str) -> String {
    format!(
        "Analyze this conversation response and provide 2-3 concise, actionable key points. \
         Focus on decisions made, action items, or important insights. \
         Keep each point under 15 words. Format as a JSON array of strings.\n\n\
         Response: {}",
        content
    )
}

/// Parse raw model output into bounded key points.
///
/// A JSON array of strings is preferred; anything else is split into lines.
pub fn parse_key_points(raw: &str, limits: KeyPointLimits) -> Vec<String> {
    let unfenced = strip_code_fence(raw);
    match decode_structured(unfenced) {
        Some(items) => bound(items.into_iter(), limits),
        None => {
            debug!("Model output is not a JSON list; using line fallback");
            let lines = unfenced
                .lines()
                .map(str::trim)
                .filter(|line| !line.starts_with('[') && !line.starts_with(']'))
                .filter(|line| !line.starts_with("```"))
                .map(String::from);
            bound(lines, limits)
        }
    }
}

fn decode_structured(text: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<serde_json::Value>(text.trim()) {
        Ok(serde_json::Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s.trim().to_string()),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn bound(items: impl Iterator<Item = String>, limits: KeyPointLimits) -> Vec<String> {
    items
        .filter(|s| !s.is_empty())
        .take(limits.max_points)
        .map(|s| truncate_point(&s, limits.max_chars))
        .collect()
}

/// Return the body of a Markdown code fence, or the input unchanged.
fn strip_code_fence(raw: &str) -> &str {
    CODE_FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map_or(raw, |m| m.as_str())
}

/// Hard-truncate to `max_chars` characters, ending in an ellipsis.
fn truncate_point(point: &str, max_chars: usize) -> String {
    if point.chars().count() <= max_chars {
        return point.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut out: String = point.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

// =============================================================================
// Tests
// =============================================================================
