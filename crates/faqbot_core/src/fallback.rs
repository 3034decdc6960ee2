use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::config::{FallbackConfig, Provider};
use crate::error::FallbackError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

// Error bodies are echoed back to the user; keep them short.
const MAX_ERROR_BODY: usize = 300;

/// A text-completion service consulted when the corpus has no confident
/// answer. Implementations are called with the user's raw question.
pub trait GenerativeFallback {
    fn generate(&self, prompt: &str) -> Result<String, FallbackError>;
}

impl GenerativeFallback for Box<dyn GenerativeFallback> {
    fn generate(&self, prompt: &str) -> Result<String, FallbackError> {
        (**self).generate(prompt)
    }
}

/// Stands in when no credential is available. Every call fails.
#[derive(Debug, Clone)]
pub struct UnconfiguredFallback {
    reason: String,
}

impl UnconfiguredFallback {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl GenerativeFallback for UnconfiguredFallback {
    fn generate(&self, _prompt: &str) -> Result<String, FallbackError> {
        Err(FallbackError::NotConfigured(self.reason.clone()))
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client, FallbackError> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?)
}

fn classify(err: reqwest::Error, timeout: Duration) -> FallbackError {
    if err.is_timeout() {
        FallbackError::Timeout(timeout)
    } else {
        FallbackError::Http(err)
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((i, _)) => format!("{}...", &text[..i]),
        None => text.to_string(),
    }
}

/// Sends `body` and returns the parsed JSON of a successful response.
fn post_json(
    req: reqwest::blocking::RequestBuilder,
    body: &Value,
    timeout: Duration,
) -> Result<Value, FallbackError> {
    let resp = req.json(body).send().map_err(|e| classify(e, timeout))?;
    let status = resp.status();
    let text = resp.text().map_err(|e| classify(e, timeout))?;

    if !status.is_success() {
        return Err(FallbackError::Status {
            status: status.as_u16(),
            body: truncate(text.trim()),
        });
    }

    serde_json::from_str(&text).map_err(|e| FallbackError::Malformed(format!("invalid JSON: {e}")))
}

/// Google Generative Language `generateContent` client.
pub struct GeminiClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FallbackError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl GenerativeFallback for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String, FallbackError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        debug!(model = %self.model, "calling gemini fallback");

        let req = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key);
        let json = post_json(req, &body, self.timeout)?;
        gemini_text(&json)
    }
}

/// Concatenates the text parts of the first candidate.
pub fn gemini_text(json: &Value) -> Result<String, FallbackError> {
    if let Some(reason) = json["promptFeedback"]["blockReason"].as_str() {
        return Err(FallbackError::Malformed(format!("prompt blocked: {reason}")));
    }

    let parts = json["candidates"]
        .get(0)
        .and_then(|c| c["content"]["parts"].as_array())
        .ok_or_else(|| FallbackError::Malformed("no candidates in response".to_string()))?;

    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.trim().is_empty() {
        return Err(FallbackError::Malformed("empty response text".to_string()));
    }
    Ok(text)
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompatClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenAiCompatClient {
    pub fn new(
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FallbackError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
        })
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }
}

impl GenerativeFallback for OpenAiCompatClient {
    fn generate(&self, prompt: &str) -> Result<String, FallbackError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        debug!(model = %self.model, "calling chat completions fallback");

        let mut req = self.client.post(self.endpoint());
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let json = post_json(req, &body, self.timeout)?;
        chat_completion_text(&json)
    }
}

pub fn chat_completion_text(json: &Value) -> Result<String, FallbackError> {
    let content = json["choices"]
        .get(0)
        .and_then(|c| c["message"]["content"].as_str())
        .ok_or_else(|| FallbackError::Malformed("no choices in response".to_string()))?;

    if content.trim().is_empty() {
        return Err(FallbackError::Malformed("empty response text".to_string()));
    }
    Ok(content.to_string())
}

/// Builds the configured fallback. A missing API key yields an
/// [`UnconfiguredFallback`] so the chat keeps working for corpus hits.
pub fn from_config(cfg: &FallbackConfig) -> Result<Box<dyn GenerativeFallback>, FallbackError> {
    let key_env = cfg.api_key_env();
    let api_key = std::env::var(key_env).ok().filter(|k| !k.trim().is_empty());
    let timeout = cfg.timeout().unwrap_or(DEFAULT_TIMEOUT);

    let fallback: Box<dyn GenerativeFallback> = match (cfg.provider, api_key) {
        (Provider::Gemini, Some(key)) => Box::new(GeminiClient::new(
            key,
            cfg.model(),
            cfg.base_url(),
            timeout,
        )?),
        (Provider::Gemini, None) => {
            Box::new(UnconfiguredFallback::new(format!("${key_env} is not set")))
        }
        (Provider::OpenAi, key) => Box::new(OpenAiCompatClient::new(
            key,
            cfg.model(),
            cfg.base_url(),
            timeout,
        )?),
    };
    Ok(fallback)
}
