//! Blocking HTTP transport for the Gemini `streamGenerateContent` endpoint.
//!
//! The endpoint answers with a JSON array of response fragments; each fragment
//! carries part of the generated text. Decoding the fragments into a single
//! string is left to [`crate::transform`].

use crate::config::GeminiConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Request body for `generateContent` / `streamGenerateContent`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    /// Conversation turns; a rewrite sends exactly one user turn
    pub contents: Vec<Content>,
}

impl GenerateRequest {
    /// Creates a request holding a single user message.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(text.into()),
                }],
            }],
        }
    }
}

/// One message of a conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    /// `user` or `model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Ordered message parts
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A piece of a message; only text parts are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    /// Text payload, absent for non-text parts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One element of the streamed response array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFragment {
    /// Candidate completions; the first one is used
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    /// Model version reported by the service
    #[serde(default)]
    pub model_version: Option<String>,

    /// In-stream error object
    #[serde(default)]
    pub error: Option<ApiError>,
}

impl ResponseFragment {
    /// Builds a fragment carrying `text`, mostly for tests and fakes.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts: vec![Part {
                        text: Some(text.into()),
                    }],
                }),
                finish_reason: None,
            }],
            ..Self::default()
        }
    }

    /// Iterates the text parts of the first candidate.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .into_iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
    }
}

/// A candidate completion.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Generated message
    #[serde(default)]
    pub content: Option<Content>,

    /// Why generation stopped (`STOP`, `MAX_TOKENS`, `SAFETY`, ...)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Error object returned by the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    /// HTTP-like status code
    #[serde(default)]
    pub code: Option<u16>,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Canonical status name
    #[serde(default)]
    pub status: Option<String>,
}

/// A text-completion service reachable with a single instruction.
///
/// Implementations perform exactly one outbound call per invocation and never
/// retry.
pub trait CompletionBackend {
    /// Sends `instruction` and returns the response fragments in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on network failure, non-success status,
    /// malformed body or an empty fragment list.
    fn stream_generate(&self, instruction: &str) -> Result<Vec<ResponseFragment>>;
}

impl<T: CompletionBackend + ?Sized> CompletionBackend for &T {
    fn stream_generate(&self, instruction: &str) -> Result<Vec<ResponseFragment>> {
        (**self).stream_generate(instruction)
    }
}

/// HTTP client for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    http_client: reqwest::blocking::Client,
}

impl GeminiClient {
    /// Creates a client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the settings are invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        config.validate()?;

        let http_client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &GeminiConfig {
        &self.config
    }
}

impl CompletionBackend for GeminiClient {
    #[instrument(
        skip(self, instruction),
        fields(model = %self.config.model, instruction_len = instruction.len())
    )]
    fn stream_generate(&self, instruction: &str) -> Result<Vec<ResponseFragment>> {
        let url = self.config.stream_endpoint();
        debug!("Sending completion request");

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&GenerateRequest::user_text(instruction))
            .send()
            .map_err(|e| {
                // The URL carries the API key.
                let e = e.without_url();
                warn!("HTTP request failed: {e}");
                Error::from(e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| Error::from(e.without_url()))?;

        if !status.is_success() {
            warn!(%status, "Completion service returned an error");
            return Err(Error::http_status(status.as_u16(), body));
        }

        parse_stream_body(&body)
    }
}

/// Parses a `streamGenerateContent` body into fragments.
///
/// # Errors
///
/// Returns [`Error::Transport`] if the body is not a JSON array of fragments,
/// is empty, or carries an API error object.
pub fn parse_stream_body(body: &str) -> Result<Vec<ResponseFragment>> {
    let fragments: Vec<ResponseFragment> = serde_json::from_str(body)
        .map_err(|e| Error::transport(format!("malformed response body: {e}")))?;

    if fragments.is_empty() {
        return Err(Error::transport("empty response"));
    }

    if let Some(api_error) = fragments.iter().find_map(|f| f.error.as_ref()) {
        return Err(Error::Transport {
            status: api_error.code,
            message: format!(
                "{}{}",
                api_error
                    .status
                    .as_deref()
                    .map(|s| format!("{s}: "))
                    .unwrap_or_default(),
                api_error.message
            ),
        });
    }

    debug!("Received {} response fragment(s)", fragments.len());
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM_BODY: &str = r#"[
        {"candidates": [{"content": {"parts": [{"text": "{"}], "role": "model"}}], "modelVersion": "gemini-2.0-flash"},
        {"candidates": [{"content": {"parts": [{"text": "\n  \""}], "role": "model"}}], "modelVersion": "gemini-2.0-flash"},
        {"candidates": [{"content": {"parts": [{"text": "response\": \"Pale orb\\n\"\n}"}], "role": "model"}, "finishReason": "STOP"}],
         "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 37, "totalTokenCount": 49},
         "modelVersion": "gemini-2.0-flash"}
    ]"#;

    #[test]
    fn test_request_serialization() {
        let request = GenerateRequest::user_text("hello");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_parse_stream_body() {
        let fragments = parse_stream_body(STREAM_BODY).unwrap();

        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].texts().collect::<Vec<_>>(), vec!["{"]);
        assert_eq!(
            fragments[2].candidates[0].finish_reason.as_deref(),
            Some("STOP")
        );
        assert_eq!(fragments[0].model_version.as_deref(), Some("gemini-2.0-flash"));
    }

    #[test]
    fn test_parse_empty_array_is_transport_error() {
        let err = parse_stream_body("[]").unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("empty response"));
    }

    #[test]
    fn test_parse_malformed_body() {
        assert!(parse_stream_body("<html>oops</html>").unwrap_err().is_transport());
        assert!(parse_stream_body("").unwrap_err().is_transport());
    }

    #[test]
    fn test_parse_in_stream_api_error() {
        let body = r#"[{"error": {"code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED"}}]"#;
        let err = parse_stream_body(body).unwrap_err();

        assert!(matches!(err, Error::Transport { status: Some(429), .. }));
        assert!(err.to_string().contains("RESOURCE_EXHAUSTED: quota exceeded"));
    }

    #[test]
    fn test_fragment_without_candidates_has_no_text() {
        let fragments = parse_stream_body(r#"[{"usageMetadata": {}}]"#).unwrap();
        assert_eq!(fragments[0].texts().count(), 0);
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let err = GeminiClient::new(GeminiConfig::new("")).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_client_builds_with_valid_config() {
        let client = GeminiClient::new(GeminiConfig::new("key")).unwrap();
        assert_eq!(client.config().model, "gemini-2.0-flash");
    }
}
