//! Core `SpeechGenerator` trait and `ApiGenerator` implementation.
//!
//! `ApiGenerator` POSTs `{ lessonId, experienceId }` to the backend's
//! generation endpoint and receives base64 audio plus the word timing table.
//! All connection details come from [`GenerationConfig`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::timing::WordTiming;

// ---------------------------------------------------------------------------
// GenerationError
// ---------------------------------------------------------------------------

/// Errors that can occur while fetching generated speech.
///
/// `Clone` so a single in-flight result can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    /// HTTP transport or connection error.
    #[error("generation request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("generation request timed out")]
    Timeout,

    /// The backend answered with a non-success status.
    #[error("generation backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// The response body was not the expected JSON shape.
    #[error("failed to parse generation response: {0}")]
    Parse(String),

    /// The audio payload could not be decoded.
    #[error("failed to decode generated audio: {0}")]
    Decode(String),
}

impl GenerationError {
    /// Transport failures and server-side (5xx) errors are worth retrying;
    /// malformed payloads and client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Request(_) | GenerationError::Timeout => true,
            GenerationError::Backend { status, .. } => *status >= 500,
            GenerationError::Parse(_) | GenerationError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub lesson_id: String,
    pub experience_id: Option<String>,
}

/// Body of a successful generation response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub audio_base64: String,
    pub duration: f64,
    #[serde(default)]
    pub word_timings: Vec<WordTiming>,
}

/// Pull a human-readable message out of an error body.
///
/// Tries `{"error": "..."}`, then `{"message": "..."}`, then the raw text.
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message"] {
            if let Some(msg) = json[key].as_str() {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no error message".to_string()
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// SpeechGenerator trait
// ---------------------------------------------------------------------------

/// Async seam in front of the text-to-speech backend.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn SpeechGenerator>`.
#[async_trait]
pub trait SpeechGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError>;
}

// ---------------------------------------------------------------------------
// ApiGenerator
// ---------------------------------------------------------------------------

/// Calls the backend's generation endpoint over HTTP.
pub struct ApiGenerator {
    client: reqwest::Client,
    config: GenerationConfig,
}

impl ApiGenerator {
    /// Build an `ApiGenerator` from config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`; a default client is used if the builder fails.
    pub fn from_config(config: &GenerationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.endpoint.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl SpeechGenerator for ApiGenerator {
    /// POST the request; the `Authorization: Bearer …` header is attached only
    /// when `config.api_key` is a non-empty string.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let url = self.url();
        log::debug!("generation: POST {url} lesson={}", request.lesson_id);

        let mut req = self.client.post(&url).json(request);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Backend {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        response
            .json::<GenerationResponse>()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
