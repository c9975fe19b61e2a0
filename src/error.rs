//! Error types for image generation sessions.

use std::time::Duration;

/// Message shown when a failed generation carries no usable text.
pub const FALLBACK_ERROR_MESSAGE: &str = "An unexpected error occurred during generation.";

/// Longest error body kept from an API response.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while generating or managing images.
#[derive(Debug, thiserror::Error)]
pub enum LuminaError {
    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Billing is not enabled for the selected key.
    #[error("billing required: {0}")]
    Billing(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The API answered with something other than an image.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 image data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving a download).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// The prompt is empty or whitespace only.
    #[error("prompt is empty")]
    EmptyPrompt,

    /// A generation is already running in this session.
    #[error("a generation is already in progress")]
    GenerationInProgress,

    /// No history entry matches the given id or index.
    #[error("image not found: {0}")]
    NotFound(String),
}

impl LuminaError {
    /// Returns the message to show the user for a failed generation.
    pub fn user_message(&self) -> String {
        let detail = match self {
            Self::Auth(m)
            | Self::Billing(m)
            | Self::ContentBlocked(m)
            | Self::InvalidRequest(m)
            | Self::UnexpectedResponse(m)
            | Self::Decode(m)
            | Self::Config(m)
            | Self::NotFound(m)
            | Self::Api { message: m, .. } => Some(m.as_str()),
            _ => None,
        };
        match detail {
            Some(m) if m.trim().is_empty() => FALLBACK_ERROR_MESSAGE.to_string(),
            _ => self.to_string(),
        }
    }

    /// Returns true if the request never reached the provider.
    pub fn is_rejected_submission(&self) -> bool {
        matches!(self, Self::EmptyPrompt | Self::GenerationInProgress)
    }
}

/// Result type alias for Lumina operations.
pub type Result<T> = std::result::Result<T, LuminaError>;

/// Strips API keys from an error body and truncates it.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_ERROR_MESSAGE_LEN));
    for (i, word) in text.split(' ').enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if looks_like_api_key(word) {
            out.push_str("[REDACTED]");
        } else {
            out.push_str(word);
        }
    }

    if out.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = out.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        out
    }
}

// Google API keys are 39 chars starting with "AIza".
fn looks_like_api_key(word: &str) -> bool {
    let trimmed = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-' && c != '_');
    trimmed.starts_with("AIza") && trimmed.len() >= 30
}

/// Parses a `Retry-After` header given in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
