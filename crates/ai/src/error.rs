//! Text generation error types.

use folioscope_core::gateway::TextGenerationError;
use thiserror::Error;

/// Failures of a text generation provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AiError {
    /// No API key was configured for the provider.
    #[error("Missing API key for provider {0}")]
    MissingApiKey(String),

    /// The request was malformed or refused (bad key, content policy, 4xx).
    #[error("Provider rejected the request: {0}")]
    Rejected(String),

    /// The provider answered 429.
    #[error("Provider rate limited the request: {0}")]
    RateLimited(String),

    #[error("Provider timed out: {0}")]
    Timeout(String),

    /// 5xx answers, overload and connection failures.
    #[error("Provider temporarily unavailable: {0}")]
    Unavailable(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const RATE_LIMIT_MARKERS: &[&str] = &["429", "rate limit", "rate_limit", "too many requests"];
const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout", "deadline"];
const UNAVAILABLE_MARKERS: &[&str] = &[
    "500",
    "502",
    "503",
    "504",
    "overloaded",
    "unavailable",
    "connection",
    "temporarily",
    "reset by peer",
];

impl AiError {
    /// Classifies a provider error message, as rig reports HTTP and API
    /// failures through their display text.
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

        if has(RATE_LIMIT_MARKERS) {
            AiError::RateLimited(message)
        } else if has(TIMEOUT_MARKERS) {
            AiError::Timeout(message)
        } else if has(UNAVAILABLE_MARKERS) {
            AiError::Unavailable(message)
        } else {
            AiError::Rejected(message)
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AiError::RateLimited(_) | AiError::Timeout(_) | AiError::Unavailable(_)
        )
    }

    /// Error code for logs and API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            AiError::MissingApiKey(_) => "MISSING_API_KEY",
            AiError::Rejected(_) => "PROVIDER_REJECTED",
            AiError::RateLimited(_) => "PROVIDER_RATE_LIMITED",
            AiError::Timeout(_) => "PROVIDER_TIMEOUT",
            AiError::Unavailable(_) => "PROVIDER_UNAVAILABLE",
            AiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<AiError> for TextGenerationError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::MissingApiKey(provider) => TextGenerationError::NotConfigured(provider),
            AiError::Rejected(message) | AiError::Internal(message) => {
                TextGenerationError::Rejected(message)
            }
            AiError::RateLimited(_) => TextGenerationError::RateLimited,
            AiError::Timeout(_) => TextGenerationError::Timeout,
            AiError::Unavailable(message) => TextGenerationError::Transient(message),
        }
    }
}
