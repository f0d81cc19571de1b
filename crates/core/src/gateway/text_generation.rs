use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextGenerationRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub max_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedText {
    pub text: String,
    pub model: String,
}

/// Provider-side failure, classified for the retry loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextGenerationError {
    /// Timeouts, 5xx answers and connection failures.
    #[error("Transient text generation failure: {0}")]
    Transient(String),

    /// Malformed requests, refused content, invalid credentials.
    #[error("Text generation request rejected: {0}")]
    Rejected(String),

    #[error("Text generation timed out")]
    Timeout,

    #[error("Text generation rate limited")]
    RateLimited,

    #[error("Text generation not configured: {0}")]
    NotConfigured(String),
}

/// A language model the analysis orchestrator can prompt.
#[async_trait]
pub trait TextGenerationProvider: Send + Sync {
    fn id(&self) -> &str;

    fn model(&self) -> &str;

    async fn generate(
        &self,
        request: &TextGenerationRequest,
    ) -> Result<GeneratedText, TextGenerationError>;
}
