//! OpenAI text generation through rig-core.

use async_trait::async_trait;
use folioscope_core::config::ProviderKeys;
use folioscope_core::gateway::{
    GeneratedText, TextGenerationError, TextGenerationProvider, TextGenerationRequest,
};
use log::{debug, warn};
use reqwest::Client as HttpClient;
use rig::{client::CompletionClient, completion::Prompt, providers::openai};

use crate::error::AiError;

pub const OPENAI_PROVIDER_ID: &str = "OPENAI";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-5";

/// [`TextGenerationProvider`] backed by the OpenAI API.
pub struct OpenAiTextGenerator {
    client: openai::Client<HttpClient>,
    model: String,
}

impl OpenAiTextGenerator {
    pub fn new(api_key: &str, model: impl Into<String>) -> Result<Self, AiError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AiError::MissingApiKey(OPENAI_PROVIDER_ID.to_string()));
        }
        let client: openai::Client<HttpClient> =
            openai::Client::new(api_key).map_err(|e| AiError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            model: model.into(),
        })
    }

    /// Points the client at an OpenAI-compatible endpoint.
    pub fn with_base_url(
        api_key: &str,
        model: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, AiError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AiError::MissingApiKey(OPENAI_PROVIDER_ID.to_string()));
        }
        let client = openai::Client::<HttpClient>::builder()
            .api_key(api_key)
            .base_url(base_url)
            .build()
            .map_err(|e| AiError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            model: model.into(),
        })
    }

    /// Builds a generator from configured keys. `Ok(None)` when no key is
    /// set, which leaves analyses unavailable rather than failing startup.
    pub fn from_keys(keys: &ProviderKeys) -> Result<Option<Self>, AiError> {
        let Some(api_key) = keys.openai_api_key.as_deref() else {
            warn!("No OpenAI API key configured; analyses are disabled");
            return Ok(None);
        };
        let model = keys
            .openai_model
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        Self::new(api_key, model).map(Some)
    }

    async fn complete(&self, request: &TextGenerationRequest) -> Result<String, AiError> {
        debug!(
            "Prompting {} ({} prompt chars, max {} tokens)",
            self.model,
            request.prompt.len(),
            request.max_tokens
        );
        let agent = self
            .client
            .agent(&self.model)
            .preamble(&request.system_prompt)
            .max_tokens(request.max_tokens)
            .build();
        agent
            .prompt(&request.prompt)
            .await
            .map_err(|e| AiError::from_provider_message(e.to_string()))
    }
}

#[async_trait]
impl TextGenerationProvider for OpenAiTextGenerator {
    fn id(&self) -> &str {
        OPENAI_PROVIDER_ID
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        request: &TextGenerationRequest,
    ) -> Result<GeneratedText, TextGenerationError> {
        match self.complete(request).await {
            Ok(text) => Ok(GeneratedText {
                text,
                model: self.model.clone(),
            }),
            Err(err) => {
                warn!("{} generation failed [{}]: {}", self.model, err.code(), err);
                Err(err.into())
            }
        }
    }
}
