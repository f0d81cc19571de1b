//! Deterministic generator for tests and offline runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use folioscope_core::gateway::{
    GeneratedText, TextGenerationError, TextGenerationProvider, TextGenerationRequest,
};

pub const FAKE_PROVIDER_ID: &str = "FAKE";
pub const FAKE_MODEL: &str = "fake-analyst";

/// Answers every prompt with a fixed summary of its first line. Scripted
/// failures are returned first, in order.
#[derive(Default)]
pub struct FakeTextGenerator {
    failures: Mutex<VecDeque<TextGenerationError>>,
    requests: Mutex<Vec<TextGenerationRequest>>,
    calls: AtomicUsize,
}

impl FakeTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_with(failures: Vec<TextGenerationError>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<TextGenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn answer(request: &TextGenerationRequest) -> String {
        let heading = request
            .prompt
            .lines()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("")
            .trim();
        format!(
            "{}. Indicators are mixed; no strong directional signal. \
This analysis is informational and not investment advice.",
            heading
        )
    }
}

#[async_trait]
impl TextGenerationProvider for FakeTextGenerator {
    fn id(&self) -> &str {
        FAKE_PROVIDER_ID
    }

    fn model(&self) -> &str {
        FAKE_MODEL
    }

    async fn generate(
        &self,
        request: &TextGenerationRequest,
    ) -> Result<GeneratedText, TextGenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.clone());

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(GeneratedText {
            text: Self::answer(request),
            model: FAKE_MODEL.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> TextGenerationRequest {
        TextGenerationRequest {
            system_prompt: "You are an analyst.".to_string(),
            prompt: prompt.to_string(),
            max_tokens: 100,
        }
    }

    #[tokio::test]
    async fn test_answer_is_deterministic() {
        let generator = FakeTextGenerator::new();
        let a = generator
            .generate(&request("\nTECHNICAL ANALYSIS: AAPL\n\nMARKET DATA:"))
            .await
            .unwrap();
        let b = generator
            .generate(&request("TECHNICAL ANALYSIS: AAPL\nother"))
            .await
            .unwrap();

        assert_eq!(a, b);
        assert!(a.text.starts_with("TECHNICAL ANALYSIS: AAPL."));
        assert_eq!(a.model, FAKE_MODEL);
        assert_eq!(generator.calls(), 2);
        assert_eq!(generator.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failures_come_first() {
        let generator = FakeTextGenerator::failing_with(vec![
            TextGenerationError::Transient("503".to_string()),
            TextGenerationError::RateLimited,
        ]);

        assert_eq!(
            generator.generate(&request("x")).await.unwrap_err(),
            TextGenerationError::Transient("503".to_string())
        );
        assert_eq!(
            generator.generate(&request("x")).await.unwrap_err(),
            TextGenerationError::RateLimited
        );
        assert!(generator.generate(&request("x")).await.is_ok());
    }
}
