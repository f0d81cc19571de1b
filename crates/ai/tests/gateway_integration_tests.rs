//! The fake generator behind the real rate-limited gateway.

use std::sync::Arc;
use std::time::Duration;

use folioscope_ai::{AiError, FakeTextGenerator, FAKE_MODEL};
use folioscope_core::config::{GatewayConfig, RetryPolicy};
use folioscope_core::gateway::{
    GatewayError, RateLimitedGateway, TextGenerationError, TextGenerationRequest,
};
use folioscope_market_data::RateLimiter;
use tokio_util::sync::CancellationToken;

fn request() -> TextGenerationRequest {
    TextGenerationRequest {
        system_prompt: "You are an analyst.".to_string(),
        prompt: "PORTFOLIO ANALYSIS: Growth\n\nSUMMARY:".to_string(),
        max_tokens: 500,
    }
}

fn gateway(generator: Arc<FakeTextGenerator>) -> RateLimitedGateway {
    let config = GatewayConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            factor: 2,
        },
        ..GatewayConfig::default()
    };
    RateLimitedGateway::new(config, Arc::new(RateLimiter::new())).with_text_provider(generator)
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_provider_is_retried() {
    let generator = Arc::new(FakeTextGenerator::failing_with(vec![
        AiError::from_provider_message("503 Service Unavailable").into(),
    ]));
    let gateway = gateway(generator.clone());

    let generated = gateway
        .generate_text(&request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(generator.calls(), 2);
    assert_eq!(generated.model, FAKE_MODEL);
    assert!(generated.text.starts_with("PORTFOLIO ANALYSIS: Growth."));
}

#[tokio::test(start_paused = true)]
async fn test_missing_key_is_not_configured() {
    let generator = Arc::new(FakeTextGenerator::failing_with(vec![
        TextGenerationError::from(AiError::MissingApiKey("OPENAI".to_string())),
    ]));
    let gateway = gateway(generator.clone());

    let err = gateway
        .generate_text(&request(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::NotConfigured(_)));
    assert_eq!(generator.calls(), 1);
}
