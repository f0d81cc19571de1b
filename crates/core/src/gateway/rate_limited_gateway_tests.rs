use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use folioscope_market_data::{
    MarketDataError, MarketDataProvider, ProviderCapabilities, Quote, RateLimit, RateLimiter,
    SearchResult,
};
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::{GatewayConfig, RetryPolicy};

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
}

fn config() -> GatewayConfig {
    GatewayConfig {
        requests_per_minute: 60,
        requests_per_day: None,
        ..GatewayConfig::default()
    }
}

/// Provider answering from a scripted queue; an empty queue answers with a
/// quote. `delay` is slept before every answer.
struct ScriptedProvider {
    script: Mutex<VecDeque<MarketDataError>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedProvider {
    fn new(errors: Vec<MarketDataError>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(errors.into()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next(&self) -> Result<(), MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.script.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedProvider {
    fn id(&self) -> &'static str {
        "FAKE"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_historical: true,
            supports_search: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        self.next().await?;
        Ok(Quote::new(symbol, day(1), dec!(187.5), "USD", "FAKE"))
    }

    async fn get_historical_quotes(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Quote>, MarketDataError> {
        self.next().await?;
        Ok(vec![
            Quote::new(symbol, start, dec!(100), "USD", "FAKE"),
            Quote::new(symbol, day(2), dec!(101), "USD", "FAKE"),
        ])
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        self.next().await?;
        Ok(vec![SearchResult::new(query, "Fake Corp", "Equity", "US")])
    }
}

struct FakeText {
    calls: AtomicUsize,
    delay: Duration,
    failures: Mutex<VecDeque<TextGenerationError>>,
}

impl FakeText {
    fn new(delay: Duration, failures: Vec<TextGenerationError>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            failures: Mutex::new(failures.into()),
        })
    }
}

#[async_trait]
impl TextGenerationProvider for FakeText {
    fn id(&self) -> &str {
        "FAKE_LLM"
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    async fn generate(
        &self,
        request: &TextGenerationRequest,
    ) -> Result<GeneratedText, TextGenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(GeneratedText {
            text: format!("echo: {}", request.prompt),
            model: "fake-model".to_string(),
        })
    }
}

fn text_request() -> TextGenerationRequest {
    TextGenerationRequest {
        system_prompt: "You are an analyst.".to_string(),
        prompt: "Summarise".to_string(),
        max_tokens: 100,
    }
}

fn market_gateway(config: GatewayConfig, provider: Arc<ScriptedProvider>) -> RateLimitedGateway {
    RateLimitedGateway::new(config, Arc::new(RateLimiter::new())).with_market_data_provider(provider)
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_with_backoff() {
    let provider = ScriptedProvider::new(vec![
        MarketDataError::Network {
            provider: "FAKE".to_string(),
            message: "connection reset".to_string(),
        },
        MarketDataError::ServiceUnavailable {
            provider: "FAKE".to_string(),
            status: 503,
        },
    ]);
    let gateway = market_gateway(config(), provider.clone());

    let started = tokio::time::Instant::now();
    let quote = gateway
        .latest_quote("AAPL", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(quote.close, dec!(187.5));
    assert_eq!(provider.calls(), 3);
    // 1s after the first failure, 2s after the second.
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_retries_stop_after_max_attempts() {
    let unavailable = || MarketDataError::ServiceUnavailable {
        provider: "FAKE".to_string(),
        status: 502,
    };
    let provider = ScriptedProvider::new(vec![unavailable(), unavailable(), unavailable(), unavailable()]);
    let gateway = market_gateway(config(), provider.clone());

    let err = gateway
        .latest_quote("AAPL", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Provider { transient: true, .. }));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_is_not_retried() {
    let provider = ScriptedProvider::new(vec![MarketDataError::SymbolNotFound("ZZZZ".to_string())]);
    let gateway = market_gateway(config(), provider.clone());

    let err = gateway
        .latest_quote("ZZZZ", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::NotFound(_)));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_provider_times_out() {
    let provider = ScriptedProvider::slow(Duration::from_secs(30));
    let gateway = market_gateway(
        GatewayConfig {
            retry: RetryPolicy::no_retry(),
            ..config()
        },
        provider.clone(),
    );

    let err = gateway
        .daily_history("AAPL", day(1), day(5), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GatewayError::Timeout {
            provider: "FAKE".to_string()
        }
    );
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_local_quota_refuses_without_calling_provider() {
    let provider = ScriptedProvider::new(vec![]);
    let gateway = market_gateway(
        GatewayConfig {
            requests_per_minute: 1,
            ..config()
        },
        provider.clone(),
    );
    let cancel = CancellationToken::new();

    gateway.latest_quote("AAPL", &cancel).await.unwrap();
    let err = gateway.latest_quote("MSFT", &cancel).await.unwrap_err();

    assert_eq!(
        err,
        GatewayError::RateLimited {
            provider: "FAKE".to_string(),
            upstream: false
        }
    );
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_upstream_rate_limit_is_retried() {
    let provider = ScriptedProvider::new(vec![MarketDataError::RateLimited {
        provider: "FAKE".to_string(),
    }]);
    let gateway = market_gateway(config(), provider.clone());

    let results = gateway
        .search_symbols("apple", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_call() {
    let provider = ScriptedProvider::new(vec![]);
    let gateway = market_gateway(config(), provider.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = gateway.latest_quote("AAPL", &cancel).await.unwrap_err();

    assert_eq!(err, GatewayError::Cancelled);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_backoff() {
    let provider = ScriptedProvider::new(vec![MarketDataError::Timeout {
        provider: "FAKE".to_string(),
    }]);
    let gateway = market_gateway(config(), provider.clone());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let err = gateway.latest_quote("AAPL", &cancel).await.unwrap_err();

    assert_eq!(err, GatewayError::Cancelled);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_providers_are_reported() {
    let gateway = RateLimitedGateway::new(config(), Arc::new(RateLimiter::new()));
    let cancel = CancellationToken::new();

    assert!(!gateway.has_market_data());
    assert!(!gateway.has_text_generation());
    assert_eq!(gateway.text_model(), None);
    assert!(matches!(
        gateway.latest_quote("AAPL", &cancel).await,
        Err(GatewayError::NotConfigured(_))
    ));
    assert!(matches!(
        gateway.generate_text(&text_request(), &cancel).await,
        Err(GatewayError::NotConfigured(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_call_routes_by_request_kind() {
    let provider = ScriptedProvider::new(vec![]);
    let gateway = market_gateway(config(), provider)
        .with_text_provider(FakeText::new(Duration::from_millis(10), vec![]));
    let cancel = CancellationToken::new();

    let quote = gateway
        .call(
            GatewayRequest::LatestQuote {
                symbol: "AAPL".to_string(),
            },
            &cancel,
        )
        .await
        .unwrap();
    assert!(matches!(quote, GatewayResponse::Quote(q) if q.symbol == "AAPL"));

    let history = gateway
        .call(
            GatewayRequest::DailyHistory {
                symbol: "AAPL".to_string(),
                start: day(1),
                end: day(2),
            },
            &cancel,
        )
        .await
        .unwrap();
    assert!(matches!(history, GatewayResponse::History(h) if h.len() == 2));

    let text = gateway
        .call(GatewayRequest::TextGeneration(text_request()), &cancel)
        .await
        .unwrap();
    match text {
        GatewayResponse::Text(generated) => assert_eq!(generated.text, "echo: Summarise"),
        other => panic!("unexpected response {:?}", other),
    }
    assert_eq!(gateway.text_model().as_deref(), Some("fake-model"));
}

#[tokio::test(start_paused = true)]
async fn test_text_generation_respects_concurrency_limit() {
    let text = FakeText::new(Duration::from_secs(30), vec![]);
    let gateway = RateLimitedGateway::new(
        GatewayConfig {
            text_max_concurrency: 1,
            ..config()
        },
        Arc::new(RateLimiter::new()),
    )
    .with_text_provider(text.clone());
    let cancel = CancellationToken::new();
    let request = text_request();

    let (first, second) = tokio::join!(
        gateway.generate_text(&request, &cancel),
        gateway.generate_text(&request, &cancel)
    );

    assert!(first.is_ok());
    assert_eq!(
        second.unwrap_err(),
        GatewayError::RateLimited {
            provider: "FAKE_LLM".to_string(),
            upstream: false
        }
    );
    assert_eq!(text.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_text_generation_runs_in_parallel_up_to_limit() {
    let text = FakeText::new(Duration::from_secs(30), vec![]);
    let gateway = RateLimitedGateway::new(config(), Arc::new(RateLimiter::new()))
        .with_text_provider(text.clone());
    let cancel = CancellationToken::new();
    let request = text_request();

    let (first, second) = tokio::join!(
        gateway.generate_text(&request, &cancel),
        gateway.generate_text(&request, &cancel)
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_text_generation_transient_error_is_retried() {
    let text = FakeText::new(
        Duration::from_millis(10),
        vec![TextGenerationError::Transient("502 bad gateway".to_string())],
    );
    let gateway = RateLimitedGateway::new(config(), Arc::new(RateLimiter::new()))
        .with_text_provider(text.clone());

    let generated = gateway
        .generate_text(&text_request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(generated.model, "fake-model");
    assert_eq!(text.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_text_generation_rejection_is_final() {
    let text = FakeText::new(
        Duration::from_millis(10),
        vec![TextGenerationError::Rejected("context too long".to_string())],
    );
    let gateway = RateLimitedGateway::new(config(), Arc::new(RateLimiter::new()))
        .with_text_provider(text.clone());

    let err = gateway
        .generate_text(&text_request(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Provider { transient: false, .. }));
    assert_eq!(text.calls.load(Ordering::SeqCst), 1);
}
