use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use folioscope_market_data::{MarketDataProvider, Quote, RateLimitConfig, RateLimiter, SearchResult};
use log::{debug, warn};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::gateway_errors::GatewayError;
use super::gateway_model::{GatewayRequest, GatewayResponse};
use super::text_generation::{GeneratedText, TextGenerationProvider, TextGenerationRequest};
use crate::config::GatewayConfig;

/// Single entry point for external provider calls.
///
/// Market data calls take a token from the shared limiter (waiting at most
/// `max_wait`); text generation calls take one of `text_max_concurrency`
/// slots. Both run under a hard timeout and are retried with exponential
/// backoff while the failure is transient.
pub struct RateLimitedGateway {
    market_data: Option<Arc<dyn MarketDataProvider>>,
    text: Option<Arc<dyn TextGenerationProvider>>,
    limiter: Arc<RateLimiter>,
    text_slots: Arc<Semaphore>,
    config: GatewayConfig,
}

impl RateLimitedGateway {
    pub fn new(config: GatewayConfig, limiter: Arc<RateLimiter>) -> Self {
        Self {
            market_data: None,
            text: None,
            limiter,
            text_slots: Arc::new(Semaphore::new(config.text_max_concurrency.max(1))),
            config,
        }
    }

    /// Registers the market data provider and sizes its bucket from the
    /// configured quota.
    pub fn with_market_data_provider(mut self, provider: Arc<dyn MarketDataProvider>) -> Self {
        self.limiter.configure(
            provider.id(),
            RateLimitConfig {
                requests_per_minute: self.config.requests_per_minute,
                burst_capacity: f64::from(self.config.requests_per_minute.max(1)),
                daily_limit: self.config.requests_per_day,
            },
        );
        self.market_data = Some(provider);
        self
    }

    pub fn with_text_provider(mut self, provider: Arc<dyn TextGenerationProvider>) -> Self {
        self.text = Some(provider);
        self
    }

    pub fn has_market_data(&self) -> bool {
        self.market_data.is_some()
    }

    pub fn has_text_generation(&self) -> bool {
        self.text.is_some()
    }

    pub fn text_model(&self) -> Option<String> {
        self.text.as_ref().map(|p| p.model().to_string())
    }

    /// Routes a request to the matching provider.
    pub async fn call(
        &self,
        request: GatewayRequest,
        cancel: &CancellationToken,
    ) -> Result<GatewayResponse, GatewayError> {
        debug!("Gateway call: {}", request.kind());
        match request {
            GatewayRequest::LatestQuote { symbol } => self
                .latest_quote(&symbol, cancel)
                .await
                .map(GatewayResponse::Quote),
            GatewayRequest::DailyHistory { symbol, start, end } => self
                .daily_history(&symbol, start, end, cancel)
                .await
                .map(GatewayResponse::History),
            GatewayRequest::SymbolSearch { query } => self
                .search_symbols(&query, cancel)
                .await
                .map(GatewayResponse::Search),
            GatewayRequest::TextGeneration(req) => self
                .generate_text(&req, cancel)
                .await
                .map(GatewayResponse::Text),
        }
    }

    pub async fn latest_quote(
        &self,
        symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<Quote, GatewayError> {
        let provider = self.market_provider()?;
        self.with_retry(provider.id(), cancel, || {
            self.market_attempt(provider, provider.get_latest_quote(symbol))
        })
        .await
    }

    pub async fn daily_history(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Quote>, GatewayError> {
        let provider = self.market_provider()?;
        self.with_retry(provider.id(), cancel, || {
            self.market_attempt(provider, provider.get_historical_quotes(symbol, start, end))
        })
        .await
    }

    pub async fn search_symbols(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, GatewayError> {
        let provider = self.market_provider()?;
        self.with_retry(provider.id(), cancel, || {
            self.market_attempt(provider, provider.search(query))
        })
        .await
    }

    pub async fn generate_text(
        &self,
        request: &TextGenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GeneratedText, GatewayError> {
        let provider = self
            .text
            .as_ref()
            .ok_or_else(|| GatewayError::NotConfigured("text generation".to_string()))?;
        self.with_retry(provider.id(), cancel, || self.text_attempt(provider, request))
            .await
    }

    fn market_provider(&self) -> Result<&Arc<dyn MarketDataProvider>, GatewayError> {
        self.market_data
            .as_ref()
            .ok_or_else(|| GatewayError::NotConfigured("market data".to_string()))
    }

    async fn market_attempt<T, Fut>(
        &self,
        provider: &Arc<dyn MarketDataProvider>,
        call: Fut,
    ) -> Result<T, GatewayError>
    where
        Fut: Future<Output = Result<T, folioscope_market_data::MarketDataError>>,
    {
        let id = provider.id();
        self.limiter
            .acquire_within(id, self.config.max_wait)
            .await
            .map_err(|_| GatewayError::RateLimited {
                provider: id.to_string(),
                upstream: false,
            })?;

        match tokio::time::timeout(self.config.market_data_timeout, call).await {
            Ok(result) => result.map_err(GatewayError::from),
            Err(_) => Err(GatewayError::Timeout {
                provider: id.to_string(),
            }),
        }
    }

    async fn text_attempt(
        &self,
        provider: &Arc<dyn TextGenerationProvider>,
        request: &TextGenerationRequest,
    ) -> Result<GeneratedText, GatewayError> {
        let id = provider.id();
        let _permit = match tokio::time::timeout(
            self.config.max_wait,
            self.text_slots.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            // Closed semaphore or no slot within the wait budget.
            _ => {
                return Err(GatewayError::RateLimited {
                    provider: id.to_string(),
                    upstream: false,
                })
            }
        };

        match tokio::time::timeout(self.config.text_generation_timeout, provider.generate(request))
            .await
        {
            Ok(result) => result.map_err(|e| GatewayError::from_text(id, e)),
            Err(_) => Err(GatewayError::Timeout {
                provider: id.to_string(),
            }),
        }
    }

    /// Runs `attempt` until it succeeds, fails permanently, exhausts the
    /// retry policy or the caller cancels. Cancellation aborts both the
    /// in-flight attempt and any backoff sleep.
    async fn with_retry<T, F, Fut>(
        &self,
        provider: &str,
        cancel: &CancellationToken,
        attempt: F,
    ) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut n = 1;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(GatewayError::Cancelled),
                result = attempt() => result,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if n >= max_attempts || !err.retry_class().is_retryable() {
                return Err(err);
            }

            let delay: Duration = policy.delay_for(n);
            warn!(
                "{} call failed ({}), attempt {}/{}; retrying in {:?}",
                provider, err, n, max_attempts, delay
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            n += 1;
        }
    }
}
