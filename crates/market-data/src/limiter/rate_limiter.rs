//! Token bucket rate limiter for market data providers.
//!
//! Each provider gets its own bucket refilled continuously at the per-minute
//! rate. A provider may also carry a daily cap, tracked as a rolling 24h
//! window that opens on the first call.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::errors::MarketDataError;

const DEFAULT_REQUESTS_PER_MINUTE: f64 = 60.0;

const DEFAULT_BUCKET_CAPACITY: f64 = 10.0;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
struct DailyWindow {
    limit: u32,
    used: u32,
    started: Instant,
}

impl DailyWindow {
    fn new(limit: u32) -> Self {
        Self {
            limit,
            used: 0,
            started: Instant::now(),
        }
    }

    fn roll(&mut self) {
        if self.started.elapsed() >= DAY {
            self.used = 0;
            self.started = Instant::now();
        }
    }

    fn exhausted(&self) -> bool {
        self.used >= self.limit
    }

    fn time_until_reset(&self) -> Duration {
        DAY.saturating_sub(self.started.elapsed())
    }
}

#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens.
    tokens: f64,
    last_update: Instant,
    /// Tokens per second.
    rate: f64,
    capacity: f64,
    daily: Option<DailyWindow>,
}

impl TokenBucket {
    fn new() -> Self {
        Self::with_config(&RateLimitConfig::default())
    }

    fn with_config(config: &RateLimitConfig) -> Self {
        Self {
            tokens: config.burst_capacity,
            last_update: Instant::now(),
            rate: f64::from(config.requests_per_minute) / 60.0,
            capacity: config.burst_capacity,
            daily: config.daily_limit.map(DailyWindow::new),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;

        if let Some(daily) = self.daily.as_mut() {
            daily.roll();
        }
    }

    fn daily_exhausted(&self) -> bool {
        self.daily.as_ref().is_some_and(DailyWindow::exhausted)
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.daily_exhausted() || self.tokens < 1.0 {
            return false;
        }

        self.tokens -= 1.0;
        if let Some(daily) = self.daily.as_mut() {
            daily.used += 1;
        }
        true
    }

    /// Wait until the next call would be admitted. When the daily cap is
    /// spent this is the time left in the current window.
    fn time_until_available(&mut self) -> Duration {
        self.refill();

        if let Some(daily) = self.daily.as_ref().filter(|d| d.exhausted()) {
            return daily.time_until_reset();
        }

        if self.tokens >= 1.0 {
            Duration::ZERO
        } else if self.rate <= 0.0 {
            DAY
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Rate limiter configuration for a provider.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    /// Maximum burst, i.e. bucket size.
    pub burst_capacity: f64,
    /// Calls allowed per rolling 24h window, `None` for no daily cap.
    pub daily_limit: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE as u32,
            burst_capacity: DEFAULT_BUCKET_CAPACITY,
            daily_limit: None,
        }
    }
}

/// Process-wide limiter holding one token bucket per provider.
///
/// Buckets are created lazily from the provider's configuration (or the
/// defaults). Every acquisition happens under a single mutex, so concurrent
/// callers never double-spend a token.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    configs: Mutex<HashMap<String, RateLimitConfig>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            configs: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the buckets mutex, recovering from poison if necessary.
    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter buckets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_configs(&self) -> MutexGuard<'_, HashMap<String, RateLimitConfig>> {
        self.configs.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter configs mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Configure limits for a provider. An existing bucket is discarded.
    pub fn configure(&self, provider: &str, config: RateLimitConfig) {
        let mut configs = self.lock_configs();
        configs.insert(provider.to_string(), config);
        drop(configs);

        let mut buckets = self.lock_buckets();
        buckets.remove(provider);
    }

    /// Whether a configuration was registered for `provider`.
    pub fn is_configured(&self, provider: &str) -> bool {
        self.lock_configs().contains_key(provider)
    }

    /// Take a token now, or report how long until one is available.
    fn poll(&self, provider: &str) -> Option<Duration> {
        let mut buckets = self.lock_buckets();
        let bucket = buckets
            .entry(provider.to_string())
            .or_insert_with(|| self.create_bucket(provider));

        if bucket.try_acquire() {
            debug!("Rate limiter: acquired token for '{}'", provider);
            None
        } else {
            Some(bucket.time_until_available())
        }
    }

    /// Wait (asynchronously) as long as it takes to obtain a token.
    pub async fn acquire(&self, provider: &str) {
        while let Some(wait_time) = self.poll(provider) {
            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                wait_time, provider
            );
            tokio::time::sleep(wait_time).await;
        }
    }

    /// Wait for a token for at most `max_wait`.
    ///
    /// Fails with [`MarketDataError::RateLimited`] as soon as it is known
    /// that no token will be available before the deadline, without
    /// sleeping through the remainder.
    pub async fn acquire_within(
        &self,
        provider: &str,
        max_wait: Duration,
    ) -> Result<(), MarketDataError> {
        let deadline = Instant::now() + max_wait;

        while let Some(wait_time) = self.poll(provider) {
            if Instant::now() + wait_time > deadline {
                debug!(
                    "Rate limiter: '{}' needs {:?}, over the {:?} budget",
                    provider, wait_time, max_wait
                );
                return Err(MarketDataError::RateLimited {
                    provider: provider.to_string(),
                });
            }
            tokio::time::sleep(wait_time).await;
        }
        Ok(())
    }

    /// Try to acquire a token without waiting.
    pub fn try_acquire(&self, provider: &str) -> bool {
        self.poll(provider).is_none()
    }

    /// Tokens currently available in the per-minute bucket.
    pub fn remaining_tokens(&self, provider: &str) -> f64 {
        let mut buckets = self.lock_buckets();

        match buckets.get_mut(provider) {
            Some(bucket) => {
                bucket.refill();
                bucket.tokens
            }
            None => self
                .lock_configs()
                .get(provider)
                .map(|c| c.burst_capacity)
                .unwrap_or(DEFAULT_BUCKET_CAPACITY),
        }
    }

    /// Calls left in the current daily window, `None` when uncapped.
    pub fn remaining_daily(&self, provider: &str) -> Option<u32> {
        let mut buckets = self.lock_buckets();

        match buckets.get_mut(provider) {
            Some(bucket) => {
                bucket.refill();
                bucket
                    .daily
                    .as_ref()
                    .map(|d| d.limit.saturating_sub(d.used))
            }
            None => self.lock_configs().get(provider).and_then(|c| c.daily_limit),
        }
    }

    pub fn reset(&self, provider: &str) {
        let mut buckets = self.lock_buckets();
        buckets.remove(provider);
    }

    fn create_bucket(&self, provider: &str) -> TokenBucket {
        let configs = self.lock_configs();

        match configs.get(provider) {
            Some(config) => TokenBucket::with_config(config),
            None => TokenBucket::new(),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
