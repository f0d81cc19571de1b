//! Provider capabilities and published quotas.

use crate::limiter::RateLimitConfig;

/// What a provider can answer.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Daily OHLCV history.
    pub supports_historical: bool,

    /// Symbol/company search.
    pub supports_search: bool,
}

/// Quota a provider enforces on its side.
///
/// The gateway mirrors it in the local [`RateLimiter`](crate::RateLimiter) so
/// calls are refused locally before the provider starts answering with 429s.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimit {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,

    /// Maximum requests allowed per rolling day, if the provider caps it.
    pub requests_per_day: Option<u32>,

    /// Maximum concurrent requests to this provider.
    pub max_concurrency: usize,
}

impl RateLimit {
    /// Limiter configuration matching this quota. Burst equals the
    /// per-minute allowance.
    pub fn to_limiter_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: self.requests_per_minute,
            burst_capacity: f64::from(self.requests_per_minute.max(1)),
            daily_limit: self.requests_per_day,
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_day: None,
            max_concurrency: 5,
        }
    }
}
