//! Folioscope Market Data Crate
//!
//! Provider-agnostic access to external price data for the Folioscope
//! portfolio engine.
//!
//! # Overview
//!
//! - [`Quote`] - a single OHLCV observation returned by a provider
//! - [`MarketDataProvider`] - the trait every upstream source implements
//! - [`AlphaVantageProvider`] - latest quote, daily history and symbol search
//! - [`RateLimiter`] - per-provider token buckets with per-minute and daily quotas
//! - [`MarketDataError`] / [`RetryClass`] - errors classified for the retry loop
//!
//! ```text
//! caller --> RateLimiter (acquire_within) --> MarketDataProvider --> Quote
//! ```

pub mod errors;
pub mod limiter;
pub mod models;
pub mod provider;

pub use errors::{MarketDataError, RetryClass};
pub use limiter::{RateLimitConfig, RateLimiter};
pub use models::{ProviderId, Quote, SearchResult};
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::{MarketDataProvider, ProviderCapabilities, RateLimit};
