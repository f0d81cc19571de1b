//! Market data provider trait definitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::MarketDataError;
use crate::models::{Quote, SearchResult};

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Trait for market data providers.
///
/// Implement this trait to add support for a new price source. Calls are
/// not rate limited here; the gateway in `folioscope-core` wraps every call
/// with the limiter, a hard timeout and the retry policy.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier, e.g. "ALPHA_VANTAGE". Used as the limiter key.
    fn id(&self) -> &'static str;

    fn capabilities(&self) -> ProviderCapabilities;

    /// Quota the provider enforces.
    fn rate_limit(&self) -> RateLimit;

    /// Fetch the most recent price for `symbol`.
    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    /// Fetch daily quotes for `symbol` between `start` and `end` inclusive,
    /// ordered by timestamp ascending.
    async fn get_historical_quotes(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Quote>, MarketDataError>;

    /// Search for symbols matching the query.
    ///
    /// Default implementation returns `NotSupported`.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        let _ = query;
        Err(MarketDataError::NotSupported {
            operation: "search".to_string(),
            provider: self.id().to_string(),
        })
    }
}
