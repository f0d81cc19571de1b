use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folioscope_market_data::SearchResult;
use tokio_util::sync::CancellationToken;

use super::market_data_model::{IngestReport, LatestPrice, PricePoint, PriceSeries};
use crate::errors::Result;

/// Append-only store of price points, unique per (symbol, timestamp).
#[async_trait]
pub trait QuoteRepositoryTrait: Send + Sync {
    /// Points for `symbol` at or after `from`, oldest first.
    fn get_series(&self, symbol: &str, from: Option<DateTime<Utc>>) -> Result<PriceSeries>;

    fn latest_point(&self, symbol: &str) -> Result<Option<PricePoint>>;

    fn latest_points(&self, symbols: &[String]) -> Result<HashMap<String, PricePoint>>;

    /// Inserts points, ignoring any whose (symbol, timestamp) already exists.
    /// Returns the number of rows actually written.
    async fn insert_points(&self, points: Vec<PricePoint>) -> Result<usize>;

    /// Deletes points older than `cutoff`. Returns the number removed.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

#[async_trait]
pub trait MarketDataServiceTrait: Send + Sync {
    /// Current price from the provider, or the last stored close marked
    /// stale when the provider cannot answer.
    async fn get_latest_price(
        &self,
        symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<LatestPrice>;

    /// Fetches daily history since the last stored point (or the configured
    /// window) and stores it.
    async fn sync_price_history(
        &self,
        symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<IngestReport>;

    async fn search_symbols(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>>;

    /// Stored series covering the last `days` days.
    fn get_price_series(&self, symbol: &str, days: i64) -> Result<PriceSeries>;

    /// Validates and stores externally supplied points.
    async fn ingest_points(&self, symbol: &str, points: Vec<PricePoint>) -> Result<IngestReport>;

    /// Drops points older than the retention window.
    async fn prune_history(&self) -> Result<usize>;

    /// Stored series for the history window, synced through the gateway
    /// first when fewer than the configured minimum of points are stored.
    async fn ensure_history(&self, symbol: &str, cancel: &CancellationToken)
        -> Result<PriceSeries>;

    /// Refreshes the latest price of every symbol; failures are logged and
    /// skipped. Returns the prices obtained.
    async fn refresh_prices(
        &self,
        symbols: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<LatestPrice>>;
}
