use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use folioscope_market_data::SearchResult;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::market_data_model::{IngestReport, LatestPrice, PricePoint, PriceSeries, RejectedPoint};
use super::market_data_traits::{MarketDataServiceTrait, QuoteRepositoryTrait};
use crate::config::MarketDataConfig;
use crate::errors::{Result, ValidationError};
use crate::events::{DomainEvent, DomainEventSink};
use crate::gateway::{GatewayError, RateLimitedGateway};
use crate::utils::clock::Clock;
use crate::utils::time_utils::history_start;

pub struct MarketDataService {
    repository: Arc<dyn QuoteRepositoryTrait>,
    gateway: Arc<RateLimitedGateway>,
    config: MarketDataConfig,
    clock: Arc<dyn Clock>,
    event_sink: Arc<dyn DomainEventSink>,
}

impl MarketDataService {
    pub fn new(
        repository: Arc<dyn QuoteRepositoryTrait>,
        gateway: Arc<RateLimitedGateway>,
        config: MarketDataConfig,
        clock: Arc<dyn Clock>,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            repository,
            gateway,
            config,
            clock,
            event_sink,
        }
    }

    fn normalize_symbol(symbol: &str) -> Result<String> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ValidationError::MissingField("symbol".to_string()).into());
        }
        Ok(symbol)
    }

    /// Splits `points` into valid and rejected, stores the valid ones and
    /// reports how many were new.
    async fn store(&self, symbol: &str, points: Vec<PricePoint>) -> Result<IngestReport> {
        let mut report = IngestReport {
            symbol: symbol.to_string(),
            ..IngestReport::default()
        };
        let mut seen = HashSet::new();
        let mut valid = Vec::with_capacity(points.len());

        for mut point in points {
            point.symbol = point.symbol.trim().to_uppercase();
            if point.symbol != symbol {
                report.rejected.push(RejectedPoint {
                    timestamp: point.timestamp,
                    reason: format!("symbol {} does not match {}", point.symbol, symbol),
                });
                continue;
            }
            if let Some(reason) = point.validate() {
                report.rejected.push(RejectedPoint {
                    timestamp: point.timestamp,
                    reason,
                });
                continue;
            }
            if !seen.insert(point.timestamp) {
                report.duplicates += 1;
                continue;
            }
            valid.push(point);
        }

        if !report.rejected.is_empty() {
            warn!(
                "Rejected {} malformed price points for {}",
                report.rejected.len(),
                symbol
            );
        }

        let candidates = valid.len();
        let inserted = if valid.is_empty() {
            0
        } else {
            self.repository.insert_points(valid).await?
        };
        report.accepted = inserted;
        report.duplicates += candidates.saturating_sub(inserted);

        if inserted > 0 {
            self.event_sink
                .emit(DomainEvent::prices_updated(vec![symbol.to_string()]));
        }
        debug!(
            "Stored {} new points for {} ({} duplicates)",
            report.accepted, symbol, report.duplicates
        );
        Ok(report)
    }
}

#[async_trait]
impl MarketDataServiceTrait for MarketDataService {
    async fn get_latest_price(
        &self,
        symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<LatestPrice> {
        let symbol = Self::normalize_symbol(symbol)?;
        match self.gateway.latest_quote(&symbol, cancel).await {
            Ok(quote) => {
                let point = PricePoint::from(quote);
                let latest = LatestPrice::from_point(&point, false);
                if let Err(e) = self.store(&symbol, vec![point]).await {
                    warn!("Could not store latest price for {}: {}", symbol, e);
                }
                Ok(latest)
            }
            Err(GatewayError::Cancelled) => Err(GatewayError::Cancelled.into()),
            Err(err) => match self.repository.latest_point(&symbol)? {
                Some(point) => {
                    warn!(
                        "Serving stored price for {} from {}: {}",
                        symbol, point.timestamp, err
                    );
                    Ok(LatestPrice::from_point(&point, true))
                }
                None => Err(err.into()),
            },
        }
    }

    async fn sync_price_history(
        &self,
        symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let symbol = Self::normalize_symbol(symbol)?;
        let now = self.clock.now();
        let window_start = history_start(now, self.config.history_days);
        let start = match self.repository.latest_point(&symbol)? {
            Some(last) if last.timestamp > window_start => last.timestamp + Duration::days(1),
            _ => window_start,
        };
        if start > now {
            debug!("Price history for {} is already current", symbol);
            return Ok(IngestReport {
                symbol,
                ..IngestReport::default()
            });
        }

        let quotes = self
            .gateway
            .daily_history(&symbol, start, now, cancel)
            .await?;
        let points = quotes.into_iter().map(PricePoint::from).collect();
        let report = self.store(&symbol, points).await?;
        info!(
            "Synced {}: {} new points since {}",
            symbol,
            report.accepted,
            start.date_naive()
        );
        Ok(report)
    }

    async fn search_symbols(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.gateway.search_symbols(query, cancel).await?)
    }

    fn get_price_series(&self, symbol: &str, days: i64) -> Result<PriceSeries> {
        let symbol = Self::normalize_symbol(symbol)?;
        let from = self.clock.now() - Duration::days(days.max(0));
        self.repository.get_series(&symbol, Some(from))
    }

    async fn ingest_points(&self, symbol: &str, points: Vec<PricePoint>) -> Result<IngestReport> {
        let symbol = Self::normalize_symbol(symbol)?;
        self.store(&symbol, points).await
    }

    async fn prune_history(&self) -> Result<usize> {
        let cutoff = history_start(self.clock.now(), self.config.retention_days);
        let removed = self.repository.prune_older_than(cutoff).await?;
        if removed > 0 {
            info!("Pruned {} price points older than {}", removed, cutoff.date_naive());
        }
        Ok(removed)
    }

    async fn ensure_history(
        &self,
        symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<PriceSeries> {
        let symbol = Self::normalize_symbol(symbol)?;
        let min_points = self.config.min_points;
        let days = i64::from(self.config.history_days);
        let series = self.get_price_series(&symbol, days)?;
        if series.len() >= min_points {
            return Ok(series);
        }

        debug!(
            "{} has {} stored points, {} needed; syncing",
            symbol,
            series.len(),
            min_points
        );
        match self.sync_price_history(&symbol, cancel).await {
            Ok(_) => self.get_price_series(&symbol, days),
            Err(e) if series.is_empty() || cancel.is_cancelled() => Err(e),
            Err(e) => {
                warn!("History sync for {} failed, using stored points: {}", symbol, e);
                Ok(series)
            }
        }
    }

    async fn refresh_prices(
        &self,
        symbols: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<LatestPrice>> {
        let mut prices = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled.into());
            }
            match self.get_latest_price(symbol, cancel).await {
                Ok(price) => prices.push(price),
                Err(e) => warn!("Price refresh for {} failed: {}", symbol, e),
            }
        }
        Ok(prices)
    }
}
