//! Alpha Vantage market data provider.
//!
//! Endpoints used:
//! - GLOBAL_QUOTE for the latest price
//! - TIME_SERIES_DAILY for daily OHLCV history
//! - SYMBOL_SEARCH for ticker lookup
//!
//! Note: the free tier allows 5 calls per minute and 500 per day.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::{Quote, SearchResult};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";
const DEFAULT_CURRENCY: &str = "USD";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The compact output size covers roughly the last 100 trading days.
const COMPACT_WINDOW_DAYS: i64 = 100;

pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

// ============================================================================
// Response structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyBar>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// An unknown symbol comes back as an empty object, so every field is optional.
#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "02. open")]
    open: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SymbolSearchResponse {
    #[serde(rename = "bestMatches", default)]
    best_matches: Vec<SymbolMatch>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SymbolMatch {
    #[serde(rename = "1. symbol")]
    symbol: String,
    #[serde(rename = "2. name")]
    name: String,
    #[serde(rename = "3. type")]
    asset_type: String,
    #[serde(rename = "4. region")]
    region: String,
    #[serde(rename = "8. currency")]
    currency: Option<String>,
    #[serde(rename = "9. matchScore")]
    match_score: Option<String>,
}

// ============================================================================
// AlphaVantageProvider implementation
// ============================================================================

impl AlphaVantageProvider {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the provider at a different host (proxies, local mocks).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", &self.api_key));

        let url = reqwest::Url::parse_with_params(&self.base_url, &all_params).map_err(|e| {
            MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to build URL: {}", e),
            }
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(&self.api_key, "***")
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::Network {
                    provider: PROVIDER_ID.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if status.is_server_error() {
            return Err(MarketDataError::ServiceUnavailable {
                provider: PROVIDER_ID.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        response.text().await.map_err(|e| MarketDataError::Network {
            provider: PROVIDER_ID.to_string(),
            message: e.to_string(),
        })
    }

    /// Alpha Vantage reports most failures inside a 200 response.
    fn check_api_error(
        error_message: &Option<String>,
        note: &Option<String>,
        information: &Option<String>,
    ) -> Result<(), MarketDataError> {
        if let Some(ref msg) = error_message {
            if msg.contains("Invalid API call") || msg.contains("not found") {
                return Err(MarketDataError::SymbolNotFound(msg.clone()));
            }
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: msg.clone(),
            });
        }

        for msg in [note, information].into_iter().flatten() {
            if Self::is_quota_message(msg) {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            warn!("Alpha Vantage note: {}", msg);
        }

        Ok(())
    }

    fn is_quota_message(msg: &str) -> bool {
        let lower = msg.to_lowercase();
        lower.contains("api call frequency")
            || lower.contains("rate limit")
            || lower.contains("requests per day")
    }

    fn parse_body<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, MarketDataError> {
        serde_json::from_str(text).map_err(|e| MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to parse response: {}", e),
        })
    }

    /// Parse a date string in YYYY-MM-DD format to midnight UTC.
    fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|dt| Utc.from_local_datetime(&dt).single())
    }

    fn parse_decimal(s: &str) -> Option<Decimal> {
        Decimal::from_str(s.trim()).ok()
    }

    /// Convert a TIME_SERIES_DAILY body into ascending quotes. Bars that
    /// fail to parse are skipped.
    fn parse_time_series(text: &str, symbol: &str) -> Result<Vec<Quote>, MarketDataError> {
        let response: TimeSeriesResponse = Self::parse_body(text)?;
        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let time_series = response.time_series.ok_or_else(|| {
            MarketDataError::SymbolNotFound(format!("No data for symbol: {}", symbol))
        })?;

        let mut quotes: Vec<Quote> = time_series
            .into_iter()
            .filter_map(|(date_str, bar)| {
                let timestamp = Self::parse_date(&date_str)?;
                let close = Self::parse_decimal(&bar.close)?;
                Some(
                    Quote::new(symbol, timestamp, close, DEFAULT_CURRENCY, PROVIDER_ID).with_ohlv(
                        Self::parse_decimal(&bar.open)?,
                        Self::parse_decimal(&bar.high)?,
                        Self::parse_decimal(&bar.low)?,
                        Self::parse_decimal(&bar.volume)?,
                    ),
                )
            })
            .collect();

        quotes.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(quotes)
    }

    fn parse_global_quote(text: &str, symbol: &str) -> Result<Quote, MarketDataError> {
        let response: GlobalQuoteResponse = Self::parse_body(text)?;
        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let not_found = || MarketDataError::SymbolNotFound(symbol.to_string());
        let global = response.global_quote.ok_or_else(not_found)?;
        let close = global
            .price
            .as_deref()
            .and_then(Self::parse_decimal)
            .ok_or_else(not_found)?;
        let timestamp = global
            .latest_trading_day
            .as_deref()
            .and_then(Self::parse_date)
            .unwrap_or_else(Utc::now);
        let resolved_symbol = global.symbol.unwrap_or_else(|| symbol.to_string());

        let mut quote = Quote::new(
            resolved_symbol,
            timestamp,
            close,
            DEFAULT_CURRENCY,
            PROVIDER_ID,
        );
        quote.open = global.open.as_deref().and_then(Self::parse_decimal);
        quote.high = global.high.as_deref().and_then(Self::parse_decimal);
        quote.low = global.low.as_deref().and_then(Self::parse_decimal);
        quote.volume = global.volume.as_deref().and_then(Self::parse_decimal);
        Ok(quote)
    }

    fn parse_search(text: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        let response: SymbolSearchResponse = Self::parse_body(text)?;
        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        Ok(response
            .best_matches
            .into_iter()
            .map(|m| {
                let mut result = SearchResult::new(m.symbol, m.name, m.asset_type, m.region);
                if let Some(currency) = m.currency {
                    result = result.with_currency(currency);
                }
                if let Some(score) = m.match_score.and_then(|s| s.parse::<f64>().ok()) {
                    result = result.with_score(score);
                }
                result
            })
            .collect())
    }

    fn output_size_for(start: DateTime<Utc>) -> &'static str {
        if Utc::now() - start > ChronoDuration::days(COMPACT_WINDOW_DAYS) {
            "full"
        } else {
            "compact"
        }
    }

    fn filter_by_date_range(
        quotes: Vec<Quote>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Quote> {
        quotes
            .into_iter()
            .filter(|q| q.timestamp >= start && q.timestamp <= end)
            .collect()
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_historical: true,
            supports_search: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 5,
            requests_per_day: Some(500),
            max_concurrency: 1,
        }
    }

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let symbol = symbol.to_uppercase();
        let text = self
            .fetch(&[("function", "GLOBAL_QUOTE"), ("symbol", &symbol)])
            .await?;
        Self::parse_global_quote(&text, &symbol)
    }

    async fn get_historical_quotes(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Quote>, MarketDataError> {
        let symbol = symbol.to_uppercase();
        let text = self
            .fetch(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", &symbol),
                ("outputsize", Self::output_size_for(start)),
            ])
            .await?;

        let quotes = Self::filter_by_date_range(Self::parse_time_series(&text, &symbol)?, start, end);
        debug!(
            "Alpha Vantage: fetched {} daily quotes for {}",
            quotes.len(),
            symbol
        );

        if quotes.is_empty() {
            return Err(MarketDataError::NoDataForRange);
        }
        Ok(quotes)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        let text = self
            .fetch(&[("function", "SYMBOL_SEARCH"), ("keywords", query)])
            .await?;
        Self::parse_search(&text)
    }
}
