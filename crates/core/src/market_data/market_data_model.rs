use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use folioscope_market_data::Quote;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::decimal_utils::to_f64;
use crate::utils::time_utils::trading_date;

/// One OHLCV bar as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Decimal,
    pub volume: Option<Decimal>,
    pub source: String,
}

impl PricePoint {
    /// Reason the point must not be stored, if any.
    pub fn validate(&self) -> Option<String> {
        if self.symbol.trim().is_empty() {
            return Some("empty symbol".to_string());
        }
        if self.close <= Decimal::ZERO {
            return Some(format!("non-positive close {}", self.close));
        }
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("volume", self.volume),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                if v < Decimal::ZERO {
                    return Some(format!("negative {} {}", name, v));
                }
            }
        }
        if let (Some(high), Some(low)) = (self.high, self.low) {
            if high < low {
                return Some(format!("high {} below low {}", high, low));
            }
        }
        None
    }
}

impl From<Quote> for PricePoint {
    fn from(quote: Quote) -> Self {
        Self {
            symbol: quote.symbol.to_uppercase(),
            timestamp: quote.timestamp,
            open: quote.open,
            high: quote.high,
            low: quote.low,
            close: quote.close,
            volume: quote.volume,
            source: quote.source,
        }
    }
}

/// Price history of one symbol, oldest first, one point per timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Sorts the points and keeps the first of any duplicated timestamp.
    pub fn new(symbol: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        points.dedup_by_key(|p| p.timestamp);
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| to_f64(p.close)).collect()
    }

    /// Last close of each calendar day.
    pub fn daily_closes(&self) -> BTreeMap<NaiveDate, Decimal> {
        self.points
            .iter()
            .map(|p| (trading_date(p.timestamp), p.close))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedPoint {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Outcome of storing a batch of points for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub symbol: String,
    pub accepted: usize,
    /// Valid points whose timestamp was already stored.
    pub duplicates: usize,
    pub rejected: Vec<RejectedPoint>,
}

/// Current price of a symbol and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestPrice {
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    /// Served from storage because the provider could not be reached.
    pub is_stale: bool,
}

impl LatestPrice {
    pub fn from_point(point: &PricePoint, is_stale: bool) -> Self {
        Self {
            symbol: point.symbol.clone(),
            price: point.close,
            timestamp: point.timestamp,
            source: point.source.clone(),
            is_stale,
        }
    }
}
