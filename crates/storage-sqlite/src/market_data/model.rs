//! Database model for stored price points.

use diesel::prelude::*;
use folioscope_core::market_data::PricePoint;

use crate::errors::StorageError;
use crate::utils::{format_decimal, format_timestamp, parse_decimal, parse_decimal_opt, parse_timestamp};

/// Price point row, unique per (symbol, timestamp).
#[derive(
    Queryable,
    QueryableByName,
    Identifiable,
    Selectable,
    Insertable,
    PartialEq,
    Debug,
    Clone,
)]
#[diesel(table_name = crate::schema::price_points)]
#[diesel(primary_key(symbol, timestamp))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PricePointDB {
    pub symbol: String,
    pub timestamp: String,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: String,
    pub volume: Option<String>,
    pub source: String,
}

impl TryFrom<PricePointDB> for PricePoint {
    type Error = StorageError;

    fn try_from(db: PricePointDB) -> Result<Self, Self::Error> {
        Ok(PricePoint {
            timestamp: parse_timestamp(&db.timestamp)?,
            open: parse_decimal_opt(db.open.as_deref())?,
            high: parse_decimal_opt(db.high.as_deref())?,
            low: parse_decimal_opt(db.low.as_deref())?,
            close: parse_decimal(&db.close)?,
            volume: parse_decimal_opt(db.volume.as_deref())?,
            symbol: db.symbol,
            source: db.source,
        })
    }
}

impl From<&PricePoint> for PricePointDB {
    fn from(point: &PricePoint) -> Self {
        Self {
            symbol: point.symbol.clone(),
            timestamp: format_timestamp(&point.timestamp),
            open: point.open.as_ref().map(format_decimal),
            high: point.high.as_ref().map(format_decimal),
            low: point.low.as_ref().map(format_decimal),
            close: format_decimal(&point.close),
            volume: point.volume.as_ref().map(format_decimal),
            source: point.source.clone(),
        }
    }
}
