//! Utility functions for SQLite storage operations.
//!
//! Column conversions for the TEXT-encoded timestamps and decimals, and
//! chunking to stay under SQLite's parameter limit.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;

use crate::errors::StorageError;

/// Maximum number of parameters for SQLite IN (...) queries.
///
/// SQLite has a compile-time limit on the number of parameters in a SQL statement,
/// typically around 999 (SQLITE_MAX_VARIABLE_NUMBER). To stay safely under this limit
/// and leave room for other parameters in the query, we use 500 as our chunk size.
///
/// Any query that uses `IN (...)` with a potentially large list of IDs should use
/// `chunk_for_sqlite` to split the list into manageable chunks.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Chunk a slice into smaller slices for batch SQLite queries.
///
/// This function splits a slice into chunks of size `SQLITE_MAX_PARAMS_CHUNK` (500),
/// which can be used to safely execute multiple queries with `IN (...)` clauses
/// without exceeding SQLite's parameter limits.
///
/// # Example
///
/// ```ignore
/// let symbols: Vec<String> = open_symbols(); // Could be > 999 items
///
/// let mut all_points = Vec::new();
/// for chunk in chunk_for_sqlite(&symbols) {
///     let points = query_with_in_clause(chunk)?;
///     all_points.extend(points);
/// }
/// ```
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}


/// Fixed-width RFC 3339 in UTC, so stored timestamps compare as strings.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::SerializationError(format!("timestamp '{}': {}", value, e)))
}

pub fn parse_timestamp_opt(value: Option<&str>) -> Result<Option<DateTime<Utc>>, StorageError> {
    value.map(parse_timestamp).transpose()
}

/// Keeps the scale, so `152.00` reads back as `152.00`.
pub fn format_decimal(value: &Decimal) -> String {
    value.to_string()
}

pub fn parse_decimal(value: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(value)
        .map_err(|e| StorageError::SerializationError(format!("decimal '{}': {}", value, e)))
}

pub fn parse_decimal_opt(value: Option<&str>) -> Result<Option<Decimal>, StorageError> {
    value.map(parse_decimal).transpose()
}

/// Parses an enum column through its `FromStr` implementation.
pub fn parse_enum<T>(column: &str, value: &str) -> Result<T, StorageError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| StorageError::SerializationError(format!("{} '{}': {}", column, value, e)))
}
