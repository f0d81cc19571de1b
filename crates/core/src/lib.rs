//! Folioscope Core - domain entities, services, and traits.
//!
//! This crate holds the portfolio ledger, the metrics aggregator, the
//! technical indicator processor, the rate-limited provider gateway and the
//! analysis cache/orchestrator. It is database-agnostic: persistence is
//! reached through the repository traits implemented by the
//! `storage-sqlite` crate.
//!
//! ```text
//! operation --> ledger --> metrics --> portfolio totals
//!                  |
//!                  +--> DomainEvent::PositionChanged --> analysis cache invalidation
//!
//! analysis request --> cache --(miss)--> indicators --> gateway (text) --> cache
//! ```

pub mod analysis;
pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod indicators;
pub mod ledger;
pub mod market_data;
pub mod metrics;
pub mod operations;
pub mod portfolios;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::AppConfig;
pub use errors::Error;
pub use errors::Result;
