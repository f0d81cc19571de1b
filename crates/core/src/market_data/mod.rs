//! Stored price history and the market data service.
//!
//! Quotes arrive from providers through the rate-limited gateway, are
//! validated at ingestion, and are stored append-only per (symbol,
//! timestamp). The indicator processor and the metrics aggregator read from
//! here.

mod market_data_model;
mod market_data_service;
mod market_data_traits;
mod price_lookup;


pub use market_data_model::{IngestReport, LatestPrice, PricePoint, PriceSeries, RejectedPoint};
pub use market_data_service::MarketDataService;
pub use market_data_traits::{MarketDataServiceTrait, QuoteRepositoryTrait};
pub use price_lookup::RepositoryPriceLookup;
