//! Portfolio metrics aggregator.
//!
//! Pure recomputation of portfolio totals from positions and a price
//! lookup. Nothing here touches storage; the stored portfolio totals are a
//! cache of [`recompute`].

mod metrics_aggregator;
mod metrics_model;
mod price_lookup;


pub use metrics_aggregator::recompute;
pub use metrics_model::{PortfolioMetrics, PortfolioTotals, PositionMetrics};
pub use price_lookup::{NoPrices, PriceLookup};
