use std::sync::Arc;

use log::warn;
use rust_decimal::Decimal;

use super::market_data_traits::QuoteRepositoryTrait;
use crate::metrics::PriceLookup;

/// Prices from the last stored close of each symbol.
pub struct RepositoryPriceLookup {
    repository: Arc<dyn QuoteRepositoryTrait>,
}

impl RepositoryPriceLookup {
    pub fn new(repository: Arc<dyn QuoteRepositoryTrait>) -> Self {
        Self { repository }
    }
}

impl PriceLookup for RepositoryPriceLookup {
    fn latest_price(&self, symbol: &str) -> Option<Decimal> {
        match self.repository.latest_point(symbol) {
            Ok(point) => point.map(|p| p.close),
            Err(e) => {
                warn!("Could not read stored price for {}: {}", symbol, e);
                None
            }
        }
    }
}
