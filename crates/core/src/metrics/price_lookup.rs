use std::collections::HashMap;

use rust_decimal::Decimal;

/// Current market price source used when valuing positions.
pub trait PriceLookup: Send + Sync {
    fn latest_price(&self, symbol: &str) -> Option<Decimal>;
}

impl PriceLookup for HashMap<String, Decimal> {
    fn latest_price(&self, symbol: &str) -> Option<Decimal> {
        self.get(symbol).copied()
    }
}

/// Lookup with no prices; every position falls back to its stored price.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrices;

impl PriceLookup for NoPrices {
    fn latest_price(&self, _symbol: &str) -> Option<Decimal> {
        None
    }
}
