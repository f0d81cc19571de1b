//! Symbol search results.

use serde::{Deserialize, Serialize};

/// One match from a provider's symbol search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Ticker (e.g., "AAPL", "SHOP.TRT")
    pub symbol: String,

    /// Display name (e.g., "Apple Inc")
    pub name: String,

    /// Provider's instrument type (e.g., "Equity", "ETF")
    pub asset_type: String,

    /// Listing region (e.g., "United States")
    pub region: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Relevance in [0, 1], higher is better
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl SearchResult {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        asset_type: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            asset_type: asset_type.into(),
            region: region.into(),
            currency: None,
            score: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}
