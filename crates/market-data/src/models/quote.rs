use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One price observation for a symbol.
///
/// Daily history carries the full OHLCV set; a latest-price lookup may only
/// know the close.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Upper-case ticker the quote belongs to
    pub symbol: String,

    /// Trading day (midnight UTC) or quote instant
    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,

    /// Closing/current price (required)
    pub close: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,

    /// Quote currency
    pub currency: String,

    /// Source of the quote (ALPHA_VANTAGE, MANUAL, ...)
    pub source: String,
}

impl Quote {
    /// Create a close-only quote.
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        close: Decimal,
        currency: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
            currency: currency.into(),
            source: source.into(),
        }
    }

    /// Attach open/high/low/volume to a close-only quote.
    pub fn with_ohlv(mut self, open: Decimal, high: Decimal, low: Decimal, volume: Decimal) -> Self {
        self.open = Some(open);
        self.high = Some(high);
        self.low = Some(low);
        self.volume = Some(volume);
        self
    }

    /// Whether open/high/low are all present.
    pub fn has_range(&self) -> bool {
        self.open.is_some() && self.high.is_some() && self.low.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_close_only() {
        let quote = Quote::new("AAPL", Utc::now(), dec!(150.25), "USD", "ALPHA_VANTAGE");
        assert_eq!(quote.close, dec!(150.25));
        assert_eq!(quote.symbol, "AAPL");
        assert!(quote.open.is_none());
        assert!(!quote.has_range());
    }

    #[test]
    fn test_quote_with_ohlv() {
        let quote = Quote::new("AAPL", Utc::now(), dec!(150.25), "USD", "ALPHA_VANTAGE")
            .with_ohlv(dec!(148.00), dec!(152.00), dec!(147.50), dec!(1000000));
        assert_eq!(quote.open, Some(dec!(148.00)));
        assert_eq!(quote.high, Some(dec!(152.00)));
        assert_eq!(quote.low, Some(dec!(147.50)));
        assert_eq!(quote.volume, Some(dec!(1000000)));
        assert!(quote.has_range());
    }
}
