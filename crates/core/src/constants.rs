/// Quantities below this are treated as zero (closed position).
pub const QUANTITY_THRESHOLD: &str = "0.00000001";

/// Decimal precision for display of money and percentages
pub const DISPLAY_DECIMAL_PRECISION: u32 = 2;

pub const DEFAULT_CURRENCY: &str = "USD";

/// Trading days used to annualize daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Marker every returned analysis must carry.
pub const ANALYSIS_DISCLAIMER: &str = "DISCLAIMER: This analysis is generated by an automated \
language model for informational purposes only. It is not financial, investment or tax advice \
and is not a recommendation to buy or sell any security. Investing involves risk and past \
performance does not guarantee future results. Consult a licensed financial advisor before \
making investment decisions.";
