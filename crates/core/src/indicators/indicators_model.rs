use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValues {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerValues {
    pub upper: f64,
    pub mid: f64,
    pub lower: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    /// Bullish iff SMA20 > SMA50 > SMA200, bearish iff the strict reverse.
    /// Ties and missing averages are neutral.
    pub fn classify(sma20: Option<f64>, sma50: Option<f64>, sma200: Option<f64>) -> Self {
        match (sma20, sma50, sma200) {
            (Some(short), Some(mid), Some(long)) if short > mid && mid > long => Trend::Bullish,
            (Some(short), Some(mid), Some(long)) if short < mid && mid < long => Trend::Bearish,
            _ => Trend::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Bullish => "bullish",
            Trend::Bearish => "bearish",
            Trend::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Indicators computed over one price series.
///
/// Absent values mean the series was too short for that window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub ema20: Option<f64>,
    pub macd: Option<MacdValues>,
    /// Annualized, as a fraction (0.25 = 25%).
    pub volatility: f64,
    pub bollinger: Option<BollingerValues>,
    pub trend: Trend,
    pub current_price: f64,
    /// Percent change across the last 30 points.
    pub price_change_30d: Option<f64>,
    pub points_used: usize,
}
