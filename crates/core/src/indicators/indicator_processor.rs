use log::debug;

use crate::market_data::PriceSeries;

use super::indicators_errors::IndicatorError;
use super::indicators_model::{IndicatorSnapshot, Trend};
use super::moving_average::{ema, sma};
use super::oscillators::{macd, rsi};
use super::volatility::{bollinger, volatility};

const RSI_PERIOD: usize = 14;
const BOLLINGER_PERIOD: usize = 20;
const BOLLINGER_STD: f64 = 2.0;
const PRICE_CHANGE_POINTS: usize = 30;

/// Smallest series the processor accepts (RSI(14) needs 15 closes).
pub const MIN_POINTS: usize = RSI_PERIOD + 1;

/// Computes the indicator snapshot for a stored price series.
pub fn process(series: &PriceSeries) -> Result<IndicatorSnapshot, IndicatorError> {
    process_closes(&series.closes())
}

/// Computes the indicator snapshot from closing prices, oldest first.
pub fn process_closes(closes: &[f64]) -> Result<IndicatorSnapshot, IndicatorError> {
    let have = closes.len();
    if have < MIN_POINTS {
        return Err(IndicatorError::insufficient("rsi", MIN_POINTS, have));
    }

    let sma20 = sma(closes, 20);
    let sma50 = sma(closes, 50);
    let sma200 = sma(closes, 200);
    let current_price = closes[have - 1];

    let price_change_30d = if have >= PRICE_CHANGE_POINTS {
        let base = closes[have - PRICE_CHANGE_POINTS];
        (base > 0.0).then(|| (current_price / base - 1.0) * 100.0)
    } else {
        None
    };

    let snapshot = IndicatorSnapshot {
        rsi: rsi(closes, RSI_PERIOD),
        sma20,
        sma50,
        sma200,
        ema20: ema(closes, 20),
        macd: macd(closes),
        volatility: volatility(closes).unwrap_or(0.0),
        bollinger: bollinger(closes, BOLLINGER_PERIOD, BOLLINGER_STD),
        trend: Trend::classify(sma20, sma50, sma200),
        current_price,
        price_change_30d,
        points_used: have,
    };

    debug!(
        "Computed indicators over {} points (trend {}, macd {})",
        have,
        snapshot.trend,
        if snapshot.macd.is_some() { "present" } else { "absent" }
    );

    Ok(snapshot)
}
