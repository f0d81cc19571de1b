//! Momentum oscillators: RSI and MACD.

use super::indicators_model::MacdValues;
use super::moving_average::ema_series;

const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

/// Points needed before the MACD block (line, signal, histogram) is reported.
pub const MACD_MIN_POINTS: usize = MACD_SLOW + MACD_SIGNAL;

/// RSI from smoothed average gain and loss.
/// No losses gives 100, no gains gives 0, a flat series gives 50.
#[inline]
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss <= 0.0 {
        if avg_gain <= 0.0 {
            50.0
        } else {
            100.0
        }
    } else if avg_gain <= 0.0 {
        0.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

/// Relative Strength Index with Wilder smoothing.
///
/// The first averages are plain means of the first `period` changes; every
/// later change is folded in as `avg = (avg * (period - 1) + x) / period`.
/// Needs `period + 1` prices.
pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let (seed, rest) = changes.split_at(period);

    let mut avg_gain = seed.iter().filter(|c| **c > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss = seed.iter().filter(|c| **c < 0.0).map(|c| -c).sum::<f64>() / period as f64;

    let smoothing = (period - 1) as f64;
    for &change in rest {
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * smoothing + gain) / period as f64;
        avg_loss = (avg_loss * smoothing + loss) / period as f64;
    }

    Some(rsi_value(avg_gain, avg_loss))
}

/// MACD line series (EMA12 − EMA26), one entry per price from index 25 on.
fn macd_line_series(prices: &[f64]) -> Vec<f64> {
    let fast = ema_series(prices, MACD_FAST);
    let slow = ema_series(prices, MACD_SLOW);
    if slow.is_empty() {
        return Vec::new();
    }
    let offset = MACD_SLOW - MACD_FAST;
    slow.iter()
        .enumerate()
        .map(|(i, slow_value)| fast[i + offset] - slow_value)
        .collect()
}

/// Latest MACD line value. Needs 26 prices.
pub fn macd_line(prices: &[f64]) -> Option<f64> {
    macd_line_series(prices).last().copied()
}

/// MACD(12, 26, 9): line, EMA9 signal of the line, and histogram.
pub fn macd(prices: &[f64]) -> Option<MacdValues> {
    if prices.len() < MACD_MIN_POINTS {
        return None;
    }
    let line_series = macd_line_series(prices);
    let signal_series = ema_series(&line_series, MACD_SIGNAL);
    let line = *line_series.last()?;
    let signal = *signal_series.last()?;
    Some(MacdValues {
        line,
        signal,
        histogram: line - signal,
    })
}
