//! Dispersion measures: realized volatility and Bollinger Bands.

use crate::constants::TRADING_DAYS_PER_YEAR;

use super::indicators_model::BollingerValues;
use super::moving_average::sma;

/// Trailing daily log returns used for realized volatility.
pub const VOLATILITY_WINDOW: usize = 30;

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Annualized volatility, `σ_daily * sqrt(252)`, from the sample standard
/// deviation of the last (up to) 30 daily log returns.
///
/// Returns between non-positive prices are skipped. Needs at least two
/// usable returns.
pub fn volatility(prices: &[f64]) -> Option<f64> {
    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect();
    let start = returns.len().saturating_sub(VOLATILITY_WINDOW);
    let daily = sample_std(&returns[start..])?;
    Some(daily * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Bollinger Bands over the last `period` prices.
pub fn bollinger(prices: &[f64], period: usize, num_std: f64) -> Option<BollingerValues> {
    let mid = sma(prices, period)?;
    let std = sample_std(&prices[prices.len() - period..])?;
    Some(BollingerValues {
        upper: mid + num_std * std,
        mid,
        lower: mid - num_std * std,
    })
}
