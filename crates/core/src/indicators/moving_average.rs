//! Simple and exponential moving averages.

/// Simple moving average of the last `period` values.
pub fn sma(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period {
        return None;
    }
    let window = &data[data.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Full EMA series, seeded with the SMA of the first `period` values.
///
/// The returned vector has `data.len() - period + 1` entries; entry `i`
/// corresponds to `data[i + period - 1]`. Empty when the window is unmet.
pub fn ema_series(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return Vec::new();
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = data[..period].iter().sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(data.len() - period + 1);
    result.push(seed);
    let mut prev = seed;
    for &value in &data[period..] {
        prev = alpha * value + (1.0 - alpha) * prev;
        result.push(prev);
    }
    result
}

/// Latest EMA value.
pub fn ema(data: &[f64], period: usize) -> Option<f64> {
    ema_series(data, period).last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_uses_trailing_window() {
        let prices = [10.0, 11.0, 12.0, 11.0, 10.0];
        assert!((sma(&prices, 3).unwrap() - 11.0).abs() < 1e-9);
        assert!((sma(&prices, 5).unwrap() - 10.8).abs() < 1e-9);
        assert_eq!(sma(&prices, 6), None);
        assert_eq!(sma(&prices, 0), None);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let prices = [2.0, 4.0, 6.0, 8.0];
        let series = ema_series(&prices, 3);
        assert_eq!(series.len(), 2);
        assert!((series[0] - 4.0).abs() < 1e-9);
        // alpha = 0.5: 0.5 * 8 + 0.5 * 4
        assert!((series[1] - 6.0).abs() < 1e-9);
        assert_eq!(ema(&prices, 5), None);
    }

    #[test]
    fn test_ema_of_constant_series_is_constant() {
        let prices = vec![42.0; 30];
        assert!((ema(&prices, 20).unwrap() - 42.0).abs() < 1e-9);
    }
}
