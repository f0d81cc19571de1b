//! Technical indicator processor.
//!
//! Pure functions over chronologically ordered closing prices (oldest
//! first). Each indicator is individually gated on its window and reports
//! `None` rather than a made-up value when the window is not met.
//!
//! - **SMA / EMA**: simple and exponential moving averages
//! - **RSI**: Relative Strength Index with Wilder smoothing
//! - **MACD**: Moving Average Convergence Divergence (12, 26, 9)
//! - **Bollinger Bands**: SMA(20) ± 2 sample standard deviations
//! - **Volatility**: annualized standard deviation of daily log returns

mod indicator_processor;
mod indicators_errors;
mod indicators_model;
mod moving_average;
mod oscillators;
mod volatility;


pub use indicator_processor::{process, process_closes, MIN_POINTS};
pub use indicators_errors::IndicatorError;
pub use indicators_model::{BollingerValues, IndicatorSnapshot, MacdValues, Trend};
pub use moving_average::{ema, ema_series, sma};
pub use oscillators::{macd, macd_line, rsi, MACD_MIN_POINTS};
pub use volatility::{bollinger, volatility, VOLATILITY_WINDOW};
