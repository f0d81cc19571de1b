//! Prompts sent to the text generation provider.

use std::fmt::Write;

use crate::indicators::IndicatorSnapshot;
use crate::metrics::PortfolioMetrics;
use crate::portfolios::Portfolio;

pub const SYSTEM_PROMPT: &str = "You are an experienced financial analyst. Your analyses are \
objective, grounded in the technical data provided, and never give direct investment advice. \
Always state that the analysis is informational.";

const ASSET_REQUIREMENTS: &str = "\
ANALYSIS REQUIREMENTS (about 200 words):
1. MOMENTUM AND DIRECTION
   - Assess directional strength from RSI and recent price change
   - Say whether momentum looks sustainable or exhausted
2. TECHNICAL STRUCTURE
   - Interpret the MACD/signal relationship and its divergence
   - Check whether the indicators agree or conflict
3. KEY LEVELS
   - Identify implied support and resistance zones
   - Give the expected volatility range
4. RISK CONTEXT
   - Evaluate overbought/oversold conditions
   - Describe the current risk/return profile";

const PORTFOLIO_REQUIREMENTS: &str = "\
ANALYSIS REQUIREMENTS (about 250 words):
1. PERFORMANCE
   - Summarise overall return and its main contributors
2. CONCENTRATION AND DIVERSIFICATION
   - Comment on position weights and concentration risk
3. TECHNICAL PICTURE
   - Interpret the trend and momentum of the aggregate portfolio value
4. RISK
   - Describe volatility and the main risks to watch";

fn push_indicators(prompt: &mut String, snapshot: &IndicatorSnapshot) {
    prompt.push_str("TECHNICAL INDICATORS:\n");
    if let Some(rsi) = snapshot.rsi {
        let _ = writeln!(prompt, "- RSI(14): {:.2}", rsi);
    }
    for (label, value) in [
        ("SMA(20)", snapshot.sma20),
        ("SMA(50)", snapshot.sma50),
        ("SMA(200)", snapshot.sma200),
        ("EMA(20)", snapshot.ema20),
    ] {
        if let Some(v) = value {
            let _ = writeln!(prompt, "- {}: {:.2}", label, v);
        }
    }
    if let Some(macd) = snapshot.macd {
        let _ = writeln!(
            prompt,
            "- MACD: {:.2} | Signal: {:.2} | Histogram: {:.2}",
            macd.line, macd.signal, macd.histogram
        );
    }
    if let Some(bands) = snapshot.bollinger {
        let _ = writeln!(
            prompt,
            "- Bollinger Bands: upper {:.2} | mid {:.2} | lower {:.2}",
            bands.upper, bands.mid, bands.lower
        );
    }
    let _ = writeln!(
        prompt,
        "- Annualized volatility: {:.2}%",
        snapshot.volatility * 100.0
    );
    let _ = writeln!(prompt, "- Trend: {}", snapshot.trend);
}

/// Technical analysis prompt for a single asset.
pub fn asset_prompt(symbol: &str, snapshot: &IndicatorSnapshot) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "TECHNICAL ANALYSIS: {}\n", symbol);
    prompt.push_str("MARKET DATA:\n");
    let _ = writeln!(prompt, "- Current price: ${:.2}", snapshot.current_price);
    if let Some(change) = snapshot.price_change_30d {
        let _ = writeln!(prompt, "- Change over 30 sessions: {:+.2}%", change);
    }
    let _ = writeln!(prompt, "- Sessions analysed: {}\n", snapshot.points_used);
    push_indicators(&mut prompt, snapshot);
    prompt.push('\n');
    prompt.push_str(ASSET_REQUIREMENTS);
    prompt
}

/// Overview prompt for a portfolio. Lists at most `max_positions` holdings,
/// heaviest first.
pub fn portfolio_prompt(
    portfolio: &Portfolio,
    metrics: &PortfolioMetrics,
    snapshot: &IndicatorSnapshot,
    max_positions: usize,
) -> String {
    let metrics = metrics.rounded();
    let currency = &metrics.currency;
    let mut prompt = String::new();
    let _ = writeln!(prompt, "PORTFOLIO ANALYSIS: {}\n", portfolio.name);
    prompt.push_str("SUMMARY:\n");
    let _ = writeln!(prompt, "- Total value: {} {}", metrics.total_value, currency);
    let _ = writeln!(prompt, "- Total cost: {} {}", metrics.total_cost, currency);
    let _ = writeln!(
        prompt,
        "- Gain/loss: {} {} ({}%)",
        metrics.gain_loss, currency, metrics.gain_loss_percent
    );
    let _ = writeln!(prompt, "- Open positions: {}\n", metrics.positions.len());

    prompt.push_str("TOP POSITIONS BY WEIGHT:\n");
    for position in metrics.top_positions(max_positions) {
        let _ = writeln!(
            prompt,
            "- {}: {} units, value {} {}, weight {}%, gain/loss {}%",
            position.symbol,
            position.quantity.normalize(),
            position.market_value,
            currency,
            position.weight,
            position.unrealized_gain_percent
        );
    }
    prompt.push('\n');

    prompt.push_str("AGGREGATE VALUE SERIES:\n");
    let _ = writeln!(prompt, "- Sessions analysed: {}", snapshot.points_used);
    if let Some(change) = snapshot.price_change_30d {
        let _ = writeln!(prompt, "- Change over 30 sessions: {:+.2}%", change);
    }
    push_indicators(&mut prompt, snapshot);
    prompt.push('\n');
    prompt.push_str(PORTFOLIO_REQUIREMENTS);
    prompt
}
