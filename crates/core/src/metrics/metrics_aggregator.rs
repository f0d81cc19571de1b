use log::debug;
use rust_decimal::Decimal;

use crate::ledger::Position;
use crate::portfolios::Portfolio;
use crate::utils::decimal_utils::percent_of;

use super::metrics_model::{PortfolioMetrics, PositionMetrics};
use super::price_lookup::PriceLookup;

/// Values every open position and sums the portfolio totals.
///
/// Price resolution per position: the lookup, then the stored last price,
/// then the average cost. A position is never valued at zero for lack of a
/// quote. Calling this twice with the same inputs gives identical output.
pub fn recompute(
    portfolio: &Portfolio,
    positions: &[Position],
    prices: &dyn PriceLookup,
) -> PortfolioMetrics {
    let mut breakdown = Vec::new();
    let mut total_value = Decimal::ZERO;
    let mut total_cost = Decimal::ZERO;

    for position in positions.iter().filter(|p| p.is_open()) {
        let (price, price_is_fallback) = match prices.latest_price(&position.symbol) {
            Some(price) => (price, false),
            None => (
                position.last_price.unwrap_or(position.average_cost),
                true,
            ),
        };
        if price_is_fallback {
            debug!(
                "No current price for {}, valuing at stored price {}",
                position.symbol, price
            );
        }

        let market_value = position.quantity * price;
        let cost = position.book_cost();
        total_value += market_value;
        total_cost += cost;

        breakdown.push(PositionMetrics {
            symbol: position.symbol.clone(),
            quantity: position.quantity,
            average_cost: position.average_cost,
            price,
            price_is_fallback,
            market_value,
            cost,
            unrealized_gain: market_value - cost,
            unrealized_gain_percent: percent_of(market_value - cost, cost),
            weight: Decimal::ZERO,
        });
    }

    for item in &mut breakdown {
        item.weight = percent_of(item.market_value, total_value);
    }
    breakdown.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let gain_loss = total_value - total_cost;
    PortfolioMetrics {
        portfolio_id: portfolio.id.clone(),
        currency: portfolio.base_currency.clone(),
        total_value,
        total_cost,
        gain_loss,
        gain_loss_percent: percent_of(gain_loss, total_cost),
        positions: breakdown,
    }
}
