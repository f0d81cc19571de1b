use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::decimal_utils::{round_display, round_money};

/// Valuation of one open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionMetrics {
    pub symbol: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub price: Decimal,
    /// The lookup had no price and a stored one was used instead.
    pub price_is_fallback: bool,
    pub market_value: Decimal,
    pub cost: Decimal,
    pub unrealized_gain: Decimal,
    pub unrealized_gain_percent: Decimal,
    /// Share of the portfolio's total value, in percent.
    pub weight: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMetrics {
    pub portfolio_id: String,
    pub currency: String,
    pub total_value: Decimal,
    pub total_cost: Decimal,
    pub gain_loss: Decimal,
    pub gain_loss_percent: Decimal,
    pub positions: Vec<PositionMetrics>,
}

/// The denormalized totals stored on a portfolio row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioTotals {
    pub total_value: Decimal,
    pub total_cost: Decimal,
    pub gain_loss: Decimal,
    pub gain_loss_percent: Decimal,
}

impl PortfolioMetrics {
    /// Presentation copy: money to the currency's minor unit, percentages to
    /// two places, quantities untouched.
    pub fn rounded(&self) -> Self {
        let money = |v: Decimal| round_money(v, &self.currency);
        Self {
            portfolio_id: self.portfolio_id.clone(),
            currency: self.currency.clone(),
            total_value: money(self.total_value),
            total_cost: money(self.total_cost),
            gain_loss: money(self.gain_loss),
            gain_loss_percent: round_display(self.gain_loss_percent),
            positions: self
                .positions
                .iter()
                .map(|p| PositionMetrics {
                    market_value: money(p.market_value),
                    cost: money(p.cost),
                    unrealized_gain: money(p.unrealized_gain),
                    unrealized_gain_percent: round_display(p.unrealized_gain_percent),
                    weight: round_display(p.weight),
                    ..p.clone()
                })
                .collect(),
        }
    }

    /// Rounded totals for persisting on the portfolio.
    pub fn totals(&self) -> PortfolioTotals {
        let rounded = self.rounded();
        PortfolioTotals {
            total_value: rounded.total_value,
            total_cost: rounded.total_cost,
            gain_loss: rounded.gain_loss,
            gain_loss_percent: rounded.gain_loss_percent,
        }
    }

    /// Positions sorted by descending weight, ties by symbol.
    pub fn top_positions(&self, limit: usize) -> Vec<&PositionMetrics> {
        let mut sorted: Vec<&PositionMetrics> = self.positions.iter().collect();
        sorted.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.symbol.cmp(&b.symbol)));
        sorted.truncate(limit);
        sorted
    }
}
