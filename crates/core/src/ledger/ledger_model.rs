use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::operations::OperationSide;
use crate::utils::decimal_utils::is_quantity_significant;

/// Holdings of one symbol inside one portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub portfolio_id: String,
    pub symbol: String,
    pub currency: String,
    pub quantity: Decimal,
    /// Weighted-average unit cost, rounded to the currency's minor unit.
    pub average_cost: Decimal,
    /// Unrounded total cost of the units currently held.
    pub cost_basis: Decimal,
    pub last_price: Option<Decimal>,
    /// Bumped on every committed change; guards concurrent writers.
    pub version: i64,
    pub opened_at: Option<DateTime<Utc>>,
    pub last_operation_at: Option<DateTime<Utc>>,
}

impl Position {
    /// A position that has never held anything.
    pub fn empty(
        portfolio_id: impl Into<String>,
        symbol: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            portfolio_id: portfolio_id.into(),
            symbol: symbol.into(),
            currency: currency.into(),
            quantity: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            cost_basis: Decimal::ZERO,
            last_price: None,
            version: 0,
            opened_at: None,
            last_operation_at: None,
        }
    }

    /// Same identity and version, all holdings cleared. Replay starts here.
    pub fn reset(&self) -> Self {
        Self {
            last_price: self.last_price,
            version: self.version,
            ..Self::empty(&self.portfolio_id, &self.symbol, &self.currency)
        }
    }

    pub fn is_open(&self) -> bool {
        is_quantity_significant(self.quantity)
    }

    /// Cost of the held units at the (rounded) average cost.
    pub fn book_cost(&self) -> Decimal {
        self.quantity * self.average_cost
    }
}

/// The financial content of one operation as the ledger sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub side: OperationSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fees: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// Result of folding one trade into a position.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub position: Position,
    /// Present for sells only.
    pub realized_gain: Option<Decimal>,
}

/// Result of rebuilding a position from history.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub position: Position,
    /// Realized gain recomputed for every replayed operation, in replay order.
    pub realized_gains: Vec<(String, Option<Decimal>)>,
}
