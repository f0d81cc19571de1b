//! Operation domain models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result, ValidationError};
use crate::ledger::{Position, Trade};
use crate::metrics::PortfolioMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationSide {
    Buy,
    Sell,
}

impl OperationSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationSide::Buy => "BUY",
            OperationSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OperationSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationSide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(OperationSide::Buy),
            "SELL" => Ok(OperationSide::Sell),
            other => Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Unknown operation side '{}'",
                other
            )))),
        }
    }
}

/// `quantity * price + fees` for a buy, `quantity * price - fees` for a sell.
pub fn compute_total_amount(
    side: OperationSide,
    quantity: Decimal,
    price: Decimal,
    fees: Decimal,
) -> Decimal {
    let gross = quantity * price;
    match side {
        OperationSide::Buy => gross + fees,
        OperationSide::Sell => gross - fees,
    }
}

/// A persisted trade. Financial fields never change after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: String,
    pub portfolio_id: String,
    pub symbol: String,
    pub side: OperationSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fees: Decimal,
    pub total_amount: Decimal,
    /// Sells only.
    pub realized_gain: Option<Decimal>,
    pub executed_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Operation {
    pub fn to_trade(&self) -> Trade {
        Trade {
            symbol: self.symbol.clone(),
            side: self.side,
            quantity: self.quantity,
            price: self.price,
            fees: self.fees,
            executed_at: self.executed_at,
        }
    }
}

/// Input for recording a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOperation {
    pub portfolio_id: String,
    pub symbol: String,
    pub side: OperationSide,
    pub quantity: Decimal,
    pub price: Decimal,
    #[serde(default)]
    pub fees: Decimal,
    pub executed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl NewOperation {
    /// Trims and upper-cases the symbol.
    pub fn normalized(mut self) -> Self {
        self.symbol = self.symbol.trim().to_uppercase();
        self.notes = self
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.portfolio_id.trim().is_empty() {
            return Err(ValidationError::MissingField("portfolio_id".to_string()).into());
        }
        crate::ledger::PositionLedger::validate(&self.to_trade())?;
        Ok(())
    }

    pub fn total_amount(&self) -> Decimal {
        compute_total_amount(self.side, self.quantity, self.price, self.fees)
    }

    pub fn to_trade(&self) -> Trade {
        Trade {
            symbol: self.symbol.clone(),
            side: self.side,
            quantity: self.quantity,
            price: self.price,
            fees: self.fees,
            executed_at: self.executed_at,
        }
    }
}

/// Criteria for listing operations. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFilter {
    pub portfolio_id: String,
    pub symbol: Option<String>,
    pub side: Option<OperationSide>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl OperationFilter {
    pub fn for_portfolio(portfolio_id: impl Into<String>) -> Self {
        Self {
            portfolio_id: portfolio_id.into(),
            ..Default::default()
        }
    }

    pub fn matches(&self, op: &Operation) -> bool {
        op.portfolio_id == self.portfolio_id
            && self
                .symbol
                .as_ref()
                .is_none_or(|s| s.eq_ignore_ascii_case(&op.symbol))
            && self.side.is_none_or(|side| side == op.side)
            && self.from.is_none_or(|from| op.executed_at >= from)
            && self.to.is_none_or(|to| op.executed_at <= to)
    }
}

/// Everything a caller needs after recording an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub operation: Operation,
    pub position: Position,
    pub realized_gain: Option<Decimal>,
    pub metrics: PortfolioMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOperationResult {
    pub deleted: Operation,
    pub position: Position,
    pub metrics: PortfolioMetrics,
}

/// Atomic write produced by one ledger step.
///
/// The repository applies all parts in one transaction, and only if the
/// stored position version still equals `expected_version` (0 = no row yet).
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerCommit {
    pub insert: Option<Operation>,
    pub delete_operation_id: Option<String>,
    /// Realized gains rewritten by a replay, keyed by operation id.
    pub rewritten_gains: Vec<(String, Option<Decimal>)>,
    pub position: Position,
    pub expected_version: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStatistics {
    pub portfolio_id: String,
    pub total_operations: usize,
    pub total_buys: usize,
    pub total_sells: usize,
    /// Sum of buy `total_amount`s, fees included.
    pub total_invested: Decimal,
    /// Sum of sell `total_amount`s, net of fees.
    pub total_withdrawn: Decimal,
    pub total_fees: Decimal,
    pub realized_gain: Decimal,
    pub first_operation_at: Option<DateTime<Utc>>,
    pub last_operation_at: Option<DateTime<Utc>>,
}

impl PortfolioStatistics {
    pub fn from_operations(portfolio_id: &str, operations: &[Operation]) -> Self {
        let mut stats = Self {
            portfolio_id: portfolio_id.to_string(),
            ..Default::default()
        };
        for op in operations {
            stats.total_operations += 1;
            stats.total_fees += op.fees;
            match op.side {
                OperationSide::Buy => {
                    stats.total_buys += 1;
                    stats.total_invested += op.total_amount;
                }
                OperationSide::Sell => {
                    stats.total_sells += 1;
                    stats.total_withdrawn += op.total_amount;
                    stats.realized_gain += op.realized_gain.unwrap_or_default();
                }
            }
            stats.first_operation_at = Some(match stats.first_operation_at {
                Some(first) => first.min(op.executed_at),
                None => op.executed_at,
            });
            stats.last_operation_at = Some(match stats.last_operation_at {
                Some(last) => last.max(op.executed_at),
                None => op.executed_at,
            });
        }
        stats
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetStatistics {
    pub portfolio_id: String,
    pub symbol: String,
    pub total_operations: usize,
    pub total_buys: usize,
    pub total_sells: usize,
    pub total_quantity_bought: Decimal,
    pub total_quantity_sold: Decimal,
    /// Volume-weighted, fees excluded.
    pub average_buy_price: Option<Decimal>,
    pub average_sell_price: Option<Decimal>,
    pub total_fees: Decimal,
    pub realized_gain: Decimal,
    pub position: Option<Position>,
}

impl AssetStatistics {
    pub fn from_operations(
        portfolio_id: &str,
        symbol: &str,
        operations: &[Operation],
        position: Option<Position>,
    ) -> Self {
        let mut stats = Self {
            portfolio_id: portfolio_id.to_string(),
            symbol: symbol.to_string(),
            position,
            ..Default::default()
        };
        let mut buy_gross = Decimal::ZERO;
        let mut sell_gross = Decimal::ZERO;
        for op in operations {
            stats.total_operations += 1;
            stats.total_fees += op.fees;
            match op.side {
                OperationSide::Buy => {
                    stats.total_buys += 1;
                    stats.total_quantity_bought += op.quantity;
                    buy_gross += op.quantity * op.price;
                }
                OperationSide::Sell => {
                    stats.total_sells += 1;
                    stats.total_quantity_sold += op.quantity;
                    sell_gross += op.quantity * op.price;
                    stats.realized_gain += op.realized_gain.unwrap_or_default();
                }
            }
        }
        if stats.total_quantity_bought > Decimal::ZERO {
            stats.average_buy_price = Some(buy_gross / stats.total_quantity_bought);
        }
        if stats.total_quantity_sold > Decimal::ZERO {
            stats.average_sell_price = Some(sell_gross / stats.total_quantity_sold);
        }
        stats
    }
}

/// Stored position compared against a fresh replay of its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub portfolio_id: String,
    pub symbol: String,
    pub stored: Option<Position>,
    pub replayed: Position,
    pub consistent: bool,
    /// True when the stored row was overwritten with the replayed state.
    pub repaired: bool,
}
