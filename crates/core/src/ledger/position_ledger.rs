use log::debug;
use rust_decimal::Decimal;

use crate::operations::{Operation, OperationSide};
use crate::utils::decimal_utils::{is_quantity_significant, round_money};

use super::ledger_errors::LedgerError;
use super::ledger_model::{Applied, Position, ReplayOutcome, Trade};

/// Stateless weighted-average-cost ledger.
///
/// Fees never enter the cost basis: they are part of an operation's
/// `total_amount` and reduce the realized gain of a sell.
pub struct PositionLedger;

impl PositionLedger {
    pub fn validate(trade: &Trade) -> Result<(), LedgerError> {
        if trade.symbol.trim().is_empty() {
            return Err(LedgerError::invalid("symbol must not be empty"));
        }
        if trade.quantity <= Decimal::ZERO {
            return Err(LedgerError::invalid(format!(
                "quantity must be positive, got {}",
                trade.quantity
            )));
        }
        if trade.price <= Decimal::ZERO {
            return Err(LedgerError::invalid(format!(
                "price must be positive, got {}",
                trade.price
            )));
        }
        if trade.fees < Decimal::ZERO {
            return Err(LedgerError::invalid(format!(
                "fees must not be negative, got {}",
                trade.fees
            )));
        }
        Ok(())
    }

    /// Folds one trade into `position` and returns the new state.
    ///
    /// The input is never modified; on error nothing has changed. The
    /// `version` is left untouched, committing bumps it.
    pub fn apply(position: &Position, trade: &Trade) -> Result<Applied, LedgerError> {
        Self::validate(trade)?;

        let mut next = position.clone();
        let last_operation_at = match position.last_operation_at {
            Some(prev) if prev > trade.executed_at => prev,
            _ => trade.executed_at,
        };
        next.last_operation_at = Some(last_operation_at);

        match trade.side {
            OperationSide::Buy => {
                if !position.is_open() {
                    next.opened_at = Some(trade.executed_at);
                    next.cost_basis = Decimal::ZERO;
                }
                next.quantity = position.quantity + trade.quantity;
                next.cost_basis += trade.quantity * trade.price;
                next.average_cost = round_money(next.cost_basis / next.quantity, &next.currency);
                Ok(Applied {
                    position: next,
                    realized_gain: None,
                })
            }
            OperationSide::Sell => {
                if trade.quantity > position.quantity {
                    return Err(LedgerError::InsufficientQuantity {
                        symbol: position.symbol.clone(),
                        requested: trade.quantity,
                        available: position.quantity,
                    });
                }
                let realized_gain =
                    (trade.price - position.average_cost) * trade.quantity - trade.fees;

                let remaining = position.quantity - trade.quantity;
                if is_quantity_significant(remaining) {
                    next.quantity = remaining;
                    next.cost_basis = position.cost_basis * remaining / position.quantity;
                } else {
                    next.quantity = Decimal::ZERO;
                    next.cost_basis = Decimal::ZERO;
                }
                Ok(Applied {
                    position: next,
                    realized_gain: Some(realized_gain),
                })
            }
        }
    }

    /// Rebuilds a position from `seed.reset()` by applying `operations` in
    /// (executed_at, created_at, id) order. Recorded operations carry UUID v7
    /// ids, so the last key follows recording order when timestamps tie.
    ///
    /// Fails on the first operation the history cannot support, which is how
    /// a deletion that would leave a later sell uncovered is detected.
    pub fn replay(seed: &Position, operations: &[Operation]) -> Result<ReplayOutcome, LedgerError> {
        let mut ordered: Vec<&Operation> = operations.iter().collect();
        ordered.sort_by(|a, b| {
            a.executed_at
                .cmp(&b.executed_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut position = seed.reset();
        let mut realized_gains = Vec::with_capacity(ordered.len());
        for operation in ordered {
            let applied = Self::apply(&position, &operation.to_trade())?;
            position = applied.position;
            realized_gains.push((operation.id.clone(), applied.realized_gain));
        }

        debug!(
            "Replayed {} operations for {}/{}: quantity {}",
            realized_gains.len(),
            position.portfolio_id,
            position.symbol,
            position.quantity
        );

        Ok(ReplayOutcome {
            position,
            realized_gains,
        })
    }
}
