//! Position ledger.
//!
//! Derives per-(portfolio, symbol) holdings from buy/sell operations using
//! exact decimal arithmetic. `apply` folds one trade into a position;
//! `replay` rebuilds a position from its complete operation history.

mod ledger_errors;
mod ledger_model;
mod ledger_traits;
mod position_ledger;
mod position_locks;

#[cfg(test)]
mod position_ledger_tests;

pub use ledger_errors::LedgerError;
pub use ledger_model::{Applied, Position, ReplayOutcome, Trade};
pub use ledger_traits::PositionRepositoryTrait;
pub use position_ledger::PositionLedger;
pub use position_locks::PositionLocks;
