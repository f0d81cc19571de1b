use super::ledger_model::Position;
use crate::errors::Result;

/// Read side of stored positions. Writes go through
/// `OperationRepositoryTrait::commit` together with the operation row.
pub trait PositionRepositoryTrait: Send + Sync {
    fn get_position(&self, portfolio_id: &str, symbol: &str) -> Result<Option<Position>>;
    /// All positions of a portfolio, closed ones included, ordered by symbol.
    fn list_positions(&self, portfolio_id: &str) -> Result<Vec<Position>>;
    /// Distinct symbols with an open position in any portfolio.
    fn list_open_symbols(&self) -> Result<Vec<String>>;
}
