use async_trait::async_trait;

use super::operations_model::*;
use crate::errors::Result;

/// Trait defining the contract for Operation repository operations.
#[async_trait]
pub trait OperationRepositoryTrait: Send + Sync {
    fn get_operation(&self, operation_id: &str) -> Result<Operation>;
    /// Newest first, honoring the filter's limit and offset.
    fn list_operations(&self, filter: &OperationFilter) -> Result<Vec<Operation>>;
    /// Full history of one position in (executed_at, created_at, id) order.
    fn list_for_position(&self, portfolio_id: &str, symbol: &str) -> Result<Vec<Operation>>;
    fn count_operations(&self, portfolio_id: &str) -> Result<i64>;
    /// Applies a ledger step atomically. Fails with `LedgerError::Conflict`
    /// when the stored position version differs from `expected_version`.
    async fn commit(&self, commit: LedgerCommit) -> Result<()>;
    async fn update_notes(&self, operation_id: &str, notes: Option<String>) -> Result<Operation>;
}

/// Trait defining the contract for Operation service operations.
#[async_trait]
pub trait OperationServiceTrait: Send + Sync {
    fn get_operation(&self, operation_id: &str) -> Result<Operation>;
    fn list_operations(&self, filter: &OperationFilter) -> Result<Vec<Operation>>;
    fn count_operations(&self, portfolio_id: &str) -> Result<i64>;
    fn get_portfolio_statistics(&self, portfolio_id: &str) -> Result<PortfolioStatistics>;
    fn get_asset_statistics(&self, portfolio_id: &str, symbol: &str) -> Result<AssetStatistics>;
    async fn apply_operation(&self, new_operation: NewOperation) -> Result<OperationResult>;
    async fn delete_operation(&self, operation_id: &str) -> Result<DeleteOperationResult>;
    async fn update_operation_notes(
        &self,
        operation_id: &str,
        notes: Option<String>,
    ) -> Result<Operation>;
    /// Replays a position's history and compares it with the stored row.
    /// With `repair`, a divergent row is overwritten with the replayed state.
    async fn reconcile_position(
        &self,
        portfolio_id: &str,
        symbol: &str,
        repair: bool,
    ) -> Result<ReconciliationReport>;
}
