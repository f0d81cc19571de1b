use async_trait::async_trait;

use super::portfolios_model::{NewPortfolio, Portfolio, PortfolioUpdate};
use crate::errors::Result;
use crate::metrics::{PortfolioMetrics, PortfolioTotals};

/// Trait defining the contract for Portfolio repository operations.
#[async_trait]
pub trait PortfolioRepositoryTrait: Send + Sync {
    fn get_by_id(&self, portfolio_id: &str) -> Result<Portfolio>;
    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Portfolio>>;
    /// Case-insensitive name match within one owner's portfolios.
    fn find_by_owner_and_name(&self, owner_id: &str, name: &str) -> Result<Option<Portfolio>>;
    async fn create(&self, new_portfolio: NewPortfolio) -> Result<Portfolio>;
    async fn update(&self, portfolio_update: PortfolioUpdate) -> Result<Portfolio>;
    async fn update_totals(&self, portfolio_id: &str, totals: PortfolioTotals) -> Result<()>;
    /// Removes the portfolio with its positions and operations.
    async fn delete(&self, portfolio_id: &str) -> Result<usize>;
}

/// Trait defining the contract for Portfolio service operations.
#[async_trait]
pub trait PortfolioServiceTrait: Send + Sync {
    fn get_portfolio(&self, portfolio_id: &str) -> Result<Portfolio>;
    fn list_portfolios(&self, owner_id: &str) -> Result<Vec<Portfolio>>;
    async fn create_portfolio(&self, new_portfolio: NewPortfolio) -> Result<Portfolio>;
    async fn update_portfolio(&self, portfolio_update: PortfolioUpdate) -> Result<Portfolio>;
    async fn delete_portfolio(&self, portfolio_id: &str) -> Result<()>;
    /// Recomputes metrics from positions and current prices, refreshing the
    /// stored totals when they drifted.
    async fn get_portfolio_metrics(&self, portfolio_id: &str) -> Result<PortfolioMetrics>;
}
