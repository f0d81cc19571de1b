use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use super::portfolios_model::{NewPortfolio, Portfolio, PortfolioUpdate};
use super::portfolios_traits::{PortfolioRepositoryTrait, PortfolioServiceTrait};
use crate::errors::{Error, Result, ValidationError};
use crate::events::{DomainEvent, DomainEventSink};
use crate::ledger::PositionRepositoryTrait;
use crate::metrics::{recompute, PortfolioMetrics, PriceLookup};

/// Service for managing portfolios and reading their metrics.
pub struct PortfolioService {
    repository: Arc<dyn PortfolioRepositoryTrait>,
    position_repository: Arc<dyn PositionRepositoryTrait>,
    prices: Arc<dyn PriceLookup>,
    event_sink: Arc<dyn DomainEventSink>,
}

impl PortfolioService {
    pub fn new(
        repository: Arc<dyn PortfolioRepositoryTrait>,
        position_repository: Arc<dyn PositionRepositoryTrait>,
        prices: Arc<dyn PriceLookup>,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            repository,
            position_repository,
            prices,
            event_sink,
        }
    }

    fn ensure_unique_name(&self, owner_id: &str, name: &str, except_id: Option<&str>) -> Result<()> {
        if let Some(existing) = self.repository.find_by_owner_and_name(owner_id, name)? {
            if except_id != Some(existing.id.as_str()) {
                return Err(Error::Validation(ValidationError::InvalidInput(format!(
                    "A portfolio named '{}' already exists",
                    existing.name
                ))));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PortfolioServiceTrait for PortfolioService {
    fn get_portfolio(&self, portfolio_id: &str) -> Result<Portfolio> {
        self.repository.get_by_id(portfolio_id)
    }

    fn list_portfolios(&self, owner_id: &str) -> Result<Vec<Portfolio>> {
        self.repository.list_by_owner(owner_id)
    }

    async fn create_portfolio(&self, new_portfolio: NewPortfolio) -> Result<Portfolio> {
        let new_portfolio = new_portfolio.normalized();
        new_portfolio.validate()?;
        self.ensure_unique_name(&new_portfolio.owner_id, &new_portfolio.name, None)?;

        let created = self.repository.create(new_portfolio).await?;
        info!("Created portfolio {} ({})", created.id, created.name);
        Ok(created)
    }

    async fn update_portfolio(&self, portfolio_update: PortfolioUpdate) -> Result<Portfolio> {
        portfolio_update.validate()?;
        let existing = self.repository.get_by_id(&portfolio_update.id)?;
        self.ensure_unique_name(
            &existing.owner_id,
            portfolio_update.name.trim(),
            Some(&existing.id),
        )?;

        let updated = self
            .repository
            .update(PortfolioUpdate {
                name: portfolio_update.name.trim().to_string(),
                ..portfolio_update
            })
            .await?;
        self.event_sink
            .emit(DomainEvent::portfolio_changed(updated.id.clone()));
        Ok(updated)
    }

    async fn delete_portfolio(&self, portfolio_id: &str) -> Result<()> {
        // Surfaces NotFound before attempting the delete.
        self.repository.get_by_id(portfolio_id)?;
        let removed = self.repository.delete(portfolio_id).await?;
        info!("Deleted portfolio {} ({} rows)", portfolio_id, removed);
        self.event_sink
            .emit(DomainEvent::portfolio_deleted(portfolio_id));
        Ok(())
    }

    async fn get_portfolio_metrics(&self, portfolio_id: &str) -> Result<PortfolioMetrics> {
        let portfolio = self.repository.get_by_id(portfolio_id)?;
        let positions = self.position_repository.list_positions(portfolio_id)?;
        let metrics = recompute(&portfolio, &positions, self.prices.as_ref());

        let totals = metrics.totals();
        if totals != portfolio.totals() {
            debug!("Refreshing stored totals for portfolio {}", portfolio_id);
            self.repository.update_totals(portfolio_id, totals).await?;
        }
        Ok(metrics)
    }
}
