use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::operations_model::*;
use super::operations_traits::{OperationRepositoryTrait, OperationServiceTrait};
use crate::config::LedgerConfig;
use crate::errors::{DatabaseError, Error, Result};
use crate::events::{DomainEvent, DomainEventSink};
use crate::ledger::{Position, PositionLedger, PositionLocks, PositionRepositoryTrait};
use crate::metrics::{recompute, PortfolioMetrics, PriceLookup};
use crate::portfolios::{Portfolio, PortfolioRepositoryTrait};
use crate::utils::Clock;

/// Records trades through the position ledger and keeps portfolio totals
/// in step.
///
/// Writes to one (portfolio, symbol) are serialized by an in-process lock;
/// the repository's version check catches writers outside this process.
pub struct OperationService {
    repository: Arc<dyn OperationRepositoryTrait>,
    position_repository: Arc<dyn PositionRepositoryTrait>,
    portfolio_repository: Arc<dyn PortfolioRepositoryTrait>,
    prices: Arc<dyn PriceLookup>,
    event_sink: Arc<dyn DomainEventSink>,
    clock: Arc<dyn Clock>,
    locks: Arc<PositionLocks>,
    config: LedgerConfig,
}

/// A position state ready to be committed.
struct Step {
    position: Position,
    realized_gain: Option<Decimal>,
    rewritten_gains: Vec<(String, Option<Decimal>)>,
}

impl OperationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<dyn OperationRepositoryTrait>,
        position_repository: Arc<dyn PositionRepositoryTrait>,
        portfolio_repository: Arc<dyn PortfolioRepositoryTrait>,
        prices: Arc<dyn PriceLookup>,
        event_sink: Arc<dyn DomainEventSink>,
        clock: Arc<dyn Clock>,
        locks: Arc<PositionLocks>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            repository,
            position_repository,
            portfolio_repository,
            prices,
            event_sink,
            clock,
            locks,
            config,
        }
    }

    fn load_position(&self, portfolio: &Portfolio, symbol: &str) -> Result<Position> {
        Ok(self
            .position_repository
            .get_position(&portfolio.id, symbol)?
            .unwrap_or_else(|| Position::empty(&portfolio.id, symbol, &portfolio.base_currency)))
    }

    /// Runs `attempt` and retries it on a version conflict, up to the
    /// configured number of times. Each attempt re-reads its inputs.
    async fn with_conflict_retry<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(e) if e.is_conflict() && retries < self.config.max_conflict_retries => {
                    retries += 1;
                    warn!("{}; re-reading and retrying ({}/{})", e, retries, self.config.max_conflict_retries);
                }
                other => return other,
            }
        }
    }

    fn plan_insert(&self, current: &Position, operation: &Operation) -> Result<Step> {
        let backdated = current
            .last_operation_at
            .is_some_and(|last| operation.executed_at < last);

        if !backdated {
            let applied = PositionLedger::apply(current, &operation.to_trade())?;
            let mut position = applied.position;
            position.last_price = self
                .prices
                .latest_price(&position.symbol)
                .or(Some(operation.price));
            return Ok(Step {
                position,
                realized_gain: applied.realized_gain,
                rewritten_gains: Vec::new(),
            });
        }

        debug!(
            "Operation on {} at {} precedes the latest recorded trade, replaying history",
            operation.symbol, operation.executed_at
        );
        let mut history = self
            .repository
            .list_for_position(&current.portfolio_id, &current.symbol)?;
        history.push(operation.clone());
        let outcome = PositionLedger::replay(current, &history)?;

        let mut realized_gain = None;
        let mut rewritten_gains = Vec::new();
        for (id, gain) in outcome.realized_gains {
            if id == operation.id {
                realized_gain = gain;
            } else {
                rewritten_gains.push((id, gain));
            }
        }
        let mut position = outcome.position;
        position.last_price = self
            .prices
            .latest_price(&position.symbol)
            .or(current.last_price);
        Ok(Step {
            position,
            realized_gain,
            rewritten_gains,
        })
    }

    async fn try_apply(
        &self,
        portfolio: &Portfolio,
        new_operation: &NewOperation,
    ) -> Result<(Operation, Position)> {
        let current = self.load_position(portfolio, &new_operation.symbol)?;

        let mut operation = Operation {
            id: Uuid::now_v7().to_string(),
            portfolio_id: portfolio.id.clone(),
            symbol: new_operation.symbol.clone(),
            side: new_operation.side,
            quantity: new_operation.quantity,
            price: new_operation.price,
            fees: new_operation.fees,
            total_amount: new_operation.total_amount(),
            realized_gain: None,
            executed_at: new_operation.executed_at,
            notes: new_operation.notes.clone(),
            created_at: self.clock.now(),
        };

        let step = self.plan_insert(&current, &operation)?;
        operation.realized_gain = step.realized_gain;
        let mut position = step.position;
        position.version = current.version + 1;

        self.repository
            .commit(LedgerCommit {
                insert: Some(operation.clone()),
                delete_operation_id: None,
                rewritten_gains: step.rewritten_gains,
                position: position.clone(),
                expected_version: current.version,
            })
            .await?;

        Ok((operation, position))
    }

    async fn try_delete(&self, portfolio: &Portfolio, operation: &Operation) -> Result<Position> {
        let current = self
            .position_repository
            .get_position(&portfolio.id, &operation.symbol)?
            .ok_or_else(|| {
                Error::Database(DatabaseError::NotFound(format!(
                    "position {}/{}",
                    portfolio.id, operation.symbol
                )))
            })?;

        let remaining: Vec<Operation> = self
            .repository
            .list_for_position(&portfolio.id, &operation.symbol)?
            .into_iter()
            .filter(|op| op.id != operation.id)
            .collect();
        let outcome = PositionLedger::replay(&current, &remaining)?;

        let mut position = outcome.position;
        position.version = current.version + 1;

        self.repository
            .commit(LedgerCommit {
                insert: None,
                delete_operation_id: Some(operation.id.clone()),
                rewritten_gains: outcome.realized_gains,
                position: position.clone(),
                expected_version: current.version,
            })
            .await?;

        Ok(position)
    }

    /// Recomputes the portfolio's metrics and stores the refreshed totals.
    /// Held under the portfolio lock so a slower refresh cannot overwrite
    /// totals computed from newer positions.
    async fn refresh_metrics(&self, portfolio: &Portfolio) -> Result<PortfolioMetrics> {
        let _totals = self.locks.lock_portfolio(&portfolio.id).await;
        let positions = self.position_repository.list_positions(&portfolio.id)?;
        let metrics = recompute(portfolio, &positions, self.prices.as_ref());
        self.portfolio_repository
            .update_totals(&portfolio.id, metrics.totals())
            .await?;
        Ok(metrics)
    }
}

#[async_trait]
impl OperationServiceTrait for OperationService {
    fn get_operation(&self, operation_id: &str) -> Result<Operation> {
        self.repository.get_operation(operation_id)
    }

    fn list_operations(&self, filter: &OperationFilter) -> Result<Vec<Operation>> {
        self.repository.list_operations(filter)
    }

    fn count_operations(&self, portfolio_id: &str) -> Result<i64> {
        self.repository.count_operations(portfolio_id)
    }

    fn get_portfolio_statistics(&self, portfolio_id: &str) -> Result<PortfolioStatistics> {
        self.portfolio_repository.get_by_id(portfolio_id)?;
        let operations = self
            .repository
            .list_operations(&OperationFilter::for_portfolio(portfolio_id))?;
        Ok(PortfolioStatistics::from_operations(portfolio_id, &operations))
    }

    fn get_asset_statistics(&self, portfolio_id: &str, symbol: &str) -> Result<AssetStatistics> {
        self.portfolio_repository.get_by_id(portfolio_id)?;
        let symbol = symbol.trim().to_uppercase();
        let operations = self.repository.list_for_position(portfolio_id, &symbol)?;
        let position = self.position_repository.get_position(portfolio_id, &symbol)?;
        Ok(AssetStatistics::from_operations(
            portfolio_id,
            &symbol,
            &operations,
            position,
        ))
    }

    async fn apply_operation(&self, new_operation: NewOperation) -> Result<OperationResult> {
        let new_operation = new_operation.normalized();
        new_operation.validate()?;
        let portfolio = self
            .portfolio_repository
            .get_by_id(&new_operation.portfolio_id)?;

        let (operation, position) = {
            let _guard = self
                .locks
                .lock(&portfolio.id, &new_operation.symbol)
                .await;
            self.with_conflict_retry(|| self.try_apply(&portfolio, &new_operation))
                .await?
        };

        info!(
            "Recorded {} {} {} @ {} in portfolio {} (position now {})",
            operation.side,
            operation.quantity,
            operation.symbol,
            operation.price,
            portfolio.id,
            position.quantity
        );

        let metrics = self.refresh_metrics(&portfolio).await?;
        self.event_sink.emit(DomainEvent::position_changed(
            portfolio.id.clone(),
            vec![operation.symbol.clone()],
        ));

        Ok(OperationResult {
            realized_gain: operation.realized_gain,
            operation,
            position,
            metrics,
        })
    }

    async fn delete_operation(&self, operation_id: &str) -> Result<DeleteOperationResult> {
        let operation = self.repository.get_operation(operation_id)?;
        let portfolio = self
            .portfolio_repository
            .get_by_id(&operation.portfolio_id)?;

        let position = {
            let _guard = self.locks.lock(&portfolio.id, &operation.symbol).await;
            self.with_conflict_retry(|| self.try_delete(&portfolio, &operation))
                .await?
        };

        info!(
            "Deleted operation {} ({} {}), position now {}",
            operation.id, operation.side, operation.symbol, position.quantity
        );

        let metrics = self.refresh_metrics(&portfolio).await?;
        self.event_sink.emit(DomainEvent::position_changed(
            portfolio.id.clone(),
            vec![operation.symbol.clone()],
        ));

        Ok(DeleteOperationResult {
            deleted: operation,
            position,
            metrics,
        })
    }

    async fn update_operation_notes(
        &self,
        operation_id: &str,
        notes: Option<String>,
    ) -> Result<Operation> {
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.repository.update_notes(operation_id, notes).await
    }

    async fn reconcile_position(
        &self,
        portfolio_id: &str,
        symbol: &str,
        repair: bool,
    ) -> Result<ReconciliationReport> {
        let portfolio = self.portfolio_repository.get_by_id(portfolio_id)?;
        let symbol = symbol.trim().to_uppercase();
        let _guard = self.locks.lock(&portfolio.id, &symbol).await;

        let stored = self.position_repository.get_position(&portfolio.id, &symbol)?;
        let seed = stored
            .clone()
            .unwrap_or_else(|| Position::empty(&portfolio.id, &symbol, &portfolio.base_currency));
        let history = self.repository.list_for_position(&portfolio.id, &symbol)?;
        let outcome = PositionLedger::replay(&seed, &history)?;

        let replayed = outcome.position;
        let consistent = match &stored {
            Some(stored) => {
                stored.quantity == replayed.quantity
                    && stored.average_cost == replayed.average_cost
                    && stored.cost_basis == replayed.cost_basis
            }
            None => history.is_empty(),
        };

        let mut repaired = false;
        if !consistent {
            warn!(
                "Stored position {}/{} diverges from its history (stored {:?}, replayed quantity {})",
                portfolio.id,
                symbol,
                stored.as_ref().map(|p| p.quantity),
                replayed.quantity
            );
            if repair {
                let mut position = replayed.clone();
                position.version = seed.version + 1;
                self.repository
                    .commit(LedgerCommit {
                        insert: None,
                        delete_operation_id: None,
                        rewritten_gains: outcome.realized_gains,
                        position,
                        expected_version: seed.version,
                    })
                    .await?;
                self.refresh_metrics(&portfolio).await?;
                self.event_sink
                    .emit(DomainEvent::position_changed(portfolio.id.clone(), vec![symbol.clone()]));
                repaired = true;
            }
        }

        Ok(ReconciliationReport {
            portfolio_id: portfolio.id,
            symbol,
            stored,
            replayed,
            consistent,
            repaired,
        })
    }
}
