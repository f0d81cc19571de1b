//! In-memory repositories shared by the service tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::analysis::{Analysis, AnalysisRepositoryTrait, AnalysisRequest, AnalysisSubject};
use crate::errors::{DatabaseError, Error, Result};
use crate::ledger::{LedgerError, Position, PositionRepositoryTrait};
use crate::market_data::{PricePoint, PriceSeries, QuoteRepositoryTrait};
use crate::metrics::PortfolioTotals;
use crate::operations::{LedgerCommit, Operation, OperationFilter, OperationRepositoryTrait};
use crate::portfolios::{NewPortfolio, Portfolio, PortfolioRepositoryTrait, PortfolioUpdate};

pub fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 15, 30, 0).unwrap()
}

pub fn portfolio(id: &str, owner: &str, name: &str) -> Portfolio {
    Portfolio {
        id: id.to_string(),
        owner_id: owner.to_string(),
        name: name.to_string(),
        description: None,
        base_currency: "USD".to_string(),
        total_value: Decimal::ZERO,
        total_cost: Decimal::ZERO,
        gain_loss: Decimal::ZERO,
        gain_loss_percent: Decimal::ZERO,
        created_at: ts(1),
        updated_at: ts(1),
    }
}

// --- Portfolios ---

#[derive(Clone, Default)]
pub struct MockPortfolioRepository {
    portfolios: Arc<Mutex<HashMap<String, Portfolio>>>,
}

impl MockPortfolioRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(portfolios: Vec<Portfolio>) -> Self {
        let repo = Self::new();
        for p in portfolios {
            repo.portfolios.lock().unwrap().insert(p.id.clone(), p);
        }
        repo
    }

    pub fn get(&self, id: &str) -> Option<Portfolio> {
        self.portfolios.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl PortfolioRepositoryTrait for MockPortfolioRepository {
    fn get_by_id(&self, portfolio_id: &str) -> Result<Portfolio> {
        self.get(portfolio_id).ok_or_else(|| {
            Error::Database(DatabaseError::NotFound(format!("portfolio {}", portfolio_id)))
        })
    }

    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Portfolio>> {
        let mut list: Vec<Portfolio> = self
            .portfolios
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    fn find_by_owner_and_name(&self, owner_id: &str, name: &str) -> Result<Option<Portfolio>> {
        Ok(self
            .portfolios
            .lock()
            .unwrap()
            .values()
            .find(|p| p.owner_id == owner_id && p.name.eq_ignore_ascii_case(name.trim()))
            .cloned())
    }

    async fn create(&self, new_portfolio: NewPortfolio) -> Result<Portfolio> {
        let id = new_portfolio
            .id
            .clone()
            .unwrap_or_else(|| format!("pf-{}", self.portfolios.lock().unwrap().len() + 1));
        let mut created = portfolio(&id, &new_portfolio.owner_id, &new_portfolio.name);
        created.description = new_portfolio.description;
        created.base_currency = new_portfolio.base_currency;
        self.portfolios
            .lock()
            .unwrap()
            .insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, update: PortfolioUpdate) -> Result<Portfolio> {
        let mut map = self.portfolios.lock().unwrap();
        let existing = map.get_mut(&update.id).ok_or_else(|| {
            Error::Database(DatabaseError::NotFound(format!("portfolio {}", update.id)))
        })?;
        existing.name = update.name;
        existing.description = update.description;
        Ok(existing.clone())
    }

    async fn update_totals(&self, portfolio_id: &str, totals: PortfolioTotals) -> Result<()> {
        let mut map = self.portfolios.lock().unwrap();
        if let Some(p) = map.get_mut(portfolio_id) {
            p.total_value = totals.total_value;
            p.total_cost = totals.total_cost;
            p.gain_loss = totals.gain_loss;
            p.gain_loss_percent = totals.gain_loss_percent;
        }
        Ok(())
    }

    async fn delete(&self, portfolio_id: &str) -> Result<usize> {
        Ok(self
            .portfolios
            .lock()
            .unwrap()
            .remove(portfolio_id)
            .map_or(0, |_| 1))
    }
}

// --- Operations + positions ---

#[derive(Clone, Default)]
pub struct MockLedgerRepository {
    operations: Arc<Mutex<Vec<Operation>>>,
    positions: Arc<Mutex<HashMap<(String, String), Position>>>,
    forced_conflicts: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
}

impl MockLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` commits fail as if another writer got there first.
    pub fn fail_next_commits_with_conflict(&self, n: usize) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Overwrites a stored position without touching history.
    pub fn put_position(&self, position: Position) {
        self.positions.lock().unwrap().insert(
            (position.portfolio_id.clone(), position.symbol.clone()),
            position,
        );
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.operations.lock().unwrap().clone()
    }
}

impl PositionRepositoryTrait for MockLedgerRepository {
    fn get_position(&self, portfolio_id: &str, symbol: &str) -> Result<Option<Position>> {
        Ok(self
            .positions
            .lock()
            .unwrap()
            .get(&(portfolio_id.to_string(), symbol.to_string()))
            .cloned())
    }

    fn list_positions(&self, portfolio_id: &str) -> Result<Vec<Position>> {
        let mut list: Vec<Position> = self
            .positions
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.portfolio_id == portfolio_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(list)
    }

    fn list_open_symbols(&self) -> Result<Vec<String>> {
        let mut symbols: Vec<String> = self
            .positions
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.is_open())
            .map(|p| p.symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }
}

#[async_trait]
impl OperationRepositoryTrait for MockLedgerRepository {
    fn get_operation(&self, operation_id: &str) -> Result<Operation> {
        self.operations
            .lock()
            .unwrap()
            .iter()
            .find(|op| op.id == operation_id)
            .cloned()
            .ok_or_else(|| {
                Error::Database(DatabaseError::NotFound(format!("operation {}", operation_id)))
            })
    }

    fn list_operations(&self, filter: &OperationFilter) -> Result<Vec<Operation>> {
        let mut list: Vec<Operation> = self
            .operations
            .lock()
            .unwrap()
            .iter()
            .filter(|op| filter.matches(op))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.map_or(usize::MAX, |l| l.max(0) as usize);
        Ok(list.into_iter().skip(offset).take(limit).collect())
    }

    fn list_for_position(&self, portfolio_id: &str, symbol: &str) -> Result<Vec<Operation>> {
        let mut list: Vec<Operation> = self
            .operations
            .lock()
            .unwrap()
            .iter()
            .filter(|op| op.portfolio_id == portfolio_id && op.symbol == symbol)
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            a.executed_at
                .cmp(&b.executed_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(list)
    }

    fn count_operations(&self, portfolio_id: &str) -> Result<i64> {
        Ok(self
            .operations
            .lock()
            .unwrap()
            .iter()
            .filter(|op| op.portfolio_id == portfolio_id)
            .count() as i64)
    }

    async fn commit(&self, commit: LedgerCommit) -> Result<()> {
        let position = commit.position;
        if self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(LedgerError::Conflict {
                portfolio_id: position.portfolio_id,
                symbol: position.symbol,
                expected_version: commit.expected_version,
            }
            .into());
        }

        let key = (position.portfolio_id.clone(), position.symbol.clone());
        let mut positions = self.positions.lock().unwrap();
        let stored_version = positions.get(&key).map_or(0, |p| p.version);
        if stored_version != commit.expected_version {
            return Err(LedgerError::Conflict {
                portfolio_id: position.portfolio_id,
                symbol: position.symbol,
                expected_version: commit.expected_version,
            }
            .into());
        }

        let mut operations = self.operations.lock().unwrap();
        if let Some(id) = &commit.delete_operation_id {
            operations.retain(|op| &op.id != id);
        }
        for (id, gain) in &commit.rewritten_gains {
            if let Some(op) = operations.iter_mut().find(|op| &op.id == id) {
                op.realized_gain = *gain;
            }
        }
        if let Some(op) = commit.insert {
            operations.push(op);
        }
        positions.insert(key, position);
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_notes(&self, operation_id: &str, notes: Option<String>) -> Result<Operation> {
        let mut operations = self.operations.lock().unwrap();
        let op = operations
            .iter_mut()
            .find(|op| op.id == operation_id)
            .ok_or_else(|| {
                Error::Database(DatabaseError::NotFound(format!("operation {}", operation_id)))
            })?;
        op.notes = notes;
        Ok(op.clone())
    }
}

// --- Price points ---

pub fn price_point(symbol: &str, at: DateTime<Utc>, close: Decimal) -> PricePoint {
    PricePoint {
        symbol: symbol.to_string(),
        timestamp: at,
        open: None,
        high: None,
        low: None,
        close,
        volume: None,
        source: "TEST".to_string(),
    }
}

#[derive(Clone, Default)]
pub struct MockQuoteRepository {
    points: Arc<Mutex<HashMap<String, Vec<PricePoint>>>>,
}

impl MockQuoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, points: Vec<PricePoint>) {
        let mut map = self.points.lock().unwrap();
        for point in points {
            let series = map.entry(point.symbol.clone()).or_default();
            if !series.iter().any(|p| p.timestamp == point.timestamp) {
                series.push(point);
            }
        }
    }

    pub fn count(&self, symbol: &str) -> usize {
        self.points.lock().unwrap().get(symbol).map_or(0, Vec::len)
    }
}

#[async_trait]
impl QuoteRepositoryTrait for MockQuoteRepository {
    fn get_series(&self, symbol: &str, from: Option<DateTime<Utc>>) -> Result<PriceSeries> {
        let points = self
            .points
            .lock()
            .unwrap()
            .get(symbol)
            .map(|all| {
                all.iter()
                    .filter(|p| from.is_none_or(|f| p.timestamp >= f))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(PriceSeries::new(symbol, points))
    }

    fn latest_point(&self, symbol: &str) -> Result<Option<PricePoint>> {
        Ok(self
            .points
            .lock()
            .unwrap()
            .get(symbol)
            .and_then(|all| all.iter().max_by_key(|p| p.timestamp).cloned()))
    }

    fn latest_points(&self, symbols: &[String]) -> Result<HashMap<String, PricePoint>> {
        let mut latest = HashMap::new();
        for symbol in symbols {
            if let Some(point) = self.latest_point(symbol)? {
                latest.insert(symbol.clone(), point);
            }
        }
        Ok(latest)
    }

    async fn insert_points(&self, points: Vec<PricePoint>) -> Result<usize> {
        let before: usize = self.points.lock().unwrap().values().map(Vec::len).sum();
        self.seed(points);
        let after: usize = self.points.lock().unwrap().values().map(Vec::len).sum();
        Ok(after - before)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for series in self.points.lock().unwrap().values_mut() {
            let before = series.len();
            series.retain(|p| p.timestamp >= cutoff);
            removed += before - series.len();
        }
        Ok(removed)
    }
}

// --- Analyses ---

#[derive(Clone, Default)]
pub struct MockAnalysisRepository {
    analyses: Arc<Mutex<Vec<Analysis>>>,
    requests: Arc<Mutex<Vec<AnalysisRequest>>>,
}

impl MockAnalysisRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyses(&self) -> Vec<Analysis> {
        self.analyses.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisRepositoryTrait for MockAnalysisRepository {
    fn get_analysis(&self, analysis_id: &str) -> Result<Analysis> {
        self.analyses
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == analysis_id)
            .cloned()
            .ok_or_else(|| {
                Error::Database(DatabaseError::NotFound(format!("analysis {}", analysis_id)))
            })
    }

    fn list_for_subject(&self, subject: &AnalysisSubject, limit: i64) -> Result<Vec<Analysis>> {
        let mut list: Vec<Analysis> = self
            .analyses
            .lock()
            .unwrap()
            .iter()
            .filter(|a| &a.subject() == subject)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        list.truncate(limit.max(0) as usize);
        Ok(list)
    }

    async fn insert_analysis(&self, analysis: Analysis) -> Result<Analysis> {
        self.analyses.lock().unwrap().push(analysis.clone());
        Ok(analysis)
    }

    async fn expire_for_subject(
        &self,
        subject: &AnalysisSubject,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut expired = 0;
        for analysis in self.analyses.lock().unwrap().iter_mut() {
            if &analysis.subject() == subject && analysis.expires_at > now {
                analysis.expires_at = now;
                expired += 1;
            }
        }
        Ok(expired)
    }

    fn get_request(&self, request_id: &str) -> Result<AnalysisRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == request_id)
            .cloned()
            .ok_or_else(|| {
                Error::Database(DatabaseError::NotFound(format!("request {}", request_id)))
            })
    }

    fn list_requests(&self, requester_id: &str, limit: i64) -> Result<Vec<AnalysisRequest>> {
        let mut list: Vec<AnalysisRequest> = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.requester_id == requester_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list.truncate(limit.max(0) as usize);
        Ok(list)
    }

    async fn insert_request(&self, request: AnalysisRequest) -> Result<AnalysisRequest> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(request)
    }

    async fn update_request(&self, request: AnalysisRequest) -> Result<AnalysisRequest> {
        let mut requests = self.requests.lock().unwrap();
        let existing = requests
            .iter_mut()
            .find(|r| r.id == request.id)
            .ok_or_else(|| {
                Error::Database(DatabaseError::NotFound(format!("request {}", request.id)))
            })?;
        *existing = request.clone();
        Ok(request)
    }
}
