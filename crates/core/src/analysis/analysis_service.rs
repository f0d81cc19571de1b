use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Duration;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::analysis_cache::AnalysisCache;
use super::analysis_errors::AnalysisError;
use super::analysis_model::{Analysis, AnalysisKey, AnalysisRequest, AnalysisSubject, SubjectType};
use super::analysis_traits::{AnalysisRepositoryTrait, AnalysisServiceTrait};
use super::portfolio_series::portfolio_value_series;
use super::prompt_builder::{asset_prompt, portfolio_prompt, SYSTEM_PROMPT};
use crate::config::AnalysisConfig;
use crate::constants::ANALYSIS_DISCLAIMER;
use crate::errors::{Result, ValidationError};
use crate::gateway::{GatewayError, RateLimitedGateway, TextGenerationRequest};
use crate::indicators::{process, process_closes, IndicatorSnapshot};
use crate::ledger::{Position, PositionRepositoryTrait};
use crate::market_data::{MarketDataServiceTrait, PriceSeries};
use crate::metrics::recompute;
use crate::portfolios::PortfolioRepositoryTrait;
use crate::utils::clock::Clock;
use crate::utils::decimal_utils::to_f64;

type GenerationResult = std::result::Result<Analysis, AnalysisError>;
type SharedGeneration = Shared<BoxFuture<'static, GenerationResult>>;

/// Waiter count and cancel switch of one generation. Shared with its
/// waiters so a flight superseded in the map still winds down when its last
/// caller leaves.
struct FlightHandle {
    waiters: AtomicUsize,
    cancel: CancellationToken,
}

struct InFlight {
    id: u64,
    /// Cache epoch of the key when the generation started.
    epoch: u64,
    generation: SharedGeneration,
    handle: Arc<FlightHandle>,
}

type InFlightMap = Arc<Mutex<HashMap<AnalysisKey, InFlight>>>;

fn lock_inflight(map: &InFlightMap) -> MutexGuard<'_, HashMap<AnalysisKey, InFlight>> {
    map.lock().unwrap_or_else(|p| p.into_inner())
}

/// One caller's registration on an in-flight generation. When the last
/// registration drops, the generation is cancelled (a no-op once it has
/// finished) and forgotten.
struct Waiter {
    key: AnalysisKey,
    id: u64,
    handle: Arc<FlightHandle>,
    inflight: InFlightMap,
}

impl Drop for Waiter {
    fn drop(&mut self) {
        let mut map = lock_inflight(&self.inflight);
        if self.handle.waiters.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }
        self.handle.cancel.cancel();
        if map.get(&self.key).is_some_and(|flight| flight.id == self.id) {
            map.remove(&self.key);
        }
    }
}

/// Everything a generation task needs, shared with the spawned task.
struct AnalysisGenerator {
    repository: Arc<dyn AnalysisRepositoryTrait>,
    portfolio_repository: Arc<dyn PortfolioRepositoryTrait>,
    position_repository: Arc<dyn PositionRepositoryTrait>,
    market_data: Arc<dyn MarketDataServiceTrait>,
    gateway: Arc<RateLimitedGateway>,
    cache: Arc<AnalysisCache>,
    clock: Arc<dyn Clock>,
    config: AnalysisConfig,
}

impl AnalysisGenerator {
    fn ttl_for(&self, subject_type: SubjectType) -> Duration {
        let ttl = match subject_type {
            SubjectType::Portfolio => self.config.portfolio_ttl,
            SubjectType::Asset => self.config.asset_ttl,
        };
        Duration::from_std(ttl).unwrap_or_else(|_| Duration::hours(1))
    }

    /// Runs one generation end to end and tracks it as a request.
    async fn generate(
        &self,
        key: AnalysisKey,
        requester_id: String,
        cancel: CancellationToken,
        epoch: u64,
    ) -> GenerationResult {
        let mut request = AnalysisRequest::new(&key.subject, &requester_id, self.clock.now());
        self.repository.insert_request(request.clone()).await?;
        request.start(self.clock.now())?;
        self.repository.update_request(request.clone()).await?;
        info!(
            "Generating {} analysis for {} (request {})",
            key.analysis_type.as_str(),
            key.subject,
            request.id
        );

        match self.produce(&key, &request.id, &cancel).await {
            Ok(analysis) => {
                request.complete(&analysis.id, self.clock.now())?;
                self.repository.update_request(request).await?;

                let ttl = self.ttl_for(key.subject.subject_type);
                if self.cache.put_if_epoch(key.clone(), analysis.clone(), ttl, epoch) {
                    info!("Cached analysis {} for {}", analysis.id, key.subject);
                } else {
                    debug!(
                        "{} was invalidated during generation; result not cached",
                        key.subject
                    );
                }
                Ok(analysis)
            }
            Err(err) => {
                error!("Analysis of {} failed: {}", key.subject, err);
                request.fail(err.to_string(), self.clock.now())?;
                if let Err(e) = self.repository.update_request(request).await {
                    warn!("Could not record failed analysis request: {}", e);
                }
                Err(err)
            }
        }
    }

    /// Indicators, prompt, text generation and persistence.
    async fn produce(
        &self,
        key: &AnalysisKey,
        request_id: &str,
        cancel: &CancellationToken,
    ) -> GenerationResult {
        let subject_id = &key.subject.subject_id;
        let (indicators, prompt) = match key.subject.subject_type {
            SubjectType::Portfolio => self.portfolio_context(subject_id, cancel).await?,
            SubjectType::Asset => self.asset_context(subject_id, cancel).await?,
        };

        let request = TextGenerationRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            prompt,
            max_tokens: self.config.max_tokens,
        };
        let generated = self.gateway.generate_text(&request, cancel).await?;
        let text = generated.text.trim();
        if text.is_empty() {
            return Err(GatewayError::Provider {
                provider: generated.model,
                message: "empty completion".to_string(),
                transient: false,
            }
            .into());
        }

        let generated_at = self.clock.now();
        let analysis = Analysis {
            id: Uuid::new_v4().to_string(),
            subject_type: key.subject.subject_type,
            subject_id: subject_id.clone(),
            analysis_type: key.analysis_type,
            text: text.to_string(),
            indicators,
            generated_at,
            expires_at: generated_at + self.ttl_for(key.subject.subject_type),
            disclaimer: ANALYSIS_DISCLAIMER.to_string(),
            model: generated.model.clone(),
            request_id: Some(request_id.to_string()),
        }
        .checked()?;

        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        Ok(self.repository.insert_analysis(analysis).await?)
    }

    /// Stored history for the analysis window, synced first when short.
    async fn history(&self, symbol: &str, cancel: &CancellationToken) -> Result<PriceSeries> {
        self.market_data.ensure_history(symbol, cancel).await?;
        self.market_data
            .get_price_series(symbol, i64::from(self.config.history_days))
    }

    async fn asset_context(
        &self,
        symbol: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<(IndicatorSnapshot, String), AnalysisError> {
        let series = self.history(symbol, cancel).await?;
        let snapshot = process(&series)?;
        let prompt = asset_prompt(symbol, &snapshot);
        Ok((snapshot, prompt))
    }

    async fn portfolio_context(
        &self,
        portfolio_id: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<(IndicatorSnapshot, String), AnalysisError> {
        let portfolio = self.portfolio_repository.get_by_id(portfolio_id)?;
        let positions: Vec<Position> = self
            .position_repository
            .list_positions(portfolio_id)?
            .into_iter()
            .filter(|p| p.is_open())
            .collect();
        if positions.is_empty() {
            return Err(AnalysisError::NoOpenPositions(portfolio_id.to_string()));
        }

        let mut histories = Vec::with_capacity(positions.len());
        for position in &positions {
            histories.push(self.history(&position.symbol, cancel).await?);
        }

        let holdings: Vec<(Decimal, &PriceSeries)> = positions
            .iter()
            .zip(&histories)
            .map(|(position, series)| (position.quantity, series))
            .collect();
        let values: Vec<f64> = portfolio_value_series(&holdings)
            .into_iter()
            .map(|(_, value)| to_f64(value))
            .collect();
        debug!(
            "Portfolio {} value series has {} common dates across {} holdings",
            portfolio_id,
            values.len(),
            positions.len()
        );
        let snapshot = process_closes(&values)?;

        let prices: HashMap<String, Decimal> = histories
            .iter()
            .filter_map(|series| series.last().map(|p| (series.symbol.clone(), p.close)))
            .collect();
        let metrics = recompute(&portfolio, &positions, &prices);
        let prompt = portfolio_prompt(
            &portfolio,
            &metrics,
            &snapshot,
            self.config.max_prompt_positions,
        );
        Ok((snapshot, prompt))
    }
}

/// Cache-first analysis orchestrator.
pub struct AnalysisService {
    generator: Arc<AnalysisGenerator>,
    inflight: InFlightMap,
    next_flight: AtomicU64,
}

impl AnalysisService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<dyn AnalysisRepositoryTrait>,
        portfolio_repository: Arc<dyn PortfolioRepositoryTrait>,
        position_repository: Arc<dyn PositionRepositoryTrait>,
        market_data: Arc<dyn MarketDataServiceTrait>,
        gateway: Arc<RateLimitedGateway>,
        cache: Arc<AnalysisCache>,
        clock: Arc<dyn Clock>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            generator: Arc::new(AnalysisGenerator {
                repository,
                portfolio_repository,
                position_repository,
                market_data,
                gateway,
                cache,
                clock,
                config,
            }),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_flight: AtomicU64::new(1),
        }
    }

    fn normalize_subject(subject: &AnalysisSubject) -> Result<AnalysisSubject> {
        let normalized = match subject.subject_type {
            SubjectType::Portfolio => AnalysisSubject::portfolio(subject.subject_id.trim()),
            SubjectType::Asset => AnalysisSubject::asset(&subject.subject_id),
        };
        if normalized.subject_id.is_empty() {
            return Err(ValidationError::MissingField("subject_id".to_string()).into());
        }
        Ok(normalized)
    }

    /// Joins the generation running for `key`, or spawns one. A generation
    /// that started before the key was last invalidated is not joined: it
    /// works from stale state, so a fresh one replaces it in the map.
    fn join_or_start(&self, key: &AnalysisKey, requester_id: &str) -> (SharedGeneration, Waiter) {
        let mut map = lock_inflight(&self.inflight);
        let epoch = self.generator.cache.epoch(key);
        if let Some(flight) = map.get(key).filter(|flight| flight.epoch == epoch) {
            flight.handle.waiters.fetch_add(1, Ordering::SeqCst);
            debug!("Joining in-flight analysis of {}", key.subject);
            let waiter = Waiter {
                key: key.clone(),
                id: flight.id,
                handle: flight.handle.clone(),
                inflight: self.inflight.clone(),
            };
            return (flight.generation.clone(), waiter);
        }
        if map.contains_key(key) {
            debug!(
                "{} changed since its in-flight analysis started; generating again",
                key.subject
            );
        }

        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(FlightHandle {
            waiters: AtomicUsize::new(1),
            cancel: CancellationToken::new(),
        });

        let generator = self.generator.clone();
        let task_key = key.clone();
        let requester = requester_id.to_string();
        let task_cancel = handle.cancel.clone();
        let task = tokio::spawn(async move {
            generator
                .generate(task_key, requester, task_cancel, epoch)
                .await
        });
        let generation = async move {
            task.await.unwrap_or_else(|e| {
                Err(AnalysisError::Internal(format!("generation task failed: {}", e)))
            })
        }
        .boxed()
        .shared();

        map.insert(
            key.clone(),
            InFlight {
                id,
                epoch,
                generation: generation.clone(),
                handle: handle.clone(),
            },
        );
        let waiter = Waiter {
            key: key.clone(),
            id,
            handle,
            inflight: self.inflight.clone(),
        };
        (generation, waiter)
    }
}

#[async_trait]
impl AnalysisServiceTrait for AnalysisService {
    async fn get_or_generate_analysis(
        &self,
        subject: &AnalysisSubject,
        force_regenerate: bool,
        requester_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Analysis> {
        let subject = Self::normalize_subject(subject)?;
        let key = AnalysisKey::for_subject(&subject);

        if !force_regenerate {
            if let Some(hit) = self.generator.cache.get(&key) {
                debug!("Analysis cache hit for {}", subject);
                return Ok(hit.checked()?);
            }
        }

        let (generation, _waiter) = self.join_or_start(&key, requester_id);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
            result = generation => result,
        };
        Ok(outcome?.checked()?)
    }

    fn get_analysis_history(&self, subject: &AnalysisSubject, limit: i64) -> Result<Vec<Analysis>> {
        let subject = Self::normalize_subject(subject)?;
        Ok(self
            .generator
            .repository
            .list_for_subject(&subject, limit)?
            .into_iter()
            .filter(Analysis::has_disclaimer)
            .collect())
    }

    async fn invalidate_analysis(&self, subject: &AnalysisSubject) -> Result<usize> {
        let subject = Self::normalize_subject(subject)?;
        let removed = self.generator.cache.invalidate_subject(&subject);
        let expired = self
            .generator
            .repository
            .expire_for_subject(&subject, self.generator.clock.now())
            .await?;
        info!(
            "Invalidated analysis of {} ({} cached, {} stored)",
            subject, removed, expired
        );
        Ok(expired)
    }

    fn get_request(&self, request_id: &str) -> Result<AnalysisRequest> {
        self.generator.repository.get_request(request_id)
    }

    fn list_requests(&self, requester_id: &str, limit: i64) -> Result<Vec<AnalysisRequest>> {
        self.generator.repository.list_requests(requester_id, limit)
    }

    fn sweep_expired(&self) -> usize {
        let removed = self.generator.cache.sweep_expired();
        if removed > 0 {
            debug!("Swept {} expired analyses from the cache", removed);
        }
        removed
    }
}
