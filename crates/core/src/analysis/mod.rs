//! Cached natural-language analyses of portfolios and assets.
//!
//! A request goes cache first; on a miss the orchestrator computes
//! indicators over the subject's price history, asks the text generation
//! provider (through the rate-limited gateway) for an analysis, stores it in
//! the history and caches it for the subject's TTL. Concurrent requests for
//! the same subject share one generation. Ledger mutations invalidate the
//! cached portfolio analysis through [`AnalysisCacheInvalidator`].

mod analysis_cache;
mod analysis_errors;
mod analysis_model;
mod analysis_service;
mod analysis_traits;
mod portfolio_series;
mod prompt_builder;


pub use analysis_cache::{AnalysisCache, AnalysisCacheInvalidator, TtlCache};
pub use analysis_errors::AnalysisError;
pub use analysis_model::{
    Analysis, AnalysisKey, AnalysisRequest, AnalysisSubject, AnalysisType, RequestStatus,
    SubjectType,
};
pub use analysis_service::AnalysisService;
pub use analysis_traits::{AnalysisRepositoryTrait, AnalysisServiceTrait};
pub use portfolio_series::portfolio_value_series;
pub use prompt_builder::{asset_prompt, portfolio_prompt, SYSTEM_PROMPT};
