use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::analysis_model::{Analysis, AnalysisRequest, AnalysisSubject};
use crate::errors::Result;

/// Persistence for generated analyses and their requests.
#[async_trait]
pub trait AnalysisRepositoryTrait: Send + Sync {
    fn get_analysis(&self, analysis_id: &str) -> Result<Analysis>;

    /// Analyses of `subject`, newest first.
    fn list_for_subject(&self, subject: &AnalysisSubject, limit: i64) -> Result<Vec<Analysis>>;

    async fn insert_analysis(&self, analysis: Analysis) -> Result<Analysis>;

    /// Sets `expires_at = now` on every unexpired analysis of `subject`.
    async fn expire_for_subject(
        &self,
        subject: &AnalysisSubject,
        now: DateTime<Utc>,
    ) -> Result<usize>;

    fn get_request(&self, request_id: &str) -> Result<AnalysisRequest>;

    /// Requests made by `requester_id`, newest first.
    fn list_requests(&self, requester_id: &str, limit: i64) -> Result<Vec<AnalysisRequest>>;

    async fn insert_request(&self, request: AnalysisRequest) -> Result<AnalysisRequest>;

    async fn update_request(&self, request: AnalysisRequest) -> Result<AnalysisRequest>;
}

#[async_trait]
pub trait AnalysisServiceTrait: Send + Sync {
    /// Cached analysis of `subject`, generating one on a miss (or always,
    /// with `force_regenerate`). Concurrent calls for the same subject share
    /// one generation.
    async fn get_or_generate_analysis(
        &self,
        subject: &AnalysisSubject,
        force_regenerate: bool,
        requester_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Analysis>;

    fn get_analysis_history(&self, subject: &AnalysisSubject, limit: i64) -> Result<Vec<Analysis>>;

    /// Drops the cached analysis and expires stored ones. Returns how many
    /// stored analyses were expired.
    async fn invalidate_analysis(&self, subject: &AnalysisSubject) -> Result<usize>;

    fn get_request(&self, request_id: &str) -> Result<AnalysisRequest>;

    fn list_requests(&self, requester_id: &str, limit: i64) -> Result<Vec<AnalysisRequest>>;

    /// Removes expired cache entries. Returns how many were removed.
    fn sweep_expired(&self) -> usize;
}
