use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;

use folioscope_core::analysis::{
    Analysis, AnalysisRepositoryTrait, AnalysisRequest, AnalysisSubject,
};
use folioscope_core::errors::{DatabaseError, Error, Result};

use super::model::{AnalysisDB, AnalysisRequestDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{analyses, analysis_requests};
use crate::utils::format_timestamp;

pub struct AnalysisRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl AnalysisRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        AnalysisRepository { pool, writer }
    }
}

fn load_request(conn: &mut SqliteConnection, request_id: &str) -> Result<AnalysisRequest> {
    let row = analysis_requests::table
        .find(request_id)
        .select(AnalysisRequestDB::as_select())
        .first::<AnalysisRequestDB>(conn)
        .optional()
        .map_err(StorageError::from)?
        .ok_or_else(|| {
            Error::Database(DatabaseError::NotFound(format!(
                "Analysis request {} not found",
                request_id
            )))
        })?;
    Ok(AnalysisRequest::try_from(row)?)
}

#[async_trait]
impl AnalysisRepositoryTrait for AnalysisRepository {
    fn get_analysis(&self, analysis_id: &str) -> Result<Analysis> {
        let mut conn = get_connection(&self.pool)?;
        let row = analyses::table
            .find(analysis_id)
            .select(AnalysisDB::as_select())
            .first::<AnalysisDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .ok_or_else(|| {
                Error::Database(DatabaseError::NotFound(format!(
                    "Analysis {} not found",
                    analysis_id
                )))
            })?;
        Ok(Analysis::try_from(row)?)
    }

    fn list_for_subject(&self, subject: &AnalysisSubject, limit: i64) -> Result<Vec<Analysis>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = analyses::table
            .filter(analyses::subject_type.eq(subject.subject_type.as_str()))
            .filter(analyses::subject_id.eq(&subject.subject_id))
            .order((analyses::generated_at.desc(), analyses::id.desc()))
            .limit(limit)
            .select(AnalysisDB::as_select())
            .load::<AnalysisDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| Analysis::try_from(row).map_err(Error::from))
            .collect()
    }

    async fn insert_analysis(&self, analysis: Analysis) -> Result<Analysis> {
        let row = AnalysisDB::try_from(&analysis)?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(analyses::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await?;
        Ok(analysis)
    }

    async fn expire_for_subject(
        &self,
        subject: &AnalysisSubject,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let subject_type = subject.subject_type.as_str();
        let subject_id = subject.subject_id.clone();
        let now = format_timestamp(&now);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let expired = diesel::update(
                    analyses::table
                        .filter(analyses::subject_type.eq(subject_type))
                        .filter(analyses::subject_id.eq(&subject_id))
                        .filter(analyses::expires_at.gt(&now)),
                )
                .set(analyses::expires_at.eq(&now))
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(expired)
            })
            .await
    }

    fn get_request(&self, request_id: &str) -> Result<AnalysisRequest> {
        let mut conn = get_connection(&self.pool)?;
        load_request(&mut conn, request_id)
    }

    fn list_requests(&self, requester_id: &str, limit: i64) -> Result<Vec<AnalysisRequest>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = analysis_requests::table
            .filter(analysis_requests::requester_id.eq(requester_id))
            .order((
                analysis_requests::created_at.desc(),
                analysis_requests::id.desc(),
            ))
            .limit(limit)
            .select(AnalysisRequestDB::as_select())
            .load::<AnalysisRequestDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| AnalysisRequest::try_from(row).map_err(Error::from))
            .collect()
    }

    async fn insert_request(&self, request: AnalysisRequest) -> Result<AnalysisRequest> {
        let row = AnalysisRequestDB::from(&request);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(analysis_requests::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await?;
        Ok(request)
    }

    async fn update_request(&self, request: AnalysisRequest) -> Result<AnalysisRequest> {
        let row = AnalysisRequestDB::from(&request);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<AnalysisRequest> {
                let changed = diesel::update(analysis_requests::table.find(&row.id))
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if changed == 0 {
                    return Err(Error::Database(DatabaseError::NotFound(format!(
                        "Analysis request {} not found",
                        row.id
                    ))));
                }
                load_request(conn, &row.id)
            })
            .await
    }
}
