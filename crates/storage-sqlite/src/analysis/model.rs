//! Database models for analyses and analysis requests.

use diesel::prelude::*;
use folioscope_core::analysis::{
    Analysis, AnalysisRequest, AnalysisType, RequestStatus, SubjectType,
};
use folioscope_core::indicators::IndicatorSnapshot;

use crate::errors::StorageError;
use crate::utils::{format_timestamp, parse_enum, parse_timestamp};

/// Stored analysis. `indicators` holds the snapshot as JSON.
#[derive(Queryable, Identifiable, Selectable, Insertable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::analyses)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AnalysisDB {
    pub id: String,
    pub subject_type: String,
    pub subject_id: String,
    pub analysis_type: String,
    pub text: String,
    pub indicators: String,
    pub generated_at: String,
    pub expires_at: String,
    pub disclaimer: String,
    pub model: String,
    pub request_id: Option<String>,
}

impl TryFrom<AnalysisDB> for Analysis {
    type Error = StorageError;

    fn try_from(db: AnalysisDB) -> Result<Self, Self::Error> {
        let indicators: IndicatorSnapshot = serde_json::from_str(&db.indicators)
            .map_err(|e| StorageError::SerializationError(format!("indicators: {}", e)))?;
        Ok(Analysis {
            subject_type: parse_enum::<SubjectType>("subject_type", &db.subject_type)?,
            analysis_type: parse_enum::<AnalysisType>("analysis_type", &db.analysis_type)?,
            generated_at: parse_timestamp(&db.generated_at)?,
            expires_at: parse_timestamp(&db.expires_at)?,
            indicators,
            id: db.id,
            subject_id: db.subject_id,
            text: db.text,
            disclaimer: db.disclaimer,
            model: db.model,
            request_id: db.request_id,
        })
    }
}

impl TryFrom<&Analysis> for AnalysisDB {
    type Error = StorageError;

    fn try_from(analysis: &Analysis) -> Result<Self, Self::Error> {
        let indicators = serde_json::to_string(&analysis.indicators)
            .map_err(|e| StorageError::SerializationError(format!("indicators: {}", e)))?;
        Ok(Self {
            id: analysis.id.clone(),
            subject_type: analysis.subject_type.as_str().to_string(),
            subject_id: analysis.subject_id.clone(),
            analysis_type: analysis.analysis_type.as_str().to_string(),
            text: analysis.text.clone(),
            indicators,
            generated_at: format_timestamp(&analysis.generated_at),
            expires_at: format_timestamp(&analysis.expires_at),
            disclaimer: analysis.disclaimer.clone(),
            model: analysis.model.clone(),
            request_id: analysis.request_id.clone(),
        })
    }
}

#[derive(Queryable, Identifiable, Selectable, Insertable, AsChangeset, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::analysis_requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct AnalysisRequestDB {
    pub id: String,
    pub subject_type: String,
    pub subject_id: String,
    pub requester_id: String,
    pub status: String,
    pub error: Option<String>,
    pub analysis_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<AnalysisRequestDB> for AnalysisRequest {
    type Error = StorageError;

    fn try_from(db: AnalysisRequestDB) -> Result<Self, Self::Error> {
        Ok(AnalysisRequest {
            subject_type: parse_enum::<SubjectType>("subject_type", &db.subject_type)?,
            status: parse_enum::<RequestStatus>("status", &db.status)?,
            created_at: parse_timestamp(&db.created_at)?,
            updated_at: parse_timestamp(&db.updated_at)?,
            id: db.id,
            subject_id: db.subject_id,
            requester_id: db.requester_id,
            error: db.error,
            analysis_id: db.analysis_id,
        })
    }
}

impl From<&AnalysisRequest> for AnalysisRequestDB {
    fn from(request: &AnalysisRequest) -> Self {
        Self {
            id: request.id.clone(),
            subject_type: request.subject_type.as_str().to_string(),
            subject_id: request.subject_id.clone(),
            requester_id: request.requester_id.clone(),
            status: request.status.as_str().to_string(),
            error: request.error.clone(),
            analysis_id: request.analysis_id.clone(),
            created_at: format_timestamp(&request.created_at),
            updated_at: format_timestamp(&request.updated_at),
        }
    }
}
