use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis_errors::AnalysisError;
use crate::indicators::IndicatorSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Portfolio,
    Asset,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::Portfolio => "portfolio",
            SubjectType::Asset => "asset",
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "portfolio" => Ok(SubjectType::Portfolio),
            "asset" => Ok(SubjectType::Asset),
            _ => Err(format!("Unknown subject type: {}", s)),
        }
    }
}

/// What an analysis is about: a portfolio id or an asset symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSubject {
    pub subject_type: SubjectType,
    pub subject_id: String,
}

impl AnalysisSubject {
    pub fn portfolio(portfolio_id: impl Into<String>) -> Self {
        Self {
            subject_type: SubjectType::Portfolio,
            subject_id: portfolio_id.into(),
        }
    }

    /// Asset subjects are keyed by upper-case symbol.
    pub fn asset(symbol: &str) -> Self {
        Self {
            subject_type: SubjectType::Asset,
            subject_id: symbol.trim().to_uppercase(),
        }
    }

    pub fn analysis_type(&self) -> AnalysisType {
        match self.subject_type {
            SubjectType::Portfolio => AnalysisType::PortfolioOverview,
            SubjectType::Asset => AnalysisType::AssetTechnical,
        }
    }
}

impl fmt::Display for AnalysisSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.subject_type, self.subject_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    PortfolioOverview,
    AssetTechnical,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 2] = [AnalysisType::PortfolioOverview, AnalysisType::AssetTechnical];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::PortfolioOverview => "portfolio_overview",
            AnalysisType::AssetTechnical => "asset_technical",
        }
    }
}

impl FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "portfolio_overview" => Ok(AnalysisType::PortfolioOverview),
            "asset_technical" => Ok(AnalysisType::AssetTechnical),
            _ => Err(format!("Unknown analysis type: {}", s)),
        }
    }
}

/// Cache key of an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnalysisKey {
    pub subject: AnalysisSubject,
    pub analysis_type: AnalysisType,
}

impl AnalysisKey {
    pub fn for_subject(subject: &AnalysisSubject) -> Self {
        Self {
            subject: subject.clone(),
            analysis_type: subject.analysis_type(),
        }
    }
}

/// Generated natural-language analysis of one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: String,
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub analysis_type: AnalysisType,
    pub text: String,
    pub indicators: IndicatorSnapshot,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub disclaimer: String,
    pub model: String,
    pub request_id: Option<String>,
}

impl Analysis {
    pub fn subject(&self) -> AnalysisSubject {
        AnalysisSubject {
            subject_type: self.subject_type,
            subject_id: self.subject_id.clone(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn has_disclaimer(&self) -> bool {
        !self.disclaimer.trim().is_empty()
    }

    /// The analysis itself, or `MissingDisclaimer`.
    pub fn checked(self) -> Result<Self, AnalysisError> {
        if self.has_disclaimer() {
            Ok(self)
        } else {
            Err(AnalysisError::MissingDisclaimer)
        }
    }
}

/// Lifecycle of a generation request.
///
/// `Pending -> Processing -> Completed | Failed`; nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Processing => "PROCESSING",
            RequestStatus::Completed => "COMPLETED",
            RequestStatus::Failed => "FAILED",
        }
    }

    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Processing)
                | (RequestStatus::Processing, RequestStatus::Completed)
                | (RequestStatus::Processing, RequestStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(RequestStatus::Pending),
            "PROCESSING" => Ok(RequestStatus::Processing),
            "COMPLETED" => Ok(RequestStatus::Completed),
            "FAILED" => Ok(RequestStatus::Failed),
            _ => Err(format!("Unknown request status: {}", s)),
        }
    }
}

/// One attempt to generate an analysis, tracked per requester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub id: String,
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub requester_id: String,
    pub status: RequestStatus,
    pub error: Option<String>,
    pub analysis_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisRequest {
    pub fn new(subject: &AnalysisSubject, requester_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject_type: subject.subject_type,
            subject_id: subject.subject_id.clone(),
            requester_id: requester_id.to_string(),
            status: RequestStatus::Pending,
            error: None,
            analysis_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: RequestStatus, now: DateTime<Utc>) -> Result<(), AnalysisError> {
        if !self.status.can_transition_to(next) {
            return Err(AnalysisError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), AnalysisError> {
        self.transition(RequestStatus::Processing, now)
    }

    pub fn complete(&mut self, analysis_id: &str, now: DateTime<Utc>) -> Result<(), AnalysisError> {
        self.transition(RequestStatus::Completed, now)?;
        self.analysis_id = Some(analysis_id.to_string());
        Ok(())
    }

    pub fn fail(&mut self, detail: impl Into<String>, now: DateTime<Utc>) -> Result<(), AnalysisError> {
        self.transition(RequestStatus::Failed, now)?;
        self.error = Some(detail.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_request_lifecycle() {
        let mut request = AnalysisRequest::new(&AnalysisSubject::asset(" aapl "), "u1", now());
        assert_eq!(request.subject_id, "AAPL");
        assert_eq!(request.status, RequestStatus::Pending);

        request.start(now()).unwrap();
        request.complete("a1", now()).unwrap();
        assert_eq!(request.status, RequestStatus::Completed);
        assert_eq!(request.analysis_id.as_deref(), Some("a1"));
    }

    #[test]
    fn test_illegal_transitions_are_rejected() {
        let mut request = AnalysisRequest::new(&AnalysisSubject::portfolio("p1"), "u1", now());
        assert_eq!(
            request.complete("a1", now()),
            Err(AnalysisError::IllegalTransition {
                from: RequestStatus::Pending,
                to: RequestStatus::Completed,
            })
        );

        request.start(now()).unwrap();
        request.fail("provider down", now()).unwrap();
        assert!(request.status.is_terminal());
        assert!(request.start(now()).is_err());
        assert!(request.fail("again", now()).is_err());
        assert_eq!(request.error.as_deref(), Some("provider down"));
    }

    #[test]
    fn test_subject_maps_to_analysis_type() {
        assert_eq!(
            AnalysisSubject::portfolio("p1").analysis_type(),
            AnalysisType::PortfolioOverview
        );
        assert_eq!(
            AnalysisSubject::asset("msft").analysis_type(),
            AnalysisType::AssetTechnical
        );
        assert_eq!("Asset".parse::<SubjectType>(), Ok(SubjectType::Asset));
        assert_eq!(
            "asset_technical".parse::<AnalysisType>(),
            Ok(AnalysisType::AssetTechnical)
        );
    }
}
