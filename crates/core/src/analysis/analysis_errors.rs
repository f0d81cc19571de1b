use thiserror::Error;

use super::analysis_model::RequestStatus;
use crate::errors::{DatabaseError, Error};
use crate::gateway::GatewayError;
use crate::indicators::IndicatorError;

/// Why an analysis could not be produced.
///
/// Cloneable so every caller sharing one in-flight generation receives the
/// same outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("{0}")]
    InsufficientData(#[from] IndicatorError),

    #[error("{0}")]
    Gateway(GatewayError),

    #[error("Generated analysis has no disclaimer attached")]
    MissingDisclaimer,

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Portfolio {0} has no open positions")]
    NoOpenPositions(String),

    #[error("Illegal request transition {from} -> {to}")]
    IllegalTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GatewayError> for AnalysisError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Cancelled => AnalysisError::Cancelled,
            other => AnalysisError::Gateway(other),
        }
    }
}

impl From<Error> for AnalysisError {
    fn from(err: Error) -> Self {
        match err {
            Error::Analysis(e) => e,
            Error::Gateway(e) => e.into(),
            Error::Indicator(e) => e.into(),
            Error::Database(DatabaseError::NotFound(what)) => AnalysisError::SubjectNotFound(what),
            other => AnalysisError::Storage(other.to_string()),
        }
    }
}
