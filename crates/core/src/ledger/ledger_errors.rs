use rust_decimal::Decimal;
use thiserror::Error;

use crate::errors::ValidationError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(ValidationError),

    #[error("Insufficient quantity of {symbol}: requested {requested}, available {available}")]
    InsufficientQuantity {
        symbol: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Position {portfolio_id}/{symbol} changed concurrently (expected version {expected_version})")]
    Conflict {
        portfolio_id: String,
        symbol: String,
        expected_version: i64,
    },
}

impl LedgerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        LedgerError::Validation(ValidationError::InvalidInput(message.into()))
    }
}
