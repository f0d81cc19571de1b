//! Portfolio domain models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CURRENCY;
use crate::errors::{Error, Result, ValidationError};
use crate::metrics::PortfolioTotals;

const MAX_NAME_LEN: usize = 100;

/// Domain model representing a portfolio.
///
/// The total fields are a cache of the metrics aggregator's output and are
/// only written through `update_totals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub base_currency: String,
    pub total_value: Decimal,
    pub total_cost: Decimal,
    pub gain_loss: Decimal,
    pub gain_loss_percent: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Portfolio {
    pub fn totals(&self) -> PortfolioTotals {
        PortfolioTotals {
            total_value: self.total_value,
            total_cost: self.total_cost,
            gain_loss: self.gain_loss,
            gain_loss_percent: self.gain_loss_percent,
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(ValidationError::InvalidInput(
            "Portfolio name cannot be empty".to_string(),
        )));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(Error::Validation(ValidationError::InvalidInput(format!(
            "Portfolio name cannot exceed {} characters",
            MAX_NAME_LEN
        ))));
    }
    Ok(())
}

/// Input model for creating a new portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPortfolio {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_currency")]
    pub base_currency: String,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl NewPortfolio {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            owner_id: owner_id.into(),
            name: name.into(),
            description: None,
            base_currency: default_currency(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner_id.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "owner_id".to_string(),
            )));
        }
        validate_name(&self.name)?;
        let currency = self.base_currency.trim();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Invalid currency code '{}'",
                self.base_currency
            ))));
        }
        Ok(())
    }

    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.base_currency = self.base_currency.trim().to_uppercase();
        self
    }
}

/// Input model for updating a portfolio's descriptive fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioUpdate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl PortfolioUpdate {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Portfolio ID is required for updates".to_string(),
            )));
        }
        validate_name(&self.name)
    }
}
