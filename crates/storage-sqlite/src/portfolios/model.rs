//! Database models for portfolios.

use diesel::prelude::*;
use folioscope_core::portfolios::Portfolio;

use crate::errors::StorageError;
use crate::utils::{format_decimal, format_timestamp, parse_decimal, parse_timestamp};

#[derive(Queryable, Identifiable, Selectable, Insertable, AsChangeset, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::portfolios)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PortfolioDB {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub base_currency: String,
    pub total_value: String,
    pub total_cost: String,
    pub gain_loss: String,
    pub gain_loss_percent: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<PortfolioDB> for Portfolio {
    type Error = StorageError;

    fn try_from(db: PortfolioDB) -> Result<Self, Self::Error> {
        Ok(Portfolio {
            total_value: parse_decimal(&db.total_value)?,
            total_cost: parse_decimal(&db.total_cost)?,
            gain_loss: parse_decimal(&db.gain_loss)?,
            gain_loss_percent: parse_decimal(&db.gain_loss_percent)?,
            created_at: parse_timestamp(&db.created_at)?,
            updated_at: parse_timestamp(&db.updated_at)?,
            id: db.id,
            owner_id: db.owner_id,
            name: db.name,
            description: db.description,
            base_currency: db.base_currency,
        })
    }
}

impl From<&Portfolio> for PortfolioDB {
    fn from(portfolio: &Portfolio) -> Self {
        Self {
            id: portfolio.id.clone(),
            owner_id: portfolio.owner_id.clone(),
            name: portfolio.name.clone(),
            description: portfolio.description.clone(),
            base_currency: portfolio.base_currency.clone(),
            total_value: format_decimal(&portfolio.total_value),
            total_cost: format_decimal(&portfolio.total_cost),
            gain_loss: format_decimal(&portfolio.gain_loss),
            gain_loss_percent: format_decimal(&portfolio.gain_loss_percent),
            created_at: format_timestamp(&portfolio.created_at),
            updated_at: format_timestamp(&portfolio.updated_at),
        }
    }
}
