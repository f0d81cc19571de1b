//! Database models for positions and operations.

use diesel::prelude::*;
use folioscope_core::ledger::Position;
use folioscope_core::operations::{Operation, OperationSide};

use crate::errors::StorageError;
use crate::utils::{
    format_decimal, format_timestamp, parse_decimal, parse_decimal_opt, parse_enum,
    parse_timestamp, parse_timestamp_opt,
};

/// One row per (portfolio, symbol). `version` increments on every commit.
#[derive(Queryable, Identifiable, Selectable, Insertable, AsChangeset, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::positions)]
#[diesel(primary_key(portfolio_id, symbol))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PositionDB {
    pub portfolio_id: String,
    pub symbol: String,
    pub currency: String,
    pub quantity: String,
    pub average_cost: String,
    pub cost_basis: String,
    pub last_price: Option<String>,
    pub version: i64,
    pub opened_at: Option<String>,
    pub last_operation_at: Option<String>,
}

impl TryFrom<PositionDB> for Position {
    type Error = StorageError;

    fn try_from(db: PositionDB) -> Result<Self, Self::Error> {
        Ok(Position {
            quantity: parse_decimal(&db.quantity)?,
            average_cost: parse_decimal(&db.average_cost)?,
            cost_basis: parse_decimal(&db.cost_basis)?,
            last_price: parse_decimal_opt(db.last_price.as_deref())?,
            opened_at: parse_timestamp_opt(db.opened_at.as_deref())?,
            last_operation_at: parse_timestamp_opt(db.last_operation_at.as_deref())?,
            portfolio_id: db.portfolio_id,
            symbol: db.symbol,
            currency: db.currency,
            version: db.version,
        })
    }
}

impl From<&Position> for PositionDB {
    fn from(position: &Position) -> Self {
        Self {
            portfolio_id: position.portfolio_id.clone(),
            symbol: position.symbol.clone(),
            currency: position.currency.clone(),
            quantity: format_decimal(&position.quantity),
            average_cost: format_decimal(&position.average_cost),
            cost_basis: format_decimal(&position.cost_basis),
            last_price: position.last_price.as_ref().map(format_decimal),
            version: position.version,
            opened_at: position.opened_at.as_ref().map(format_timestamp),
            last_operation_at: position.last_operation_at.as_ref().map(format_timestamp),
        }
    }
}

#[derive(Queryable, Identifiable, Selectable, Insertable, AsChangeset, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::operations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OperationDB {
    pub id: String,
    pub portfolio_id: String,
    pub symbol: String,
    pub side: String,
    pub quantity: String,
    pub price: String,
    pub fees: String,
    pub total_amount: String,
    pub realized_gain: Option<String>,
    pub executed_at: String,
    pub notes: Option<String>,
    pub created_at: String,
}

impl TryFrom<OperationDB> for Operation {
    type Error = StorageError;

    fn try_from(db: OperationDB) -> Result<Self, Self::Error> {
        Ok(Operation {
            side: parse_enum::<OperationSide>("side", &db.side)?,
            quantity: parse_decimal(&db.quantity)?,
            price: parse_decimal(&db.price)?,
            fees: parse_decimal(&db.fees)?,
            total_amount: parse_decimal(&db.total_amount)?,
            realized_gain: parse_decimal_opt(db.realized_gain.as_deref())?,
            executed_at: parse_timestamp(&db.executed_at)?,
            created_at: parse_timestamp(&db.created_at)?,
            id: db.id,
            portfolio_id: db.portfolio_id,
            symbol: db.symbol,
            notes: db.notes,
        })
    }
}

impl From<&Operation> for OperationDB {
    fn from(operation: &Operation) -> Self {
        Self {
            id: operation.id.clone(),
            portfolio_id: operation.portfolio_id.clone(),
            symbol: operation.symbol.clone(),
            side: operation.side.as_str().to_string(),
            quantity: format_decimal(&operation.quantity),
            price: format_decimal(&operation.price),
            fees: format_decimal(&operation.fees),
            total_amount: format_decimal(&operation.total_amount),
            realized_gain: operation.realized_gain.as_ref().map(format_decimal),
            executed_at: format_timestamp(&operation.executed_at),
            notes: operation.notes.clone(),
            created_at: format_timestamp(&operation.created_at),
        }
    }
}
