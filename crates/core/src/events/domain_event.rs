//! Domain event types.

use serde::{Deserialize, Serialize};

/// Domain events emitted by core services after successful mutations.
///
/// These events represent facts about committed data changes. They are
/// emitted only after the storage write has succeeded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A position was created, changed or closed by an operation
    /// (insert, delete or replay).
    PositionChanged {
        portfolio_id: String,
        symbols: Vec<String>,
    },

    /// Descriptive fields of a portfolio changed (name, description, currency).
    PortfolioChanged { portfolio_id: String },

    /// A portfolio and everything under it was removed.
    PortfolioDeleted { portfolio_id: String },

    /// New price points were stored for these symbols.
    PricesUpdated { symbols: Vec<String> },
}

impl DomainEvent {
    /// Creates a PositionChanged event.
    pub fn position_changed(portfolio_id: impl Into<String>, symbols: Vec<String>) -> Self {
        Self::PositionChanged {
            portfolio_id: portfolio_id.into(),
            symbols,
        }
    }

    /// Creates a PortfolioChanged event.
    pub fn portfolio_changed(portfolio_id: impl Into<String>) -> Self {
        Self::PortfolioChanged {
            portfolio_id: portfolio_id.into(),
        }
    }

    /// Creates a PortfolioDeleted event.
    pub fn portfolio_deleted(portfolio_id: impl Into<String>) -> Self {
        Self::PortfolioDeleted {
            portfolio_id: portfolio_id.into(),
        }
    }

    /// Creates a PricesUpdated event.
    pub fn prices_updated(symbols: Vec<String>) -> Self {
        Self::PricesUpdated { symbols }
    }

    /// Portfolio whose derived state this event makes stale, if any.
    pub fn affected_portfolio(&self) -> Option<&str> {
        match self {
            Self::PositionChanged { portfolio_id, .. }
            | Self::PortfolioChanged { portfolio_id }
            | Self::PortfolioDeleted { portfolio_id } => Some(portfolio_id),
            Self::PricesUpdated { .. } => None,
        }
    }
}
