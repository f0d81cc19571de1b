//! SQLite storage implementation for Folioscope.
//!
//! Implements the repository traits defined in `folioscope-core` with Diesel
//! over SQLite:
//! - Connection pooling, pragmas and embedded migrations
//! - A single writer actor that runs every write in an immediate transaction
//! - Repositories for portfolios, the position ledger, price history and
//!   analyses
//!
//! Diesel types never leave this crate; every public method returns
//! `folioscope_core::Result`.
//!
//! ```text
//! core (domain, traits)
//!        │
//!        ▼
//! storage-sqlite (this crate) ──► SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

// Repository implementations
pub mod analysis;
pub mod ledger;
pub mod market_data;
pub mod portfolios;

#[cfg(test)]
mod test_utils;

pub use db::{
    create_pool, get_connection, get_db_path, init, open, run_migrations, spawn_writer,
    DbConnection, DbPool, WriteHandle,
};

pub use errors::{IntoCore, StorageError};

pub use analysis::AnalysisRepository;
pub use ledger::LedgerRepository;
pub use market_data::PriceRepository;
pub use portfolios::PortfolioRepository;

// Re-export from folioscope-core for convenience
pub use folioscope_core::errors::{DatabaseError, Error, Result};
