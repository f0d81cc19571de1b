//! SQLite storage implementation for market data.

mod model;
mod repository;

pub use model::PricePointDB;
pub use repository::PriceRepository;
