mod model;
mod repository;

pub use model::{OperationDB, PositionDB};
pub use repository::LedgerRepository;
