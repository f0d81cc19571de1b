//! Market data models
//!
//! - `types` - type aliases for identifiers (ProviderId)
//! - `quote` - OHLCV observation returned by providers (Quote)
//! - `search` - symbol lookup results (SearchResult)

mod quote;
mod search;
mod types;

pub use quote::Quote;
pub use search::SearchResult;
pub use types::ProviderId;
