//! Market data provider abstractions and implementations.
//!
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capabilities and the quota each provider publishes
//! - Concrete providers (Alpha Vantage)

mod capabilities;
mod traits;

pub mod alpha_vantage;

pub use capabilities::{ProviderCapabilities, RateLimit};
pub use traits::MarketDataProvider;
