//! Domain events module.
//!
//! Provides domain event types and the sink trait for emitting events
//! after successful ledger and portfolio mutations. The analysis cache
//! subscribes through a sink to drop analyses made stale by a mutation.

mod domain_event;
mod sink;

pub use domain_event::*;
pub use sink::*;
