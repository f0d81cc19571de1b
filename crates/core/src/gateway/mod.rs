//! Rate-limited provider gateway.
//!
//! Every call to an external market data or text generation provider goes
//! through [`RateLimitedGateway`]: a token bucket (market data) or a
//! concurrency cap (text generation), a hard timeout, and bounded
//! exponential backoff for transient failures. Callers can abort an
//! in-flight call through a `CancellationToken`.

mod gateway_errors;
mod gateway_model;
mod rate_limited_gateway;
mod text_generation;

#[cfg(test)]
mod rate_limited_gateway_tests;

pub use gateway_errors::GatewayError;
pub use gateway_model::{GatewayRequest, GatewayResponse};
pub use rate_limited_gateway::RateLimitedGateway;
pub use text_generation::{
    GeneratedText, TextGenerationError, TextGenerationProvider, TextGenerationRequest,
};
