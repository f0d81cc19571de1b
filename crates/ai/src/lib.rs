//! Folioscope AI - text generation providers using rig-core.
//!
//! Implements the core [`TextGenerationProvider`] trait so the rate-limited
//! gateway can prompt a language model for portfolio and asset analyses.
//!
//! # Architecture
//!
//! - `openai_generator`: OpenAI-backed generator built on a rig agent
//! - `fake_generator`: deterministic generator for tests and offline runs
//! - `error`: provider failure classification, mapped into the gateway's
//!   `TextGenerationError`
//!
//! # Example
//!
//! ```ignore
//! use folioscope_ai::OpenAiTextGenerator;
//!
//! let config = AppConfig::from_env();
//! let mut gateway = RateLimitedGateway::new(config.gateway.clone(), limiter);
//! if let Some(generator) = OpenAiTextGenerator::from_keys(&config.providers)? {
//!     gateway = gateway.with_text_provider(Arc::new(generator));
//! }
//! ```
//!
//! [`TextGenerationProvider`]: folioscope_core::gateway::TextGenerationProvider

pub mod error;
mod fake_generator;
mod openai_generator;

pub use error::AiError;
pub use fake_generator::{FakeTextGenerator, FAKE_MODEL, FAKE_PROVIDER_ID};
pub use openai_generator::{OpenAiTextGenerator, DEFAULT_OPENAI_MODEL, OPENAI_PROVIDER_ID};
