use folioscope_market_data::{MarketDataError, RetryClass};
use thiserror::Error;

use super::text_generation::TextGenerationError;

/// Failure of a gateway call after the retry policy has run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// `upstream` is false when the local limiter refused the call.
    #[error("Rate limited by {provider}")]
    RateLimited { provider: String, upstream: bool },

    #[error("Call to {provider} timed out")]
    Timeout { provider: String },

    #[error("Provider {provider} failed: {message}")]
    Provider {
        provider: String,
        message: String,
        transient: bool,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Call cancelled by caller")]
    Cancelled,

    #[error("No {0} provider configured")]
    NotConfigured(String),

    #[error("Operation '{operation}' not supported by {provider}")]
    Unsupported { provider: String, operation: String },
}

impl GatewayError {
    /// Whether another attempt may succeed.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            GatewayError::RateLimited { upstream, .. } if *upstream => RetryClass::WithBackoff,
            GatewayError::Timeout { .. } => RetryClass::WithBackoff,
            GatewayError::Provider { transient, .. } if *transient => RetryClass::WithBackoff,
            _ => RetryClass::Never,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GatewayError::RateLimited { .. })
    }

    pub(crate) fn from_text(provider: &str, err: TextGenerationError) -> Self {
        let provider = provider.to_string();
        match err {
            TextGenerationError::Transient(message) => GatewayError::Provider {
                provider,
                message,
                transient: true,
            },
            TextGenerationError::Rejected(message) => GatewayError::Provider {
                provider,
                message,
                transient: false,
            },
            TextGenerationError::Timeout => GatewayError::Timeout { provider },
            TextGenerationError::RateLimited => GatewayError::RateLimited {
                provider,
                upstream: true,
            },
            TextGenerationError::NotConfigured(_) => {
                GatewayError::NotConfigured("text generation".to_string())
            }
        }
    }
}

impl From<MarketDataError> for GatewayError {
    fn from(err: MarketDataError) -> Self {
        match err {
            MarketDataError::SymbolNotFound(symbol) => {
                GatewayError::NotFound(format!("symbol {}", symbol))
            }
            MarketDataError::NoDataForRange => {
                GatewayError::NotFound("no quotes in the requested range".to_string())
            }
            MarketDataError::RateLimited { provider } => GatewayError::RateLimited {
                provider,
                upstream: true,
            },
            MarketDataError::Timeout { provider } => GatewayError::Timeout { provider },
            MarketDataError::ServiceUnavailable { provider, status } => GatewayError::Provider {
                provider,
                message: format!("HTTP {}", status),
                transient: true,
            },
            MarketDataError::Network { provider, message } => GatewayError::Provider {
                provider,
                message,
                transient: true,
            },
            MarketDataError::ProviderError { provider, message } => GatewayError::Provider {
                provider,
                message,
                transient: false,
            },
            MarketDataError::NotSupported {
                operation,
                provider,
            } => GatewayError::Unsupported {
                provider,
                operation,
            },
        }
    }
}
