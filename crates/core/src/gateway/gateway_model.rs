use chrono::{DateTime, Utc};
use folioscope_market_data::{Quote, SearchResult};

use super::text_generation::{GeneratedText, TextGenerationRequest};

/// One call routed through the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayRequest {
    LatestQuote {
        symbol: String,
    },
    DailyHistory {
        symbol: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    SymbolSearch {
        query: String,
    },
    TextGeneration(TextGenerationRequest),
}

impl GatewayRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayRequest::LatestQuote { .. } => "latest_quote",
            GatewayRequest::DailyHistory { .. } => "daily_history",
            GatewayRequest::SymbolSearch { .. } => "symbol_search",
            GatewayRequest::TextGeneration(_) => "text_generation",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayResponse {
    Quote(Quote),
    History(Vec<Quote>),
    Search(Vec<SearchResult>),
    Text(GeneratedText),
}
