//! Runtime configuration.
//!
//! One explicit struct passed into constructors. `Default` holds the
//! production constants; `from_env` overlays `FOLIOSCOPE_*` variables.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::errors::{Error, Result};

const ENV_PREFIX: &str = "FOLIOSCOPE_";

/// Exponential backoff for transient provider failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based: the wait after the first
    /// failure is `base_delay`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self.factor.saturating_pow(exponent);
        self.base_delay.saturating_mul(multiplier)
    }

    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            factor: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// How many times a version conflict is retried by re-reading the position.
    pub max_conflict_retries: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub requests_per_minute: u32,
    pub requests_per_day: Option<u32>,
    /// Longest a caller blocks on an exhausted bucket before `RateLimited`.
    pub max_wait: Duration,
    pub text_max_concurrency: usize,
    pub market_data_timeout: Duration,
    pub text_generation_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 5,
            requests_per_day: Some(500),
            max_wait: Duration::from_secs(20),
            text_max_concurrency: 2,
            market_data_timeout: Duration::from_secs(10),
            text_generation_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub portfolio_ttl: Duration,
    pub asset_ttl: Duration,
    /// Calendar days of price history fed to the indicator processor.
    pub history_days: u32,
    /// Positions listed in a portfolio prompt, by descending weight.
    pub max_prompt_positions: usize,
    pub max_tokens: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            portfolio_ttl: Duration::from_secs(3600),
            asset_ttl: Duration::from_secs(3600),
            history_days: 100,
            max_prompt_positions: 10,
            max_tokens: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketDataConfig {
    /// Window requested from the provider on a history sync.
    pub history_days: u32,
    /// Stored points older than this are pruned.
    pub retention_days: u32,
    /// Below this many stored points an asset series is refreshed first.
    pub min_points: usize,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            history_days: 100,
            retention_days: 730,
            min_points: 15,
        }
    }
}

/// Provider credentials. Absent keys leave the provider unconfigured.
#[derive(Clone, Default, PartialEq)]
pub struct ProviderKeys {
    pub alpha_vantage_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
}

impl std::fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |k: &Option<String>| k.as_ref().map(|_| "***");
        f.debug_struct("ProviderKeys")
            .field("alpha_vantage_api_key", &mask(&self.alpha_vantage_api_key))
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("openai_model", &self.openai_model)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub gateway: GatewayConfig,
    pub analysis: AnalysisConfig,
    pub market_data: MarketDataConfig,
    pub providers: ProviderKeys,
}

impl AppConfig {
    /// Reads `FOLIOSCOPE_*` variables after loading a `.env` file if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings from a dotenv-formatted file only.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            Error::InvalidConfigValue(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut vars = HashMap::new();
        for item in iter {
            let (key, value) =
                item.map_err(|e| Error::InvalidConfigValue(format!("malformed line: {}", e)))?;
            vars.insert(key, value);
        }
        Ok(Self::from_lookup(|key| vars.get(key).cloned()))
    }

    /// Builds a config from an arbitrary key lookup, keeping defaults for
    /// absent or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let mut config = Self::default();

        let ledger = &mut config.ledger;
        env.read("LEDGER_MAX_CONFLICT_RETRIES", &mut ledger.max_conflict_retries);

        let gateway = &mut config.gateway;
        env.read("RATE_LIMIT_PER_MINUTE", &mut gateway.requests_per_minute);
        if let Some(daily) = env.parse::<u32>("RATE_LIMIT_PER_DAY") {
            gateway.requests_per_day = (daily > 0).then_some(daily);
        }
        env.read_secs("RATE_LIMIT_MAX_WAIT_SECS", &mut gateway.max_wait);
        env.read("TEXT_MAX_CONCURRENCY", &mut gateway.text_max_concurrency);
        env.read_secs("MARKET_DATA_TIMEOUT_SECS", &mut gateway.market_data_timeout);
        env.read_secs("TEXT_TIMEOUT_SECS", &mut gateway.text_generation_timeout);
        env.read("RETRY_MAX_ATTEMPTS", &mut gateway.retry.max_attempts);
        env.read_millis("RETRY_BASE_DELAY_MS", &mut gateway.retry.base_delay);
        env.read("RETRY_FACTOR", &mut gateway.retry.factor);

        let analysis = &mut config.analysis;
        env.read_secs("ANALYSIS_PORTFOLIO_TTL_SECS", &mut analysis.portfolio_ttl);
        env.read_secs("ANALYSIS_ASSET_TTL_SECS", &mut analysis.asset_ttl);
        env.read("ANALYSIS_HISTORY_DAYS", &mut analysis.history_days);
        env.read("ANALYSIS_MAX_PROMPT_POSITIONS", &mut analysis.max_prompt_positions);
        env.read("ANALYSIS_MAX_TOKENS", &mut analysis.max_tokens);

        let market_data = &mut config.market_data;
        env.read("MARKET_DATA_HISTORY_DAYS", &mut market_data.history_days);
        env.read("MARKET_DATA_RETENTION_DAYS", &mut market_data.retention_days);
        env.read("MARKET_DATA_MIN_POINTS", &mut market_data.min_points);

        config.providers = ProviderKeys {
            alpha_vantage_api_key: env.string("ALPHA_VANTAGE_API_KEY"),
            openai_api_key: env.string("OPENAI_API_KEY"),
            openai_model: env.string("OPENAI_MODEL"),
        };

        if config.gateway.retry.max_attempts == 0 {
            warn!("{}RETRY_MAX_ATTEMPTS must be at least 1, using 1", ENV_PREFIX);
            config.gateway.retry.max_attempts = 1;
        }
        if config.gateway.text_max_concurrency == 0 {
            warn!("{}TEXT_MAX_CONCURRENCY must be at least 1, using 1", ENV_PREFIX);
            config.gateway.text_max_concurrency = 1;
        }

        config
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{}{}", ENV_PREFIX, name))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.string(name)?;
        match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(
                    "Ignoring unparsable value '{}' for {}{}, keeping default",
                    raw, ENV_PREFIX, name
                );
                None
            }
        }
    }

    fn read<T: FromStr>(&self, name: &str, target: &mut T) {
        if let Some(value) = self.parse(name) {
            *target = value;
        }
    }

    fn read_secs(&self, name: &str, target: &mut Duration) {
        if let Some(secs) = self.parse::<u64>(name) {
            *target = Duration::from_secs(secs);
        }
    }

    fn read_millis(&self, name: &str, target: &mut Duration) {
        if let Some(ms) = self.parse::<u64>(name) {
            *target = Duration::from_millis(ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.gateway.requests_per_minute, 5);
        assert_eq!(config.gateway.requests_per_day, Some(500));
        assert_eq!(config.gateway.market_data_timeout, Duration::from_secs(10));
        assert_eq!(config.gateway.text_generation_timeout, Duration::from_secs(60));
        assert_eq!(config.analysis.portfolio_ttl, Duration::from_secs(3600));
        assert_eq!(config.analysis.asset_ttl, Duration::from_secs(3600));
        assert_eq!(config.ledger.max_conflict_retries, 1);
    }

    #[test]
    fn test_retry_policy_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn test_from_lookup_overrides_and_ignores_garbage() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("FOLIOSCOPE_RATE_LIMIT_PER_MINUTE", "75"),
            ("FOLIOSCOPE_RATE_LIMIT_PER_DAY", "0"),
            ("FOLIOSCOPE_ANALYSIS_ASSET_TTL_SECS", "soon"),
            ("FOLIOSCOPE_RETRY_MAX_ATTEMPTS", "0"),
            ("FOLIOSCOPE_OPENAI_API_KEY", "  sk-test  "),
        ]));

        assert_eq!(config.gateway.requests_per_minute, 75);
        assert_eq!(config.gateway.requests_per_day, None);
        assert_eq!(config.analysis.asset_ttl, Duration::from_secs(3600));
        assert_eq!(config.gateway.retry.max_attempts, 1);
        assert_eq!(config.providers.openai_api_key.as_deref(), Some("sk-test"));
        assert!(config.providers.alpha_vantage_api_key.is_none());
    }

    #[test]
    fn test_from_env_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "FOLIOSCOPE_ANALYSIS_PORTFOLIO_TTL_SECS=120").unwrap();
        writeln!(file, "FOLIOSCOPE_TEXT_MAX_CONCURRENCY=4").unwrap();
        file.flush().unwrap();

        let config = AppConfig::from_env_file(file.path()).unwrap();
        assert_eq!(config.analysis.portfolio_ttl, Duration::from_secs(120));
        assert_eq!(config.gateway.text_max_concurrency, 4);
    }

    #[test]
    fn test_debug_masks_keys() {
        let keys = ProviderKeys {
            openai_api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        assert!(!format!("{:?}", keys).contains("sk-secret"));
    }
}
