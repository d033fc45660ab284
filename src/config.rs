//! Process configuration
//!
//! Read once at startup. Missing required values are startup failures,
//! never per-request ones.

use crate::error::OrchestrationError;
use crate::Result;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_AGENT_MAX_STEPS: usize = 15;

/// Decoding parameters for the language model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub api_key: String,
    pub model_name: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketDataSource {
    Tcbs,
}

impl FromStr for MarketDataSource {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "TCBS" => Ok(MarketDataSource::Tcbs),
            other => Err(OrchestrationError::ConfigError(format!(
                "Unsupported MARKET_DATA_SOURCE '{}' (supported: TCBS)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketDataConfig {
    pub source: MarketDataSource,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub market_data: MarketDataConfig,
    pub port: u16,
    pub request_timeout: Duration,
    pub agent_max_steps: usize,
}

impl AppConfig {
    /// Load from the process environment (call `dotenv` first).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let require = |key: &str| {
            get(key).ok_or_else(|| {
                OrchestrationError::ConfigError(format!("{} is not set", key))
            })
        };

        let api_key = get("GOOGLE_API_KEY")
            .or_else(|| get("GEMINI_API_KEY"))
            .ok_or_else(|| {
                OrchestrationError::ConfigError(
                    "GOOGLE_API_KEY (or GEMINI_API_KEY) is not set".to_string(),
                )
            })?;

        let model = ModelConfig {
            api_key,
            model_name: require("MODEL_NAME")?,
            temperature: parse_value("TEMPERATURE", &require("TEMPERATURE")?)?,
            top_k: parse_value("TOP_K", &require("TOP_K")?)?,
            top_p: parse_value("TOP_P", &require("TOP_P")?)?,
            base_url: get("GEMINI_BASE_URL"),
        };

        let market_data = MarketDataConfig {
            source: require("MARKET_DATA_SOURCE")?.parse()?,
            base_url: get("MARKET_DATA_BASE_URL"),
        };

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        let timeout_secs = match get("REQUEST_TIMEOUT_SECS") {
            Some(raw) => parse_value("REQUEST_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let agent_max_steps = match get("AGENT_MAX_STEPS") {
            Some(raw) => parse_value::<usize>("AGENT_MAX_STEPS", &raw)?,
            None => DEFAULT_AGENT_MAX_STEPS,
        };
        if agent_max_steps == 0 {
            return Err(OrchestrationError::ConfigError(
                "AGENT_MAX_STEPS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            model,
            market_data,
            port,
            request_timeout: Duration::from_secs(timeout_secs),
            agent_max_steps,
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        OrchestrationError::ConfigError(format!("{} has an invalid value: '{}'", key, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("GOOGLE_API_KEY", "test-key"),
            ("MODEL_NAME", "gemini-2.0-flash"),
            ("TEMPERATURE", "0.2"),
            ("TOP_K", "40"),
            ("TOP_P", "0.95"),
            ("MARKET_DATA_SOURCE", "TCBS"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<AppConfig> {
        AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_loads_required_values_with_defaults() {
        let config = tokio_test::assert_ok!(load(&base_env()));

        assert_eq!(config.model.model_name, "gemini-2.0-flash");
        assert_eq!(config.model.top_k, 40);
        assert!((config.model.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.market_data.source, MarketDataSource::Tcbs);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.request_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.agent_max_steps, DEFAULT_AGENT_MAX_STEPS);
    }

    #[test]
    fn test_gemini_key_fallback() {
        let mut env = base_env();
        env.remove("GOOGLE_API_KEY");
        env.insert("GEMINI_API_KEY", "other-key");

        let config = load(&env).unwrap();
        assert_eq!(config.model.api_key, "other-key");
    }

    #[test]
    fn test_missing_required_value_fails() {
        for key in ["MODEL_NAME", "TEMPERATURE", "TOP_K", "TOP_P", "MARKET_DATA_SOURCE"] {
            let mut env = base_env();
            env.remove(key);

            let err = load(&env).unwrap_err();
            assert!(err.to_string().contains(key), "{} should be reported", key);
        }
    }

    #[test]
    fn test_invalid_values_fail() {
        let mut env = base_env();
        env.insert("TOP_K", "many");
        assert!(matches!(load(&env), Err(OrchestrationError::ConfigError(_))));

        let mut env = base_env();
        env.insert("MARKET_DATA_SOURCE", "SSI");
        assert!(matches!(load(&env), Err(OrchestrationError::ConfigError(_))));

        let mut env = base_env();
        env.insert("AGENT_MAX_STEPS", "0");
        assert!(load(&env).is_err());
    }
}
