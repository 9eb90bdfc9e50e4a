use crate::domain::Address;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub ledger_api_url: String,
    /// Connected wallet account; `None` starts the desk disconnected.
    pub account: Option<Address>,
    pub default_reinvest_duration_secs: u64,
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let ledger_api_url = env_map
            .get("LEDGER_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("LEDGER_API_URL".to_string()))?;

        let account = match env_map.get("ACCOUNT").map(|s| s.trim()) {
            Some("") | None => None,
            Some(raw) => Some(raw.parse::<Address>().map_err(|e| {
                ConfigError::InvalidValue("ACCOUNT".to_string(), e.to_string())
            })?),
        };

        let default_reinvest_duration_secs = env_map
            .get("DEFAULT_REINVEST_DURATION_SECS")
            .map(|s| s.as_str())
            .unwrap_or("2592000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "DEFAULT_REINVEST_DURATION_SECS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let request_timeout_ms = env_map
            .get("REQUEST_TIMEOUT_MS")
            .map(|s| s.as_str())
            .unwrap_or("10000")
            .parse::<u64>()
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "REQUEST_TIMEOUT_MS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        Ok(Config {
            port,
            ledger_api_url,
            account,
            default_reinvest_duration_secs,
            request_timeout: Duration::from_millis(request_timeout_ms),
        })
    }
}
