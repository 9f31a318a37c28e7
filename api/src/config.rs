use std::time::Duration;

use url::Url;

use crate::agent::DEFAULT_AGENT_TIMEOUT;
use crate::bridge::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use crate::seed::DEFAULT_SEED_THRESHOLD;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct IdentityProviderConfig {
    pub url: Url,
    pub anon_key: String,
    /// Only needed to delete subjects at the provider.
    pub service_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Wall-clock limit for one agent invocation.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub identity_provider: IdentityProviderConfig,
    pub agent: AgentConfig,
    pub retry: RetryPolicy,
    pub seed_threshold: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let database_url = require("DATABASE_URL")?;

        let url_raw = require("IDENTITY_PROVIDER_URL")?;
        let url = Url::parse(&url_raw).map_err(|e| ConfigError::Invalid {
            name: "IDENTITY_PROVIDER_URL",
            reason: e.to_string(),
        })?;
        let timeout_ms: u64 = parse_or("IDENTITY_PROVIDER_TIMEOUT_MS", get("IDENTITY_PROVIDER_TIMEOUT_MS"), 5000)?;

        let agent_command = get("ATTUNE_AGENT_COMMAND").unwrap_or_else(|| "attune-agent".to_string());
        let mut parts = agent_command.split_whitespace().map(str::to_owned);
        let program = parts.next().ok_or(ConfigError::Missing("ATTUNE_AGENT_COMMAND"))?;
        let agent_timeout_ms: u64 = parse_or(
            "ATTUNE_AGENT_TIMEOUT_MS",
            get("ATTUNE_AGENT_TIMEOUT_MS"),
            DEFAULT_AGENT_TIMEOUT.as_millis() as u64,
        )?;
        if agent_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "ATTUNE_AGENT_TIMEOUT_MS",
                reason: "must be at least 1".to_string(),
            });
        }

        let max_attempts = parse_or(
            "ATTUNE_RETRY_MAX_ATTEMPTS",
            get("ATTUNE_RETRY_MAX_ATTEMPTS"),
            DEFAULT_MAX_ATTEMPTS,
        )?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "ATTUNE_RETRY_MAX_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }
        let base_delay_ms = parse_or(
            "ATTUNE_RETRY_BASE_DELAY_MS",
            get("ATTUNE_RETRY_BASE_DELAY_MS"),
            DEFAULT_BASE_DELAY.as_millis() as u64,
        )?;

        Ok(Self {
            database_url,
            port: parse_or("PORT", get("PORT"), 3000)?,
            identity_provider: IdentityProviderConfig {
                url,
                anon_key: require("IDENTITY_PROVIDER_ANON_KEY")?,
                service_key: get("IDENTITY_PROVIDER_SERVICE_KEY"),
                timeout: Duration::from_millis(timeout_ms),
            },
            agent: AgentConfig {
                program,
                args: parts.collect(),
                timeout: Duration::from_millis(agent_timeout_ms),
            },
            retry: RetryPolicy::new(max_attempts, Duration::from_millis(base_delay_ms)),
            seed_threshold: parse_or(
                "ATTUNE_SEED_THRESHOLD",
                get("ATTUNE_SEED_THRESHOLD"),
                DEFAULT_SEED_THRESHOLD,
            )?,
        })
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}
