use thiserror::Error;

use crate::circulation::MAX_LOAN_DAYS;
use crate::tokens::jwt::{DEV_SECRET, MIN_SECRET_LEN};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub circulation: CirculationConfig,
    /// First login creates the account when none exist. Off in production.
    pub demo_login: bool,
    /// Permits the built-in token secret. Must never be true in production.
    pub dev_mode: bool,
    pub server: ServerConfig,
    pub tokens: TokenConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub allowed_origins: Vec<String>,
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct CirculationConfig {
    pub default_loan_days: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:5173".to_string()],
            bind_address: "0.0.0.0:8000".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for CirculationConfig {
    fn default() -> Self {
        Self {
            default_loan_days: 14,
        }
    }
}

const DEFAULT_TOKEN_TTL_SECONDS: u64 = 8 * 60 * 60;
const MAX_TOKEN_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();

        let bind_address = lookup("BIND_ADDRESS").unwrap_or(defaults.bind_address);
        let data_dir = lookup("DATA_DIR").unwrap_or(defaults.data_dir);

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|o| {
                o.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.allowed_origins);

        let dev_mode = flag(lookup("DEV_MODE"));
        let demo_login = flag(lookup("DEMO_LOGIN"));

        let secret = match lookup("TOKEN_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if dev_mode => DEV_SECRET.to_string(),
            None => {
                return Err(ConfigError::ValidationError(
                    "TOKEN_SECRET is required unless DEV_MODE is set".to_string(),
                ))
            }
        };

        let ttl_seconds = parse_number(&lookup, "TOKEN_TTL_SECONDS", DEFAULT_TOKEN_TTL_SECONDS)?;
        let default_loan_days = parse_number(
            &lookup,
            "DEFAULT_LOAN_DAYS",
            CirculationConfig::default().default_loan_days,
        )?;

        let config = Config {
            circulation: CirculationConfig { default_loan_days },
            demo_login,
            dev_mode,
            server: ServerConfig {
                allowed_origins,
                bind_address,
                data_dir,
            },
            tokens: TokenConfig {
                secret,
                ttl_seconds,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_address.is_empty() {
            return Err(ConfigError::ValidationError(
                "BIND_ADDRESS cannot be empty".to_string(),
            ));
        }

        if self.tokens.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::ValidationError(format!(
                "TOKEN_SECRET must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        if self.tokens.ttl_seconds == 0 || self.tokens.ttl_seconds > MAX_TOKEN_TTL_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "TOKEN_TTL_SECONDS must be between 1 and {MAX_TOKEN_TTL_SECONDS}"
            )));
        }

        let loan_days = self.circulation.default_loan_days;
        if loan_days == 0 || loan_days > MAX_LOAN_DAYS {
            return Err(ConfigError::ValidationError(format!(
                "DEFAULT_LOAN_DAYS must be between 1 and {MAX_LOAN_DAYS}"
            )));
        }

        if self.dev_mode && self.tokens.secret == DEV_SECRET {
            tracing::warn!("Using the built-in development token secret. Do not run this in production.");
        }

        Ok(())
    }
}

fn flag(value: Option<String>) -> bool {
    value
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::ValidationError(format!("{key} must be a number, got {raw:?}"))),
        None => Ok(default),
    }
}
