use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite:claims.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_CLAIMS_API_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_QUERY_ROW_LIMIT: usize = 500;
const DEFAULT_SUBMISSION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub intent: String,
    pub extraction: String,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub openrouter_api_key: String,
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub claims_api_url: String,
    pub models: ModelConfig,
    pub query_row_limit: usize,
    pub submission_timeout: Duration,
    pub synth_seed: Option<u64>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(read_env)
    }

    /// Builds the configuration from an arbitrary variable source.
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let model = |key: &str| get(key).unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let openrouter_api_key =
            get("OPENROUTER_API_KEY").ok_or(ConfigError::Missing("OPENROUTER_API_KEY"))?;

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "BIND_ADDR",
                value: bind_raw.clone(),
            })?;

        let query_row_limit = match get("QUERY_ROW_LIMIT") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "QUERY_ROW_LIMIT",
                        value: raw,
                    });
                }
            },
            None => DEFAULT_QUERY_ROW_LIMIT,
        };

        let submission_timeout_secs = match get("SUBMISSION_TIMEOUT_SECS") {
            Some(raw) => parse_u64("SUBMISSION_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_SUBMISSION_TIMEOUT_SECS,
        };

        let synth_seed = get("SYNTH_SEED")
            .map(|raw| parse_u64("SYNTH_SEED", &raw))
            .transpose()?;

        Ok(Self {
            openrouter_api_key,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_addr,
            claims_api_url: get("CLAIMS_API_URL")
                .unwrap_or_else(|| DEFAULT_CLAIMS_API_URL.to_string()),
            models: ModelConfig {
                intent: model("INTENT_MODEL"),
                extraction: model("EXTRACTION_MODEL"),
                sql: model("SQL_MODEL"),
            },
            query_row_limit,
            submission_timeout: Duration::from_secs(submission_timeout_secs),
            synth_seed,
        })
    }
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(read_env("LOG_FORMAT").as_deref())
    }

    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()) {
            Some(value) if value == "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn parse_u64(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}
