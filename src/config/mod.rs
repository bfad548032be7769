//! Configuration for the tool server.
//!
//! Settings are resolved from an [`EnvSource`] (normally the process
//! environment after `.env` is loaded). CLI flags in `main.rs` are layered on
//! top through clap's `env` support, so every flag has a `TOOLSMITH_*`
//! counterpart.

pub(crate) mod helpers;

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::tools::{ApiKeys, RateLimitConfig, RuntimeSettings};
use crate::validation::UnknownFields;

pub use helpers::{EnvSource, MapEnv, ProcessEnv};

use helpers::{optional_env, parse_bool_env, parse_list_env, parse_optional_env};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RATE_LIMIT: u32 = 100;
const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
const DEFAULT_HISTORY_CAPACITY: usize = 100;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// HTTP server and runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Accepted API keys. Empty disables authentication.
    pub api_keys: Vec<SecretString>,
    /// Allowed CORS origins. `*` allows any origin; empty disables CORS headers.
    pub cors_origins: Vec<String>,
    /// Per-caller request budget. `None` disables rate limiting.
    pub rate_limit: Option<RateLimitConfig>,
    /// Execution timeout budget per request.
    pub timeout: Duration,
    /// Development mode exposes internal error details in responses.
    pub development: bool,
    /// Capacity of the execution history ring buffer.
    pub history_capacity: usize,
    /// Maximum accepted request body size.
    pub max_body_bytes: usize,
    /// Reject unknown top-level input fields instead of stripping them.
    pub strict_input: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_keys: Vec::new(),
            cors_origins: Vec::new(),
            rate_limit: Some(RateLimitConfig::new(
                DEFAULT_RATE_LIMIT,
                Duration::from_secs(DEFAULT_RATE_WINDOW_SECS),
            )),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            development: false,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            strict_input: false,
        }
    }
}

impl ServerConfig {
    /// Resolve configuration from `TOOLSMITH_*` variables, falling back to defaults.
    pub fn resolve(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let rate_limit = parse_optional_env::<u32>(env, "TOOLSMITH_RATE_LIMIT")?
            .unwrap_or(DEFAULT_RATE_LIMIT);
        let rate_window_secs = parse_optional_env::<u64>(env, "TOOLSMITH_RATE_WINDOW_SECS")?
            .unwrap_or(DEFAULT_RATE_WINDOW_SECS);
        if rate_window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TOOLSMITH_RATE_WINDOW_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let timeout_ms =
            parse_optional_env::<u64>(env, "TOOLSMITH_TIMEOUT_MS")?.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TOOLSMITH_TIMEOUT_MS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let history_capacity = parse_optional_env::<usize>(env, "TOOLSMITH_HISTORY_CAPACITY")?
            .unwrap_or(DEFAULT_HISTORY_CAPACITY)
            .max(1);

        Ok(Self {
            host: optional_env(env, "TOOLSMITH_HOST").unwrap_or(defaults.host),
            port: parse_optional_env(env, "TOOLSMITH_PORT")?.unwrap_or(defaults.port),
            api_keys: parse_list_env(env, "TOOLSMITH_API_KEYS")
                .into_iter()
                .map(SecretString::from)
                .collect(),
            cors_origins: parse_list_env(env, "TOOLSMITH_CORS_ORIGINS"),
            // A limit of zero turns rate limiting off.
            rate_limit: (rate_limit > 0).then(|| {
                RateLimitConfig::new(rate_limit, Duration::from_secs(rate_window_secs))
            }),
            timeout: Duration::from_millis(timeout_ms),
            development: parse_bool_env(env, "TOOLSMITH_DEVELOPMENT", false)?,
            history_capacity,
            max_body_bytes: parse_optional_env(env, "TOOLSMITH_MAX_BODY_BYTES")?
                .unwrap_or(defaults.max_body_bytes),
            strict_input: parse_bool_env(env, "TOOLSMITH_STRICT_INPUT", false)?,
        })
    }

    /// Whether requests must present an API key.
    pub fn auth_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    /// The bind address as `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Runtime settings derived from this configuration.
    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            timeout: self.timeout,
            api_keys: ApiKeys::new(self.api_keys.clone()),
            rate_limit: self.rate_limit.clone(),
            development: self.development,
            history_capacity: self.history_capacity,
            unknown_fields: if self.strict_input {
                UnknownFields::Reject
            } else {
                UnknownFields::Strip
            },
            ..RuntimeSettings::default()
        }
    }
}
