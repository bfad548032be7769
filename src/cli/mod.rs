//! Command-line interface for the `toolsmith` binary.
//!
//! Subcommands:
//! - `serve` (default) runs the demo tool behind the HTTP surface
//! - `schema` prints the OpenAPI document or an example request

pub mod demo;

use std::time::Duration;

use clap::{ColorChoice, Parser, Subcommand};
use secrecy::SecretString;

use crate::config::ServerConfig;
use crate::tools::RateLimitConfig;

#[derive(Parser, Debug)]
#[command(name = "toolsmith")]
#[command(about = "Serve a typed, schema-validated tool over HTTP")]
#[command(
    long_about = "Toolsmith validates requests against a tool schema and runs the tool with auth, rate limiting and timeouts.\nExamples:\n  toolsmith serve --port 8080\n  toolsmith schema --example"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Address to bind
    #[arg(long, global = true, env = "TOOLSMITH_HOST")]
    pub host: Option<String>,

    /// Port to bind
    #[arg(long, global = true, env = "TOOLSMITH_PORT")]
    pub port: Option<u16>,

    /// Accepted API keys, comma-separated. Empty disables authentication.
    #[arg(
        long,
        global = true,
        env = "TOOLSMITH_API_KEYS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub api_keys: Vec<String>,

    /// Allowed CORS origins, comma-separated. `*` allows any origin.
    #[arg(long, global = true, env = "TOOLSMITH_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Requests allowed per caller per window. 0 disables rate limiting.
    #[arg(long, global = true, env = "TOOLSMITH_RATE_LIMIT")]
    pub rate_limit: Option<u32>,

    /// Rate limit window in seconds
    #[arg(long, global = true, env = "TOOLSMITH_RATE_WINDOW_SECS")]
    pub rate_window_secs: Option<u64>,

    /// Execution timeout in milliseconds
    #[arg(long, global = true, env = "TOOLSMITH_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Expose internal error details in responses
    #[arg(long, global = true, env = "TOOLSMITH_DEVELOPMENT")]
    pub development: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "TOOLSMITH_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the tool (default if no subcommand given)
    #[command(
        about = "Serve the tool over HTTP",
        long_about = "Starts the tool runtime and the HTTP server.\nExample: toolsmith serve --port 8080"
    )]
    Serve,

    /// Print the tool's OpenAPI document
    #[command(
        about = "Print the OpenAPI document",
        long_about = "Prints the OpenAPI document for the tool and exits.\nExample: toolsmith schema --example"
    )]
    Schema {
        /// Print an example execute request instead
        #[arg(long)]
        example: bool,
    },
}

impl Cli {
    /// Whether to start the server (default or explicit `serve`).
    pub fn should_serve(&self) -> bool {
        matches!(self.command, None | Some(Command::Serve))
    }

    /// Layer explicit flags over a resolved configuration.
    pub fn apply(&self, config: &mut ServerConfig) -> Result<(), crate::error::ConfigError> {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if !self.api_keys.is_empty() {
            config.api_keys = self
                .api_keys
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .map(|k| SecretString::from(k.to_string()))
                .collect();
        }
        if !self.cors_origins.is_empty() {
            config.cors_origins = self
                .cors_origins
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        if let Some(window) = self.rate_window_secs
            && window == 0
        {
            return Err(crate::error::ConfigError::InvalidValue {
                key: "--rate-window-secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        match (self.rate_limit, self.rate_window_secs) {
            (Some(0), _) => config.rate_limit = None,
            (Some(max), window) => {
                let window = window.map(Duration::from_secs).unwrap_or_else(|| {
                    config
                        .rate_limit
                        .as_ref()
                        .map(|l| l.window)
                        .unwrap_or(Duration::from_secs(60))
                });
                config.rate_limit = Some(RateLimitConfig::new(max, window));
            }
            (None, Some(window)) => {
                if let Some(limit) = config.rate_limit.as_mut() {
                    limit.window = Duration::from_secs(window);
                }
            }
            (None, None) => {}
        }

        if let Some(ms) = self.timeout_ms {
            if ms == 0 {
                return Err(crate::error::ConfigError::InvalidValue {
                    key: "--timeout-ms".to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
            config.timeout = Duration::from_millis(ms);
        }
        if self.development {
            config.development = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_version() {
        let cmd = Cli::command();
        assert_eq!(
            cmd.get_version().unwrap_or("unknown"),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "toolsmith",
            "--port",
            "8081",
            "--api-keys",
            "k1,k2",
            "--rate-limit",
            "5",
            "--timeout-ms",
            "1500",
            "serve",
        ])
        .unwrap();
        assert!(cli.should_serve());

        let mut config = ServerConfig::default();
        cli.apply(&mut config).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.api_keys.len(), 2);
        assert_eq!(config.timeout, Duration::from_millis(1500));
        let limit = config.rate_limit.unwrap();
        assert_eq!(limit.max_requests, 5);
        assert_eq!(limit.window, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_rate_limit_disables() {
        let cli = Cli::try_parse_from(["toolsmith", "--rate-limit", "0"]).unwrap();
        let mut config = ServerConfig::default();
        cli.apply(&mut config).unwrap();
        assert!(config.rate_limit.is_none());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cli = Cli::try_parse_from(["toolsmith", "--timeout-ms", "0"]).unwrap();
        let mut config = ServerConfig::default();
        assert!(cli.apply(&mut config).is_err());
    }

    #[test]
    fn test_schema_subcommand() {
        let cli = Cli::try_parse_from(["toolsmith", "schema", "--example"]).unwrap();
        assert!(!cli.should_serve());
        assert!(matches!(cli.command, Some(Command::Schema { example: true })));
    }
}
