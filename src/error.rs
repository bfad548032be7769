//! Error types for toolsmith.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tools::ToolState;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised while compiling a schema into validators.
///
/// Every variant is a problem with the schema itself, never with the data
/// being validated. They are reported eagerly at compile time and surface to
/// callers as `VALIDATION_SYSTEM_ERROR`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("enum field '{path}' declares no allowed values")]
    EmptyEnum { path: String },

    #[error("enum field '{path}' declares duplicate value '{value}'")]
    DuplicateEnumValue { path: String, value: String },

    #[error("field '{path}' has an invalid range: {detail}")]
    InvalidRange { path: String, detail: String },

    #[error("field '{path}' has an invalid pattern: {message}")]
    InvalidPattern { path: String, message: String },

    #[error("field '{path}' has a default that violates its own constraints: {message}")]
    InvalidDefault { path: String, message: String },

    #[error("cross-field rule #{index} is invalid: {message}")]
    InvalidRule { index: usize, message: String },

    #[error("unknown field kind: {0}")]
    UnknownKind(String),

    #[error("malformed schema: {0}")]
    Malformed(String),
}

impl CompileError {
    /// Machine-readable code reported in execution results.
    pub fn code(&self) -> &'static str {
        "VALIDATION_SYSTEM_ERROR"
    }
}

/// Lifecycle errors for a tool runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Cannot {action} while the tool is {state}")]
    InvalidState {
        action: &'static str,
        state: ToolState,
    },

    #[error("Tool startup failed: {reason}")]
    StartupFailed { reason: String },

    #[error("Schema compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("Config validation failed: {0}")]
    InvalidConfig(String),
}

impl RuntimeError {
    /// Machine-readable code, matching the envelope codes where one exists.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidState { .. } => "TOOL_NOT_RUNNING",
            Self::StartupFailed { .. } => "CONFIGURATION_ERROR",
            Self::Compile(err) => err.code(),
            Self::InvalidConfig(_) => "CONFIG_VALIDATION_FAILED",
        }
    }
}

/// Errors from the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Failure taxonomy carried on every error result.
///
/// Callers branch on this (together with `retryable`) instead of on the
/// concrete error code, so new codes never break client retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad input or config. Never retryable.
    #[serde(rename = "validation_error")]
    Validation,
    /// Setup or environment problem on the tool side. Never retryable.
    #[serde(rename = "configuration_error")]
    Configuration,
    /// The tool's own logic failed.
    #[serde(rename = "execution_error")]
    Execution,
    /// An external call failed at the network level.
    #[serde(rename = "network_error")]
    Network,
    /// The execution or an external call ran out of time.
    #[serde(rename = "timeout_error")]
    Timeout,
    /// A proxied call was rejected with a 4xx status.
    #[serde(rename = "client_error")]
    Client,
    /// A proxied call failed with a 5xx status.
    #[serde(rename = "server_error")]
    Server,
    /// Internal or unexpected failure.
    #[serde(rename = "system_error")]
    System,
}

impl ErrorKind {
    /// Whether errors of this kind are worth retrying by default.
    pub fn default_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Server)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Configuration => "configuration_error",
            Self::Execution => "execution_error",
            Self::Network => "network_error",
            Self::Timeout => "timeout_error",
            Self::Client => "client_error",
            Self::Server => "server_error",
            Self::System => "system_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_serializes_with_suffix() {
        let json = serde_json::to_value(ErrorKind::Validation).unwrap();
        assert_eq!(json, serde_json::json!("validation_error"));
        let back: ErrorKind = serde_json::from_value(serde_json::json!("timeout_error")).unwrap();
        assert_eq!(back, ErrorKind::Timeout);
    }

    #[test]
    fn test_error_kind_retryability() {
        assert!(!ErrorKind::Validation.default_retryable());
        assert!(!ErrorKind::Configuration.default_retryable());
        assert!(!ErrorKind::System.default_retryable());
        assert!(ErrorKind::Network.default_retryable());
        assert!(ErrorKind::Timeout.default_retryable());
    }

    #[test]
    fn test_compile_error_code() {
        let err = CompileError::EmptyEnum {
            path: "mode".to_string(),
        };
        assert_eq!(err.code(), "VALIDATION_SYSTEM_ERROR");
        assert!(err.to_string().contains("'mode'"));

        let runtime_err = RuntimeError::from(err);
        assert_eq!(runtime_err.code(), "VALIDATION_SYSTEM_ERROR");
        assert_eq!(
            RuntimeError::InvalidConfig("x".to_string()).code(),
            "CONFIG_VALIDATION_FAILED"
        );
    }
}
