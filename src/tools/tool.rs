//! Tool handler trait and types.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::schema::ToolSchema;
use crate::tools::context::ExecutionContext;

/// Descriptive metadata for a tool, surfaced by `/health` and `/schema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl ToolMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            capabilities: Vec::new(),
            tags: Vec::new(),
            author: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Result of a handler's own health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

/// Error type returned by tool handlers.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Network error: {message}")]
    Network {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Suggested delay for retryable failures that do not carry their own.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

impl ToolError {
    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::Validation,
            Self::ExecutionFailed(_) => ErrorKind::Execution,
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Http { status, .. } if (400..500).contains(status) => ErrorKind::Client,
            Self::Http { .. } => ErrorKind::Server,
            Self::Internal(_) => ErrorKind::System,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "INPUT_VALIDATION_FAILED",
            ErrorKind::Execution => "EXECUTION_FAILED",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Timeout => "EXECUTION_TIMEOUT",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::Client => "CLIENT_ERROR",
            ErrorKind::Server => "SERVER_ERROR",
            ErrorKind::System => "INTERNAL_ERROR",
        }
    }

    pub fn retryable(&self) -> bool {
        match self {
            // Too Many Requests is the one client error worth retrying.
            Self::Http { status: 429, .. } => true,
            _ => self.kind().default_retryable(),
        }
    }

    /// Suggested delay before retrying, for retryable errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Network { retry_after, .. } => Some(retry_after.unwrap_or(DEFAULT_RETRY_AFTER)),
            _ if self.retryable() => Some(DEFAULT_RETRY_AFTER),
            _ => None,
        }
    }
}

/// Output from a tool execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The result data.
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Whether the result was served from a handler-side cache.
    #[serde(default)]
    pub cached: bool,
    /// Free-form resource usage reported by the handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
}

impl ToolOutput {
    /// Create a successful output with a JSON result.
    pub fn success(data: Value) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Create a text output.
    pub fn text(text: impl Into<String>) -> Self {
        Self::success(Value::String(text.into()))
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    pub fn with_resources(mut self, resources: Value) -> Self {
        self.resources = Some(resources);
        self
    }
}

/// Normalizes whatever a handler built as raw JSON.
///
/// A value already shaped like a success envelope
/// (`{"status": "success", "data": ...}`) is unwrapped so results are never
/// double-wrapped. Anything else becomes the payload as-is.
impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        let is_envelope = value.get("status").and_then(Value::as_str) == Some("success")
            && value.get("data").is_some();
        if !is_envelope {
            return Self::success(value);
        }

        let Value::Object(mut map) = value else {
            return Self::default();
        };
        let warnings = map
            .remove("warnings")
            .and_then(|w| serde_json::from_value::<Vec<String>>(w).ok())
            .unwrap_or_default();
        Self {
            data: map.remove("data").unwrap_or(Value::Null),
            warnings,
            ..Self::default()
        }
    }
}

/// The user-supplied logic behind a tool.
///
/// The runtime owns everything around `execute`: auth, rate limiting,
/// validation, timeouts, metrics. Handlers only see validated input and
/// config plus a fresh [`ExecutionContext`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Name, version and descriptive metadata.
    fn metadata(&self) -> ToolMetadata;

    /// Input and config schemas. Read once when the runtime is built.
    fn schema(&self) -> ToolSchema;

    /// Run the tool.
    async fn execute(
        &self,
        input: Value,
        config: Value,
        ctx: &ExecutionContext,
    ) -> Result<ToolOutput, ToolError>;

    /// Called on start with the validated config.
    async fn setup(&self, _config: &Value) -> Result<(), ToolError> {
        Ok(())
    }

    /// Called on stop.
    async fn cleanup(&self) -> Result<(), ToolError> {
        Ok(())
    }

    /// Extra health signal merged into `/health`.
    async fn health_check(&self) -> HealthStatus {
        HealthStatus::Healthy
    }

    /// Override the runtime's default timeout for this tool.
    fn execution_timeout(&self) -> Option<Duration> {
        None
    }
}
