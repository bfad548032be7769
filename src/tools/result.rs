//! Standardized execution result envelope.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::tools::tool::{ToolError, ToolOutput};

/// Outcome of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Structured error carried by every non-success result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub code: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ExecutionError {
    /// Error with the kind's default retryability.
    pub fn new(code: impl Into<String>, message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            kind,
            retryable: kind.default_retryable(),
            retry_after_ms: None,
            details: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after_ms = Some(duration_to_ms(retry_after));
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

impl From<&ToolError> for ExecutionError {
    fn from(err: &ToolError) -> Self {
        let mut out = Self::new(err.code(), err.to_string(), err.kind())
            .with_retryable(err.retryable());
        if let Some(delay) = err.retry_after() {
            out = out.with_retry_after(delay);
        }
        if let ToolError::Http { status, .. } = err {
            out = out.with_details(serde_json::json!({ "status": status }));
        }
        out
    }
}

/// Where the time went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub started_at: DateTime<Utc>,
    pub validation_ms: u64,
    pub execution_ms: u64,
    pub total_ms: u64,
}

impl Timing {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            validation_ms: 0,
            execution_ms: 0,
            total_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
}

/// Result of one execution.
///
/// Exactly one of `data` and `error` is set: `data` for `success`, `error`
/// for every other status. The constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    execution_id: Uuid,
    status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ExecutionError>,
    timing: Timing,
    metadata: ResultMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl ExecutionResult {
    pub fn success(execution_id: Uuid, output: ToolOutput, timing: Timing) -> Self {
        Self {
            execution_id,
            status: ExecutionStatus::Success,
            data: Some(output.data),
            error: None,
            timing,
            metadata: ResultMetadata {
                cached: output.cached,
                resources: output.resources,
            },
            warnings: output.warnings,
        }
    }

    pub fn failure(execution_id: Uuid, error: ExecutionError, timing: Timing) -> Self {
        Self::not_successful(execution_id, ExecutionStatus::Error, error, timing)
    }

    pub fn timeout(execution_id: Uuid, budget: Duration, timing: Timing) -> Self {
        let error = ExecutionError::new(
            "EXECUTION_TIMEOUT",
            format!("Execution exceeded {}ms", duration_to_ms(budget)),
            ErrorKind::Timeout,
        )
        .with_retry_after(Duration::from_secs(1));
        Self::not_successful(execution_id, ExecutionStatus::Timeout, error, timing)
    }

    pub fn cancelled(execution_id: Uuid, reason: impl Into<String>, timing: Timing) -> Self {
        let error = ExecutionError::new("EXECUTION_CANCELLED", reason, ErrorKind::Execution)
            .with_retryable(true)
            .with_retry_after(Duration::from_secs(1));
        Self::not_successful(execution_id, ExecutionStatus::Cancelled, error, timing)
    }

    fn not_successful(
        execution_id: Uuid,
        status: ExecutionStatus,
        error: ExecutionError,
        timing: Timing,
    ) -> Self {
        Self {
            execution_id,
            status,
            data: None,
            error: Some(error),
            timing,
            metadata: ResultMetadata::default(),
            warnings: Vec::new(),
        }
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ExecutionError> {
        self.error.as_ref()
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

pub(crate) fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
