//! Request and response DTOs for the tool HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::tools::{
    ExecutionError, ExecutionResult, ExecutionStatus, MetricsSnapshot, ResultMetadata, Timing,
};
use crate::validation::ValidationMetrics;

// --- Execute ---

/// Body of `POST /api/execute`.
///
/// The handler reads the raw body and lets the runtime parse it, so this type
/// documents the contract and serves clients building requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub input_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// Body of every `POST /api/execute` response.
///
/// Error fields appear both flat (`error_code`, `error_message`,
/// `error_details`) and nested under `error`, which also carries `type`,
/// `retryable` and `retry_after_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub timing: Timing,
    #[serde(default)]
    pub metadata: ResultMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ExecuteResponse {
    pub fn from_result(result: &ExecutionResult, request_id: Option<String>) -> Self {
        let error = result.error().cloned();
        Self {
            execution_id: result.execution_id(),
            status: result.status(),
            output_data: result.data().cloned(),
            error_code: error.as_ref().map(|e| e.code.clone()),
            error_message: error.as_ref().map(|e| e.message.clone()),
            error_details: error.as_ref().and_then(|e| e.details.clone()),
            error,
            execution_time_ms: result.timing().total_ms,
            timestamp: result.timing().started_at,
            timing: result.timing().clone(),
            metadata: result.metadata().clone(),
            warnings: result.warnings().to_vec(),
            request_id,
        }
    }
}

// --- Metrics ---

#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub execution: MetricsSnapshot,
    pub validation: ValidationMetrics,
}

// --- Readiness ---

#[derive(Debug, Clone, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub state: String,
}
