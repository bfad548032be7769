//! Route handlers.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::error::ErrorKind;
use crate::server::AppState;
use crate::server::auth::execution_request;
use crate::server::types::{ExecuteResponse, MetricsResponse, ReadyResponse};
use crate::tools::{ExecutionResult, ExecutionStatus, HealthStatus};

/// `POST /api/execute`
pub async fn execute_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Invalid UTF-8 cannot be JSON; an empty body reports it as INVALID_JSON.
    let body = String::from_utf8(body.to_vec()).unwrap_or_default();
    let request = execution_request(&headers, body);
    let request_id = request.request_id.clone();

    let result = state.runtime.execute(request).await;
    let status = status_for(&result);
    let retry_after = retry_after_secs(&result, status);

    let mut response =
        (status, Json(ExecuteResponse::from_result(&result, request_id.clone()))).into_response();
    if let Some(secs) = retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    if let Some(id) = request_id
        && let Ok(value) = HeaderValue::from_str(&id)
    {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// HTTP status for an execution result.
pub fn status_for(result: &ExecutionResult) -> StatusCode {
    match result.status() {
        ExecutionStatus::Success => return StatusCode::OK,
        ExecutionStatus::Timeout => return StatusCode::GATEWAY_TIMEOUT,
        ExecutionStatus::Error | ExecutionStatus::Cancelled => {}
    }
    let Some(error) = result.error() else {
        return StatusCode::INTERNAL_SERVER_ERROR;
    };

    match error.code.as_str() {
        "AUTHENTICATION_REQUIRED" => return StatusCode::UNAUTHORIZED,
        "RATE_LIMIT_EXCEEDED" => return StatusCode::TOO_MANY_REQUESTS,
        "TOOL_NOT_RUNNING" | "EXECUTION_CANCELLED" => return StatusCode::SERVICE_UNAVAILABLE,
        "INVALID_JSON" => return StatusCode::BAD_REQUEST,
        _ => {}
    }

    match error.kind {
        ErrorKind::Validation | ErrorKind::Client => StatusCode::BAD_REQUEST,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Network | ErrorKind::Server => StatusCode::BAD_GATEWAY,
        ErrorKind::Execution | ErrorKind::Configuration | ErrorKind::System => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `Retry-After` in whole seconds, rounded up, for throttled or unavailable
/// responses.
fn retry_after_secs(result: &ExecutionResult, status: StatusCode) -> Option<u64> {
    if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::SERVICE_UNAVAILABLE {
        return None;
    }
    let ms = result.error()?.retry_after_ms?;
    Some(ms.div_ceil(1000).max(1))
}

/// `GET /health`
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.runtime.health().await;
    let status = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}

/// `GET /ready`
pub async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tool_state = state.runtime.state();
    let ready = tool_state.accepts_requests();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadyResponse {
            ready,
            state: tool_state.to_string(),
        }),
    )
}

/// `GET /schema`
pub async fn schema_handler(State(state): State<AppState>) -> Json<Value> {
    Json(state.schema_document.as_ref().clone())
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        execution: state.runtime.metrics(),
        validation: state.runtime.validation_metrics(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ExecutionError, Timing, ToolOutput};
    use chrono::Utc;
    use std::time::Duration;
    use uuid::Uuid;

    fn error(code: &str, kind: ErrorKind) -> ExecutionResult {
        ExecutionResult::failure(
            Uuid::new_v4(),
            ExecutionError::new(code, "x", kind),
            Timing::new(Utc::now()),
        )
    }

    #[test]
    fn test_status_mapping() {
        let ok = ExecutionResult::success(
            Uuid::new_v4(),
            ToolOutput::success(Value::Null),
            Timing::new(Utc::now()),
        );
        assert_eq!(status_for(&ok), StatusCode::OK);

        let timeout =
            ExecutionResult::timeout(Uuid::new_v4(), Duration::from_millis(5), Timing::new(Utc::now()));
        assert_eq!(status_for(&timeout), StatusCode::GATEWAY_TIMEOUT);

        let cancelled =
            ExecutionResult::cancelled(Uuid::new_v4(), "stopped", Timing::new(Utc::now()));
        assert_eq!(status_for(&cancelled), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            retry_after_secs(&cancelled, StatusCode::SERVICE_UNAVAILABLE),
            Some(1)
        );

        let cases = [
            ("AUTHENTICATION_REQUIRED", ErrorKind::Client, StatusCode::UNAUTHORIZED),
            ("RATE_LIMIT_EXCEEDED", ErrorKind::Client, StatusCode::TOO_MANY_REQUESTS),
            ("TOOL_NOT_RUNNING", ErrorKind::System, StatusCode::SERVICE_UNAVAILABLE),
            ("INVALID_JSON", ErrorKind::Validation, StatusCode::BAD_REQUEST),
            ("INPUT_VALIDATION_FAILED", ErrorKind::Validation, StatusCode::BAD_REQUEST),
            ("EXECUTION_FAILED", ErrorKind::Execution, StatusCode::INTERNAL_SERVER_ERROR),
            ("NETWORK_ERROR", ErrorKind::Network, StatusCode::BAD_GATEWAY),
            ("CLIENT_ERROR", ErrorKind::Client, StatusCode::BAD_REQUEST),
            ("SERVER_ERROR", ErrorKind::Server, StatusCode::BAD_GATEWAY),
            ("CONFIGURATION_ERROR", ErrorKind::Configuration, StatusCode::INTERNAL_SERVER_ERROR),
            ("INTERNAL_ERROR", ErrorKind::System, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, kind, expected) in cases {
            assert_eq!(status_for(&error(code, kind)), expected, "{code}");
        }
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let result = ExecutionResult::failure(
            Uuid::new_v4(),
            ExecutionError::new("RATE_LIMIT_EXCEEDED", "slow down", ErrorKind::Client)
                .with_retry_after(Duration::from_millis(1500)),
            Timing::new(Utc::now()),
        );
        assert_eq!(
            retry_after_secs(&result, StatusCode::TOO_MANY_REQUESTS),
            Some(2)
        );
        assert_eq!(retry_after_secs(&result, StatusCode::BAD_REQUEST), None);
    }
}
