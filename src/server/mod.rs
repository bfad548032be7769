//! HTTP surface for a single tool.
//!
//! Routes:
//! - `POST /api/execute` runs the tool
//! - `GET /health` reports tool health (503 when unhealthy)
//! - `GET /ready` reports whether the tool accepts requests
//! - `GET /schema` serves the OpenAPI document
//! - `GET /metrics` serves execution and validation metrics

pub mod auth;
pub mod handlers;
pub mod types;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, header},
    routing::{get, post},
};
use serde_json::Value;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::tools::ToolRuntime;

use handlers::{execute_handler, health_handler, metrics_handler, ready_handler, schema_handler};

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub runtime: ToolRuntime,
    /// Rendered once; the schema cannot change after the runtime is built.
    pub schema_document: Arc<Value>,
}

impl AppState {
    pub fn new(runtime: ToolRuntime) -> Self {
        let schema_document = Arc::new(runtime.schema_document());
        Self {
            runtime,
            schema_document,
        }
    }
}

/// Build the router for a runtime.
pub fn router(runtime: ToolRuntime, config: &ServerConfig) -> Router {
    let app = Router::new()
        .route("/api/execute", post(execute_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/schema", get(schema_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(AppState::new(runtime))
        .layer(DefaultBodyLimit::max(config.max_body_bytes));

    let app = match cors_layer(&config.cors_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    };
    app.layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    let layer = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);
    let layer = if origins.iter().any(|o| o == "*") {
        layer.allow_headers(Any)
    } else {
        layer.allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-request-id"),
        ])
    };
    Some(layer)
}

/// Bind and serve until `shutdown` resolves.
///
/// The runtime should already be started; requests arriving before that are
/// answered with `TOOL_NOT_RUNNING`.
pub async fn serve(
    runtime: ToolRuntime,
    config: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let addr_str = config.bind_addr();
    let addr: SocketAddr = addr_str
        .parse()
        .map_err(|e: std::net::AddrParseError| ServerError::InvalidAddress {
            addr: addr_str.clone(),
            reason: e.to_string(),
        })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr_str.clone(),
            source,
        })?;

    tracing::info!(
        tool = %runtime.metadata().name,
        auth = config.auth_enabled(),
        "Tool server listening on http://{}",
        addr
    );

    axum::serve(listener, router(runtime, config))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Tool server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_disabled_without_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["*".to_string()]).is_some());
        assert!(cors_layer(&["https://a.example".to_string()]).is_some());
    }

    #[tokio::test]
    async fn test_serve_rejects_bad_address() {
        let config = ServerConfig {
            host: "not an address".to_string(),
            ..ServerConfig::default()
        };
        let runtime = ToolRuntime::builder(Arc::new(crate::testing::EchoHandler::default()))
            .build()
            .unwrap();
        let err = serve(runtime, &config, async {}).await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidAddress { .. }));
    }
}
