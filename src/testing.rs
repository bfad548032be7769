//! Test handlers and a harness for building started runtimes.
//!
//! Provides:
//! - [`EchoHandler`]: returns its validated input and config
//! - [`SlowHandler`]: sleeps before answering, for timeout tests
//! - [`FailingHandler`]: always returns a fixed [`ToolError`]
//! - [`PanickingHandler`]: panics inside `execute`
//! - [`TestHarnessBuilder`]: wires a [`ToolRuntime`] with a manual clock and
//!   an in-memory environment, then starts it
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use toolsmith::testing::{EchoHandler, TestHarnessBuilder};
//!
//! # async fn demo() {
//! let harness = TestHarnessBuilder::new(Arc::new(EchoHandler::default()))
//!     .build()
//!     .await;
//! assert!(harness.runtime.state().accepts_requests());
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::clock::ManualClock;
use crate::config::MapEnv;
use crate::schema::ToolSchema;
use crate::tools::{
    ExecutionContext, HealthStatus, RuntimeSettings, ToolError, ToolHandler, ToolMetadata,
    ToolOutput, ToolRuntime,
};

/// Returns `{"input": ..., "config": ...}` exactly as the handler saw them.
#[derive(Debug, Default)]
pub struct EchoHandler {
    schema: ToolSchema,
    call_count: AtomicU32,
    health: Option<HealthStatus>,
}

impl EchoHandler {
    pub fn new(schema: ToolSchema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Report this status from `health_check`.
    pub fn with_health(mut self, status: HealthStatus) -> Self {
        self.health = Some(status);
        self
    }

    /// Number of times `execute` ran.
    pub fn calls(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ToolHandler for EchoHandler {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new("echo", "1.0.0")
            .with_description("Echoes validated input and config")
            .with_capability("echo")
    }

    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(
        &self,
        input: Value,
        config: Value,
        ctx: &ExecutionContext,
    ) -> Result<ToolOutput, ToolError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        Ok(ToolOutput::success(json!({
            "input": input,
            "config": config,
            "request_id": ctx.request_id,
        })))
    }

    async fn health_check(&self) -> HealthStatus {
        self.health.unwrap_or_default()
    }
}

/// Sleeps for a fixed delay, then succeeds.
#[derive(Debug)]
pub struct SlowHandler {
    delay: Duration,
    finished: Arc<AtomicBool>,
}

impl SlowHandler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Effectively never resolves within any test budget.
    pub fn never() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }

    /// Whether any execution ran to completion.
    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ToolHandler for SlowHandler {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new("slow", "1.0.0")
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::default()
    }

    async fn execute(
        &self,
        _input: Value,
        _config: Value,
        _ctx: &ExecutionContext,
    ) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::Relaxed);
        Ok(ToolOutput::text("done"))
    }
}

/// Always fails with the same error.
#[derive(Debug)]
pub struct FailingHandler {
    error: ToolError,
    schema: ToolSchema,
}

impl FailingHandler {
    pub fn new(error: ToolError) -> Self {
        Self {
            error,
            schema: ToolSchema::default(),
        }
    }

    pub fn with_schema(mut self, schema: ToolSchema) -> Self {
        self.schema = schema;
        self
    }
}

#[async_trait]
impl ToolHandler for FailingHandler {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new("failing", "1.0.0")
    }

    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(
        &self,
        _input: Value,
        _config: Value,
        _ctx: &ExecutionContext,
    ) -> Result<ToolOutput, ToolError> {
        Err(self.error.clone())
    }
}

/// Panics on every execution.
#[derive(Debug, Default)]
pub struct PanickingHandler;

#[async_trait]
impl ToolHandler for PanickingHandler {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new("panicking", "1.0.0")
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::default()
    }

    async fn execute(
        &self,
        _input: Value,
        _config: Value,
        _ctx: &ExecutionContext,
    ) -> Result<ToolOutput, ToolError> {
        panic!("handler exploded");
    }
}

/// A started runtime plus the clock driving it.
pub struct TestHarness {
    pub runtime: ToolRuntime,
    pub clock: Arc<ManualClock>,
}

/// Builder for a [`TestHarness`].
///
/// Defaults: manual clock, empty environment, default settings, empty
/// config passed to `start`.
pub struct TestHarnessBuilder {
    handler: Arc<dyn ToolHandler>,
    settings: RuntimeSettings,
    env: MapEnv,
    config: Value,
}

impl TestHarnessBuilder {
    pub fn new(handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            handler,
            settings: RuntimeSettings::default(),
            env: MapEnv::new(),
            config: json!({}),
        }
    }

    pub fn with_settings(mut self, settings: RuntimeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_env(mut self, env: MapEnv) -> Self {
        self.env = env;
        self
    }

    /// Config passed to `start`.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Build and start the runtime. Panics if either step fails.
    pub async fn build(self) -> TestHarness {
        let clock = Arc::new(ManualClock::new());
        let runtime = ToolRuntime::builder(self.handler)
            .settings(self.settings)
            .clock(clock.clone())
            .env(Arc::new(self.env))
            .build()
            .expect("failed to build test runtime");
        runtime
            .start(self.config)
            .await
            .expect("failed to start test runtime");
        TestHarness { runtime, clock }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_harness_starts_runtime() {
        let harness = TestHarnessBuilder::new(Arc::new(EchoHandler::default()))
            .build()
            .await;
        assert!(harness.runtime.state().accepts_requests());
    }

    #[tokio::test]
    async fn test_echo_counts_calls() {
        let handler = EchoHandler::default();
        let ctx = ExecutionContext::new("echo", "1.0.0", chrono::Utc::now());
        let out = handler
            .execute(json!({"a": 1}), json!({}), &ctx)
            .await
            .unwrap();
        assert_eq!(out.data["input"], json!({"a": 1}));
        assert_eq!(handler.calls(), 1);
    }
}
