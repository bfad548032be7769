//! Tool execution runtime.
//!
//! Wraps a [`ToolHandler`] in the request lifecycle:
//!
//! ```text
//! state check ─► auth ─► rate limit ─► parse body ─► validate input
//!      ─► resolve config ─► execute (timeout, panic guard) ─► normalize ─► metrics
//! ```
//!
//! Every step that rejects a request produces an [`ExecutionResult`] with a
//! stable error code; nothing past this boundary ever sees a panic or a raw
//! handler error.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::watch;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{EnvSource, ProcessEnv};
use crate::docs;
use crate::error::{ErrorKind, RuntimeError};
use crate::schema::{FieldDefinition, FieldKind, ToolSchema};
use crate::tools::context::{DebugFlags, ExecutionContext, SecurityInfo};
use crate::tools::metrics::{
    DEFAULT_HISTORY_CAPACITY, ExecutionMetrics, HistoryEntry, MetricsSnapshot,
};
use crate::tools::rate_limiter::{RateLimitConfig, RateLimitResult, RateLimiter};
use crate::tools::redaction::{
    collect_secret_strings, collect_sensitive_strings, redact_all_values, redact_with_schema,
    scrub_text,
};
use crate::tools::result::{ExecutionError, ExecutionResult, Timing, duration_to_ms};
use crate::tools::security::{ApiKeys, caller_identity};
use crate::tools::state::{Lifecycle, StateTransition, ToolState};
use crate::tools::tool::{HealthStatus, ToolError, ToolHandler, ToolMetadata};
use crate::validation::{
    CompiledSchema, FieldError, UnknownFields, ValidationEngine, ValidationMetrics,
    ValidationOptions, ValidationOutcome,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const NOT_RUNNING_RETRY_AFTER: Duration = Duration::from_secs(1);
const DEFAULT_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Knobs for one runtime. Usually derived from
/// [`ServerConfig::runtime_settings`](crate::config::ServerConfig::runtime_settings).
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Default execution budget; a handler may override it.
    pub timeout: Duration,
    pub api_keys: ApiKeys,
    pub rate_limit: Option<RateLimitConfig>,
    pub development: bool,
    pub history_capacity: usize,
    pub unknown_fields: UnknownFields,
    /// A handler health check still pending after this reports unhealthy.
    pub health_check_timeout: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            api_keys: ApiKeys::default(),
            rate_limit: None,
            development: false,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            unknown_fields: UnknownFields::Strip,
            health_check_timeout: DEFAULT_HEALTH_CHECK_TIMEOUT,
        }
    }
}

/// One execution request as it arrives from the transport.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    /// Raw request body, parsed by the runtime so malformed JSON is reported
    /// as `INVALID_JSON`.
    pub body: String,
    pub credential: Option<String>,
    pub forwarded_for: Option<String>,
    pub request_id: Option<String>,
}

impl ExecutionRequest {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Request with `input_data` and an optional `config` override.
    pub fn json(input_data: Value, config: Option<Value>) -> Self {
        let mut body = json!({ "input_data": input_data });
        if let Some(config) = config {
            body["config"] = config;
        }
        Self::new(body.to_string())
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn with_forwarded_for(mut self, addr: impl Into<String>) -> Self {
        self.forwarded_for = Some(addr.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteBody {
    #[serde(default)]
    input_data: Value,
    #[serde(default)]
    config: Option<Value>,
}

/// Health report served by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub state: ToolState,
    pub version: String,
    pub tool_metadata: ToolMetadata,
    pub capabilities: Vec<String>,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ConfigState {
    /// Values as supplied, before env fallback and defaults.
    raw: Map<String, Value>,
    /// Validated config handed to the handler.
    validated: Option<Value>,
}

struct RuntimeInner {
    handler: Arc<dyn ToolHandler>,
    metadata: ToolMetadata,
    schema: ToolSchema,
    input: Arc<CompiledSchema>,
    config_schema: Arc<CompiledSchema>,
    engine: ValidationEngine,
    limiter: Option<RateLimiter>,
    metrics: ExecutionMetrics,
    lifecycle: Mutex<Lifecycle>,
    config: RwLock<ConfigState>,
    settings: RuntimeSettings,
    clock: Arc<dyn Clock>,
    env: Arc<dyn EnvSource>,
    /// Bumped by `stop()`; in-flight executions watch it to cancel.
    stop_generation: watch::Sender<u64>,
}

/// Builder for [`ToolRuntime`].
pub struct ToolRuntimeBuilder {
    handler: Arc<dyn ToolHandler>,
    settings: RuntimeSettings,
    clock: Arc<dyn Clock>,
    env: Arc<dyn EnvSource>,
}

impl ToolRuntimeBuilder {
    pub fn settings(mut self, settings: RuntimeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Source for config `env_var` fallbacks.
    pub fn env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    /// Compile both schemas and assemble the runtime in `stopped` state.
    pub fn build(self) -> Result<ToolRuntime, RuntimeError> {
        let metadata = self.handler.metadata();
        let schema = self.handler.schema();
        let engine = ValidationEngine::new();
        let input = engine.compiler().compile(&schema.input)?;
        let config_schema = engine.compiler().compile(&schema.config)?;

        if self.settings.timeout.is_zero() {
            return Err(RuntimeError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }

        let limiter = self
            .settings
            .rate_limit
            .clone()
            .map(|config| RateLimiter::new(config, Arc::clone(&self.clock)));
        let metrics =
            ExecutionMetrics::new(self.settings.history_capacity, Arc::clone(&self.clock));

        tracing::debug!(
            tool = %metadata.name,
            version = %metadata.version,
            input_fields = schema.input.fields().len(),
            config_fields = schema.config.fields().len(),
            "Tool runtime built"
        );

        Ok(ToolRuntime {
            inner: Arc::new(RuntimeInner {
                handler: self.handler,
                metadata,
                schema,
                input,
                config_schema,
                engine,
                limiter,
                metrics,
                lifecycle: Mutex::new(Lifecycle::new()),
                config: RwLock::new(ConfigState::default()),
                settings: self.settings,
                clock: self.clock,
                env: self.env,
                stop_generation: watch::channel(0).0,
            }),
        })
    }
}

/// A tool handler plus everything the runtime keeps for it.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ToolRuntime {
    inner: Arc<RuntimeInner>,
}

impl std::fmt::Debug for ToolRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRuntime")
            .field("tool", &self.inner.metadata.name)
            .field("state", &self.state())
            .finish()
    }
}

impl ToolRuntime {
    pub fn builder(handler: Arc<dyn ToolHandler>) -> ToolRuntimeBuilder {
        ToolRuntimeBuilder {
            handler,
            settings: RuntimeSettings::default(),
            clock: Arc::new(SystemClock),
            env: Arc::new(ProcessEnv),
        }
    }

    /// Runtime with the system clock and process environment.
    pub fn new(
        handler: Arc<dyn ToolHandler>,
        settings: RuntimeSettings,
    ) -> Result<Self, RuntimeError> {
        Self::builder(handler).settings(settings).build()
    }

    pub fn metadata(&self) -> &ToolMetadata {
        &self.inner.metadata
    }

    pub fn schema(&self) -> &ToolSchema {
        &self.inner.schema
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.inner.settings
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        match self.inner.lifecycle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Lifecycle lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn state(&self) -> ToolState {
        self.lifecycle().state()
    }

    pub fn transitions(&self) -> Vec<StateTransition> {
        self.lifecycle().transitions().to_vec()
    }

    fn transition(
        &self,
        action: &'static str,
        to: ToolState,
        reason: Option<String>,
    ) -> Result<(), RuntimeError> {
        let mut lifecycle = self.lifecycle();
        let from = lifecycle.state();
        lifecycle
            .transition_to(to, self.inner.clock.now(), reason)
            .map_err(|_| RuntimeError::InvalidState {
                action,
                state: from,
            })?;
        tracing::debug!(tool = %self.inner.metadata.name, %from, %to, "Tool state changed");
        Ok(())
    }

    /// Resolve and validate config, then cache it for every later request.
    ///
    /// Each config field takes the supplied value, else its `env_var`, else
    /// its default.
    pub fn set_config(&self, raw: Value) -> Result<Value, RuntimeError> {
        let raw = match raw {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(RuntimeError::InvalidConfig(format!(
                    "config must be an object, got {}",
                    json_type(&other)
                )));
            }
        };

        let validated = self
            .validate_config(&raw)
            .map_err(|errors| RuntimeError::InvalidConfig(describe_errors(&errors)))?;

        let mut state = match self.inner.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Config lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        state.raw = raw;
        state.validated = Some(validated.clone());
        Ok(validated)
    }

    fn validate_config(&self, raw: &Map<String, Value>) -> Result<Value, Vec<FieldError>> {
        let resolved = self.resolve_env(raw.clone());
        let options = ValidationOptions {
            unknown_fields: UnknownFields::Strip,
            ..ValidationOptions::default()
        };
        self.inner
            .engine
            .validate_compiled(&self.inner.config_schema, &Value::Object(resolved), &options)
            .into_result()
    }

    fn resolve_env(&self, mut config: Map<String, Value>) -> Map<String, Value> {
        for (name, def) in self.inner.schema.config.fields() {
            if config.get(name).is_some_and(|v| !v.is_null()) {
                continue;
            }
            if let Some(var) = def.env_var()
                && let Some(raw) = self.inner.env.var(var)
            {
                config.insert(name.clone(), coerce_env_value(def, raw));
            }
        }
        config
    }

    fn config_snapshot(&self) -> (Map<String, Value>, Option<Value>) {
        let state = match self.inner.config.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (state.raw.clone(), state.validated.clone())
    }

    /// Start serving: validate config, run the handler's `setup`.
    ///
    /// Allowed from `stopped` or `failed`. A setup or config failure leaves
    /// the tool in `failed`.
    pub async fn start(&self, raw_config: Value) -> Result<(), RuntimeError> {
        self.transition("start", ToolState::Starting, None)?;
        let name = &self.inner.metadata.name;

        let config = match self.set_config(raw_config) {
            Ok(config) => config,
            Err(e) => {
                self.transition("fail", ToolState::Failed, Some(e.to_string()))?;
                tracing::error!(tool = %name, error = %e, "Tool config rejected");
                return Err(e);
            }
        };

        tracing::debug!(tool = %name, config = %redact_all_values(&config), "Tool config validated");

        if let Err(e) = self.inner.handler.setup(&config).await {
            let secrets = collect_secret_strings(&config);
            let reason = scrub_text(&e.to_string(), &secrets);
            self.transition("fail", ToolState::Failed, Some(reason.clone()))?;
            tracing::error!(tool = %name, error = %reason, "Tool setup failed");
            return Err(RuntimeError::StartupFailed { reason });
        }

        self.transition("run", ToolState::Running, None)?;
        tracing::info!(tool = %name, version = %self.inner.metadata.version, "Tool started");
        Ok(())
    }

    /// Stop serving, cancel in-flight executions and run the handler's
    /// `cleanup`. Metrics are kept.
    pub async fn stop(&self) -> Result<(), RuntimeError> {
        if self.state() == ToolState::Failed {
            return self.transition("stop", ToolState::Stopped, Some("reset".to_string()));
        }

        self.transition("stop", ToolState::Stopping, None)?;
        self.inner.stop_generation.send_modify(|generation| *generation += 1);
        if let Err(e) = self.inner.handler.cleanup().await {
            tracing::warn!(tool = %self.inner.metadata.name, error = %e, "Tool cleanup failed");
        }
        if let Some(limiter) = &self.inner.limiter {
            limiter.clear_all().await;
        }
        self.transition("stop", ToolState::Stopped, None)?;
        tracing::info!(tool = %self.inner.metadata.name, "Tool stopped");
        Ok(())
    }

    /// Run one request through the full lifecycle.
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let execution_id = Uuid::new_v4();
        let started = Instant::now();
        let mut timing = Timing::new(self.inner.clock.now());

        let result = self
            .execute_inner(execution_id, request, started, &mut timing)
            .await;

        self.inner.metrics.record(&result);
        match result.error() {
            None => tracing::info!(
                %execution_id,
                tool = %self.inner.metadata.name,
                duration_ms = result.timing().total_ms,
                "Execution succeeded"
            ),
            Some(err) => tracing::warn!(
                %execution_id,
                tool = %self.inner.metadata.name,
                status = result.status().as_str(),
                code = %err.code,
                duration_ms = result.timing().total_ms,
                "Execution failed"
            ),
        }
        result
    }

    async fn execute_inner(
        &self,
        execution_id: Uuid,
        request: ExecutionRequest,
        started: Instant,
        timing: &mut Timing,
    ) -> ExecutionResult {
        let fail = |error: ExecutionError, timing: &mut Timing| {
            timing.total_ms = elapsed_ms(started);
            ExecutionResult::failure(execution_id, error, timing.clone())
        };

        // Subscribed before the state check so a stop racing this request
        // is still seen.
        let mut stopped = self.inner.stop_generation.subscribe();

        let state = self.state();
        if !state.accepts_requests() {
            return fail(
                ExecutionError::new(
                    "TOOL_NOT_RUNNING",
                    format!("Tool is {state}"),
                    ErrorKind::System,
                )
                .with_retryable(true)
                .with_retry_after(NOT_RUNNING_RETRY_AFTER),
                timing,
            );
        }

        // 1. Authentication
        let settings = &self.inner.settings;
        let authenticated_key = if settings.api_keys.is_enabled() {
            match request.credential.as_deref() {
                Some(key) if settings.api_keys.verify(key) => Some(key),
                _ => {
                    return fail(
                        ExecutionError::new(
                            "AUTHENTICATION_REQUIRED",
                            "A valid API key is required",
                            ErrorKind::Client,
                        ),
                        timing,
                    );
                }
            }
        } else {
            None
        };

        // 2. Rate limiting
        let caller_id = caller_identity(authenticated_key, request.forwarded_for.as_deref());
        let mut rate_limit_remaining = None;
        if let Some(limiter) = &self.inner.limiter {
            match limiter.check_and_record(&caller_id).await {
                RateLimitResult::Allowed { remaining } => rate_limit_remaining = Some(remaining),
                RateLimitResult::Limited { retry_after } => {
                    return fail(
                        ExecutionError::new(
                            "RATE_LIMIT_EXCEEDED",
                            format!(
                                "Rate limit of {} requests per {}s exceeded",
                                limiter.config().max_requests,
                                limiter.config().window.as_secs()
                            ),
                            ErrorKind::Client,
                        )
                        .with_retryable(true)
                        .with_retry_after(retry_after),
                        timing,
                    );
                }
            }
        }

        // 3. Body parsing
        let body: ExecuteBody = match serde_json::from_str(&request.body) {
            Ok(body) => body,
            Err(e) => {
                return fail(
                    ExecutionError::new(
                        "INVALID_JSON",
                        format!("Request body is not valid JSON: {e}"),
                        ErrorKind::Validation,
                    ),
                    timing,
                );
            }
        };

        // 4. Input validation
        let validation_started = Instant::now();
        let options = ValidationOptions {
            unknown_fields: settings.unknown_fields,
            ..ValidationOptions::default()
        };
        let input = match self.inner.engine.validate_compiled(
            &self.inner.input,
            &body.input_data,
            &options,
        ) {
            ValidationOutcome::Valid { data } => data,
            ValidationOutcome::Invalid { errors } => {
                timing.validation_ms = elapsed_ms(validation_started);
                return fail(
                    ExecutionError::new(
                        "INPUT_VALIDATION_FAILED",
                        describe_errors(&errors),
                        ErrorKind::Validation,
                    )
                    .with_details(json!({ "errors": errors })),
                    timing,
                );
            }
        };

        // 5. Config: request override merged over the configured values, else
        // the cached validated config.
        let (raw_config, cached_config) = self.config_snapshot();
        let config = match body.config {
            Some(Value::Object(overrides)) => {
                let mut merged = raw_config;
                merged.extend(overrides);
                match self.validate_config(&merged) {
                    Ok(config) => config,
                    Err(errors) => {
                        timing.validation_ms = elapsed_ms(validation_started);
                        return fail(config_error(&errors), timing);
                    }
                }
            }
            Some(Value::Null) | None => {
                cached_config.unwrap_or_else(|| Value::Object(Map::new()))
            }
            Some(other) => {
                return fail(
                    ExecutionError::new(
                        "CONFIG_VALIDATION_FAILED",
                        format!("config must be an object, got {}", json_type(&other)),
                        ErrorKind::Validation,
                    ),
                    timing,
                );
            }
        };
        timing.validation_ms = elapsed_ms(validation_started);

        tracing::debug!(
            %execution_id,
            input = %redact_with_schema(&input, &self.inner.schema.input),
            "Input validated"
        );

        // 6. Execution
        let budget = self
            .inner
            .handler
            .execution_timeout()
            .unwrap_or(settings.timeout);
        let ctx = ExecutionContext::new(
            self.inner.metadata.name.clone(),
            self.inner.metadata.version.clone(),
            timing.started_at,
        )
        .with_request_id(request.request_id)
        .with_security(SecurityInfo {
            caller_id,
            authenticated: authenticated_key.is_some(),
            permissions: Vec::new(),
            rate_limit_remaining,
        })
        .with_timeout(budget)
        .with_debug(DebugFlags {
            development: settings.development,
            verbose: false,
        });
        let ctx = ExecutionContext { execution_id, ..ctx };

        let mut secrets = collect_secret_strings(&config);
        secrets.extend(collect_sensitive_strings(&input, &self.inner.schema.input));
        let execution_started = Instant::now();
        let guarded = tokio::time::timeout(
            budget,
            AssertUnwindSafe(self.inner.handler.execute(input, config, &ctx)).catch_unwind(),
        );
        let outcome = tokio::select! {
            outcome = guarded => Some(outcome),
            _ = stopped.changed() => None,
        };
        timing.execution_ms = elapsed_ms(execution_started);
        timing.total_ms = elapsed_ms(started);

        let Some(outcome) = outcome else {
            return ExecutionResult::cancelled(
                execution_id,
                "Tool stopped while the request was in flight",
                timing.clone(),
            );
        };

        // 7. Normalization
        match outcome {
            Ok(Ok(Ok(output))) => ExecutionResult::success(execution_id, output, timing.clone()),
            Ok(Ok(Err(e))) => {
                let mut error = ExecutionError::from(&e);
                error.message = scrub_text(&error.message, &secrets);
                if matches!(e, ToolError::Internal(_)) && !settings.development {
                    error.message = "Internal error".to_string();
                }
                ExecutionResult::failure(execution_id, error, timing.clone())
            }
            Ok(Err(panic)) => {
                let text = scrub_text(&panic_message(panic.as_ref()), &secrets);
                tracing::error!(%execution_id, panic = %text, "Tool handler panicked");
                let mut error =
                    ExecutionError::new("INTERNAL_ERROR", "Internal error", ErrorKind::System);
                if settings.development {
                    error = error.with_details(json!({ "panic": text }));
                }
                ExecutionResult::failure(execution_id, error, timing.clone())
            }
            Err(_elapsed) => ExecutionResult::timeout(execution_id, budget, timing.clone()),
        }
    }

    /// Built-in state plus the handler's own health check.
    pub async fn health(&self) -> HealthReport {
        let (state, running_since) = {
            let lifecycle = self.lifecycle();
            (lifecycle.state(), lifecycle.running_since())
        };
        let status = if state.accepts_requests() {
            let limit = self.inner.settings.health_check_timeout;
            match tokio::time::timeout(limit, self.inner.handler.health_check()).await {
                Ok(status) => status,
                Err(_) => {
                    tracing::warn!(
                        tool = %self.inner.metadata.name,
                        timeout_ms = duration_to_ms(limit),
                        "Health check timed out"
                    );
                    HealthStatus::Unhealthy
                }
            }
        } else {
            HealthStatus::Unhealthy
        };
        let now = self.inner.clock.now();
        let uptime_seconds = running_since
            .map(|since| u64::try_from((now - since).num_seconds()).unwrap_or(0))
            .unwrap_or(0);

        HealthReport {
            status,
            state,
            version: self.inner.metadata.version.clone(),
            tool_metadata: self.inner.metadata.clone(),
            capabilities: self.inner.metadata.capabilities.clone(),
            uptime_seconds,
            timestamp: now,
        }
    }

    /// OpenAPI document for this tool.
    pub fn schema_document(&self) -> Value {
        docs::openapi_document(&self.inner.metadata, &self.inner.schema)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.metrics.history()
    }

    pub fn validation_metrics(&self) -> ValidationMetrics {
        self.inner.engine.get_metrics()
    }
}

fn config_error(errors: &[FieldError]) -> ExecutionError {
    ExecutionError::new(
        "CONFIG_VALIDATION_FAILED",
        describe_errors(errors),
        ErrorKind::Validation,
    )
    .with_details(json!({ "errors": errors }))
}

/// Environment values are strings; coerce them to the field's JSON type.
/// Anything that does not parse is passed through so validation reports it.
fn coerce_env_value(def: &FieldDefinition, raw: String) -> Value {
    match def.kind() {
        FieldKind::Number(_) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|n| {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    Some(Value::from(n as i64))
                } else {
                    serde_json::Number::from_f64(n).map(Value::Number)
                }
            })
            .unwrap_or(Value::String(raw)),
        FieldKind::Boolean => match crate::config::helpers::parse_bool(&raw) {
            Some(b) => Value::Bool(b),
            None => Value::String(raw),
        },
        FieldKind::Array(_) | FieldKind::Object(_) | FieldKind::Json(_) | FieldKind::File(_) => {
            serde_json::from_str(&raw).unwrap_or(Value::String(raw))
        }
        _ => Value::String(raw),
    }
}

fn describe_errors(errors: &[FieldError]) -> String {
    let parts: Vec<String> = errors
        .iter()
        .map(|e| {
            let path = e.path_string();
            if path.is_empty() {
                e.message.clone()
            } else {
                format!("{path}: {}", e.message)
            }
        })
        .collect();
    format!("Validation failed: {}", parts.join("; "))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    duration_to_ms(since.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::MapEnv;
    use crate::schema::{Schema, api_key_field, number_field, string_field};
    use crate::testing::{EchoHandler, FailingHandler, PanickingHandler, SlowHandler};
    use crate::tools::result::ExecutionStatus;

    fn echo_schema() -> ToolSchema {
        ToolSchema::new(
            Schema::new()
                .field("message", string_field().required())
                .field("count", number_field().range(1, 10).integer().default(1)),
            Schema::new()
                .field("apiKey", api_key_field().min_length(1).required())
                .field(
                    "region",
                    string_field().env_var("ECHO_REGION").default("us-east-1"),
                ),
        )
    }

    fn runtime(settings: RuntimeSettings) -> ToolRuntime {
        ToolRuntime::builder(Arc::new(EchoHandler::new(echo_schema())))
            .settings(settings)
            .clock(Arc::new(ManualClock::new()))
            .env(Arc::new(MapEnv::new()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_rejects_requests_until_started() {
        let rt = runtime(RuntimeSettings::default());
        let result = rt
            .execute(ExecutionRequest::json(json!({"message": "hi"}), None))
            .await;
        assert_eq!(result.error().unwrap().code, "TOOL_NOT_RUNNING");
        assert!(result.error().unwrap().retryable);
    }

    #[tokio::test]
    async fn test_defaults_applied_end_to_end() {
        let rt = runtime(RuntimeSettings::default());
        rt.start(json!({"apiKey": "k"})).await.unwrap();

        let result = rt
            .execute(ExecutionRequest::json(json!({"message": "hi"}), None))
            .await;
        assert_eq!(result.status(), ExecutionStatus::Success);
        assert_eq!(result.data().unwrap()["input"]["count"], 1);
        assert_eq!(result.data().unwrap()["config"]["region"], "us-east-1");
    }

    #[tokio::test]
    async fn test_env_fallback_between_request_and_default() {
        let rt = ToolRuntime::builder(Arc::new(EchoHandler::new(echo_schema())))
            .env(Arc::new(MapEnv::new().with("ECHO_REGION", "eu-west-1")))
            .build()
            .unwrap();
        let config = rt.set_config(json!({"apiKey": "k"})).unwrap();
        assert_eq!(config["region"], "eu-west-1");

        let config = rt
            .set_config(json!({"apiKey": "k", "region": "ap-south-1"}))
            .unwrap();
        assert_eq!(config["region"], "ap-south-1");
    }

    #[tokio::test]
    async fn test_invalid_json_and_validation_errors() {
        let rt = runtime(RuntimeSettings::default());
        rt.start(json!({"apiKey": "k"})).await.unwrap();

        let result = rt.execute(ExecutionRequest::new("{not json")).await;
        assert_eq!(result.error().unwrap().code, "INVALID_JSON");

        let result = rt
            .execute(ExecutionRequest::json(json!({"count": 50}), None))
            .await;
        let err = result.error().unwrap();
        assert_eq!(err.code, "INPUT_VALIDATION_FAILED");
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(!err.retryable);
        assert_eq!(err.details.as_ref().unwrap()["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_request_config_is_merged_and_validated() {
        let rt = runtime(RuntimeSettings::default());
        rt.start(json!({"apiKey": "k"})).await.unwrap();

        let result = rt
            .execute(ExecutionRequest::json(
                json!({"message": "hi"}),
                Some(json!({"region": "eu-central-1"})),
            ))
            .await;
        let data = result.data().unwrap();
        assert_eq!(data["config"]["region"], "eu-central-1");
        assert_eq!(data["config"]["apiKey"], "k");

        let result = rt
            .execute(ExecutionRequest::json(
                json!({"message": "hi"}),
                Some(json!({"region": 5})),
            ))
            .await;
        assert_eq!(result.error().unwrap().code, "CONFIG_VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn test_authentication() {
        let rt = runtime(RuntimeSettings {
            api_keys: ApiKeys::from_strs(["secret-key"]),
            ..RuntimeSettings::default()
        });
        rt.start(json!({"apiKey": "k"})).await.unwrap();

        let request = ExecutionRequest::json(json!({"message": "hi"}), None);
        let result = rt.execute(request.clone()).await;
        assert_eq!(result.error().unwrap().code, "AUTHENTICATION_REQUIRED");

        let result = rt.execute(request.clone().with_credential("wrong")).await;
        assert_eq!(result.error().unwrap().code, "AUTHENTICATION_REQUIRED");

        let result = rt.execute(request.with_credential("secret-key")).await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_handler_errors_are_normalized_and_scrubbed() {
        let handler = FailingHandler::new(ToolError::Network {
            message: "upstream refused key sk-live-abcdef".into(),
            retry_after: None,
        })
        .with_schema(ToolSchema::new(
            Schema::new(),
            Schema::new().field("apiKey", api_key_field()),
        ));
        let rt = ToolRuntime::builder(Arc::new(handler)).build().unwrap();
        rt.start(json!({"apiKey": "sk-live-abcdef"})).await.unwrap();

        let result = rt.execute(ExecutionRequest::json(json!({}), None)).await;
        let err = result.error().unwrap();
        assert_eq!(err.code, "NETWORK_ERROR");
        assert!(err.retryable);
        assert_eq!(err.retry_after_ms, Some(1000));
        assert!(!err.message.contains("sk-live-abcdef"));
    }

    #[tokio::test]
    async fn test_panic_becomes_system_error() {
        let rt = ToolRuntime::builder(Arc::new(PanickingHandler))
            .build()
            .unwrap();
        rt.start(json!({})).await.unwrap();

        let result = rt.execute(ExecutionRequest::json(json!({}), None)).await;
        let err = result.error().unwrap();
        assert_eq!(err.code, "INTERNAL_ERROR");
        assert_eq!(err.kind, ErrorKind::System);
        assert!(err.details.is_none());
    }

    #[tokio::test]
    async fn test_timeout() {
        let rt = ToolRuntime::builder(Arc::new(SlowHandler::new(Duration::from_secs(5))))
            .settings(RuntimeSettings {
                timeout: Duration::from_millis(50),
                ..RuntimeSettings::default()
            })
            .build()
            .unwrap();
        rt.start(json!({})).await.unwrap();

        let result = rt.execute(ExecutionRequest::json(json!({}), None)).await;
        assert_eq!(result.status(), ExecutionStatus::Timeout);
        assert_eq!(result.error().unwrap().kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let rt = runtime(RuntimeSettings::default());
        assert_eq!(rt.state(), ToolState::Stopped);
        assert!(matches!(
            rt.stop().await,
            Err(RuntimeError::InvalidState { action: "stop", .. })
        ));

        // Missing required config fails startup.
        assert!(rt.start(json!({})).await.is_err());
        assert_eq!(rt.state(), ToolState::Failed);

        rt.start(json!({"apiKey": "k"})).await.unwrap();
        assert_eq!(rt.state(), ToolState::Running);
        assert!(rt.start(json!({"apiKey": "k"})).await.is_err());

        rt.stop().await.unwrap();
        assert_eq!(rt.state(), ToolState::Stopped);
        assert_eq!(rt.health().await.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_metrics_survive_restart() {
        let rt = runtime(RuntimeSettings::default());
        rt.start(json!({"apiKey": "k"})).await.unwrap();
        rt.execute(ExecutionRequest::json(json!({"message": "a"}), None))
            .await;
        rt.stop().await.unwrap();
        rt.start(json!({"apiKey": "k"})).await.unwrap();
        rt.execute(ExecutionRequest::json(json!({"message": "b"}), None))
            .await;

        let snap = rt.metrics();
        assert_eq!(snap.total_executions, 2);
        assert_eq!(snap.successful_executions, 2);
    }

    #[test]
    fn test_coerce_env_values() {
        let n = number_field().build();
        assert_eq!(coerce_env_value(&n, "42".into()), json!(42));
        assert_eq!(coerce_env_value(&n, "0.5".into()), json!(0.5));
        assert_eq!(coerce_env_value(&n, "lots".into()), json!("lots"));

        let b = crate::schema::boolean_field().build();
        assert_eq!(coerce_env_value(&b, "true".into()), json!(true));
    }
}
