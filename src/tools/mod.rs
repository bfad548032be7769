//! Tool runtime.
//!
//! A tool is a [`ToolHandler`] (user logic plus its schemas) wrapped in a
//! [`ToolRuntime`] that owns the lifecycle, authentication, rate limiting,
//! validation, timeouts and metrics around each execution.

pub mod context;
pub mod metrics;
pub mod rate_limiter;
pub mod redaction;
pub mod result;
pub mod runtime;
pub mod security;
pub mod state;

mod tool;

pub use context::{DebugFlags, ExecutionContext, PerformanceBudget, Priority, SecurityInfo};
pub use metrics::{ExecutionMetrics, HistoryEntry, MetricsSnapshot, RecentError};
pub use rate_limiter::{RateLimitConfig, RateLimitResult, RateLimiter};
pub use result::{ExecutionError, ExecutionResult, ExecutionStatus, ResultMetadata, Timing};
pub use runtime::{
    ExecutionRequest, HealthReport, RuntimeSettings, ToolRuntime, ToolRuntimeBuilder,
};
pub use security::ApiKeys;
pub use state::{Lifecycle, StateTransition, ToolState};
pub use tool::{HealthStatus, ToolError, ToolHandler, ToolMetadata, ToolOutput};
