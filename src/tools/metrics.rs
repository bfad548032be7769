//! Execution metrics and a bounded execution history.
//!
//! Each [`ToolRuntime`](crate::tools::ToolRuntime) owns one
//! [`ExecutionMetrics`]; nothing here is process-global, so two runtimes in
//! one process never share counters.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::tools::result::{ExecutionResult, ExecutionStatus};

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
const RECENT_ERRORS: usize = 10;
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// One entry of the execution history ring buffer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    recorded_at: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentError {
    pub execution_id: Uuid,
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time view served by `/metrics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    /// Mean latency over the buffered history window.
    pub average_execution_time_ms: f64,
    pub error_rate_percent: f64,
    pub requests_per_minute: u64,
    pub uptime_seconds: u64,
    pub recent_errors: Vec<RecentError>,
    pub error_counts: HashMap<String, u64>,
}

#[derive(Debug)]
struct MetricsState {
    total: u64,
    successful: u64,
    failed: u64,
    error_counts: HashMap<String, u64>,
    history: VecDeque<HistoryEntry>,
}

/// Counters plus history, updated under one lock so a snapshot never sees a
/// half-applied execution.
#[derive(Debug)]
pub struct ExecutionMetrics {
    state: Mutex<MetricsState>,
    capacity: usize,
    clock: Arc<dyn Clock>,
    created_at: Instant,
}

impl ExecutionMetrics {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = capacity.max(1);
        let created_at = clock.instant();
        Self {
            state: Mutex::new(MetricsState {
                total: 0,
                successful: 0,
                failed: 0,
                error_counts: HashMap::new(),
                history: VecDeque::with_capacity(capacity),
            }),
            capacity,
            clock,
            created_at,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Execution metrics lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Record a finished execution.
    pub fn record(&self, result: &ExecutionResult) {
        let entry = HistoryEntry {
            execution_id: result.execution_id(),
            status: result.status(),
            duration_ms: result.timing().total_ms,
            error_code: result.error().map(|e| e.code.clone()),
            error_message: result.error().map(|e| e.message.clone()),
            timestamp: self.clock.now(),
            recorded_at: Some(self.clock.instant()),
        };

        let mut state = self.lock();
        state.total += 1;
        if result.is_success() {
            state.successful += 1;
        } else {
            state.failed += 1;
        }
        if let Some(code) = &entry.error_code {
            *state.error_counts.entry(code.clone()).or_insert(0) += 1;
        }
        if state.history.len() == self.capacity {
            state.history.pop_front();
        }
        state.history.push_back(entry);
    }

    /// Buffered history, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = self.clock.instant();
        let state = self.lock();

        let average_execution_time_ms = if state.history.is_empty() {
            0.0
        } else {
            let sum: u64 = state.history.iter().map(|e| e.duration_ms).sum();
            sum as f64 / state.history.len() as f64
        };
        let error_rate_percent = if state.total == 0 {
            0.0
        } else {
            state.failed as f64 * 100.0 / state.total as f64
        };
        let requests_per_minute = state
            .history
            .iter()
            .filter(|e| {
                e.recorded_at
                    .is_some_and(|at| now.saturating_duration_since(at) < RATE_WINDOW)
            })
            .count() as u64;
        let recent_errors = state
            .history
            .iter()
            .rev()
            .filter_map(|e| {
                Some(RecentError {
                    execution_id: e.execution_id,
                    code: e.error_code.clone()?,
                    message: e.error_message.clone().unwrap_or_default(),
                    timestamp: e.timestamp,
                })
            })
            .take(RECENT_ERRORS)
            .collect();

        MetricsSnapshot {
            total_executions: state.total,
            successful_executions: state.successful,
            failed_executions: state.failed,
            average_execution_time_ms,
            error_rate_percent,
            requests_per_minute,
            uptime_seconds: now.saturating_duration_since(self.created_at).as_secs(),
            recent_errors,
            error_counts: state.error_counts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ErrorKind;
    use crate::tools::result::{ExecutionError, Timing};
    use crate::tools::tool::ToolOutput;
    use serde_json::json;

    fn success(ms: u64) -> ExecutionResult {
        let mut timing = Timing::new(Utc::now());
        timing.total_ms = ms;
        ExecutionResult::success(Uuid::new_v4(), ToolOutput::success(json!(null)), timing)
    }

    fn failure(code: &str) -> ExecutionResult {
        ExecutionResult::failure(
            Uuid::new_v4(),
            ExecutionError::new(code, "boom", ErrorKind::Execution),
            Timing::new(Utc::now()),
        )
    }

    #[test]
    fn test_counters_and_rates() {
        let clock = Arc::new(ManualClock::new());
        let metrics = ExecutionMetrics::new(10, clock.clone());

        metrics.record(&success(10));
        metrics.record(&success(30));
        metrics.record(&failure("EXECUTION_FAILED"));
        metrics.record(&failure("EXECUTION_FAILED"));

        let snap = metrics.snapshot();
        assert_eq!(snap.total_executions, 4);
        assert_eq!(snap.successful_executions, 2);
        assert_eq!(snap.failed_executions, 2);
        assert_eq!(snap.error_rate_percent, 50.0);
        assert_eq!(snap.average_execution_time_ms, 10.0);
        assert_eq!(snap.error_counts["EXECUTION_FAILED"], 2);
        assert_eq!(snap.recent_errors.len(), 2);
        assert_eq!(snap.requests_per_minute, 4);

        clock.advance(Duration::from_secs(61));
        let snap = metrics.snapshot();
        assert_eq!(snap.requests_per_minute, 0);
        assert_eq!(snap.uptime_seconds, 61);
    }

    #[test]
    fn test_history_is_bounded() {
        let metrics = ExecutionMetrics::new(3, Arc::new(ManualClock::new()));
        for ms in 0..5 {
            metrics.record(&success(ms));
        }
        let history = metrics.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].duration_ms, 2);
        // Counters are not bounded by the buffer.
        assert_eq!(metrics.snapshot().total_executions, 5);
    }

    #[test]
    fn test_recent_errors_newest_first_and_capped() {
        let metrics = ExecutionMetrics::new(50, Arc::new(ManualClock::new()));
        for i in 0..15 {
            metrics.record(&failure(&format!("E{i}")));
        }
        let snap = metrics.snapshot();
        assert_eq!(snap.recent_errors.len(), RECENT_ERRORS);
        assert_eq!(snap.recent_errors[0].code, "E14");
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let metrics = ExecutionMetrics::new(5, Arc::new(ManualClock::new()));
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        for key in [
            "totalExecutions",
            "successfulExecutions",
            "failedExecutions",
            "averageExecutionTimeMs",
            "errorRatePercent",
            "requestsPerMinute",
            "uptimeSeconds",
            "recentErrors",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
