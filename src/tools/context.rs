//! Per-request execution context handed to tool handlers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scheduling hint passed through to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Who is calling and what they are allowed to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityInfo {
    /// Caller identity used for rate limiting. Never the raw credential.
    pub caller_id: String,
    pub authenticated: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Requests left in the caller's rate-limit window, when limiting is on.
    pub rate_limit_remaining: Option<u32>,
}

impl Default for SecurityInfo {
    fn default() -> Self {
        Self {
            caller_id: crate::tools::security::ANONYMOUS_CALLER.to_string(),
            authenticated: false,
            permissions: Vec::new(),
            rate_limit_remaining: None,
        }
    }
}

/// Time and priority budget for one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceBudget {
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    pub priority: Priority,
}

impl Default for PerformanceBudget {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            priority: Priority::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebugFlags {
    /// Development mode: error details include internal messages.
    pub development: bool,
    /// Ask the handler for verbose diagnostics.
    pub verbose: bool,
}

/// Context for a single execution.
///
/// Created fresh at request entry, borrowed by the handler, dropped once the
/// response is built. Nothing in it is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub execution_id: Uuid,
    pub tool_id: String,
    pub tool_version: String,
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied correlation id (`x-request-id`).
    pub request_id: Option<String>,
    pub security: SecurityInfo,
    pub budget: PerformanceBudget,
    pub debug: DebugFlags,
}

impl ExecutionContext {
    pub fn new(
        tool_id: impl Into<String>,
        tool_version: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            tool_id: tool_id.into(),
            tool_version: tool_version.into(),
            timestamp,
            request_id: None,
            security: SecurityInfo::default(),
            budget: PerformanceBudget::default(),
            debug: DebugFlags::default(),
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_security(mut self, security: SecurityInfo) -> Self {
        self.security = security;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.budget.timeout = timeout;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.budget.priority = priority;
        self
    }

    pub fn with_debug(mut self, debug: DebugFlags) -> Self {
        self.debug = debug;
        self
    }

    /// Whether the caller holds a permission. Authenticated callers with no
    /// explicit permission list are trusted for everything.
    pub fn has_permission(&self, permission: &str) -> bool {
        if self.security.permissions.is_empty() {
            return self.security.authenticated;
        }
        self.security.permissions.iter().any(|p| p == permission)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ids_per_context() {
        let now = Utc::now();
        let a = ExecutionContext::new("echo", "1.0.0", now);
        let b = ExecutionContext::new("echo", "1.0.0", now);
        assert_ne!(a.execution_id, b.execution_id);
        assert_eq!(a.security.caller_id, "anonymous");
    }

    #[test]
    fn test_budget_serializes_in_millis() {
        let ctx = ExecutionContext::new("echo", "1.0.0", Utc::now())
            .with_timeout(Duration::from_millis(1500))
            .with_priority(Priority::High);
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["budget"]["timeout"], 1500);
        assert_eq!(json["budget"]["priority"], "high");
    }

    #[test]
    fn test_permissions() {
        let mut ctx = ExecutionContext::new("echo", "1.0.0", Utc::now());
        assert!(!ctx.has_permission("read"));

        ctx.security.authenticated = true;
        assert!(ctx.has_permission("read"));

        ctx.security.permissions = vec!["read".to_string()];
        assert!(ctx.has_permission("read"));
        assert!(!ctx.has_permission("write"));
    }
}
