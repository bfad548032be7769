//! Per-caller rate limiter for execution requests.
//!
//! # Rate Limit Algorithm
//!
//! Sliding window log: each caller keeps the instants of its accepted
//! requests inside the current window.
//! - Drop instants older than the window
//! - Reject if the remaining count is at the limit, with `retry_after` set to
//!   when the oldest instant leaves the window
//! - Otherwise record the request
//!
//! Each log holds at most `max_requests` entries, and callers whose logs have
//! emptied are pruned periodically, so memory stays bounded by the number of
//! recently active callers.
//!
//! # Persistence
//!
//! State is in-memory only and resets on process restart.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::clock::Clock;

/// Sweep idle callers after this many checks.
const PRUNE_INTERVAL: u32 = 256;

/// Request budget per caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum accepted requests per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl RateLimitConfig {
    /// Create a config with explicit limits.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed.
    Allowed {
        /// Requests left in the current window after this one.
        remaining: u32,
    },
    /// Request is rate limited.
    Limited {
        /// When the oldest request leaves the window.
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    windows: HashMap<String, VecDeque<Instant>>,
    checks_since_prune: u32,
}

/// In-memory rate limiter keyed by caller identity.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<LimiterState>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: RwLock::new(LimiterState::default()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Expire old entries, then record the request if the caller is under
    /// the limit.
    pub async fn check_and_record(&self, caller: &str) -> RateLimitResult {
        let now = self.clock.instant();
        let window = self.config.window;

        let mut state = self.state.write().await;
        state.checks_since_prune += 1;
        if state.checks_since_prune >= PRUNE_INTERVAL {
            state.checks_since_prune = 0;
            state
                .windows
                .retain(|_, log| log.back().is_some_and(|last| now.duration_since(*last) < window));
        }

        let log = state.windows.entry(caller.to_string()).or_default();
        while log
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= window)
        {
            log.pop_front();
        }

        let used = u32::try_from(log.len()).unwrap_or(u32::MAX);
        if used >= self.config.max_requests {
            let retry_after = log
                .front()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);
            return RateLimitResult::Limited { retry_after };
        }

        log.push_back(now);
        RateLimitResult::Allowed {
            remaining: self.config.max_requests - used - 1,
        }
    }

    /// Clear all rate limit state.
    pub async fn clear_all(&self) {
        self.state.write().await.windows.clear();
    }

    #[cfg(test)]
    async fn tracked_callers(&self) -> usize {
        self.state.read().await.windows.len()
    }
}
