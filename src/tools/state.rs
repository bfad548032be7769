//! Tool lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a tool runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolState {
    /// Not serving. Initial state.
    #[default]
    Stopped,
    /// Compiling schemas, validating config, running setup.
    Starting,
    /// Accepting execution requests.
    Running,
    /// Draining and running cleanup.
    Stopping,
    /// Startup failed. Can be restarted or reset to stopped.
    Failed,
}

impl ToolState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: ToolState) -> bool {
        use ToolState::*;

        matches!(
            (self, target),
            (Stopped, Starting) | (Failed, Starting) |
            (Starting, Running) | (Starting, Failed) |
            (Running, Stopping) |
            (Stopping, Stopped) |
            (Failed, Stopped)
        )
    }

    /// Only a running tool accepts execution requests.
    pub fn accepts_requests(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for ToolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A state transition event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ToolState,
    pub to: ToolState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Current state plus a capped transition history.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    state: ToolState,
    transitions: Vec<StateTransition>,
    running_since: Option<DateTime<Utc>>,
}

impl Lifecycle {
    const MAX_TRANSITIONS: usize = 50;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ToolState {
        self.state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// When the tool last entered `Running`, if it is running now.
    pub fn running_since(&self) -> Option<DateTime<Utc>> {
        self.running_since
    }

    /// Transition to a new state.
    pub fn transition_to(
        &mut self,
        new_state: ToolState,
        at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<(), String> {
        if !self.state.can_transition_to(new_state) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.state, new_state
            ));
        }

        self.transitions.push(StateTransition {
            from: self.state,
            to: new_state,
            timestamp: at,
            reason,
        });
        if self.transitions.len() > Self::MAX_TRANSITIONS {
            let drain_count = self.transitions.len() - Self::MAX_TRANSITIONS;
            self.transitions.drain(..drain_count);
        }

        self.state = new_state;
        self.running_since = (new_state == ToolState::Running).then_some(at);
        Ok(())
    }
}
