//! Tool invocation lifecycle tracking.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{QaError, Result};

/// Lifecycle state of one tool invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvocationState {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
    TimedOut,
    Skipped,
}

impl InvocationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvocationState::Completed
                | InvocationState::Failed
                | InvocationState::TimedOut
                | InvocationState::Skipped
        )
    }

    /// Allowed edges of the lifecycle graph.
    ///
    /// `Failed` is reachable from every non-terminal state so that an
    /// interrupt can terminate invocations that never started.
    pub fn can_advance_to(&self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Pending, Scheduled)
                | (Pending, Skipped)
                | (Pending, Failed)
                | (Scheduled, Running)
                | (Scheduled, Failed)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, TimedOut)
                | (Running, Skipped)
        )
    }
}

/// Transient per-tool record owned by the controller while the tool runs.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool_id: String,
    pub files: Vec<PathBuf>,
    pub started_at: Option<DateTime<Utc>>,
    state: InvocationState,
}

impl ToolInvocation {
    pub fn new(tool_id: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            tool_id: tool_id.into(),
            files,
            started_at: None,
            state: InvocationState::Pending,
        }
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Move to `next`, rejecting edges outside the lifecycle graph.
    pub fn advance(&mut self, next: InvocationState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(QaError::Internal(format!(
                "invalid invocation transition for {}: {:?} -> {:?}",
                self.tool_id, self.state, next
            )));
        }
        if next == InvocationState::Running {
            self.started_at = Some(Utc::now());
        }
        self.state = next;
        Ok(())
    }
}
