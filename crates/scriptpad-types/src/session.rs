//! Session lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an execution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No script is running.
    Idle,
    /// A child process is executing the script.
    Running,
    /// Stop was requested; waiting for the OS to confirm termination.
    Terminating,
    /// The process has exited and both output streams are drained.
    Terminated,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Terminating => "terminating",
            SessionState::Terminated => "terminated",
        };
        write!(f, "{}", name)
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// The process ran to completion and returned this exit code.
    Exited(i32),
    /// The process was stopped on request, or died to a signal.
    /// There is no meaningful exit code.
    Terminated,
}

impl ExitStatus {
    /// The real exit code, if the process exited on its own.
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(*code),
            ExitStatus::Terminated => None,
        }
    }

    /// True when the process exited on its own with code 0.
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }
}

/// Point-in-time view of a runner, safe to hand to a UI thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Id of the current (or most recent) session, if any ever started.
    pub session_id: Option<Uuid>,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Set if and only if `state` is [`SessionState::Terminated`].
    pub exit_status: Option<ExitStatus>,
    /// When the current session's process was spawned.
    pub started_at: Option<DateTime<Utc>>,
}
