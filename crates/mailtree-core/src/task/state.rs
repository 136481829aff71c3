//! Task lifecycle states and failure values.

use std::fmt;

use mailtree_imap::Status;

use super::TaskId;

/// Why a task failed.
///
/// Failures are values stored in [`TaskState::Failed`], never errors thrown
/// across component boundaries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Response data the task could not interpret.
    #[error("parse error: {0}")]
    Parse(String),

    /// A well-formed response that makes no sense in the task's current state.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered NO or BAD.
    #[error("{command} failed: {status} {text}")]
    CommandFailed {
        /// Command name, never including arguments.
        command: &'static str,
        /// NO or BAD.
        status: Status,
        /// Server text.
        text: String,
    },

    /// The transport closed or failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Credentials were rejected or unavailable.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network access is disabled by policy.
    #[error("network access is disabled")]
    Offline,

    /// The task was cancelled.
    #[error("aborted")]
    Aborted,

    /// The task this one depended on failed.
    #[error("dependency {parent} failed: {cause}")]
    DependencyFailed {
        /// The failed parent.
        parent: TaskId,
        /// Its failure.
        cause: Box<TaskError>,
    },
}

impl TaskError {
    /// Failure for a tagged NO/BAD completion.
    #[must_use]
    pub fn command_failed(command: &'static str, status: Status, text: impl Into<String>) -> Self {
        Self::CommandFailed {
            command,
            status,
            text: text.into(),
        }
    }

    /// The failure at the start of a dependency chain.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::DependencyFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// Where a task is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaskState {
    /// Registered, not yet examined by the scheduler.
    #[default]
    Created,
    /// Waiting for its parent to complete.
    WaitingOnDependency,
    /// Queued for its connection.
    WaitingOnConnection,
    /// Issuing commands or holding a mailbox open.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Failed(TaskError),
    /// Cancelled; any later response is discarded.
    Aborted,
}

impl TaskState {
    /// Returns true for Completed, Failed and Aborted.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Aborted)
    }

    /// The failure value, if failed.
    #[must_use]
    pub const fn error(&self) -> Option<&TaskError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::WaitingOnDependency => f.write_str("waiting on dependency"),
            Self::WaitingOnConnection => f.write_str("waiting on connection"),
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("completed"),
            Self::Failed(e) => write!(f, "failed: {e}"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}
