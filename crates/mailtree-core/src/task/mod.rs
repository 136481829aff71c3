//! Tasks: units of protocol work with an explicit state machine.
//!
//! A task optionally depends on one parent task and, when it issues
//! commands, is bound to one connection. The coordinator owns every task
//! and calls into it when the task starts and when a response for it
//! arrives; the task answers with a [`Step`].
//!
//! ```text
//! Created ─► WaitingOnDependency ─► WaitingOnConnection ─► Running ─► Completed
//!                  │                                          │   └─► Failed
//!                  └──────────── parent failed ──────────────►┘
//!            (any state) ─► Aborted
//! ```

mod connection;
mod context;
mod fake;
mod fetch;
mod listing;
mod mailbox;
mod manage;
mod mutate;
pub(crate) mod registry;
mod state;

use std::fmt;

use mailtree_imap::parser::{TaggedResponse, UntaggedResponse};

pub use connection::{GetAnyConnectionTask, OfflineConnectionTask, OpenConnectionTask};
pub use context::TaskContext;
pub use fake::{FakeListChildMailboxesTask, FakeOpenConnectionTask};
pub use fetch::{FetchDetail, FetchMsgMetadataTask, FetchMsgPartTask, FetchSelection};
pub use listing::ListChildMailboxesTask;
pub use mailbox::{KeepMailboxOpenTask, ObtainSynchronizedMailboxTask};
pub use manage::{
    CreateMailboxTask, DeleteMailboxTask, ExpungeMailboxTask, NumberOfMessagesTask,
};
pub use mutate::{CopyMode, CopyMoveMessagesTask, UpdateFlagsTask};
pub use state::{TaskError, TaskState};

/// Identity of a task; assigned in request order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a task wants after handling an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Keep running.
    Continue,
    /// Finished successfully.
    Done,
    /// Finished with a failure.
    Fail(TaskError),
}

impl Step {
    /// `Done` for a tagged OK, otherwise a [`TaskError::CommandFailed`].
    #[must_use]
    pub fn from_completion(command: &'static str, response: &TaggedResponse) -> Self {
        if response.status.is_ok() {
            Self::Done
        } else {
            Self::Fail(TaskError::command_failed(
                command,
                response.status,
                &response.text,
            ))
        }
    }
}

/// How a task reacts to its parent failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Fail too, with [`TaskError::DependencyFailed`].
    Cascade,
    /// The task produced its result another way and is complete.
    Recovered,
}

/// A unit of protocol work.
///
/// Implementations stage any data they collect and apply it to the mailbox
/// tree only when their command completes, so a task that fails midway
/// leaves no partial result behind.
pub trait Task: Send + fmt::Debug {
    /// Short name for logs and events.
    fn name(&self) -> &'static str;

    /// Whether the task must hold its connection while running.
    ///
    /// Tasks returning false start as soon as their parent completes.
    fn needs_connection(&self) -> bool {
        true
    }

    /// Called once when the task starts running.
    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step;

    /// Offers untagged data; `None` leaves it to the mailbox owner.
    fn handle_untagged(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        _response: &UntaggedResponse,
    ) -> Option<Step> {
        None
    }

    /// Delivers the tagged completion of a command this task issued.
    fn handle_tagged(&mut self, ctx: &mut TaskContext<'_>, response: &TaggedResponse) -> Step;

    /// Called instead of [`start`](Self::start) when the parent failed.
    fn on_parent_failed(&mut self, _ctx: &mut TaskContext<'_>, _error: &TaskError) -> Recovery {
        Recovery::Cascade
    }
}
