//! Events published to collaborators.

use mailtree_imap::ConnectionState;

use crate::model::ConnectionId;
use crate::policy::NetworkPolicy;
use crate::task::{TaskId, TaskState};
use crate::tree::TreePath;

/// Something collaborators may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A task reached a terminal state.
    TaskFinished {
        /// The task.
        id: TaskId,
        /// Its name.
        name: &'static str,
        /// Completed, Failed or Aborted.
        state: TaskState,
    },
    /// A node of the mailbox tree changed.
    CacheChanged(TreePath),
    /// Server `[ALERT]` text, which must be shown to the user.
    Alert {
        /// Connection that carried it.
        connection: ConnectionId,
        /// Alert text.
        text: String,
    },
    /// A connection was lost and its pending tasks failed.
    ConnectionError {
        /// The lost connection.
        connection: ConnectionId,
        /// Transport or server reason.
        message: String,
    },
    /// A connection changed state.
    ConnectionStateChanged {
        /// The connection.
        connection: ConnectionId,
        /// Its new state.
        state: ConnectionState,
    },
    /// A password is being requested from the credential provider.
    CredentialsRequested {
        /// Login name.
        username: String,
        /// 1 for the first request, higher after rejections.
        attempt: u32,
    },
    /// The network policy changed.
    PolicyChanged {
        /// Previous policy.
        from: NetworkPolicy,
        /// New policy.
        to: NetworkPolicy,
    },
    /// A response could not be parsed; the connection carried on.
    ParseError {
        /// The connection.
        connection: ConnectionId,
        /// Offending bytes.
        raw: Vec<u8>,
        /// Parser diagnostic.
        message: String,
    },
}
