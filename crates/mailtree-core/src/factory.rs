//! Construction of concrete tasks.
//!
//! The coordinator never names a concrete task type; it asks a
//! [`TaskFactory`]. [`TestingTaskFactory`] swaps connection establishment and
//! child listing for fakes, so whole task chains run without a server.

use std::collections::HashMap;
use std::fmt;

use mailtree_imap::{FlagOperation, Flags, Mailbox, Uid, UidSet};

use crate::task::{
    CopyMode, CopyMoveMessagesTask, CreateMailboxTask, DeleteMailboxTask, ExpungeMailboxTask,
    FakeListChildMailboxesTask, FakeOpenConnectionTask, FetchDetail, FetchMsgMetadataTask,
    FetchMsgPartTask, FetchSelection, GetAnyConnectionTask, KeepMailboxOpenTask,
    ListChildMailboxesTask, NumberOfMessagesTask, ObtainSynchronizedMailboxTask,
    OfflineConnectionTask, OpenConnectionTask, Task, TaskId, UpdateFlagsTask,
};
use crate::tree::MailboxInfo;

/// Builds the task for each kind of work.
///
/// Every method has a default returning the real task; implementations
/// override only what they substitute.
pub trait TaskFactory: Send + fmt::Debug {
    /// Authenticates a new connection.
    fn open_connection(&self) -> Box<dyn Task> {
        Box::new(OpenConnectionTask::new())
    }

    /// Waits for a free connection.
    fn get_any_connection(&self) -> Box<dyn Task> {
        Box::new(GetAnyConnectionTask::new())
    }

    /// Fails dependents while offline.
    fn offline_connection(&self) -> Box<dyn Task> {
        Box::new(OfflineConnectionTask::new())
    }

    /// Selects and synchronizes a mailbox on behalf of `keeper`.
    fn obtain_synchronized_mailbox(&self, mailbox: &Mailbox, keeper: TaskId) -> Box<dyn Task> {
        Box::new(ObtainSynchronizedMailboxTask::new(mailbox.clone(), keeper))
    }

    /// Keeps a mailbox selected.
    fn keep_mailbox_open(&self, mailbox: &Mailbox) -> Box<dyn Task> {
        Box::new(KeepMailboxOpenTask::new(mailbox.clone()))
    }

    /// Lists children of a mailbox or of the root.
    fn list_child_mailboxes(&self, parent: Option<&Mailbox>) -> Box<dyn Task> {
        Box::new(ListChildMailboxesTask::new(parent.cloned()))
    }

    /// Creates a mailbox.
    fn create_mailbox(&self, mailbox: &Mailbox) -> Box<dyn Task> {
        Box::new(CreateMailboxTask::new(mailbox.clone()))
    }

    /// Deletes a mailbox.
    fn delete_mailbox(&self, mailbox: &Mailbox) -> Box<dyn Task> {
        Box::new(DeleteMailboxTask::new(mailbox.clone()))
    }

    /// Expunges the selected mailbox.
    fn expunge_mailbox(&self, mailbox: &Mailbox) -> Box<dyn Task> {
        Box::new(ExpungeMailboxTask::new(mailbox.clone()))
    }

    /// Reads message counters.
    fn number_of_messages(&self, mailbox: &Mailbox) -> Box<dyn Task> {
        Box::new(NumberOfMessagesTask::new(mailbox.clone()))
    }

    /// Fetches message metadata.
    fn fetch_msg_metadata(
        &self,
        mailbox: &Mailbox,
        selection: FetchSelection,
        detail: FetchDetail,
    ) -> Box<dyn Task> {
        Box::new(FetchMsgMetadataTask::new(mailbox.clone(), selection, detail))
    }

    /// Fetches full metadata as background work.
    fn prefetch(&self, mailbox: &Mailbox, selection: FetchSelection) -> Box<dyn Task> {
        Box::new(FetchMsgMetadataTask::new(mailbox.clone(), selection, FetchDetail::Full).background())
    }

    /// Downloads a body part.
    fn fetch_msg_part(&self, mailbox: &Mailbox, uid: Uid, part_id: &str) -> Box<dyn Task> {
        Box::new(FetchMsgPartTask::new(mailbox.clone(), uid, part_id))
    }

    /// Changes flags.
    fn update_flags(
        &self,
        mailbox: &Mailbox,
        uids: UidSet,
        operation: FlagOperation,
        flags: Flags,
    ) -> Box<dyn Task> {
        Box::new(UpdateFlagsTask::new(mailbox.clone(), uids, operation, flags))
    }

    /// Copies or moves messages.
    fn copy_move_messages(
        &self,
        source: &Mailbox,
        uids: UidSet,
        target: &Mailbox,
        mode: CopyMode,
    ) -> Box<dyn Task> {
        Box::new(CopyMoveMessagesTask::new(source.clone(), uids, target.clone(), mode))
    }
}

/// Builds the real tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImapTaskFactory;

impl TaskFactory for ImapTaskFactory {}

/// Builds fakes for connection establishment and child listing.
///
/// Connections come up pre-authenticated with the configured capabilities;
/// listings come from [`with_children`](Self::with_children). Everything
/// else is the real task, so commands still go through the connection and
/// tests play the server side.
#[derive(Debug, Clone, Default)]
pub struct TestingTaskFactory {
    capabilities: Vec<String>,
    children: HashMap<Option<Mailbox>, Vec<MailboxInfo>>,
}

impl TestingTaskFactory {
    /// Creates a factory with no extra capabilities and empty listings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capabilities announced by fake connections besides `IMAP4rev1`.
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Listing returned for `parent` (`None` is the root).
    #[must_use]
    pub fn with_children(mut self, parent: Option<Mailbox>, children: Vec<MailboxInfo>) -> Self {
        self.children.insert(parent, children);
        self
    }
}

impl TaskFactory for TestingTaskFactory {
    fn open_connection(&self) -> Box<dyn Task> {
        Box::new(FakeOpenConnectionTask::new(self.capabilities.clone()))
    }

    fn list_child_mailboxes(&self, parent: Option<&Mailbox>) -> Box<dyn Task> {
        let children = self
            .children
            .get(&parent.cloned())
            .cloned()
            .unwrap_or_default();
        Box::new(FakeListChildMailboxesTask::new(parent.cloned(), children))
    }
}
