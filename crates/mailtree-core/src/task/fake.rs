//! Deterministic stand-ins used by [`TestingTaskFactory`](crate::TestingTaskFactory).

use mailtree_imap::Mailbox;
use mailtree_imap::parser::TaggedResponse;

use super::{Step, Task, TaskContext};
use crate::tree::MailboxInfo;

/// Authenticates its connection without any transport.
///
/// The connection is fed a PREAUTH greeting carrying the configured
/// capabilities, exactly as if a server had sent it.
#[derive(Debug, Clone)]
pub struct FakeOpenConnectionTask {
    capabilities: Vec<String>,
}

impl FakeOpenConnectionTask {
    /// Creates the task.
    #[must_use]
    pub const fn new(capabilities: Vec<String>) -> Self {
        Self { capabilities }
    }

    fn greeting(&self) -> Vec<u8> {
        let mut caps = vec!["IMAP4rev1".to_string()];
        caps.extend(self.capabilities.iter().cloned());
        format!("* PREAUTH [CAPABILITY {}] fake server ready\r\n", caps.join(" ")).into_bytes()
    }
}

impl Task for FakeOpenConnectionTask {
    fn name(&self) -> &'static str {
        "FakeOpenConnection"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        let greeting = self.greeting();
        ctx.inject(&greeting);
        Step::Done
    }

    fn handle_tagged(&mut self, _ctx: &mut TaskContext<'_>, _response: &TaggedResponse) -> Step {
        Step::Done
    }
}

/// Installs a fixed child listing.
#[derive(Debug, Clone)]
pub struct FakeListChildMailboxesTask {
    parent: Option<Mailbox>,
    children: Vec<MailboxInfo>,
}

impl FakeListChildMailboxesTask {
    /// Creates the task.
    #[must_use]
    pub const fn new(parent: Option<Mailbox>, children: Vec<MailboxInfo>) -> Self {
        Self { parent, children }
    }
}

impl Task for FakeListChildMailboxesTask {
    fn name(&self) -> &'static str {
        "FakeListChildMailboxes"
    }

    fn needs_connection(&self) -> bool {
        false
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        let children = self.children.clone();
        ctx.tree_mut().set_children(self.parent.as_ref(), children);
        Step::Done
    }

    fn handle_tagged(&mut self, _ctx: &mut TaskContext<'_>, _response: &TaggedResponse) -> Step {
        Step::Done
    }
}
