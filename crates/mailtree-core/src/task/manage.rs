//! Mailbox management commands.

use mailtree_imap::parser::{FetchItem, StatusItem, TaggedResponse, UntaggedResponse};
use mailtree_imap::{Command, Mailbox, SeqNum, StatusAttribute};

use super::{Step, Task, TaskContext};
use crate::tree::{MailboxCounts, MailboxInfo, MessageRef, TreePath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CreatePhase {
    Create,
    List,
}

/// Creates a mailbox, then lists it to learn its attributes.
#[derive(Debug)]
pub struct CreateMailboxTask {
    mailbox: Mailbox,
    phase: CreatePhase,
    staged: Option<MailboxInfo>,
}

impl CreateMailboxTask {
    /// Creates the task.
    #[must_use]
    pub const fn new(mailbox: Mailbox) -> Self {
        Self {
            mailbox,
            phase: CreatePhase::Create,
            staged: None,
        }
    }
}

impl Task for CreateMailboxTask {
    fn name(&self) -> &'static str {
        "CreateMailbox"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        let create = Command::Create {
            mailbox: self.mailbox.clone(),
        };
        match ctx.send(&create) {
            Ok(_) => Step::Continue,
            Err(e) => Step::Fail(e),
        }
    }

    fn handle_untagged(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        response: &UntaggedResponse,
    ) -> Option<Step> {
        match response {
            UntaggedResponse::List(list) if list.mailbox == self.mailbox => {
                self.staged = Some(MailboxInfo::from(list));
                Some(Step::Continue)
            }
            _ => None,
        }
    }

    fn handle_tagged(&mut self, ctx: &mut TaskContext<'_>, response: &TaggedResponse) -> Step {
        match self.phase {
            CreatePhase::Create => {
                let step = Step::from_completion("CREATE", response);
                if step != Step::Done {
                    return step;
                }
                self.phase = CreatePhase::List;
                let list = Command::List {
                    reference: String::new(),
                    pattern: self.mailbox.as_str().to_string(),
                };
                match ctx.send(&list) {
                    Ok(_) => Step::Continue,
                    Err(e) => Step::Fail(e),
                }
            }
            CreatePhase::List => {
                // the mailbox exists even if LIST could not describe it
                let info = self.staged.take().unwrap_or_else(|| MailboxInfo {
                    delimiter: ctx.tree().delimiter(None),
                    ..MailboxInfo::named(self.mailbox.clone())
                });
                ctx.tree_mut().add_mailbox(info);
                Step::Done
            }
        }
    }
}

/// Deletes a mailbox and forgets everything cached below it.
#[derive(Debug)]
pub struct DeleteMailboxTask {
    mailbox: Mailbox,
}

impl DeleteMailboxTask {
    /// Creates the task.
    #[must_use]
    pub const fn new(mailbox: Mailbox) -> Self {
        Self { mailbox }
    }
}

impl Task for DeleteMailboxTask {
    fn name(&self) -> &'static str {
        "DeleteMailbox"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        let delete = Command::Delete {
            mailbox: self.mailbox.clone(),
        };
        match ctx.send(&delete) {
            Ok(_) => Step::Continue,
            Err(e) => Step::Fail(e),
        }
    }

    fn handle_tagged(&mut self, ctx: &mut TaskContext<'_>, response: &TaggedResponse) -> Step {
        let step = Step::from_completion("DELETE", response);
        if step == Step::Done {
            ctx.tree_mut().remove_mailbox(&self.mailbox);
            ctx.forget(&TreePath::Mailbox(self.mailbox.clone()));
        }
        step
    }
}

/// Sequence-addressed data received while EXPUNGE runs.
#[derive(Debug)]
enum Staged {
    Expunge(SeqNum),
    Fetch(SeqNum, Vec<FetchItem>),
}

/// Permanently removes `\Deleted` messages from the selected mailbox.
///
/// EXPUNGE and FETCH data arriving meanwhile are held and replayed in wire
/// order once the command completes, so every sequence number is applied
/// against the list it was relative to.
#[derive(Debug)]
pub struct ExpungeMailboxTask {
    mailbox: Mailbox,
    staged: Vec<Staged>,
}

impl ExpungeMailboxTask {
    /// Creates the task.
    #[must_use]
    pub const fn new(mailbox: Mailbox) -> Self {
        Self {
            mailbox,
            staged: Vec::new(),
        }
    }
}

impl Task for ExpungeMailboxTask {
    fn name(&self) -> &'static str {
        "ExpungeMailbox"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        if let Err(e) = ctx.ensure_selected(&self.mailbox) {
            return Step::Fail(e);
        }
        match ctx.send(&Command::Expunge) {
            Ok(_) => Step::Continue,
            Err(e) => Step::Fail(e),
        }
    }

    fn handle_untagged(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        response: &UntaggedResponse,
    ) -> Option<Step> {
        let staged = match response {
            UntaggedResponse::Expunge(seq) => Staged::Expunge(*seq),
            UntaggedResponse::Fetch { seq, items } => Staged::Fetch(*seq, items.clone()),
            _ => return None,
        };
        self.staged.push(staged);
        Some(Step::Continue)
    }

    fn handle_tagged(&mut self, ctx: &mut TaskContext<'_>, response: &TaggedResponse) -> Step {
        // the server reported these whatever the outcome
        let tree = ctx.tree_mut();
        for staged in std::mem::take(&mut self.staged) {
            match staged {
                Staged::Expunge(seq) => {
                    tree.expunge(&self.mailbox, seq);
                }
                Staged::Fetch(seq, items) => {
                    tree.update_message(&self.mailbox, MessageRef::Seq(seq), &items);
                }
            }
        }
        Step::from_completion("EXPUNGE", response)
    }
}

/// Reads message counters with STATUS.
#[derive(Debug)]
pub struct NumberOfMessagesTask {
    mailbox: Mailbox,
    staged: Option<MailboxCounts>,
}

impl NumberOfMessagesTask {
    /// Creates the task.
    #[must_use]
    pub const fn new(mailbox: Mailbox) -> Self {
        Self {
            mailbox,
            staged: None,
        }
    }
}

impl Task for NumberOfMessagesTask {
    fn name(&self) -> &'static str {
        "NumberOfMessages"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        let status = Command::Status {
            mailbox: self.mailbox.clone(),
            items: vec![
                StatusAttribute::Messages,
                StatusAttribute::Recent,
                StatusAttribute::Unseen,
            ],
        };
        match ctx.send(&status) {
            Ok(_) => Step::Continue,
            Err(e) => Step::Fail(e),
        }
    }

    fn handle_untagged(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        response: &UntaggedResponse,
    ) -> Option<Step> {
        let UntaggedResponse::Status { mailbox, items } = response else {
            return None;
        };
        if *mailbox != self.mailbox {
            return None;
        }
        let counts = self.staged.get_or_insert_with(MailboxCounts::default);
        for item in items {
            match item {
                StatusItem::Messages(n) => counts.messages = *n,
                StatusItem::Recent(n) => counts.recent = *n,
                StatusItem::Unseen(n) => counts.unseen = *n,
                StatusItem::UidNext(_) | StatusItem::UidValidity(_) => {}
            }
        }
        Some(Step::Continue)
    }

    fn handle_tagged(&mut self, ctx: &mut TaskContext<'_>, response: &TaggedResponse) -> Step {
        let step = Step::from_completion("STATUS", response);
        if step == Step::Done {
            let counts = self.staged.take().unwrap_or_default();
            ctx.tree_mut().set_counts(&self.mailbox, counts);
        }
        step
    }
}
