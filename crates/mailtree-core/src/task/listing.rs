use mailtree_imap::parser::{TaggedResponse, UntaggedResponse};
use mailtree_imap::{Command, Mailbox};
use tracing::debug;

use super::{Recovery, Step, Task, TaskContext, TaskError};
use crate::store::CacheEntry;
use crate::tree::{MailboxInfo, TreePath};

/// Lists the direct children of a mailbox, or of the root.
///
/// If the connection it depends on fails, a persisted listing is served
/// instead.
#[derive(Debug)]
pub struct ListChildMailboxesTask {
    parent: Option<Mailbox>,
    staged: Vec<MailboxInfo>,
}

impl ListChildMailboxesTask {
    /// Creates the task.
    #[must_use]
    pub const fn new(parent: Option<Mailbox>) -> Self {
        Self {
            parent,
            staged: Vec::new(),
        }
    }

    fn path(&self) -> TreePath {
        TreePath::mailbox_or_root(self.parent.as_ref())
    }

    fn pattern(&self, ctx: &TaskContext<'_>) -> String {
        match &self.parent {
            None => "%".to_string(),
            Some(parent) => {
                let delimiter = ctx.tree().delimiter(Some(parent)).unwrap_or('/');
                format!("{parent}{delimiter}%")
            }
        }
    }
}

impl Task for ListChildMailboxesTask {
    fn name(&self) -> &'static str {
        "ListChildMailboxes"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        let list = Command::List {
            reference: String::new(),
            pattern: self.pattern(ctx),
        };
        match ctx.send(&list) {
            Ok(_) => Step::Continue,
            Err(e) => Step::Fail(e),
        }
    }

    fn handle_untagged(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        response: &UntaggedResponse,
    ) -> Option<Step> {
        let UntaggedResponse::List(list) = response else {
            return None;
        };
        if Some(&list.mailbox) != self.parent.as_ref() {
            self.staged.push(MailboxInfo::from(list));
        }
        Some(Step::Continue)
    }

    fn handle_tagged(&mut self, ctx: &mut TaskContext<'_>, response: &TaggedResponse) -> Step {
        let step = Step::from_completion("LIST", response);
        if step != Step::Done {
            return step;
        }
        let listed = std::mem::take(&mut self.staged);
        ctx.tree_mut().set_children(self.parent.as_ref(), listed.clone());
        ctx.persist(&self.path(), CacheEntry::Children(listed));
        Step::Done
    }

    fn on_parent_failed(&mut self, ctx: &mut TaskContext<'_>, error: &TaskError) -> Recovery {
        match ctx.load(&self.path()) {
            Some(CacheEntry::Children(listed)) => {
                debug!(path = %self.path(), %error, "serving persisted listing");
                ctx.tree_mut().set_children(self.parent.as_ref(), listed);
                Recovery::Recovered
            }
            _ => Recovery::Cascade,
        }
    }
}
