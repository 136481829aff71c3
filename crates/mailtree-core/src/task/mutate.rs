//! UID-addressed mutations: flag updates, copy and move.

use mailtree_imap::parser::{FetchItem, TaggedResponse, UntaggedResponse};
use mailtree_imap::{Command, Flag, FlagOperation, Flags, Mailbox, SeqNum, Uid, UidSet};
use tracing::debug;

use super::{Step, Task, TaskContext};

/// Adds, removes or replaces flags on a set of messages.
///
/// The STORE is sent without `.SILENT` so the server echoes the resulting
/// flags; those are applied on completion. Messages the server did not echo
/// get the operation applied locally, which is idempotent.
#[derive(Debug)]
pub struct UpdateFlagsTask {
    mailbox: Mailbox,
    uids: UidSet,
    operation: FlagOperation,
    flags: Flags,
    staged: Vec<(Uid, Flags)>,
}

impl UpdateFlagsTask {
    /// Creates the task.
    #[must_use]
    pub const fn new(mailbox: Mailbox, uids: UidSet, operation: FlagOperation, flags: Flags) -> Self {
        Self {
            mailbox,
            uids,
            operation,
            flags,
            staged: Vec::new(),
        }
    }

    fn echoed_uid(&self, ctx: &TaskContext<'_>, seq: SeqNum, items: &[FetchItem]) -> Option<Uid> {
        items
            .iter()
            .find_map(|item| match item {
                FetchItem::Uid(uid) => Some(*uid),
                _ => None,
            })
            .or_else(|| {
                ctx.tree()
                    .messages(&self.mailbox)?
                    .messages
                    .get(seq.index())?
                    .uid
            })
            .filter(|uid| self.uids.contains(*uid))
    }
}

impl Task for UpdateFlagsTask {
    fn name(&self) -> &'static str {
        "UpdateFlags"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        if self.uids.is_empty() {
            return Step::Done;
        }
        if let Err(e) = ctx.ensure_selected(&self.mailbox) {
            return Step::Fail(e);
        }
        let store = Command::Store {
            uids: self.uids.clone(),
            operation: self.operation,
            flags: self.flags.clone(),
            silent: false,
        };
        match ctx.send(&store) {
            Ok(_) => Step::Continue,
            Err(e) => Step::Fail(e),
        }
    }

    fn handle_untagged(
        &mut self,
        ctx: &mut TaskContext<'_>,
        response: &UntaggedResponse,
    ) -> Option<Step> {
        let UntaggedResponse::Fetch { seq, items } = response else {
            return None;
        };
        let uid = self.echoed_uid(ctx, *seq, items)?;
        let flags = items.iter().find_map(|item| match item {
            FetchItem::Flags(flags) => Some(flags.clone()),
            _ => None,
        })?;
        self.staged.push((uid, flags));
        Some(Step::Continue)
    }

    fn handle_tagged(&mut self, ctx: &mut TaskContext<'_>, response: &TaggedResponse) -> Step {
        let step = Step::from_completion("STORE", response);
        if step != Step::Done {
            return step;
        }
        let echoed = std::mem::take(&mut self.staged);
        let tree = ctx.tree_mut();
        for uid in self.uids.iter() {
            match echoed.iter().rev().find(|(u, _)| *u == uid) {
                Some((_, flags)) => tree.apply_flags(&self.mailbox, uid, FlagOperation::Replace, flags),
                None => tree.apply_flags(&self.mailbox, uid, self.operation, &self.flags),
            }
        }
        Step::Done
    }
}

/// Whether the source messages stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Copy, leaving the source untouched.
    Copy,
    /// Move, removing the source messages.
    Move,
}

/// Copies or moves messages to another mailbox.
///
/// A move uses `UID MOVE` when the server has the MOVE extension. Otherwise
/// it copies and then marks the source messages `\Deleted` with a chained
/// [`UpdateFlagsTask`].
#[derive(Debug)]
pub struct CopyMoveMessagesTask {
    source: Mailbox,
    uids: UidSet,
    target: Mailbox,
    mode: CopyMode,
    native_move: bool,
    staged: Vec<SeqNum>,
}

impl CopyMoveMessagesTask {
    /// Creates the task.
    #[must_use]
    pub const fn new(source: Mailbox, uids: UidSet, target: Mailbox, mode: CopyMode) -> Self {
        Self {
            source,
            uids,
            target,
            mode,
            native_move: false,
            staged: Vec::new(),
        }
    }
}

impl Task for CopyMoveMessagesTask {
    fn name(&self) -> &'static str {
        "CopyMoveMessages"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        if self.uids.is_empty() {
            return Step::Done;
        }
        if let Err(e) = ctx.ensure_selected(&self.source) {
            return Step::Fail(e);
        }
        self.native_move = self.mode == CopyMode::Move && ctx.has_capability("MOVE");
        let command = if self.native_move {
            Command::Move {
                uids: self.uids.clone(),
                mailbox: self.target.clone(),
            }
        } else {
            Command::Copy {
                uids: self.uids.clone(),
                mailbox: self.target.clone(),
            }
        };
        match ctx.send(&command) {
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
            UntaggedResponse::Expunge(seq) if self.native_move => {
                self.staged.push(*seq);
                Some(Step::Continue)
            }
            _ => None,
        }
    }

    fn handle_tagged(&mut self, ctx: &mut TaskContext<'_>, response: &TaggedResponse) -> Step {
        let command = if self.native_move { "MOVE" } else { "COPY" };
        let step = Step::from_completion(command, response);
        if step != Step::Done {
            return step;
        }
        if self.native_move {
            for seq in std::mem::take(&mut self.staged) {
                ctx.tree_mut().expunge(&self.source, seq);
            }
        } else if self.mode == CopyMode::Move {
            debug!(source = %self.source, target = %self.target, "no MOVE, flagging copied sources");
            let deleted = Flags::from_vec(vec![Flag::Deleted]);
            let task = ctx.factory().update_flags(
                &self.source,
                self.uids.clone(),
                FlagOperation::Add,
                deleted,
            );
            ctx.spawn_here(task);
        }
        Step::Done
    }
}
