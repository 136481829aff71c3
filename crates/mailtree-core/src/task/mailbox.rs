//! Selecting a mailbox and keeping it selected.

use mailtree_imap::parser::{FetchItem, TaggedResponse, UntaggedResponse};
use mailtree_imap::{
    Command, FetchAttribute, Flag, Flags, Mailbox, MessageSet, ResponseCode, SeqRange, Uid,
    UidValidity,
};
use tracing::{debug, info};

use super::{FetchDetail, FetchSelection, Step, Task, TaskContext, TaskError, TaskId};
use crate::store::CacheEntry;
use crate::tree::{MAX_MESSAGES, MessageRef, SyncOutcome, TreePath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Select,
    Fetch,
}

/// Selects a mailbox and reconciles the cached message list with it.
///
/// SELECT reports the message count, UIDVALIDITY and UIDNEXT; a
/// `UID FETCH 1:* (UID FLAGS)` then maps every sequence number to its UID.
/// The result replaces the cached list on completion: cached data is kept
/// for UIDs still present, vanished messages are pruned, and a changed
/// UIDVALIDITY throws the whole list away.
///
/// Before selecting, a persisted snapshot is restored if the list has not
/// been synchronized in this session, so the epoch check also covers
/// restarts.
#[derive(Debug)]
pub struct ObtainSynchronizedMailboxTask {
    mailbox: Mailbox,
    keeper: TaskId,
    phase: Phase,
    exists: u32,
    uid_validity: Option<UidValidity>,
    uid_next: Option<Uid>,
    flags: Option<Flags>,
    permanent_flags: Option<Flags>,
    staged: Vec<(Option<Uid>, Flags)>,
}

impl ObtainSynchronizedMailboxTask {
    /// Creates the task; `keeper` will own the connection once the mailbox
    /// is selected.
    #[must_use]
    pub const fn new(mailbox: Mailbox, keeper: TaskId) -> Self {
        Self {
            mailbox,
            keeper,
            phase: Phase::Select,
            exists: 0,
            uid_validity: None,
            uid_next: None,
            flags: None,
            permanent_flags: None,
            staged: Vec::new(),
        }
    }

    fn restore(&self, ctx: &mut TaskContext<'_>) {
        let present = ctx
            .tree()
            .messages(&self.mailbox)
            .is_some_and(|list| list.synchronized || !list.is_empty());
        if present {
            return;
        }
        if let Some(CacheEntry::Messages(list)) =
            ctx.load(&TreePath::MessageList(self.mailbox.clone()))
        {
            debug!(mailbox = %self.mailbox, messages = list.len(), "restored persisted messages");
            ctx.tree_mut().restore_messages(&self.mailbox, list);
        }
    }

    fn stage_fetch(&mut self, seq: usize, items: &[FetchItem]) {
        let Some((uid, flags)) = self.staged.get_mut(seq) else {
            return;
        };
        for item in items {
            match item {
                FetchItem::Uid(u) => *uid = Some(*u),
                FetchItem::Flags(f) => flags.clone_from(f),
                _ => {}
            }
        }
    }

    fn apply(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        let outcome = SyncOutcome {
            uid_validity: self.uid_validity,
            uid_next: self.uid_next,
            messages: std::mem::take(&mut self.staged),
            flags: self.flags.take(),
            permanent_flags: self.permanent_flags.take(),
        };
        let unknown = outcome.messages.iter().position(|(uid, _)| uid.is_none());
        ctx.tree_mut().apply_sync(&self.mailbox, outcome);

        if let Some(list) = ctx.tree().messages(&self.mailbox).cloned() {
            info!(mailbox = %self.mailbox, messages = list.len(), "mailbox synchronized");
            ctx.persist(
                &TreePath::MessageList(self.mailbox.clone()),
                CacheEntry::Messages(list),
            );
        }

        // messages that arrived during the sync still need their UIDs
        if let Some(index) = unknown {
            let from = u32::try_from(index + 1).unwrap_or(u32::MAX);
            let task = ctx.factory().fetch_msg_metadata(
                &self.mailbox,
                FetchSelection::From(from),
                FetchDetail::Flags,
            );
            ctx.spawn_here(task);
        }
        Step::Done
    }
}

impl Task for ObtainSynchronizedMailboxTask {
    fn name(&self) -> &'static str {
        "ObtainSynchronizedMailbox"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        self.restore(ctx);
        ctx.claim_mailbox(self.keeper, &self.mailbox);
        let select = Command::Select {
            mailbox: self.mailbox.clone(),
        };
        match ctx.send(&select) {
            Ok(_) => Step::Continue,
            Err(e) => Step::Fail(e),
        }
    }

    fn handle_untagged(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        response: &UntaggedResponse,
    ) -> Option<Step> {
        match (self.phase, response) {
            (_, UntaggedResponse::Exists(n)) if *n > MAX_MESSAGES => {
                return Some(Step::Fail(TaskError::Protocol(format!(
                    "{} reports {n} messages, more than {MAX_MESSAGES}",
                    self.mailbox
                ))));
            }
            (_, UntaggedResponse::Exists(n)) => {
                self.exists = *n;
                if self.phase == Phase::Fetch {
                    self.staged.resize(*n as usize, (None, Flags::new()));
                }
            }
            (Phase::Fetch, UntaggedResponse::Expunge(seq)) => {
                if seq.index() < self.staged.len() {
                    self.staged.remove(seq.index());
                }
                self.exists = self.exists.saturating_sub(1);
            }
            (Phase::Select, UntaggedResponse::State(state)) => {
                if let Some(validity) = state.uid_validity() {
                    self.uid_validity = Some(validity);
                }
                if let Some(next) = state.uid_next() {
                    self.uid_next = Some(next);
                }
                if state.code == ResponseCode::PermanentFlags {
                    self.permanent_flags =
                        Some(state.args.iter().map(|f| Flag::parse(f)).collect());
                }
            }
            (Phase::Select, UntaggedResponse::Flags(flags)) => {
                self.flags = Some(flags.clone());
            }
            (Phase::Select, UntaggedResponse::Recent(_)) => {}
            (Phase::Fetch, UntaggedResponse::Fetch { seq, items }) => {
                self.stage_fetch(seq.index(), items);
            }
            _ => return None,
        }
        Some(Step::Continue)
    }

    fn handle_tagged(&mut self, ctx: &mut TaskContext<'_>, response: &TaggedResponse) -> Step {
        match self.phase {
            Phase::Select => {
                let step = Step::from_completion("SELECT", response);
                if step != Step::Done {
                    ctx.release_mailbox();
                    return step;
                }
                if self.exists == 0 {
                    return self.apply(ctx);
                }
                self.staged = vec![(None, Flags::new()); self.exists as usize];
                self.phase = Phase::Fetch;
                let fetch = Command::Fetch {
                    set: MessageSet::Range(SeqRange::all()),
                    items: vec![FetchAttribute::Uid, FetchAttribute::Flags],
                    uid: true,
                };
                match ctx.send(&fetch) {
                    Ok(_) => Step::Continue,
                    Err(e) => Step::Fail(e),
                }
            }
            Phase::Fetch => {
                let step = Step::from_completion("FETCH", response);
                if step == Step::Done {
                    self.apply(ctx)
                } else {
                    step
                }
            }
        }
    }
}

/// Owns a connection while its mailbox stays selected.
///
/// Never completes on its own: it runs until another mailbox is selected on
/// the connection or the connection goes away. Untagged data no running task
/// claims ends up here and is applied to the tree as it arrives.
#[derive(Debug)]
pub struct KeepMailboxOpenTask {
    mailbox: Mailbox,
}

impl KeepMailboxOpenTask {
    /// Creates the task.
    #[must_use]
    pub const fn new(mailbox: Mailbox) -> Self {
        Self { mailbox }
    }

    fn arrivals(&self, ctx: &mut TaskContext<'_>, exists: u32) {
        let added = ctx.tree_mut().append_placeholders(&self.mailbox, exists);
        if added == 0 {
            return;
        }
        let from = exists - u32::try_from(added).unwrap_or(exists) + 1;
        debug!(mailbox = %self.mailbox, added, "new messages");

        let fetch = ctx.factory().fetch_msg_metadata(
            &self.mailbox,
            FetchSelection::From(from),
            FetchDetail::Flags,
        );
        let fetch = ctx.spawn_here(fetch);
        if ctx.policy().allows_background() && ctx.config().prefetch {
            let prefetch = ctx.factory().prefetch(&self.mailbox, FetchSelection::From(from));
            ctx.spawn_after(fetch, prefetch);
        }
    }

    fn epoch(&self, ctx: &mut TaskContext<'_>, validity: UidValidity) {
        let cached = ctx
            .tree()
            .messages(&self.mailbox)
            .and_then(|list| list.uid_validity);
        if cached == Some(validity) {
            return;
        }
        info!(mailbox = %self.mailbox, %validity, "UIDVALIDITY changed, resynchronizing");
        ctx.tree_mut().reset_messages(&self.mailbox, Some(validity));
        ctx.forget(&TreePath::MessageList(self.mailbox.clone()));
        let obtain = ctx
            .factory()
            .obtain_synchronized_mailbox(&self.mailbox, ctx.id());
        let obtain = ctx.spawn_here(obtain);
        ctx.set_keeper_obtain(&self.mailbox, obtain);
    }
}

impl Task for KeepMailboxOpenTask {
    fn name(&self) -> &'static str {
        "KeepMailboxOpen"
    }

    fn needs_connection(&self) -> bool {
        false
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        if let Some(connection) = ctx.connection_id() {
            debug!(mailbox = %self.mailbox, %connection, "keeping mailbox open");
        }
        Step::Continue
    }

    fn handle_untagged(
        &mut self,
        ctx: &mut TaskContext<'_>,
        response: &UntaggedResponse,
    ) -> Option<Step> {
        match response {
            UntaggedResponse::Exists(n) => self.arrivals(ctx, *n),
            UntaggedResponse::Expunge(seq) => {
                ctx.tree_mut().expunge(&self.mailbox, *seq);
            }
            UntaggedResponse::Fetch { seq, items } => {
                ctx.tree_mut()
                    .update_message(&self.mailbox, MessageRef::Seq(*seq), items);
            }
            UntaggedResponse::State(state) => {
                if let Some(validity) = state.uid_validity() {
                    self.epoch(ctx, validity);
                }
            }
            UntaggedResponse::Flags(flags) => {
                ctx.tree_mut().set_mailbox_flags(&self.mailbox, flags.clone());
            }
            UntaggedResponse::Recent(_) => {}
            _ => return None,
        }
        Some(Step::Continue)
    }

    fn handle_tagged(&mut self, _ctx: &mut TaskContext<'_>, _response: &TaggedResponse) -> Step {
        Step::Continue
    }
}
