//! Message metadata and body part downloads.

use mailtree_imap::parser::{FetchItem, TaggedResponse, UntaggedResponse};
use mailtree_imap::{Command, FetchAttribute, Mailbox, MessageSet, SeqNum, SeqRange, Uid, UidSet};

use super::{Step, Task, TaskContext, TaskError};
use crate::store::CacheEntry;
use crate::tree::{MessageRef, TreePath};

/// Which messages a metadata fetch covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSelection {
    /// Explicit UIDs.
    Uids(UidSet),
    /// Every message from this sequence number on; used for new arrivals.
    From(u32),
}

/// How much metadata to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDetail {
    /// UID and flags.
    Flags,
    /// UID, flags, size, internal date, envelope and body structure.
    Full,
}

impl FetchDetail {
    fn attributes(self) -> Vec<FetchAttribute> {
        match self {
            Self::Flags => vec![FetchAttribute::Uid, FetchAttribute::Flags],
            Self::Full => vec![
                FetchAttribute::Uid,
                FetchAttribute::Flags,
                FetchAttribute::Rfc822Size,
                FetchAttribute::InternalDate,
                FetchAttribute::Envelope,
                FetchAttribute::BodyStructure,
            ],
        }
    }
}

/// Fetches metadata of messages in the selected mailbox.
///
/// Results are staged and applied together on the tagged OK.
#[derive(Debug)]
pub struct FetchMsgMetadataTask {
    mailbox: Mailbox,
    selection: FetchSelection,
    detail: FetchDetail,
    background: bool,
    staged: Vec<(SeqNum, Vec<FetchItem>)>,
}

impl FetchMsgMetadataTask {
    /// Creates the task.
    #[must_use]
    pub const fn new(mailbox: Mailbox, selection: FetchSelection, detail: FetchDetail) -> Self {
        Self {
            mailbox,
            selection,
            detail,
            background: false,
            staged: Vec::new(),
        }
    }

    /// Marks the fetch as non-essential; it is skipped unless the network
    /// policy allows background work when it starts.
    #[must_use]
    pub const fn background(mut self) -> Self {
        self.background = true;
        self
    }

    fn covers(&self, seq: SeqNum, items: &[FetchItem]) -> bool {
        match &self.selection {
            FetchSelection::From(start) => seq.get() >= *start,
            FetchSelection::Uids(uids) => items
                .iter()
                .any(|item| matches!(item, FetchItem::Uid(uid) if uids.contains(*uid))),
        }
    }
}

fn uid_of(items: &[FetchItem]) -> Option<Uid> {
    items.iter().find_map(|item| match item {
        FetchItem::Uid(uid) => Some(*uid),
        _ => None,
    })
}

impl Task for FetchMsgMetadataTask {
    fn name(&self) -> &'static str {
        "FetchMsgMetadata"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        if self.background && !(ctx.policy().allows_background() && ctx.config().prefetch) {
            return Step::Done;
        }
        if let Err(e) = ctx.ensure_selected(&self.mailbox) {
            return Step::Fail(e);
        }
        let (set, uid) = match &self.selection {
            FetchSelection::Uids(uids) if uids.is_empty() => return Step::Done,
            FetchSelection::Uids(uids) => (MessageSet::Uids(uids.clone()), true),
            FetchSelection::From(start) => (MessageSet::Range(SeqRange::from(*start)), false),
        };
        let fetch = Command::Fetch {
            set,
            items: self.detail.attributes(),
            uid,
        };
        match ctx.send(&fetch) {
            Ok(_) => Step::Continue,
            Err(e) => Step::Fail(e),
        }
    }

    fn handle_untagged(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        response: &UntaggedResponse,
    ) -> Option<Step> {
        let UntaggedResponse::Fetch { seq, items } = response else {
            return None;
        };
        if !self.covers(*seq, items) {
            return None;
        }
        self.staged.push((*seq, items.clone()));
        Some(Step::Continue)
    }

    fn handle_tagged(&mut self, ctx: &mut TaskContext<'_>, response: &TaggedResponse) -> Step {
        let step = Step::from_completion("FETCH", response);
        if step != Step::Done {
            return step;
        }
        let tree = ctx.tree_mut();
        for (seq, items) in std::mem::take(&mut self.staged) {
            let target = match (&self.selection, uid_of(&items)) {
                (FetchSelection::Uids(_), Some(uid)) => MessageRef::Uid(uid),
                _ => {
                    tree.append_placeholders(&self.mailbox, seq.get());
                    MessageRef::Seq(seq)
                }
            };
            tree.update_message(&self.mailbox, target, &items);
        }
        Step::Done
    }
}

/// Downloads one body part.
///
/// Completes without network traffic if the part is already cached.
#[derive(Debug)]
pub struct FetchMsgPartTask {
    mailbox: Mailbox,
    uid: Uid,
    part_id: String,
    staged: Option<Vec<u8>>,
}

impl FetchMsgPartTask {
    /// Creates the task.
    #[must_use]
    pub fn new(mailbox: Mailbox, uid: Uid, part_id: impl Into<String>) -> Self {
        Self {
            mailbox,
            uid,
            part_id: part_id.into(),
            staged: None,
        }
    }

    fn path(&self) -> TreePath {
        TreePath::Part {
            mailbox: self.mailbox.clone(),
            uid: self.uid,
            part_id: self.part_id.clone(),
        }
    }
}

impl Task for FetchMsgPartTask {
    fn name(&self) -> &'static str {
        "FetchMsgPart"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        let cached = ctx
            .tree()
            .message(&self.mailbox, self.uid)
            .is_some_and(|m| m.parts.contains_key(&self.part_id));
        if cached {
            return Step::Done;
        }
        if let Err(e) = ctx.ensure_selected(&self.mailbox) {
            return Step::Fail(e);
        }
        let fetch = Command::Fetch {
            set: MessageSet::Uids(std::iter::once(self.uid).collect()),
            items: vec![FetchAttribute::Body {
                section: Some(self.part_id.clone()),
                peek: true,
            }],
            uid: true,
        };
        match ctx.send(&fetch) {
            Ok(_) => Step::Continue,
            Err(e) => Step::Fail(e),
        }
    }

    fn handle_untagged(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        response: &UntaggedResponse,
    ) -> Option<Step> {
        let UntaggedResponse::Fetch { items, .. } = response else {
            return None;
        };
        if uid_of(items) != Some(self.uid) {
            return None;
        }
        for item in items {
            if let FetchItem::Body {
                section: Some(section),
                data: Some(data),
                ..
            } = item
            {
                if *section == self.part_id {
                    self.staged = Some(data.clone());
                }
            }
        }
        Some(Step::Continue)
    }

    fn handle_tagged(&mut self, ctx: &mut TaskContext<'_>, response: &TaggedResponse) -> Step {
        let step = Step::from_completion("FETCH", response);
        if step != Step::Done {
            return step;
        }
        let Some(data) = self.staged.take() else {
            return Step::Fail(TaskError::Protocol(format!(
                "server sent no data for part {} of UID {}",
                self.part_id, self.uid
            )));
        };
        ctx.tree_mut()
            .set_part(&self.mailbox, self.uid, &self.part_id, data.clone());
        ctx.persist(&self.path(), CacheEntry::Part(data));
        Step::Done
    }
}
