//! The mailbox tree cache.
//!
//! An in-memory mirror of the server: mailboxes, their message lists,
//! messages and downloaded body parts. Reads are public; mutations are
//! crate-private and performed only by tasks when their commands complete.
//! Every mutation records the path it touched so the coordinator can publish
//! [`EngineEvent::CacheChanged`](crate::EngineEvent::CacheChanged).

mod node;
mod path;

use std::collections::BTreeMap;

use mailtree_imap::parser::FetchItem;
use mailtree_imap::{FlagOperation, Flags, Mailbox, SeqNum, Uid, UidValidity};
use tracing::{debug, warn};

pub use node::{
    MailboxCounts, MailboxInfo, MailboxNode, MessageList, MessageNode, PartNode, TreeNode,
};
pub use path::TreePath;

/// Largest message count a mailbox may report. Message lists are sized from
/// the server's EXISTS, so anything beyond this is treated as bogus.
pub(crate) const MAX_MESSAGES: u32 = 2_000_000;

/// Result of a full mailbox synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// UIDVALIDITY reported by SELECT.
    pub uid_validity: Option<UidValidity>,
    /// UIDNEXT reported by SELECT.
    pub uid_next: Option<Uid>,
    /// UID and flags per sequence number, index 0 is sequence number 1.
    pub messages: Vec<(Option<Uid>, Flags)>,
    /// Untagged FLAGS, if the server sent it.
    pub flags: Option<Flags>,
    /// `[PERMANENTFLAGS]`, if the server sent it.
    pub permanent_flags: Option<Flags>,
}

/// How a message is addressed by a FETCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRef {
    /// By sequence number.
    Seq(SeqNum),
    /// By UID.
    Uid(Uid),
}

/// The mailbox tree.
#[derive(Debug, Clone)]
pub struct MailboxTree {
    root: MailboxNode,
    mailboxes: BTreeMap<Mailbox, MailboxNode>,
    changes: Vec<TreePath>,
}

impl Default for MailboxTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MailboxTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        let mut root = MailboxNode::new(MailboxInfo::named(Mailbox::new("")));
        root.info.selectable = false;
        Self {
            root,
            mailboxes: BTreeMap::new(),
            changes: Vec::new(),
        }
    }

    /// The root node.
    #[must_use]
    pub const fn root(&self) -> &MailboxNode {
        &self.root
    }

    /// A mailbox node.
    #[must_use]
    pub fn mailbox(&self, name: &Mailbox) -> Option<&MailboxNode> {
        self.mailboxes.get(name)
    }

    /// Child mailboxes of `parent` (the root for `None`); `None` until listed.
    #[must_use]
    pub fn children(&self, parent: Option<&Mailbox>) -> Option<&[Mailbox]> {
        let node = match parent {
            None => &self.root,
            Some(name) => self.mailboxes.get(name)?,
        };
        node.children.as_deref()
    }

    /// Message list of a mailbox.
    #[must_use]
    pub fn messages(&self, mailbox: &Mailbox) -> Option<&MessageList> {
        self.mailboxes.get(mailbox).map(|m| &m.messages)
    }

    /// A message by UID.
    #[must_use]
    pub fn message(&self, mailbox: &Mailbox, uid: Uid) -> Option<&MessageNode> {
        self.messages(mailbox)?.by_uid(uid)
    }

    /// Looks a node up by path.
    #[must_use]
    pub fn node(&self, path: &TreePath) -> Option<TreeNode<'_>> {
        match path {
            TreePath::Root => Some(TreeNode::Mailbox(&self.root)),
            TreePath::Mailbox(m) => self.mailbox(m).map(TreeNode::Mailbox),
            TreePath::MessageList(m) => self.messages(m).map(TreeNode::MessageList),
            TreePath::Message { mailbox, uid } => {
                self.message(mailbox, *uid).map(TreeNode::Message)
            }
            TreePath::Part {
                mailbox,
                uid,
                part_id,
            } => self
                .message(mailbox, *uid)?
                .parts
                .get(part_id)
                .map(TreeNode::Part),
        }
    }

    /// Hierarchy delimiter of a mailbox, or the one used by its siblings.
    #[must_use]
    pub fn delimiter(&self, mailbox: Option<&Mailbox>) -> Option<char> {
        mailbox
            .and_then(|m| self.mailboxes.get(m))
            .and_then(|n| n.info.delimiter)
            .or_else(|| self.mailboxes.values().find_map(|n| n.info.delimiter))
    }

    /// Drains the paths mutated since the last call.
    pub(crate) fn take_changes(&mut self) -> Vec<TreePath> {
        std::mem::take(&mut self.changes)
    }

    fn touch(&mut self, path: TreePath) {
        if !self.changes.contains(&path) {
            self.changes.push(path);
        }
    }

    fn node_mut(&mut self, name: &Mailbox) -> &mut MailboxNode {
        self.mailboxes
            .entry(name.clone())
            .or_insert_with(|| MailboxNode::new(MailboxInfo::named(name.clone())))
    }

    /// Replaces the child listing of `parent`, pruning vanished children.
    pub(crate) fn set_children(&mut self, parent: Option<&Mailbox>, listed: Vec<MailboxInfo>) {
        let names: Vec<Mailbox> = listed.iter().map(|i| i.name.clone()).collect();
        let previous = match parent {
            None => self.root.children.replace(names.clone()),
            Some(p) => self.node_mut(p).children.replace(names.clone()),
        };

        for gone in previous.unwrap_or_default() {
            if !names.contains(&gone) {
                self.remove_subtree(&gone);
            }
        }
        for info in listed {
            let node = self.node_mut(&info.name.clone());
            node.info = info;
        }
        self.touch(TreePath::mailbox_or_root(parent));
    }

    /// Adds a freshly created mailbox under its parent.
    pub(crate) fn add_mailbox(&mut self, info: MailboxInfo) {
        let parent = info.parent();
        let name = info.name.clone();
        self.node_mut(&name).info = info;

        let siblings = match &parent {
            None => &mut self.root.children,
            Some(p) => &mut self.node_mut(p).children,
        };
        if let Some(children) = siblings {
            if !children.contains(&name) {
                children.push(name);
                children.sort();
            }
        }
        self.touch(TreePath::mailbox_or_root(parent.as_ref()));
    }

    /// Removes a mailbox, its descendants and its entry in the parent's listing.
    pub(crate) fn remove_mailbox(&mut self, name: &Mailbox) {
        let parent = self.mailboxes.get(name).and_then(|n| n.info.parent());
        self.remove_subtree(name);

        let siblings = match &parent {
            None => self.root.children.as_mut(),
            Some(p) => self.mailboxes.get_mut(p).and_then(|n| n.children.as_mut()),
        };
        if let Some(children) = siblings {
            children.retain(|c| c != name);
        }
        self.touch(TreePath::mailbox_or_root(parent.as_ref()));
    }

    fn remove_subtree(&mut self, name: &Mailbox) {
        let Some(node) = self.mailboxes.remove(name) else {
            return;
        };
        for child in node.children.unwrap_or_default() {
            self.remove_subtree(&child);
        }
        debug!(mailbox = %name, "pruned mailbox");
    }

    pub(crate) fn set_counts(&mut self, mailbox: &Mailbox, counts: MailboxCounts) {
        self.node_mut(mailbox).counts = Some(counts);
        self.touch(TreePath::Mailbox(mailbox.clone()));
    }

    /// Replaces the message list with a persisted snapshot.
    pub(crate) fn restore_messages(&mut self, mailbox: &Mailbox, mut list: MessageList) {
        // a snapshot is a starting point; only a live sync marks it current
        list.synchronized = false;
        self.node_mut(mailbox).messages = list;
        self.touch(TreePath::MessageList(mailbox.clone()));
    }

    /// Records the flags a selected mailbox announced.
    pub(crate) fn set_mailbox_flags(&mut self, mailbox: &Mailbox, flags: Flags) {
        let list = &mut self.node_mut(mailbox).messages;
        if list.flags.as_ref() != Some(&flags) {
            list.flags = Some(flags);
            self.touch(TreePath::MessageList(mailbox.clone()));
        }
    }

    /// Discards every cached message of the mailbox and starts a new epoch.
    pub(crate) fn reset_messages(&mut self, mailbox: &Mailbox, uid_validity: Option<UidValidity>) {
        let list = &mut self.node_mut(mailbox).messages;
        *list = MessageList::empty();
        list.uid_validity = uid_validity;
        self.touch(TreePath::MessageList(mailbox.clone()));
    }

    /// Installs the result of a synchronization.
    ///
    /// Cached data for UIDs still present is kept, messages no longer listed
    /// are pruned. A changed UIDVALIDITY discards the whole list first.
    pub(crate) fn apply_sync(&mut self, mailbox: &Mailbox, outcome: SyncOutcome) {
        let list = &mut self.node_mut(mailbox).messages;
        if list.uid_validity.is_some() && list.uid_validity != outcome.uid_validity {
            debug!(%mailbox, "UIDVALIDITY changed, discarding cached messages");
            list.messages.clear();
        }

        let mut previous: BTreeMap<Uid, MessageNode> = std::mem::take(&mut list.messages)
            .into_iter()
            .filter_map(|m| m.uid.map(|uid| (uid, m)))
            .collect();

        list.messages = outcome
            .messages
            .into_iter()
            .map(|(uid, flags)| {
                let mut node = uid
                    .and_then(|u| previous.remove(&u))
                    .unwrap_or_else(|| MessageNode {
                        uid,
                        ..MessageNode::default()
                    });
                node.flags = flags;
                node
            })
            .collect();
        list.uid_validity = outcome.uid_validity;
        list.uid_next = outcome.uid_next;
        list.synchronized = true;
        if outcome.flags.is_some() {
            list.flags = outcome.flags;
        }
        if outcome.permanent_flags.is_some() {
            list.permanent_flags = outcome.permanent_flags;
        }

        if !previous.is_empty() {
            debug!(%mailbox, pruned = previous.len(), "pruned vanished messages");
        }
        self.touch(TreePath::MessageList(mailbox.clone()));
    }

    /// Grows the list to `exists` messages with placeholders; returns how many
    /// were added.
    pub(crate) fn append_placeholders(&mut self, mailbox: &Mailbox, exists: u32) -> usize {
        if exists > MAX_MESSAGES {
            warn!(%mailbox, exists, "ignoring implausible message count");
            return 0;
        }
        let list = &mut self.node_mut(mailbox).messages;
        let target = exists as usize;
        let added = target.saturating_sub(list.messages.len());
        list.messages.resize_with(list.messages.len() + added, MessageNode::default);
        if added > 0 {
            self.touch(TreePath::MessageList(mailbox.clone()));
        }
        added
    }

    /// Removes the message at a sequence number; false if out of range.
    pub(crate) fn expunge(&mut self, mailbox: &Mailbox, seq: SeqNum) -> bool {
        let list = &mut self.node_mut(mailbox).messages;
        if seq.index() >= list.messages.len() {
            return false;
        }
        list.messages.remove(seq.index());
        self.touch(TreePath::MessageList(mailbox.clone()));
        true
    }

    /// Applies FETCH data to one message; false if it is not in the tree.
    pub(crate) fn update_message(
        &mut self,
        mailbox: &Mailbox,
        message: MessageRef,
        items: &[FetchItem],
    ) -> bool {
        let list = &mut self.node_mut(mailbox).messages;
        let node = match message {
            MessageRef::Seq(seq) => list.messages.get_mut(seq.index()),
            MessageRef::Uid(uid) => list.by_uid_mut(uid),
        };
        let Some(node) = node else {
            return false;
        };
        node.apply_fetch(items);
        let path = node.uid.map_or_else(
            || TreePath::MessageList(mailbox.clone()),
            |uid| TreePath::Message {
                mailbox: mailbox.clone(),
                uid,
            },
        );
        self.touch(path);
        true
    }

    /// Applies a flag operation to one message.
    pub(crate) fn apply_flags(
        &mut self,
        mailbox: &Mailbox,
        uid: Uid,
        operation: FlagOperation,
        flags: &Flags,
    ) {
        let Some(node) = self.node_mut(mailbox).messages.by_uid_mut(uid) else {
            return;
        };
        let before = node.flags.clone();
        node.flags.apply(operation, flags);
        if node.flags != before {
            self.touch(TreePath::Message {
                mailbox: mailbox.clone(),
                uid,
            });
        }
    }

    /// Stores a downloaded body part.
    pub(crate) fn set_part(&mut self, mailbox: &Mailbox, uid: Uid, part_id: &str, data: Vec<u8>) {
        let Some(node) = self.node_mut(mailbox).messages.by_uid_mut(uid) else {
            return;
        };
        let mime_type = node.part_mime_type(part_id);
        node.parts.insert(
            part_id.to_string(),
            PartNode {
                part_id: part_id.to_string(),
                mime_type,
                data,
            },
        );
        self.touch(TreePath::Part {
            mailbox: mailbox.clone(),
            uid,
            part_id: part_id.to_string(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mailtree_imap::Flag;

    use super::*;

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    fn info(name: &str) -> MailboxInfo {
        MailboxInfo {
            name: Mailbox::new(name),
            delimiter: Some('.'),
            selectable: true,
            has_children: None,
        }
    }

    fn synced(tree: &mut MailboxTree, validity: u32, uids: &[u32]) {
        tree.apply_sync(
            &Mailbox::inbox(),
            SyncOutcome {
                uid_validity: UidValidity::new(validity),
                uid_next: Uid::new(uids.iter().max().copied().unwrap_or(0) + 1),
                messages: uids.iter().map(|&n| (Some(uid(n)), Flags::new())).collect(),
                ..SyncOutcome::default()
            },
        );
    }

    #[test]
    fn listing_prunes_vanished_children() {
        let mut tree = MailboxTree::new();
        tree.set_children(None, vec![info("INBOX"), info("Archive")]);
        tree.set_children(Some(&Mailbox::new("Archive")), vec![info("Archive.2024")]);
        tree.set_children(None, vec![info("INBOX")]);

        assert_eq!(tree.children(None).unwrap(), &[Mailbox::inbox()]);
        assert!(tree.mailbox(&Mailbox::new("Archive.2024")).is_none());
        assert_eq!(
            tree.take_changes(),
            vec![TreePath::Root, TreePath::Mailbox(Mailbox::new("Archive"))]
        );
    }

    #[test]
    fn created_mailbox_joins_parent_listing() {
        let mut tree = MailboxTree::new();
        tree.set_children(None, vec![info("Work")]);
        tree.set_children(Some(&Mailbox::new("Work")), vec![]);
        tree.add_mailbox(info("Work.Reports"));
        assert_eq!(
            tree.children(Some(&Mailbox::new("Work"))).unwrap(),
            &[Mailbox::new("Work.Reports")]
        );

        tree.remove_mailbox(&Mailbox::new("Work.Reports"));
        assert!(tree.children(Some(&Mailbox::new("Work"))).unwrap().is_empty());
    }

    #[test]
    fn sync_keeps_known_messages_and_prunes_the_rest() {
        let mut tree = MailboxTree::new();
        synced(&mut tree, 7, &[1, 2, 3]);
        let inbox = Mailbox::inbox();
        tree.set_part(&inbox, uid(2), "1", b"hello".to_vec());

        synced(&mut tree, 7, &[2, 3, 4]);
        let list = tree.messages(&inbox).unwrap();
        assert_eq!(list.uids(), vec![uid(2), uid(3), uid(4)]);
        assert!(tree.message(&inbox, uid(2)).unwrap().parts.contains_key("1"));
        assert!(tree.message(&inbox, uid(1)).is_none());
    }

    #[test]
    fn new_epoch_discards_cached_data() {
        let mut tree = MailboxTree::new();
        synced(&mut tree, 7, &[1, 2]);
        let inbox = Mailbox::inbox();
        tree.set_part(&inbox, uid(2), "1", b"old".to_vec());

        synced(&mut tree, 8, &[1, 2]);
        assert!(tree.message(&inbox, uid(2)).unwrap().parts.is_empty());
        assert_eq!(tree.messages(&inbox).unwrap().uid_validity, UidValidity::new(8));
    }

    #[test]
    fn placeholders_and_expunge_keep_sequence_order() {
        let mut tree = MailboxTree::new();
        synced(&mut tree, 1, &[10, 11]);
        let inbox = Mailbox::inbox();

        assert_eq!(tree.append_placeholders(&inbox, 4), 2);
        assert!(tree.messages(&inbox).unwrap().messages[3].is_placeholder());
        assert_eq!(tree.append_placeholders(&inbox, u32::MAX), 0);
        assert_eq!(tree.messages(&inbox).unwrap().messages.len(), 4);

        assert!(tree.expunge(&inbox, SeqNum::new(1).unwrap()));
        assert!(!tree.expunge(&inbox, SeqNum::new(9).unwrap()));
        tree.update_message(
            &inbox,
            MessageRef::Seq(SeqNum::new(3).unwrap()),
            &[FetchItem::Uid(uid(13))],
        );
        let list = tree.messages(&inbox).unwrap();
        assert_eq!(list.messages.len(), 3);
        assert_eq!(list.messages[0].uid, Some(uid(11)));
        assert_eq!(list.messages[2].uid, Some(uid(13)));
        assert!(list.messages[1].is_placeholder());
    }

    #[test]
    fn repeated_flag_operation_is_idempotent() {
        let mut tree = MailboxTree::new();
        synced(&mut tree, 1, &[5]);
        let inbox = Mailbox::inbox();
        let seen = Flags::from_vec(vec![Flag::Seen]);

        tree.apply_flags(&inbox, uid(5), FlagOperation::Add, &seen);
        let once = tree.clone().messages(&inbox).cloned();
        tree.take_changes();
        tree.apply_flags(&inbox, uid(5), FlagOperation::Add, &seen);

        assert_eq!(tree.messages(&inbox).cloned(), once);
        assert!(tree.take_changes().is_empty());
    }
}
