//! Node types of the mailbox tree.

use std::collections::BTreeMap;

use mailtree_imap::parser::{BodyStructure, Envelope, FetchItem};
use mailtree_imap::{Flags, ListResponse, Mailbox, Uid, UidValidity};
use serde::{Deserialize, Serialize};

/// What a LIST told us about a mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxInfo {
    /// Full mailbox name.
    pub name: Mailbox,
    /// Hierarchy delimiter, `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// False for `\Noselect` and `\NonExistent` entries.
    pub selectable: bool,
    /// Child hint from `\HasChildren`/`\HasNoChildren`.
    pub has_children: Option<bool>,
}

impl MailboxInfo {
    /// Info for a mailbox known only by name.
    #[must_use]
    pub const fn named(name: Mailbox) -> Self {
        Self {
            name,
            delimiter: None,
            selectable: true,
            has_children: None,
        }
    }

    /// Name of the parent mailbox, `None` for a top-level mailbox.
    #[must_use]
    pub fn parent(&self) -> Option<Mailbox> {
        let delimiter = self.delimiter?;
        let (parent, _) = self.name.as_str().rsplit_once(delimiter)?;
        (!parent.is_empty()).then(|| Mailbox::new(parent))
    }
}

impl From<&ListResponse> for MailboxInfo {
    fn from(list: &ListResponse) -> Self {
        Self {
            name: list.mailbox.clone(),
            delimiter: list.delimiter,
            selectable: list.is_selectable(),
            has_children: list.has_children(),
        }
    }
}

/// Counters from STATUS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxCounts {
    /// Total messages.
    pub messages: u32,
    /// Messages with `\Recent`.
    pub recent: u32,
    /// Messages without `\Seen`.
    pub unseen: u32,
}

/// A mailbox: its child listing and its messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxNode {
    /// LIST data.
    pub info: MailboxInfo,
    /// Child mailboxes; `None` until listed.
    pub children: Option<Vec<Mailbox>>,
    /// Message list.
    pub messages: MessageList,
    /// Last STATUS counters.
    pub counts: Option<MailboxCounts>,
}

impl MailboxNode {
    pub(crate) const fn new(info: MailboxInfo) -> Self {
        Self {
            info,
            children: None,
            messages: MessageList::empty(),
            counts: None,
        }
    }
}

/// Messages of one mailbox in sequence-number order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageList {
    /// Epoch the UIDs below belong to.
    pub uid_validity: Option<UidValidity>,
    /// Predicted UID of the next message.
    pub uid_next: Option<Uid>,
    /// Messages; index `n` holds sequence number `n + 1`.
    pub messages: Vec<MessageNode>,
    /// True once a full synchronization has completed in this epoch.
    pub synchronized: bool,
    /// Flags the mailbox accepts, from the untagged FLAGS of SELECT.
    #[serde(default)]
    pub flags: Option<Flags>,
    /// Flags kept across sessions, from `[PERMANENTFLAGS]`. `\*` means
    /// new keywords may be created.
    #[serde(default)]
    pub permanent_flags: Option<Flags>,
}

impl MessageList {
    pub(crate) const fn empty() -> Self {
        Self {
            uid_validity: None,
            uid_next: None,
            messages: Vec::new(),
            synchronized: false,
            flags: None,
            permanent_flags: None,
        }
    }

    /// Number of messages, placeholders included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if there are no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Finds a message by UID.
    #[must_use]
    pub fn by_uid(&self, uid: Uid) -> Option<&MessageNode> {
        self.messages.iter().find(|m| m.uid == Some(uid))
    }

    pub(crate) fn by_uid_mut(&mut self, uid: Uid) -> Option<&mut MessageNode> {
        self.messages.iter_mut().find(|m| m.uid == Some(uid))
    }

    /// UIDs of all messages whose UID is known, ascending.
    #[must_use]
    pub fn uids(&self) -> Vec<Uid> {
        let mut uids: Vec<Uid> = self.messages.iter().filter_map(|m| m.uid).collect();
        uids.sort_unstable();
        uids
    }
}

/// One message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageNode {
    /// UID; `None` for a placeholder announced by EXISTS and not fetched yet.
    pub uid: Option<Uid>,
    /// Flags as last reported.
    pub flags: Flags,
    /// RFC822.SIZE.
    pub size: Option<u32>,
    /// INTERNALDATE as sent by the server.
    pub internal_date: Option<String>,
    /// ENVELOPE.
    pub envelope: Option<Envelope>,
    /// BODYSTRUCTURE.
    pub body_structure: Option<BodyStructure>,
    /// Downloaded body parts by section number.
    pub parts: BTreeMap<String, PartNode>,
}

impl MessageNode {
    /// A message known only by UID.
    #[must_use]
    pub fn with_uid(uid: Uid) -> Self {
        Self {
            uid: Some(uid),
            ..Self::default()
        }
    }

    /// Returns true if this message has not been fetched yet.
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        self.uid.is_none()
    }

    /// Applies FETCH data.
    pub(crate) fn apply_fetch(&mut self, items: &[FetchItem]) {
        for item in items {
            match item {
                FetchItem::Uid(uid) => self.uid = Some(*uid),
                FetchItem::Flags(flags) => self.flags = flags.clone(),
                FetchItem::Rfc822Size(size) => self.size = Some(*size),
                FetchItem::InternalDate(date) => self.internal_date = Some(date.clone()),
                FetchItem::Envelope(envelope) => self.envelope = Some((**envelope).clone()),
                FetchItem::BodyStructure(structure) => {
                    self.body_structure = Some(structure.clone());
                }
                FetchItem::Body {
                    section: Some(section),
                    data: Some(data),
                    ..
                } => {
                    let mime_type = self.part_mime_type(section);
                    self.parts.insert(
                        section.clone(),
                        PartNode {
                            part_id: section.clone(),
                            mime_type,
                            data: data.clone(),
                        },
                    );
                }
                FetchItem::Body { .. } => {}
            }
        }
    }

    pub(crate) fn part_mime_type(&self, part_id: &str) -> Option<String> {
        self.body_structure
            .as_ref()?
            .parts()
            .into_iter()
            .find(|p| p.part_id == part_id)
            .map(|p| p.mime_type)
    }
}

/// A downloaded body part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartNode {
    /// Section number.
    pub part_id: String,
    /// Lowercase MIME type, if the body structure was known.
    pub mime_type: Option<String>,
    /// Raw (still transfer-encoded) bytes.
    pub data: Vec<u8>,
}

/// Borrowed view of any tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeNode<'a> {
    /// A mailbox (or the root).
    Mailbox(&'a MailboxNode),
    /// The message list of a mailbox.
    MessageList(&'a MessageList),
    /// A message.
    Message(&'a MessageNode),
    /// A body part.
    Part(&'a PartNode),
}
