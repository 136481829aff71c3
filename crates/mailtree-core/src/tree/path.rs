//! Addresses of tree nodes.

use std::fmt;

use mailtree_imap::{Mailbox, Uid};
use serde::{Deserialize, Serialize};

/// Path of a node, from the root of the mailbox tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TreePath {
    /// The root; its children are the top-level mailboxes.
    Root,
    /// A mailbox and its child listing.
    Mailbox(Mailbox),
    /// The message list of a mailbox.
    MessageList(Mailbox),
    /// One message, by UID.
    Message {
        /// Containing mailbox.
        mailbox: Mailbox,
        /// Message UID in the mailbox's current UIDVALIDITY epoch.
        uid: Uid,
    },
    /// One body part of a message.
    Part {
        /// Containing mailbox.
        mailbox: Mailbox,
        /// Message UID.
        uid: Uid,
        /// Section number (`1`, `2.1`, ...).
        part_id: String,
    },
}

impl TreePath {
    /// Path of the mailbox, or the root for `None`.
    #[must_use]
    pub fn mailbox_or_root(mailbox: Option<&Mailbox>) -> Self {
        mailbox.map_or(Self::Root, |m| Self::Mailbox(m.clone()))
    }

    /// The mailbox this path lies in.
    #[must_use]
    pub const fn mailbox(&self) -> Option<&Mailbox> {
        match self {
            Self::Root => None,
            Self::Mailbox(m) | Self::MessageList(m) => Some(m),
            Self::Message { mailbox, .. } | Self::Part { mailbox, .. } => Some(mailbox),
        }
    }

    /// Returns true if `self` is `other` or lies below it.
    #[must_use]
    pub fn starts_with(&self, other: &Self) -> bool {
        match other {
            Self::Root => true,
            Self::Mailbox(a) => self.mailbox() == Some(a),
            Self::MessageList(a) => {
                !matches!(self, Self::Root | Self::Mailbox(_)) && self.mailbox() == Some(a)
            }
            Self::Message { mailbox: a, uid: x } => match self {
                Self::Message { mailbox, uid } | Self::Part { mailbox, uid, .. } => {
                    mailbox == a && uid == x
                }
                _ => false,
            },
            Self::Part { .. } => self == other,
        }
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("/"),
            Self::Mailbox(m) => write!(f, "/{m}"),
            Self::MessageList(m) => write!(f, "/{m}/messages"),
            Self::Message { mailbox, uid } => write!(f, "/{mailbox}/messages/{}", uid.get()),
            Self::Part {
                mailbox,
                uid,
                part_id,
            } => write!(f, "/{mailbox}/messages/{}/{part_id}", uid.get()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn display_and_prefix() {
        let inbox = Mailbox::inbox();
        let uid = Uid::new(17).unwrap();
        let part = TreePath::Part {
            mailbox: inbox.clone(),
            uid,
            part_id: "1.2".to_string(),
        };
        assert_eq!(part.to_string(), "/INBOX/messages/17/1.2");
        assert!(part.starts_with(&TreePath::Root));
        assert!(part.starts_with(&TreePath::MessageList(inbox.clone())));
        assert!(part.starts_with(&TreePath::Message { mailbox: inbox.clone(), uid }));
        assert!(!TreePath::Mailbox(inbox.clone()).starts_with(&TreePath::MessageList(inbox)));
    }
}
