//! Command builder.
//!
//! Only the commands the engine issues are modelled. Serialization yields one
//! or more chunks; see [`Command::serialize`].

mod serialize;
mod tag_generator;
mod types;

use crate::types::{FlagOperation, Flags, Mailbox, Tag, UidSet};

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, MessageSet, StatusAttribute};

use serialize::CommandWriter;

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: Mailbox,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: Mailbox,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: Mailbox,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: Mailbox,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// STATUS command.
    Status {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Status items to request.
        items: Vec<StatusAttribute>,
    },
    /// EXPUNGE command.
    Expunge,
    /// FETCH or UID FETCH.
    Fetch {
        /// Messages to fetch.
        set: MessageSet,
        /// Items to fetch.
        items: Vec<FetchAttribute>,
        /// Use UIDs.
        uid: bool,
    },
    /// UID STORE.
    Store {
        /// Target UIDs.
        uids: UidSet,
        /// How the flags are combined with the current ones.
        operation: FlagOperation,
        /// Flags to store.
        flags: Flags,
        /// Suppress the untagged FETCH echo.
        silent: bool,
    },
    /// UID COPY.
    Copy {
        /// Source UIDs.
        uids: UidSet,
        /// Target mailbox.
        mailbox: Mailbox,
    },
    /// UID MOVE.
    Move {
        /// Source UIDs.
        uids: UidSet,
        /// Target mailbox.
        mailbox: Mailbox,
    },
}

impl Command {
    /// Serializes the command with the given tag.
    ///
    /// Returns at least one chunk. Every chunk except the last ends with a
    /// synchronizing literal announcement, and the following chunk must not be
    /// sent until the server has answered with a continuation request.
    #[must_use]
    pub fn serialize(&self, tag: &Tag) -> Vec<Vec<u8>> {
        let mut w = CommandWriter::default();
        w.raw(tag.as_str().as_bytes());
        w.push(b' ');

        match self {
            Self::Capability => w.raw(b"CAPABILITY"),
            Self::Noop => w.raw(b"NOOP"),
            Self::Logout => w.raw(b"LOGOUT"),
            Self::Login { username, password } => {
                w.raw(b"LOGIN ");
                w.astring(username);
                w.push(b' ');
                w.astring(password);
            }
            Self::Select { mailbox } => {
                w.raw(b"SELECT ");
                w.mailbox(mailbox);
            }
            Self::Examine { mailbox } => {
                w.raw(b"EXAMINE ");
                w.mailbox(mailbox);
            }
            Self::Create { mailbox } => {
                w.raw(b"CREATE ");
                w.mailbox(mailbox);
            }
            Self::Delete { mailbox } => {
                w.raw(b"DELETE ");
                w.mailbox(mailbox);
            }
            Self::List { reference, pattern } => {
                w.raw(b"LIST ");
                w.astring(reference);
                w.push(b' ');
                w.astring(pattern);
            }
            Self::Status { mailbox, items } => {
                w.raw(b"STATUS ");
                w.mailbox(mailbox);
                w.raw(b" (");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        w.push(b' ');
                    }
                    w.raw(item.as_str().as_bytes());
                }
                w.push(b')');
            }
            Self::Expunge => w.raw(b"EXPUNGE"),
            Self::Fetch { set, items, uid } => {
                if *uid {
                    w.raw(b"UID ");
                }
                w.raw(format!("FETCH {set} ").as_bytes());
                w.fetch_attributes(items);
            }
            Self::Store {
                uids,
                operation,
                flags,
                silent,
            } => {
                w.raw(format!("UID STORE {uids} {}", operation.as_str()).as_bytes());
                if *silent {
                    w.raw(b".SILENT");
                }
                w.push(b' ');
                w.flags(flags);
            }
            Self::Copy { uids, mailbox } => {
                w.raw(format!("UID COPY {uids} ").as_bytes());
                w.mailbox(mailbox);
            }
            Self::Move { uids, mailbox } => {
                w.raw(format!("UID MOVE {uids} ").as_bytes());
                w.mailbox(mailbox);
            }
        }

        w.finish()
    }

    /// Command name for logging, never including credentials.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::List { .. } => "LIST",
            Self::Status { .. } => "STATUS",
            Self::Expunge => "EXPUNGE",
            Self::Fetch { uid: true, .. } => "UID FETCH",
            Self::Fetch { uid: false, .. } => "FETCH",
            Self::Store { .. } => "UID STORE",
            Self::Copy { .. } => "UID COPY",
            Self::Move { .. } => "UID MOVE",
        }
    }
}
