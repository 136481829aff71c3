//! Arguments shared by several commands.

use std::fmt;

use crate::types::{SeqRange, UidSet};

/// The messages a FETCH applies to.
///
/// Whether a [`MessageSet::Range`] counts sequence numbers or UIDs depends on
/// the command that carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSet {
    /// Listed UIDs; only valid in a `UID` command.
    Uids(UidSet),
    /// `n:*`.
    Range(SeqRange),
}

impl fmt::Display for MessageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uids(set) => fmt::Display::fmt(set, f),
            Self::Range(range) => fmt::Display::fmt(range, f),
        }
    }
}

/// Counter requested by STATUS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribute {
    /// Message count.
    Messages,
    /// `\Recent` count.
    Recent,
    /// Predicted next UID.
    UidNext,
    /// Current UIDVALIDITY.
    UidValidity,
    /// Messages without `\Seen`.
    Unseen,
}

impl StatusAttribute {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
        }
    }
}

/// One data item named in a FETCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `FLAGS`
    Flags,
    /// `INTERNALDATE`
    InternalDate,
    /// `RFC822.SIZE`
    Rfc822Size,
    /// `ENVELOPE`
    Envelope,
    /// `BODYSTRUCTURE`
    BodyStructure,
    /// `UID`
    Uid,
    /// `BODY[section]`, or `BODY.PEEK[section]` which leaves `\Seen` alone.
    Body {
        /// Text inside the brackets; `None` for the whole message.
        section: Option<String>,
        /// Use `BODY.PEEK`.
        peek: bool,
    },
}
