//! Mailbox names and LIST data.

use std::fmt;

use serde::{Deserialize, Serialize};

const INBOX: &str = "INBOX";

/// A mailbox name as sent on the wire.
///
/// `INBOX` is case-insensitive in IMAP; [`Mailbox::new`] normalizes any
/// spelling of it so that names compare equal. Other names are kept as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Wraps a mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case(INBOX) {
            Self::inbox()
        } else {
            Self(name)
        }
    }

    /// `INBOX`.
    #[must_use]
    pub fn inbox() -> Self {
        Self(INBOX.to_string())
    }

    /// The name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the server's INBOX.
    #[must_use]
    pub fn is_inbox(&self) -> bool {
        self.0 == INBOX
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One `* LIST` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Name attributes such as `\Noselect`.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter; `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// The listed mailbox.
    pub mailbox: Mailbox,
}

impl ListResponse {
    fn has(&self, attribute: &MailboxAttribute) -> bool {
        self.attributes.contains(attribute)
    }

    /// False when the server reported `\Noselect`.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self.has(&MailboxAttribute::NoSelect)
    }

    /// The server's hint about children, if it gave one.
    #[must_use]
    pub fn has_children(&self) -> Option<bool> {
        if self.has(&MailboxAttribute::HasChildren) {
            return Some(true);
        }
        let leaf = self.has(&MailboxAttribute::HasNoChildren)
            || self.has(&MailboxAttribute::NoInferiors);
        leaf.then_some(false)
    }
}

/// Name attribute from a LIST response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// `\Noselect`
    NoSelect,
    /// `\Noinferiors`
    NoInferiors,
    /// `\HasNoChildren`
    HasNoChildren,
    /// `\HasChildren`
    HasChildren,
    /// `\Marked`
    Marked,
    /// `\Unmarked`
    Unmarked,
    /// Any other attribute, verbatim.
    Unknown(String),
}

static KNOWN_ATTRIBUTES: [(&str, MailboxAttribute); 6] = [
    ("\\Noselect", MailboxAttribute::NoSelect),
    ("\\Noinferiors", MailboxAttribute::NoInferiors),
    ("\\HasNoChildren", MailboxAttribute::HasNoChildren),
    ("\\HasChildren", MailboxAttribute::HasChildren),
    ("\\Marked", MailboxAttribute::Marked),
    ("\\Unmarked", MailboxAttribute::Unmarked),
];

impl MailboxAttribute {
    /// Matches an attribute case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        KNOWN_ATTRIBUTES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map_or_else(|| Self::Unknown(s.to_string()), |(_, a)| a.clone())
    }
}
