//! Message flags.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A system flag or a keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Flag {
    /// `\Seen`
    Seen,
    /// `\Answered`
    Answered,
    /// `\Flagged`
    Flagged,
    /// `\Deleted`
    Deleted,
    /// `\Draft`
    Draft,
    /// `\Recent`; set by the server only.
    Recent,
    /// Any other flag, verbatim (`$Forwarded`, `\*`, ...).
    Keyword(String),
}

static SYSTEM_FLAGS: [(&str, Flag); 6] = [
    ("\\Seen", Flag::Seen),
    ("\\Answered", Flag::Answered),
    ("\\Flagged", Flag::Flagged),
    ("\\Deleted", Flag::Deleted),
    ("\\Draft", Flag::Draft),
    ("\\Recent", Flag::Recent),
];

impl Flag {
    /// System flags match case-insensitively; anything else is a keyword.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        SYSTEM_FLAGS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map_or_else(|| Self::Keyword(s.to_string()), |(_, flag)| flag.clone())
    }

    /// Wire spelling.
    #[must_use]
    pub fn as_str(&self) -> &str {
        if let Self::Keyword(keyword) = self {
            return keyword;
        }
        SYSTEM_FLAGS
            .iter()
            .find(|(_, flag)| flag == self)
            .map_or("", |(name, _)| *name)
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `STORE` data item: add to, remove from, or replace a message's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlagOperation {
    /// `+FLAGS`
    Add,
    /// `-FLAGS`
    Remove,
    /// `FLAGS`
    Replace,
}

impl FlagOperation {
    /// The data item name as sent.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+FLAGS",
            Self::Remove => "-FLAGS",
            Self::Replace => "FLAGS",
        }
    }
}

/// A message's flags as an ordered set.
///
/// Equality ignores the order the server listed them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flags(BTreeSet<Flag>);

impl Flags {
    /// No flags.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects `flags`, dropping duplicates.
    #[must_use]
    pub fn from_vec(flags: Vec<Flag>) -> Self {
        flags.into_iter().collect()
    }

    /// Adds `flag` if absent.
    pub fn insert(&mut self, flag: Flag) {
        self.0.insert(flag);
    }

    /// Drops `flag` if present.
    pub fn remove(&mut self, flag: &Flag) {
        self.0.remove(flag);
    }

    /// Whether `flag` is set.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.0.contains(flag)
    }

    /// Mirrors what the server does for a `STORE` of `flags`.
    ///
    /// Idempotent, so replaying an operation the server already applied is
    /// harmless.
    pub fn apply(&mut self, op: FlagOperation, flags: &Self) {
        match op {
            FlagOperation::Add => self.0.extend(flags.iter().cloned()),
            FlagOperation::Remove => self.0.retain(|f| !flags.contains(f)),
            FlagOperation::Replace => self.0.clone_from(&flags.0),
        }
    }

    /// `\Seen` is set.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.contains(&Flag::Seen)
    }

    /// `\Flagged` is set.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.contains(&Flag::Flagged)
    }

    /// `\Deleted` is set.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.contains(&Flag::Deleted)
    }

    /// Flags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.0.iter()
    }

    /// Number of distinct flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No flags at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(flags: I) -> Self {
        Self(flags.into_iter().collect())
    }
}

impl IntoIterator for Flags {
    type Item = Flag;
    type IntoIter = std::collections::btree_set::IntoIter<Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
