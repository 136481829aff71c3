//! Message sets for UID-addressed and sequence-addressed commands.

use std::collections::BTreeSet;

use super::Uid;

/// Ascending, duplicate-free set of UIDs.
///
/// Rendering compresses consecutive UIDs into ranges (`1:3,7,9:10`), so the
/// same selection always produces the same command text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UidSet {
    uids: BTreeSet<Uid>,
}

impl UidSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a UID.
    pub fn insert(&mut self, uid: Uid) {
        self.uids.insert(uid);
    }

    /// Returns true if the UID is part of the set.
    #[must_use]
    pub fn contains(&self, uid: Uid) -> bool {
        self.uids.contains(&uid)
    }

    /// Iterates UIDs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Uid> + '_ {
        self.uids.iter().copied()
    }

    /// Number of UIDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.uids.len()
    }

    /// Returns true if no UID is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }
}

impl FromIterator<Uid> for UidSet {
    fn from_iter<I: IntoIterator<Item = Uid>>(iter: I) -> Self {
        Self {
            uids: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Display for UidSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut iter = self.uids.iter().map(|uid| uid.get());
        let Some(first) = iter.next() else {
            return Ok(());
        };

        let mut start = first;
        let mut end = first;
        let mut wrote = false;

        let mut flush = |f: &mut std::fmt::Formatter<'_>, start: u32, end: u32| {
            if wrote {
                f.write_str(",")?;
            }
            wrote = true;
            if start == end {
                write!(f, "{start}")
            } else {
                write!(f, "{start}:{end}")
            }
        };

        for uid in iter {
            if uid == end + 1 {
                end = uid;
            } else {
                flush(f, start, end)?;
                start = uid;
                end = uid;
            }
        }
        flush(f, start, end)
    }
}

/// Open-ended range `n:*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqRange {
    start: u32,
}

impl SeqRange {
    /// Range from `start` to the last message. A zero start is clamped to 1.
    #[must_use]
    pub fn from(start: u32) -> Self {
        Self {
            start: start.max(1),
        }
    }

    /// Every message (`1:*`).
    #[must_use]
    pub fn all() -> Self {
        Self::from(1)
    }

    /// First number in the range.
    #[must_use]
    pub const fn start(self) -> u32 {
        self.start
    }
}

impl std::fmt::Display for SeqRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:*", self.start)
    }
}
