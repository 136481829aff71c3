//! Tags, sequence numbers, UIDs and UIDVALIDITY.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Correlates a command with its tagged completion.
///
/// Unique among the commands in flight on one connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub String);

impl Tag {
    /// Wraps a tag string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declares a non-zero 32-bit protocol number.
macro_rules! nonzero_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub NonZeroU32);

        impl $name {
            /// `None` for zero, which the protocol never assigns.
            #[must_use]
            pub const fn new(n: u32) -> Option<Self> {
                match NonZeroU32::new(n) {
                    Some(n) => Some(Self(n)),
                    None => None,
                }
            }

            /// The raw number.
            #[must_use]
            pub const fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

nonzero_id! {
    /// 1-based position in the selected mailbox.
    ///
    /// Shifts down whenever an earlier message is expunged.
    SeqNum
}

nonzero_id! {
    /// Stable message identifier, meaningful only within one
    /// [`UidValidity`] epoch of its mailbox.
    Uid
}

nonzero_id! {
    /// Epoch of a mailbox's UIDs. A new value invalidates every cached UID.
    UidValidity
}

impl SeqNum {
    /// Zero-based index into the mailbox's message list.
    #[must_use]
    pub const fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_never_an_identifier() {
        assert!(SeqNum::new(0).is_none());
        assert!(Uid::new(0).is_none());
        assert!(UidValidity::new(0).is_none());
        assert_eq!(Uid::new(u32::MAX).map(Uid::get), Some(u32::MAX));
    }

    #[test]
    fn seq_num_maps_to_list_index() {
        assert_eq!(SeqNum::new(1).unwrap().index(), 0);
        assert_eq!(SeqNum::new(7).unwrap().index(), 6);
    }

    #[test]
    fn uids_order_numerically() {
        let mut uids = [Uid::new(200).unwrap(), Uid::new(9).unwrap(), Uid::new(31).unwrap()];
        uids.sort();
        assert_eq!(uids.map(Uid::get), [9, 31, 200]);
    }

    #[test]
    fn display_is_the_bare_value() {
        assert_eq!(Tag::new("y0001").to_string(), "y0001");
        assert_eq!(UidValidity::new(42).unwrap().to_string(), "42");
    }
}
