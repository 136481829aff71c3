//! Command tag generator.

use crate::types::Tag;

/// Per-connection tag generator.
///
/// Tags are a fixed prefix followed by a strictly increasing counter, so no
/// two tags issued by the same generator are ever equal.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    counter: u64,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { counter: 0, prefix }
    }

    /// Generates the next tag.
    pub fn next_tag(&mut self) -> Tag {
        let n = self.counter;
        self.counter += 1;
        Tag::new(format!("{}{n:04}", self.prefix))
    }

    /// Number of tags issued so far.
    #[must_use]
    pub const fn issued(&self) -> u64 {
        self.counter
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('y')
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn sequential_tags() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.next_tag().as_str(), "y0000");
        assert_eq!(generator.next_tag().as_str(), "y0001");
        assert_eq!(generator.issued(), 2);
    }

    #[test]
    fn counter_outgrows_padding() {
        let mut generator = TagGenerator::new('T');
        for _ in 0..10_000 {
            let _ = generator.next_tag();
        }
        assert_eq!(generator.next_tag().as_str(), "T10000");
    }

    proptest! {
        #[test]
        fn tags_are_pairwise_distinct(count in 1usize..3000, prefix in proptest::char::range('a', 'z')) {
            let mut generator = TagGenerator::new(prefix);
            let mut seen = HashSet::new();
            for _ in 0..count {
                prop_assert!(seen.insert(generator.next_tag()));
            }
        }
    }
}
