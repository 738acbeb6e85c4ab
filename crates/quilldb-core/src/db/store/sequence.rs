use crate::key::Key;
use std::collections::BTreeMap;

///
/// SequenceRegistry
///
/// Per-entity surrogate key allocator. Keys start at 1 and are handed out
/// once; nothing is reclaimed when rows are deleted or a session discards
/// its pending work.
///

#[derive(Default)]
pub struct SequenceRegistry {
    next: BTreeMap<&'static str, u64>,
}

impl SequenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, entity: &'static str) -> Key {
        let counter = self.next.entry(entity).or_insert(1);
        let key = Key::new(*counter);
        *counter += 1;
        key
    }

    /// Next key that `next` would hand out, without consuming it.
    #[must_use]
    pub fn peek(&self, entity: &'static str) -> Key {
        Key::new(self.next.get(entity).copied().unwrap_or(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_monotonic_and_per_entity() {
        let mut seq = SequenceRegistry::new();
        assert_eq!(seq.next("author"), Key::new(1));
        assert_eq!(seq.next("author"), Key::new(2));
        assert_eq!(seq.next("book"), Key::new(1));
        assert_eq!(seq.peek("author"), Key::new(3));
    }
}
