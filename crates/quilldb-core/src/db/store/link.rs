use crate::key::RecordKey;
use std::collections::BTreeSet;

///
/// LinkRow
///
/// One join-table row: (relation, source record, target record). Both ends
/// carry their entity name, so a key number from one side of a relation can
/// never satisfy a lookup against the other side.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LinkRow {
    pub relation: &'static str,
    pub source: RecordKey,
    pub target: RecordKey,
}

impl LinkRow {
    #[must_use]
    pub const fn new(relation: &'static str, source: RecordKey, target: RecordKey) -> Self {
        Self {
            relation,
            source,
            target,
        }
    }
}

///
/// LinkStore
///
/// Set-semantics join table shared by every many-to-many relation.
///

#[derive(Default)]
pub struct LinkStore(BTreeSet<LinkRow>);

impl LinkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the row was not present before.
    pub fn insert(&mut self, row: LinkRow) -> bool {
        self.0.insert(row)
    }

    pub fn remove(&mut self, row: &LinkRow) -> bool {
        self.0.remove(row)
    }

    #[must_use]
    pub fn contains(&self, row: &LinkRow) -> bool {
        self.0.contains(row)
    }

    /// Forward scan: all targets linked from `source` under `relation`.
    ///
    /// Walks the whole relation; acceptable at this store's scale.
    #[must_use]
    pub fn targets(&self, relation: &'static str, source: RecordKey) -> Vec<RecordKey> {
        self.0
            .iter()
            .filter(|row| row.relation == relation && row.source == source)
            .map(|row| row.target)
            .collect()
    }

    /// Inverse scan: all sources linking to `target` under `relation`.
    #[must_use]
    pub fn sources(&self, relation: &'static str, target: RecordKey) -> Vec<RecordKey> {
        self.0
            .iter()
            .filter(|row| row.relation == relation && row.target == target)
            .map(|row| row.source)
            .collect()
    }

    /// Remove every row touching `record` on either side of `relation`.
    /// Returns the removed rows so a caller can restore them on rollback.
    pub fn remove_touching(&mut self, relation: &'static str, record: RecordKey) -> Vec<LinkRow> {
        let removed: Vec<LinkRow> = self
            .0
            .iter()
            .filter(|row| {
                row.relation == relation && (row.source == record || row.target == record)
            })
            .copied()
            .collect();
        for row in &removed {
            self.0.remove(row);
        }
        removed
    }

    /// Drop every row of one relation. Returns the number removed.
    pub fn clear_relation(&mut self, relation: &'static str) -> usize {
        let before = self.0.len();
        self.0.retain(|row| row.relation != relation);
        before - self.0.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
