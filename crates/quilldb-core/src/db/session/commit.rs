use crate::{
    db::{
        Db,
        session::{Pending, Session, Tracked, TrackedSlot},
        store::{LinkRow, RawRow},
    },
    error::InternalError,
    key::{Key, RecordKey},
    traits::EntityKind,
};
use std::collections::BTreeSet;

///
/// CascadeCtx
///
/// Handed to `Relations::cascade_save` / `cascade_delete` while the commit
/// plan is built. Entities use it to pull owned children into the unit of
/// work and to declare the link rows their associations imply.
///

pub struct CascadeCtx<'a> {
    session: &'a Session,
    discovered: Vec<(RecordKey, TrackedSlot)>,
    links: BTreeSet<LinkRow>,
    unlink_owners: Vec<(&'static str, RecordKey)>,
}

impl<'a> CascadeCtx<'a> {
    fn new(session: &'a Session) -> Self {
        Self {
            session,
            discovered: Vec::new(),
            links: BTreeSet::new(),
            unlink_owners: Vec::new(),
        }
    }

    /// The session whose unit of work is being flushed. Association fetch
    /// helpers need it to reach the stores through the identity map.
    #[must_use]
    pub const fn session(&self) -> &Session {
        self.session
    }

    /// Pull an owned child into the unit of work, minting an identity if it
    /// has none, and return its key.
    ///
    /// A child whose key is already tracked by a different instance is a
    /// conflict, reported as the non-unique-object error.
    pub fn save<E: EntityKind>(&mut self, child: &Tracked<E>) -> Result<Key, InternalError> {
        let key = match child.with(E::key) {
            Some(key) => key,
            None => {
                let key = self.session.db().next_key(E::ENTITY_NAME);
                child.with_mut(|entity| entity.set_key(key));
                key
            }
        };
        let record = RecordKey::new(E::ENTITY_NAME, key);

        if let Some(slot) = self.session.slot(record) {
            let same = slot
                .typed::<E>()
                .is_some_and(|existing| existing.ptr_eq(child));
            if !same {
                return Err(InternalError::session_non_unique(E::ENTITY_NAME, key));
            }
            return Ok(key);
        }

        let pending = if self.session.db().row(record).is_some() {
            Pending::Update
        } else {
            Pending::Insert
        };
        let slot = TrackedSlot::new(child, pending);
        slot.bind(self.session);
        self.session.insert_slot(record, slot.clone());
        self.discovered.push((record, slot));

        Ok(key)
    }

    /// Declare a link row the owning side's association implies. Rows
    /// already stored are left alone at apply time.
    pub fn link(&mut self, relation: &'static str, source: RecordKey, target: RecordKey) {
        self.links.insert(LinkRow::new(relation, source, target));
    }

    /// Pull an owned child into the unit of work as a removal.
    pub fn delete<E: EntityKind>(&mut self, child: &Tracked<E>) -> Result<(), InternalError> {
        let Some(key) = child.with(E::key) else {
            // Transient child, no row to remove.
            return Ok(());
        };
        let record = RecordKey::new(E::ENTITY_NAME, key);

        if let Some(slot) = self.session.slot(record) {
            if slot.pending() != Pending::Delete {
                slot.set_pending(Pending::Delete);
                self.discovered.push((record, slot));
            }
            return Ok(());
        }

        let slot = TrackedSlot::new(child, Pending::Delete);
        self.session.insert_slot(record, slot.clone());
        self.discovered.push((record, slot));

        Ok(())
    }

    /// Remove every stored link row touching `record` under `relation`, on
    /// either side.
    pub fn unlink_all(&mut self, relation: &'static str, record: RecordKey) {
        self.unlink_owners.push((relation, record));
    }
}

///
/// CommitPlan
///
/// Every store mutation one commit will apply, computed up front so the
/// apply loop is a straight walk with an undo ledger.
///

#[derive(Default)]
struct CommitPlan {
    writes: Vec<(RecordKey, RawRow)>,
    deletes: Vec<RecordKey>,
    link_inserts: Vec<LinkRow>,
    unlink_owners: Vec<(&'static str, RecordKey)>,
}

///
/// CommitUnit
///
/// Undo ledger for one commit. Every applied mutation stages a closure
/// that restores the prior store state; on failure they run in reverse.
///

#[derive(Default)]
struct CommitUnit {
    undo: Vec<Box<dyn FnOnce(&Db)>>,
}

impl CommitUnit {
    fn stage(&mut self, f: impl FnOnce(&Db) + 'static) {
        self.undo.push(Box::new(f));
    }

    fn rollback(self, db: &Db) {
        for f in self.undo.into_iter().rev() {
            f(db);
        }
    }
}

/// Flush the session's unit of work atomically: cascade to fixpoint, plan
/// the mutations, apply them with rollback on failure.
pub(crate) fn run(session: &Session) -> Result<(), InternalError> {
    let plan = build_plan(session)?;
    session.debug_log(format!(
        "commit -> {} writes, {} deletes, {} links, {} unlink scopes",
        plan.writes.len(),
        plan.deletes.len(),
        plan.link_inserts.len(),
        plan.unlink_owners.len(),
    ));
    let db = session.db();

    let mut unit = CommitUnit::default();
    if let Err(err) = apply(&db, plan, &mut unit) {
        unit.rollback(&db);
        return Err(err);
    }

    session.settle_after_commit()?;

    Ok(())
}

fn build_plan(session: &Session) -> Result<CommitPlan, InternalError> {
    let mut ctx = CascadeCtx::new(session);

    // Cascade until no new instances join the unit of work.
    let mut visited: BTreeSet<RecordKey> = BTreeSet::new();
    let mut queue = session.snapshot_slots();
    while let Some((record, slot)) = queue.pop() {
        if !visited.insert(record) {
            continue;
        }
        match slot.pending() {
            Pending::Delete => slot.cascade_delete(&mut ctx)?,
            _ => slot.cascade_save(&mut ctx)?,
        }
        queue.append(&mut ctx.discovered);
    }
    let links = ctx.links;
    let unlink_owners = ctx.unlink_owners;

    let db = session.db();
    let mut plan = CommitPlan {
        unlink_owners,
        ..CommitPlan::default()
    };

    for (record, slot) in session.snapshot_slots() {
        match slot.pending() {
            Pending::Insert | Pending::Update => plan.writes.push((record, slot.encode()?)),
            Pending::Clean => {
                // Dirty check against the load-time baseline. Comparing
                // against the stored row instead would make an unmodified
                // instance overwrite a row another session committed.
                let row = slot.encode()?;
                if slot.baseline().as_ref() != Some(&row) {
                    plan.writes.push((record, row));
                }
            }
            Pending::Delete => plan.deletes.push(record),
        }
    }

    // Inserts queued on instances evicted after save still flush.
    for (record, slot) in session.snapshot_detached_inserts() {
        plan.writes.push((record, slot.encode()?));
    }

    for link in links {
        if !db.with_links(|store| store.contains(&link)) {
            plan.link_inserts.push(link);
        }
    }

    Ok(plan)
}

fn apply(db: &Db, plan: CommitPlan, unit: &mut CommitUnit) -> Result<(), InternalError> {
    for (record, row) in plan.writes {
        checkpoint()?;
        let prior = db.insert_row(record, row);
        unit.stage(move |db| {
            match prior {
                Some(row) => db.insert_row(record, row),
                None => db.remove_row(record),
            };
        });
    }

    for record in plan.deletes {
        checkpoint()?;
        let prior = db.remove_row(record);
        unit.stage(move |db| {
            if let Some(row) = prior {
                db.insert_row(record, row);
            }
        });
    }

    for link in plan.link_inserts {
        checkpoint()?;
        if db.with_links_mut(|store| store.insert(link)) {
            unit.stage(move |db| {
                db.with_links_mut(|store| store.remove(&link));
            });
        }
    }

    for (relation, record) in plan.unlink_owners {
        checkpoint()?;
        let removed = db.with_links_mut(|store| store.remove_touching(relation, record));
        unit.stage(move |db| {
            db.with_links_mut(|store| {
                for row in &removed {
                    store.insert(*row);
                }
            });
        });
    }

    Ok(())
}

// ---- failure injection ----

#[cfg(test)]
thread_local! {
    static FAIL_REMAINING: std::cell::Cell<Option<u32>> = const { std::cell::Cell::new(None) };
}

/// Make the current thread's next commit fail after `mutations` applied
/// store mutations.
#[cfg(test)]
pub(crate) fn fail_after(mutations: u32) {
    FAIL_REMAINING.with(|cell| cell.set(Some(mutations)));
}

fn checkpoint() -> Result<(), InternalError> {
    #[cfg(test)]
    {
        let tripped = FAIL_REMAINING.with(|cell| match cell.get() {
            Some(0) => {
                cell.set(None);
                true
            }
            Some(n) => {
                cell.set(Some(n - 1));
                false
            }
            None => false,
        });
        if tripped {
            return Err(InternalError::commit_internal("injected commit failure"));
        }
    }

    Ok(())
}
