use crate::gate::InitGate;
use crate::generation::{Attached, Generation, Settled};
use crate::LockMode;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::hash_map;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

type Slot<V, E> = Arc<Generation<V, E>>;

enum SlotMap<K, V, E> {
    PerKey(DashMap<K, Slot<V, E>>),
    Global {
        slots: Mutex<HashMap<K, Slot<V, E>>>,
        gate: InitGate,
    },
}

/// Table of in-flight generations, at most one per key.
///
/// The table is the only mutable state the coordinator shares between
/// callers. Its lock (a DashMap shard, or the single mutex in global mode) is
/// held only for the claim-or-attach step and for slot removal, never while
/// an initializer runs or a caller waits.
pub(crate) struct SlotTable<K, V, E> {
    map: SlotMap<K, V, E>,
    next_id: AtomicU64,
}

/// Result of [`SlotTable::claim`].
pub(crate) enum Claim<'a, K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// The caller created the slot and must run the initializer.
    Owner(SlotGuard<'a, K, V, E>),
    /// Another caller owns the slot; wait on its generation.
    Waiter(Attached<V, E>),
}

impl<K, V, E> SlotTable<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub(crate) fn new(mode: LockMode) -> Self {
        let map = match mode {
            LockMode::PerKey => SlotMap::PerKey(DashMap::new()),
            LockMode::Global => SlotMap::Global {
                slots: Mutex::new(HashMap::new()),
                gate: InitGate::new(),
            },
        };
        Self {
            map,
            next_id: AtomicU64::new(1),
        }
    }

    /// Atomically attaches to the key's in-flight generation or creates one
    /// and makes the caller its owner.
    pub(crate) fn claim(&self, key: &K) -> Claim<'_, K, V, E> {
        match &self.map {
            SlotMap::PerKey(slots) => match slots.entry(key.clone()) {
                Entry::Occupied(entry) => {
                    Claim::Waiter(entry.get().attach())
                }
                Entry::Vacant(entry) => {
                    let generation = self.new_generation();
                    entry.insert(Arc::clone(&generation));
                    Claim::Owner(SlotGuard::new(self, key.clone(), generation))
                }
            },
            SlotMap::Global { slots, .. } => {
                let mut slots = slots.lock();
                let claim = match slots.entry(key.clone()) {
                    hash_map::Entry::Occupied(entry) => {
                        Claim::Waiter(entry.get().attach())
                    }
                    hash_map::Entry::Vacant(entry) => {
                        let generation = self.new_generation();
                        entry.insert(Arc::clone(&generation));
                        Claim::Owner(SlotGuard::new(self, key.clone(), generation))
                    }
                };
                claim
            }
        }
    }

    /// The cache-wide initialization gate, present only in global mode.
    pub(crate) fn gate(&self) -> Option<&InitGate> {
        match &self.map {
            SlotMap::PerKey(_) => None,
            SlotMap::Global { gate, .. } => Some(gate),
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<Slot<V, E>> {
        match &self.map {
            SlotMap::PerKey(slots) => slots.get(key).map(|slot| Arc::clone(slot.value())),
            SlotMap::Global { slots, .. } => slots.lock().get(key).cloned(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match &self.map {
            SlotMap::PerKey(slots) => slots.len(),
            SlotMap::Global { slots, .. } => slots.lock().len(),
        }
    }

    fn new_generation(&self) -> Slot<V, E> {
        Arc::new(Generation::new(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    /// Removes the key's slot if it still belongs to `generation`.
    fn release(&self, key: &K, generation: &Slot<V, E>) {
        match &self.map {
            SlotMap::PerKey(slots) => {
                slots.remove_if(key, |_, slot| Arc::ptr_eq(slot, generation));
            }
            SlotMap::Global { slots, .. } => {
                let mut slots = slots.lock();
                if slots
                    .get(key)
                    .is_some_and(|slot| Arc::ptr_eq(slot, generation))
                {
                    slots.remove(key);
                }
            }
        }
    }
}

/// Ownership of one generation's slot.
///
/// The owner either calls [`settle`](Self::settle) or drops the guard. A
/// dropped guard (cancelled future, panicking initializer) still removes the
/// slot and wakes the waiters with [`Settled::Abandoned`], so a key can never
/// be left with a dead slot.
pub(crate) struct SlotGuard<'a, K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    table: &'a SlotTable<K, V, E>,
    key: K,
    generation: Slot<V, E>,
    settled: bool,
}

impl<'a, K, V, E> SlotGuard<'a, K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn new(table: &'a SlotTable<K, V, E>, key: K, generation: Slot<V, E>) -> Self {
        Self {
            table,
            key,
            generation,
            settled: false,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.generation.id()
    }

    /// Removes the slot from the table, then broadcasts the outcome.
    ///
    /// Removal comes first: a waiter woken by the broadcast that needs to
    /// claim again must not find the settled slot still in place.
    pub(crate) fn settle(mut self, outcome: Settled<V, E>) {
        self.table.release(&self.key, &self.generation);
        self.generation.settle(outcome);
        self.settled = true;
    }
}

impl<K, V, E> Drop for SlotGuard<'_, K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(
            generation = self.generation.id(),
            waiters = self.generation.waiters(),
            "in-flight generation abandoned by its owner"
        );
        self.table.release(&self.key, &self.generation);
        self.generation.settle(Settled::Abandoned);
    }
}
