// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.

//! Fixed capacity change histories, one per declared identifier.

use std::collections::BTreeMap;

use super::error::ParseError;
use super::signal::{Value, VectorSignal};
use super::visit::VisitorMut;

/// The `(timestamp, value)` history of one identifier.
///
/// Capacity is set once from the structure pass count and never changes.
/// Timestamps are kept apart from values so that lookups only walk the
/// timestamp vector.
#[derive(Debug)]
pub struct ChangeStore {
    id: u64,
    num_bits: u32,
    capacity: usize,
    timestamps: Vec<u64>,
    values: Vec<Value>,
}

impl ChangeStore {
    pub(crate) fn with_capacity(id: u64, num_bits: u32, capacity: usize) -> ChangeStore {
        ChangeStore {
            id,
            num_bits,
            capacity,
            timestamps: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Appends one change. Running past the capacity counted by the
    /// structure pass means the two passes read different data.
    pub(crate) fn push(&mut self, timestamp: u64, value: Value) -> Result<(), ParseError> {
        if self.timestamps.len() == self.capacity {
            return Err(ParseError::ChangeCountMismatch {
                id: self.id,
                capacity: self.capacity,
                seen: self.capacity + 1,
            });
        }
        debug_assert!(self.timestamps.last().map_or(true, |last| *last <= timestamp));
        self.timestamps.push(timestamp);
        self.values.push(value);
        Ok(())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.timestamps.len() == self.capacity
    }

    pub fn change(&self, idx: usize) -> Option<(u64, &Value)> {
        Some((*self.timestamps.get(idx)?, self.values.get(idx)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &Value)> + '_ {
        self.timestamps.iter().copied().zip(self.values.iter())
    }

    pub fn first_timestamp(&self) -> Option<u64> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.timestamps.last().copied()
    }

    /// The value held at `time`: the last change at or before it. `None`
    /// when `time` precedes the first recorded change.
    pub fn value_at(&self, time: u64) -> Option<&Value> {
        // number of changes at or before `time`; log2(n) over the timestamps
        let after = self.timestamps.partition_point(|timestamp| *timestamp <= time);
        if after == 0 {
            return None;
        }
        self.values.get(after - 1)
    }
}

/// Slots for every code of up to three characters are indexed directly.
const DENSE_SLOTS: usize = 94 + 94 * 94 + 94 * 94 * 94 + 1;

fn dense_slot(id: u64) -> Option<usize> {
    usize::try_from(id).ok().filter(|slot| *slot < DENSE_SLOTS)
}

/// Per-identifier values. Short codes live in a vector that grows on
/// demand; the rare longer codes go to an ordered map, so one sparse code
/// costs one entry rather than a table up to its id.
#[derive(Debug, Clone)]
pub(crate) struct IdTable<T> {
    dense: Vec<Option<T>>,
    sparse: BTreeMap<u64, T>,
}

impl<T> Default for IdTable<T> {
    fn default() -> Self {
        IdTable {
            dense: vec![],
            sparse: BTreeMap::new(),
        }
    }
}

impl<T> IdTable<T> {
    fn grow(&mut self, slot: usize) {
        if self.dense.len() <= slot {
            self.dense.resize_with(slot + 1, || None);
        }
    }

    pub(crate) fn get(&self, id: u64) -> Option<&T> {
        match dense_slot(id) {
            Some(slot) => self.dense.get(slot)?.as_ref(),
            None => self.sparse.get(&id),
        }
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Option<&mut T> {
        match dense_slot(id) {
            Some(slot) => self.dense.get_mut(slot)?.as_mut(),
            None => self.sparse.get_mut(&id),
        }
    }

    pub(crate) fn insert(&mut self, id: u64, value: T) {
        match dense_slot(id) {
            Some(slot) => {
                self.grow(slot);
                self.dense[slot] = Some(value);
            }
            None => {
                self.sparse.insert(id, value);
            }
        }
    }

    pub(crate) fn get_or_insert_with(&mut self, id: u64, default: impl FnOnce() -> T) -> &mut T {
        match dense_slot(id) {
            Some(slot) => {
                self.grow(slot);
                self.dense[slot].get_or_insert_with(default)
            }
            None => self.sparse.entry(id).or_insert_with(default),
        }
    }

    /// Occupied slots in increasing id order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (u64, &T)> + '_ {
        let dense = self
            .dense
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| Some((id as u64, slot.as_ref()?)));
        dense.chain(self.sparse.iter().map(|(id, value)| (*id, value)))
    }
}

impl<T> FromIterator<(u64, T)> for IdTable<T> {
    fn from_iter<I: IntoIterator<Item = (u64, T)>>(iter: I) -> Self {
        let mut table = IdTable::default();
        for (id, value) in iter {
            table.insert(id, value);
        }
        table
    }
}

/// Change stores indexed by identifier id.
#[derive(Debug, Default)]
pub struct StoreTable {
    stores: IdTable<Box<ChangeStore>>,
}

impl StoreTable {
    /// Sizes one store per declared identifier in `1..=max_var_id` from the
    /// per-id event counts of the structure pass. Ids that were never
    /// declared get no store.
    pub(crate) fn allocate(counts: &IdTable<u64>, widths: &IdTable<u32>, max_var_id: u64) -> StoreTable {
        let stores: IdTable<Box<ChangeStore>> = widths
            .iter()
            .filter(|(id, _)| (1..=max_var_id).contains(id))
            .map(|(id, num_bits)| {
                let capacity = counts.get(id).copied().unwrap_or(0) as usize;
                (id, Box::new(ChangeStore::with_capacity(id, *num_bits, capacity)))
            })
            .collect();

        clilog::debug!(
            "allocated {} change stores for identifiers up to {max_var_id}",
            stores.iter().count()
        );
        StoreTable { stores }
    }

    pub fn get(&self, id: u64) -> Option<&ChangeStore> {
        self.stores.get(id).map(|store| &**store)
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Option<&mut ChangeStore> {
        self.stores.get_mut(id).map(|store| &mut **store)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeStore> + '_ {
        self.stores.iter().map(|(_, store)| &**store)
    }

    pub fn total_changes(&self) -> usize {
        self.iter().map(ChangeStore::len).sum()
    }

    /// Every store must end the value pass exactly full.
    pub(crate) fn verify_filled(&self) -> Result<(), ParseError> {
        match self.iter().find(|store| !store.is_full()) {
            Some(store) => Err(ParseError::ChangeCountMismatch {
                id: store.id,
                capacity: store.capacity,
                seen: store.len(),
            }),
            None => Ok(()),
        }
    }
}

/// Points every vector signal at the store allocated for its id.
pub(crate) struct BindStores<'a> {
    pub(crate) stores: &'a StoreTable,
}

impl VisitorMut for BindStores<'_> {
    fn visit_vector(&mut self, signal: &mut VectorSignal) {
        signal.store = self.stores.get(signal.id).map(ChangeStore::id);
    }
}
