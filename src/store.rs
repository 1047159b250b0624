// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Entry store: the authoritative key → entry table.
//!
//! Besides the flat table the store keeps one key index per tier and the
//! running byte totals (all entries, L1 only). Every mutation adjusts the
//! totals in the same call, so `memory_bytes` always equals the sum of
//! `size_bytes` over live entries. Decrements saturate at zero.
//!
//! # Locking
//!
//! `entries`, `l1_keys` and `l2_keys` are separate `DashMap`s. Totals and
//! tier indexes are adjusted while the entry's shard lock is held, so an
//! insert and a removal of the same key cannot interleave their accounting.
//! No method touches `entries` again while holding one of its guards, and
//! callers receive clones, never guards.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};

use crate::entry::{CacheEntry, Tier};

/// Subtract without going below zero, even if another thread got there first.
pub(crate) fn saturating_sub(counter: &AtomicUsize, amount: usize) {
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
        Some(current.saturating_sub(amount))
    });
}

pub struct EntryStore<V> {
    entries: DashMap<String, CacheEntry<V>>,
    l1_keys: DashSet<String>,
    l2_keys: DashSet<String>,
    memory_bytes: AtomicUsize,
    l1_bytes: AtomicUsize,
}

impl<V: Clone> EntryStore<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            l1_keys: DashSet::new(),
            l2_keys: DashSet::new(),
            memory_bytes: AtomicUsize::new(0),
            l1_bytes: AtomicUsize::new(0),
        }
    }

    /// Insert or replace. Returns the previous entry, if any.
    pub fn put(&self, key: String, entry: CacheEntry<V>) -> Option<CacheEntry<V>> {
        let size = entry.size_bytes;
        let tier = entry.tier;

        match self.entries.entry(key) {
            Entry::Occupied(mut slot) => {
                let previous = slot.insert(entry);
                self.unaccount(slot.key(), previous.tier, previous.size_bytes);
                self.account(slot.key().clone(), tier, size);
                Some(previous)
            }
            Entry::Vacant(slot) => {
                self.account(slot.key().clone(), tier, size);
                slot.insert(entry);
                None
            }
        }
    }

    /// Remove and return the entry.
    pub fn take(&self, key: &str) -> Option<CacheEntry<V>> {
        self.take_if(key, |_| true)
    }

    /// Remove and return the entry only if `pred` holds for it at removal time.
    pub fn take_if(&self, key: &str, pred: impl FnOnce(&CacheEntry<V>) -> bool) -> Option<CacheEntry<V>> {
        let Entry::Occupied(slot) = self.entries.entry(key.to_string()) else {
            return None;
        };
        if !pred(slot.get()) {
            return None;
        }
        self.unaccount(key, slot.get().tier, slot.get().size_bytes);
        Some(slot.remove())
    }

    /// Remove the entry. `false` if it was not present.
    pub fn remove(&self, key: &str) -> bool {
        self.take(key).is_some()
    }

    /// Clone of the entry without touching access metadata.
    pub fn peek(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Which tier index currently references the key.
    pub fn tier_of(&self, key: &str) -> Option<Tier> {
        if self.l1_keys.contains(key) {
            Some(Tier::L1)
        } else if self.l2_keys.contains(key) {
            Some(Tier::L2)
        } else {
            None
        }
    }

    /// Read-only view of the entry under its shard lock.
    pub fn with_entry<R>(&self, key: &str, f: impl FnOnce(&CacheEntry<V>) -> R) -> Option<R> {
        self.entries.get(key).map(|e| f(e.value()))
    }

    /// Run `f` on the entry under its shard lock and return its result.
    ///
    /// `f` must not change `size_bytes` or `tier`; use [`retier`](Self::retier).
    pub fn with_entry_mut<R>(&self, key: &str, f: impl FnOnce(&mut CacheEntry<V>) -> R) -> Option<R> {
        self.entries.get_mut(key).map(|mut e| f(e.value_mut()))
    }

    /// Move an entry to `tier`, keeping indexes and totals consistent.
    /// Returns `false` if the key is gone or already in `tier`.
    pub fn retier(&self, key: &str, tier: Tier) -> bool {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return false;
        };
        if entry.tier == tier {
            return false;
        }

        let from = entry.tier;
        let size = entry.size_bytes;
        entry.tier = tier;
        self.index(from).remove(key);
        self.index(tier).insert(key.to_string());
        match (from, tier) {
            (Tier::L2, Tier::L1) => {
                self.l1_bytes.fetch_add(size, Ordering::AcqRel);
            }
            (Tier::L1, Tier::L2) => saturating_sub(&self.l1_bytes, size),
            _ => {}
        }
        true
    }

    /// Visit every entry. The closure sees a shard-locked reference, so it
    /// must not call back into the store.
    pub fn for_each(&self, mut f: impl FnMut(&str, &CacheEntry<V>)) {
        for r in self.entries.iter() {
            f(r.key(), r.value());
        }
    }

    /// Keys whose predicate matches, collected before any mutation.
    pub fn keys_where(&self, mut pred: impl FnMut(&CacheEntry<V>) -> bool) -> Vec<String> {
        self.entries
            .iter()
            .filter(|r| pred(r.value()))
            .map(|r| r.key().clone())
            .collect()
    }

    /// Take every entry present when the call starts, one key at a time.
    /// Counters are only ever adjusted per entry, so a concurrent `put`
    /// keeps both its entry and its bytes.
    pub fn drain(&self) -> Vec<(String, CacheEntry<V>)> {
        let keys: Vec<String> = self.entries.iter().map(|r| r.key().clone()).collect();
        keys.into_iter()
            .filter_map(|key| {
                let entry = self.take(&key)?;
                Some((key, entry))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn memory_bytes(&self) -> usize {
        self.memory_bytes.load(Ordering::Acquire)
    }

    pub fn l1_bytes(&self) -> usize {
        self.l1_bytes.load(Ordering::Acquire)
    }

    pub fn l2_bytes(&self) -> usize {
        self.memory_bytes().saturating_sub(self.l1_bytes())
    }

    pub fn tier_len(&self, tier: Tier) -> usize {
        self.index(tier).len()
    }

    fn index(&self, tier: Tier) -> &DashSet<String> {
        match tier {
            Tier::L1 => &self.l1_keys,
            Tier::L2 => &self.l2_keys,
        }
    }

    fn account(&self, key: String, tier: Tier, size: usize) {
        self.memory_bytes.fetch_add(size, Ordering::AcqRel);
        if tier == Tier::L1 {
            self.l1_bytes.fetch_add(size, Ordering::AcqRel);
        }
        self.index(tier).insert(key);
    }

    fn unaccount(&self, key: &str, tier: Tier, size: usize) {
        saturating_sub(&self.memory_bytes, size);
        if tier == Tier::L1 {
            saturating_sub(&self.l1_bytes, size);
        }
        self.index(tier).remove(key);
    }
}

impl<V: Clone> Default for EntryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
