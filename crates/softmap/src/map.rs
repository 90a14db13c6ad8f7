//! SoftMap: concurrent map over reclaimable cells

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::cell::SoftCell;
use crate::config::SoftMapConfig;
use crate::entry::SoftEntry;
use crate::error::Result;
use crate::queue::ReclaimQueue;
use crate::stats::SoftMapStats;

/// Concurrent hash map whose values may be reclaimed while their keys are
/// still mapped.
///
/// Every value lives in a [`SoftCell`]. When a read finds its cell reclaimed,
/// the key is dropped from the table on the spot and counted as a dead read.
/// Once enough dead reads (or pending reclaim notifications) pile up, the read
/// also runs a bounded [`sweep`](SoftMap::sweep) that removes keys whose
/// cells were reported reclaimed but never read again.
///
/// Table operations are atomic per key; bulk operations are not atomic as a
/// whole.
pub struct SoftMap<K, V, S = RandomState> {
    table: DashMap<K, Arc<SoftCell<K, V>>, S>,
    queue: ReclaimQueue<K, V>,
    dead_reads: AtomicUsize,
    clock: AtomicU64,
    sweep_lock: Mutex<()>,
    config: SoftMapConfig,
    stats: SoftMapStats,
}

impl<K, V> SoftMap<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty map with the default configuration
    pub fn new() -> Self {
        Self::build(SoftMapConfig::default(), RandomState::new())
    }

    /// Create an empty map sized for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(SoftMapConfig::with_capacity(capacity), RandomState::new())
    }

    /// Create an empty map from a validated configuration
    pub fn with_config(config: SoftMapConfig) -> Result<Self> {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl<K, V> Default for SoftMap<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> SoftMap<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher + Clone,
{
    /// Create an empty map using `hasher` for the table
    pub fn with_config_and_hasher(config: SoftMapConfig, hasher: S) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, hasher))
    }

    fn build(config: SoftMapConfig, hasher: S) -> Self {
        let capacity = config.table_capacity();
        let table = match config.shard_amount() {
            Some(shards) => {
                DashMap::with_capacity_and_hasher_and_shard_amount(capacity, hasher, shards)
            }
            None => DashMap::with_capacity_and_hasher(capacity, hasher),
        };

        Self {
            table,
            queue: ReclaimQueue::new(),
            dead_reads: AtomicUsize::new(0),
            clock: AtomicU64::new(0),
            sweep_lock: Mutex::new(()),
            config,
            stats: SoftMapStats::new(),
        }
    }

    /// Map `key` to `value`, replacing any previous cell for the key
    pub fn put_soft(&self, key: K, value: V) {
        self.put_soft_shared(key, Arc::new(value));
    }

    /// Map `key` to a value that other owners may share
    pub fn put_soft_shared(&self, key: K, value: Arc<V>) {
        let cell = self.soft_cell(key.clone(), value);
        self.table.insert(key, cell);
        self.stats.record_insert();
    }

    /// Map `key` to `value` without keeping it alive.
    ///
    /// The entry reads as reclaimed once every outside `Arc` is dropped.
    pub fn put_weak(&self, key: K, value: &Arc<V>) {
        let cell = Arc::new(SoftCell::new_weak(key.clone(), value, Some(&self.queue)));
        cell.touch(self.tick());
        self.table.insert(key, cell);
        self.stats.record_insert();
    }

    /// Map `key` to `value` unless it already maps to a live value.
    ///
    /// A key whose cell has been reclaimed but not yet cleaned up counts as
    /// absent. Returns whether the value was inserted.
    pub fn put_soft_if_absent(&self, key: K, value: V) -> bool {
        match self.table.entry(key) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_reclaimed() {
                    return false;
                }
                let cell = self.soft_cell(occupied.key().clone(), Arc::new(value));
                occupied.insert(cell);
            }
            Entry::Vacant(vacant) => {
                let cell = self.soft_cell(vacant.key().clone(), Arc::new(value));
                vacant.insert(cell);
            }
        }
        self.stats.record_insert();
        true
    }

    /// Live value for `key`, inserting the result of `make` if there is none.
    ///
    /// `make` runs before the key's shard is locked, so it may use the map. If
    /// another thread inserts a live value first, that value is returned and
    /// the freshly made one is dropped.
    pub fn get_or_insert_soft_with<F>(&self, key: K, make: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get_soft(&key) {
            return value;
        }

        let made = Arc::new(make());
        match self.table.entry(key) {
            Entry::Occupied(mut occupied) => {
                if let Some(existing) = occupied.get().read() {
                    return existing;
                }
                let cell = self.soft_cell(occupied.key().clone(), Arc::clone(&made));
                occupied.insert(cell);
            }
            Entry::Vacant(vacant) => {
                let cell = self.soft_cell(vacant.key().clone(), Arc::clone(&made));
                vacant.insert(cell);
            }
        }
        self.stats.record_insert();
        made
    }

    /// Map every pair from `entries`; an empty input does nothing
    pub fn put_all_soft<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.put_soft(key, value);
        }
    }

    /// Value for `key`, or `None` if it is unmapped or has been reclaimed.
    ///
    /// Finding a reclaimed value removes the key and may trigger a sweep.
    pub fn get_soft<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(cell) = self.cell(key) else {
            self.stats.record_miss();
            return None;
        };

        match cell.read() {
            Some(value) => {
                cell.touch(self.tick());
                self.stats.record_hit();
                Some(value)
            }
            None => {
                self.remove_dead(key, &cell);
                None
            }
        }
    }

    /// Value for `key`, or `default` if there is no live value
    pub fn get_soft_or_default<Q, D>(&self, key: &Q, default: D) -> Arc<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        D: Into<Arc<V>>,
    {
        self.get_soft(key).unwrap_or_else(|| default.into())
    }

    /// Live values at the time of the call
    pub fn values_soft(&self) -> Vec<Arc<V>> {
        self.table
            .iter()
            .filter_map(|entry| entry.value().read())
            .collect()
    }

    /// One view per mapped key; each view resolves its value on access
    pub fn entries_soft(&self) -> HashSet<SoftEntry<'_, K, V, S>, RandomState> {
        self.table
            .iter()
            .map(|entry| SoftEntry::new(entry.key().clone(), self))
            .collect()
    }

    /// Call `action` with every mapped key and whatever its cell holds now.
    ///
    /// Keys are snapshotted first and `action` runs without any table lock
    /// held, so it may read or write the map.
    pub fn for_each_soft<F>(&self, mut action: F)
    where
        F: FnMut(&K, Option<Arc<V>>),
    {
        for cell in self.cells() {
            action(cell.key(), cell.read());
        }
    }

    /// Unmap `key`, returning its value if it was still live
    pub fn remove<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.remove(key).and_then(|(_, cell)| cell.read())
    }

    /// Reclaim the value behind `key` as a memory reclaimer would.
    ///
    /// The key stays mapped until it is read or swept. Returns `false` if the
    /// key is unmapped or already reclaimed.
    pub fn reclaim<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.cell(key) {
            Some(cell) if cell.reclaim() => {
                self.stats.record_reclaimed(1);
                true
            }
            _ => false,
        }
    }

    /// Drain pending reclaim notifications and unmap the reported keys.
    ///
    /// Drains at most `max(len, sweep_threshold)` notifications. A key is
    /// only removed while it still maps to the reported cell, so entries
    /// rewritten after reclamation survive. Resets the dead-read counter.
    /// Returns the number of keys removed; 0 if another sweep is in progress.
    pub fn sweep(&self) -> usize {
        let Some(_guard) = self.sweep_lock.try_lock() else {
            return 0;
        };

        let budget = self.table.len().max(self.config.sweep_threshold);
        let outcome = self.drain_notifications(budget);
        self.dead_reads.store(0, Ordering::Release);

        match outcome {
            Ok(removed) => {
                self.stats.record_sweep(removed as u64);
                debug!(removed, budget, pending = self.queue.len(), "sweep finished");
                removed
            }
            Err(_) => {
                warn!("sweep aborted by a panic; the failing entry was requeued");
                0
            }
        }
    }

    /// Unmap up to `budget` reported keys. A cell whose removal panics goes
    /// back on the queue before the panic is returned.
    fn drain_notifications(&self, budget: usize) -> std::thread::Result<usize> {
        let mut removed = 0;
        for _ in 0..budget {
            let Some(cell) = self.queue.poll() else {
                break;
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.table
                    .remove_if(cell.key(), |_, mapped| Arc::ptr_eq(mapped, &cell))
                    .is_some()
            }));
            match outcome {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(payload) => {
                    self.queue.push(cell);
                    return Err(payload);
                }
            }
        }
        Ok(removed)
    }

    fn remove_dead<Q>(&self, key: &Q, cell: &Arc<SoftCell<K, V>>)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.remove_if(key, |_, mapped| Arc::ptr_eq(mapped, cell));
        self.stats.record_dead_read();

        let dead_reads = self.dead_reads.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(dead_reads, "removed reclaimed entry");

        let threshold = self.config.sweep_threshold;
        if dead_reads >= threshold || self.queue.len() >= threshold {
            self.sweep();
        }
    }

    /// Check if `key` is mapped, live or not
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains_key(key)
    }

    /// Number of mapped keys, including reclaimed ones not yet cleaned up
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check if no keys are mapped
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Unmap every key and discard pending notifications
    pub fn clear(&self) {
        self.table.clear();
        while self.queue.poll().is_some() {}
        self.dead_reads.store(0, Ordering::Release);
    }

    fn cell<Q>(&self, key: &Q) -> Option<Arc<SoftCell<K, V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn soft_cell(&self, key: K, value: Arc<V>) -> Arc<SoftCell<K, V>> {
        let cell = Arc::new(SoftCell::new_shared(key, value, Some(&self.queue)));
        cell.touch(self.tick());
        cell
    }
}

impl<K, V, S> SoftMap<K, V, S> {
    /// Dead reads since the last sweep
    pub fn dead_reads(&self) -> usize {
        self.dead_reads.load(Ordering::Acquire)
    }

    /// Reclaim notifications waiting for a sweep
    pub fn pending_reclaimed(&self) -> usize {
        self.queue.len()
    }

    /// Get map statistics
    pub fn stats(&self) -> &SoftMapStats {
        &self.stats
    }

    /// Configuration the map was built with
    pub fn config(&self) -> &SoftMapConfig {
        &self.config
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl<K, V, S> SoftMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone,
{
    /// Snapshot of every cell, taken shard by shard
    pub(crate) fn cells(&self) -> Vec<Arc<SoftCell<K, V>>> {
        self.table
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl<K, V, S> fmt::Debug for SoftMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftMap")
            .field("len", &self.table.len())
            .field("pending_reclaimed", &self.queue.len())
            .field("dead_reads", &self.dead_reads())
            .field("sweep_threshold", &self.config.sweep_threshold)
            .finish()
    }
}
