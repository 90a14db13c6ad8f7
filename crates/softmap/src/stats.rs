//! Map statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how a map's values are being read and reclaimed
#[derive(Debug, Default)]
pub struct SoftMapStats {
    hits: AtomicU64,
    misses: AtomicU64,
    dead_reads: AtomicU64,
    inserts: AtomicU64,
    reclaimed: AtomicU64,
    sweeps: AtomicU64,
    swept: AtomicU64,
}

impl SoftMapStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dead_read(&self) {
        self.dead_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reclaimed(&self, count: u64) {
        self.reclaimed.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_sweep(&self, removed: u64) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.swept.fetch_add(removed, Ordering::Relaxed);
    }

    /// Reads that returned a live value
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Reads of keys that were not mapped
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Reads that found a reclaimed value (lifetime total, never reset by sweeps)
    pub fn dead_reads(&self) -> u64 {
        self.dead_reads.load(Ordering::Relaxed)
    }

    /// Cells inserted
    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Values cleared through [`SoftMap::reclaim`](crate::SoftMap::reclaim) or the reaper
    pub fn reclaimed(&self) -> u64 {
        self.reclaimed.load(Ordering::Relaxed)
    }

    /// Completed sweeps
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    /// Keys removed by sweeps
    pub fn swept(&self) -> u64 {
        self.swept.load(Ordering::Relaxed)
    }

    /// Share of reads that found a live value, dead reads counted as misses
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses() + self.dead_reads();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.dead_reads.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.reclaimed.store(0, Ordering::Relaxed);
        self.sweeps.store(0, Ordering::Relaxed);
        self.swept.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_basic() {
        let stats = SoftMapStats::new();

        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_dead_read();

        assert_eq!(stats.hits(), 2);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.dead_reads(), 1);
        assert_eq!(stats.hit_ratio(), 0.5);
    }

    #[test]
    fn test_stats_sweeps() {
        let stats = SoftMapStats::new();

        stats.record_sweep(3);
        stats.record_sweep(0);

        assert_eq!(stats.sweeps(), 2);
        assert_eq!(stats.swept(), 3);
    }

    #[test]
    fn test_stats_reset() {
        let stats = SoftMapStats::new();

        stats.record_hit();
        stats.record_insert();
        stats.record_reclaimed(4);
        stats.reset();

        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.inserts(), 0);
        assert_eq!(stats.reclaimed(), 0);
        assert_eq!(stats.hit_ratio(), 0.0);
    }
}
