//! Reclamation notifications
//!
//! Cells push themselves here when their value is reclaimed. Any number of
//! reclaimers may push concurrently; the owning map drains it during sweeps.

use std::fmt;
use std::sync::{Arc, Weak};

use crossbeam::queue::SegQueue;

use crate::cell::SoftCell;

pub(crate) type Notifications<K, V> = SegQueue<Arc<SoftCell<K, V>>>;

/// Lock-free queue of cells whose values have been reclaimed.
///
/// Cloning yields another handle to the same queue. Cells only hold a weak
/// handle, so dropping every `ReclaimQueue` handle frees pending
/// notifications even if cells outlive it.
pub struct ReclaimQueue<K, V> {
    inner: Arc<Notifications<K, V>>,
}

impl<K, V> ReclaimQueue<K, V> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SegQueue::new()),
        }
    }

    /// Next reclaimed cell, if any. Never blocks.
    pub fn poll(&self) -> Option<Arc<SoftCell<K, V>>> {
        self.inner.pop()
    }

    /// Number of notifications waiting to be drained
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if no notifications are waiting
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub(crate) fn push(&self, cell: Arc<SoftCell<K, V>>) {
        self.inner.push(cell);
    }

    pub(crate) fn downgrade(&self) -> Weak<Notifications<K, V>> {
        Arc::downgrade(&self.inner)
    }
}

impl<K, V> Clone for ReclaimQueue<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for ReclaimQueue<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for ReclaimQueue<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReclaimQueue")
            .field("pending", &self.len())
            .finish()
    }
}
