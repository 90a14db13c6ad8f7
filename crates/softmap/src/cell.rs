//! Single reclaimable value paired with its key

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::queue::{Notifications, ReclaimQueue};

enum Referent<V> {
    /// Held by the cell until a reclaimer clears it
    Soft(Arc<V>),
    /// Kept alive by other owners only
    Weak(Weak<V>),
    Cleared,
}

/// A key and a value that may disappear.
///
/// A soft cell keeps its value alive until [`reclaim`](SoftCell::reclaim) is
/// called, which is what a reclamation policy such as the
/// [`Reaper`](crate::Reaper) does under memory pressure. A weak cell never
/// keeps its value alive; it reads as reclaimed once the last outside `Arc`
/// is dropped.
///
/// Reclamation is one-way. The key stays readable for as long as the cell
/// exists.
pub struct SoftCell<K, V> {
    key: K,
    referent: RwLock<Referent<V>>,
    last_read: AtomicU64,
    queue: Option<Weak<Notifications<K, V>>>,
}

impl<K, V> SoftCell<K, V> {
    /// Soft cell owning `value`, reporting to `queue` when reclaimed
    pub fn new(key: K, value: V, queue: Option<&ReclaimQueue<K, V>>) -> Self {
        Self::new_shared(key, Arc::new(value), queue)
    }

    /// Soft cell sharing ownership of `value`
    pub fn new_shared(key: K, value: Arc<V>, queue: Option<&ReclaimQueue<K, V>>) -> Self {
        Self::with_referent(key, Referent::Soft(value), queue)
    }

    /// Weak cell tracking `value` without keeping it alive
    pub fn new_weak(key: K, value: &Arc<V>, queue: Option<&ReclaimQueue<K, V>>) -> Self {
        Self::with_referent(key, Referent::Weak(Arc::downgrade(value)), queue)
    }

    fn with_referent(key: K, referent: Referent<V>, queue: Option<&ReclaimQueue<K, V>>) -> Self {
        Self {
            key,
            referent: RwLock::new(referent),
            last_read: AtomicU64::new(0),
            queue: queue.map(ReclaimQueue::downgrade),
        }
    }

    /// The key this cell was created with
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The value, or `None` once it has been reclaimed
    pub fn read(&self) -> Option<Arc<V>> {
        match &*self.referent.read() {
            Referent::Soft(value) => Some(Arc::clone(value)),
            Referent::Weak(value) => value.upgrade(),
            Referent::Cleared => None,
        }
    }

    /// Check if the value is gone
    pub fn is_reclaimed(&self) -> bool {
        match &*self.referent.read() {
            Referent::Soft(_) => false,
            Referent::Weak(value) => value.strong_count() == 0,
            Referent::Cleared => true,
        }
    }

    /// Check if the cell was created without ownership of its value
    pub fn is_weak(&self) -> bool {
        matches!(&*self.referent.read(), Referent::Weak(_))
    }

    /// Check if the cell still owns its value
    pub(crate) fn is_soft(&self) -> bool {
        matches!(&*self.referent.read(), Referent::Soft(_))
    }

    /// Clear the value and report the cell on its queue.
    ///
    /// Returns `false` if the cell was already cleared; a cell is reported
    /// at most once.
    pub fn reclaim(self: &Arc<Self>) -> bool {
        let previous = std::mem::replace(&mut *self.referent.write(), Referent::Cleared);
        if matches!(previous, Referent::Cleared) {
            return false;
        }
        // Value drops here, outside the lock.
        drop(previous);
        self.enqueue();
        true
    }

    /// Report a weak cell whose value no longer has any owner.
    ///
    /// Soft cells and weak cells with a live value are left untouched.
    pub fn collect_if_dead(self: &Arc<Self>) -> bool {
        {
            let mut referent = self.referent.write();
            match &*referent {
                Referent::Weak(value) if value.strong_count() == 0 => {
                    *referent = Referent::Cleared;
                }
                _ => return false,
            }
        }
        self.enqueue();
        true
    }

    pub(crate) fn touch(&self, tick: u64) {
        self.last_read.store(tick, Ordering::Relaxed);
    }

    pub(crate) fn last_read(&self) -> u64 {
        self.last_read.load(Ordering::Relaxed)
    }

    fn enqueue(self: &Arc<Self>) {
        if let Some(queue) = self.queue.as_ref().and_then(Weak::upgrade) {
            queue.push(Arc::clone(self));
        }
    }
}

impl<K: fmt::Debug, V> fmt::Debug for SoftCell<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftCell")
            .field("key", &self.key)
            .field("weak", &self.is_weak())
            .field("reclaimed", &self.is_reclaimed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_live_value() {
        let cell = SoftCell::new("k", 42, None);
        assert_eq!(cell.read().as_deref(), Some(&42));
        assert_eq!(*cell.key(), "k");
        assert!(!cell.is_reclaimed());
        assert!(!cell.is_weak());
    }

    #[test]
    fn test_reclaim_is_terminal() {
        let cell = Arc::new(SoftCell::new("k", String::from("v"), None));

        assert!(cell.reclaim());
        assert!(cell.read().is_none());
        assert!(cell.is_reclaimed());
        assert_eq!(*cell.key(), "k");

        assert!(!cell.reclaim());
        assert!(cell.read().is_none());
    }

    #[test]
    fn test_reclaim_releases_value() {
        let value = Arc::new(5);
        let cell = Arc::new(SoftCell::new_shared(1, Arc::clone(&value), None));
        assert_eq!(Arc::strong_count(&value), 2);

        cell.reclaim();
        assert_eq!(Arc::strong_count(&value), 1);
    }

    #[test]
    fn test_outstanding_reads_survive_reclaim() {
        let cell = Arc::new(SoftCell::new(1, vec![1, 2, 3], None));
        let held = cell.read().unwrap();

        cell.reclaim();
        assert_eq!(*held, vec![1, 2, 3]);
        assert!(cell.read().is_none());
    }

    #[test]
    fn test_weak_cell_follows_owner() {
        let owner = Arc::new("logger");
        let cell = SoftCell::new_weak(1, &owner, None);

        assert!(cell.is_weak());
        assert_eq!(cell.read().as_deref(), Some(&"logger"));

        drop(owner);
        assert!(cell.read().is_none());
        assert!(cell.is_reclaimed());
    }

    #[test]
    fn test_collect_if_dead() {
        let queue = ReclaimQueue::new();
        let owner = Arc::new(3.5f64);
        let cell = Arc::new(SoftCell::new_weak("w", &owner, Some(&queue)));

        assert!(!cell.collect_if_dead());
        assert!(queue.is_empty());

        drop(owner);
        assert!(cell.collect_if_dead());
        assert!(!cell.collect_if_dead());
        assert_eq!(queue.len(), 1);

        let soft = Arc::new(SoftCell::new("s", 1.0f64, Some(&queue)));
        assert!(!soft.collect_if_dead());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_concurrent_read_and_reclaim() {
        let queue = ReclaimQueue::new();
        let cell = Arc::new(SoftCell::new(0u32, 99u32, Some(&queue)));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let cell = Arc::clone(&cell);
                scope.spawn(move || {
                    for _ in 0..1_000 {
                        if let Some(value) = cell.read() {
                            assert_eq!(*value, 99);
                        }
                    }
                });
            }
            for _ in 0..4 {
                let cell = Arc::clone(&cell);
                scope.spawn(move || {
                    cell.reclaim();
                });
            }
        });

        assert!(cell.read().is_none());
        assert_eq!(queue.len(), 1);
    }
}
