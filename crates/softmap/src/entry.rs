//! Key-only views over map entries

use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use ahash::RandomState;

use crate::map::SoftMap;

/// A mapped key together with the map it came from.
///
/// Only the key is captured. [`value`](SoftEntry::value) goes back through
/// [`SoftMap::get_soft`] on every call, so it reflects the map as it is now,
/// including reclamation and lazy cleanup. Views compare and hash by key.
pub struct SoftEntry<'a, K, V, S = RandomState> {
    key: K,
    map: &'a SoftMap<K, V, S>,
}

impl<'a, K, V, S> SoftEntry<'a, K, V, S> {
    pub(crate) fn new(key: K, map: &'a SoftMap<K, V, S>) -> Self {
        Self { key, map }
    }

    /// The viewed key
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K, V, S> SoftEntry<'_, K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher + Clone,
{
    /// Current value for the key, if still live
    pub fn value(&self) -> Option<Arc<V>> {
        self.map.get_soft(&self.key)
    }
}

impl<K: PartialEq, V, S> PartialEq for SoftEntry<'_, K, V, S> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: Eq, V, S> Eq for SoftEntry<'_, K, V, S> {}

impl<K: Hash, V, S> Hash for SoftEntry<'_, K, V, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<K: fmt::Debug, V, S> fmt::Debug for SoftEntry<'_, K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftEntry").field("key", &self.key).finish()
    }
}
