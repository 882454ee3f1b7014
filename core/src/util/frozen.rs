use std::{cmp::Ordering, ops::Range};

use super::FastHashMap;

/// Immutable sorted table produced from a build-time hash map; lookups are binary
/// searches and entry indices stay stable for the table's lifetime.
#[derive(Debug, Clone)]
pub struct FrozenTable<K, V> {
    entries: Vec<(K, V)>,
}

impl<K: Ord, V> Default for FrozenTable<K, V> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<K: Ord + std::hash::Hash + Eq, V> From<FastHashMap<K, V>> for FrozenTable<K, V> {
    fn from(map: FastHashMap<K, V>) -> Self {
        let mut entries: Vec<(K, V)> = map.into_iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        Self { entries }
    }
}

impl<K: Ord, V> FrozenTable<K, V> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry `order` reports as `Equal`. `order` must be consistent with
    /// the key order.
    pub fn position_by(&self, order: impl Fn(&K) -> Ordering) -> Option<usize> {
        self.entries.binary_search_by(|(k, _)| order(k)).ok()
    }

    pub fn get_by(&self, order: impl Fn(&K) -> Ordering) -> Option<&V> {
        self.position_by(order).map(|i| &self.entries[i].1)
    }

    /// Index range of the contiguous run `order` reports as `Equal`.
    pub fn span_by(&self, order: impl Fn(&K) -> Ordering) -> Range<usize> {
        let start = self.entries.partition_point(|(k, _)| order(k) == Ordering::Less);
        let end = self.entries.partition_point(|(k, _)| order(k) != Ordering::Greater);
        start..end.max(start)
    }

    pub fn entry(&self, index: usize) -> Option<&(K, V)> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(K, V)> {
        self.entries.iter()
    }
}
