use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;

/// Thread-safe append-ordered sequence.
///
/// Readers proceed concurrently; a writer holds exclusive access for the
/// duration of its mutation. A panic inside a critical section leaves the
/// lock usable for later callers instead of propagating, so an operation
/// racing owner teardown degrades to an empty/default answer.
#[derive(Debug, Default)]
pub struct SharedList<T> {
    inner: RwLock<Vec<T>>,
}

impl<T> SharedList<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn push(&self, value: T) {
        self.write().push(value);
    }

    pub fn insert(&self, index: usize, value: T) {
        let mut guard = self.write();
        let index = index.min(guard.len());
        guard.insert(index, value);
    }

    pub fn remove_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut guard = self.write();
        let before = guard.len();
        guard.retain(|item| !predicate(item));
        before - guard.len()
    }

    /// Removes every element, returning them in order.
    pub fn drain_all(&self) -> Vec<T> {
        std::mem::take(&mut *self.write())
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}

impl<T: Clone> SharedList<T> {
    pub fn first(&self) -> Option<T> {
        self.read().first().cloned()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.read().get(index).cloned()
    }

    /// Ordered point-in-time snapshot of the contents.
    pub fn snapshot(&self) -> Vec<T> {
        self.read().clone()
    }

    pub fn filter<F>(&self, mut predicate: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.read()
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }
}

impl<T: PartialEq> SharedList<T> {
    pub fn contains(&self, value: &T) -> bool {
        self.read().contains(value)
    }
}

/// Thread-safe set with the same locking discipline as [`SharedList`].
#[derive(Debug, Default)]
pub struct SharedSet<T> {
    inner: RwLock<HashSet<T>>,
}

impl<T: Eq + Hash> SharedSet<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashSet::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashSet<T>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<T>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.read().contains(value)
    }

    /// Returns `true` when the value was not already present.
    pub fn insert(&self, value: T) -> bool {
        self.write().insert(value)
    }

    pub fn remove(&self, value: &T) -> bool {
        self.write().remove(value)
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}

impl<T: Eq + Hash + Clone> SharedSet<T> {
    pub fn snapshot(&self) -> Vec<T> {
        self.read().iter().cloned().collect()
    }
}

/// Thread-safe mapping backed by a sharded concurrent map, so readers of
/// distinct keys do not contend with each other.
#[derive(Debug, Default)]
pub struct SharedMap<K: Eq + Hash, V> {
    inner: DashMap<K, V>,
}

impl<K: Eq + Hash, V> SharedMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.remove(key).map(|(_, value)| value)
    }

    /// Inserts or replaces in one exclusive critical section per shard.
    pub fn upsert<F>(&self, key: K, default: V, mut update: F)
    where
        F: FnMut(&mut V),
    {
        self.inner
            .entry(key)
            .and_modify(|value| update(value))
            .or_insert(default);
    }

    pub fn retain<F>(&self, mut predicate: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.inner.retain(|key, value| predicate(key, value));
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl<K: Eq + Hash, V: Clone> SharedMap<K, V> {
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    pub fn read_with<F, R>(&self, key: &K, reader: F) -> Option<R>
    where
        F: FnOnce(&V) -> R,
    {
        self.inner.get(key).map(|entry| reader(entry.value()))
    }
}

impl<K: Eq + Hash + Clone, V> SharedMap<K, V> {
    pub fn keys(&self) -> Vec<K> {
        self.inner.iter().map(|entry| entry.key().clone()).collect()
    }
}
