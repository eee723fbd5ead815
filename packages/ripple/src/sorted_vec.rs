//! Small ordered collections backed onto sorted vectors.
//!
//! These keep iteration order deterministic (by key), which the reactive
//! layer relies upon when it fans batches out to systems.

use std::ops::Deref;

/// A set implemented on top of a sorted vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VecSet<T> {
    inner: Vec<T>,
}

impl<T: Ord> VecSet<T> {
    /// Create a new `VecSet` with empty storage.
    pub fn new() -> VecSet<T> {
        VecSet {
            inner: Vec::new(),
        }
    }

    /// Create a new `VecSet` from an existing vector.
    ///
    /// The vector will be sorted and deduplicated.
    pub fn from_inner(mut inner: Vec<T>) -> VecSet<T> {
        inner.sort();
        inner.dedup();

        VecSet {
            inner,
        }
    }

    /// Returns true if this set contains the referenced value.
    pub fn has(&self, value: &T) -> bool {
        self.inner.binary_search(value).is_ok()
    }

    /// Insert an item into the set.
    ///
    /// Returns `true` if the item was a new addition.
    pub fn insert(&mut self, value: T) -> bool {
        match self.inner.binary_search(&value) {
            Ok(_) => false,
            Err(insert_idx) => {
                self.inner.insert(insert_idx, value);
                true
            }
        }
    }

    /// Remove an item from the set.
    ///
    /// Returns true if the item was removed.
    pub fn remove(&mut self, value: &T) -> bool {
        match self.inner.binary_search(value) {
            Ok(idx) => {
                self.inner.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Remove every item from the set.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Take the contents of the set, leaving it empty.
    pub fn take(&mut self) -> Vec<T> {
        std::mem::take(&mut self.inner)
    }
}

impl<T: Ord> Default for VecSet<T> {
    fn default() -> Self {
        VecSet::new()
    }
}

impl<T> Deref for VecSet<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.inner
    }
}

/// A map backed onto a sorted vector.
#[derive(Debug, Clone)]
pub struct VecMap<K, V> {
    inner: Vec<(K, V)>,
}

impl<K: Ord, V> VecMap<K, V> {
    /// Create a new `VecMap` with empty storage.
    pub fn new() -> VecMap<K, V> {
        VecMap {
            inner: Vec::new(),
        }
    }

    /// Binary search the collection for the given key.
    pub fn binary_search(&self, key: &K) -> Result<usize, usize> {
        self.inner.binary_search_by(|(k, _)| k.cmp(key))
    }

    /// Returns true if the given key exists in this collection.
    pub fn has_key(&self, key: &K) -> bool {
        self.binary_search(key).is_ok()
    }

    /// Fetch the value stored under a key.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.binary_search(key).ok().map(|idx| &self.inner[idx].1)
    }

    /// Fetch a mutable reference to the value stored under a key.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.binary_search(key) {
            Ok(idx) => Some(&mut self.inner[idx].1),
            Err(_) => None,
        }
    }

    /// Insert an item into the map, returning the previous value if the key
    /// was already present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.binary_search(&key) {
            Ok(existing_idx) => Some(std::mem::replace(&mut self.inner[existing_idx].1, value)),
            Err(insert_idx) => {
                self.inner.insert(insert_idx, (key, value));
                None
            }
        }
    }

    /// Remove an item from the map, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        match self.binary_search(key) {
            Ok(index) => Some(self.inner.remove(index).1),
            Err(_) => None,
        }
    }

    /// Iterate over the keys of this map in order.
    pub fn keys(&self) -> impl Iterator<Item=&K> + '_ {
        self.inner.iter().map(|(k, _)| k)
    }

    /// Iterate mutably over the entries of this map in key order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item=(&K, &mut V)> + '_ {
        self.inner.iter_mut().map(|(k, v)| (&*k, v))
    }

    /// Iterate over the values of this map in key order.
    pub fn values(&self) -> impl Iterator<Item=&V> + '_ {
        self.inner.iter().map(|(_, v)| v)
    }
}

impl<K: Ord, V> Default for VecMap<K, V> {
    fn default() -> Self {
        VecMap::new()
    }
}

impl<K, V> Deref for VecMap<K, V> {
    type Target = [(K, V)];

    fn deref(&self) -> &[(K, V)] {
        &self.inner
    }
}
