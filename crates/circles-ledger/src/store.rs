//! # In-Memory Store
//!
//! Thread-safe, cloneable key-value store backing the ledger.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not
/// `tokio::sync`); the lock is never held across an `.await`.
/// `parking_lot::RwLock` is non-poisonable, so a panicking writer does not
/// leave the store unusable.
#[derive(Debug)]
pub struct Store<K, T> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K, T> Store<K, T>
where
    K: Eq + Hash,
    T: Clone,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: K, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Clone out a record by key.
    pub fn get(&self, id: &K) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// Run `f` against a record under the read lock without cloning it.
    pub fn read<R>(&self, id: &K, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.data.read().get(id).map(f)
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure may inspect the current state, validate preconditions,
    /// mutate, and return `Ok(R)` or `Err(E)`; all of it runs under a single
    /// write lock. Returns `None` if the record doesn't exist.
    pub fn try_update<R, E>(
        &self,
        id: &K,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, T> Default for Store<K, T>
where
    K: Eq + Hash,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
