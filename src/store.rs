//! In-memory entity store shared by all three workflows.
//!
//! A store maps opaque string IDs to mutable records. Mutations run under
//! the store lock via [`EntityStore::with_entry`], and the lock is never
//! held across an await point; iteration works on snapshots, so a sweep
//! never observes a half-applied mutation.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct EntityStore<V> {
    inner: Mutex<HashMap<String, V>>,
}

impl<V: Clone> EntityStore<V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, id: impl Into<String>, value: V) {
        self.lock().insert(id.into(), value);
    }

    pub fn get(&self, id: &str) -> Option<V> {
        self.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn remove(&self, id: &str) -> Option<V> {
        self.lock().remove(id)
    }

    /// Run a closure against one entry under the lock. The entire closure
    /// is one critical section, which is what makes a ballot's four
    /// structure updates atomic with respect to other events.
    pub fn with_entry<R>(&self, id: &str, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.lock().get_mut(id).map(f)
    }

    /// Cloned view of all entries at one instant.
    pub fn snapshot(&self) -> Vec<(String, V)> {
        self.lock()
            .iter()
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, V>> {
        self.inner.lock().expect("entity store lock poisoned")
    }
}
