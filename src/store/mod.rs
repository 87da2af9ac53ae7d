//! Named state slots
//!
//! A registry from search key to the `{search_data, state}` pair of a search.
//! Instances created with the same key share one slot, so a consumer that is
//! torn down and rebuilt finds its previous results again.

use crate::results::{SearchData, SearchState};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::debug;

static GLOBAL_STORE: Lazy<Arc<StateStore>> = Lazy::new(|| Arc::new(StateStore::new()));

/// Data and state of one search key
#[derive(Debug, Default)]
pub struct SearchSlot {
    data: Mutex<SearchData>,
    state: Mutex<SearchState>,
}

impl SearchSlot {
    /// Lock the search data
    pub fn data(&self) -> MutexGuard<'_, SearchData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the request state
    pub fn state(&self) -> MutexGuard<'_, SearchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the search data
    pub fn data_snapshot(&self) -> SearchData {
        self.data().clone()
    }

    /// Copy of the request state
    pub fn state_snapshot(&self) -> SearchState {
        self.state().clone()
    }
}

/// Registry of search slots keyed by search key
#[derive(Debug, Default)]
pub struct StateStore {
    slots: RwLock<HashMap<String, Arc<SearchSlot>>>,
}

impl StateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide store
    pub fn global() -> Arc<StateStore> {
        GLOBAL_STORE.clone()
    }

    /// Get the slot for a key, creating an empty one on first use
    pub fn get_or_create(&self, key: &str) -> Arc<SearchSlot> {
        if let Some(slot) = self.get(key) {
            return slot;
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!("Creating search slot '{}'", key);
                Arc::new(SearchSlot::default())
            })
            .clone()
    }

    /// Get the slot for a key if it exists
    pub fn get(&self, key: &str) -> Option<Arc<SearchSlot>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Release the slot for a key
    pub fn release(&self, key: &str) {
        let removed = self
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if removed.is_some() {
            debug!("Released search slot '{}'", key);
        }
    }

    /// Whether a slot exists for a key
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of live slots
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slots_are_shared_by_key() {
        let store = StateStore::new();
        let first = store.get_or_create("products");
        first.data().data = json!(["a"]);

        let second = store.get_or_create("products");
        assert_eq!(second.data_snapshot().data, json!(["a"]));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_independent_keys() {
        let store = StateStore::new();
        store.get_or_create("a").state().is_loading = true;
        assert!(!store.get_or_create("b").state_snapshot().is_loading);
    }

    #[test]
    fn test_release() {
        let store = StateStore::new();
        store.get_or_create("products");
        store.release("products");
        assert!(!store.contains("products"));
        assert!(store.is_empty());
        assert!(store.get_or_create("products").data_snapshot().data.is_null());
    }
}
