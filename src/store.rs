//! State store abstraction and implementations.
//!
//! The contract core never talks to the host ledger directly; every
//! operation takes a [`StateStore`] handle. `MemoryStore` backs tests,
//! and [`Overlay`] buffers a call's writes so that a failing check
//! anywhere in the call leaves the underlying store untouched.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ContractError;

/// Key-value view of the host ledger state.
///
/// Keys are composite strings built by [`crate::key::composite_key`];
/// values are opaque bytes (JSON documents for every record this
/// contract persists). Range reads are served in ascending key order.
pub trait StateStore {
    /// Get the value stored under a key, if any
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ContractError>;

    /// Store a value under a key, replacing any previous value
    fn put(&self, key: &str, value: &[u8]) -> Result<(), ContractError>;

    /// Remove the value stored under a key, if any
    fn delete(&self, key: &str) -> Result<(), ContractError>;

    /// Get all `(key, value)` pairs whose key starts with `prefix`,
    /// in ascending key order
    fn get_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, ContractError>;
}

/// In-memory state store used for tests and local execution
pub struct MemoryStore {
    state: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>, ContractError> {
        self.state
            .lock()
            .map_err(|e| ContractError::Store(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ContractError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), ContractError> {
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), ContractError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn get_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, ContractError> {
        let state = self.lock()?;
        Ok(state
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

/// Buffered write set over a base store.
///
/// Reads see the overlay's own writes first, then fall through to the
/// base. Nothing reaches the base until [`Overlay::commit`], so a caller
/// can run a multi-step operation and abandon the overlay on any
/// failure.
pub struct Overlay<'a, S: StateStore + ?Sized> {
    base: &'a S,
    writes: RefCell<BTreeMap<String, Option<Vec<u8>>>>,
}

impl<'a, S: StateStore + ?Sized> Overlay<'a, S> {
    pub fn new(base: &'a S) -> Self {
        Self {
            base,
            writes: RefCell::new(BTreeMap::new()),
        }
    }

    /// Apply all buffered writes to the base store
    pub fn commit(self) -> Result<(), ContractError> {
        for (key, value) in self.writes.into_inner() {
            match value {
                Some(bytes) => self.base.put(&key, &bytes)?,
                None => self.base.delete(&key)?,
            }
        }
        Ok(())
    }
}

impl<S: StateStore + ?Sized> StateStore for Overlay<'_, S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ContractError> {
        if let Some(buffered) = self.writes.borrow().get(key) {
            return Ok(buffered.clone());
        }
        self.base.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), ContractError> {
        self.writes
            .borrow_mut()
            .insert(key.to_string(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), ContractError> {
        self.writes.borrow_mut().insert(key.to_string(), None);
        Ok(())
    }

    fn get_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, ContractError> {
        let mut merged: BTreeMap<String, Vec<u8>> =
            self.base.get_by_prefix(prefix)?.into_iter().collect();
        for (key, value) in self.writes.borrow().iter() {
            if !key.starts_with(prefix) {
                continue;
            }
            match value {
                Some(bytes) => {
                    merged.insert(key.clone(), bytes.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

/// Read a JSON record stored under a key
pub fn read_json<T, S>(store: &S, key: &str) -> Result<Option<T>, ContractError>
where
    T: DeserializeOwned,
    S: StateStore + ?Sized,
{
    match store.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Write a record under a key as JSON
pub fn write_json<T, S>(store: &S, key: &str, value: &T) -> Result<(), ContractError>
where
    T: Serialize,
    S: StateStore + ?Sized,
{
    let bytes = serde_json::to_vec(value)?;
    store.put(key, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{category_prefix, composite_key};

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        let key = composite_key("ticket", &["t1"]);

        assert_eq!(store.get(&key).unwrap(), None);
        store.put(&key, b"payload").unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(b"payload".to_vec()));
        store.delete(&key).unwrap();
        assert_eq!(store.get(&key).unwrap(), None);
    }

    #[test]
    fn test_prefix_scan_is_ordered_and_scoped() {
        let store = MemoryStore::new();
        store
            .put(&composite_key("ticket", &["t2"]), b"2")
            .unwrap();
        store
            .put(&composite_key("ticket", &["t1"]), b"1")
            .unwrap();
        store
            .put(&composite_key("order", &["o1"]), b"o")
            .unwrap();

        let tickets = store.get_by_prefix(&category_prefix("ticket")).unwrap();
        assert_eq!(tickets.len(), 2);
        assert!(tickets[0].0 < tickets[1].0);
        assert_eq!(tickets[0].1, b"1");
    }

    #[test]
    fn test_overlay_buffers_until_commit() {
        let store = MemoryStore::new();
        store.put("a", b"old").unwrap();

        let overlay = Overlay::new(&store);
        overlay.put("a", b"new").unwrap();
        overlay.put("b", b"fresh").unwrap();

        // Overlay sees its own writes, base does not
        assert_eq!(overlay.get("a").unwrap(), Some(b"new".to_vec()));
        assert_eq!(store.get("a").unwrap(), Some(b"old".to_vec()));
        assert_eq!(store.get("b").unwrap(), None);

        overlay.commit().unwrap();
        assert_eq!(store.get("a").unwrap(), Some(b"new".to_vec()));
        assert_eq!(store.get("b").unwrap(), Some(b"fresh".to_vec()));
    }

    #[test]
    fn test_abandoned_overlay_leaves_base_untouched() {
        let store = MemoryStore::new();
        store.put("a", b"old").unwrap();
        {
            let overlay = Overlay::new(&store);
            overlay.delete("a").unwrap();
            overlay.put("b", b"x").unwrap();
            assert_eq!(overlay.get("a").unwrap(), None);
            // dropped without commit
        }
        assert_eq!(store.get("a").unwrap(), Some(b"old".to_vec()));
        assert_eq!(store.get("b").unwrap(), None);
    }

    #[test]
    fn test_overlay_prefix_scan_merges_writes() {
        let store = MemoryStore::new();
        store.put("k\u{0}1", b"base1").unwrap();
        store.put("k\u{0}2", b"base2").unwrap();

        let overlay = Overlay::new(&store);
        overlay.put("k\u{0}2", b"new2").unwrap();
        overlay.put("k\u{0}3", b"new3").unwrap();
        overlay.delete("k\u{0}1").unwrap();

        let scanned = overlay.get_by_prefix("k\u{0}").unwrap();
        assert_eq!(
            scanned,
            vec![
                ("k\u{0}2".to_string(), b"new2".to_vec()),
                ("k\u{0}3".to_string(), b"new3".to_vec()),
            ]
        );
    }
}
