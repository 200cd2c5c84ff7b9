//! Durable shared store abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// The payload persisted in the durable store.
///
/// `json` is the raw tabular payload exactly as received from the
/// origin; `timestamp` is origin-epoch seconds and arbitrates which of
/// several concurrently observed payloads is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPayload {
    /// Origin-epoch seconds at which the payload was fetched.
    #[serde(rename = "Timestamp")]
    pub timestamp: f64,
    /// The raw tabular JSON, unmodified.
    #[serde(rename = "JSON")]
    pub json: String,
}

impl StoredPayload {
    /// Creates a payload.
    pub fn new(timestamp: f64, json: impl Into<String>) -> Self {
        Self {
            timestamp,
            json: json.into(),
        }
    }
}

/// A shared, persistent key-value store reachable by all processes.
///
/// `read_modify_write` must be atomic with respect to other writers of
/// the same key; the engine relies on it for timestamp-wins arbitration
/// between uncoordinated processes.
pub trait DurableStore: Send + Sync {
    /// Reads the payload stored at `key`, if any.
    fn read(&self, key: &str) -> SyncResult<Option<StoredPayload>>;

    /// Atomically transforms the payload at `key`.
    ///
    /// The closure receives the current payload and returns the payload
    /// to keep. Returns the payload that survived, which is not
    /// necessarily the caller's: a newer concurrent write wins.
    fn read_modify_write(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<StoredPayload>) -> StoredPayload,
    ) -> SyncResult<StoredPayload>;
}

/// An in-memory store for tests; share one instance across managers to
/// model the cross-process cache.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredPayload>>,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a payload directly, bypassing arbitration.
    pub fn seed(&self, key: &str, payload: StoredPayload) {
        self.entries.lock().insert(key.to_string(), payload);
    }

    /// Makes subsequent `read` calls fail. `read_modify_write` still
    /// works, which models a cache whose fast read path is down.
    pub fn set_read_failure(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
    }
}

impl DurableStore for MemoryStore {
    fn read(&self, key: &str) -> SyncResult<Option<StoredPayload>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::Store("mock read failure".into()));
        }
        Ok(self.entries.lock().get(key).cloned())
    }

    fn read_modify_write(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<StoredPayload>) -> StoredPayload,
    ) -> SyncResult<StoredPayload> {
        let mut entries = self.entries.lock();
        let current = entries.get(key).cloned();
        let next = apply(current);
        entries.insert(key.to_string(), next.clone());
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_back_seeded_payload() {
        let store = MemoryStore::new();
        assert!(store.read("k").unwrap().is_none());

        store.seed("k", StoredPayload::new(10.0, "{}"));
        let payload = store.read("k").unwrap().unwrap();
        assert_eq!(payload.timestamp, 10.0);
        assert_eq!(payload.json, "{}");
    }

    #[test]
    fn read_modify_write_keeps_newer() {
        let store = MemoryStore::new();
        store.seed("k", StoredPayload::new(20.0, "newer"));

        // A writer holding an older payload loses the arbitration.
        let result = store
            .read_modify_write("k", &mut |current| {
                let mine = StoredPayload::new(15.0, "older");
                match current {
                    Some(stored) if stored.timestamp > mine.timestamp => stored,
                    _ => mine,
                }
            })
            .unwrap();

        assert_eq!(result.json, "newer");
        assert_eq!(store.read("k").unwrap().unwrap().json, "newer");
    }

    #[test]
    fn read_failure_toggle() {
        let store = MemoryStore::new();
        store.seed("k", StoredPayload::new(1.0, "{}"));
        store.set_read_failure(true);

        assert!(store.read("k").is_err());
        // The atomic path is unaffected.
        assert!(store
            .read_modify_write("k", &mut |c| c.unwrap())
            .is_ok());
    }
}
