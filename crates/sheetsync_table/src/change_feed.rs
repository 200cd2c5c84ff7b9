//! Change feeds for record updates.
//!
//! The table distributes two kinds of notifications:
//! - per-key: `(new, old)` whenever one record's content changes
//! - bulk: the full current snapshot after any refresh that changed
//!   at least one key
//!
//! Subscriber lists are created lazily on first subscribe and pruned
//! when a receiver disconnects.

use crate::record::TypedRecord;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc::{self, Receiver, Sender};

/// The full current key-to-record mapping, delivered to bulk subscribers.
pub type Snapshot = BTreeMap<String, TypedRecord>;

/// A change to a single record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordChange {
    /// The record key that changed.
    pub key: String,
    /// The record after the change.
    pub new: TypedRecord,
    /// The record before the change. `None` for a first appearance.
    pub old: Option<TypedRecord>,
}

/// Distributes record changes to per-key and bulk subscribers.
pub struct ChangeFeed {
    per_key: RwLock<HashMap<String, Vec<Sender<RecordChange>>>>,
    bulk: RwLock<Vec<Sender<Snapshot>>>,
}

impl ChangeFeed {
    /// Creates an empty change feed.
    pub fn new() -> Self {
        Self {
            per_key: RwLock::new(HashMap::new()),
            bulk: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to changes for one record key.
    ///
    /// The subscriber list for the key is created on first use.
    pub fn subscribe_key(&self, key: &str) -> Receiver<RecordChange> {
        let (tx, rx) = mpsc::channel();
        self.per_key
            .write()
            .entry(key.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Subscribes to bulk snapshots.
    pub fn subscribe_bulk(&self) -> Receiver<Snapshot> {
        let (tx, rx) = mpsc::channel();
        self.bulk.write().push(tx);
        rx
    }

    /// Emits a per-key change to that key's subscribers, if any.
    ///
    /// Disconnected subscribers are pruned.
    pub fn emit_key(&self, change: RecordChange) {
        let mut per_key = self.per_key.write();
        if let Some(subscribers) = per_key.get_mut(&change.key) {
            subscribers.retain(|tx| tx.send(change.clone()).is_ok());
        }
    }

    /// Emits the full snapshot to bulk subscribers.
    pub fn emit_bulk(&self, snapshot: Snapshot) {
        let mut bulk = self.bulk.write();
        bulk.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }

    /// Returns the number of per-key subscriber lists.
    pub fn key_count(&self) -> usize {
        self.per_key.read().len()
    }

    /// Returns the number of bulk subscribers.
    pub fn bulk_count(&self) -> usize {
        self.bulk.read().len()
    }

    /// Drops every subscriber. Used by teardown.
    pub fn clear(&self) {
        self.per_key.write().clear();
        self.bulk.write().clear();
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetsync_values::TypedValue;
    use std::time::Duration;

    fn record(value: f64) -> TypedRecord {
        let mut map = TypedRecord::new();
        map.insert("SomeKey".to_string(), TypedValue::Number(value));
        map
    }

    #[test]
    fn emit_and_receive_per_key() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe_key("Foo");

        let change = RecordChange {
            key: "Foo".to_string(),
            new: record(51.0),
            old: Some(record(50.0)),
        };
        feed.emit_key(change.clone());

        let received = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received, change);
    }

    #[test]
    fn other_keys_not_notified() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe_key("Bar");

        feed.emit_key(RecordChange {
            key: "Foo".to_string(),
            new: record(1.0),
            old: None,
        });

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn lazy_subscriber_lists() {
        let feed = ChangeFeed::new();
        assert_eq!(feed.key_count(), 0);

        let _rx = feed.subscribe_key("Foo");
        assert_eq!(feed.key_count(), 1);

        // Emitting for an unsubscribed key creates nothing.
        feed.emit_key(RecordChange {
            key: "Bar".to_string(),
            new: record(1.0),
            old: None,
        });
        assert_eq!(feed.key_count(), 1);
    }

    #[test]
    fn disconnected_subscribers_pruned() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe_bulk();
        assert_eq!(feed.bulk_count(), 1);

        drop(rx);
        feed.emit_bulk(Snapshot::new());
        assert_eq!(feed.bulk_count(), 0);
    }

    #[test]
    fn clear_releases_everything() {
        let feed = ChangeFeed::new();
        let _a = feed.subscribe_key("Foo");
        let _b = feed.subscribe_bulk();

        feed.clear();
        assert_eq!(feed.key_count(), 0);
        assert_eq!(feed.bulk_count(), 0);
    }
}
