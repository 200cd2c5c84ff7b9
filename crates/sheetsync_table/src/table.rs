//! The record table: current values plus change detection.

use crate::change_feed::{ChangeFeed, RecordChange, Snapshot};
use crate::record::TypedRecord;
use parking_lot::RwLock;
use sheetsync_values::{maps_equal, TypedValue};
use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use tracing::debug;

/// The current mapping from record key to typed record.
///
/// Applying a refresh merges: keys absent from the refresh keep their
/// last known record. Only rows whose content differs structurally from
/// the stored record are replaced and notified.
pub struct RecordTable {
    values: RwLock<BTreeMap<String, TypedRecord>>,
    feed: ChangeFeed,
}

impl RecordTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            feed: ChangeFeed::new(),
        }
    }

    /// Applies one refresh worth of keyed records.
    ///
    /// Returns the keys whose content actually changed. Per-key
    /// notifications fire for each changed key; one bulk snapshot fires
    /// afterwards iff the changed set is non-empty.
    pub fn apply_refresh(&self, rows: Vec<(String, TypedRecord)>) -> Vec<String> {
        let mut changed = Vec::new();

        {
            let mut values = self.values.write();
            for (key, record) in rows {
                let previous = values.get(&key);
                let unchanged = previous.is_some_and(|old| maps_equal(old, &record));
                if unchanged {
                    continue;
                }

                let old = values.insert(key.clone(), record.clone());
                self.feed.emit_key(RecordChange {
                    key: key.clone(),
                    new: record,
                    old,
                });
                changed.push(key);
            }
        }

        if !changed.is_empty() {
            debug!(changed = changed.len(), "record table updated");
            self.feed.emit_bulk(self.snapshot());
        }

        changed
    }

    /// Returns the record stored at `key`, if any.
    pub fn get(&self, key: &str) -> Option<TypedRecord> {
        self.values.read().get(key).cloned()
    }

    /// Returns one value from the record at `key`, or `default` when the
    /// record or the column is absent.
    pub fn get_value(&self, key: &str, column: &str, default: TypedValue) -> TypedValue {
        self.values
            .read()
            .get(key)
            .and_then(|record| record.get(column).cloned())
            .unwrap_or(default)
    }

    /// Returns a cloned snapshot of the full mapping.
    pub fn snapshot(&self) -> Snapshot {
        self.values.read().clone()
    }

    /// Returns the number of records held.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns true when no records are held.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Subscribes to changes for one record key.
    pub fn change_channel(&self, key: &str) -> Receiver<RecordChange> {
        self.feed.subscribe_key(key)
    }

    /// Subscribes to bulk snapshots.
    pub fn subscribe_bulk(&self) -> Receiver<Snapshot> {
        self.feed.subscribe_bulk()
    }

    /// Drops all subscribers. Used by teardown.
    pub fn clear_subscribers(&self) {
        self.feed.clear();
    }
}

impl Default for RecordTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, TypedValue)]) -> TypedRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn keyed(key: &str, value: f64) -> (String, TypedRecord) {
        (
            key.to_string(),
            record(&[("SomeKey", TypedValue::Number(value))]),
        )
    }

    #[test]
    fn first_refresh_changes_every_key() {
        let table = RecordTable::new();
        let changed = table.apply_refresh(vec![keyed("Foo", 50.0), keyed("Bar", 1.0)]);
        assert_eq!(changed.len(), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn identical_refresh_changes_nothing() {
        let table = RecordTable::new();
        table.apply_refresh(vec![keyed("Foo", 50.0)]);

        let bulk = table.subscribe_bulk();
        let key_rx = table.change_channel("Foo");

        let changed = table.apply_refresh(vec![keyed("Foo", 50.0)]);
        assert!(changed.is_empty());
        assert!(key_rx.try_recv().is_err());
        assert!(bulk.try_recv().is_err());
    }

    #[test]
    fn changed_value_notifies_with_new_and_old() {
        let table = RecordTable::new();
        table.apply_refresh(vec![keyed("Foo", 50.0)]);

        let rx = table.change_channel("Foo");
        let bulk = table.subscribe_bulk();

        let changed = table.apply_refresh(vec![keyed("Foo", 51.0)]);
        assert_eq!(changed, vec!["Foo".to_string()]);

        let change = rx.try_recv().unwrap();
        assert_eq!(
            change.new.get("SomeKey"),
            Some(&TypedValue::Number(51.0))
        );
        assert_eq!(
            change.old.unwrap().get("SomeKey"),
            Some(&TypedValue::Number(50.0))
        );

        let snapshot = bulk.try_recv().unwrap();
        assert_eq!(
            snapshot.get("Foo").unwrap().get("SomeKey"),
            Some(&TypedValue::Number(51.0))
        );
    }

    #[test]
    fn refresh_merges_rather_than_replaces() {
        let table = RecordTable::new();
        table.apply_refresh(vec![keyed("Foo", 50.0), keyed("Bar", 1.0)]);

        // Bar disappears from the next refresh but is retained.
        table.apply_refresh(vec![keyed("Foo", 51.0)]);
        assert_eq!(table.len(), 2);
        assert!(table.get("Bar").is_some());
    }

    #[test]
    fn get_value_with_default() {
        let table = RecordTable::new();
        table.apply_refresh(vec![keyed("Foo", 50.0)]);

        assert_eq!(
            table.get_value("Foo", "SomeKey", TypedValue::Number(0.0)),
            TypedValue::Number(50.0)
        );
        assert_eq!(
            table.get_value("Foo", "Missing", TypedValue::Bool(false)),
            TypedValue::Bool(false)
        );
        assert_eq!(
            table.get_value("Nope", "SomeKey", TypedValue::Number(-1.0)),
            TypedValue::Number(-1.0)
        );
    }

    #[test]
    fn new_record_change_has_no_old() {
        let table = RecordTable::new();
        let rx = table.change_channel("Foo");

        table.apply_refresh(vec![keyed("Foo", 50.0)]);
        let change = rx.try_recv().unwrap();
        assert!(change.old.is_none());
    }

    #[test]
    fn column_set_change_is_a_change() {
        let table = RecordTable::new();
        table.apply_refresh(vec![keyed("Foo", 50.0)]);

        let with_extra = record(&[
            ("SomeKey", TypedValue::Number(50.0)),
            ("Extra", TypedValue::Bool(true)),
        ]);
        let changed = table.apply_refresh(vec![("Foo".to_string(), with_extra)]);
        assert_eq!(changed, vec!["Foo".to_string()]);
    }
}
