//! Typed records and their keys.

use sheetsync_values::TypedValue;
use std::collections::BTreeMap;

/// One sheet row as a mapping from column label to typed value.
///
/// Records are immutable snapshots: a changed row produces a new record
/// that replaces the old one in the table, never an in-place mutation.
pub type TypedRecord = BTreeMap<String, TypedValue>;

/// Derives the table key for a record.
///
/// The key is the rendered value of a `Name` (or `name`) column when one
/// is present; otherwise the 1-based row number. Returns `None` when the
/// name column exists but renders empty, in which case the row is skipped.
pub fn derive_key(record: &TypedRecord, row_index: usize) -> Option<String> {
    let named = record.get("Name").or_else(|| record.get("name"));
    match named {
        Some(value) => {
            let key = value.to_string();
            if key.is_empty() {
                None
            } else {
                Some(key)
            }
        }
        None => Some((row_index + 1).to_string()),
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

    #[test]
    fn name_column_wins() {
        let rec = record(&[
            ("Name", TypedValue::String("Foo".into())),
            ("SomeKey", TypedValue::Number(50.0)),
        ]);
        assert_eq!(derive_key(&rec, 7), Some("Foo".to_string()));
    }

    #[test]
    fn lowercase_name_accepted() {
        let rec = record(&[("name", TypedValue::String("bar".into()))]);
        assert_eq!(derive_key(&rec, 0), Some("bar".to_string()));
    }

    #[test]
    fn numeric_name_renders() {
        let rec = record(&[("Name", TypedValue::Number(42.0))]);
        assert_eq!(derive_key(&rec, 0), Some("42".to_string()));
    }

    #[test]
    fn row_index_fallback_is_one_based() {
        let rec = record(&[("SomeKey", TypedValue::Number(1.0))]);
        assert_eq!(derive_key(&rec, 0), Some("1".to_string()));
        assert_eq!(derive_key(&rec, 4), Some("5".to_string()));
    }

    #[test]
    fn empty_name_skips_row() {
        let rec = record(&[("Name", TypedValue::String("".into()))]);
        assert_eq!(derive_key(&rec, 0), None);
    }
}
