//! Decoding the origin's tabular payload and converting rows into
//! typed records.

use crate::error::{SyncError, SyncResult};
use serde::Deserialize;
use sheetsync_table::{derive_key, TypedRecord};
use sheetsync_values::coerce;
use tracing::warn;

/// The decoded origin response, transient: discarded after conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Ordered column labels.
    pub labels: Vec<String>,
    /// Ordered rows of raw cell strings. `None` marks an absent cell.
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Deserialize)]
struct SheetResponse {
    #[serde(default)]
    status: Option<String>,
    table: SheetTable,
}

#[derive(Debug, Deserialize)]
struct SheetTable {
    cols: Vec<SheetColumn>,
    rows: Vec<SheetRow>,
}

#[derive(Debug, Deserialize)]
struct SheetColumn {
    #[serde(default)]
    label: String,
}

#[derive(Debug, Deserialize)]
struct SheetRow {
    #[serde(default)]
    c: Vec<Option<SheetCell>>,
}

#[derive(Debug, Deserialize)]
struct SheetCell {
    #[serde(default)]
    v: Option<serde_json::Value>,
}

/// Decodes the origin's response shape
/// `{status, table: {cols: [{label}], rows: [{c: [{v}]}]}}`.
///
/// A `status` other than `"ok"` is an origin error.
pub fn decode_table(json: &str) -> SyncResult<RawTable> {
    let response: SheetResponse = serde_json::from_str(json)?;

    if let Some(status) = response.status {
        if status != "ok" {
            return Err(SyncError::Origin { status });
        }
    }

    let labels = response
        .table
        .cols
        .into_iter()
        .map(|col| col.label)
        .collect();

    let rows = response
        .table
        .rows
        .into_iter()
        .map(|row| {
            row.c
                .into_iter()
                .map(|cell| cell.and_then(|c| c.v).and_then(render_cell))
                .collect()
        })
        .collect();

    Ok(RawTable { labels, rows })
}

/// Renders a JSON cell value to the raw string coercion expects.
fn render_cell(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Converts a raw table into keyed typed records.
///
/// Cells are coerced one at a time; a malformed explicit constructor
/// fails only that cell, never the row or the refresh. Rows whose
/// derived key is empty are skipped.
pub fn convert_rows(table: &RawTable) -> Vec<(String, TypedRecord)> {
    let mut records = Vec::with_capacity(table.rows.len());

    for (row_index, row) in table.rows.iter().enumerate() {
        let mut record = TypedRecord::new();
        for (label, cell) in table.labels.iter().zip(row) {
            let Some(raw) = cell else { continue };
            if label.is_empty() {
                continue;
            }
            match coerce(raw) {
                Ok(value) => {
                    record.insert(label.clone(), value);
                }
                Err(error) => {
                    warn!(row = row_index + 1, column = %label, %error, "skipping cell");
                }
            }
        }

        match derive_key(&record, row_index) {
            Some(key) => records.push((key, record)),
            None => warn!(row = row_index + 1, "skipping row with empty key"),
        }
    }

    records
}
