//! # SheetSync Table
//!
//! The record table for SheetSync.
//!
//! This crate provides:
//! - [`TypedRecord`] — an immutable snapshot of one sheet row
//! - [`RecordTable`] — the current key-to-record mapping, with merge
//!   semantics and structural change detection
//! - Per-key and bulk change feeds ([`RecordChange`], [`Snapshot`])
//!
//! ## Merge semantics
//!
//! [`RecordTable::apply_refresh`] merges rather than replaces: a key that
//! is absent from a refresh keeps its last known record. Only rows whose
//! content actually differs (per structural equality) are stored and
//! notified.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod record;
mod table;

pub use change_feed::{ChangeFeed, RecordChange, Snapshot};
pub use record::{derive_key, TypedRecord};
pub use table::RecordTable;
