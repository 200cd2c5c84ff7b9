//! # SheetSync Engine
//!
//! Multi-tier refresh engine for SheetSync.
//!
//! This crate provides:
//! - The three-tier refresh protocol (durable cache → remote origin →
//!   broadcast fan-out) with timestamp-wins arbitration
//! - Abstract service traits: [`RemoteSource`], [`DurableStore`],
//!   [`Broadcast`]
//! - Tabular payload decoding and row conversion
//! - The consumer-facing [`SheetManager`] with periodic refresh and
//!   explicit teardown
//!
//! ## Architecture
//!
//! Many independent processes each run a [`SheetManager`] over the same
//! sheet. They never coordinate directly: the durable store absorbs
//! redundant origin fetches, a `read_modify_write` timestamp arbitration
//! makes concurrent write-backs safe, and the broadcast channel pushes a
//! winning fetch to everyone else. A payload too large for the channel
//! is replaced by a re-read sentinel so message size stays bounded.
//!
//! ## Key invariants
//!
//! - The held timestamp is monotonically non-decreasing
//! - A payload no newer than the held timestamp is never applied
//! - Refreshes merge; a key absent from a refresh keeps its last value
//! - No refresh error is fatal to a manager

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod broadcast;
mod config;
mod engine;
mod error;
mod manager;
mod payload;
mod source;
mod store;

pub use broadcast::{Broadcast, LoopbackBroadcast, MessageHandler, SubscriptionId};
pub use config::SheetConfig;
pub use engine::{RefreshOutcome, RefreshSource, SyncEngine, REREAD_SENTINEL};
pub use error::{SyncError, SyncResult};
pub use manager::SheetManager;
pub use payload::{convert_rows, decode_table, RawTable};
pub use source::{MockSource, RemoteSource};
pub use store::{DurableStore, MemoryStore, StoredPayload};
