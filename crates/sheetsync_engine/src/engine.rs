//! The three-tier refresh engine.
//!
//! A refresh tries, in order: the durable shared cache, the remote
//! origin, and (after a winning direct fetch) broadcast fan-out to the
//! other processes. Freshness is arbitrated purely by origin-epoch
//! timestamps: whichever payload is newest survives, and every process
//! converges to it without direct coordination.

use crate::broadcast::Broadcast;
use crate::config::SheetConfig;
use crate::error::SyncResult;
use crate::payload::{convert_rows, decode_table};
use crate::source::RemoteSource;
use crate::store::{DurableStore, StoredPayload};
use parking_lot::Mutex;
use sheetsync_table::RecordTable;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Broadcast message instructing receivers to re-read the durable store
/// instead of decoding an inline payload.
pub const REREAD_SENTINEL: &str = "::sheetsync::reread::";

/// Which tier produced the data currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSource {
    /// Read from the durable shared cache.
    DurableCache,
    /// Fetched directly from the remote origin.
    RemoteOrigin,
    /// Fetched from the origin, but a newer stored payload won the
    /// write arbitration and was adopted instead.
    DurableCacheOverride,
    /// Received over the broadcast channel.
    Broadcast,
}

impl fmt::Display for RefreshSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefreshSource::DurableCache => "durable-cache",
            RefreshSource::RemoteOrigin => "remote-origin",
            RefreshSource::DurableCacheOverride => "durable-cache-override",
            RefreshSource::Broadcast => "broadcast",
        };
        f.write_str(name)
    }
}

/// Result of a successful refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// A payload was accepted and applied.
    Applied {
        /// The tier that produced it.
        source: RefreshSource,
        /// Keys whose content actually changed.
        changed: Vec<String>,
    },
    /// The held data is already at least as new as anything available.
    AlreadyCurrent,
}

/// Freshness bookkeeping, one mutual-exclusion domain per manager.
#[derive(Debug, Clone, Copy)]
struct Freshness {
    /// Origin-epoch seconds of the data currently held. Monotonically
    /// non-decreasing.
    last_updated: f64,
    last_source: Option<RefreshSource>,
}

/// Outcome of the durable-cache tier.
enum StoreTier {
    Applied(Vec<String>),
    AlreadyCurrent,
    FallThrough,
}

/// The sync engine: owns freshness state and the service handles.
pub struct SyncEngine<S, D, B> {
    config: SheetConfig,
    source: Arc<S>,
    store: Arc<D>,
    broadcast: Arc<B>,
    table: Arc<RecordTable>,
    freshness: Mutex<Freshness>,
}

impl<S: RemoteSource, D: DurableStore, B: Broadcast> SyncEngine<S, D, B> {
    /// Creates an engine over injected service handles.
    pub fn new(
        config: SheetConfig,
        source: Arc<S>,
        store: Arc<D>,
        broadcast: Arc<B>,
        table: Arc<RecordTable>,
    ) -> Self {
        Self {
            config,
            source,
            store,
            broadcast,
            table,
            freshness: Mutex::new(Freshness {
                last_updated: 0.0,
                last_source: None,
            }),
        }
    }

    /// The record table this engine feeds.
    pub fn table(&self) -> &Arc<RecordTable> {
        &self.table
    }

    /// The engine's configuration.
    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    /// Origin-epoch seconds of the data currently held.
    pub fn last_updated(&self) -> f64 {
        self.freshness.lock().last_updated
    }

    /// The tier that produced the data currently held.
    pub fn last_source(&self) -> Option<RefreshSource> {
        self.freshness.lock().last_source
    }

    /// Performs one refresh: durable cache, then remote origin, then
    /// broadcast fan-out.
    ///
    /// Only a remote fetch failure (or a malformed fetched payload) is
    /// an error; a stale or unreadable cache entry falls through to the
    /// fetch. The periodic loop logs errors and retries next tick.
    pub fn refresh(&self) -> SyncResult<RefreshOutcome> {
        {
            let mut freshness = self.freshness.lock();
            match self.store_tier(&mut freshness) {
                StoreTier::Applied(changed) => {
                    return Ok(RefreshOutcome::Applied {
                        source: RefreshSource::DurableCache,
                        changed,
                    })
                }
                StoreTier::AlreadyCurrent => return Ok(RefreshOutcome::AlreadyCurrent),
                StoreTier::FallThrough => {}
            }
        }

        // The fetch runs unlocked so inbound broadcasts are not blocked
        // behind origin latency.
        let json = self
            .source
            .fetch(&self.config.spread_id, &self.config.sheet_id)?;
        let fetch_time = epoch_seconds();
        let raw = decode_table(&json)?;
        let rows = convert_rows(&raw);

        let mut freshness = self.freshness.lock();
        if fetch_time <= freshness.last_updated {
            // A concurrent entry point already applied newer data.
            return Ok(RefreshOutcome::AlreadyCurrent);
        }

        let changed = self.table.apply_refresh(rows);
        freshness.last_updated = fetch_time;
        freshness.last_source = Some(RefreshSource::RemoteOrigin);

        // Timestamp-wins arbitration against concurrent writers.
        let mine = StoredPayload::new(fetch_time, json.clone());
        let survived = self
            .store
            .read_modify_write(&self.config.store_key, &mut |current| match current {
                Some(stored) if stored.timestamp > fetch_time => stored,
                _ => mine.clone(),
            });

        match survived {
            Ok(stored) if stored.timestamp > fetch_time => {
                // The store held something newer: adopt it and skip fan-out.
                let changed = self.adopt_stored(&mut freshness, &stored);
                return Ok(RefreshOutcome::Applied {
                    source: RefreshSource::DurableCacheOverride,
                    changed,
                });
            }
            Ok(_) => {}
            Err(error) => {
                // Other processes will miss the cache but still hear the
                // broadcast; the next tick retries the write.
                warn!(%error, "durable store write-back failed");
            }
        }

        drop(freshness);
        self.fan_out(&json);

        Ok(RefreshOutcome::Applied {
            source: RefreshSource::RemoteOrigin,
            changed,
        })
    }

    /// Handles one inbound broadcast message.
    ///
    /// Stale and duplicate messages (send time not strictly newer than
    /// the held timestamp) are discarded. The re-read sentinel triggers
    /// the durable-cache tier only; anything else is decoded inline.
    pub fn handle_broadcast(&self, message: &str, sent_at: f64) {
        let mut freshness = self.freshness.lock();
        if sent_at <= freshness.last_updated {
            debug!(sent_at, "discarding stale broadcast");
            return;
        }

        if message == REREAD_SENTINEL {
            match self.store_tier(&mut freshness) {
                StoreTier::Applied(changed) => {
                    debug!(changed = changed.len(), "re-read after sentinel")
                }
                StoreTier::AlreadyCurrent => {}
                StoreTier::FallThrough => debug!("sentinel re-read found nothing fresh"),
            }
            return;
        }

        match decode_table(message) {
            Ok(raw) => {
                let changed = self.table.apply_refresh(convert_rows(&raw));
                freshness.last_updated = sent_at;
                freshness.last_source = Some(RefreshSource::Broadcast);
                debug!(changed = changed.len(), "applied broadcast payload");
            }
            Err(error) => warn!(%error, "undecodable broadcast payload"),
        }
    }

    /// Tier 1: accept the stored payload iff it is strictly newer than
    /// what we hold and younger than the refresh interval.
    fn store_tier(&self, freshness: &mut Freshness) -> StoreTier {
        let payload = match self.store.read(&self.config.store_key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return StoreTier::FallThrough,
            Err(error) => {
                debug!(%error, "durable store unreadable");
                return StoreTier::FallThrough;
            }
        };

        // Staleness is checked first: a payload older than the refresh
        // interval falls through to the origin even when it is our own
        // write, otherwise no process would ever refetch.
        let age = epoch_seconds() - payload.timestamp;
        if age > self.config.refresh_interval.as_secs_f64() {
            debug!(age, "stored payload too old");
            return StoreTier::FallThrough;
        }

        if payload.timestamp <= freshness.last_updated {
            return StoreTier::AlreadyCurrent;
        }

        match decode_table(&payload.json) {
            Ok(raw) => {
                let changed = self.table.apply_refresh(convert_rows(&raw));
                freshness.last_updated = payload.timestamp;
                freshness.last_source = Some(RefreshSource::DurableCache);
                StoreTier::Applied(changed)
            }
            Err(error) => {
                debug!(%error, "stored payload undecodable");
                StoreTier::FallThrough
            }
        }
    }

    /// Applies a stored payload that won the write arbitration.
    fn adopt_stored(&self, freshness: &mut Freshness, stored: &StoredPayload) -> Vec<String> {
        match decode_table(&stored.json) {
            Ok(raw) => {
                let changed = self.table.apply_refresh(convert_rows(&raw));
                freshness.last_updated = stored.timestamp;
                freshness.last_source = Some(RefreshSource::DurableCacheOverride);
                changed
            }
            Err(error) => {
                // Keep our own fetch; the bad payload loses by default
                // next time anyone writes.
                warn!(%error, "winning stored payload undecodable, keeping fetch");
                Vec::new()
            }
        }
    }

    /// Tier 3: publish the payload inline when it fits, otherwise the
    /// re-read sentinel, bounding message size on the channel.
    fn fan_out(&self, json: &str) {
        let message = if json.len() < self.config.max_broadcast_bytes {
            json
        } else {
            debug!(size = json.len(), "payload too large for inline fan-out");
            REREAD_SENTINEL
        };
        if let Err(error) = self.broadcast.publish(&self.config.broadcast_topic, message) {
            warn!(%error, "broadcast publish failed");
        }
    }
}

/// Origin-epoch seconds now.
pub(crate) fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
