//! The consumer-facing sheet manager.
//!
//! A manager owns one engine and one record table, subscribes to the
//! broadcast channel, performs an immediate refresh at construction,
//! and drives periodic refreshes until torn down.

use crate::broadcast::{Broadcast, SubscriptionId};
use crate::config::SheetConfig;
use crate::engine::{RefreshOutcome, RefreshSource, SyncEngine};
use crate::error::SyncResult;
use crate::source::RemoteSource;
use crate::store::DurableStore;
use parking_lot::{Condvar, Mutex, MutexGuard};
use sheetsync_table::{RecordChange, RecordTable, Snapshot, TypedRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Wakes the periodic driver early on teardown.
struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

/// Keeps a typed record table synchronized with one remote sheet.
///
/// Service handles are injected and shared: point several managers at
/// the same store and broadcast bus and they converge without talking
/// to each other directly.
///
/// Teardown is explicit via [`SheetManager::shutdown`] and idempotent;
/// dropping the manager also tears it down.
pub struct SheetManager<S, D, B>
where
    S: RemoteSource + 'static,
    D: DurableStore + 'static,
    B: Broadcast + 'static,
{
    engine: Arc<SyncEngine<S, D, B>>,
    broadcast: Arc<B>,
    subscription: Mutex<Option<SubscriptionId>>,
    stop: Arc<StopSignal>,
    driver: Mutex<Option<JoinHandle<()>>>,
    torn_down: AtomicBool,
}

impl<S, D, B> SheetManager<S, D, B>
where
    S: RemoteSource + 'static,
    D: DurableStore + 'static,
    B: Broadcast + 'static,
{
    /// Creates a manager: subscribes to the broadcast topic, performs
    /// one immediate refresh, and starts the periodic driver.
    ///
    /// Neither a failed subscription nor a failed initial refresh is
    /// fatal; the manager degrades to polling and retries on the next
    /// tick.
    pub fn new(config: SheetConfig, source: Arc<S>, store: Arc<D>, broadcast: Arc<B>) -> Self {
        let table = Arc::new(RecordTable::new());
        let engine = Arc::new(SyncEngine::new(
            config,
            source,
            store,
            Arc::clone(&broadcast),
            table,
        ));

        let subscription = match Self::subscribe_inbound(&engine, &broadcast) {
            Ok(id) => Some(id),
            Err(error) => {
                warn!(%error, "broadcast subscribe failed, running in polling-only mode");
                None
            }
        };

        if let Err(error) = engine.refresh() {
            warn!(%error, "initial refresh failed");
        }

        let stop = Arc::new(StopSignal {
            stopped: Mutex::new(false),
            condvar: Condvar::new(),
        });
        let driver = Self::spawn_driver(Arc::clone(&engine), Arc::clone(&stop));

        Self {
            engine,
            broadcast,
            subscription: Mutex::new(subscription),
            stop,
            driver: Mutex::new(Some(driver)),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Wires inbound broadcast messages into the engine.
    ///
    /// The handler holds a weak reference so a dangling subscription in
    /// the bus cannot keep the engine alive.
    fn subscribe_inbound(
        engine: &Arc<SyncEngine<S, D, B>>,
        broadcast: &Arc<B>,
    ) -> SyncResult<SubscriptionId> {
        let weak: Weak<SyncEngine<S, D, B>> = Arc::downgrade(engine);
        let topic = engine.config().broadcast_topic.clone();
        broadcast.subscribe(
            &topic,
            Box::new(move |message, sent_at| {
                if let Some(engine) = weak.upgrade() {
                    engine.handle_broadcast(message, sent_at);
                }
            }),
        )
    }

    /// Runs the periodic refresh loop until stopped.
    fn spawn_driver(engine: Arc<SyncEngine<S, D, B>>, stop: Arc<StopSignal>) -> JoinHandle<()> {
        std::thread::spawn(move || {
            let interval = engine.config().refresh_interval;
            let mut stopped = stop.stopped.lock();
            loop {
                let result = stop.condvar.wait_for(&mut stopped, interval);
                if *stopped {
                    break;
                }
                if result.timed_out() {
                    // Refresh outside the stop lock so teardown is never
                    // blocked behind origin latency.
                    MutexGuard::unlocked(&mut stopped, || {
                        if let Err(error) = engine.refresh() {
                            debug!(%error, "periodic refresh failed, will retry");
                        }
                    });
                }
            }
        })
    }

    /// Performs an immediate refresh.
    pub fn refresh(&self) -> SyncResult<RefreshOutcome> {
        self.engine.refresh()
    }

    /// Returns the record stored at `key`, or `default` when absent.
    pub fn get_value(&self, key: &str, default: TypedRecord) -> TypedRecord {
        self.engine.table().get(key).unwrap_or(default)
    }

    /// Returns the record stored at `key`, if any.
    pub fn get(&self, key: &str) -> Option<TypedRecord> {
        self.engine.table().get(key)
    }

    /// Returns a snapshot of the full current mapping.
    pub fn values(&self) -> Snapshot {
        self.engine.table().snapshot()
    }

    /// Subscribes to changes for one record key.
    pub fn change_channel(&self, key: &str) -> Receiver<RecordChange> {
        self.engine.table().change_channel(key)
    }

    /// Subscribes to bulk snapshots.
    pub fn subscribe_bulk(&self) -> Receiver<Snapshot> {
        self.engine.table().subscribe_bulk()
    }

    /// Origin-epoch seconds of the data currently held.
    pub fn last_updated(&self) -> f64 {
        self.engine.last_updated()
    }

    /// The tier that produced the data currently held.
    pub fn last_source(&self) -> Option<RefreshSource> {
        self.engine.last_source()
    }

    /// Tears the manager down: stops the periodic driver, unsubscribes
    /// from the broadcast channel, and releases every change channel.
    ///
    /// Exactly-once; subsequent calls are no-ops.
    pub fn shutdown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut stopped = self.stop.stopped.lock();
            *stopped = true;
            self.stop.condvar.notify_all();
        }
        if let Some(handle) = self.driver.lock().take() {
            let _ = handle.join();
        }

        if let Some(id) = self.subscription.lock().take() {
            self.broadcast.unsubscribe(id);
        }
        self.engine.table().clear_subscribers();
    }
}

impl<S, D, B> Drop for SheetManager<S, D, B>
where
    S: RemoteSource + 'static,
    D: DurableStore + 'static,
    B: Broadcast + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::LoopbackBroadcast;
    use crate::source::MockSource;
    use crate::store::MemoryStore;
    use sheetsync_values::TypedValue;
    use std::time::Duration;

    fn sheet_json(value: &str) -> String {
        serde_json::json!({
            "status": "ok",
            "table": {
                "cols": [{"label": "Name"}, {"label": "SomeKey"}],
                "rows": [{"c": [{"v": "Foo"}, {"v": value}]}]
            }
        })
        .to_string()
    }

    fn manager(
        response: &str,
        interval: Duration,
    ) -> SheetManager<MockSource, MemoryStore, LoopbackBroadcast> {
        SheetManager::new(
            SheetConfig::new("doc", "tab").with_refresh_interval(interval),
            Arc::new(MockSource::with_response(response)),
            Arc::new(MemoryStore::new()),
            Arc::new(LoopbackBroadcast::new()),
        )
    }

    #[test]
    fn construction_performs_an_immediate_refresh() {
        let manager = manager(&sheet_json("50"), Duration::from_secs(3600));
        assert_eq!(
            manager
                .get("Foo")
                .unwrap()
                .get("SomeKey"),
            Some(&TypedValue::Number(50.0))
        );
        assert!(manager.last_updated() > 0.0);
        manager.shutdown();
    }

    #[test]
    fn get_value_falls_back_to_default() {
        let manager = manager(&sheet_json("50"), Duration::from_secs(3600));
        let default = TypedRecord::new();
        assert_eq!(manager.get_value("Missing", default.clone()), default);
        manager.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent() {
        let manager = manager(&sheet_json("50"), Duration::from_secs(3600));
        let _rx = manager.change_channel("Foo");

        manager.shutdown();
        manager.shutdown();
        manager.shutdown();
    }

    #[test]
    fn failed_initial_refresh_is_not_fatal() {
        let source = Arc::new(MockSource::new());
        source.set_failing(true);
        let manager = SheetManager::new(
            SheetConfig::new("doc", "tab").with_refresh_interval(Duration::from_secs(3600)),
            source,
            Arc::new(MemoryStore::new()),
            Arc::new(LoopbackBroadcast::new()),
        );

        assert!(manager.values().is_empty());
        assert!(manager.last_source().is_none());
        manager.shutdown();
    }

    #[test]
    fn periodic_driver_keeps_refreshing() {
        let source = Arc::new(MockSource::with_response(sheet_json("50")));
        let manager = SheetManager::new(
            SheetConfig::new("doc", "tab").with_refresh_interval(Duration::from_millis(20)),
            Arc::clone(&source),
            Arc::new(MemoryStore::new()),
            Arc::new(LoopbackBroadcast::new()),
        );

        std::thread::sleep(Duration::from_millis(300));
        manager.shutdown();

        // Construction fetched once; with a 20ms interval and a 0s-fresh
        // window being impossible here, the driver ticked several times.
        // Each tick is at least an already-current store read; after the
        // 20ms interval passes, the stored payload goes stale and the
        // driver fetches again.
        assert!(source.fetch_count() >= 2, "driver never refetched");
    }

    #[test]
    fn shutdown_stops_the_driver() {
        let source = Arc::new(MockSource::with_response(sheet_json("50")));
        let manager = SheetManager::new(
            SheetConfig::new("doc", "tab").with_refresh_interval(Duration::from_millis(10)),
            Arc::clone(&source),
            Arc::new(MemoryStore::new()),
            Arc::new(LoopbackBroadcast::new()),
        );

        manager.shutdown();
        let after_shutdown = source.fetch_count();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(source.fetch_count(), after_shutdown);
    }

    #[test]
    fn drop_tears_down() {
        let bus = Arc::new(LoopbackBroadcast::new());
        {
            let _manager = SheetManager::new(
                SheetConfig::new("doc", "tab").with_refresh_interval(Duration::from_secs(3600)),
                Arc::new(MockSource::with_response(sheet_json("50"))),
                Arc::new(MemoryStore::new()),
                Arc::clone(&bus),
            );
            assert_eq!(bus.subscriber_count(), 1);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }
}
