//! Broadcast channel abstraction.

use crate::error::SyncResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Handler invoked for each inbound message with its send time
/// (origin-epoch seconds).
pub type MessageHandler = Box<dyn Fn(&str, f64) + Send + Sync>;

/// Identifies one subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A best-effort publish/subscribe transport connecting all processes
/// of a deployment. Delivery is not guaranteed and messages are
/// size-limited; the engine publishes a re-read sentinel instead of
/// oversized payloads.
pub trait Broadcast: Send + Sync {
    /// Publishes a message to a topic.
    fn publish(&self, topic: &str, message: &str) -> SyncResult<()>;

    /// Subscribes a handler to a topic.
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> SyncResult<SubscriptionId>;

    /// Removes a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// A synchronous local bus for tests.
///
/// `publish` invokes every matching subscriber inline with the current
/// time as the send time. Share one instance across managers to model
/// the deployment-wide channel.
#[derive(Default)]
pub struct LoopbackBroadcast {
    subscribers: Mutex<HashMap<SubscriptionId, (String, Arc<MessageHandler>)>>,
    next_id: AtomicU64,
}

impl LoopbackBroadcast {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Broadcast for LoopbackBroadcast {
    fn publish(&self, topic: &str, message: &str) -> SyncResult<()> {
        let sent_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        let handlers: Vec<Arc<MessageHandler>> = self
            .subscribers
            .lock()
            .values()
            .filter(|(t, _)| t == topic)
            .map(|(_, h)| Arc::clone(h))
            .collect();

        for handler in handlers {
            (*handler)(message, sent_at);
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str, handler: MessageHandler) -> SyncResult<SubscriptionId> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers
            .lock()
            .insert(id, (topic.to_string(), Arc::new(handler)));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn publish_reaches_matching_topic_only() {
        let bus = LoopbackBroadcast::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_a = Arc::clone(&hits);
        bus.subscribe("a", Box::new(move |_, _| {
            hits_a.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

        bus.publish("a", "hello").unwrap();
        bus.publish("b", "hello").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = LoopbackBroadcast::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = Arc::clone(&hits);
        let id = bus
            .subscribe("a", Box::new(move |_, _| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 0);

        bus.publish("a", "hello").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn send_time_is_populated() {
        let bus = LoopbackBroadcast::new();
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = Arc::clone(&seen);
        bus.subscribe("a", Box::new(move |_, sent_at| {
            *seen_clone.lock() = Some(sent_at);
        }))
        .unwrap();

        bus.publish("a", "m").unwrap();
        assert!(seen.lock().unwrap() > 0.0);
    }
}
