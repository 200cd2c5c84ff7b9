//! Configuration for a managed sheet.

use std::time::Duration;

/// Configuration for one synchronized sheet.
#[derive(Debug, Clone)]
pub struct SheetConfig {
    /// Spreadsheet document id at the origin.
    pub spread_id: String,
    /// Sheet (tab) id within the document.
    pub sheet_id: String,
    /// How often the periodic loop refreshes, and how old a cached
    /// payload may be before it no longer counts as fresh.
    pub refresh_interval: Duration,
    /// Key under which the payload is stored in the durable store.
    pub store_key: String,
    /// Topic used for broadcast fan-out.
    pub broadcast_topic: String,
    /// Payloads at or above this encoded size are fanned out as a
    /// re-read sentinel instead of inline.
    pub max_broadcast_bytes: usize,
}

impl SheetConfig {
    /// Creates a configuration with the default 30 second interval.
    ///
    /// Store key and broadcast topic are derived from the two ids and
    /// can be overridden with the builder methods.
    pub fn new(spread_id: impl Into<String>, sheet_id: impl Into<String>) -> Self {
        let spread_id = spread_id.into();
        let sheet_id = sheet_id.into();
        Self {
            store_key: format!("sheetsync/{}/{}", spread_id, sheet_id),
            broadcast_topic: format!("sheetsync:{}:{}", spread_id, sheet_id),
            spread_id,
            sheet_id,
            refresh_interval: Duration::from_secs(30),
            max_broadcast_bytes: 1000,
        }
    }

    /// Sets the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Sets the durable store key.
    pub fn with_store_key(mut self, key: impl Into<String>) -> Self {
        self.store_key = key.into();
        self
    }

    /// Sets the broadcast topic.
    pub fn with_broadcast_topic(mut self, topic: impl Into<String>) -> Self {
        self.broadcast_topic = topic.into();
        self
    }

    /// Sets the inline broadcast size limit.
    pub fn with_max_broadcast_bytes(mut self, bytes: usize) -> Self {
        self.max_broadcast_bytes = bytes;
        self
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_keys() {
        let config = SheetConfig::new("doc-1", "tab-a");
        assert_eq!(config.store_key, "sheetsync/doc-1/tab-a");
        assert_eq!(config.broadcast_topic, "sheetsync:doc-1:tab-a");
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.max_broadcast_bytes, 1000);
    }

    #[test]
    fn builder_overrides() {
        let config = SheetConfig::new("doc", "tab")
            .with_refresh_interval(Duration::from_secs(5))
            .with_store_key("custom/key")
            .with_broadcast_topic("custom-topic")
            .with_max_broadcast_bytes(512);

        assert_eq!(config.refresh_interval, Duration::from_secs(5));
        assert_eq!(config.store_key, "custom/key");
        assert_eq!(config.broadcast_topic, "custom-topic");
        assert_eq!(config.max_broadcast_bytes, 512);
    }
}
