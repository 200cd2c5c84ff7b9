//! Remote origin abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// The remote tabular origin, fetch-only.
///
/// Implement this trait over whatever transport reaches the origin
/// (HTTP client, gRPC, a test double). The engine never writes back.
pub trait RemoteSource: Send + Sync {
    /// Fetches the raw tabular JSON for one sheet.
    ///
    /// Transport failures and non-success responses are both errors;
    /// the engine treats either as a failed refresh and retries on the
    /// next tick.
    fn fetch(&self, spread_id: &str, sheet_id: &str) -> SyncResult<String>;
}

/// A scripted origin for tests.
#[derive(Debug, Default)]
pub struct MockSource {
    response: Mutex<Option<String>>,
    failing: AtomicBool,
    fetches: AtomicU64,
}

impl MockSource {
    /// Creates a mock with no response set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that always answers with `json`.
    pub fn with_response(json: impl Into<String>) -> Self {
        let source = Self::new();
        source.set_response(json);
        source
    }

    /// Sets the response returned by subsequent fetches.
    pub fn set_response(&self, json: impl Into<String>) {
        *self.response.lock() = Some(json.into());
    }

    /// Makes subsequent fetches fail with a transport error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns how many fetches have been issued.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl RemoteSource for MockSource {
    fn fetch(&self, _spread_id: &str, _sheet_id: &str) -> SyncResult<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("mock origin unreachable"));
        }
        self.response
            .lock()
            .clone()
            .ok_or_else(|| SyncError::transport_fatal("no mock response set"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_response() {
        let source = MockSource::with_response("{}");
        assert_eq!(source.fetch("s", "t").unwrap(), "{}");
        assert_eq!(source.fetch_count(), 1);
    }

    #[test]
    fn failure_toggle() {
        let source = MockSource::with_response("{}");
        source.set_failing(true);
        assert!(source.fetch("s", "t").is_err());

        source.set_failing(false);
        assert!(source.fetch("s", "t").is_ok());
        assert_eq!(source.fetch_count(), 2);
    }
}
