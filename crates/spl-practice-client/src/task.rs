//! Cancellation, time sources and the loading/error state shared by the
//! services.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ClientError;

/// A shared cancellation flag.
///
/// Clones observe the same flag. Once cancelled a token stays cancelled;
/// a new session gets a new token.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token has been cancelled.
    pub fn check(&self) -> Result<(), ClientError> {
        if self.is_cancelled() {
            Err(ClientError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Loading flag and last error message of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    is_loading: bool,
    error: Option<String>,
}

impl ServiceStatus {
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Human readable message of the last failed operation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn begin(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    /// Record the outcome of an operation and hand the result back.
    ///
    /// A cancelled operation records no error: its owner is being torn
    /// down.
    pub(crate) fn settle<T>(
        &mut self,
        context: &str,
        result: Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        self.is_loading = false;
        if let Err(e) = &result {
            self.record(context, e);
        }
        result
    }

    /// Note a failure of a follow-up step whose parent operation succeeded.
    pub(crate) fn record(&mut self, context: &str, error: &ClientError) {
        if matches!(error, ClientError::Cancelled) {
            tracing::debug!(context, "operation cancelled");
            return;
        }
        tracing::warn!(context, error = %error, "operation failed");
        self.error = Some(format!("{context}: {error}"));
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
    }
}

/// Source of the current Unix time, in seconds.
pub trait Clock: Send + Sync {
    fn unix_timestamp(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_timestamp(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64),
        }
    }
}

/// A settable clock, for tests and replays.
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(unix_timestamp: i64) -> Self {
        Self {
            now: AtomicI64::new(unix_timestamp),
        }
    }

    pub fn set(&self, unix_timestamp: i64) {
        self.now.store(unix_timestamp, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn unix_timestamp(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
