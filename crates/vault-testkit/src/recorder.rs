//! Thread-safe recorder for job callbacks

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use vault_core::{BlobId, Result};

#[derive(Debug)]
struct Inner<T> {
    entries: Mutex<Vec<(BlobId, Result<T>)>>,
    changed: Condvar,
}

/// Collects `(blob_id, result)` pairs from callbacks running on worker threads
#[derive(Debug)]
pub struct CallbackLog<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for CallbackLog<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for CallbackLog<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Vec::new()),
                changed: Condvar::new(),
            }),
        }
    }
}

impl<T: Send + 'static> CallbackLog<T> {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback that appends its arguments to this log
    pub fn recorder(&self) -> impl FnOnce(BlobId, Result<T>) + Send + 'static {
        let log = self.clone();
        move |blob_id, result| log.record(blob_id, result)
    }

    /// Append one entry and wake waiters
    pub fn record(&self, blob_id: BlobId, result: Result<T>) {
        self.inner.entries.lock().push((blob_id, result));
        self.inner.changed.notify_all();
    }

    /// Number of callbacks recorded
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` callbacks arrived; false on timeout
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut entries = self.inner.entries.lock();
        while entries.len() < count {
            if self.inner.changed.wait_until(&mut entries, deadline).timed_out() {
                return entries.len() >= count;
            }
        }
        true
    }

    /// Remove and return everything recorded so far, in arrival order
    pub fn take(&self) -> Vec<(BlobId, Result<T>)> {
        std::mem::take(&mut *self.inner.entries.lock())
    }
}
