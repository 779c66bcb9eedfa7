//! Write-behind queue for durable persistence.
//!
//! `save` never waits on disk. It hands a [`WriteJob`] to a [`DurableWriter`]:
//!
//! - [`QueuedWriter`] owns an unbounded channel drained by a background task.
//!   Each job is written on the blocking pool as an independent task, so two
//!   writes for the same key may land in either order.
//! - [`InlineWriter`] writes synchronously inside `submit`, which makes
//!   durable completion observable in tests.
//!
//! Write failures are logged and never surfaced to callers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tierkit_core::{CacheKey, StorageError, StoredPayload};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};

use crate::durable::FileStore;

/// A pending durable write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteJob {
    pub key: CacheKey,
    pub payload: StoredPayload,
}

/// Sink for durable writes.
#[async_trait]
pub trait DurableWriter: Send + Sync {
    /// Hand off a write without blocking the caller on I/O.
    fn submit(&self, job: WriteJob);

    /// Wait until every write submitted so far has finished.
    async fn settle(&self) {}
}

/// Perform a write, logging instead of returning the failure.
fn write_logged(store: &FileStore, job: &WriteJob) {
    match store.write(&job.key, &job.payload) {
        Ok(()) => tracing::trace!(
            key = %job.key,
            location = %job.payload.location,
            bytes = job.payload.len(),
            "Durable write completed"
        ),
        Err(StorageError::NoFilePath { location }) => tracing::debug!(
            key = %job.key,
            %location,
            "No directory for location, skipping durable write"
        ),
        Err(e) => tracing::warn!(key = %job.key, error = %e, "Durable write failed"),
    }
}

// ============================================================================
// INLINE WRITER
// ============================================================================

/// Writes synchronously on the submitting thread.
#[derive(Debug, Clone)]
pub struct InlineWriter {
    store: FileStore,
}

impl InlineWriter {
    pub fn new(store: FileStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DurableWriter for InlineWriter {
    fn submit(&self, job: WriteJob) {
        write_logged(&self.store, &job);
    }
}

// ============================================================================
// QUEUED WRITER
// ============================================================================

/// Count of submitted-but-unfinished writes.
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn start(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn pending(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    async fn wait_idle(&self) {
        loop {
            let idle = self.idle.notified();
            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Marks one write finished when dropped, including on unwind.
struct FinishGuard(Arc<InFlight>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Background write-behind queue running on a Tokio runtime.
#[derive(Debug)]
pub struct QueuedWriter {
    sender: mpsc::UnboundedSender<WriteJob>,
    in_flight: Arc<InFlight>,
}

impl QueuedWriter {
    /// Start the drain task on the current Tokio runtime.
    ///
    /// Fails with `RuntimeUnavailable` when called outside a runtime.
    pub fn spawn(store: FileStore) -> Result<Self, StorageError> {
        let handle = Handle::try_current().map_err(|_| StorageError::RuntimeUnavailable)?;
        Ok(Self::spawn_on(&handle, store))
    }

    /// Start the drain task on `handle`.
    pub fn spawn_on(handle: &Handle, store: FileStore) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<WriteJob>();
        let in_flight = Arc::new(InFlight::default());

        let drain_handle = handle.clone();
        let drain_in_flight = Arc::clone(&in_flight);
        handle.spawn(async move {
            tracing::trace!("Write-behind queue started");
            while let Some(job) = receiver.recv().await {
                let store = store.clone();
                let done = FinishGuard(Arc::clone(&drain_in_flight));
                drain_handle.spawn_blocking(move || {
                    let _done = done;
                    write_logged(&store, &job);
                });
            }
            tracing::trace!("Write-behind queue closed");
        });

        Self { sender, in_flight }
    }

    /// Number of writes submitted but not yet finished.
    pub fn pending(&self) -> usize {
        self.in_flight.pending()
    }
}

#[async_trait]
impl DurableWriter for QueuedWriter {
    fn submit(&self, job: WriteJob) {
        self.in_flight.start();
        if let Err(mpsc::error::SendError(job)) = self.sender.send(job) {
            self.in_flight.finish();
            tracing::warn!(key = %job.key, "Write-behind queue closed, dropping durable write");
        }
    }

    async fn settle(&self) {
        self.in_flight.wait_idle().await;
    }
}
