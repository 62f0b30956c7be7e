use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::connectivity::ConnectivityObserver;
use crate::gateway::RemoteWriteGateway;
use crate::queue::{MutationQueue, OperationKind, QueuedOperation, SyncResult};

/// Orchestrates the mutation queue against connectivity changes and the
/// remote write gateway.
///
/// The engine decides *when* the queue flushes: automatically on every
/// transition to online (via [`spawn_connectivity_watcher`]) and on demand via
/// [`trigger_sync`]. It is the sole component that flushes the queue, and it
/// holds the single-flight guard the queue requires — two overlapping
/// triggers share one flush pass instead of racing the queue's
/// read-modify-write.
///
/// [`spawn_connectivity_watcher`]: SyncEngine::spawn_connectivity_watcher
/// [`trigger_sync`]: SyncEngine::trigger_sync
pub struct SyncEngine {
    queue: MutationQueue,
    gateway: Arc<dyn RemoteWriteGateway>,
    connectivity: Arc<dyn ConnectivityObserver>,
    /// Single-flight slot: held for the duration of a flush pass, storing the
    /// most recent result for triggers that arrive mid-pass.
    flight: Mutex<SyncResult>,
}

impl SyncEngine {
    pub fn new(
        queue: MutationQueue,
        gateway: Arc<dyn RemoteWriteGateway>,
        connectivity: Arc<dyn ConnectivityObserver>,
    ) -> Self {
        Self {
            queue,
            gateway,
            connectivity,
            flight: Mutex::new(SyncResult::skipped_offline()),
        }
    }

    /// Stages a remote mutation. Returns as soon as the operation is
    /// persisted — the network is never consulted here.
    pub async fn enqueue(&self, op: QueuedOperation) -> Result<()> {
        self.queue.enqueue(op).await
    }

    /// The underlying queue, for status displays and the manual clear path.
    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    /// Attempts to flush the pending queue now.
    ///
    /// If another trigger is already mid-flush, this does not start a second
    /// pass; it waits for the in-flight one and returns its result. Callers
    /// therefore cannot double-apply a queued operation by racing triggers
    /// (e.g. app foregrounding at the same moment connectivity returns).
    ///
    /// Offline is not an error: the result comes back with `success: false`
    /// and zero counts, and the queue is untouched. Storage failures do
    /// propagate.
    pub async fn trigger_sync(&self) -> Result<SyncResult> {
        match self.flight.try_lock() {
            Ok(mut slot) => {
                let result = self.run_flush().await?;
                *slot = result;
                Ok(result)
            }
            Err(_) => {
                // A pass is in flight; wait for it to finish and report what
                // it reported.
                Ok(*self.flight.lock().await)
            }
        }
    }

    /// Spawns the task that listens for connectivity transitions and flushes
    /// on every reconnect. The task ends when the observer is dropped.
    pub fn spawn_connectivity_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut online = engine.connectivity.watch();
        tokio::spawn(async move {
            while online.changed().await.is_ok() {
                if !*online.borrow_and_update() {
                    continue;
                }
                match engine.trigger_sync().await {
                    Ok(result) => log::info!(
                        "reconnect sync: {} applied, {} kept queued",
                        result.synced_count,
                        result.error_count
                    ),
                    Err(err) => log::warn!("reconnect sync failed: {err:#}"),
                }
            }
        })
    }

    async fn run_flush(&self) -> Result<SyncResult> {
        if !self.connectivity.is_connected().await {
            log::debug!("sync requested while offline, skipping flush");
            return Ok(SyncResult::skipped_offline());
        }

        let gateway = Arc::clone(&self.gateway);
        let result = self
            .queue
            .flush(move |op| {
                let gateway = Arc::clone(&gateway);
                async move { apply_operation(gateway.as_ref(), op).await }
            })
            .await?;

        if result.error_count > 0 {
            log::info!(
                "sync cycle finished: {} applied, {} failed and kept queued",
                result.synced_count,
                result.error_count
            );
        } else if result.synced_count > 0 {
            log::info!("sync cycle finished: {} applied", result.synced_count);
        }

        Ok(result)
    }
}

async fn apply_operation(gateway: &dyn RemoteWriteGateway, op: QueuedOperation) -> Result<()> {
    match op.kind {
        OperationKind::Create { record } => gateway.insert(&op.target, &record).await,
        OperationKind::Update {
            changes,
            match_criteria,
        } => gateway.update(&op.target, &changes, &match_criteria).await,
    }
}
