use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::DEFAULT_QUEUE_STORAGE_KEY;
use crate::store::KeyValueStore;

/// Version tag written into the persisted queue blob.
///
/// The queue outlives app updates, so the serialized shape carries an explicit
/// version. A mismatch is surfaced as a storage-class error rather than being
/// silently mis-parsed.
pub const QUEUE_FORMAT_VERSION: u32 = 1;

/// The two mutation kinds the app ever stages. Deletes are never queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationKind {
    /// Insert `record` into the target collection.
    Create { record: Value },
    /// Apply `changes` to the record(s) matching `match_criteria`.
    Update {
        changes: Value,
        match_criteria: Value,
    },
}

/// One pending remote mutation.
///
/// Created while offline (or optimistically while online) and removed only
/// after the remote gateway confirms it; otherwise it persists across process
/// restarts until it succeeds or is manually cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    /// Unique id assigned at enqueue time.
    pub id: String,
    /// Logical name of the remote collection the operation applies to.
    pub target: String,
    #[serde(flatten)]
    pub kind: OperationKind,
    /// When the operation was staged. Informational; ordering comes from the
    /// queue position, not this timestamp.
    pub queued_at: DateTime<Utc>,
}

impl QueuedOperation {
    /// Stages an insert of `record` into `target`.
    pub fn create(target: impl Into<String>, record: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            target: target.into(),
            kind: OperationKind::Create { record },
            queued_at: Utc::now(),
        }
    }

    /// Stages an update of the record(s) in `target` matching
    /// `match_criteria`.
    pub fn update(target: impl Into<String>, changes: Value, match_criteria: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            target: target.into(),
            kind: OperationKind::Update {
                changes,
                match_criteria,
            },
            queued_at: Utc::now(),
        }
    }
}

/// Outcome of one flush attempt.
///
/// `success` is true whenever the attempt itself ran to completion, even if
/// individual operations failed — those stay queued and are counted in
/// `error_count`. It is false only when the attempt could not run at all
/// (device offline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub synced_count: usize,
    pub error_count: usize,
}

impl SyncResult {
    pub(crate) fn completed(synced_count: usize, error_count: usize) -> Self {
        Self {
            success: true,
            synced_count,
            error_count,
        }
    }

    pub(crate) fn skipped_offline() -> Self {
        Self {
            success: false,
            synced_count: 0,
            error_count: 0,
        }
    }

    /// True when the pass ran and left nothing behind.
    pub fn fully_synced(&self) -> bool {
        self.success && self.error_count == 0
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedQueue {
    version: u32,
    operations: Vec<QueuedOperation>,
}

/// Durable, ordered, at-least-once staging of pending writes.
///
/// The queue does not serialize its own access: `flush` is a read-modify-write
/// over the persisted list, so overlapping flush calls can lose queue updates
/// or apply an operation twice. Callers must hold a single-flight guard around
/// `flush` — [`SyncEngine`](crate::engine::SyncEngine) does.
pub struct MutationQueue {
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
}

impl MutationQueue {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_storage_key(store, DEFAULT_QUEUE_STORAGE_KEY)
    }

    /// Uses a non-default storage key, e.g. from [`SyncConfig`](crate::SyncConfig).
    /// The key must be stable across restarts or pending writes are orphaned.
    pub fn with_storage_key(store: Arc<dyn KeyValueStore>, storage_key: impl Into<String>) -> Self {
        Self {
            store,
            storage_key: storage_key.into(),
        }
    }

    /// Appends `op` to the end of the persisted queue.
    ///
    /// Never consults the network. Fails only on storage errors, which
    /// propagate — a staged write must never be silently dropped.
    pub async fn enqueue(&self, op: QueuedOperation) -> Result<()> {
        let mut operations = self.load().await?;
        log::debug!(
            "queueing {} operation {} against '{}' ({} already pending)",
            kind_name(&op.kind),
            op.id,
            op.target,
            operations.len()
        );
        operations.push(op);
        self.persist(operations).await
    }

    /// Replays the queue in insertion order, applying each operation with
    /// `apply`.
    ///
    /// An empty queue short-circuits without calling `apply` or touching
    /// storage. Otherwise every operation is attempted: successes are removed,
    /// failures are logged, counted, and retained in their original relative
    /// order for the next cycle. The retained subset is written back in a
    /// single storage write after the full pass.
    ///
    /// Per-operation failures never propagate out of this method; storage
    /// errors abort the flush and do.
    pub async fn flush<F, Fut>(&self, mut apply: F) -> Result<SyncResult>
    where
        F: FnMut(QueuedOperation) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let operations = self.load().await?;
        if operations.is_empty() {
            return Ok(SyncResult::completed(0, 0));
        }

        let total = operations.len();
        let mut retained = Vec::new();
        for op in operations {
            match apply(op.clone()).await {
                Ok(()) => {}
                Err(err) => {
                    log::warn!(
                        "operation {} against '{}' failed, keeping it queued: {err:#}",
                        op.id,
                        op.target
                    );
                    retained.push(op);
                }
            }
        }

        let error_count = retained.len();
        let synced_count = total - error_count;
        self.persist(retained).await?;

        Ok(SyncResult::completed(synced_count, error_count))
    }

    /// Snapshot of the pending operations, in queue order.
    pub async fn pending(&self) -> Result<Vec<QueuedOperation>> {
        self.load().await
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.load().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.load().await?.is_empty())
    }

    /// Drops every pending operation. Manual escape hatch only — cleared
    /// writes are gone for good.
    pub async fn clear(&self) -> Result<()> {
        self.store.remove(&self.storage_key).await
    }

    async fn load(&self) -> Result<Vec<QueuedOperation>> {
        let Some(raw) = self.store.get(&self.storage_key).await? else {
            return Ok(Vec::new());
        };

        let persisted: PersistedQueue =
            serde_json::from_str(&raw).context("Failed to decode pending operation queue")?;

        if persisted.version != QUEUE_FORMAT_VERSION {
            bail!(
                "Pending operation queue has format version {} (expected {})",
                persisted.version,
                QUEUE_FORMAT_VERSION
            );
        }

        Ok(persisted.operations)
    }

    async fn persist(&self, operations: Vec<QueuedOperation>) -> Result<()> {
        let blob = serde_json::to_string(&PersistedQueue {
            version: QUEUE_FORMAT_VERSION,
            operations,
        })
        .context("Failed to serialize pending operation queue")?;

        self.store.set(&self.storage_key, &blob).await
    }
}

fn kind_name(kind: &OperationKind) -> &'static str {
    match kind {
        OperationKind::Create { .. } => "create",
        OperationKind::Update { .. } => "update",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn queue() -> (Arc<MemoryStore>, MutationQueue) {
        let store = Arc::new(MemoryStore::new());
        let queue = MutationQueue::new(store.clone());
        (store, queue)
    }

    #[tokio::test]
    async fn enqueue_preserves_insertion_order() {
        let (_store, queue) = queue();

        queue
            .enqueue(QueuedOperation::create("workers", json!({"n": 1})))
            .await
            .unwrap();
        queue
            .enqueue(QueuedOperation::update(
                "workers",
                json!({"visa": "H-2A"}),
                json!({"n": 1}),
            ))
            .await
            .unwrap();
        queue
            .enqueue(QueuedOperation::create("documents", json!({"n": 3})))
            .await
            .unwrap();

        let pending = queue.pending().await.unwrap();
        let targets: Vec<_> = pending.iter().map(|op| op.target.as_str()).collect();
        assert_eq!(targets, ["workers", "workers", "documents"]);
    }

    #[tokio::test]
    async fn operation_ids_are_unique() {
        let a = QueuedOperation::create("workers", json!({}));
        let b = QueuedOperation::create("workers", json!({}));
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn persisted_shape_round_trips_through_json() {
        let (store, queue) = queue();

        queue
            .enqueue(QueuedOperation::update(
                "visas",
                json!({"status": "approved"}),
                json!({"worker_id": 7}),
            ))
            .await
            .unwrap();

        let raw = store
            .get(DEFAULT_QUEUE_STORAGE_KEY)
            .await
            .unwrap()
            .expect("queue blob persisted");
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["version"], QUEUE_FORMAT_VERSION);
        assert_eq!(parsed["operations"][0]["kind"], "update");
        assert_eq!(parsed["operations"][0]["target"], "visas");

        let pending = queue.pending().await.unwrap();
        assert_eq!(
            pending[0].kind,
            OperationKind::Update {
                changes: json!({"status": "approved"}),
                match_criteria: json!({"worker_id": 7}),
            }
        );
    }

    #[tokio::test]
    async fn version_mismatch_is_an_error() {
        let (store, queue) = queue();
        store
            .set(
                DEFAULT_QUEUE_STORAGE_KEY,
                r#"{"version": 99, "operations": []}"#,
            )
            .await
            .unwrap();

        let err = queue.pending().await.unwrap_err();
        assert!(err.to_string().contains("format version 99"));
    }

    #[tokio::test]
    async fn undecodable_queue_is_an_error_not_a_silent_reset() {
        let (store, queue) = queue();
        store
            .set(DEFAULT_QUEUE_STORAGE_KEY, "not json at all")
            .await
            .unwrap();

        assert!(queue.pending().await.is_err());
        assert!(queue
            .enqueue(QueuedOperation::create("workers", json!({})))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn empty_flush_never_calls_apply_or_storage_write() {
        let (store, queue) = queue();

        let result = queue
            .flush(|_op| async { panic!("apply must not be called for an empty queue") })
            .await
            .unwrap();

        assert_eq!(result, SyncResult::completed(0, 0));
        assert_eq!(store.get(DEFAULT_QUEUE_STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_drops_pending_operations() {
        let (_store, queue) = queue();
        queue
            .enqueue(QueuedOperation::create("workers", json!({})))
            .await
            .unwrap();

        queue.clear().await.unwrap();
        assert!(queue.is_empty().await.unwrap());
    }
}
