//! # caseworker-sync
//!
//! Offline-first synchronization core for the Caseworker mobile case-management
//! app, which tracks migrant workers' documents, visas, and training records
//! against a remote relational backend.
//!
//! ## Overview
//!
//! Field officers routinely work in places with no usable connectivity, so the
//! app never blocks a write on the network. Every remote mutation is staged in
//! a durable, ordered queue and replayed against the backend once connectivity
//! returns; previously fetched reads are served from a time-bounded cache while
//! offline. This crate is that core — it contains no UI, no remote schema, and
//! no authentication, only the queueing, caching, and retry machinery behind
//! them.
//!
//! ## Key guarantees
//!
//! - **At-least-once delivery**: a queued operation is removed only after the
//!   remote gateway confirms it; everything else survives process restarts
//! - **Strict ordering**: operations replay in enqueue order, never in parallel
//! - **Per-item isolation**: one failing operation never blocks the ones queued
//!   after it; failures stay queued for the next sync cycle
//! - **Single-flight sync**: concurrent sync triggers share one flush pass
//!   instead of racing the queue's read-modify-write
//! - **Bounded foreground retries**: the OCR extraction call path retries
//!   transport failures a fixed number of times and never retries
//!   deterministic errors
//!
//! ## Wiring
//!
//! ```no_run
//! use std::sync::Arc;
//! use caseworker_sync::{
//!     ConnectivityHandle, FileStore, MutationQueue, QueuedOperation, SyncEngine, TtlCache,
//! };
//! # use anyhow::Result;
//! # use async_trait::async_trait;
//! # struct Backend;
//! # #[async_trait]
//! # impl caseworker_sync::RemoteWriteGateway for Backend {
//! #     async fn insert(&self, _: &str, _: &serde_json::Value) -> Result<()> { Ok(()) }
//! #     async fn update(
//! #         &self,
//! #         _: &str,
//! #         _: &serde_json::Value,
//! #         _: &serde_json::Value,
//! #     ) -> Result<()> { Ok(()) }
//! # }
//!
//! # async fn wire() -> Result<()> {
//! let store = Arc::new(FileStore::open_default()?);
//! let connectivity = Arc::new(ConnectivityHandle::new(false));
//!
//! let _cache = TtlCache::new(store.clone());
//! let engine = Arc::new(SyncEngine::new(
//!     MutationQueue::new(store),
//!     Arc::new(Backend),
//!     connectivity.clone(),
//! ));
//! let _watcher = engine.spawn_connectivity_watcher();
//!
//! // UI actions enqueue without touching the network.
//! engine
//!     .enqueue(QueuedOperation::create(
//!         "workers",
//!         serde_json::json!({ "name": "A. Santos", "visa": "H-2A" }),
//!     ))
//!     .await?;
//!
//! // Platform glue reports connectivity; the watcher flushes on reconnect.
//! connectivity.set_online(true);
//! # Ok(())
//! # }
//! ```

/// Time-bounded read cache served while the device is offline.
///
/// Entries are stamped with a creation time and an explicit expiry at write
/// time. Expiry is enforced lazily on read — an expired entry is deleted and
/// reported as a miss. There is deliberately no background eviction task.
pub mod cache;

/// Configuration: tunable sync settings loaded from TOML, plus platform
/// data-directory resolution for the file-backed store and log file.
pub mod config;

/// Network-status source abstraction.
///
/// Exposes the current online/offline state and a change-notification stream.
/// [`ConnectivityHandle`] is the provided implementation that platform glue
/// feeds from the device's network monitor.
pub mod connectivity;

/// Sync engine: decides *when* the mutation queue flushes.
///
/// Listens for connectivity transitions and exposes a manual trigger, with a
/// single-flight guard so overlapping triggers share one flush pass.
pub mod engine;

/// Remote write gateway contract consumed during flush.
///
/// The backend client implements this; rejection reasons are opaque to the
/// core beyond success or failure.
pub mod gateway;

/// Logging setup for the host app: console output via `env_logger` plus an
/// append-only log file in the data directory.
pub mod logger;

/// Calling contract around the remote OCR document-extraction service.
///
/// The recognizer itself is external; this module only wires a single
/// extraction call through the bounded transport-retry policy.
pub mod ocr;

/// Durable, ordered staging of pending remote writes.
///
/// Operations are appended while offline (or optimistically while online) and
/// replayed in insertion order during a flush, with per-item failure isolation
/// and at-least-once delivery.
pub mod queue;

/// Bounded retry-with-backoff for a single foreground remote call.
///
/// Retries only errors classified as transport failures, up to a fixed budget,
/// then surfaces the original error unchanged. Independent of the mutation
/// queue, whose retry unit is the whole next sync cycle.
pub mod retry;

/// Durable key-value store abstraction (key → JSON blob) and the two provided
/// implementations: in-memory for tests, one-file-per-key for devices.
pub mod store;

pub use cache::TtlCache;
pub use config::SyncConfig;
pub use connectivity::{ConnectivityHandle, ConnectivityObserver};
pub use engine::SyncEngine;
pub use gateway::RemoteWriteGateway;
pub use ocr::{extract_with_retry, TextExtractor, DEFAULT_OCR_RETRIES};
pub use queue::{MutationQueue, OperationKind, QueuedOperation, SyncResult};
pub use retry::{is_transport_error, with_retry};
pub use store::{FileStore, KeyValueStore, MemoryStore};
