use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Write surface of the remote backend, consumed during a flush pass.
///
/// Implemented by the app's backend client. Each call may reject; rejection
/// reasons are opaque to the core beyond success/failure, and transport
/// timeouts are the implementation's own responsibility — the core treats a
/// post-timeout rejection like any other failure.
#[async_trait]
pub trait RemoteWriteGateway: Send + Sync {
    /// Inserts `record` into the remote collection `target`.
    async fn insert(&self, target: &str, record: &Value) -> Result<()>;

    /// Applies `changes` to the record(s) in `target` matching
    /// `match_criteria`.
    async fn update(&self, target: &str, changes: &Value, match_criteria: &Value) -> Result<()>;
}
