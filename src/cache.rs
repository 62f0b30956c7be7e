use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::DEFAULT_CACHE_PREFIX;
use crate::store::KeyValueStore;

/// Version tag written into each persisted cache entry.
pub const CACHE_FORMAT_VERSION: u32 = 1;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    version: u32,
    data: Value,
    /// Write time, epoch milliseconds.
    timestamp: i64,
    /// Absolute expiry, epoch milliseconds. Computed once at write time from
    /// `timestamp` plus the caller-supplied duration, never re-derived.
    expiry: i64,
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Time-bounded read cache keyed by logical name.
///
/// Serves previously fetched query results while the device is offline. Every
/// entry carries an explicit expiry; `get` enforces it lazily, deleting an
/// expired entry and reporting a miss. There is no background eviction task —
/// the cache holds no in-process state between calls, so expiry is checked
/// only when a read actually happens.
pub struct TtlCache {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    now_ms: Clock,
}

impl TtlCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_prefix(store, DEFAULT_CACHE_PREFIX)
    }

    /// Uses a non-default key namespace, e.g. from
    /// [`SyncConfig`](crate::SyncConfig). The prefix must be stable across
    /// restarts for cached entries to survive them.
    pub fn with_prefix(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            now_ms: Arc::new(|| chrono::Utc::now().timestamp_millis()),
        }
    }

    /// Overrides the time source. Tests use this to simulate the clock
    /// advancing past an entry's expiry.
    pub fn with_clock(mut self, now_ms: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.now_ms = Arc::new(now_ms);
        self
    }

    /// Caches `data` under `key` for `duration_hours` from now, overwriting
    /// any previous entry.
    pub async fn set(&self, key: &str, data: Value, duration_hours: f64) -> Result<()> {
        let timestamp = (self.now_ms)();
        let entry = CacheEntry {
            version: CACHE_FORMAT_VERSION,
            data,
            timestamp,
            expiry: timestamp + (duration_hours * MILLIS_PER_HOUR) as i64,
        };

        let blob = serde_json::to_string(&entry)
            .with_context(|| format!("Failed to serialize cache entry '{key}'"))?;
        self.store.set(&self.storage_key(key), &blob).await
    }

    /// Returns the cached value for `key`, or `None` if absent or expired.
    ///
    /// An expired entry is deleted on the spot so later reads skip the
    /// deserialize-then-discard step. An entry that no longer decodes (format
    /// drift, corruption) is treated the same way: cached data is always
    /// refetchable, so it is discarded rather than surfaced as an error.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let storage_key = self.storage_key(key);
        let Some(raw) = self.store.get(&storage_key).await? else {
            return Ok(None);
        };

        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.version == CACHE_FORMAT_VERSION => entry,
            Ok(entry) => {
                log::warn!(
                    "discarding cache entry '{key}' with format version {}",
                    entry.version
                );
                self.store.remove(&storage_key).await?;
                return Ok(None);
            }
            Err(err) => {
                log::warn!("discarding undecodable cache entry '{key}': {err}");
                self.store.remove(&storage_key).await?;
                return Ok(None);
            }
        };

        if (self.now_ms)() > entry.expiry {
            log::debug!("cache entry '{key}' expired, removing");
            self.store.remove(&storage_key).await?;
            return Ok(None);
        }

        Ok(Some(entry.data))
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}
