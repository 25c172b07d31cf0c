// Client-side persistence: a key/value backend trait, an in-memory backend
// with TTL expiry, and the credential/config stores built on top.
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub mod config;
pub mod credential;
pub mod file;

pub use config::{ConfigStore, FeatureStats};
pub use credential::CredentialStore;
pub use file::FileStore;

/// Storage key names shared with the original deployment, so a file-backed
/// store stays readable next to exported browser state.
pub mod keys {
    pub const AUTH_TOKEN: &str = "authToken";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const USER: &str = "user";
    pub const DASHBOARD_CONFIG: &str = "dashboardConfig";
}

pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Days-based TTLs are what the login flow hands us (7 or 30).
pub fn ttl_days(days: u64) -> Duration {
    Duration::from_secs(days * SECONDS_PER_DAY)
}

/// String-keyed storage with optional per-entry TTL.
///
/// Expired entries read back as absent: callers cannot distinguish a key
/// that was never written from one whose TTL has lapsed, and neither case
/// is an error.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>);
    async fn get(&self, key: &str) -> Option<String>;
    async fn delete(&self, key: &str) -> Option<String>;
    async fn clear(&self);
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

/// In-memory backend for tests and ephemeral sessions.
///
/// ```
/// use campus_store::{MemoryStore, StoreBackend};
///
/// let store = MemoryStore::new();
/// let rt = tokio::runtime::Runtime::new().expect("rt");
/// rt.block_on(async {
///     store.put("k", "v".to_string(), None).await;
///     assert_eq!(store.get("k").await.as_deref(), Some("v"));
/// });
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    // RwLock allows concurrent readers while updates take exclusive access.
    inner: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) {
        // Compute expiry once so reads only compare Instants.
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        let entry = MemoryEntry { value, expires_at };
        self.inner.write().await.insert(key.to_string(), entry);
    }

    async fn get(&self, key: &str) -> Option<String> {
        // Take a write lock so we can evict expired entries.
        let mut guard = self.inner.write().await;
        if let Some(entry) = guard.get(key) {
            if let Some(expires_at) = entry.expires_at {
                // Lazy-expire on read to avoid a background sweeper.
                if Instant::now() >= expires_at {
                    guard.remove(key);
                    return None;
                }
            }
            return Some(entry.value.clone());
        }
        None
    }

    async fn delete(&self, key: &str) -> Option<String> {
        // Remove and return the stored value, if any.
        self.inner
            .write()
            .await
            .remove(key)
            .map(|entry| entry.value)
    }

    async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn ttl_expiry_reads_as_absent() {
        // Ensure TTL logic expires keys after the deadline.
        let store = MemoryStore::new();
        store
            .put("k", "v".to_string(), Some(Duration::from_millis(10)))
            .await;
        sleep(Duration::from_millis(15)).await;
        assert!(store.get("k").await.is_none());
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = MemoryStore::new();
        store.put("k", "value".to_string(), None).await;
        assert_eq!(store.get("k").await.as_deref(), Some("value"));
        assert_eq!(store.delete("k").await.as_deref(), Some("value"));
        assert!(store.get("k").await.is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        assert!(store.delete("missing").await.is_none());
        assert!(store.delete("missing").await.is_none());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let store = MemoryStore::new();
        store.put("a", "1".to_string(), None).await;
        store.put("b", "2".to_string(), None).await;
        store.clear().await;
        assert!(store.get("a").await.is_none());
        assert!(store.get("b").await.is_none());
    }

    #[test]
    fn ttl_days_arithmetic() {
        assert_eq!(ttl_days(7), Duration::from_secs(7 * 86_400));
        assert_eq!(ttl_days(30), Duration::from_secs(30 * 86_400));
    }
}
