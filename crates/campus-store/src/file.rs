// JSON-file backend so credentials and config survive process restarts.
use crate::StoreBackend;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    value: String,
    // Wall-clock expiry, since monotonic instants do not survive restarts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at_ms: Option<u64>,
}

/// Whole-map JSON persistence: every write rewrites the file.
///
/// The stored map is four small keys (tokens, profile, config), so the
/// rewrite cost is irrelevant next to the network calls that surround it.
/// A file that fails to parse loads as an empty store; client-side state
/// is never authoritative and re-login repopulates it.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: RwLock<HashMap<String, FileEntry>>,
}

impl FileStore {
    /// Open the store at `path`, loading any prior contents.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let inner = RwLock::new(load_map(&path));
        Self { path, inner }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &HashMap<String, FileEntry>) {
        let serialized = match serde_json::to_string_pretty(map) {
            Ok(serialized) => serialized,
            Err(err) => {
                tracing::warn!(error = %err, "serialize store contents failed");
                return;
            }
        };
        if let Err(err) = std::fs::write(&self.path, serialized) {
            tracing::warn!(path = %self.path.display(), error = %err, "persist store failed");
        }
    }
}

fn load_map(path: &Path) -> HashMap<String, FileEntry> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        // Missing file is the normal first-run case.
        Err(_) => return HashMap::new(),
    };
    match serde_json::from_str(&contents) {
        Ok(map) => map,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "store file corrupted, starting empty");
            HashMap::new()
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

fn expired(entry: &FileEntry) -> bool {
    entry
        .expires_at_ms
        .map(|expires_at| now_ms() >= expires_at)
        .unwrap_or(false)
}

#[async_trait]
impl StoreBackend for FileStore {
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) {
        let expires_at_ms = ttl.map(|ttl| now_ms() + ttl.as_millis() as u64);
        let entry = FileEntry {
            value,
            expires_at_ms,
        };
        let mut guard = self.inner.write().await;
        guard.insert(key.to_string(), entry);
        self.persist(&guard);
    }

    async fn get(&self, key: &str) -> Option<String> {
        let mut guard = self.inner.write().await;
        match guard.get(key) {
            Some(entry) if expired(entry) => {
                // Lazy-expire on read, mirroring the in-memory backend.
                guard.remove(key);
                self.persist(&guard);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    async fn delete(&self, key: &str) -> Option<String> {
        let mut guard = self.inner.write().await;
        let removed = guard.remove(key).map(|entry| entry.value);
        if removed.is_some() {
            self.persist(&guard);
        }
        removed
    }

    async fn clear(&self) {
        let mut guard = self.inner.write().await;
        guard.clear();
        self.persist(&guard);
    }
}
