// Request-keyed cache fronting the gateway: stale-while-revalidate reads,
// at-most-one-inflight-per-key coalescing, and mutation-driven invalidation.
//
// Concurrency model: a single mutex guards the key map, held only for map
// bookkeeping, never across a fetch. Callers that find a fetch already in
// flight for their key subscribe to its broadcast channel instead of
// issuing a second request; callers for different keys never contend
// beyond the map lock itself.
use campus_common::ApiError;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};

/// One component of a structured cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Str(String),
    Num(u64),
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<u64> for KeyPart {
    fn from(value: u64) -> Self {
        KeyPart::Num(value)
    }
}

/// Structured cache key: a tuple of parts, e.g. `["students"]` for the
/// collection and `["students", 42]` for one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    pub fn of(name: &str) -> Self {
        Self(vec![KeyPart::from(name)])
    }

    pub fn scoped(name: &str, part: impl Into<KeyPart>) -> Self {
        Self(vec![KeyPart::from(name), part.into()])
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }
}

impl From<&str> for QueryKey {
    fn from(name: &str) -> Self {
        QueryKey::of(name)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, part) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ":")?;
            }
            match part {
                KeyPart::Str(value) => write!(f, "{value}")?,
                KeyPart::Num(value) => write!(f, "{value}")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// Age below which a cached value is served without refetching.
    pub stale_time: Duration,
    /// Age past which a cached value is dropped entirely.
    pub cache_time: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_millis(crate::config::DEFAULT_STALE_TIME_MS),
            cache_time: Duration::from_millis(crate::config::DEFAULT_CACHE_TIME_MS),
        }
    }
}

impl QueryOptions {
    /// Session-wide defaults taken from the layered client configuration
    /// (built-ins, env vars, YAML override).
    pub fn from_config(config: &crate::config::ClientConfig) -> Self {
        Self {
            stale_time: config.default_stale_time,
            cache_time: config.default_cache_time,
        }
    }
}

/// What a `query` call hands back. `data` and `error` can both be set at
/// once: a failed refetch keeps the previous value so callers can render
/// stale data under an error banner instead of blanking the view.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub data: Option<Value>,
    pub error: Option<Arc<ApiError>>,
    /// True when `data` was served from cache while a refetch runs.
    pub is_stale: bool,
}

// Errors cross the broadcast channel shared, since ApiError is not Clone.
type SharedResult = Result<Value, Arc<ApiError>>;

struct Entry {
    data: Option<Value>,
    error: Option<Arc<ApiError>>,
    fetched_at: Option<Instant>,
    // Set by mutation invalidation; forces the next query to refetch
    // regardless of stale_time.
    invalidated: bool,
    // Bumped on every invalidation. A settling fetch may only clear the
    // flag when the generation still matches the one it started under;
    // otherwise a mutation landed mid-fetch and the fetched value is
    // already suspect.
    generation: u64,
    inflight: Option<broadcast::Sender<SharedResult>>,
}

impl Entry {
    fn empty() -> Self {
        Self {
            data: None,
            error: None,
            fetched_at: None,
            invalidated: false,
            generation: 0,
            inflight: None,
        }
    }
}

/// The request cache. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct QueryCache {
    inner: Arc<Mutex<HashMap<QueryKey, Entry>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read through the cache.
    ///
    /// Fresh hit: returns the cached value, no fetch. Stale hit: returns
    /// the cached value immediately and refreshes in the background. Cold
    /// miss: runs the fetcher inline. A concurrent call for the same key
    /// attaches to the in-flight fetch instead of issuing its own.
    pub async fn query<F, Fut>(&self, key: &QueryKey, options: QueryOptions, fetcher: F) -> QueryResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = campus_common::Result<Value>> + Send + 'static,
    {
        let mut guard = self.inner.lock().await;
        let entry = guard.entry(key.clone()).or_insert_with(Entry::empty);

        // Evict values past cache_time so they cannot be served stale
        // forever; lazy, like TTL expiry in the stores.
        if entry.inflight.is_none() {
            if let Some(fetched_at) = entry.fetched_at {
                if fetched_at.elapsed() >= options.cache_time {
                    *entry = Entry::empty();
                }
            }
        }

        if let Some(sender) = &entry.inflight {
            // Coalesce: ride the fetch that is already running.
            let mut receiver = sender.subscribe();
            let prior = entry.data.clone();
            drop(guard);
            return match receiver.recv().await {
                Ok(Ok(value)) => QueryResult {
                    data: Some(value),
                    error: None,
                    is_stale: false,
                },
                Ok(Err(err)) => QueryResult {
                    data: prior,
                    error: Some(err),
                    is_stale: false,
                },
                Err(_) => QueryResult {
                    data: prior,
                    error: Some(Arc::new(ApiError::Network(
                        "in-flight fetch abandoned".to_string(),
                    ))),
                    is_stale: false,
                },
            };
        }

        let fresh = !entry.invalidated
            && entry
                .fetched_at
                .map(|fetched_at| fetched_at.elapsed() < options.stale_time)
                .unwrap_or(false);
        if fresh {
            if let Some(data) = &entry.data {
                return QueryResult {
                    data: Some(data.clone()),
                    error: entry.error.clone(),
                    is_stale: false,
                };
            }
        }

        // This call owns the fetch; waiters attach to the channel.
        let (sender, mut own_receiver) = broadcast::channel(1);
        entry.inflight = Some(sender.clone());
        let generation = entry.generation;
        let prior = entry.data.clone();
        drop(guard);

        let future = fetcher();
        if let Some(prior_value) = prior {
            // Stale-while-revalidate: hand back the old value now, settle
            // the refetch in the background.
            let cache = self.clone();
            let key = key.clone();
            let last_error = {
                let guard = self.inner.lock().await;
                guard.get(&key).and_then(|entry| entry.error.clone())
            };
            tokio::spawn(async move {
                let result = future.await;
                cache.settle(&key, &sender, generation, result).await;
            });
            return QueryResult {
                data: Some(prior_value),
                error: last_error,
                is_stale: true,
            };
        }

        // Cold miss: fetch inline and report the outcome directly.
        let result = future.await;
        let shared = self.settle(key, &sender, generation, result).await;
        // Drain our own subscription so the channel does not lag.
        let _ = own_receiver.try_recv();
        match shared {
            Ok(value) => QueryResult {
                data: Some(value),
                error: None,
                is_stale: false,
            },
            Err(err) => QueryResult {
                data: None,
                error: Some(err),
                is_stale: false,
            },
        }
    }

    async fn settle(
        &self,
        key: &QueryKey,
        sender: &broadcast::Sender<SharedResult>,
        generation: u64,
        result: campus_common::Result<Value>,
    ) -> SharedResult {
        let shared: SharedResult = result.map_err(Arc::new);
        {
            let mut guard = self.inner.lock().await;
            if let Some(entry) = guard.get_mut(key) {
                entry.inflight = None;
                match &shared {
                    Ok(value) => {
                        entry.data = Some(value.clone());
                        entry.error = None;
                        entry.fetched_at = Some(Instant::now());
                        // A mutation that landed while this fetch was in
                        // flight keeps the entry invalidated: the fetched
                        // value may predate the write.
                        if entry.generation == generation {
                            entry.invalidated = false;
                        }
                    }
                    Err(err) => {
                        // Keep the previous value; surface the error next
                        // to it instead of wiping the screen.
                        entry.error = Some(err.clone());
                    }
                }
            }
        }
        let _ = sender.send(shared.clone());
        shared
    }

    /// Run a write operation, then mark the listed keys for refetch.
    /// A failed mutation invalidates nothing; the error propagates as-is.
    pub async fn mutate<F, Fut>(
        &self,
        invalidates: &[QueryKey],
        op: F,
    ) -> campus_common::Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = campus_common::Result<Value>>,
    {
        let value = op().await?;
        let mut guard = self.inner.lock().await;
        for key in invalidates {
            if let Some(entry) = guard.get_mut(key) {
                entry.invalidated = true;
                entry.generation = entry.generation.wrapping_add(1);
            }
        }
        Ok(value)
    }

    /// Mark one key for refetch without running a mutation.
    pub async fn invalidate(&self, key: &QueryKey) {
        let mut guard = self.inner.lock().await;
        if let Some(entry) = guard.get_mut(key) {
            entry.invalidated = true;
            entry.generation = entry.generation.wrapping_add(1);
        }
    }

    /// Drop a key's cached value entirely.
    pub async fn remove(&self, key: &QueryKey) {
        self.inner.lock().await.remove(key);
    }

    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn options() -> QueryOptions {
        QueryOptions {
            stale_time: Duration::from_secs(60),
            cache_time: Duration::from_secs(600),
        }
    }

    fn counting_fetcher(
        counter: Arc<AtomicUsize>,
        value: Value,
        delay: Duration,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = campus_common::Result<Value>> + Send>>
    {
        move || {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                sleep(delay).await;
                Ok(value)
            })
        }
    }

    #[tokio::test]
    async fn concurrent_queries_coalesce_into_one_fetch() {
        let cache = QueryCache::new();
        let key = QueryKey::of("students");
        let fetches = Arc::new(AtomicUsize::new(0));

        let first = cache.query(
            &key,
            options(),
            counting_fetcher(
                fetches.clone(),
                serde_json::json!(["a", "b"]),
                Duration::from_millis(50),
            ),
        );
        let second = cache.query(
            &key,
            options(),
            counting_fetcher(
                fetches.clone(),
                serde_json::json!(["never"]),
                Duration::from_millis(50),
            ),
        );
        let (first, second) = tokio::join!(first, second);

        // Exactly one underlying fetch, same value for both callers.
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first.data, second.data);
        assert_eq!(first.data, Some(serde_json::json!(["a", "b"])));
    }

    #[tokio::test]
    async fn different_keys_fetch_independently() {
        let cache = QueryCache::new();
        let fetches = Arc::new(AtomicUsize::new(0));
        let students = QueryKey::of("students");
        let teachers = QueryKey::of("teachers");
        let first = cache.query(
            &students,
            options(),
            counting_fetcher(fetches.clone(), serde_json::json!(1), Duration::ZERO),
        );
        let second = cache.query(
            &teachers,
            options(),
            counting_fetcher(fetches.clone(), serde_json::json!(2), Duration::ZERO),
        );
        let (first, second) = tokio::join!(first, second);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert_eq!(first.data, Some(serde_json::json!(1)));
        assert_eq!(second.data, Some(serde_json::json!(2)));
    }

    #[tokio::test]
    async fn fresh_hit_skips_the_fetcher() {
        let cache = QueryCache::new();
        let key = QueryKey::of("classes");
        let fetches = Arc::new(AtomicUsize::new(0));

        cache
            .query(
                &key,
                options(),
                counting_fetcher(fetches.clone(), serde_json::json!("v1"), Duration::ZERO),
            )
            .await;
        let result = cache
            .query(
                &key,
                options(),
                counting_fetcher(fetches.clone(), serde_json::json!("v2"), Duration::ZERO),
            )
            .await;

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(result.data, Some(serde_json::json!("v1")));
        assert!(!result.is_stale);
    }

    #[tokio::test]
    async fn stale_hit_serves_old_value_and_revalidates() {
        let cache = QueryCache::new();
        let key = QueryKey::of("subjects");
        let stale_fast = QueryOptions {
            stale_time: Duration::ZERO,
            cache_time: Duration::from_secs(600),
        };
        let fetches = Arc::new(AtomicUsize::new(0));

        cache
            .query(
                &key,
                stale_fast,
                counting_fetcher(fetches.clone(), serde_json::json!("v1"), Duration::ZERO),
            )
            .await;
        let result = cache
            .query(
                &key,
                stale_fast,
                counting_fetcher(fetches.clone(), serde_json::json!("v2"), Duration::ZERO),
            )
            .await;
        // The old value comes back immediately, flagged stale.
        assert_eq!(result.data, Some(serde_json::json!("v1")));
        assert!(result.is_stale);

        // Once the background refetch settles, the new value is served.
        sleep(Duration::from_millis(20)).await;
        let result = cache
            .query(
                &key,
                options(),
                counting_fetcher(fetches.clone(), serde_json::json!("v3"), Duration::ZERO),
            )
            .await;
        assert_eq!(result.data, Some(serde_json::json!("v2")));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn mutation_invalidates_on_success_only() {
        let cache = QueryCache::new();
        let key = QueryKey::of("fees");
        let fetches = Arc::new(AtomicUsize::new(0));

        cache
            .query(
                &key,
                options(),
                counting_fetcher(fetches.clone(), serde_json::json!("v1"), Duration::ZERO),
            )
            .await;

        // Failed mutation: entry untouched, next query still fresh.
        let err = cache
            .mutate(std::slice::from_ref(&key), || async {
                Err(ApiError::Http {
                    status: 500,
                    message: "boom".to_string(),
                })
            })
            .await
            .expect_err("mutation failure");
        assert_eq!(err.status(), Some(500));
        let result = cache
            .query(
                &key,
                options(),
                counting_fetcher(fetches.clone(), serde_json::json!("v2"), Duration::ZERO),
            )
            .await;
        assert_eq!(result.data, Some(serde_json::json!("v1")));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // Successful mutation: the fresh-but-invalidated entry refetches.
        cache
            .mutate(std::slice::from_ref(&key), || async {
                Ok(serde_json::json!({"ok": true}))
            })
            .await
            .expect("mutation");
        let result = cache
            .query(
                &key,
                options(),
                counting_fetcher(fetches.clone(), serde_json::json!("v2"), Duration::ZERO),
            )
            .await;
        assert!(result.is_stale);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        let result = cache
            .query(
                &key,
                options(),
                counting_fetcher(fetches.clone(), serde_json::json!("v3"), Duration::ZERO),
            )
            .await;
        assert_eq!(result.data, Some(serde_json::json!("v2")));
    }

    #[tokio::test]
    async fn mutation_during_inflight_fetch_still_invalidates() {
        let cache = QueryCache::new();
        let key = QueryKey::of("students");
        let fetches = Arc::new(AtomicUsize::new(0));

        cache
            .query(
                &key,
                options(),
                counting_fetcher(fetches.clone(), serde_json::json!("v1"), Duration::ZERO),
            )
            .await;
        cache.invalidate(&key).await;

        // Kick off the refetch, then mutate while it is still in flight.
        let result = cache
            .query(
                &key,
                options(),
                counting_fetcher(
                    fetches.clone(),
                    serde_json::json!("v2"),
                    Duration::from_millis(50),
                ),
            )
            .await;
        assert_eq!(result.data, Some(serde_json::json!("v1")));
        cache
            .mutate(std::slice::from_ref(&key), || async {
                Ok(serde_json::json!({"ok": true}))
            })
            .await
            .expect("mutation");
        sleep(Duration::from_millis(100)).await;

        // The settled refetch may predate the mutation, so the next query
        // must not serve it as fresh.
        let result = cache
            .query(
                &key,
                options(),
                counting_fetcher(fetches.clone(), serde_json::json!("v3"), Duration::ZERO),
            )
            .await;
        assert!(result.is_stale);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
        let result = cache
            .query(
                &key,
                options(),
                counting_fetcher(fetches.clone(), serde_json::json!("v4"), Duration::ZERO),
            )
            .await;
        assert_eq!(result.data, Some(serde_json::json!("v3")));
        assert!(!result.is_stale);
    }

    #[tokio::test]
    async fn failed_refetch_keeps_previous_value_with_error() {
        let cache = QueryCache::new();
        let key = QueryKey::of("students");
        let fetches = Arc::new(AtomicUsize::new(0));

        cache
            .query(
                &key,
                options(),
                counting_fetcher(fetches.clone(), serde_json::json!("v1"), Duration::ZERO),
            )
            .await;
        cache.invalidate(&key).await;

        // Refetch fails in the background; the stale value is served now.
        let result = cache
            .query(&key, options(), || async {
                Err(ApiError::Network("offline".to_string()))
            })
            .await;
        assert_eq!(result.data, Some(serde_json::json!("v1")));
        sleep(Duration::from_millis(20)).await;

        // Next read: stale data and the error, side by side.
        let result = cache
            .query(&key, options(), || async {
                Err(ApiError::Network("still offline".to_string()))
            })
            .await;
        assert_eq!(result.data, Some(serde_json::json!("v1")));
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn cold_miss_failure_has_no_data() {
        let cache = QueryCache::new();
        let result = cache
            .query(&QueryKey::of("missing"), options(), || async {
                Err(ApiError::Network("offline".to_string()))
            })
            .await;
        assert!(result.data.is_none());
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn cache_time_evicts_old_values() {
        let cache = QueryCache::new();
        let key = QueryKey::of("dashboardStats");
        let short_lived = QueryOptions {
            stale_time: Duration::ZERO,
            cache_time: Duration::from_millis(5),
        };
        let fetches = Arc::new(AtomicUsize::new(0));

        cache
            .query(
                &key,
                short_lived,
                counting_fetcher(fetches.clone(), serde_json::json!("v1"), Duration::ZERO),
            )
            .await;
        sleep(Duration::from_millis(10)).await;

        // Past cache_time there is no stale value to serve: this is a
        // cold miss again and the call waits for the fetch.
        let result = cache
            .query(
                &key,
                short_lived,
                counting_fetcher(fetches.clone(), serde_json::json!("v2"), Duration::ZERO),
            )
            .await;
        assert_eq!(result.data, Some(serde_json::json!("v2")));
        assert!(!result.is_stale);
    }

    #[test]
    fn options_follow_client_config() {
        let mut config = crate::config::ClientConfig::default();
        config.default_stale_time = Duration::from_millis(1234);
        config.default_cache_time = Duration::from_millis(9876);
        let options = QueryOptions::from_config(&config);
        assert_eq!(options.stale_time, Duration::from_millis(1234));
        assert_eq!(options.cache_time, Duration::from_millis(9876));
    }

    #[test]
    fn key_display_joins_parts() {
        let key = QueryKey::scoped("students", 42u64);
        assert_eq!(key.to_string(), "students:42");
        assert_eq!(QueryKey::of("fees").to_string(), "fees");
    }
}
