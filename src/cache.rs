//! In-memory TTL cache with single-flight fetching.
//!
//! Each key owns an async mutex that is held for the whole lookup-or-fetch,
//! so concurrent callers for one key share a single upstream request: the
//! first caller fetches while the others wait and then read its result,
//! success or failure. Stale entries are dropped lazily when looked up, and
//! keys left with nothing live are swept whenever a new key is added. A
//! failed refresh is returned as-is and never papered over with the stale
//! value.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::FetchError;

/// Identifies one cached fetch: the upstream source plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    source: &'static str,
    params: Vec<String>,
}

impl CacheKey {
    pub fn new<I, S>(source: &'static str, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source,
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.source, self.params.join(","))
    }
}

/// A cached value and when it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: Instant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// An entry is fresh while strictly less than `ttl` has elapsed.
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < self.ttl
    }
}

/// What the last completed fetch for a key left behind.
#[derive(Debug)]
struct SlotState<T> {
    entry: Option<CacheEntry<T>>,
    last_error: Option<FetchError>,
}

impl<T> Default for SlotState<T> {
    fn default() -> Self {
        Self {
            entry: None,
            last_error: None,
        }
    }
}

/// Per-key state. `completed` counts finished fetches and is bumped while
/// `state` is locked, so a caller that saw an older count before queueing
/// knows a fetch finished while it waited.
#[derive(Debug)]
struct SlotInner<T> {
    completed: AtomicU64,
    state: tokio::sync::Mutex<SlotState<T>>,
}

impl<T> Default for SlotInner<T> {
    fn default() -> Self {
        Self {
            completed: AtomicU64::new(0),
            state: tokio::sync::Mutex::new(SlotState::default()),
        }
    }
}

type Slot<T> = Arc<SlotInner<T>>;

/// Thread-safe TTL cache shared by every caller.
#[derive(Debug)]
pub struct TtlCache<T> {
    slots: Arc<Mutex<HashMap<CacheKey, Slot<T>>>>,
}

impl<T> Clone for TtlCache<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T> Default for TtlCache<T> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> SlotInner<T> {
    /// True unless the slot is idle and holds nothing fresh. A slot locked
    /// by a fetch in progress counts as live.
    fn holds_live_entry(&self, now: Instant) -> bool {
        match self.state.try_lock() {
            Ok(state) => state.entry.as_ref().is_some_and(|e| e.is_fresh(now)),
            Err(_) => true,
        }
    }
}

impl<T: Clone + Send> TtlCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the fresh value for `key`, or run `producer` and cache its
    /// success for `ttl`.
    ///
    /// At most one `producer` runs per key at a time. A failure is handed to
    /// the callers already waiting on it, then forgotten.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        producer: F,
    ) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let slot = self.slot(key);
        let seen = slot.completed.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        if let Some(cached) = state.entry.as_ref() {
            if cached.is_fresh(Instant::now()) {
                debug!(%key, "Cache hit");
                return Ok(cached.value.clone());
            }
            debug!(%key, "Evicting stale cache entry");
            state.entry = None;
        }

        // A fetch failed while this caller was queued behind it.
        if slot.completed.load(Ordering::Acquire) != seen {
            if let Some(error) = state.last_error.clone() {
                debug!(%key, %error, "Sharing failed fetch with waiter");
                return Err(error);
            }
        }

        let result = producer().await;
        match &result {
            Ok(value) => {
                state.entry = Some(CacheEntry {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                    ttl,
                });
                state.last_error = None;
                debug!(%key, ttl_secs = ttl.as_secs(), "Cache filled");
            }
            Err(error) => state.last_error = Some(error.clone()),
        }
        slot.completed.fetch_add(1, Ordering::Release);

        result
    }

    /// Number of keys currently holding a value, fresh or stale.
    ///
    /// Waits for any in-flight fetch to finish.
    pub async fn len(&self) -> usize {
        let slots: Vec<Slot<T>> = self.lock_slots().values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.state.lock().await.entry.is_some() {
                count += 1;
            }
        }
        count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock_slots().clear();
    }

    fn slot(&self, key: &CacheKey) -> Slot<T> {
        let mut slots = self.lock_slots();
        if let Some(slot) = slots.get(key) {
            return Arc::clone(slot);
        }

        let now = Instant::now();
        slots.retain(|_, slot| Arc::strong_count(slot) > 1 || slot.holds_live_entry(now));
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Slot<T>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(600);

    fn key(id: &str) -> CacheKey {
        CacheKey::new("river", [id])
    }

    async fn counted(
        cache: &TtlCache<u32>,
        key: &CacheKey,
        calls: &AtomicUsize,
        value: u32,
    ) -> Result<u32, FetchError> {
        cache
            .get_or_fetch(key, TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            })
            .await
    }

    #[test]
    fn test_cache_key_display() {
        let key = CacheKey::new("weather", ["51.5", "-0.12"]);
        assert_eq!(key.to_string(), "weather(51.5,-0.12)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_freshness_boundary() {
        let now = Instant::now();
        let entry = CacheEntry {
            value: 1,
            fetched_at: now,
            ttl: TTL,
        };
        assert!(entry.is_fresh(now + Duration::from_secs(599)));
        assert!(!entry.is_fresh(now + TTL));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        let first = counted(&cache, &key("a"), &calls, 7).await.unwrap();
        tokio::time::advance(Duration::from_secs(300)).await;
        let second = counted(&cache, &key("a"), &calls, 8).await.unwrap();

        assert_eq!(first, 7);
        assert_eq!(second, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_after_expiry() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        counted(&cache, &key("a"), &calls, 7).await.unwrap();
        tokio::time::advance(TTL).await;
        let refreshed = counted(&cache, &key("a"), &calls, 8).await.unwrap();

        assert_eq!(refreshed, 8);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_does_not_serve_stale() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        counted(&cache, &key("a"), &calls, 7).await.unwrap();
        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        let failed = cache
            .get_or_fetch(&key("a"), TTL, || async { Err(FetchError::Timeout) })
            .await;
        assert_eq!(failed, Err(FetchError::Timeout));
        assert!(cache.is_empty().await);

        let recovered = counted(&cache, &key("a"), &calls, 9).await.unwrap();
        assert_eq!(recovered, 9);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        let failed = cache
            .get_or_fetch(&key("a"), TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::HttpStatus(500))
            })
            .await;
        assert!(failed.is_err());

        counted(&cache, &key("a"), &calls, 3).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache: TtlCache<u32> = TtlCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut tasks = tokio::task::JoinSet::new();

        for _ in 0..10 {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            tasks.spawn(async move {
                cache
                    .get_or_fetch(&key("a"), TTL, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(42)
                    })
                    .await
            });
        }

        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_do_not_block_each_other() {
        let cache: TtlCache<u32> = TtlCache::new();

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(&key("slow"), TTL, || async {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Ok(1)
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let fast = tokio::time::timeout(
            Duration::from_secs(1),
            cache.get_or_fetch(&key("fast"), TTL, || async { Ok(2) }),
        )
        .await;
        assert_eq!(fast.unwrap(), Ok(2));
        assert_eq!(slow.await.unwrap(), Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_failure() {
        let cache: TtlCache<u32> = TtlCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();
        let mut tasks = tokio::task::JoinSet::new();

        for _ in 0..5 {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            tasks.spawn(async move {
                cache
                    .get_or_fetch(&key("a"), TTL, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Err(FetchError::Timeout)
                    })
                    .await
            });
        }

        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap(), Err(FetchError::Timeout));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(10));

        let retried = counted(&cache, &key("a"), &calls, 5).await;
        assert_eq!(retried, Ok(5));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_keys_are_swept() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        for day in 0..100 {
            counted(&cache, &key(&format!("since-{day}")), &calls, day).await.unwrap();
            tokio::time::advance(TTL).await;
        }

        assert_eq!(cache.lock_slots().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_fresh_keys() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        counted(&cache, &key("a"), &calls, 1).await.unwrap();
        counted(&cache, &key("b"), &calls, 2).await.unwrap();
        counted(&cache, &key("a"), &calls, 3).await.unwrap();

        assert_eq!(cache.lock_slots().len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        counted(&cache, &key("a"), &calls, 1).await.unwrap();
        counted(&cache, &key("b"), &calls, 2).await.unwrap();
        assert_eq!(cache.len().await, 2);

        cache.clear();
        assert!(cache.is_empty().await);
    }
}
