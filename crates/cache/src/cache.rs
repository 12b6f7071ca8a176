use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::fetch::{FetchError, Fetcher};
use crate::lookup::Lookup;

const EVENT_CAPACITY: usize = 64;

type InFlight<V> = Shared<BoxFuture<'static, Result<V, FetchError>>>;

/// Snapshot of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fetches actually sent to the [`Fetcher`].
    pub fetches: u64,
    /// `get` calls answered from a cached value.
    pub hits: u64,
    /// `get` calls that joined a fetch somebody else started.
    pub joins: u64,
}

struct Slot<V> {
    /// Result of the most recent fetch (or `mutate`) that was allowed to land.
    state: Option<Result<V, FetchError>>,
    /// Drawn from the cache-wide counter by every fetch start and every
    /// `mutate`; only the fetch carrying the current generation may write
    /// `state`.  Cache-wide so a slot recreated after `evict` never reuses
    /// a number an older fetch still carries.
    generation: u64,
    inflight: Option<InFlight<V>>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            state: None,
            generation: 0,
            inflight: None,
        }
    }
}

impl<V: Clone> Slot<V> {
    fn lookup(&self) -> Lookup<V> {
        match (&self.state, &self.inflight) {
            (Some(Ok(value)), _) => Lookup::Ready(value.clone()),
            (Some(Err(err)), _) => Lookup::Failed(err.clone()),
            (None, Some(_)) => Lookup::Pending,
            (None, None) => Lookup::Unresolved,
        }
    }
}

struct Inner<K, V> {
    fetcher: Arc<dyn Fetcher<K, V>>,
    slots: Mutex<HashMap<K, Slot<V>>>,
    events: broadcast::Sender<K>,
    generations: AtomicU64,
    fetches: AtomicU64,
    hits: AtomicU64,
    joins: AtomicU64,
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn slots(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        // Slot updates never panic half-way, so a poisoned map is still usable.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn settle(&self, key: &K, generation: u64, result: Result<V, FetchError>) {
        {
            let mut slots = self.slots();
            let Some(slot) = slots.get_mut(key) else {
                debug!(?key, "fetch landed for an evicted key");
                return;
            };
            if slot.generation != generation {
                debug!(?key, generation, current = slot.generation, "discarding superseded fetch");
                return;
            }
            if let Err(err) = &result {
                warn!(?key, error = %err, "fetch failed");
            } else {
                debug!(?key, generation, "fetch landed");
            }
            slot.inflight = None;
            slot.state = Some(result);
        }
        let _ = self.events.send(key.clone());
    }
}

/// Stale-while-revalidate cache keyed by `K`.
///
/// * Concurrent `get`s for a key with no value share one fetch.
/// * `invalidate` re-fetches in the background; readers keep seeing the old
///   value until the new one lands.
/// * A fetch started before an invalidation can never overwrite the result
///   of a fetch started after it.
/// * Failures are cached and handed back as [`Lookup::Failed`]; they are only
///   retried after an `invalidate`.
///
/// Fetches run as spawned tokio tasks, so dropping a `get` future never
/// cancels the fetch it started.  Clones share the same slots.
pub struct RevalidatingCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for RevalidatingCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> RevalidatingCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(fetcher: impl Fetcher<K, V>) -> Self {
        Self::with_fetcher(Arc::new(fetcher))
    }

    pub fn with_fetcher(fetcher: Arc<dyn Fetcher<K, V>>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                fetcher,
                slots: Mutex::new(HashMap::new()),
                events,
                generations: AtomicU64::new(0),
                fetches: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                joins: AtomicU64::new(0),
            }),
        }
    }

    /// Start a fetch for `key` and record it as the slot's only live fetch.
    fn start_fetch(&self, key: &K, slot: &mut Slot<V>) -> InFlight<V> {
        let generation = self.inner.next_generation();
        slot.generation = generation;
        self.inner.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(?key, generation, "fetch started");

        let inner = Arc::clone(&self.inner);
        let key = key.clone();
        let fetch = async move {
            let result = inner.fetcher.fetch(&key).await;
            inner.settle(&key, generation, result.clone());
            result
        }
        .boxed()
        .shared();

        slot.inflight = Some(fetch.clone());
        tokio::spawn(fetch.clone());
        fetch
    }

    /// Value for `key`, fetching it if nothing is cached.
    ///
    /// Returns [`Lookup::Ready`] or [`Lookup::Failed`].  A cached value is
    /// returned immediately even while a revalidation is running.
    pub async fn get(&self, key: &K) -> Lookup<V> {
        let fetch = {
            let mut slots = self.inner.slots();
            let slot = slots.entry(key.clone()).or_default();
            if let Some(Ok(value)) = &slot.state {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                return Lookup::Ready(value.clone());
            }
            if let Some(fetch) = &slot.inflight {
                self.inner.joins.fetch_add(1, Ordering::Relaxed);
                fetch.clone()
            } else if let Some(Err(err)) = &slot.state {
                return Lookup::Failed(err.clone());
            } else {
                self.start_fetch(key, slot)
            }
        };
        fetch.await.into()
    }

    /// Last known state without triggering a fetch.
    pub fn peek(&self, key: &K) -> Lookup<V> {
        self.inner
            .slots()
            .get(key)
            .map(Slot::lookup)
            .unwrap_or(Lookup::Unresolved)
    }

    /// Mark `key` stale and re-fetch it in the background.  Keys that were
    /// never requested are left alone; their first `get` fetches anyway.
    pub fn invalidate(&self, key: &K) {
        let mut slots = self.inner.slots();
        let Some(slot) = slots.get_mut(key) else {
            debug!(?key, "invalidate on an unknown key");
            return;
        };
        debug!(?key, "invalidated");
        let _ = self.start_fetch(key, slot);
    }

    /// Wait until no fetch is in flight for `key` and return what landed.
    pub async fn settled(&self, key: &K) -> Lookup<V> {
        loop {
            let fetch = {
                let slots = self.inner.slots();
                match slots.get(key) {
                    None => return Lookup::Unresolved,
                    Some(slot) => match &slot.inflight {
                        Some(fetch) => fetch.clone(),
                        None => return slot.lookup(),
                    },
                }
            };
            let _ = fetch.await;
        }
    }

    /// Replace the cached value locally.  Any fetch still in flight for the
    /// key is superseded.
    pub fn mutate(&self, key: &K, value: V) {
        {
            let mut slots = self.inner.slots();
            let slot = slots.entry(key.clone()).or_default();
            slot.generation = self.inner.next_generation();
            slot.inflight = None;
            slot.state = Some(Ok(value));
        }
        debug!(?key, "mutated locally");
        let _ = self.inner.events.send(key.clone());
    }

    /// Drop everything known about `key`.
    pub fn evict(&self, key: &K) {
        self.inner.slots().remove(key);
    }

    /// A notification carrying the key every time a fetch or `mutate` lands.
    pub fn subscribe(&self) -> broadcast::Receiver<K> {
        self.inner.events.subscribe()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            fetches: self.inner.fetches.load(Ordering::Relaxed),
            hits: self.inner.hits.load(Ordering::Relaxed),
            joins: self.inner.joins.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::fetch::fetch_fn;

    /// Returns the 1-based call number after sleeping `delays[call - 1]`
    /// (or no delay).  Calls listed in `fail_on` fail instead.
    #[derive(Default)]
    struct Scripted {
        calls: AtomicUsize,
        delays: Vec<Duration>,
        fail_on: Vec<usize>,
    }

    impl Scripted {
        fn delays(ms: &[u64]) -> Self {
            Self {
                delays: ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Fetcher<(i32, u32), usize> for Arc<Scripted> {
        async fn fetch(&self, _key: &(i32, u32)) -> Result<usize, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delays.get(call - 1) {
                tokio::time::sleep(*delay).await;
            }
            if self.fail_on.contains(&call) {
                return Err(FetchError::new(format!("call {call} failed")));
            }
            Ok(call)
        }
    }

    fn cache(script: Scripted) -> (RevalidatingCache<(i32, u32), usize>, Arc<Scripted>) {
        let script = Arc::new(script);
        (RevalidatingCache::new(Arc::clone(&script)), script)
    }

    #[tokio::test]
    async fn get_memoizes_per_key() {
        let (cache, script) = cache(Scripted::default());
        assert_eq!(cache.peek(&(2024, 1)), Lookup::Unresolved);
        assert_eq!(cache.get(&(2024, 1)).await, Lookup::Ready(1));
        assert_eq!(cache.get(&(2024, 1)).await, Lookup::Ready(1));
        assert_eq!(script.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);

        // Equal tuples built separately share the slot.
        let key = (2000 + 24, 1);
        assert_eq!(cache.peek(&key), Lookup::Ready(1));
        assert_eq!(cache.get(&(2024, 2)).await, Lookup::Ready(2));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_gets_share_one_fetch() {
        let (cache, script) = cache(Scripted::delays(&[50]));
        let key = (2024, 10);
        let (a, b) = tokio::join!(cache.get(&key), cache.get(&(2024, 10)));
        assert_eq!(a, Lookup::Ready(1));
        assert_eq!(b, Lookup::Ready(1));
        assert_eq!(script.calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.joins, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn peek_reports_pending_without_fetching() {
        let (cache, script) = cache(Scripted::delays(&[50]));
        let key = (2024, 10);
        assert_eq!(cache.peek(&key), Lookup::Unresolved);
        assert_eq!(script.calls.load(Ordering::SeqCst), 0);

        let background = cache.clone();
        let handle = tokio::spawn(async move { background.get(&(2024, 10)).await });
        tokio::task::yield_now().await;
        assert_eq!(cache.peek(&key), Lookup::Pending);
        assert_eq!(handle.await.unwrap(), Lookup::Ready(1));
        assert_eq!(cache.peek(&key), Lookup::Ready(1));
    }

    #[tokio::test]
    async fn failures_stick_until_invalidated() {
        let (cache, script) = cache(Scripted {
            fail_on: vec![1],
            ..Scripted::default()
        });
        let key = (2024, 1);
        let first = cache.get(&key).await;
        assert_eq!(first.error().map(FetchError::message), Some("call 1 failed"));
        // Not retried automatically.
        assert!(cache.get(&key).await.error().is_some());
        assert_eq!(script.calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&key);
        assert_eq!(cache.settled(&key).await, Lookup::Ready(2));
        assert_eq!(cache.get(&key).await, Lookup::Ready(2));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_serves_stale_until_refetch_lands() {
        let (cache, _script) = cache(Scripted::delays(&[0, 100]));
        let key = (2024, 1);
        assert_eq!(cache.get(&key).await, Lookup::Ready(1));

        cache.invalidate(&key);
        assert_eq!(cache.peek(&key), Lookup::Ready(1));
        assert_eq!(cache.get(&key).await, Lookup::Ready(1));

        assert_eq!(cache.settled(&key).await, Lookup::Ready(2));
        assert_eq!(cache.get(&key).await, Lookup::Ready(2));
    }

    #[tokio::test(start_paused = true)]
    async fn older_fetch_cannot_overwrite_newer_one() {
        // Call 1 is slow, call 2 (after the invalidation) is fast.
        let (cache, _script) = cache(Scripted::delays(&[200, 10]));
        let key = (2024, 1);
        let background = cache.clone();
        let first = tokio::spawn(async move { background.get(&(2024, 1)).await });
        tokio::task::yield_now().await;

        cache.invalidate(&key);
        assert_eq!(cache.settled(&key).await, Lookup::Ready(2));

        // The superseded fetch still answers its own caller...
        assert_eq!(first.await.unwrap(), Lookup::Ready(1));
        // ...but never replaces the newer value.
        assert_eq!(cache.peek(&key), Lookup::Ready(2));
    }

    #[tokio::test]
    async fn invalidating_unknown_key_does_nothing() {
        let (cache, script) = cache(Scripted::default());
        cache.invalidate(&(1999, 1));
        assert_eq!(cache.peek(&(1999, 1)), Lookup::Unresolved);
        assert_eq!(cache.settled(&(1999, 1)).await, Lookup::Unresolved);
        assert_eq!(script.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mutate_supersedes_inflight_fetch_and_notifies() {
        let (cache, _script) = cache(Scripted::delays(&[100]));
        let mut events = cache.subscribe();
        let key = (2024, 5);

        let background = cache.clone();
        let pending = tokio::spawn(async move { background.get(&(2024, 5)).await });
        tokio::task::yield_now().await;

        cache.mutate(&key, 42);
        assert_eq!(events.recv().await.unwrap(), key);
        assert_eq!(cache.peek(&key), Lookup::Ready(42));

        assert_eq!(pending.await.unwrap(), Lookup::Ready(1));
        assert_eq!(cache.peek(&key), Lookup::Ready(42));
    }

    #[tokio::test]
    async fn subscribers_hear_about_landed_fetches() {
        let (cache, _script) = cache(Scripted::default());
        let mut events = cache.subscribe();
        cache.get(&(2024, 7)).await;
        assert_eq!(events.recv().await.unwrap(), (2024, 7));
    }

    #[tokio::test]
    async fn evict_forgets_the_key() {
        let (cache, script) = cache(Scripted::default());
        cache.get(&(2024, 1)).await;
        cache.evict(&(2024, 1));
        assert_eq!(cache.peek(&(2024, 1)), Lookup::Unresolved);
        assert_eq!(cache.get(&(2024, 1)).await, Lookup::Ready(2));
        assert_eq!(script.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_from_before_evict_cannot_land_in_the_new_slot() {
        let (cache, _script) = cache(Scripted::delays(&[100, 500]));
        let key = (2024, 9);

        let first = cache.clone();
        let stale = tokio::spawn(async move { first.get(&(2024, 9)).await });
        tokio::task::yield_now().await;
        cache.evict(&key);

        let second = cache.clone();
        let fresh = tokio::spawn(async move { second.get(&(2024, 9)).await });
        tokio::task::yield_now().await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(stale.await.unwrap(), Lookup::Ready(1));
        assert_eq!(cache.peek(&key), Lookup::Pending);

        assert_eq!(fresh.await.unwrap(), Lookup::Ready(2));
        assert_eq!(cache.peek(&key), Lookup::Ready(2));
    }

    #[tokio::test]
    async fn closures_can_be_fetchers() {
        let cache: RevalidatingCache<String, usize> =
            RevalidatingCache::new(fetch_fn(|key: String| async move { Ok::<_, FetchError>(key.len()) }));
        assert_eq!(cache.get(&"four".to_string()).await, Lookup::Ready(4));
    }
}
