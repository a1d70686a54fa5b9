use dashmap::DashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::entry::{Entry, EntryState, ErasedData, Fetcher, FetchFuture, Snapshot};
use crate::error::FetchError;
use crate::key::QueryKey;
use crate::metrics::{CacheMetrics, TimedOperation};
use crate::options::{CacheConfig, QueryOptions};
use crate::result::{QueryResult, QueryStatus};
use crate::retry::RetryPolicy;

/// Process-wide read-through store keyed by [`QueryKey`].
///
/// Fetches run on spawned tokio tasks, so `subscribe`, `refetch`,
/// `invalidate` and `on_refocus` must be called from inside a runtime.
pub struct QueryCache {
    entries: DashMap<QueryKey, Arc<Entry>>,
    config: CacheConfig,
    metrics: Arc<CacheMetrics>,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            metrics: CacheMetrics::new(),
        }
    }

    /// Register interest in `key`.
    ///
    /// Serves what the cache holds right away and starts a fetch when the
    /// entry is missing, stale or failed, unless one is already running or
    /// the subscription is disabled.
    pub fn subscribe<T, F, Fut>(&self, key: QueryKey, fetcher: F, options: QueryOptions) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || -> FetchFuture {
            let fut = fetcher();
            Box::pin(async move { fut.await.map(|data| Arc::new(data) as ErasedData) })
        });

        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_entries {
            self.evict_idle(Instant::now(), self.config.max_entries.saturating_sub(1));
        }

        // The shard guard is held while the entry is updated so a concurrent
        // gc cannot drop it between lookup and registration.
        let slot = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Entry::new(key.clone(), options.clone())));
        let entry = slot.value().clone();
        {
            let mut state = entry.lock();
            state.subscribers += 1;
            state.unsubscribed_at = None;
            state.fetcher = Some(fetcher);
            state.options = options;

            let now = Instant::now();
            if !state.options.enabled {
                self.metrics.record_skipped();
                debug!(key = %key, "Query disabled, not fetching");
            } else if state.in_flight {
                self.metrics.record_coalesced();
                debug!(key = %key, "Joining in-flight fetch");
            } else if state.status == QueryStatus::Error || state.is_stale(now) {
                if state.data.is_some() {
                    self.metrics.record_stale_hit();
                }
                self.start_fetch(&entry, &mut state);
            } else {
                self.metrics.record_fresh_hit();
            }
        }
        drop(slot);

        Subscription {
            rx: entry.watch(),
            entry,
            _marker: PhantomData,
        }
    }

    /// Fetch `key` again regardless of freshness. Returns false when the key
    /// is unknown or its query is disabled.
    pub fn refetch(&self, key: &QueryKey) -> bool {
        let Some(slot) = self.entries.get(key) else {
            return false;
        };
        let entry = slot.value().clone();
        let mut state = entry.lock();
        if !state.options.enabled || state.fetcher.is_none() {
            return false;
        }
        if state.in_flight {
            self.metrics.record_coalesced();
        } else {
            self.start_fetch(&entry, &mut state);
        }
        true
    }

    /// Mark `key` stale; refetch now if anyone is watching it.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let Some(slot) = self.entries.get(key) else {
            return false;
        };
        let entry = slot.value().clone();
        let mut state = entry.lock();
        state.invalidated = true;
        if state.subscribers > 0 && state.options.enabled && !state.in_flight {
            self.start_fetch(&entry, &mut state);
        }
        true
    }

    /// The application regained focus. Refetches watched, stale entries
    /// whose options opt in; returns how many fetches started.
    pub fn on_refocus(&self) -> usize {
        let now = Instant::now();
        let entries: Vec<Arc<Entry>> = self.entries.iter().map(|r| r.value().clone()).collect();

        let mut started = 0;
        for entry in entries {
            let mut state = entry.lock();
            if state.subscribers > 0
                && state.options.enabled
                && state.options.refetch_on_refocus
                && !state.in_flight
                && state.is_stale(now)
            {
                self.start_fetch(&entry, &mut state);
                started += 1;
            }
        }
        started
    }

    /// Current data for `key` without subscribing.
    pub fn get_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let entry = self.entries.get(key)?.value().clone();
        let state = entry.lock();
        state.data.clone().and_then(|d| d.downcast::<T>().ok())
    }

    /// Drop entries that have been unsubscribed for longer than `gc_time`,
    /// then trim idle entries down to `max_entries`.
    pub fn gc(&self) -> usize {
        let now = Instant::now();
        let gc_time = self.config.gc_time;
        // Counted inside retain; subscribers may add keys concurrently.
        let mut expired = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.lock().is_collectable(now, gc_time);
            if !keep {
                expired += 1;
            }
            keep
        });
        let evicted = self.evict_idle(now, self.config.max_entries);

        if expired + evicted > 0 {
            debug!(expired, evicted, remaining = self.entries.len(), "Cache gc");
        }
        expired + evicted
    }

    /// Run [`QueryCache::gc`] every `interval` until the cache is dropped.
    pub fn spawn_gc(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(cache) => {
                        cache.gc();
                    }
                    None => break,
                }
            }
        })
    }

    /// Forget every entry. In-flight fetches finish into detached entries.
    pub fn shutdown(&self) {
        info!(entries = self.entries.len(), "Shutting down query cache");
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for r in self.entries.iter() {
            let state = r.value().lock();
            stats.entries += 1;
            if state.subscribers > 0 {
                stats.subscribed += 1;
            }
            if state.in_flight {
                stats.in_flight += 1;
            }
        }
        stats
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Evict idle entries, longest-unsubscribed first, until at most
    /// `limit` remain or only watched entries are left.
    fn evict_idle(&self, now: Instant, limit: usize) -> usize {
        let len = self.entries.len();
        if len <= limit {
            return 0;
        }

        let mut idle: Vec<(QueryKey, Instant)> = self
            .entries
            .iter()
            .filter_map(|r| {
                let state = r.value().lock();
                if state.subscribers == 0 && !state.in_flight {
                    Some((r.key().clone(), state.unsubscribed_at.unwrap_or(now)))
                } else {
                    None
                }
            })
            .collect();
        idle.sort_by_key(|(_, at)| *at);

        let mut evicted = 0;
        for (key, _) in idle.into_iter().take(len - limit) {
            let removed = self.entries.remove_if(&key, |_, entry| {
                let state = entry.lock();
                state.subscribers == 0 && !state.in_flight
            });
            if removed.is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    /// Must be called with the entry's state locked and no fetch in flight.
    fn start_fetch(&self, entry: &Arc<Entry>, state: &mut EntryState) {
        let Some(fetcher) = state.fetcher.clone() else {
            return;
        };

        state.in_flight = true;
        if state.data.is_none() {
            state.status = QueryStatus::Loading;
        }
        entry.publish(state);

        let policy = RetryPolicy::from_options(&state.options);
        let metrics = self.metrics.clone();
        let entry = entry.clone();
        metrics.record_fetch_started();
        debug!(key = %entry.key, "Fetch started");

        tokio::spawn(async move {
            let name = entry.key.to_string();
            let timer = TimedOperation::start();
            let result = policy
                .retry(&name, |_| fetcher(), |_, _| metrics.record_retry())
                .await;
            metrics.record_fetch(timer.elapsed(), result.is_ok());

            let mut state = entry.lock();
            state.in_flight = false;
            match result {
                Ok(data) => {
                    state.status = QueryStatus::Success;
                    state.data = Some(data);
                    state.error = None;
                    state.fetched_at = Some(Instant::now());
                    state.invalidated = false;
                }
                Err(e) => {
                    state.status = QueryStatus::Error;
                    state.error = Some(e);
                }
            }
            entry.publish(&state);
        });
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Live interest in one key. Dropping it unsubscribes.
pub struct Subscription<T> {
    entry: Arc<Entry>,
    rx: watch::Receiver<Snapshot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub fn key(&self) -> &QueryKey {
        &self.entry.key
    }

    pub fn current(&self) -> QueryResult<T> {
        self.rx.borrow().typed(&self.entry.key)
    }

    /// Wait for the next update.
    pub async fn changed(&mut self) -> QueryResult<T> {
        // The sender lives in `self.entry`, so the channel stays open for as
        // long as this subscription exists.
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().typed(&self.entry.key)
    }

    /// Wait until something can be shown: cached data, a disabled query or a
    /// failure. A background refresh of existing data is not waited for.
    pub async fn loaded(&mut self) -> QueryResult<T> {
        self.wait_until(|result| !result.is_loading()).await
    }

    /// Wait until no fetch is pending for this key.
    pub async fn settled(&mut self) -> QueryResult<T> {
        self.wait_until(QueryResult::is_settled).await
    }

    async fn wait_until(&mut self, done: impl Fn(&QueryResult<T>) -> bool) -> QueryResult<T> {
        let mut current = self.rx.borrow_and_update().typed(&self.entry.key);
        while !done(&current) {
            current = self.changed().await;
        }
        current
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let mut state = self.entry.lock();
        state.subscribers = state.subscribers.saturating_sub(1);
        if state.subscribers == 0 {
            state.unsubscribed_at = Some(Instant::now());
        }
    }
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub subscribed: usize,
    pub in_flight: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    type TestFuture = Pin<Box<dyn Future<Output = Result<Vec<i64>, FetchError>> + Send>>;

    fn fast() -> QueryOptions {
        QueryOptions::default().retry_delay(Duration::ZERO)
    }

    /// Returns `[n]` where `n` is the 1-based call number.
    fn counting(calls: Arc<AtomicUsize>) -> impl Fn() -> TestFuture + Clone + Send + Sync + 'static {
        move || -> TestFuture {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move { Ok(vec![n as i64]) })
        }
    }

    /// Fails the first `failures` calls, then returns `[7]`.
    fn flaky(calls: Arc<AtomicUsize>, failures: usize) -> impl Fn() -> TestFuture + Clone + Send + Sync + 'static {
        move || -> TestFuture {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n < failures {
                    Err(FetchError::NetworkOrBackend("connection reset".to_string()))
                } else {
                    Ok(vec![7i64])
                }
            })
        }
    }

    fn gated(calls: Arc<AtomicUsize>, gate: Arc<Notify>) -> impl Fn() -> TestFuture + Clone + Send + Sync + 'static {
        move || -> TestFuture {
            calls.fetch_add(1, Ordering::SeqCst);
            let gate = gate.clone();
            Box::pin(async move {
                gate.notified().await;
                Ok(vec![1i64, 2, 3])
            })
        }
    }

    #[tokio::test]
    async fn test_first_subscription_loads_then_succeeds() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut sub = cache.subscribe("companies".into(), counting(calls.clone()), fast());
        assert!(sub.current().is_loading());
        assert!(sub.current().data.is_none());

        let result = sub.settled().await;
        assert!(result.is_success());
        assert_eq!(result.rows(), &[1]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_subscribers_share_one_fetch() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let fetch = gated(calls.clone(), gate.clone());

        let mut first = cache.subscribe::<Vec<i64>, _, _>("calls".into(), fetch.clone(), fast());
        let mut second = cache.subscribe::<Vec<i64>, _, _>("calls".into(), fetch.clone(), fast());
        assert!(second.current().is_loading());
        assert_eq!(cache.stats().in_flight, 1);

        gate.notify_one();
        let a = first.settled().await;
        let b = second.settled().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.rows(), &[1, 2, 3]);
        assert_eq!(b.rows(), &[1, 2, 3]);
        assert_eq!(cache.metrics().snapshot().coalesced, 1);
    }

    #[tokio::test]
    async fn test_fresh_entry_is_served_without_fetch() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut sub = cache.subscribe::<Vec<i64>, _, _>("documents".into(), counting(calls.clone()), fast());
        sub.settled().await;
        drop(sub);

        let again = cache.subscribe::<Vec<i64>, _, _>("documents".into(), counting(calls.clone()), fast());
        let result = again.current();
        assert!(result.is_success());
        assert!(!result.is_fetching);
        assert_eq!(result.rows(), &[1]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_at_exact_stale_time_is_still_fresh() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = fast().stale_time(Duration::from_secs(1));

        let mut sub = cache.subscribe::<Vec<i64>, _, _>("calls".into(), counting(calls.clone()), options.clone());
        sub.settled().await;

        tokio::time::advance(Duration::from_secs(1)).await;
        let again = cache.subscribe::<Vec<i64>, _, _>("calls".into(), counting(calls.clone()), options);
        assert!(!again.current().is_fetching);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_serves_old_data_while_refreshing() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = fast().stale_time(Duration::from_secs(1));

        let mut sub = cache.subscribe::<Vec<i64>, _, _>("calls".into(), counting(calls.clone()), options.clone());
        sub.settled().await;
        drop(sub);

        tokio::time::advance(Duration::from_secs(2)).await;
        let mut again = cache.subscribe::<Vec<i64>, _, _>("calls".into(), counting(calls.clone()), options);

        let immediate = again.current();
        assert!(immediate.is_success());
        assert!(immediate.is_fetching);
        assert_eq!(immediate.rows(), &[1]);

        let mut seen = Vec::new();
        loop {
            let update = again.changed().await;
            seen.push(update.status);
            if update.is_settled() {
                assert_eq!(update.rows(), &[2]);
                break;
            }
        }
        assert!(seen.iter().all(|s| *s == QueryStatus::Success));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.metrics().snapshot().stale_hits, 1);
    }

    #[tokio::test]
    async fn test_disabled_query_never_fetches() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let sub = cache.subscribe::<Vec<i64>, _, _>(
            QueryKey::new("call-details").with(0),
            counting(calls.clone()),
            fast().enabled(false),
        );
        tokio::task::yield_now().await;

        let result = sub.current();
        assert!(result.is_idle());
        assert!(result.rows().is_empty());
        assert!(result.error.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!cache.refetch(sub.key()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_subscription_serves_stale_data_without_fetching() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("call-details").with(5);
        let options = fast().stale_time(Duration::from_secs(1));

        let mut sub = cache.subscribe::<Vec<i64>, _, _>(key.clone(), counting(calls.clone()), options.clone());
        sub.settled().await;
        drop(sub);

        tokio::time::advance(Duration::from_secs(2)).await;
        let disabled = cache.subscribe::<Vec<i64>, _, _>(key, counting(calls.clone()), options.enabled(false));
        tokio::task::yield_now().await;

        let result = disabled.current();
        assert!(result.is_success());
        assert!(!result.is_fetching);
        assert_eq!(result.rows(), &[1]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.metrics().snapshot().fetches_started, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loaded_does_not_wait_for_background_refresh() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let options = fast().stale_time(Duration::from_secs(1));

        let mut first = cache.subscribe::<Vec<i64>, _, _>("calls".into(), gated(calls.clone(), gate.clone()), options.clone());
        gate.notify_one();
        assert_eq!(first.loaded().await.rows(), &[1, 2, 3]);

        tokio::time::advance(Duration::from_secs(2)).await;
        let mut second = cache.subscribe::<Vec<i64>, _, _>("calls".into(), gated(calls.clone(), gate.clone()), options);
        let result = second.loaded().await;
        assert!(result.is_success());
        assert!(result.is_fetching);
        assert_eq!(result.rows(), &[1, 2, 3]);

        gate.notify_one();
        assert!(!second.settled().await.is_fetching);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_gc_races_with_new_subscriptions() {
        let cache = Arc::new(QueryCache::new(CacheConfig {
            gc_time: Duration::ZERO,
            max_entries: 1000,
        }));
        let calls = Arc::new(AtomicUsize::new(0));
        let subscribing = Arc::new(std::sync::atomic::AtomicBool::new(true));

        let subscriber = {
            let cache = cache.clone();
            let subscribing = subscribing.clone();
            std::thread::spawn(move || {
                for i in 0..500i64 {
                    let sub = cache.subscribe::<Vec<i64>, _, _>(
                        QueryKey::new("call-details").with(i),
                        counting(calls.clone()),
                        fast().enabled(false),
                    );
                    drop(sub);
                }
                subscribing.store(false, Ordering::SeqCst);
            })
        };
        let collector = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                let mut collected = 0;
                while subscribing.load(Ordering::SeqCst) {
                    collected += cache.gc();
                }
                collected
            })
        };

        subscriber.join().unwrap();
        let collected = collector.join().unwrap() + cache.gc();
        assert_eq!(collected, 500);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_error_after_retries_exhausted() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut sub = cache.subscribe::<Vec<i64>, _, _>("appointments".into(), flaky(calls.clone(), 10), fast());
        let result = sub.settled().await;

        assert!(result.is_error());
        assert_eq!(result.error.as_ref().map(|e| e.message()), Some("connection reset"));
        assert!(result.data.is_none());
        // one attempt plus one retry
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_success_hides_intermediate_error() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut sub = cache.subscribe::<Vec<i64>, _, _>("rag-chunks".into(), flaky(calls.clone(), 1), fast());
        let mut seen = vec![sub.current().status];
        loop {
            let update = sub.changed().await;
            seen.push(update.status);
            if update.is_settled() {
                assert_eq!(update.rows(), &[7]);
                assert!(update.error.is_none());
                break;
            }
        }

        assert!(!seen.contains(&QueryStatus::Error));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.metrics().snapshot().retries, 1);
    }

    #[tokio::test]
    async fn test_error_kept_until_next_success() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("companies");

        // two failures exhaust retry_count = 1, the third call succeeds
        let mut sub = cache.subscribe::<Vec<i64>, _, _>(key.clone(), flaky(calls.clone(), 2), fast());
        assert!(sub.settled().await.is_error());

        assert!(cache.refetch(&key));
        let during = sub.current();
        assert!(during.error.is_some());
        assert!(during.is_fetching);

        let after = sub.settled().await;
        assert!(after.is_success());
        assert!(after.error.is_none());
        assert_eq!(after.rows(), &[7]);
    }

    #[tokio::test]
    async fn test_new_subscription_retries_failed_entry() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut sub = cache.subscribe::<Vec<i64>, _, _>("calls".into(), flaky(calls.clone(), 2), fast());
        assert!(sub.settled().await.is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let mut again = cache.subscribe::<Vec<i64>, _, _>("calls".into(), flaky(calls.clone(), 2), fast());
        assert!(again.settled().await.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_completes_after_last_subscriber_leaves() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let key = QueryKey::new("documents");

        let sub = cache.subscribe::<Vec<i64>, _, _>(key.clone(), gated(calls.clone(), gate.clone()), fast());
        drop(sub);
        gate.notify_one();

        for _ in 0..10 {
            if cache.get_data::<Vec<i64>>(&key).is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.get_data::<Vec<i64>>(&key).as_deref(), Some(&vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_invalidate_refetches_watched_entry() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("companies");

        let mut sub = cache.subscribe::<Vec<i64>, _, _>(key.clone(), counting(calls.clone()), fast());
        sub.settled().await;

        assert!(cache.invalidate(&key));
        assert_eq!(sub.settled().await.rows(), &[2]);
        assert!(!cache.invalidate(&QueryKey::new("unknown")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refocus_only_refetches_opted_in_entries() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = fast().stale_time(Duration::ZERO);

        let mut plain = cache.subscribe::<Vec<i64>, _, _>("calls".into(), counting(calls.clone()), options.clone());
        let mut opted = cache.subscribe::<Vec<i64>, _, _>(
            "documents".into(),
            counting(calls.clone()),
            options.refetch_on_refocus(true),
        );
        plain.settled().await;
        opted.settled().await;

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.on_refocus(), 1);
        opted.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gc_drops_entries_after_gc_time() {
        let cache = QueryCache::new(CacheConfig {
            gc_time: Duration::from_secs(60),
            max_entries: 100,
        });
        let calls = Arc::new(AtomicUsize::new(0));

        let mut sub = cache.subscribe::<Vec<i64>, _, _>("calls".into(), counting(calls.clone()), fast());
        sub.settled().await;
        assert_eq!(cache.gc(), 0);

        drop(sub);
        assert_eq!(cache.gc(), 0);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.gc(), 1);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_entries_evicts_oldest_idle_entry() {
        let cache = QueryCache::new(CacheConfig {
            gc_time: Duration::from_secs(3600),
            max_entries: 2,
        });
        let calls = Arc::new(AtomicUsize::new(0));

        for name in ["companies", "calls"] {
            let mut sub = cache.subscribe::<Vec<i64>, _, _>(name.into(), counting(calls.clone()), fast());
            sub.settled().await;
            drop(sub);
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        let mut sub = cache.subscribe::<Vec<i64>, _, _>("documents".into(), counting(calls.clone()), fast());
        sub.settled().await;

        assert_eq!(cache.stats().entries, 2);
        assert!(cache.get_data::<Vec<i64>>(&"companies".into()).is_none());
        assert!(cache.get_data::<Vec<i64>>(&"calls".into()).is_some());
    }
}
