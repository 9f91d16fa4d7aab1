// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Bounded, time-expiring session cache
//!
//! Maps the exact user-supplied page URL to a live browser session. The
//! cache owns disposal: every eviction path (capacity pressure, TTL
//! expiry, explicit removal, sweep) runs the entry's disposal hook before
//! the slot is considered free. Disposal failures are logged, never
//! propagated.
//!
//! Keys are not normalized. Two spellings of the same page (trailing
//! slash, query order) get separate entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;

/// Disposal hook run for every evicted entry.
///
/// Best-effort: the outcome is reported by the cache, not thrown. An
/// implementation must tolerate being invoked at most once per eviction
/// and concurrently with outstanding clones of the entry.
#[async_trait]
pub trait Dispose: Send + Sync + 'static {
    async fn dispose(&self) -> Result<()>;
}

struct Entry<T> {
    value: Arc<T>,
    refreshed_at: Instant,
}

/// Bounded associative store of live sessions
pub struct SessionCache<T: Dispose> {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<T>>>,
    /// Per-key creation locks so concurrent misses for one URL join the
    /// same in-flight session instead of racing to build two.
    creation_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<T: Dispose> SessionCache<T> {
    /// Create a cache with the given capacity and entry TTL
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: Mutex::new(HashMap::new()),
            creation_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a live entry, expiring it passively if its TTL has passed
    pub async fn get(&self, key: &str) -> Option<Arc<T>> {
        let expired = {
            let mut entries = self.entries.lock();
            let fresh = entries
                .get(key)
                .map(|e| e.refreshed_at.elapsed() <= self.ttl);
            match fresh {
                Some(true) => return entries.get(key).map(|e| e.value.clone()),
                Some(false) => entries.remove(key),
                None => None,
            }
        };

        if let Some(entry) = expired {
            self.dispose_entry(key, entry.value).await;
        }
        None
    }

    /// Insert only if no live entry exists for the key.
    ///
    /// Returns `true` when the value was stored (TTL starts fresh) and
    /// `false` when a live entry already held the slot; the caller keeps
    /// ownership of the rejected value and is responsible for it. When
    /// the cache is full the stalest entry is evicted first.
    pub async fn insert_if_absent(&self, key: &str, value: Arc<T>) -> bool {
        let (stored, doomed) = {
            let mut entries = self.entries.lock();
            let live = entries
                .get(key)
                .map_or(false, |e| e.refreshed_at.elapsed() <= self.ttl);
            if live {
                (false, Vec::new())
            } else {
                let mut doomed: Vec<(String, Arc<T>)> = entries
                    .remove(key)
                    .map(|e| (key.to_string(), e.value))
                    .into_iter()
                    .collect();

                if entries.len() >= self.capacity {
                    let stalest = entries
                        .iter()
                        .min_by_key(|(_, e)| e.refreshed_at)
                        .map(|(k, _)| k.clone());
                    if let Some(stalest) = stalest {
                        if let Some(entry) = entries.remove(&stalest) {
                            doomed.push((stalest, entry.value));
                        }
                    }
                }

                entries.insert(
                    key.to_string(),
                    Entry {
                        value,
                        refreshed_at: Instant::now(),
                    },
                );
                (true, doomed)
            }
        };

        for (doomed_key, value) in doomed {
            self.dispose_entry(&doomed_key, value).await;
        }
        stored
    }

    /// Explicitly evict one key, disposing its entry if present
    pub async fn remove(&self, key: &str) {
        let entry = self.entries.lock().remove(key);
        if let Some(entry) = entry {
            self.dispose_entry(key, entry.value).await;
        }
    }

    /// Sweep all expired entries and idle creation locks
    pub async fn prune(&self) {
        let expired: Vec<(String, Arc<T>)> = {
            let mut entries = self.entries.lock();
            let keys: Vec<String> = entries
                .iter()
                .filter(|(_, e)| e.refreshed_at.elapsed() > self.ttl)
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter()
                .filter_map(|k| entries.remove(&k).map(|e| (k, e.value)))
                .collect()
        };

        for (key, value) in expired {
            self.dispose_entry(&key, value).await;
        }

        self.creation_locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// The per-key lock guarding session creation for `key`.
    ///
    /// Concurrent cache misses for the same URL serialize on this lock;
    /// whoever wins builds the session, the rest re-check the cache.
    pub fn creation_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.creation_locks
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// URLs currently resident (live entries only)
    pub fn cached_urls(&self) -> Vec<String> {
        let entries = self.entries.lock();
        entries
            .iter()
            .filter(|(_, e)| e.refreshed_at.elapsed() <= self.ttl)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Number of resident entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Evict and dispose everything
    pub async fn clear(&self) {
        let drained: Vec<(String, Arc<T>)> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(k, e)| (k, e.value)).collect()
        };
        for (key, value) in drained {
            self.dispose_entry(&key, value).await;
        }
    }

    async fn dispose_entry(&self, key: &str, value: Arc<T>) {
        debug!(key, "disposing cached session");
        if let Err(e) = value.dispose().await {
            warn!(key, error = %e, "session disposal failed; leaking browser resources");
        }
    }
}

/// Run `prune` on a fixed interval, independent of request traffic.
///
/// The task holds only a weak reference; dropping the cache stops it.
pub fn spawn_pruner<T: Dispose>(cache: &Arc<SessionCache<T>>, every: Duration) -> JoinHandle<()> {
    let weak = Arc::downgrade(cache);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match weak.upgrade() {
                Some(cache) => cache.prune().await,
                None => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Probe {
        disposals: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Dispose for Probe {
        async fn dispose(&self) -> Result<()> {
            self.disposals.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl Dispose for FailingProbe {
        async fn dispose(&self) -> Result<()> {
            Err(crate::error::Error::other("close failed"))
        }
    }

    fn probe(counter: &Arc<AtomicUsize>) -> Arc<Probe> {
        Arc::new(Probe {
            disposals: counter.clone(),
        })
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = SessionCache::new(4, Duration::from_secs(60));
        let disposals = Arc::new(AtomicUsize::new(0));

        assert!(cache.insert_if_absent("http://a", probe(&disposals)).await);
        assert!(cache.get("http://a").await.is_some());
        assert!(cache.get("http://b").await.is_none());
    }

    #[tokio::test]
    async fn test_insert_only_if_absent() {
        let cache = SessionCache::new(4, Duration::from_secs(60));
        let disposals = Arc::new(AtomicUsize::new(0));

        let first = probe(&disposals);
        assert!(cache.insert_if_absent("http://a", first.clone()).await);
        assert!(!cache.insert_if_absent("http://a", probe(&disposals)).await);

        // The loser was returned to the caller, not disposed by the cache.
        assert_eq!(disposals.load(Ordering::SeqCst), 0);
        let resident = cache.get("http://a").await.unwrap();
        assert!(Arc::ptr_eq(&resident, &first));
    }

    #[tokio::test]
    async fn test_capacity_bound_evicts_stalest() {
        let cache = SessionCache::new(3, Duration::from_secs(60));
        let disposals = Arc::new(AtomicUsize::new(0));

        for i in 0..10 {
            let key = format!("http://site-{}", i);
            assert!(cache.insert_if_absent(&key, probe(&disposals)).await);
            // Distinct refresh instants so the stalest entry is unambiguous.
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert_eq!(cache.len(), 3);
        assert_eq!(disposals.load(Ordering::SeqCst), 7);
        // The most recent inserts survive.
        assert!(cache.get("http://site-9").await.is_some());
        assert!(cache.get("http://site-0").await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry_disposes_exactly_once() {
        let cache = SessionCache::new(4, Duration::from_millis(20));
        let disposals = Arc::new(AtomicUsize::new(0));

        cache.insert_if_absent("http://a", probe(&disposals)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cache.get("http://a").await.is_none());
        assert_eq!(disposals.load(Ordering::SeqCst), 1);

        // Further lookups and sweeps must not re-dispose.
        assert!(cache.get("http://a").await.is_none());
        cache.prune().await;
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prune_sweeps_expired() {
        let cache = SessionCache::new(8, Duration::from_millis(20));
        let disposals = Arc::new(AtomicUsize::new(0));

        cache.insert_if_absent("http://a", probe(&disposals)).await;
        cache.insert_if_absent("http://b", probe(&disposals)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.insert_if_absent("http://c", probe(&disposals)).await;

        cache.prune().await;

        assert_eq!(disposals.load(Ordering::SeqCst), 2);
        assert_eq!(cache.cached_urls(), vec!["http://c".to_string()]);
    }

    #[tokio::test]
    async fn test_expired_slot_can_be_reinserted() {
        let cache = SessionCache::new(4, Duration::from_millis(20));
        let disposals = Arc::new(AtomicUsize::new(0));

        cache.insert_if_absent("http://a", probe(&disposals)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        // Expired entry is replaced and the old one disposed.
        assert!(cache.insert_if_absent("http://a", probe(&disposals)).await);
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
        assert!(cache.get("http://a").await.is_some());
    }

    #[tokio::test]
    async fn test_remove_disposes() {
        let cache = SessionCache::new(4, Duration::from_secs(60));
        let disposals = Arc::new(AtomicUsize::new(0));

        cache.insert_if_absent("http://a", probe(&disposals)).await;
        cache.remove("http://a").await;

        assert_eq!(disposals.load(Ordering::SeqCst), 1);
        assert!(cache.get("http://a").await.is_none());

        // Removing an absent key is a no-op.
        cache.remove("http://a").await;
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disposal_failure_is_swallowed() {
        let cache = SessionCache::new(4, Duration::from_secs(60));
        cache
            .insert_if_absent("http://a", Arc::new(FailingProbe))
            .await;
        cache.remove("http://a").await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_keys_are_not_normalized() {
        let cache = SessionCache::new(4, Duration::from_secs(60));
        let disposals = Arc::new(AtomicUsize::new(0));

        cache
            .insert_if_absent("http://a.example/page", probe(&disposals))
            .await;
        cache
            .insert_if_absent("http://a.example/page/", probe(&disposals))
            .await;

        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_creation_lock_joins_concurrent_misses() {
        let cache: Arc<SessionCache<Probe>> =
            Arc::new(SessionCache::new(4, Duration::from_secs(60)));
        let disposals = Arc::new(AtomicUsize::new(0));
        let built = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let disposals = disposals.clone();
            let built = built.clone();
            tasks.push(tokio::spawn(async move {
                let lock = cache.creation_lock("http://a");
                let _guard = lock.lock().await;
                if cache.get("http://a").await.is_none() {
                    built.fetch_add(1, Ordering::SeqCst);
                    let value = Arc::new(Probe {
                        disposals: disposals.clone(),
                    });
                    assert!(cache.insert_if_absent("http://a", value).await);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Exactly one task built a session; the rest joined it.
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(disposals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prune_releases_idle_creation_locks() {
        let cache: SessionCache<Probe> = SessionCache::new(4, Duration::from_secs(60));

        {
            let lock = cache.creation_lock("http://a");
            let _guard = lock.lock().await;
            assert_eq!(cache.creation_locks.lock().len(), 1);
        }

        cache.prune().await;
        assert!(cache.creation_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_pruner_task_stops_with_cache() {
        let cache: Arc<SessionCache<Probe>> =
            Arc::new(SessionCache::new(4, Duration::from_millis(10)));
        let handle = spawn_pruner(&cache, Duration::from_millis(10));

        drop(cache);
        // The task notices the dead weak reference on its next tick.
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("pruner should stop")
            .unwrap();
    }
}
