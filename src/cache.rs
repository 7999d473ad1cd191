//! Per-run memoization of upstream metric results.
//!
//! An [`ArtifactCache`] is created by the caller for one analysis run and
//! dropped with it; nothing is cached globally. Entries are keyed by a
//! [`CacheKey`] that covers trace content, settings content and simulator
//! identity.
//!
//! Concurrent requests for the same key collapse into one computation: the
//! first request computes while later ones wait for its value. Failures are
//! never cached. When the computing request fails or is dropped, the waiters
//! wake up and the next one computes again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures::channel::oneshot;
use log::debug;

use crate::metrics::{FcpProvider, FinalMetricResult, MetricContext, MetricError, Speedline, SpeedlineProvider};
use crate::trace::TraceData;

/// Identity of one (trace, settings, simulator) computation.
///
/// Names are kept for logging; equality is decided by all three fields, so two
/// traces or presets that share a name but differ in content get separate
/// entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub trace_id: String,
    pub settings_name: String,
    /// Hash over trace content, settings content and simulator identity
    pub fingerprint: u64,
}

impl CacheKey {
    pub fn new(trace_id: &str, settings_name: &str, fingerprint: u64) -> Self {
        Self {
            trace_id: trace_id.to_string(),
            settings_name: settings_name.to_string(),
            fingerprint,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}#{:016x}", self.trace_id, self.settings_name, self.fingerprint)
    }
}

/// State of one cache entry
#[derive(Debug)]
enum Slot<V> {
    Ready(V),
    /// A computation is running; waiters receive its value on success
    Pending(Vec<oneshot::Sender<V>>),
}

/// Memoized values for one analysis run
#[derive(Debug)]
pub struct ArtifactCache<V> {
    entries: Mutex<HashMap<CacheKey, Slot<V>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<V> Default for ArtifactCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }
}

/// What a request does after inspecting the entry for its key
enum Lookup<V> {
    Hit(V),
    Wait(oneshot::Receiver<V>),
    Compute,
}

impl<V: Clone> ArtifactCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Slot<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        match self.lock().get(key) {
            Some(Slot::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Store `value`, handing it to any request waiting on `key`
    pub fn insert(&self, key: CacheKey, value: V) {
        let previous = self.lock().insert(key, Slot::Ready(value.clone()));
        if let Some(Slot::Pending(waiters)) = previous {
            for waiter in waiters {
                let _ = waiter.send(value.clone());
            }
        }
    }

    /// Number of stored values, not counting computations in flight
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    fn lookup(&self, key: &CacheKey) -> Lookup<V> {
        let mut entries = self.lock();
        match entries.get_mut(key) {
            Some(Slot::Ready(value)) => Lookup::Hit(value.clone()),
            Some(Slot::Pending(waiters)) => {
                let (sender, receiver) = oneshot::channel();
                waiters.push(sender);
                Lookup::Wait(receiver)
            }
            None => {
                entries.insert(key.clone(), Slot::Pending(Vec::new()));
                Lookup::Compute
            }
        }
    }

    /// Return the cached value for `key`, or await `compute` and remember its
    /// result when it succeeds.
    ///
    /// A request that finds a computation already running for `key` waits
    /// for it instead of calling `compute`.
    pub async fn get_or_compute<F, Fut>(&self, key: CacheKey, compute: F) -> Result<V, MetricError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, MetricError>>,
    {
        loop {
            match self.lookup(&key) {
                Lookup::Hit(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!("Cache hit for {}", key);
                    return Ok(value);
                }
                Lookup::Wait(receiver) => {
                    debug!("Waiting on in-flight computation for {}", key);
                    if let Ok(value) = receiver.await {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(value);
                    }
                    // the computing request failed or was dropped
                }
                Lookup::Compute => break,
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache miss for {}", key);
        let pending = PendingEntry {
            cache: self,
            key: Some(key),
        };
        let value = compute().await?;
        pending.complete(value.clone());
        Ok(value)
    }
}

/// Pending slot owned by the request computing it.
///
/// Dropping it without completing removes the slot, which wakes every waiter
/// with a cancellation.
struct PendingEntry<'a, V: Clone> {
    cache: &'a ArtifactCache<V>,
    key: Option<CacheKey>,
}

impl<V: Clone> PendingEntry<'_, V> {
    fn complete(mut self, value: V) {
        if let Some(key) = self.key.take() {
            self.cache.insert(key, value);
        }
    }
}

impl<V: Clone> Drop for PendingEntry<'_, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut entries = self.cache.lock();
            if matches!(entries.get(&key), Some(Slot::Pending(_))) {
                entries.remove(&key);
            }
        }
    }
}

/// Speedline provider memoized per (trace, settings)
pub struct CachedSpeedline<P> {
    inner: P,
    cache: ArtifactCache<Speedline>,
}

impl<P> CachedSpeedline<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: ArtifactCache::default(),
        }
    }

    pub fn cache(&self) -> &ArtifactCache<Speedline> {
        &self.cache
    }
}

#[async_trait]
impl<P: SpeedlineProvider> SpeedlineProvider for CachedSpeedline<P> {
    async fn request(&self, trace: &TraceData, context: &MetricContext<'_>) -> Result<Speedline, MetricError> {
        self.cache
            .get_or_compute(context.cache_key(trace), || self.inner.request(trace, context))
            .await
    }
}

/// FCP provider memoized per (trace, settings)
pub struct CachedFcp<P> {
    inner: P,
    cache: ArtifactCache<FinalMetricResult>,
}

impl<P> CachedFcp<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: ArtifactCache::default(),
        }
    }

    pub fn cache(&self) -> &ArtifactCache<FinalMetricResult> {
        &self.cache
    }
}

#[async_trait]
impl<P: FcpProvider> FcpProvider for CachedFcp<P> {
    async fn request(&self, trace: &TraceData, context: &MetricContext<'_>)
        -> Result<FinalMetricResult, MetricError>
    {
        self.cache
            .get_or_compute(context.cache_key(trace), || self.inner.request(trace, context))
            .await
    }
}
