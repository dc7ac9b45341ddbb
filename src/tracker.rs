//! Per-document coalescing of conflict scans.
//!
//! # Architecture
//!
//! ```text
//! get_conflicts(doc)
//!       │
//!       ├─► no uri? ──► precheck + scan directly, nothing cached
//!       │
//!       └─► find-or-create Delayer for the document key
//!               │
//!               └─► trigger(precheck + scan)
//!                       │
//!                       ├─► every caller in the window gets the same result
//!                       │
//!                       └─► delayer idle, nothing queued ──► evict entry
//! ```
//!
//! Entries live only while a cycle is pending, in flight, or queued behind one in
//! flight. Once a scan settles with nothing queued (success, failure or panic alike)
//! the entry is evicted, so the next request starts a new cycle instead of reusing
//! the previous result.
//!
//! # Thread Safety
//!
//! The cache is a `DashMap`; find-or-create goes through the entry API so lookup and
//! insert are atomic per key, and the trigger happens under the same shard lock.
//! Each entry carries a unique id and eviction uses `remove_if`, so a settling cycle
//! never removes an entry that replaced it. The idle hook holds only a `Weak`
//! reference so entries do not keep the tracker alive.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::config::TrackerSettings;
use crate::delayer::Delayer;
use crate::document::{DocumentKey, TrackedDocument};
use crate::error::{TrackerError, TrackerResult};
use crate::observer::{LogObserver, ScanObserver, ScanPhase};
use crate::scanner::ConflictScanner;

/// Logging target for the tracker.
const LOG_TARGET: &str = "conflict_tracker::tracker";

/// A pending cycle for one document.
struct CacheEntry<R> {
    id: u64,
    delayer: Delayer<Vec<R>>,
}

/// Cache state shared with the producers running inside delayers.
struct Shared<S: ConflictScanner> {
    scanner: S,
    observer: Option<Arc<dyn ScanObserver>>,
    cache: DashMap<DocumentKey, CacheEntry<S::Region>>,
    next_entry_id: AtomicU64,
    disposed: AtomicBool,
}

/// Debounced, per-document conflict lookup in front of a [`ConflictScanner`].
///
/// Must be used from within a tokio runtime.
pub struct ConflictTracker<S: ConflictScanner> {
    shared: Arc<Shared<S>>,
    debounce: Duration,
}

impl<S: ConflictScanner> ConflictTracker<S> {
    /// Create a tracker with default settings and the logging observer.
    pub fn new(scanner: S) -> Self {
        Self::with_settings(scanner, TrackerSettings::default())
    }

    /// Create a tracker with explicit settings.
    pub fn with_settings(scanner: S, settings: TrackerSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                scanner,
                observer: Some(Arc::new(LogObserver)),
                cache: DashMap::new(),
                next_entry_id: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
            debounce: settings.debounce(),
        }
    }

    /// Replace the timing observer.
    ///
    /// Only valid before the tracker is shared.
    pub fn with_observer(self, observer: Arc<dyn ScanObserver>) -> Self {
        self.map_observer(Some(observer))
    }

    /// Disable timing entirely.
    pub fn without_observer(self) -> Self {
        self.map_observer(None)
    }

    fn map_observer(mut self, observer: Option<Arc<dyn ScanObserver>>) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.observer = observer,
            None => log::warn!(
                target: LOG_TARGET,
                "Observer change ignored: tracker is already in use"
            ),
        }
        self
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn scanner(&self) -> &S {
        &self.shared.scanner
    }

    /// Conflict regions of `document`, coalesced with other requests for the same
    /// document made within the debounce window.
    ///
    /// The request joins its cycle when this is called, not when the returned
    /// future is first polled. Documents without a URI are scanned directly and
    /// never cached.
    pub fn get_conflicts(
        &self,
        document: Arc<S::Document>,
    ) -> impl Future<Output = TrackerResult<Vec<S::Region>>> + Send + use<S> {
        let disposed = self.is_disposed();
        let shared = Arc::clone(&self.shared);
        let pending = match document.key() {
            Some(key) if !disposed => Some(self.trigger_for(key, Arc::clone(&document))),
            _ => None,
        };

        async move {
            if disposed {
                return Err(TrackerError::Disposed);
            }
            match pending {
                Some(pending) => pending.await,
                None => {
                    log::trace!(
                        target: LOG_TARGET,
                        "Document has no uri, scanning without cache"
                    );
                    shared.conflicts_or_empty(None, &document).await
                }
            }
        }
    }

    /// Join the live cycle for `key`, creating its entry if needed.
    ///
    /// The map shard stays locked across lookup-or-insert and the trigger, so a
    /// settling cycle cannot evict the entry between the two.
    fn trigger_for(
        &self,
        key: DocumentKey,
        document: Arc<S::Document>,
    ) -> impl Future<Output = TrackerResult<Vec<S::Region>>> + Send + use<S> {
        let shared = Arc::clone(&self.shared);
        let producer_key = key.clone();
        let producer = move || async move {
            shared
                .conflicts_or_empty(Some(&producer_key), &document)
                .await
        };

        match self.shared.cache.entry(key) {
            Entry::Occupied(occupied) => occupied.get().delayer.trigger(producer),
            Entry::Vacant(vacant) => {
                let id = self.shared.next_entry_id.fetch_add(1, Ordering::Relaxed);
                let key = vacant.key().clone();
                log::trace!(target: LOG_TARGET, "Created cache entry for {}", key);

                let weak = Arc::downgrade(&self.shared);
                let evict_key = key.clone();
                let delayer = Delayer::with_idle_hook(self.debounce, key.as_str(), move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.evict(&evict_key, id);
                    }
                });
                let pending = delayer.trigger(producer);
                vacant.insert(CacheEntry { id, delayer });
                pending
            }
        }
    }

    /// Drop any pending cycle for `document`.
    ///
    /// Callers still waiting on a cycle that has not started receive
    /// [`TrackerError::Cancelled`]. A no-op for unknown or uncacheable documents.
    pub fn forget(&self, document: &S::Document) {
        let Some(key) = document.key() else {
            return;
        };

        if let Some((_, entry)) = self.shared.cache.remove(&key) {
            entry.delayer.cancel();
            log::debug!(target: LOG_TARGET, "Forgot pending cycle for {}", key);
        }
    }

    /// Clear every pending cycle. The tracker rejects further requests afterward.
    ///
    /// Calling this more than once is harmless.
    pub fn dispose(&self) {
        self.shared.disposed.store(true, Ordering::SeqCst);

        self.shared.cache.retain(|_, entry| {
            entry.delayer.cancel();
            false
        });

        log::debug!(target: LOG_TARGET, "Disposed conflict tracker");
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// Number of documents with a cycle pending or in flight.
    pub fn pending_count(&self) -> usize {
        self.shared.cache.len()
    }

    /// Whether `document` currently has a cache entry.
    pub fn contains(&self, document: &S::Document) -> bool {
        document
            .key()
            .is_some_and(|key| self.shared.cache.contains_key(&key))
    }
}

impl<S: ConflictScanner> Shared<S> {
    /// Precheck, then scan only when the precheck allows a conflict.
    async fn conflicts_or_empty(
        &self,
        key: Option<&DocumentKey>,
        document: &S::Document,
    ) -> TrackerResult<Vec<S::Region>> {
        let contains_conflict = self
            .timed(key, ScanPhase::Precheck, self.scanner.may_contain_conflict(document))
            .await?;

        if !contains_conflict {
            return Ok(Vec::new());
        }

        let conflicts = self
            .timed(key, ScanPhase::Scan, self.scanner.scan(document))
            .await?;
        Ok(conflicts)
    }

    async fn timed<F: Future>(
        &self,
        key: Option<&DocumentKey>,
        phase: ScanPhase,
        step: F,
    ) -> F::Output {
        let Some(observer) = &self.observer else {
            return step.await;
        };

        let start = Instant::now();
        let output = step.await;
        observer.record(key, phase, start.elapsed());
        output
    }

    /// Remove the entry for `key` if it is still the one with `id` and nothing
    /// was triggered on it since it went idle.
    fn evict(&self, key: &DocumentKey, id: u64) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let removed = self
            .cache
            .remove_if(key, |_, entry| entry.id == id && !entry.delayer.is_triggered());
        if removed.is_some() {
            log::trace!(target: LOG_TARGET, "Evicted settled cache entry for {}", key);
        }
    }
}

impl<S: ConflictScanner> Drop for ConflictTracker<S> {
    fn drop(&mut self) {
        // Producers hold their own handle to the shared state; stop their timers.
        if !self.is_disposed() {
            self.dispose();
        }
    }
}
