// Bounded-concurrency, coalescing, cancellable media cache.
//
// `load` is deliberately infallible: network failures settle as a
// `Degraded` outcome and cancellation settles as `Cancelled`, so UI code
// never has to treat an unreliable media host as an exceptional path. The
// only faults that escape are genuine programming errors (poisoned state),
// which panic.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::item::{LoadOutcome, MediaItem, MediaKind, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use super::transport::{HttpTransport, MediaTransport, ProgressFn, TransportError};

/// Tuning knobs for a cache instance
#[derive(Debug, Clone)]
pub struct MediaCacheConfig {
    /// Maximum number of resolved entries held at once
    pub capacity: usize,
    /// Maximum simultaneous in-flight transports; further requests wait FIFO
    pub max_concurrent: usize,
    /// Ceiling on dimension decoding before defaults are substituted
    pub dimension_timeout: Duration,
    /// Directory receiving downloaded payloads
    pub cache_dir: PathBuf,
}

impl Default for MediaCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 30,
            max_concurrent: 5,
            dimension_timeout: Duration::from_secs(5),
            cache_dir: std::env::temp_dir().join("retrofolio-media"),
        }
    }
}

/// Generate a cache filename from URL (hash-based, kind-typed extension)
fn cache_filename(url: &str, kind: MediaKind) -> String {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    let ext = match kind {
        MediaKind::Image => "img",
        MediaKind::Video => "vid",
    };
    format!("{:x}.{}", hasher.finish(), ext)
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, MediaItem>,
    /// Insertion order for eviction; oldest at the front
    order: VecDeque<String>,
    /// One broadcast channel per URL currently being fetched
    in_flight: HashMap<String, broadcast::Sender<LoadOutcome>>,
}

struct Inner {
    config: MediaCacheConfig,
    transport: Arc<dyn MediaTransport>,
    semaphore: Arc<Semaphore>,
    state: Mutex<CacheState>,
}

/// Shared media loading service. Clones are cheap handles onto one cache;
/// construct one at application root and inject it into consumers.
#[derive(Clone)]
pub struct MediaCache {
    inner: Arc<Inner>,
}

enum Role {
    Waiter(broadcast::Receiver<LoadOutcome>),
    Leader,
}

impl MediaCache {
    pub fn new(config: MediaCacheConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpTransport::new()))
    }

    /// Construct with a custom transport; tests script failures and delays
    /// through this seam.
    pub fn with_transport(config: MediaCacheConfig, transport: Arc<dyn MediaTransport>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                semaphore,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        // A poisoned lock is a programming fault, not a recoverable condition
        self.inner.state.lock().expect("media cache state poisoned")
    }

    /// Resolve a remote URL to a locally-renderable `MediaItem`.
    ///
    /// Cache hits return immediately at progress 100. Concurrent calls for
    /// the same URL share one underlying transport. Distinct URLs are
    /// admitted FIFO against the concurrency limit.
    pub async fn load(
        &self,
        url: &str,
        kind: MediaKind,
        progress: Option<ProgressFn>,
        cancel: CancellationToken,
    ) -> LoadOutcome {
        let role = {
            let mut state = self.state();
            if let Some(item) = state.entries.get(url) {
                if let Some(cb) = &progress {
                    cb(100);
                }
                return LoadOutcome::Loaded(item.clone());
            }
            if let Some(tx) = state.in_flight.get(url) {
                Role::Waiter(tx.subscribe())
            } else {
                let (tx, _rx) = broadcast::channel(16);
                state.in_flight.insert(url.to_string(), tx);
                Role::Leader
            }
        };

        match role {
            Role::Waiter(mut rx) => {
                // Coalesced caller: its own token settles only this caller
                tokio::select! {
                    _ = cancel.cancelled() => {
                        LoadOutcome::Cancelled(MediaItem::cancelled(url, kind))
                    }
                    res = rx.recv() => match res {
                        Ok(outcome) => {
                            if let (Some(cb), true) = (&progress, outcome.is_loaded()) {
                                cb(100);
                            }
                            outcome
                        }
                        // Leader vanished (cache cleared mid-flight)
                        Err(_) => LoadOutcome::Degraded(MediaItem::degraded(url, kind)),
                    },
                }
            }
            Role::Leader => {
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(url, "load cancelled, aborting transport");
                        LoadOutcome::Cancelled(MediaItem::cancelled(url, kind))
                    }
                    outcome = self.perform_load(url, kind, progress) => outcome,
                };
                self.publish(url, outcome).await
            }
        }
    }

    /// Record the settled outcome, wake coalesced waiters, and evict.
    /// Returns the outcome for the leader itself.
    async fn publish(&self, url: &str, outcome: LoadOutcome) -> LoadOutcome {
        let (tx, evicted) = {
            let mut state = self.state();
            let tx = state.in_flight.remove(url);
            let mut evicted: Vec<PathBuf> = Vec::new();
            // A `clear()` between dispatch and settle drops the pending
            // entry; in that case the result is not inserted either.
            if tx.is_some() {
                if let LoadOutcome::Loaded(item) = &outcome {
                    state.entries.insert(url.to_string(), item.clone());
                    state.order.push_back(url.to_string());
                    while state.order.len() > self.inner.config.capacity {
                        if let Some(oldest) = state.order.pop_front() {
                            if let Some(old) = state.entries.remove(&oldest) {
                                debug!(url = %oldest, "evicting oldest cache entry");
                                if old.has_local_copy() {
                                    evicted.push(PathBuf::from(old.local_handle));
                                }
                            }
                        }
                    }
                }
            }
            (tx, evicted)
        };

        if let Some(tx) = tx {
            let _ = tx.send(outcome.clone());
        }
        for path in evicted {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                debug!(path = %path.display(), error = %e, "evicted file removal failed");
            }
        }
        outcome
    }

    async fn perform_load(
        &self,
        url: &str,
        kind: MediaKind,
        progress: Option<ProgressFn>,
    ) -> LoadOutcome {
        // FIFO admission: at most `max_concurrent` transports in flight.
        // Dropping the permit (completion or cancellation) frees the slot.
        let _permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("media cache semaphore closed");

        match self.inner.transport.fetch(url, progress.clone()).await {
            Ok(bytes) => LoadOutcome::Loaded(self.finish(url, kind, bytes, progress).await),
            Err(err) => {
                warn!(url, error = %err, "primary transport failed, retrying via fallback");
                match self.fallback_fetch(url, progress.clone()).await {
                    Ok(bytes) => LoadOutcome::Loaded(self.finish(url, kind, bytes, progress).await),
                    Err(err) => {
                        warn!(url, error = %err, "fallback transport failed, degrading");
                        LoadOutcome::Degraded(MediaItem::degraded(url, kind))
                    }
                }
            }
        }
    }

    /// Fallback path: plain fetch with synthetic progress increments,
    /// capped below completion until the bytes actually arrive
    async fn fallback_fetch(
        &self,
        url: &str,
        progress: Option<ProgressFn>,
    ) -> Result<Vec<u8>, TransportError> {
        let fut = self.inner.transport.fetch_basic(url);
        tokio::pin!(fut);
        let mut pct: u8 = 10;
        let mut ticker = tokio::time::interval(Duration::from_millis(150));
        loop {
            tokio::select! {
                res = &mut fut => return res,
                _ = ticker.tick() => {
                    if let Some(cb) = &progress {
                        cb(pct);
                    }
                    pct = (pct + 10).min(90);
                }
            }
        }
    }

    /// Persist the payload, resolve dimensions, report completion
    async fn finish(
        &self,
        url: &str,
        kind: MediaKind,
        bytes: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> MediaItem {
        let local_handle = match self.store_local(url, kind, &bytes).await {
            Ok(path) => path,
            Err(e) => {
                warn!(url, error = %e, "cache write failed, aliasing remote url");
                url.to_string()
            }
        };
        let (width, height) = self.resolve_dimensions(kind, bytes).await;
        if let Some(cb) = &progress {
            cb(100);
        }
        MediaItem {
            source_url: url.to_string(),
            local_handle,
            width,
            height,
            kind,
        }
    }

    async fn store_local(
        &self,
        url: &str,
        kind: MediaKind,
        bytes: &[u8],
    ) -> std::io::Result<String> {
        let dir = &self.inner.config.cache_dir;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(cache_filename(url, kind));
        tokio::fs::write(&path, bytes).await?;
        Ok(path.to_string_lossy().to_string())
    }

    /// Probe natural dimensions on a blocking thread, bounded by the
    /// configured timeout. Videos have no local decoder and keep defaults.
    async fn resolve_dimensions(&self, kind: MediaKind, bytes: Vec<u8>) -> (u32, u32) {
        if kind != MediaKind::Image {
            return (DEFAULT_WIDTH, DEFAULT_HEIGHT);
        }
        let probe = tokio::task::spawn_blocking(move || {
            image::io::Reader::new(std::io::Cursor::new(bytes))
                .with_guessed_format()
                .ok()?
                .into_dimensions()
                .ok()
        });
        match tokio::time::timeout(self.inner.config.dimension_timeout, probe).await {
            Ok(Ok(Some(dims))) => dims,
            Ok(Ok(None)) => {
                debug!("dimension probe could not decode payload, using defaults");
                (DEFAULT_WIDTH, DEFAULT_HEIGHT)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "dimension probe task failed, using defaults");
                (DEFAULT_WIDTH, DEFAULT_HEIGHT)
            }
            Err(_) => {
                warn!("dimension probe timed out, using defaults");
                (DEFAULT_WIDTH, DEFAULT_HEIGHT)
            }
        }
    }

    /// Release every local handle and empty the cache, the pending table,
    /// and the wait queue. Intended for full teardown.
    pub async fn clear(&self) {
        let files: Vec<PathBuf> = {
            let mut state = self.state();
            let files = state
                .entries
                .values()
                .filter(|item| item.has_local_copy())
                .map(|item| PathBuf::from(&item.local_handle))
                .collect();
            state.entries.clear();
            state.order.clear();
            // Waiters observe the dropped senders and settle degraded
            state.in_flight.clear();
            files
        };
        for path in &files {
            let _ = tokio::fs::remove_file(path).await;
        }
        debug!(released = files.len(), "media cache cleared");
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.state().entries.contains_key(url)
    }

    /// (resolved entries, requests currently in flight)
    pub fn stats(&self) -> (usize, usize) {
        let state = self.state();
        (state.entries.len(), state.in_flight.len())
    }
}
