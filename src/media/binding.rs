// Per-surface loading binding.
//
// One `Surface` ties a display slot inside a window to the cache and keeps
// its lifecycle honest: loads start only once the frontend reports the
// surface near the viewport, minimizing the owning window cancels the
// in-flight request, and a stale completion can never write into a surface
// whose source or generation has moved on.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cache::MediaCache;
use super::item::{LoadOutcome, MediaItem, MediaKind};
use super::transport::ProgressFn;

/// Lifecycle state of one display surface
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "phase")]
pub enum SurfaceState {
    /// Registered but not yet near the viewport (or reset by cancel/minimize)
    Hidden,
    Loading { percent: u8 },
    Ready { item: MediaItem },
    /// Load settled degraded; renderers show a failure placeholder
    Errored,
}

/// Event stream consumed by the orchestrator (bridged to frontend events)
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum SurfaceEvent {
    Progress { surface_id: String, percent: u8 },
    Settled { surface_id: String, state: SurfaceState },
}

pub type SurfaceEmitter = Arc<dyn Fn(SurfaceEvent) + Send + Sync>;

struct Surface {
    window_id: String,
    source_url: String,
    kind: MediaKind,
    state: SurfaceState,
    /// Token for the request currently in flight, if any
    cancel: Option<CancellationToken>,
    /// Bumped on every (re)start and invalidation; completions carrying an
    /// older generation are discarded
    generation: u64,
}

struct RegistryInner {
    cache: MediaCache,
    surfaces: Mutex<HashMap<String, Surface>>,
    emitter: SurfaceEmitter,
}

/// Owns every registered surface and drives their loads through the cache
#[derive(Clone)]
pub struct SurfaceRegistry {
    inner: Arc<RegistryInner>,
}

impl SurfaceRegistry {
    pub fn new(cache: MediaCache, emitter: SurfaceEmitter) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                cache,
                surfaces: Mutex::new(HashMap::new()),
                emitter,
            }),
        }
    }

    fn surfaces(&self) -> MutexGuard<'_, HashMap<String, Surface>> {
        self.inner
            .surfaces
            .lock()
            .expect("surface registry poisoned")
    }

    /// Register a surface for a window. Kind falls back to the extension
    /// heuristic when the frontend passes no hint.
    pub fn register(
        &self,
        surface_id: &str,
        window_id: &str,
        source_url: &str,
        kind_hint: Option<&str>,
    ) {
        let kind = MediaKind::from_hint(kind_hint, source_url);
        self.surfaces().insert(
            surface_id.to_string(),
            Surface {
                window_id: window_id.to_string(),
                source_url: source_url.to_string(),
                kind,
                state: SurfaceState::Hidden,
                cancel: None,
                generation: 0,
            },
        );
        debug!(surface_id, window_id, url = source_url, "surface registered");
    }

    /// Visibility trigger from the frontend's viewport observation.
    /// Becoming visible starts a load unless one is already running or done;
    /// leaving visibility is a no-op (resolved media stays resolved).
    pub fn set_visible(&self, surface_id: &str, visible: bool) {
        if !visible {
            return;
        }
        let (url, kind, generation, token) = {
            let mut surfaces = self.surfaces();
            let Some(surface) = surfaces.get_mut(surface_id) else {
                warn!(surface_id, "visibility for unknown surface");
                return;
            };
            match surface.state {
                SurfaceState::Hidden | SurfaceState::Errored => {}
                _ => return,
            }
            surface.generation += 1;
            // A fresh token per attempt: a token spent on a previous
            // cancellation must never gate a new load
            let token = CancellationToken::new();
            surface.cancel = Some(token.clone());
            surface.state = SurfaceState::Loading { percent: 0 };
            (
                surface.source_url.clone(),
                surface.kind,
                surface.generation,
                token,
            )
        };
        self.spawn_load(surface_id.to_string(), url, kind, generation, token);
    }

    fn spawn_load(
        &self,
        surface_id: String,
        url: String,
        kind: MediaKind,
        generation: u64,
        token: CancellationToken,
    ) {
        let registry = self.clone();
        let progress: ProgressFn = {
            let registry = registry.clone();
            let surface_id = surface_id.clone();
            Arc::new(move |percent| registry.record_progress(&surface_id, generation, percent))
        };
        tokio::spawn(async move {
            let outcome = registry
                .inner
                .cache
                .load(&url, kind, Some(progress), token)
                .await;
            registry.settle(&surface_id, generation, outcome);
        });
    }

    fn record_progress(&self, surface_id: &str, generation: u64, percent: u8) {
        {
            let mut surfaces = self.surfaces();
            match surfaces.get_mut(surface_id) {
                Some(surface) if surface.generation == generation => {
                    surface.state = SurfaceState::Loading { percent };
                }
                _ => return,
            }
        }
        (self.inner.emitter)(SurfaceEvent::Progress {
            surface_id: surface_id.to_string(),
            percent,
        });
    }

    fn settle(&self, surface_id: &str, generation: u64, outcome: LoadOutcome) {
        let state = {
            let mut surfaces = self.surfaces();
            let Some(surface) = surfaces.get_mut(surface_id) else {
                return;
            };
            if surface.generation != generation {
                // Source changed or the surface was reset while in flight
                debug!(surface_id, "discarding stale load completion");
                return;
            }
            surface.cancel = None;
            surface.state = match outcome {
                LoadOutcome::Loaded(item) => SurfaceState::Ready { item },
                LoadOutcome::Degraded(_) => SurfaceState::Errored,
                // Cancellation is not an error; the surface simply re-arms
                LoadOutcome::Cancelled(_) => SurfaceState::Hidden,
            };
            surface.state.clone()
        };
        (self.inner.emitter)(SurfaceEvent::Settled {
            surface_id: surface_id.to_string(),
            state,
        });
    }

    /// The owning window was minimized: cancel in-flight loads for its
    /// surfaces and drop resolved handles so hidden content holds nothing.
    /// Restoring the window re-fires loads through fresh visibility events.
    pub fn window_minimized(&self, window_id: &str) {
        let mut surfaces = self.surfaces();
        for (surface_id, surface) in surfaces.iter_mut() {
            if surface.window_id != window_id {
                continue;
            }
            if let Some(token) = surface.cancel.take() {
                token.cancel();
            }
            surface.generation += 1;
            surface.state = SurfaceState::Hidden;
            debug!(surface_id, window_id, "surface reset by minimize");
        }
    }

    /// Swap the source of a surface, cancelling whatever was in flight
    pub fn set_source(&self, surface_id: &str, source_url: &str, kind_hint: Option<&str>) {
        let mut surfaces = self.surfaces();
        let Some(surface) = surfaces.get_mut(surface_id) else {
            warn!(surface_id, "source change for unknown surface");
            return;
        };
        if let Some(token) = surface.cancel.take() {
            token.cancel();
        }
        surface.generation += 1;
        surface.source_url = source_url.to_string();
        surface.kind = MediaKind::from_hint(kind_hint, source_url);
        surface.state = SurfaceState::Hidden;
    }

    /// Cancel and forget one surface (unmount)
    pub fn unregister(&self, surface_id: &str) {
        let mut surfaces = self.surfaces();
        if let Some(mut surface) = surfaces.remove(surface_id) {
            if let Some(token) = surface.cancel.take() {
                token.cancel();
            }
        }
    }

    /// Cancel and forget every surface belonging to a closed window
    pub fn remove_window(&self, window_id: &str) {
        let mut surfaces = self.surfaces();
        surfaces.retain(|_, surface| {
            if surface.window_id == window_id {
                if let Some(token) = surface.cancel.take() {
                    token.cancel();
                }
                false
            } else {
                true
            }
        });
    }

    pub fn state_of(&self, surface_id: &str) -> Option<SurfaceState> {
        self.surfaces().get(surface_id).map(|s| s.state.clone())
    }

    pub fn len(&self) -> usize {
        self.surfaces().len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::cache::MediaCacheConfig;
    use crate::media::transport::{MediaTransport, TransportError};
    use futures_util::future::BoxFuture;
    use std::time::Duration;

    struct SlowTransport {
        delay: Duration,
        fail: bool,
    }

    impl MediaTransport for SlowTransport {
        fn fetch(
            &self,
            _url: &str,
            _progress: Option<ProgressFn>,
        ) -> BoxFuture<'static, Result<Vec<u8>, TransportError>> {
            let delay = self.delay;
            let fail = self.fail;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                if fail {
                    Err(TransportError::Status(404))
                } else {
                    Ok(png_bytes(40, 30))
                }
            })
        }

        fn fetch_basic(&self, _url: &str) -> BoxFuture<'static, Result<Vec<u8>, TransportError>> {
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(TransportError::Status(404))
                } else {
                    Ok(png_bytes(40, 30))
                }
            })
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::new(width, height));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageOutputFormat::Png)
            .expect("png encode");
        buf.into_inner()
    }

    fn registry_with(delay: Duration, fail: bool) -> SurfaceRegistry {
        let config = MediaCacheConfig {
            cache_dir: std::env::temp_dir()
                .join(format!("retrofolio-binding-{}", uuid::Uuid::new_v4())),
            ..Default::default()
        };
        let cache = MediaCache::with_transport(config, Arc::new(SlowTransport { delay, fail }));
        SurfaceRegistry::new(cache, Arc::new(|_| {}))
    }

    async fn wait_for<F: Fn(&SurfaceState) -> bool>(
        registry: &SurfaceRegistry,
        surface_id: &str,
        pred: F,
    ) {
        for _ in 0..100 {
            if let Some(state) = registry.state_of(surface_id) {
                if pred(&state) {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("surface never reached expected state");
    }

    #[tokio::test]
    async fn test_load_waits_for_visibility() {
        let registry = registry_with(Duration::from_millis(10), false);
        registry.register("s1", "w1", "https://cdn/a.jpg", None);
        assert!(matches!(
            registry.state_of("s1"),
            Some(SurfaceState::Hidden)
        ));

        registry.set_visible("s1", true);
        wait_for(&registry, "s1", |s| matches!(s, SurfaceState::Ready { .. })).await;

        match registry.state_of("s1") {
            Some(SurfaceState::Ready { item }) => {
                assert_eq!((item.width, item.height), (40, 30));
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_minimize_during_load_cancels_and_clears() {
        let registry = registry_with(Duration::from_millis(500), false);
        registry.register("s1", "w1", "https://cdn/big.jpg", None);
        registry.set_visible("s1", true);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(
            registry.state_of("s1"),
            Some(SurfaceState::Loading { .. })
        ));

        registry.window_minimized("w1");
        assert!(matches!(
            registry.state_of("s1"),
            Some(SurfaceState::Hidden)
        ));

        // The cancelled completion must not resurrect the surface
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(
            registry.state_of("s1"),
            Some(SurfaceState::Hidden)
        ));
    }

    #[tokio::test]
    async fn test_restore_refires_with_fresh_token() {
        let registry = registry_with(Duration::from_millis(10), false);
        registry.register("s1", "w1", "https://cdn/a.jpg", None);
        registry.set_visible("s1", true);
        registry.window_minimized("w1");

        registry.set_visible("s1", true);
        wait_for(&registry, "s1", |s| matches!(s, SurfaceState::Ready { .. })).await;
    }

    #[tokio::test]
    async fn test_degraded_load_surfaces_as_error() {
        let registry = registry_with(Duration::from_millis(5), true);
        registry.register("s1", "w1", "https://bad/x.jpg", None);
        registry.set_visible("s1", true);
        wait_for(&registry, "s1", |s| matches!(s, SurfaceState::Errored)).await;
    }

    #[tokio::test]
    async fn test_source_change_discards_stale_completion() {
        let registry = registry_with(Duration::from_millis(80), false);
        registry.register("s1", "w1", "https://cdn/old.jpg", None);
        registry.set_visible("s1", true);
        tokio::time::sleep(Duration::from_millis(10)).await;

        registry.set_source("s1", "https://cdn/new.jpg", None);
        registry.set_visible("s1", true);
        wait_for(&registry, "s1", |s| matches!(s, SurfaceState::Ready { .. })).await;

        match registry.state_of("s1") {
            Some(SurfaceState::Ready { item }) => {
                assert_eq!(item.source_url, "https://cdn/new.jpg");
            }
            other => panic!("unexpected state {other:?}"),
        }
        // Let the stale first load settle and verify it is discarded
        tokio::time::sleep(Duration::from_millis(120)).await;
        match registry.state_of("s1") {
            Some(SurfaceState::Ready { item }) => {
                assert_eq!(item.source_url, "https://cdn/new.jpg");
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_window_drops_surfaces() {
        let registry = registry_with(Duration::from_millis(200), false);
        registry.register("s1", "w1", "https://cdn/a.jpg", None);
        registry.register("s2", "w1", "https://cdn/b.jpg", None);
        registry.register("s3", "w2", "https://cdn/c.jpg", None);
        registry.set_visible("s1", true);

        registry.remove_window("w1");
        assert_eq!(registry.len(), 1);
        assert!(registry.state_of("s1").is_none());
        assert!(registry.state_of("s3").is_some());
    }
}
