// Content catalog access (document + blob stores)
pub mod catalog;

// Window chrome interaction math (drag/resize/maximize geometry)
pub mod chrome;

// Media loading engine (cache, transport, surface bindings)
pub mod media;

// Floating window state management
pub mod windowing;

use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tauri::{AppHandle, Emitter, Manager, State};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use catalog::{DocumentStore, HttpCatalog, ProjectRecord};
use chrome::{DragSession, InteractionState, PointerSample, ResizeSession, Size, Viewport};
use media::{MediaCache, MediaCacheConfig, SurfaceEvent, SurfaceRegistry};
use windowing::{Placement, WindowManager, WindowRecord};

/// Catalog collection holding the portfolio's project records
const PROJECTS_COLLECTION: &str = "projects";

const DEFAULT_CATALOG_URL: &str = "https://retrofolio-default-rtdb.firebaseio.com";

/// Shared handle onto the remote document store
struct CatalogState(Arc<dyn DocumentStore>);

/// Stagger between window creations when cascading a batch of photos
const CASCADE_STAGGER_MS: u64 = 120;

/// One photo in a cascade-open request
#[derive(Clone, Deserialize)]
struct PhotoSpec {
    title: String,
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

// ===== Window Management Commands =====

#[tauri::command]
fn open_window(
    title: String,
    content_key: String,
    placement: Placement,
    size: Option<Size>,
    viewport: Viewport,
    app: AppHandle,
    state: State<Mutex<WindowManager>>,
) -> Result<WindowRecord, String> {
    let mut manager = state.lock().map_err(|e| e.to_string())?;
    let window = manager.open(&title, &content_key, placement, size, viewport);
    app.emit("window-created", window.clone())
        .map_err(|e| e.to_string())?;
    Ok(window)
}

/// Open one window per photo, staggered so the frontend animates them in
/// sequence. Returns immediately; windows arrive via `window-created` events.
#[tauri::command]
async fn open_photo_cascade(
    photos: Vec<PhotoSpec>,
    viewport: Viewport,
    app: AppHandle,
) -> Result<(), String> {
    tauri::async_runtime::spawn(async move {
        for (index, photo) in photos.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(CASCADE_STAGGER_MS)).await;
            }
            let window = {
                let state = app.state::<Mutex<WindowManager>>();
                let mut manager = match state.lock() {
                    Ok(manager) => manager,
                    Err(e) => {
                        error!(error = %e, "window manager unavailable, cascade aborted");
                        return;
                    }
                };
                manager.open(
                    &photo.title,
                    "PHOTO",
                    Placement::DerivedFromMedia {
                        media_width: photo.width.unwrap_or(media::DEFAULT_WIDTH),
                        media_height: photo.height.unwrap_or(media::DEFAULT_HEIGHT),
                    },
                    None,
                    viewport,
                )
            };
            let registry = app.state::<SurfaceRegistry>();
            registry.register(&window.id, &window.id, &photo.url, Some("image"));
            if let Err(e) = app.emit("window-created", window) {
                warn!(error = %e, "failed to emit cascade window");
            }
        }
    });
    Ok(())
}

#[tauri::command]
fn focus_window(
    id: String,
    app: AppHandle,
    state: State<Mutex<WindowManager>>,
) -> Result<WindowRecord, String> {
    let mut manager = state.lock().map_err(|e| e.to_string())?;
    let window = manager
        .focus(&id)
        .ok_or_else(|| format!("Window not found: {}", id))?;
    app.emit("window-updated", window.clone())
        .map_err(|e| e.to_string())?;
    Ok(window)
}

#[tauri::command]
fn close_window(
    id: String,
    app: AppHandle,
    state: State<Mutex<WindowManager>>,
    interactions: State<Mutex<InteractionState>>,
    registry: State<SurfaceRegistry>,
) -> Result<(), String> {
    let closed = {
        let mut manager = state.lock().map_err(|e| e.to_string())?;
        manager.close(&id)
    };
    if closed.is_none() {
        return Err(format!("Window not found: {}", id));
    }
    // Drop in-flight media and any half-finished gesture for this window
    registry.remove_window(&id);
    if let Ok(mut interactions) = interactions.lock() {
        interactions.forget(&id);
    }
    app.emit("window-closed", id).map_err(|e| e.to_string())?;
    Ok(())
}

#[tauri::command]
fn toggle_minimize(
    id: String,
    app: AppHandle,
    state: State<Mutex<WindowManager>>,
    registry: State<SurfaceRegistry>,
) -> Result<WindowRecord, String> {
    let window = {
        let mut manager = state.lock().map_err(|e| e.to_string())?;
        manager
            .toggle_minimize(&id)
            .ok_or_else(|| format!("Window not found: {}", id))?
    };
    if window.minimized {
        // Hidden content holds nothing; restore re-fires loads via visibility
        registry.window_minimized(&id);
    }
    app.emit("window-updated", window.clone())
        .map_err(|e| e.to_string())?;
    Ok(window)
}

#[tauri::command]
fn toggle_maximize(
    id: String,
    viewport: Viewport,
    app: AppHandle,
    state: State<Mutex<WindowManager>>,
) -> Result<WindowRecord, String> {
    let mut manager = state.lock().map_err(|e| e.to_string())?;
    let window = manager
        .toggle_maximize(&id, viewport)
        .ok_or_else(|| format!("Window not found: {}", id))?;
    app.emit("window-updated", window.clone())
        .map_err(|e| e.to_string())?;
    Ok(window)
}

#[tauri::command]
fn reset_windows(app: AppHandle, state: State<Mutex<WindowManager>>) -> Result<(), String> {
    let mut manager = state.lock().map_err(|e| e.to_string())?;
    manager.reset_all();
    app.emit("windows-reset", ()).map_err(|e| e.to_string())?;
    Ok(())
}

#[tauri::command]
fn list_windows(state: State<Mutex<WindowManager>>) -> Result<Vec<WindowRecord>, String> {
    let manager = state.lock().map_err(|e| e.to_string())?;
    Ok(manager.stacked())
}

// ===== Chrome Gesture Commands =====
//
// The frontend measures the live footprint (stored size times any render
// transform) and forwards pointer samples; geometry math lives in `chrome`.

#[tauri::command]
fn begin_window_drag(
    id: String,
    pointer: PointerSample,
    state: State<Mutex<WindowManager>>,
    interactions: State<Mutex<InteractionState>>,
) -> Result<(), String> {
    let position = {
        let manager = state.lock().map_err(|e| e.to_string())?;
        let window = manager
            .get(&id)
            .ok_or_else(|| format!("Window not found: {}", id))?;
        // Maximized windows don't drag; the gesture simply never starts
        if window.maximized {
            return Ok(());
        }
        window.position
    };
    let mut interactions = interactions.lock().map_err(|e| e.to_string())?;
    interactions.begin_drag(&id, DragSession::begin(pointer, position));
    Ok(())
}

#[tauri::command]
fn update_window_drag(
    id: String,
    pointer: PointerSample,
    footprint: Option<Size>,
    viewport: Viewport,
    app: AppHandle,
    state: State<Mutex<WindowManager>>,
    interactions: State<Mutex<InteractionState>>,
) -> Result<Option<WindowRecord>, String> {
    // Containment needs the live measurement; without one this frame no-ops
    let Some(footprint) = footprint else {
        return Ok(None);
    };
    let position = {
        let interactions = interactions.lock().map_err(|e| e.to_string())?;
        // Sample without a session: gesture already ended, ignore
        let Some(session) = interactions.drag(&id) else {
            return Ok(None);
        };
        session.position_for(pointer, footprint, viewport)
    };
    let mut manager = state.lock().map_err(|e| e.to_string())?;
    let window = manager
        .move_to(&id, position)
        .ok_or_else(|| format!("Window not found: {}", id))?;
    app.emit("window-updated", window.clone())
        .map_err(|e| e.to_string())?;
    Ok(Some(window))
}

#[tauri::command]
fn end_window_drag(id: String, interactions: State<Mutex<InteractionState>>) -> Result<(), String> {
    let mut interactions = interactions.lock().map_err(|e| e.to_string())?;
    interactions.end_drag(&id);
    Ok(())
}

#[tauri::command]
fn begin_window_resize(
    id: String,
    pointer: PointerSample,
    state: State<Mutex<WindowManager>>,
    interactions: State<Mutex<InteractionState>>,
) -> Result<(), String> {
    let (size, aspect) = {
        let manager = state.lock().map_err(|e| e.to_string())?;
        manager
            .get(&id)
            .map(|w| (w.size, w.aspect))
            .ok_or_else(|| format!("Window not found: {}", id))?
    };
    let mut interactions = interactions.lock().map_err(|e| e.to_string())?;
    interactions.begin_resize(&id, ResizeSession::begin(pointer, size, aspect));
    Ok(())
}

#[tauri::command]
fn update_window_resize(
    id: String,
    pointer: PointerSample,
    viewport: Viewport,
    app: AppHandle,
    state: State<Mutex<WindowManager>>,
    interactions: State<Mutex<InteractionState>>,
) -> Result<Option<WindowRecord>, String> {
    let mut manager = state.lock().map_err(|e| e.to_string())?;
    let size = {
        let interactions = interactions.lock().map_err(|e| e.to_string())?;
        let Some(session) = interactions.resize(&id) else {
            return Ok(None);
        };
        let position = manager
            .get(&id)
            .map(|w| w.position)
            .ok_or_else(|| format!("Window not found: {}", id))?;
        session.size_for(pointer, position, viewport)
    };
    let window = manager
        .resize_to(&id, size)
        .ok_or_else(|| format!("Window not found: {}", id))?;
    app.emit("window-updated", window.clone())
        .map_err(|e| e.to_string())?;
    Ok(Some(window))
}

#[tauri::command]
fn end_window_resize(
    id: String,
    interactions: State<Mutex<InteractionState>>,
) -> Result<(), String> {
    let mut interactions = interactions.lock().map_err(|e| e.to_string())?;
    interactions.end_resize(&id);
    Ok(())
}

// ===== Media Surface Commands =====

#[tauri::command]
fn register_surface(
    surface_id: String,
    window_id: String,
    source_url: String,
    kind: Option<String>,
    registry: State<SurfaceRegistry>,
) -> Result<(), String> {
    registry.register(&surface_id, &window_id, &source_url, kind.as_deref());
    Ok(())
}

#[tauri::command]
async fn set_surface_visibility(
    surface_id: String,
    visible: bool,
    registry: State<'_, SurfaceRegistry>,
) -> Result<(), String> {
    registry.set_visible(&surface_id, visible);
    Ok(())
}

#[tauri::command]
async fn set_surface_source(
    surface_id: String,
    source_url: String,
    kind: Option<String>,
    registry: State<'_, SurfaceRegistry>,
) -> Result<(), String> {
    registry.set_source(&surface_id, &source_url, kind.as_deref());
    Ok(())
}

#[tauri::command]
fn unregister_surface(surface_id: String, registry: State<SurfaceRegistry>) -> Result<(), String> {
    registry.unregister(&surface_id);
    Ok(())
}

#[tauri::command]
async fn clear_media_cache(cache: State<'_, MediaCache>) -> Result<(), String> {
    cache.clear().await;
    Ok(())
}

#[tauri::command]
fn media_cache_stats(cache: State<MediaCache>) -> Result<(usize, usize), String> {
    Ok(cache.stats())
}

// ===== Catalog Commands =====

#[tauri::command]
async fn list_projects(catalog: State<'_, CatalogState>) -> Result<Vec<ProjectRecord>, String> {
    catalog
        .0
        .read_collection(PROJECTS_COLLECTION)
        .await
        .map_err(|e| e.to_string())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let catalog_url =
        std::env::var("RETROFOLIO_CATALOG_URL").unwrap_or_else(|_| DEFAULT_CATALOG_URL.to_string());
    let catalog = CatalogState(Arc::new(HttpCatalog::new(&catalog_url)));

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .manage(Mutex::new(WindowManager::new()))
        .manage(Mutex::new(InteractionState::default()))
        .manage(catalog)
        .setup(|app| {
            // The cache and registry need the app handle (cache directory,
            // event bridge), so they are constructed here rather than managed
            // up front.
            let cache_dir = app
                .path()
                .app_cache_dir()
                .map(|dir| dir.join("media"))
                .unwrap_or_else(|_| std::env::temp_dir().join("retrofolio-media"));
            let cache = MediaCache::new(MediaCacheConfig {
                cache_dir,
                ..Default::default()
            });

            let handle = app.handle().clone();
            let registry = SurfaceRegistry::new(
                cache.clone(),
                Arc::new(move |event: SurfaceEvent| {
                    let name = match &event {
                        SurfaceEvent::Progress { .. } => "media-progress",
                        SurfaceEvent::Settled { .. } => "media-settled",
                    };
                    if let Err(e) = handle.emit(name, event) {
                        warn!(error = %e, "failed to emit media event");
                    }
                }),
            );

            app.manage(cache);
            app.manage(registry);
            info!("desktop shell initialized");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Window management commands
            open_window,
            open_photo_cascade,
            focus_window,
            close_window,
            toggle_minimize,
            toggle_maximize,
            reset_windows,
            list_windows,
            // Chrome gesture commands
            begin_window_drag,
            update_window_drag,
            end_window_drag,
            begin_window_resize,
            update_window_resize,
            end_window_resize,
            // Media surface commands
            register_surface,
            set_surface_visibility,
            set_surface_source,
            unregister_surface,
            clear_media_cache,
            media_cache_stats,
            // Catalog commands
            list_projects,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
