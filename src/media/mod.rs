// Media loading engine: cache, transport seam, and per-surface bindings

pub mod binding;
pub mod cache;
pub mod item;
pub mod transport;

pub use binding::{SurfaceEmitter, SurfaceEvent, SurfaceRegistry, SurfaceState};
pub use cache::{MediaCache, MediaCacheConfig};
pub use item::{LoadOutcome, MediaItem, MediaKind, DEFAULT_HEIGHT, DEFAULT_WIDTH};
pub use transport::{HttpTransport, MediaTransport, ProgressFn, TransportError};
