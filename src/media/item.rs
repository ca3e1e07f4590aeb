// Core data structures for the media loading engine

use serde::{Deserialize, Serialize};

/// Dimensions substituted when a payload cannot be decoded in time
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;

/// File extensions treated as video content
const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "webm", "mov", "avi", "mkv"];

/// The kind of media a surface displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Infer the kind from a URL's file extension, ignoring query strings.
    /// Anything that is not a known video extension is treated as an image.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    /// Parse an optional frontend hint, falling back to the URL heuristic
    pub fn from_hint(hint: Option<&str>, url: &str) -> Self {
        match hint {
            Some("image") => MediaKind::Image,
            Some("video") => MediaKind::Video,
            _ => MediaKind::from_url(url),
        }
    }
}

/// One fully-resolved piece of media. Immutable once created; the cache is
/// the sole owner of the local file backing `local_handle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    /// Original remote locator; also the cache key
    pub source_url: String,
    /// Locally-dereferenceable path, or the source URL itself on the alias path
    pub local_handle: String,
    pub width: u32,
    pub height: u32,
    pub kind: MediaKind,
}

impl MediaItem {
    /// Best-effort item produced when every transport attempt failed.
    /// The handle aliases the remote URL so a renderer can still try it.
    pub fn degraded(source_url: &str, kind: MediaKind) -> Self {
        Self {
            source_url: source_url.to_string(),
            local_handle: source_url.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            kind,
        }
    }

    /// Degenerate item returned for a cancelled request
    pub fn cancelled(source_url: &str, kind: MediaKind) -> Self {
        Self {
            source_url: source_url.to_string(),
            local_handle: String::new(),
            width: 0,
            height: 0,
            kind,
        }
    }

    /// True when the local handle points at a cache-owned file rather than
    /// aliasing the remote URL
    pub fn has_local_copy(&self) -> bool {
        !self.local_handle.is_empty() && self.local_handle != self.source_url
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

/// Settled result of a load request.
///
/// `load` never fails for network-level reasons: failures settle as
/// `Degraded` and cancellation settles as `Cancelled`. The tag makes the
/// distinction observable so callers never have to infer intent from
/// sentinel dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", content = "item")]
pub enum LoadOutcome {
    /// Fetched, decoded, and cached
    Loaded(MediaItem),
    /// Both transports failed; best-effort defaults, not cached
    Degraded(MediaItem),
    /// Request was cancelled before settling; zero dimensions, not cached
    Cancelled(MediaItem),
}

impl LoadOutcome {
    pub fn item(&self) -> &MediaItem {
        match self {
            LoadOutcome::Loaded(item)
            | LoadOutcome::Degraded(item)
            | LoadOutcome::Cancelled(item) => item,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadOutcome::Cancelled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(MediaKind::from_url("https://cdn/clip.mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_url("https://cdn/clip.WebM"), MediaKind::Video);
        assert_eq!(MediaKind::from_url("https://cdn/a.jpg"), MediaKind::Image);
        assert_eq!(MediaKind::from_url("https://cdn/a"), MediaKind::Image);
    }

    #[test]
    fn test_kind_ignores_query_string() {
        assert_eq!(
            MediaKind::from_url("https://cdn/clip.mov?token=abc.mp3"),
            MediaKind::Video
        );
        assert_eq!(
            MediaKind::from_url("https://cdn/a.png?v=2"),
            MediaKind::Image
        );
    }

    #[test]
    fn test_hint_overrides_heuristic() {
        assert_eq!(
            MediaKind::from_hint(Some("video"), "https://cdn/a.jpg"),
            MediaKind::Video
        );
        assert_eq!(
            MediaKind::from_hint(None, "https://cdn/a.jpg"),
            MediaKind::Image
        );
    }

    #[test]
    fn test_degraded_item_aliases_source() {
        let item = MediaItem::degraded("https://bad/x.jpg", MediaKind::Image);
        assert_eq!(item.local_handle, item.source_url);
        assert_eq!((item.width, item.height), (DEFAULT_WIDTH, DEFAULT_HEIGHT));
        assert!(!item.has_local_copy());
    }

    #[test]
    fn test_cancelled_item_has_zero_dimensions() {
        let item = MediaItem::cancelled("https://cdn/a.jpg", MediaKind::Image);
        assert_eq!((item.width, item.height), (0, 0));
        assert!(item.local_handle.is_empty());
    }
}
