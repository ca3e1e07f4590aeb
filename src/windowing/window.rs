use serde::{Deserialize, Serialize};

use crate::chrome::{Position, Size};

/// How a new window's initial position (and possibly size) is chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Placement {
    /// Viewport-centred; dialogs and utility panels, and every window on a
    /// narrow viewport
    Centered,
    /// Deterministic pseudo-random scatter inside the viewport margins;
    /// primary content windows
    Cascaded,
    /// Size derived from the media's natural aspect ratio fitted into a
    /// device-class bounding box; per-photo windows
    DerivedFromMedia {
        media_width: u32,
        media_height: u32,
    },
}

/// One open floating window. Geometry is authoritative here; the chrome
/// layer only proposes new values through the manager's setters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRecord {
    /// Unique UUID
    pub id: String,
    pub title: String,
    /// What the frontend renders inside (e.g. "PHOTO", "ABOUT")
    pub content_key: String,
    pub position: Position,
    pub size: Size,
    /// Minimized windows render nothing but keep all other state
    pub minimized: bool,
    /// Render-time override; stored geometry survives unless aspect-locked
    pub maximized: bool,
    /// Content-area ratio to hold during resize/maximize, for media windows
    pub aspect: Option<f64>,
    /// Stacking order; strictly increasing allocation, re-assigned on focus
    pub z_index: u64,
    /// Geometry stashed by an aspect-locked maximize, restored on toggle
    pub restore_position: Option<Position>,
    pub restore_size: Option<Size>,
}
