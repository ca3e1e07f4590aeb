// Window state management: the authoritative collection of open windows,
// placement policy, and z-order arbitration. Pure state; clamping against
// live measurements belongs to the chrome layer.

use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::chrome::{self, Position, Size, Viewport};

pub mod window;

pub use window::{Placement, WindowRecord};

/// Viewports narrower than this always centre new windows
pub const MOBILE_BREAKPOINT: f64 = 768.0;

const DEFAULT_WIDTH: f64 = 520.0;
const DEFAULT_HEIGHT: f64 = 420.0;

/// Margin the cascade scatter keeps clear of the viewport edges
const SCATTER_MARGIN: f64 = 24.0;

/// Bounding box for media-derived window content on desktop-class viewports
const DESKTOP_MEDIA_BOX: (f64, f64) = (460.0, 480.0);

pub struct WindowManager {
    windows: HashMap<String, WindowRecord>,
    /// Monotonic z allocator; never reused while the manager lives
    next_z: u64,
    /// xorshift state for the cascade scatter
    scatter_state: u64,
}

impl WindowManager {
    pub fn new() -> Self {
        Self {
            windows: HashMap::new(),
            next_z: 1,
            scatter_state: 0x9E37_79B9_7F4A_7C15,
        }
    }

    fn next_scatter(&mut self) -> u64 {
        let mut x = self.scatter_state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.scatter_state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn alloc_z(&mut self) -> u64 {
        let z = self.next_z;
        self.next_z += 1;
        z
    }

    /// Open a new window and return its record. The new window is topmost.
    pub fn open(
        &mut self,
        title: &str,
        content_key: &str,
        placement: Placement,
        explicit_size: Option<Size>,
        viewport: Viewport,
    ) -> WindowRecord {
        let aspect = match placement {
            Placement::DerivedFromMedia {
                media_width,
                media_height,
            } if media_height > 0 => Some(media_width as f64 / media_height as f64),
            _ => None,
        };

        let size = explicit_size.unwrap_or_else(|| match placement {
            Placement::DerivedFromMedia {
                media_width,
                media_height,
            } => derived_size(media_width, media_height, viewport),
            _ => Size {
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
            },
        });

        // Narrow viewports get centred windows no matter what was asked for
        let effective = if viewport.width < MOBILE_BREAKPOINT {
            Placement::Centered
        } else {
            placement
        };

        let position = match effective {
            Placement::Cascaded => {
                let rx = self.next_scatter();
                let ry = self.next_scatter();
                scatter_position(rx, ry, size, viewport)
            }
            _ => centered_position(size, viewport),
        };

        let record = WindowRecord {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            content_key: content_key.to_string(),
            position,
            size,
            minimized: false,
            maximized: false,
            aspect,
            z_index: self.alloc_z(),
            restore_position: None,
            restore_size: None,
        };
        debug!(id = %record.id, title, z = record.z_index, "window opened");
        self.windows.insert(record.id.clone(), record.clone());
        record
    }

    /// Raise a window to the top of the stack. Idempotent when already
    /// topmost: the z-index is left untouched.
    pub fn focus(&mut self, id: &str) -> Option<WindowRecord> {
        let topmost = self.next_z.saturating_sub(1);
        let window = self.windows.get_mut(id)?;
        if window.z_index == topmost {
            return Some(window.clone());
        }
        window.z_index = self.next_z;
        self.next_z += 1;
        Some(window.clone())
    }

    /// Remove a window entirely; no tombstone remains
    pub fn close(&mut self, id: &str) -> Option<WindowRecord> {
        self.windows.remove(id)
    }

    pub fn toggle_minimize(&mut self, id: &str) -> Option<WindowRecord> {
        let window = self.windows.get_mut(id)?;
        window.minimized = !window.minimized;
        Some(window.clone())
    }

    /// Toggle the maximize flag. Plain windows keep their stored geometry
    /// (the flag is a render-time override); aspect-locked windows get
    /// viewport-centred ratio-preserving geometry computed here, with the
    /// prior geometry stashed for restore.
    pub fn toggle_maximize(&mut self, id: &str, viewport: Viewport) -> Option<WindowRecord> {
        let window = self.windows.get_mut(id)?;
        if let Some(aspect) = window.aspect {
            if window.maximized {
                if let (Some(pos), Some(size)) =
                    (window.restore_position.take(), window.restore_size.take())
                {
                    window.position = pos;
                    window.size = size;
                }
            } else {
                window.restore_position = Some(window.position);
                window.restore_size = Some(window.size);
                let (pos, size) = chrome::maximized_geometry(aspect, viewport);
                window.position = pos;
                window.size = size;
            }
        }
        window.maximized = !window.maximized;
        Some(window.clone())
    }

    /// Direct setter used by the chrome layer during a drag; no clamping
    /// here since containment needs the live footprint
    pub fn move_to(&mut self, id: &str, position: Position) -> Option<WindowRecord> {
        let window = self.windows.get_mut(id)?;
        window.position = position;
        Some(window.clone())
    }

    /// Direct setter used by the chrome layer during a resize
    pub fn resize_to(&mut self, id: &str, size: Size) -> Option<WindowRecord> {
        let window = self.windows.get_mut(id)?;
        window.size = size;
        Some(window.clone())
    }

    /// Close everything and reset the z allocator
    pub fn reset_all(&mut self) {
        let count = self.windows.len();
        self.windows.clear();
        self.next_z = 1;
        debug!(closed = count, "all windows reset");
    }

    pub fn get(&self, id: &str) -> Option<&WindowRecord> {
        self.windows.get(id)
    }

    /// All open windows, bottom to top
    pub fn stacked(&self) -> Vec<WindowRecord> {
        let mut windows: Vec<WindowRecord> = self.windows.values().cloned().collect();
        windows.sort_by_key(|w| w.z_index);
        windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl Default for WindowManager {
    fn default() -> Self {
        Self::new()
    }
}

fn centered_position(size: Size, viewport: Viewport) -> Position {
    Position {
        x: ((viewport.width - size.width) / 2.0).max(0.0),
        y: ((viewport.height - size.height) / 2.0).max(0.0),
    }
}

/// Scatter inside the viewport minus margins; deterministic for a given
/// manager history
fn scatter_position(rx: u64, ry: u64, size: Size, viewport: Viewport) -> Position {
    let span_x = (viewport.width - size.width - 2.0 * SCATTER_MARGIN).max(1.0);
    let span_y = (viewport.height - size.height - 2.0 * SCATTER_MARGIN).max(1.0);
    Position {
        x: SCATTER_MARGIN + (rx % span_x as u64) as f64,
        y: SCATTER_MARGIN + (ry % span_y as u64) as f64,
    }
}

/// Fit the media's natural aspect into the device-class bounding box, then
/// add the chrome allowance so the content area carries the ratio
fn derived_size(media_width: u32, media_height: u32, viewport: Viewport) -> Size {
    let (box_w, box_h) = if viewport.width < MOBILE_BREAKPOINT {
        (viewport.width * 0.85, viewport.height * 0.6)
    } else {
        DESKTOP_MEDIA_BOX
    };
    let (mw, mh) = (media_width.max(1) as f64, media_height.max(1) as f64);
    let scale = (box_w / mw).min(box_h / mh);
    Size {
        width: mw * scale + 2.0 * chrome::FRAME_BORDER,
        height: mh * scale + chrome::HEADER_HEIGHT + 2.0 * chrome::FRAME_BORDER,
    }
}
