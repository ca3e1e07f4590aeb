// Interactive window chrome: pointer-driven drag/resize geometry

pub mod geometry;
pub mod types;

pub use geometry::{
    maximized_geometry, DragSession, ResizeSession, EDGE_MARGIN, FRAME_BORDER, HEADER_HEIGHT,
    MIN_HEIGHT, MIN_WIDTH,
};
pub use types::{PointerSample, Position, Size, Viewport};

use std::collections::HashMap;

/// Active gesture sessions, keyed by window id. One drag and one resize can
/// be tracked per window; the orchestrator begins/ends them around pointer
/// press/release.
#[derive(Default)]
pub struct InteractionState {
    drags: HashMap<String, DragSession>,
    resizes: HashMap<String, ResizeSession>,
}

impl InteractionState {
    pub fn begin_drag(&mut self, window_id: &str, session: DragSession) {
        self.drags.insert(window_id.to_string(), session);
    }

    pub fn drag(&self, window_id: &str) -> Option<&DragSession> {
        self.drags.get(window_id)
    }

    pub fn end_drag(&mut self, window_id: &str) {
        self.drags.remove(window_id);
    }

    pub fn begin_resize(&mut self, window_id: &str, session: ResizeSession) {
        self.resizes.insert(window_id.to_string(), session);
    }

    pub fn resize(&self, window_id: &str) -> Option<&ResizeSession> {
        self.resizes.get(window_id)
    }

    pub fn end_resize(&mut self, window_id: &str) {
        self.resizes.remove(window_id);
    }

    /// Drop any session for a window that went away mid-gesture
    pub fn forget(&mut self, window_id: &str) {
        self.drags.remove(window_id);
        self.resizes.remove(window_id);
    }
}
