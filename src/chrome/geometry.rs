// Drag and resize math for window chrome.
//
// The frontend measures the live window footprint and forwards one pointer
// sample per rendered frame; everything here is pure arithmetic against
// those measurements. Sessions capture gesture-start state so intermediate
// commits never accumulate rounding drift.

use super::types::{PointerSample, Position, Size, Viewport};

/// Smallest outer window size a resize may produce
pub const MIN_WIDTH: f64 = 300.0;
pub const MIN_HEIGHT: f64 = 200.0;

/// Chrome allowance: the content area is the outer size minus border and
/// header, and it is the content area that aspect locking preserves
pub const FRAME_BORDER: f64 = 2.0;
pub const HEADER_HEIGHT: f64 = 28.0;

/// Gap kept between a resized window and the viewport edge
pub const EDGE_MARGIN: f64 = 8.0;

fn chrome_width() -> f64 {
    2.0 * FRAME_BORDER
}

fn chrome_height() -> f64 {
    HEADER_HEIGHT + 2.0 * FRAME_BORDER
}

/// An active header drag: press-to-origin offset captured at gesture start
#[derive(Debug, Clone, Copy)]
pub struct DragSession {
    offset_x: f64,
    offset_y: f64,
}

impl DragSession {
    pub fn begin(pointer: PointerSample, window_position: Position) -> Self {
        Self {
            offset_x: pointer.x - window_position.x,
            offset_y: pointer.y - window_position.y,
        }
    }

    /// New position for a pointer sample, clamped so the measured footprint
    /// stays fully inside the viewport on both axes
    pub fn position_for(
        &self,
        pointer: PointerSample,
        footprint: Size,
        viewport: Viewport,
    ) -> Position {
        let max_x = (viewport.width - footprint.width).max(0.0);
        let max_y = (viewport.height - footprint.height).max(0.0);
        Position {
            x: (pointer.x - self.offset_x).clamp(0.0, max_x),
            y: (pointer.y - self.offset_y).clamp(0.0, max_y),
        }
    }
}

/// An active corner-handle resize
#[derive(Debug, Clone, Copy)]
pub struct ResizeSession {
    start_pointer: PointerSample,
    start_size: Size,
    /// Content-area width/height ratio to hold, when locked
    aspect: Option<f64>,
}

impl ResizeSession {
    pub fn begin(pointer: PointerSample, size: Size, aspect: Option<f64>) -> Self {
        Self {
            start_pointer: pointer,
            start_size: size,
            aspect: aspect.filter(|r| r.is_finite() && *r > 0.0),
        }
    }

    /// New outer size for a pointer sample. Free resizes clamp each axis
    /// independently; aspect-locked resizes drive from the larger delta,
    /// derive the other axis from the ratio, and restore the ratio after
    /// viewport clamping.
    pub fn size_for(
        &self,
        pointer: PointerSample,
        window_position: Position,
        viewport: Viewport,
    ) -> Size {
        let dx = pointer.x - self.start_pointer.x;
        let dy = pointer.y - self.start_pointer.y;

        let Some(ratio) = self.aspect else {
            let max_w = viewport.width - window_position.x - EDGE_MARGIN;
            let max_h = viewport.height - window_position.y - EDGE_MARGIN;
            return Size {
                width: (self.start_size.width + dx).min(max_w).max(MIN_WIDTH),
                height: (self.start_size.height + dy).min(max_h).max(MIN_HEIGHT),
            };
        };

        let min_content_w = MIN_WIDTH - chrome_width();
        let min_content_h = MIN_HEIGHT - chrome_height();

        // Larger-magnitude delta drives; the other axis follows the ratio
        let mut content_w = if dx.abs() >= dy.abs() {
            (self.start_size.width - chrome_width() + dx).max(min_content_w)
        } else {
            let content_h = (self.start_size.height - chrome_height() + dy).max(min_content_h);
            (content_h * ratio).max(min_content_w)
        };
        let mut content_h = content_w / ratio;

        // Minimums before clamping so a degenerate drag cannot invert
        if content_h < min_content_h {
            content_h = min_content_h;
            content_w = content_h * ratio;
        }

        // Viewport containment; whichever axis clamps re-derives the other
        let avail_w = viewport.width - window_position.x - EDGE_MARGIN - chrome_width();
        let avail_h = viewport.height - window_position.y - EDGE_MARGIN - chrome_height();
        if avail_w > 0.0 && content_w > avail_w {
            content_w = avail_w;
            content_h = content_w / ratio;
        }
        if avail_h > 0.0 && content_h > avail_h {
            content_h = avail_h;
            content_w = content_h * ratio;
        }

        Size {
            width: content_w + chrome_width(),
            height: content_h + chrome_height(),
        }
    }
}

/// Viewport-centred maximized geometry for an aspect-locked window: the
/// content area fills the viewport minus margins while holding the ratio
pub fn maximized_geometry(aspect: f64, viewport: Viewport) -> (Position, Size) {
    let avail_w = (viewport.width - 2.0 * EDGE_MARGIN - chrome_width()).max(1.0);
    let avail_h = (viewport.height - 2.0 * EDGE_MARGIN - chrome_height()).max(1.0);

    let mut content_w = avail_w;
    let mut content_h = content_w / aspect;
    if content_h > avail_h {
        content_h = avail_h;
        content_w = content_h * aspect;
    }

    let size = Size {
        width: content_w + chrome_width(),
        height: content_h + chrome_height(),
    };
    let position = Position {
        x: ((viewport.width - size.width) / 2.0).max(0.0),
        y: ((viewport.height - size.height) / 2.0).max(0.0),
    };
    (position, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Viewport = Viewport {
        width: 1280.0,
        height: 800.0,
    };

    fn content_ratio(outer: Size) -> f64 {
        (outer.width - chrome_width()) / (outer.height - chrome_height())
    }

    #[test]
    fn test_drag_follows_pointer_minus_offset() {
        let session = DragSession::begin(
            PointerSample { x: 150.0, y: 120.0 },
            Position { x: 100.0, y: 100.0 },
        );
        let pos = session.position_for(
            PointerSample { x: 300.0, y: 250.0 },
            Size {
                width: 400.0,
                height: 300.0,
            },
            VIEWPORT,
        );
        assert_eq!(pos, Position { x: 250.0, y: 230.0 });
    }

    #[test]
    fn test_drag_containment_on_every_sample() {
        let footprint = Size {
            width: 400.0,
            height: 300.0,
        };
        let session = DragSession::begin(
            PointerSample { x: 10.0, y: 10.0 },
            Position { x: 0.0, y: 0.0 },
        );
        let samples = [
            PointerSample { x: -500.0, y: -500.0 },
            PointerSample { x: 5000.0, y: 5000.0 },
            PointerSample { x: 1275.0, y: 3.0 },
            PointerSample { x: 640.0, y: 790.0 },
        ];
        for pointer in samples {
            let pos = session.position_for(pointer, footprint, VIEWPORT);
            assert!(pos.x >= 0.0 && pos.x <= VIEWPORT.width - footprint.width);
            assert!(pos.y >= 0.0 && pos.y <= VIEWPORT.height - footprint.height);
        }
    }

    #[test]
    fn test_drag_oversized_window_pins_to_origin() {
        let footprint = Size {
            width: 2000.0,
            height: 1200.0,
        };
        let session = DragSession::begin(
            PointerSample { x: 0.0, y: 0.0 },
            Position { x: 0.0, y: 0.0 },
        );
        let pos = session.position_for(PointerSample { x: 400.0, y: 400.0 }, footprint, VIEWPORT);
        assert_eq!(pos, Position { x: 0.0, y: 0.0 });
    }

    #[test]
    fn test_free_resize_enforces_minimums() {
        let session = ResizeSession::begin(
            PointerSample { x: 500.0, y: 400.0 },
            Size {
                width: 400.0,
                height: 300.0,
            },
            None,
        );
        let size = session.size_for(
            PointerSample {
                x: -1000.0,
                y: -1000.0,
            },
            Position { x: 100.0, y: 100.0 },
            VIEWPORT,
        );
        assert_eq!(size.width, MIN_WIDTH);
        assert_eq!(size.height, MIN_HEIGHT);
    }

    #[test]
    fn test_free_resize_clamps_to_viewport() {
        let session = ResizeSession::begin(
            PointerSample { x: 500.0, y: 400.0 },
            Size {
                width: 400.0,
                height: 300.0,
            },
            None,
        );
        let origin = Position { x: 600.0, y: 500.0 };
        let size = session.size_for(
            PointerSample {
                x: 5000.0,
                y: 5000.0,
            },
            origin,
            VIEWPORT,
        );
        assert_eq!(size.width, VIEWPORT.width - origin.x - EDGE_MARGIN);
        assert_eq!(size.height, VIEWPORT.height - origin.y - EDGE_MARGIN);
    }

    #[test]
    fn test_aspect_resize_holds_content_ratio() {
        let ratio = 4.0 / 3.0;
        let start = Size {
            width: 400.0 + chrome_width(),
            height: 300.0 + chrome_height(),
        };
        let session =
            ResizeSession::begin(PointerSample { x: 500.0, y: 400.0 }, start, Some(ratio));

        for pointer in [
            PointerSample { x: 620.0, y: 410.0 }, // width-driven grow
            PointerSample { x: 510.0, y: 550.0 }, // height-driven grow
            PointerSample { x: 380.0, y: 390.0 }, // width-driven shrink
        ] {
            let size = session.size_for(pointer, Position { x: 50.0, y: 50.0 }, VIEWPORT);
            assert!((content_ratio(size) - ratio).abs() < 1e-9);
        }
    }

    #[test]
    fn test_aspect_resize_restores_ratio_after_clamp() {
        let ratio = 16.0 / 9.0;
        let start = Size {
            width: 320.0 + chrome_width(),
            height: 180.0 + chrome_height(),
        };
        let session =
            ResizeSession::begin(PointerSample { x: 400.0, y: 300.0 }, start, Some(ratio));

        // Dragged far past the viewport edge: both axes would overflow
        let origin = Position { x: 700.0, y: 300.0 };
        let size = session.size_for(
            PointerSample {
                x: 4000.0,
                y: 3000.0,
            },
            origin,
            VIEWPORT,
        );

        assert!((content_ratio(size) - ratio).abs() < 1e-9);
        assert!(origin.x + size.width <= VIEWPORT.width - EDGE_MARGIN + 1e-9);
        assert!(origin.y + size.height <= VIEWPORT.height - EDGE_MARGIN + 1e-9);
    }

    #[test]
    fn test_aspect_resize_respects_minimums() {
        let ratio = 1.5;
        let start = Size {
            width: 450.0 + chrome_width(),
            height: 300.0 + chrome_height(),
        };
        let session =
            ResizeSession::begin(PointerSample { x: 500.0, y: 400.0 }, start, Some(ratio));
        let size = session.size_for(
            PointerSample {
                x: -2000.0,
                y: -1999.0,
            },
            Position { x: 20.0, y: 20.0 },
            VIEWPORT,
        );
        assert!(size.width >= MIN_WIDTH - 1e-9);
        assert!((content_ratio(size) - ratio).abs() < 1e-9);
    }

    #[test]
    fn test_maximized_geometry_centres_and_holds_ratio() {
        let ratio = 3.0 / 2.0;
        let (pos, size) = maximized_geometry(ratio, VIEWPORT);
        assert!((content_ratio(size) - ratio).abs() < 1e-9);
        assert!((pos.x - (VIEWPORT.width - size.width) / 2.0).abs() < 1e-9);
        assert!((pos.y - (VIEWPORT.height - size.height) / 2.0).abs() < 1e-9);
        assert!(size.height <= VIEWPORT.height - 2.0 * EDGE_MARGIN + chrome_height() + 1e-9);
    }

    #[test]
    fn test_tall_media_maximizes_against_height() {
        // Portrait ratio: height is the binding constraint
        let (_, size) = maximized_geometry(0.6, VIEWPORT);
        let expected_h = VIEWPORT.height - 2.0 * EDGE_MARGIN;
        assert!((size.height - expected_h).abs() < 1e-9);
        assert!(size.width < VIEWPORT.width / 2.0);
    }
}
