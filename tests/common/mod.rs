#![allow(dead_code)]

use std::cell::Cell;
use std::sync::Arc;

use vignette::{Brush, Canvas as _, ContentVersion, Drawable, RecordingCanvas, Rect, Rgba8};

/// Forward tracing output to the test harness, visible under `--nocapture`.
///
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Solid rectangle whose color can change after creation; recolors bump the content version.
#[derive(Debug)]
pub struct SolidRect {
    rect: Rect,
    color: Cell<Rgba8>,
    version: ContentVersion,
}

impl SolidRect {
    pub fn new(rect: Rect, color: Rgba8) -> Arc<Self> {
        Arc::new(Self {
            rect,
            color: Cell::new(color),
            version: ContentVersion::new(),
        })
    }

    pub fn set_color(&self, color: Rgba8) {
        self.color.set(color);
        self.version.invalidate();
    }

    pub fn as_drawable(self: &Arc<Self>) -> Arc<dyn Drawable> {
        Arc::clone(self) as Arc<dyn Drawable>
    }
}

impl Drawable for SolidRect {
    fn render(&self, canvas: &mut RecordingCanvas<'_>) {
        canvas.draw_rect(self.rect, Some(Brush::Solid(self.color.get())), None);
    }

    fn content_version(&self) -> u64 {
        self.version.get()
    }
}

pub const RED: Rgba8 = Rgba8::opaque(255, 0, 0);
pub const GREEN: Rgba8 = Rgba8::opaque(0, 255, 0);
pub const BLUE: Rgba8 = Rgba8::opaque(0, 0, 255);
