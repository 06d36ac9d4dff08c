//! End-to-end frame composition through the compositor facade.

mod common;

use std::sync::Arc;

use common::{BLUE, RED, SolidRect};
use vignette::{
    Compositor, Element, FrameIndex, FrameRange, PixelSize, Point, PublishDrawable, Rect, Rgba8,
};

fn range(start: u64, end: u64) -> FrameRange {
    FrameRange {
        start: FrameIndex(start),
        end: FrameIndex(end),
    }
}

#[test]
fn frames_track_element_activity() {
    common::init_tracing();
    let rect = SolidRect::new(Rect::new(0.0, 0.0, 16.0, 16.0), RED);
    let mut compositor = Compositor::new(PixelSize::new(32, 32));
    compositor.timeline_mut().add(
        Element::new(range(10, 20), 0)
            .with_operator(Box::new(PublishDrawable::new(rect.as_drawable()))),
    );

    let before = compositor.render_frame(FrameIndex(5)).unwrap().unwrap();
    assert_eq!(before.pixel(8, 8), Some(Rgba8::TRANSPARENT));

    let during = compositor.render_frame(FrameIndex(15)).unwrap().unwrap();
    assert_eq!(during.pixel(8, 8), Some(RED));

    let after = compositor.render_frame(FrameIndex(20)).unwrap().unwrap();
    assert_eq!(after.pixel(8, 8), Some(Rgba8::TRANSPARENT));
}

#[test]
fn invalidated_content_reaches_the_next_frame() {
    let rect = SolidRect::new(Rect::new(0.0, 0.0, 16.0, 16.0), RED);
    let mut compositor = Compositor::new(PixelSize::new(32, 32));
    compositor.timeline_mut().add(
        Element::new(range(0, 100), 0)
            .with_operator(Box::new(PublishDrawable::new(rect.as_drawable()))),
    );

    let frame = compositor.render_frame(FrameIndex(0)).unwrap().unwrap();
    assert_eq!(frame.pixel(8, 8), Some(RED));

    rect.set_color(BLUE);
    let frame = compositor.render_frame(FrameIndex(1)).unwrap().unwrap();
    assert_eq!(frame.pixel(8, 8), Some(BLUE));
}

#[test]
fn render_in_progress_drops_the_frame() {
    common::init_tracing();
    let mut compositor = Compositor::new(PixelSize::new(16, 16));
    let flag = compositor.render_flag();

    let guard = flag.try_acquire().unwrap();
    assert!(compositor.render_frame(FrameIndex(0)).unwrap().is_none());
    drop(guard);
    assert!(compositor.render_frame(FrameIndex(0)).unwrap().is_some());
}

#[test]
fn compositor_hit_test_matches_rendered_content() {
    let rect = SolidRect::new(Rect::new(4.0, 4.0, 20.0, 20.0), RED);
    let drawable = rect.as_drawable();
    let mut compositor = Compositor::new(PixelSize::new(32, 32));
    compositor.timeline_mut().add(
        Element::new(range(0, 10), 0)
            .with_operator(Box::new(PublishDrawable::new(Arc::clone(&drawable)))),
    );

    compositor.render_frame(FrameIndex(5)).unwrap();
    let hit = compositor.hit_test(Point::new(10.0, 10.0)).unwrap();
    assert!(Arc::ptr_eq(&hit, &drawable));
    assert!(compositor.hit_test(Point::new(30.0, 30.0)).is_none());
}
