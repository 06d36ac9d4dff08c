//! Layer-cache dirty tracking observed as pixels.

mod common;

use common::{BLUE, RED, SolidRect};
use vignette::{LayerCache, PixelCanvas, PixelSize, Point, Rect};

fn render(layer: &mut LayerCache, size: PixelSize) -> vignette::FrameRgba {
    let mut canvas = PixelCanvas::new(size);
    layer.render(&mut canvas);
    canvas.into_frame()
}

#[test]
fn invalidation_takes_effect_only_after_the_next_add() {
    let size = PixelSize::new(128, 128);
    let rect = SolidRect::new(Rect::new(0.0, 0.0, 100.0, 100.0), RED);
    let drawable = rect.as_drawable();
    let mut layer = LayerCache::new();

    layer.add(&drawable);
    let frame = render(&mut layer, size);
    assert_eq!(frame.pixel(50, 50), Some(RED));

    // Recolor without re-submitting: the cached tree still paints red.
    rect.set_color(BLUE);
    let frame = render(&mut layer, size);
    assert_eq!(frame.pixel(50, 50), Some(RED));

    layer.add(&drawable);
    let frame = render(&mut layer, size);
    assert_eq!(frame.pixel(50, 50), Some(BLUE));
}

#[test]
fn unchanged_drawable_is_not_rerecorded_but_still_paints() {
    let size = PixelSize::new(64, 64);
    let rect = SolidRect::new(Rect::new(0.0, 0.0, 32.0, 32.0), RED);
    let drawable = rect.as_drawable();
    let mut layer = LayerCache::new();

    layer.add(&drawable);
    render(&mut layer, size);

    layer.clear();
    layer.add(&drawable);
    let frame = render(&mut layer, size);
    assert_eq!(frame.pixel(10, 10), Some(RED));
    assert_eq!(layer.live_entries(), 1);
}

#[test]
fn later_submissions_paint_over_earlier_ones() {
    let size = PixelSize::new(64, 64);
    let a = SolidRect::new(Rect::new(0.0, 0.0, 40.0, 40.0), RED);
    let b = SolidRect::new(Rect::new(0.0, 0.0, 40.0, 40.0), BLUE);
    let mut layer = LayerCache::new();

    layer.add(&a.as_drawable());
    layer.add(&b.as_drawable());
    let frame = render(&mut layer, size);
    assert_eq!(frame.pixel(20, 20), Some(BLUE));
}

#[test]
fn hit_test_returns_last_submitted_at_overlap() {
    let a = SolidRect::new(Rect::new(0.0, 0.0, 40.0, 40.0), RED);
    let b = SolidRect::new(Rect::new(20.0, 20.0, 60.0, 60.0), BLUE);
    let mut layer = LayerCache::new();

    let da = a.as_drawable();
    let db = b.as_drawable();
    layer.add(&da);
    layer.add(&db);

    let hit = layer.hit_test(Point::new(30.0, 30.0)).unwrap();
    assert!(std::sync::Arc::ptr_eq(&hit, &db));
    let hit = layer.hit_test(Point::new(5.0, 5.0)).unwrap();
    assert!(std::sync::Arc::ptr_eq(&hit, &da));
    assert!(layer.hit_test(Point::new(100.0, 100.0)).is_none());
}

#[test]
fn clear_all_cache_disposes_everything() {
    let rect = SolidRect::new(Rect::new(0.0, 0.0, 10.0, 10.0), RED);
    let mut layer = LayerCache::new();
    layer.add(&rect.as_drawable());
    assert_eq!(layer.live_entries(), 1);

    layer.clear_all_cache();
    assert_eq!(layer.live_entries(), 0);
    assert_eq!(layer.current_len(), 0);

    let frame = render(&mut layer, PixelSize::new(16, 16));
    assert_eq!(frame.pixel(5, 5), Some(vignette::Rgba8::TRANSPARENT));
}
