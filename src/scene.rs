//! Ordered multi-layer scene composition.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::layer::LayerCache;
use crate::drawable::Drawable;
use crate::foundation::core::PixelSize;
use crate::graph::canvas::Canvas;
use crate::paint::Rgba8;

/// An ordered collection of [`LayerCache`]s keyed by integer z-index.
///
/// The scene owns no drawables, only layer containers. Layers are created lazily the first time
/// their index is referenced; render order is purely key order, independent of creation order.
#[derive(Default)]
pub struct Scene {
    size: PixelSize,
    layers: BTreeMap<i32, LayerCache>,
}

impl Scene {
    pub fn new(size: PixelSize) -> Self {
        Self {
            size,
            layers: BTreeMap::new(),
        }
    }

    pub fn size(&self) -> PixelSize {
        self.size
    }

    /// The layer at `z`, created empty on first reference.
    pub fn layer(&mut self, z: i32) -> &mut LayerCache {
        self.layers.entry(z).or_default()
    }

    /// The layer at `z` if it has ever been referenced.
    pub fn existing_layer(&self, z: i32) -> Option<&LayerCache> {
        self.layers.get(&z)
    }

    /// Z-indices with layers, ascending.
    pub fn layer_indices(&self) -> impl Iterator<Item = i32> {
        self.layers.keys().copied()
    }

    /// Compose every layer into `canvas`, low-to-high z-index.
    pub fn render(&mut self, canvas: &mut dyn Canvas) {
        canvas.push_state();
        canvas.clear(Rgba8::TRANSPARENT);
        for layer in self.layers.values_mut() {
            layer.render(canvas);
        }
        canvas.pop();
    }

    /// Topmost hit across layers: descending z-index, first hit wins.
    ///
    /// Distinct from within-layer ordering, which is submission order.
    pub fn hit_test(&self, point: kurbo::Point) -> Option<Arc<dyn Drawable>> {
        for layer in self.layers.values().rev() {
            if let Some(hit) = layer.hit_test(point) {
                return Some(hit);
            }
        }
        None
    }

    /// Empty every layer's current-frame list; cached entries persist.
    pub fn clear(&mut self) {
        for layer in self.layers.values_mut() {
            layer.clear();
        }
    }

    /// Dispose every layer's cache.
    pub fn dispose(&mut self) {
        for layer in self.layers.values_mut() {
            layer.clear_all_cache();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::ContentVersion;
    use crate::foundation::core::Rect;
    use crate::graph::canvas::RecordingCanvas;
    use crate::paint::Brush;
    use kurbo::Point;

    #[derive(Debug)]
    struct Block {
        rect: Rect,
        color: Rgba8,
        version: ContentVersion,
    }

    impl Block {
        fn new(rect: Rect, color: Rgba8) -> Arc<dyn Drawable> {
            Arc::new(Self {
                rect,
                color,
                version: ContentVersion::new(),
            })
        }
    }

    impl Drawable for Block {
        fn render(&self, canvas: &mut RecordingCanvas<'_>) {
            canvas.draw_rect(self.rect, Some(Brush::Solid(self.color)), None);
        }

        fn content_version(&self) -> u64 {
            self.version.get()
        }
    }

    #[test]
    fn layers_are_created_lazily_and_sorted() {
        let mut scene = Scene::new(PixelSize::new(64, 64));
        scene.layer(5);
        scene.layer(-1);
        scene.layer(2);
        let order: Vec<i32> = scene.layer_indices().collect();
        assert_eq!(order, vec![-1, 2, 5]);
    }

    #[test]
    fn hit_test_prefers_higher_layers_over_submission_order() {
        let a = Block::new(Rect::new(0.0, 0.0, 40.0, 40.0), Rgba8::opaque(255, 0, 0));
        let b = Block::new(Rect::new(0.0, 0.0, 40.0, 40.0), Rgba8::opaque(0, 255, 0));

        // B sits on the higher layer but is submitted first.
        let mut scene = Scene::new(PixelSize::new(64, 64));
        scene.layer(1).add(&b);
        scene.layer(0).add(&a);

        let hit = scene.hit_test(Point::new(10.0, 10.0)).unwrap();
        assert!(Arc::ptr_eq(&hit, &b));
    }

    #[test]
    fn clear_preserves_caches_dispose_drops_them() {
        let a = Block::new(Rect::new(0.0, 0.0, 40.0, 40.0), Rgba8::opaque(255, 0, 0));
        let mut scene = Scene::new(PixelSize::new(64, 64));
        scene.layer(0).add(&a);

        scene.clear();
        assert_eq!(scene.existing_layer(0).unwrap().current_len(), 0);
        assert_eq!(scene.existing_layer(0).unwrap().live_entries(), 1);

        scene.dispose();
        assert_eq!(scene.existing_layer(0).unwrap().live_entries(), 0);
    }
}
