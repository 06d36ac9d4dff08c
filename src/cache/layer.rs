//! Per-layer node cache with dirty tracking.
//!
//! A [`LayerCache`] owns one persistent node tree per distinct drawable ever submitted to its
//! z-index, keyed through a generation-checked arena (drawables are associated weakly; dropping
//! every external reference lets the cache sweep the entry). The ordered current-frame list is
//! rebuilt every frame from the drawables submitted that frame.

use std::collections::HashMap;
use std::sync::Arc;

use slotmap::SlotMap;

use crate::cache::entry::CacheEntry;
use crate::drawable::{Drawable, identity_key, weak_identity_key};
use crate::graph::canvas::Canvas;
use crate::graph::hit::hit_any;
use crate::graph::node::Container;

slotmap::new_key_type! {
    /// Generation-checked handle to a cache entry.
    pub struct EntryId;
}

/// Collaborator hook for subtree-level bitmap caching.
///
/// After a cache entry renders, its root is offered here; an implementation may snapshot hot
/// subtrees into bitmaps. The core itself never caches pixels.
pub trait CacheHook {
    fn offer(&mut self, root: &Container);
}

/// Cache of drawable-keyed node trees for one z-index.
#[derive(Default)]
pub struct LayerCache {
    entries: SlotMap<EntryId, CacheEntry>,
    by_identity: HashMap<usize, EntryId>,
    current: Vec<EntryId>,
    hook: Option<Box<dyn CacheHook>>,
}

impl LayerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the subtree bitmap-cache collaborator.
    pub fn set_cache_hook(&mut self, hook: Box<dyn CacheHook>) {
        self.hook = Some(hook);
    }

    /// Submit `drawable` for the current frame.
    ///
    /// Creates the cache entry on first sight, re-records its node tree when dirty (newly
    /// created or invalidated since the last recording) and appends it to the current-frame
    /// list. Submitting the same drawable twice in one frame adds it once.
    pub fn add(&mut self, drawable: &Arc<dyn Drawable>) -> EntryId {
        let key = identity_key(drawable);
        let id = match self.by_identity.get(&key).copied() {
            Some(id) if self.entries.get(id).is_some_and(|e| e.belongs_to(drawable)) => id,
            Some(stale) => {
                // Pointer reuse: a dead entry's key collided with a new allocation.
                if let Some(mut entry) = self.entries.remove(stale) {
                    entry.dispose();
                }
                let id = self.entries.insert(CacheEntry::new(drawable));
                self.by_identity.insert(key, id);
                id
            }
            None => {
                let id = self.entries.insert(CacheEntry::new(drawable));
                self.by_identity.insert(key, id);
                id
            }
        };

        if let Some(entry) = self.entries.get_mut(id) {
            if entry.is_dirty() {
                entry.record();
            }
            entry.mark_submitted();
        }
        if !self.current.contains(&id) {
            self.current.push(id);
        }
        id
    }

    /// Replace the current-frame list with `drawables`, in order.
    pub fn update_all(&mut self, drawables: &[Arc<dyn Drawable>]) {
        self.clear();
        for drawable in drawables {
            self.add(drawable);
        }
    }

    /// Render every current-frame entry into `target`.
    ///
    /// Only entries invalidated after this frame's submission re-record here; an entry whose
    /// drawable changed since an earlier frame replays its stale tree until the next
    /// submission.
    pub fn render(&mut self, target: &mut dyn Canvas) {
        let ids: Vec<EntryId> = self.current.clone();
        for id in ids {
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            if entry.is_disposed() {
                continue;
            }
            if entry.drawable().is_none() {
                self.sweep(id);
                continue;
            }
            if entry.take_submitted() && entry.is_dirty() {
                entry.record();
            }
            for child in entry.root().children() {
                child.replay(target);
            }
            if let Some(hook) = self.hook.as_mut() {
                hook.offer(entry.root());
            }
        }
    }

    /// Empty the current-frame list and reclaim entries whose drawable has dropped; live
    /// entries persist for reuse next frame.
    pub fn clear(&mut self) {
        self.current.clear();
        let dead: Vec<EntryId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.drawable().is_none())
            .map(|(id, _)| id)
            .collect();
        for id in dead {
            self.sweep(id);
        }
    }

    /// Dispose every entry and its node tree. Used when the layer becomes permanently inactive.
    pub fn clear_all_cache(&mut self) {
        for (_, entry) in self.entries.iter_mut() {
            entry.dispose();
        }
        self.entries.clear();
        self.by_identity.clear();
        self.current.clear();
    }

    /// Topmost drawable whose tree reports a hit, scanning last-submitted first.
    pub fn hit_test(&self, point: kurbo::Point) -> Option<Arc<dyn Drawable>> {
        for id in self.current.iter().rev() {
            let Some(entry) = self.entries.get(*id) else {
                continue;
            };
            if entry.is_disposed() {
                continue;
            }
            let Some(drawable) = entry.drawable() else {
                continue;
            };
            if hit_any(entry.root(), point) {
                return Some(drawable);
            }
        }
        None
    }

    /// Number of live (non-swept) cache entries.
    pub fn live_entries(&self) -> usize {
        self.entries.len()
    }

    /// Number of entries submitted this frame.
    pub fn current_len(&self) -> usize {
        self.current.len()
    }

    /// Shared read access to an entry, for inspection and tests.
    pub fn entry(&self, id: EntryId) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    fn sweep(&mut self, id: EntryId) {
        if let Some(mut entry) = self.entries.remove(id) {
            let key = weak_identity_key(entry.weak_drawable());
            if self.by_identity.get(&key) == Some(&id) {
                self.by_identity.remove(&key);
            }
            entry.dispose();
        }
        self.current.retain(|c| *c != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::ContentVersion;
    use crate::foundation::core::Rect;
    use crate::graph::canvas::RecordingCanvas;
    use crate::graph::node::NodeId;
    use crate::paint::{Brush, Rgba8};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct TestRect {
        version: ContentVersion,
        renders: AtomicUsize,
    }

    impl Drawable for TestRect {
        fn render(&self, canvas: &mut RecordingCanvas<'_>) {
            self.renders.fetch_add(1, Ordering::Relaxed);
            canvas.draw_rect(
                Rect::new(0.0, 0.0, 100.0, 100.0),
                Some(Brush::Solid(Rgba8::opaque(255, 0, 0))),
                None,
            );
        }

        fn content_version(&self) -> u64 {
            self.version.get()
        }
    }

    fn rect_drawable() -> (Arc<TestRect>, Arc<dyn Drawable>) {
        let concrete = Arc::new(TestRect::default());
        let as_dyn: Arc<dyn Drawable> = concrete.clone();
        (concrete, as_dyn)
    }

    fn render_into_sink(layer: &mut LayerCache) {
        let mut sink = crate::render::target::PixelCanvas::new(
            crate::foundation::core::PixelSize::new(8, 8),
        );
        layer.render(&mut sink);
    }

    #[test]
    fn add_records_once_until_invalidated() {
        let (concrete, drawable) = rect_drawable();
        let mut layer = LayerCache::new();

        layer.add(&drawable);
        layer.clear();
        layer.add(&drawable);
        assert_eq!(concrete.renders.load(Ordering::Relaxed), 1);

        concrete.version.invalidate();
        layer.clear();
        layer.add(&drawable);
        assert_eq!(concrete.renders.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn invalidation_forces_rerecord_even_for_identical_content() {
        let (concrete, drawable) = rect_drawable();
        let mut layer = LayerCache::new();

        let id = layer.add(&drawable);
        assert!(!layer.entry(id).unwrap().is_dirty());

        concrete.version.invalidate();
        assert!(layer.entry(id).unwrap().is_dirty());

        layer.clear();
        layer.add(&drawable);
        assert!(!layer.entry(id).unwrap().is_dirty());
        assert_eq!(concrete.renders.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn duplicate_submission_is_added_once() {
        let (_concrete, drawable) = rect_drawable();
        let mut layer = LayerCache::new();
        layer.add(&drawable);
        layer.add(&drawable);
        assert_eq!(layer.current_len(), 1);
        assert_eq!(layer.live_entries(), 1);
    }

    #[test]
    fn update_all_rebuilds_current_list() {
        let (_a, da) = rect_drawable();
        let (_b, db) = rect_drawable();
        let mut layer = LayerCache::new();

        layer.update_all(&[da.clone(), db.clone()]);
        assert_eq!(layer.current_len(), 2);
        assert_eq!(layer.live_entries(), 2);

        layer.update_all(&[db]);
        assert_eq!(layer.current_len(), 1);
        // Entries persist across frames even when not current.
        assert_eq!(layer.live_entries(), 2);

        layer.update_all(&[]);
        assert_eq!(layer.current_len(), 0);
    }

    #[test]
    fn render_keeps_the_stale_tree_for_cross_frame_invalidations() {
        let (concrete, drawable) = rect_drawable();
        let mut layer = LayerCache::new();

        layer.add(&drawable);
        render_into_sink(&mut layer);
        assert_eq!(concrete.renders.load(Ordering::Relaxed), 1);

        // Invalidated after the frame completed: render alone replays the old tree.
        concrete.version.invalidate();
        render_into_sink(&mut layer);
        assert_eq!(concrete.renders.load(Ordering::Relaxed), 1);

        layer.add(&drawable);
        assert_eq!(concrete.renders.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn render_rerecords_when_invalidation_lands_after_submission() {
        let (concrete, drawable) = rect_drawable();
        let mut layer = LayerCache::new();

        layer.add(&drawable);
        concrete.version.invalidate();
        render_into_sink(&mut layer);
        assert_eq!(concrete.renders.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn clear_reclaims_entries_for_dropped_drawables() {
        let (_keep_concrete, keep) = rect_drawable();
        let (gone_concrete, gone) = rect_drawable();
        let mut layer = LayerCache::new();
        layer.add(&keep);
        layer.add(&gone);

        layer.clear();
        assert_eq!(layer.live_entries(), 2);

        drop(gone);
        drop(gone_concrete);
        layer.clear();
        assert_eq!(layer.live_entries(), 1);
    }

    #[test]
    fn clear_keeps_entries_clear_all_cache_drops_them() {
        let (_concrete, drawable) = rect_drawable();
        let mut layer = LayerCache::new();
        layer.add(&drawable);

        layer.clear();
        assert_eq!(layer.current_len(), 0);
        assert_eq!(layer.live_entries(), 1);

        layer.clear_all_cache();
        assert_eq!(layer.live_entries(), 0);
    }

    #[test]
    fn node_tree_persists_across_frames() {
        let (_concrete, drawable) = rect_drawable();
        let mut layer = LayerCache::new();

        let id = layer.add(&drawable);
        let node_id: NodeId = layer.entry(id).unwrap().root().children()[0].id();

        layer.clear();
        layer.add(&drawable);
        assert_eq!(layer.entry(id).unwrap().root().children()[0].id(), node_id);
    }

    #[test]
    fn dropping_drawable_lets_render_sweep_the_entry() {
        let (concrete, drawable) = rect_drawable();
        let mut layer = LayerCache::new();
        layer.add(&drawable);
        drop(drawable);
        drop(concrete);

        render_into_sink(&mut layer);
        assert_eq!(layer.live_entries(), 0);
        assert_eq!(layer.current_len(), 0);
    }

    #[test]
    fn hit_test_returns_topmost_of_current_frame() {
        let (_a, da) = rect_drawable();
        let (_b, db) = rect_drawable();
        let mut layer = LayerCache::new();
        layer.add(&da);
        layer.add(&db);

        let hit = layer.hit_test(kurbo::Point::new(50.0, 50.0)).unwrap();
        assert!(Arc::ptr_eq(&hit, &db));
        assert!(layer.hit_test(kurbo::Point::new(500.0, 50.0)).is_none());
    }

    struct CountingHook(Arc<AtomicUsize>);

    impl CacheHook for CountingHook {
        fn offer(&mut self, _root: &Container) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn render_offers_roots_to_cache_hook() {
        let offered = Arc::new(AtomicUsize::new(0));
        let (_concrete, drawable) = rect_drawable();
        let mut layer = LayerCache::new();
        layer.set_cache_hook(Box::new(CountingHook(offered.clone())));
        layer.add(&drawable);

        render_into_sink(&mut layer);
        assert_eq!(offered.load(Ordering::Relaxed), 1);
    }
}
