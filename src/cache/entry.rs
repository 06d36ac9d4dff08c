//! One cached drawable: its persistent node tree and dirty state.

use std::sync::{Arc, Weak};

use crate::drawable::Drawable;
use crate::graph::canvas::RecordingCanvas;
use crate::graph::node::Container;

/// Pairs a weakly-held [`Drawable`] with its recorded node tree.
///
/// The entry never keeps the drawable alive: when all external references drop, the cache
/// sweeps the entry. Dirtiness is the drawable's `content_version` compared against the version
/// captured at the last recording.
pub struct CacheEntry {
    drawable: Weak<dyn Drawable>,
    root: Container,
    last_rendered_version: Option<u64>,
    submitted: bool,
    disposed: bool,
}

impl CacheEntry {
    pub(crate) fn new(drawable: &Arc<dyn Drawable>) -> Self {
        Self {
            drawable: Arc::downgrade(drawable),
            root: Container::new(),
            last_rendered_version: None,
            submitted: false,
            disposed: false,
        }
    }

    /// The recorded tree. Empty until the first recording.
    pub fn root(&self) -> &Container {
        &self.root
    }

    /// Upgrade the weak association; `None` once the drawable is gone.
    pub fn drawable(&self) -> Option<Arc<dyn Drawable>> {
        self.drawable.upgrade()
    }

    pub(crate) fn weak_drawable(&self) -> &Weak<dyn Drawable> {
        &self.drawable
    }

    /// Generation check: does this entry still belong to `drawable`?
    ///
    /// Identity maps key by pointer, and an allocator may reuse a freed pointer, so a key hit
    /// alone is not proof of ownership.
    pub(crate) fn belongs_to(&self, drawable: &Arc<dyn Drawable>) -> bool {
        self.drawable
            .upgrade()
            .is_some_and(|held| Arc::ptr_eq(&held, drawable))
    }

    /// Whether the tree no longer reflects the drawable's current content.
    ///
    /// Never-recorded entries are dirty; dead or disposed entries are not (they can no longer
    /// be recorded at all).
    pub fn is_dirty(&self) -> bool {
        if self.disposed {
            return false;
        }
        match (self.drawable.upgrade(), self.last_rendered_version) {
            (Some(d), Some(v)) => d.content_version() != v,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Re-record the drawable into the persistent tree and clear the dirty flag.
    ///
    /// Returns `false` (leaving the tree untouched) when the entry is disposed or the drawable
    /// is gone.
    pub(crate) fn record(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        let Some(drawable) = self.drawable.upgrade() else {
            return false;
        };
        // Capture the version before rendering so an invalidation raced against recording
        // leaves the entry dirty rather than silently stale.
        let version = drawable.content_version();
        let root = std::mem::take(&mut self.root);
        let mut canvas = RecordingCanvas::new(root);
        drawable.render(&mut canvas);
        self.root = canvas.finish();
        self.last_rendered_version = Some(version);
        true
    }

    /// Mark the entry as submitted this frame. The next render consumes the mark.
    pub(crate) fn mark_submitted(&mut self) {
        self.submitted = true;
    }

    /// Consume the submission mark, returning whether it was set.
    ///
    /// Render-time re-recording only applies to entries invalidated between this frame's
    /// submission and its render; an invalidation that lands after an earlier frame keeps the
    /// stale tree until the drawable is submitted again.
    pub(crate) fn take_submitted(&mut self) -> bool {
        std::mem::replace(&mut self.submitted, false)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Dispose the node tree. Idempotent; a disposed entry is never recorded or rendered.
    pub(crate) fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.root.dispose();
        self.last_rendered_version = None;
    }
}
