//! The logical visual object contract.
//!
//! A [`Drawable`] is an identity-stable object whose rendered form may change over time. The
//! cache layer records each drawable into a persistent node tree and only re-records when the
//! drawable reports new content, so invalidation is expressed as a monotonically increasing
//! version counter rather than a subscription: the cache remembers the version it last recorded
//! and compares on every `add`/`render`.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::graph::canvas::RecordingCanvas;

/// A logical, possibly time-varying visual object.
///
/// Identity is the `Arc` allocation: two clones of the same `Arc` are the same drawable to the
/// cache, two separate allocations are distinct even if they draw identical content.
pub trait Drawable: Debug {
    /// Record the drawable's current content.
    ///
    /// Called exactly once per dirty cache entry per frame; must re-submit the full operation
    /// sequence (the recording canvas reuses unchanged prefixes internally).
    fn render(&self, canvas: &mut RecordingCanvas<'_>);

    /// Current content version.
    ///
    /// Must increase whenever a future [`render`](Drawable::render) call would produce
    /// different node content. Values never decrease.
    fn content_version(&self) -> u64;
}

/// Monotonic version counter for [`Drawable`] implementors.
///
/// Embed one and return [`ContentVersion::get`] from `content_version`; call
/// [`ContentVersion::invalidate`] whenever rendered content changes.
#[derive(Debug, Default)]
pub struct ContentVersion(AtomicU64);

impl ContentVersion {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// The current version.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Bump the version, marking any cached recording stale.
    pub fn invalidate(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

/// Stable identity key for a drawable: the data-pointer half of the `Arc`.
pub(crate) fn identity_key(drawable: &Arc<dyn Drawable>) -> usize {
    Arc::as_ptr(drawable) as *const () as usize
}

/// Identity key for a weak reference, comparable with [`identity_key`].
pub(crate) fn weak_identity_key(drawable: &Weak<dyn Drawable>) -> usize {
    Weak::as_ptr(drawable) as *const () as usize
}
