//! Drawable-keyed node-tree caching.

pub mod entry;
pub mod layer;
