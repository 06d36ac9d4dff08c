//! Vignette is a retained-mode render graph with timeline-driven incremental composition.
//!
//! The core loop of a non-linear compositor: [`Drawable`]s record their content into persistent
//! node trees through a diffing [`RecordingCanvas`] that reuses unchanged nodes frame over
//! frame; a per-layer [`LayerCache`] re-records only drawables whose content version moved; an
//! ordered [`Scene`] composes layers by z-index; a [`TimelineEvaluator`] drives element
//! enter/exit lifecycles and operator pipelines against the playhead; the [`Compositor`] facade
//! turns playhead positions into pixel frames.
//!
//! Concrete content (decoded media, shaped text, pixel effects) lives outside this crate behind
//! the [`Drawable`], [`FilterEffect`] and [`SourceOperator`] contracts.
#![forbid(unsafe_code)]

mod foundation;

pub mod cache;
pub mod drawable;
pub mod graph;
pub mod paint;
pub mod render;
pub mod resource;
pub mod scene;
pub mod timeline;

pub use crate::foundation::core::{
    Affine, BezPath, Fps, FrameIndex, FrameRange, PixelSize, Point, Rect, Vec2,
};
pub use crate::foundation::error::{VignetteError, VignetteResult};

pub use crate::cache::layer::{CacheHook, EntryId, LayerCache};
pub use crate::drawable::{ContentVersion, Drawable};
pub use crate::graph::canvas::{Canvas, RecordingCanvas};
pub use crate::graph::node::{Container, NodeId, RenderNode};
pub use crate::paint::{BlendMode, Brush, ClipOp, ClipShape, Pen, Rgba8, StrokeAlign};
pub use crate::render::compose::{BusyFlag, BusyGuard, Compositor};
pub use crate::render::dispatch::Dispatcher;
pub use crate::render::target::{FrameRgba, PixelCanvas};
pub use crate::resource::{FilterEffect, FormattedText, ImageSource};
pub use crate::scene::Scene;
pub use crate::timeline::element::{Element, ElementId, Evaluation, Timeline};
pub use crate::timeline::evaluator::{TickReport, TimelineEvaluator};
pub use crate::timeline::operator::{
    FilterScope, OperatorRole, PublishDrawable, Renderable, RenderableList, RouteToLayer, Sound,
    SourceOperator,
};
