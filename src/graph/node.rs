//! Recorded draw-operation nodes.
//!
//! A node is an immutable-per-frame record of one draw or state-push operation. Leaves hold the
//! parameters of a single draw call; containers hold ordered children plus the state push that
//! scopes them (transform, clip, blend, opacity, mask, filter effect). One tree persists per
//! cache entry and is diffed in place by [`RecordingCanvas`](crate::graph::canvas::RecordingCanvas)
//! on every re-record.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::core::{Affine, BezPath, Rect};
use crate::graph::canvas::Canvas;
use crate::paint::{BlendMode, Brush, ClipOp, ClipShape, Pen, Rgba8};
use crate::resource::{FilterEffect, FormattedText, ImageSource};

/// Stable identity of a recorded node, preserved across frames when the node is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shared container behavior: ordered children plus a lazily recomputed aggregate bounds.
#[derive(Debug, Default)]
pub struct Container {
    children: Vec<RenderNode>,
    bounds: std::cell::Cell<Option<Rect>>,
    disposed: bool,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self) -> &[RenderNode] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Union of the children's bounds, normalized, cached until the next mutation.
    pub fn bounds(&self) -> Rect {
        if let Some(b) = self.bounds.get() {
            return b;
        }
        let b = union_bounds(self.children.iter().map(RenderNode::bounds));
        self.bounds.set(Some(b));
        b
    }

    fn invalidate_bounds(&self) {
        self.bounds.set(None);
    }

    pub(crate) fn push_child(&mut self, node: RenderNode) {
        self.children.push(node);
        self.invalidate_bounds();
    }

    /// Take the child at `index` out for descent, leaving a placeholder.
    pub(crate) fn take_child(&mut self, index: usize) -> RenderNode {
        self.invalidate_bounds();
        std::mem::replace(&mut self.children[index], RenderNode::placeholder())
    }

    /// Put a descended-into child back where [`Container::take_child`] removed it.
    pub(crate) fn restore_child(&mut self, index: usize, node: RenderNode) {
        self.children[index] = node;
        self.invalidate_bounds();
    }

    /// Remove and return every child from `index` on.
    pub(crate) fn split_off(&mut self, index: usize) -> Vec<RenderNode> {
        self.invalidate_bounds();
        self.children.split_off(index)
    }

    /// Move all children out of `other` into this container, preserving order.
    ///
    /// Used when a container node is replaced because its own parameters changed: the subtree
    /// below it is still a valid diff baseline.
    pub(crate) fn bring_from(&mut self, other: &mut Container) {
        self.children.append(&mut other.children);
        self.invalidate_bounds();
        other.invalidate_bounds();
    }

    /// Dispose every child exactly once. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for child in &mut self.children {
            child.dispose();
        }
        self.children.clear();
        self.invalidate_bounds();
    }
}

#[derive(Debug)]
pub struct ClearNode {
    pub(crate) id: NodeId,
    pub color: Rgba8,
}

#[derive(Debug)]
pub struct RectNode {
    pub(crate) id: NodeId,
    pub rect: Rect,
    pub fill: Option<Brush>,
    pub pen: Option<Pen>,
}

#[derive(Debug)]
pub struct EllipseNode {
    pub(crate) id: NodeId,
    /// Bounding rect of the inscribed ellipse.
    pub rect: Rect,
    pub fill: Option<Brush>,
    pub pen: Option<Pen>,
}

#[derive(Debug)]
pub struct GeometryNode {
    pub(crate) id: NodeId,
    /// `None` once disposed.
    pub path: Option<Arc<BezPath>>,
    pub fill: Option<Brush>,
    pub pen: Option<Pen>,
}

#[derive(Debug)]
pub struct ImageNode {
    pub(crate) id: NodeId,
    /// `None` once disposed.
    pub image: Option<Arc<ImageSource>>,
}

#[derive(Debug)]
pub struct TextNode {
    pub(crate) id: NodeId,
    /// `None` once disposed.
    pub text: Option<Arc<FormattedText>>,
    pub fill: Option<Brush>,
}

#[derive(Debug)]
pub struct GroupNode {
    pub(crate) id: NodeId,
    pub children: Container,
}

#[derive(Debug)]
pub struct TransformNode {
    pub(crate) id: NodeId,
    pub matrix: Affine,
    pub children: Container,
}

#[derive(Debug)]
pub struct ClipNode {
    pub(crate) id: NodeId,
    pub shape: ClipShape,
    pub op: ClipOp,
    pub children: Container,
}

#[derive(Debug)]
pub struct BlendNode {
    pub(crate) id: NodeId,
    pub mode: BlendMode,
    pub children: Container,
}

#[derive(Debug)]
pub struct OpacityNode {
    pub(crate) id: NodeId,
    pub opacity: f64,
    pub children: Container,
}

#[derive(Debug)]
pub struct OpacityMaskNode {
    pub(crate) id: NodeId,
    pub mask: Brush,
    pub bounds: Rect,
    pub invert: bool,
    pub children: Container,
}

#[derive(Debug)]
pub struct FilterEffectNode {
    pub(crate) id: NodeId,
    /// `None` once disposed.
    pub effect: Option<Arc<dyn FilterEffect>>,
    pub children: Container,
}

/// One recorded operation: a leaf draw call or a state-push container.
#[derive(Debug)]
pub enum RenderNode {
    Clear(ClearNode),
    Rect(RectNode),
    Ellipse(EllipseNode),
    Geometry(GeometryNode),
    Image(ImageNode),
    Text(TextNode),
    Group(GroupNode),
    Transform(TransformNode),
    Clip(ClipNode),
    Blend(BlendNode),
    Opacity(OpacityNode),
    OpacityMask(OpacityMaskNode),
    FilterEffect(FilterEffectNode),
}

impl RenderNode {
    pub(crate) fn placeholder() -> Self {
        RenderNode::Clear(ClearNode {
            id: NodeId(0),
            color: Rgba8::TRANSPARENT,
        })
    }

    /// Stable identity, preserved when the diffing canvas reuses this node.
    pub fn id(&self) -> NodeId {
        match self {
            RenderNode::Clear(n) => n.id,
            RenderNode::Rect(n) => n.id,
            RenderNode::Ellipse(n) => n.id,
            RenderNode::Geometry(n) => n.id,
            RenderNode::Image(n) => n.id,
            RenderNode::Text(n) => n.id,
            RenderNode::Group(n) => n.id,
            RenderNode::Transform(n) => n.id,
            RenderNode::Clip(n) => n.id,
            RenderNode::Blend(n) => n.id,
            RenderNode::Opacity(n) => n.id,
            RenderNode::OpacityMask(n) => n.id,
            RenderNode::FilterEffect(n) => n.id,
        }
    }

    /// The container of a state-push node, `None` for leaves.
    pub fn container(&self) -> Option<&Container> {
        match self {
            RenderNode::Group(n) => Some(&n.children),
            RenderNode::Transform(n) => Some(&n.children),
            RenderNode::Clip(n) => Some(&n.children),
            RenderNode::Blend(n) => Some(&n.children),
            RenderNode::Opacity(n) => Some(&n.children),
            RenderNode::OpacityMask(n) => Some(&n.children),
            RenderNode::FilterEffect(n) => Some(&n.children),
            _ => None,
        }
    }

    pub(crate) fn container_mut(&mut self) -> Option<&mut Container> {
        match self {
            RenderNode::Group(n) => Some(&mut n.children),
            RenderNode::Transform(n) => Some(&mut n.children),
            RenderNode::Clip(n) => Some(&mut n.children),
            RenderNode::Blend(n) => Some(&mut n.children),
            RenderNode::Opacity(n) => Some(&mut n.children),
            RenderNode::OpacityMask(n) => Some(&mut n.children),
            RenderNode::FilterEffect(n) => Some(&mut n.children),
            _ => None,
        }
    }

    /// Aggregate bounds in the node's own coordinate space, normalized.
    pub fn bounds(&self) -> Rect {
        match self {
            RenderNode::Clear(_) => Rect::ZERO,
            RenderNode::Rect(n) => inflate_for_pen(n.rect.abs(), n.pen),
            RenderNode::Ellipse(n) => inflate_for_pen(n.rect.abs(), n.pen),
            RenderNode::Geometry(n) => match &n.path {
                Some(path) => {
                    use kurbo::Shape as _;
                    inflate_for_pen(path.bounding_box().abs(), n.pen)
                }
                None => Rect::ZERO,
            },
            RenderNode::Image(n) => n.image.as_ref().map_or(Rect::ZERO, |i| i.bounds()),
            RenderNode::Text(n) => n.text.as_ref().map_or(Rect::ZERO, |t| t.bounds().abs()),
            RenderNode::Group(n) => n.children.bounds(),
            RenderNode::Transform(n) => n.matrix.transform_rect_bbox(n.children.bounds()).abs(),
            RenderNode::Clip(n) => {
                let inner = n.children.bounds();
                match n.op {
                    ClipOp::Intersect => {
                        let limit = match &n.shape {
                            ClipShape::Rect(r) => r.abs(),
                            ClipShape::Geometry(p) => {
                                use kurbo::Shape as _;
                                p.bounding_box().abs()
                            }
                        };
                        let out = inner.intersect(limit);
                        if out.width() <= 0.0 || out.height() <= 0.0 {
                            Rect::ZERO
                        } else {
                            out
                        }
                    }
                    ClipOp::Difference => inner,
                }
            }
            RenderNode::Blend(n) => n.children.bounds(),
            RenderNode::Opacity(n) => n.children.bounds(),
            RenderNode::OpacityMask(n) => n.children.bounds(),
            RenderNode::FilterEffect(n) => n.children.bounds(),
        }
    }

    /// Release owned resources. Idempotent; disposed subtrees replay and hit-test as empty.
    pub fn dispose(&mut self) {
        match self {
            RenderNode::Clear(_) | RenderNode::Rect(_) | RenderNode::Ellipse(_) => {}
            RenderNode::Geometry(n) => n.path = None,
            RenderNode::Image(n) => n.image = None,
            RenderNode::Text(n) => n.text = None,
            RenderNode::Group(n) => n.children.dispose(),
            RenderNode::Transform(n) => n.children.dispose(),
            RenderNode::Clip(n) => n.children.dispose(),
            RenderNode::Blend(n) => n.children.dispose(),
            RenderNode::Opacity(n) => n.children.dispose(),
            RenderNode::OpacityMask(n) => n.children.dispose(),
            RenderNode::FilterEffect(n) => {
                n.effect = None;
                n.children.dispose();
            }
        }
    }

    /// Re-issue the recorded operations onto another canvas.
    pub fn replay(&self, canvas: &mut dyn Canvas) {
        match self {
            RenderNode::Clear(n) => canvas.clear(n.color),
            RenderNode::Rect(n) => canvas.draw_rect(n.rect, n.fill, n.pen),
            RenderNode::Ellipse(n) => canvas.draw_ellipse(n.rect, n.fill, n.pen),
            RenderNode::Geometry(n) => {
                if let Some(path) = &n.path {
                    canvas.draw_geometry(Arc::clone(path), n.fill, n.pen);
                }
            }
            RenderNode::Image(n) => {
                if let Some(image) = &n.image {
                    canvas.draw_image(Arc::clone(image));
                }
            }
            RenderNode::Text(n) => {
                if let Some(text) = &n.text {
                    canvas.draw_text(Arc::clone(text), n.fill);
                }
            }
            RenderNode::Group(n) => {
                canvas.push_state();
                replay_children(&n.children, canvas);
                canvas.pop();
            }
            RenderNode::Transform(n) => {
                canvas.push_transform(n.matrix);
                replay_children(&n.children, canvas);
                canvas.pop();
            }
            RenderNode::Clip(n) => {
                match &n.shape {
                    ClipShape::Rect(r) => canvas.push_clip_rect(*r, n.op),
                    ClipShape::Geometry(p) => canvas.push_clip_geometry(Arc::clone(p), n.op),
                }
                replay_children(&n.children, canvas);
                canvas.pop();
            }
            RenderNode::Blend(n) => {
                canvas.push_blend(n.mode);
                replay_children(&n.children, canvas);
                canvas.pop();
            }
            RenderNode::Opacity(n) => {
                canvas.push_opacity(n.opacity);
                replay_children(&n.children, canvas);
                canvas.pop();
            }
            RenderNode::OpacityMask(n) => {
                canvas.push_opacity_mask(n.mask, n.bounds, n.invert);
                replay_children(&n.children, canvas);
                canvas.pop();
            }
            RenderNode::FilterEffect(n) => {
                if let Some(effect) = &n.effect {
                    canvas.push_filter_effect(Arc::clone(effect));
                    replay_children(&n.children, canvas);
                    canvas.pop();
                }
            }
        }
    }
}

fn replay_children(container: &Container, canvas: &mut dyn Canvas) {
    for child in container.children() {
        child.replay(canvas);
    }
}

pub(crate) fn inflate_for_pen(rect: Rect, pen: Option<Pen>) -> Rect {
    match pen {
        Some(pen) => {
            let (out, _) = pen.band();
            rect.inflate(out, out)
        }
        None => rect,
    }
}

pub(crate) fn union_bounds(rects: impl Iterator<Item = Rect>) -> Rect {
    let mut acc: Option<Rect> = None;
    for r in rects {
        let r = r.abs();
        if r.width() <= 0.0 && r.height() <= 0.0 {
            continue;
        }
        acc = Some(match acc {
            Some(a) => a.union(r),
            None => r,
        });
    }
    acc.unwrap_or(Rect::ZERO)
}

// Structural-equality checks used by the diffing canvas. Plain parameters compare by value,
// shared resources by Arc pointer identity.

impl ClearNode {
    pub(crate) fn matches(&self, color: Rgba8) -> bool {
        self.color == color
    }
}

impl RectNode {
    pub(crate) fn matches(&self, rect: Rect, fill: Option<Brush>, pen: Option<Pen>) -> bool {
        self.rect == rect && self.fill == fill && self.pen == pen
    }
}

impl EllipseNode {
    pub(crate) fn matches(&self, rect: Rect, fill: Option<Brush>, pen: Option<Pen>) -> bool {
        self.rect == rect && self.fill == fill && self.pen == pen
    }
}

impl GeometryNode {
    pub(crate) fn matches(
        &self,
        path: &Arc<BezPath>,
        fill: Option<Brush>,
        pen: Option<Pen>,
    ) -> bool {
        self.path.as_ref().is_some_and(|p| Arc::ptr_eq(p, path))
            && self.fill == fill
            && self.pen == pen
    }
}

impl ImageNode {
    pub(crate) fn matches(&self, image: &Arc<ImageSource>) -> bool {
        self.image.as_ref().is_some_and(|i| Arc::ptr_eq(i, image))
    }
}

impl TextNode {
    pub(crate) fn matches(&self, text: &Arc<FormattedText>, fill: Option<Brush>) -> bool {
        self.text.as_ref().is_some_and(|t| Arc::ptr_eq(t, text)) && self.fill == fill
    }
}

impl TransformNode {
    pub(crate) fn matches(&self, matrix: Affine) -> bool {
        self.matrix == matrix
    }
}

impl ClipNode {
    pub(crate) fn matches(&self, shape: &ClipShape, op: ClipOp) -> bool {
        if self.op != op {
            return false;
        }
        match (&self.shape, shape) {
            (ClipShape::Rect(a), ClipShape::Rect(b)) => a == b,
            (ClipShape::Geometry(a), ClipShape::Geometry(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl BlendNode {
    pub(crate) fn matches(&self, mode: BlendMode) -> bool {
        self.mode == mode
    }
}

impl OpacityNode {
    pub(crate) fn matches(&self, opacity: f64) -> bool {
        self.opacity == opacity
    }
}

impl OpacityMaskNode {
    pub(crate) fn matches(&self, mask: Brush, bounds: Rect, invert: bool) -> bool {
        self.mask == mask && self.bounds == bounds && self.invert == invert
    }
}

impl FilterEffectNode {
    pub(crate) fn matches(&self, effect: &Arc<dyn FilterEffect>) -> bool {
        self.effect
            .as_ref()
            .is_some_and(|e| Arc::ptr_eq(e, effect))
    }
}
