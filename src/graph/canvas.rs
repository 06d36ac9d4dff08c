//! The drawing API surface and its recording implementation.
//!
//! [`RecordingCanvas`] accepts the same operations as an immediate canvas but, instead of
//! executing them, diffs each one against the node previously recorded at the same position in
//! the same container. An unchanged operation reuses the existing node (and, for containers,
//! its whole subtree as the diff baseline); a changed one replaces the node and truncates the
//! remainder of the container, since a changed node may change the meaning of what follows.
//!
//! Most frames re-submit an identical or near-identical operation sequence, so recording costs
//! O(unchanged prefix) and avoids churning nodes that own expensive rendering resources.

use std::sync::Arc;

use crate::foundation::core::{Affine, BezPath, Rect};
use crate::graph::node::{
    BlendNode, ClearNode, ClipNode, Container, EllipseNode, FilterEffectNode, GeometryNode,
    GroupNode, ImageNode, NodeId, OpacityMaskNode, OpacityNode, RectNode, RenderNode, TextNode,
    TransformNode,
};
use crate::paint::{BlendMode, Brush, ClipOp, ClipShape, Pen, Rgba8};
use crate::resource::{FilterEffect, FormattedText, ImageSource};

/// The drawing operations shared by recording and executing canvases.
///
/// Every `push_*` must be balanced by exactly one [`Canvas::pop`]. A stray `pop` is a guarded
/// no-op, never an error.
pub trait Canvas {
    fn clear(&mut self, color: Rgba8);
    fn draw_rect(&mut self, rect: Rect, fill: Option<Brush>, pen: Option<Pen>);
    /// Draw the ellipse inscribed in `rect`.
    fn draw_ellipse(&mut self, rect: Rect, fill: Option<Brush>, pen: Option<Pen>);
    fn draw_geometry(&mut self, path: Arc<BezPath>, fill: Option<Brush>, pen: Option<Pen>);
    /// Draw an image at its natural size, anchored at the origin.
    fn draw_image(&mut self, image: Arc<ImageSource>);
    /// Draw pre-laid-out text.
    fn draw_text(&mut self, text: Arc<FormattedText>, fill: Option<Brush>);
    /// Plain save-state push with no effect of its own.
    fn push_state(&mut self);
    fn push_transform(&mut self, matrix: Affine);
    fn push_clip_rect(&mut self, rect: Rect, op: ClipOp);
    fn push_clip_geometry(&mut self, path: Arc<BezPath>, op: ClipOp);
    fn push_blend(&mut self, mode: BlendMode);
    fn push_opacity(&mut self, opacity: f64);
    fn push_opacity_mask(&mut self, mask: Brush, bounds: Rect, invert: bool);
    fn push_filter_effect(&mut self, effect: Arc<dyn FilterEffect>);
    fn pop(&mut self);
}

struct Frame {
    parent: Container,
    /// Index in `parent` where the descended-into node goes back on pop.
    hole: usize,
    /// The container node whose children are currently being recorded.
    shell: RenderNode,
}

/// Canvas that records operations into a persistent node tree, reusing unchanged nodes.
pub struct RecordingCanvas<'a> {
    cur: Container,
    index: usize,
    stack: Vec<Frame>,
    on_untracked: Option<Box<dyn FnMut(&RenderNode) + 'a>>,
}

impl<'a> RecordingCanvas<'a> {
    /// Begin recording into `root`, the persistent container of one cache entry.
    pub fn new(root: Container) -> Self {
        Self {
            cur: root,
            index: 0,
            stack: Vec::new(),
            on_untracked: None,
        }
    }

    /// Observe every node discarded by replacement or truncation, before it is disposed.
    ///
    /// External bitmap caches use this to drop stale subtree caches; tests use it for leak
    /// accounting.
    pub fn on_untracked(mut self, hook: impl FnMut(&RenderNode) + 'a) -> Self {
        self.on_untracked = Some(Box::new(hook));
        self
    }

    /// Finish recording: close any open pushes, drop trailing children from a previous,
    /// now-shorter frame, and hand back the root.
    pub fn finish(mut self) -> Container {
        while !self.stack.is_empty() {
            self.pop();
        }
        let trailing = self.cur.split_off(self.index);
        self.discard(trailing);
        self.cur
    }

    fn discard(&mut self, removed: Vec<RenderNode>) {
        for mut node in removed {
            if let Some(hook) = self.on_untracked.as_mut() {
                hook(&node);
            }
            node.dispose();
        }
    }

    /// Record a leaf operation at the cursor.
    fn record_leaf(
        &mut self,
        reusable: impl FnOnce(&RenderNode) -> bool,
        build: impl FnOnce() -> RenderNode,
    ) {
        let reuse = self.cur.children().get(self.index).is_some_and(reusable);
        if !reuse {
            let removed = self.cur.split_off(self.index);
            self.discard(removed);
            self.cur.push_child(build());
        }
        self.index += 1;
    }

    /// Record a state-push operation at the cursor and descend into its container.
    fn record_push(
        &mut self,
        reusable: impl FnOnce(&RenderNode) -> bool,
        same_kind: impl Fn(&RenderNode) -> bool,
        build: impl FnOnce() -> RenderNode,
    ) {
        let reuse = self.cur.children().get(self.index).is_some_and(reusable);
        let mut shell = if reuse {
            self.cur.take_child(self.index)
        } else {
            let mut removed = self.cur.split_off(self.index);
            let mut node = build();
            // A same-kind container with changed parameters keeps its subtree as the diff
            // baseline for the replacement.
            if let Some(old) = removed.first_mut()
                && same_kind(old)
                && let (Some(old_children), Some(new_children)) =
                    (old.container_mut(), node.container_mut())
            {
                new_children.bring_from(old_children);
            }
            self.discard(removed);
            node
        };

        let children = match shell.container_mut() {
            Some(c) => std::mem::take(c),
            // record_push is only called with container nodes; leaves cannot reach here.
            None => Container::new(),
        };
        let parent = std::mem::take(&mut self.cur);
        self.stack.push(Frame {
            parent,
            hole: self.index,
            shell,
        });
        self.cur = children;
        self.index = 0;
    }
}

impl Canvas for RecordingCanvas<'_> {
    fn clear(&mut self, color: Rgba8) {
        self.record_leaf(
            |n| matches!(n, RenderNode::Clear(c) if c.matches(color)),
            || {
                RenderNode::Clear(ClearNode {
                    id: NodeId::next(),
                    color,
                })
            },
        );
    }

    fn draw_rect(&mut self, rect: Rect, fill: Option<Brush>, pen: Option<Pen>) {
        self.record_leaf(
            |n| matches!(n, RenderNode::Rect(r) if r.matches(rect, fill, pen)),
            || {
                RenderNode::Rect(RectNode {
                    id: NodeId::next(),
                    rect,
                    fill,
                    pen,
                })
            },
        );
    }

    fn draw_ellipse(&mut self, rect: Rect, fill: Option<Brush>, pen: Option<Pen>) {
        self.record_leaf(
            |n| matches!(n, RenderNode::Ellipse(e) if e.matches(rect, fill, pen)),
            || {
                RenderNode::Ellipse(EllipseNode {
                    id: NodeId::next(),
                    rect,
                    fill,
                    pen,
                })
            },
        );
    }

    fn draw_geometry(&mut self, path: Arc<BezPath>, fill: Option<Brush>, pen: Option<Pen>) {
        let wanted = Arc::clone(&path);
        self.record_leaf(
            |n| matches!(n, RenderNode::Geometry(g) if g.matches(&wanted, fill, pen)),
            move || {
                RenderNode::Geometry(GeometryNode {
                    id: NodeId::next(),
                    path: Some(path),
                    fill,
                    pen,
                })
            },
        );
    }

    fn draw_image(&mut self, image: Arc<ImageSource>) {
        let wanted = Arc::clone(&image);
        self.record_leaf(
            |n| matches!(n, RenderNode::Image(i) if i.matches(&wanted)),
            move || {
                RenderNode::Image(ImageNode {
                    id: NodeId::next(),
                    image: Some(image),
                })
            },
        );
    }

    fn draw_text(&mut self, text: Arc<FormattedText>, fill: Option<Brush>) {
        let wanted = Arc::clone(&text);
        self.record_leaf(
            |n| matches!(n, RenderNode::Text(t) if t.matches(&wanted, fill)),
            move || {
                RenderNode::Text(TextNode {
                    id: NodeId::next(),
                    text: Some(text),
                    fill,
                })
            },
        );
    }

    fn push_state(&mut self) {
        self.record_push(
            |n| matches!(n, RenderNode::Group(_)),
            |n| matches!(n, RenderNode::Group(_)),
            || {
                RenderNode::Group(GroupNode {
                    id: NodeId::next(),
                    children: Container::new(),
                })
            },
        );
    }

    fn push_transform(&mut self, matrix: Affine) {
        self.record_push(
            |n| matches!(n, RenderNode::Transform(t) if t.matches(matrix)),
            |n| matches!(n, RenderNode::Transform(_)),
            || {
                RenderNode::Transform(TransformNode {
                    id: NodeId::next(),
                    matrix,
                    children: Container::new(),
                })
            },
        );
    }

    fn push_clip_rect(&mut self, rect: Rect, op: ClipOp) {
        let shape = ClipShape::Rect(rect);
        self.push_clip(shape, op);
    }

    fn push_clip_geometry(&mut self, path: Arc<BezPath>, op: ClipOp) {
        let shape = ClipShape::Geometry(path);
        self.push_clip(shape, op);
    }

    fn push_blend(&mut self, mode: BlendMode) {
        self.record_push(
            |n| matches!(n, RenderNode::Blend(b) if b.matches(mode)),
            |n| matches!(n, RenderNode::Blend(_)),
            || {
                RenderNode::Blend(BlendNode {
                    id: NodeId::next(),
                    mode,
                    children: Container::new(),
                })
            },
        );
    }

    fn push_opacity(&mut self, opacity: f64) {
        self.record_push(
            |n| matches!(n, RenderNode::Opacity(o) if o.matches(opacity)),
            |n| matches!(n, RenderNode::Opacity(_)),
            || {
                RenderNode::Opacity(OpacityNode {
                    id: NodeId::next(),
                    opacity,
                    children: Container::new(),
                })
            },
        );
    }

    fn push_opacity_mask(&mut self, mask: Brush, bounds: Rect, invert: bool) {
        self.record_push(
            |n| matches!(n, RenderNode::OpacityMask(m) if m.matches(mask, bounds, invert)),
            |n| matches!(n, RenderNode::OpacityMask(_)),
            || {
                RenderNode::OpacityMask(OpacityMaskNode {
                    id: NodeId::next(),
                    mask,
                    bounds,
                    invert,
                    children: Container::new(),
                })
            },
        );
    }

    fn push_filter_effect(&mut self, effect: Arc<dyn FilterEffect>) {
        let wanted = Arc::clone(&effect);
        self.record_push(
            |n| matches!(n, RenderNode::FilterEffect(f) if f.matches(&wanted)),
            |n| matches!(n, RenderNode::FilterEffect(_)),
            move || {
                RenderNode::FilterEffect(FilterEffectNode {
                    id: NodeId::next(),
                    effect: Some(effect),
                    children: Container::new(),
                })
            },
        );
    }

    fn pop(&mut self) {
        let trailing = self.cur.split_off(self.index);
        self.discard(trailing);

        let Some(Frame {
            mut parent,
            hole,
            mut shell,
        }) = self.stack.pop()
        else {
            // Unbalanced pop from a collaborator; tolerated.
            return;
        };

        if let Some(children) = shell.container_mut() {
            *children = std::mem::take(&mut self.cur);
        }
        if parent.len() > hole {
            parent.restore_child(hole, shell);
        } else {
            parent.push_child(shell);
        }
        self.cur = parent;
        self.index = hole + 1;
    }
}

impl RecordingCanvas<'_> {
    fn push_clip(&mut self, shape: ClipShape, op: ClipOp) {
        let wanted = shape.clone();
        self.record_push(
            |n| matches!(n, RenderNode::Clip(c) if c.matches(&wanted, op)),
            |n| matches!(n, RenderNode::Clip(_)),
            move || {
                RenderNode::Clip(ClipNode {
                    id: NodeId::next(),
                    shape,
                    op,
                    children: Container::new(),
                })
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Rgba8;
    use std::cell::Cell;

    fn red() -> Option<Brush> {
        Some(Brush::Solid(Rgba8::opaque(255, 0, 0)))
    }

    fn blue() -> Option<Brush> {
        Some(Brush::Solid(Rgba8::opaque(0, 0, 255)))
    }

    fn record_two_rects(root: Container, second: Option<Brush>) -> Container {
        let mut canvas = RecordingCanvas::new(root);
        canvas.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red(), None);
        canvas.draw_rect(Rect::new(20.0, 0.0, 30.0, 10.0), second, None);
        canvas.finish()
    }

    #[test]
    fn identical_recording_reuses_nodes() {
        let root = record_two_rects(Container::new(), red());
        let ids: Vec<_> = root.children().iter().map(RenderNode::id).collect();

        let root = record_two_rects(root, red());
        let ids2: Vec<_> = root.children().iter().map(RenderNode::id).collect();
        assert_eq!(ids, ids2);
    }

    #[test]
    fn changed_operation_replaces_node_and_truncates_tail() {
        let mut canvas = RecordingCanvas::new(Container::new());
        canvas.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red(), None);
        canvas.draw_rect(Rect::new(20.0, 0.0, 30.0, 10.0), red(), None);
        canvas.draw_rect(Rect::new(40.0, 0.0, 50.0, 10.0), red(), None);
        let root = canvas.finish();
        let tail_id = root.children()[2].id();

        // Change operation 1: node 1 replaced, node 2 discarded, then re-recorded fresh.
        let untracked = Cell::new(0usize);
        let mut canvas = RecordingCanvas::new(root).on_untracked(|_| {
            untracked.set(untracked.get() + 1);
        });
        canvas.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red(), None);
        canvas.draw_rect(Rect::new(20.0, 0.0, 30.0, 10.0), blue(), None);
        canvas.draw_rect(Rect::new(40.0, 0.0, 50.0, 10.0), red(), None);
        let root = canvas.finish();

        assert_eq!(untracked.get(), 2);
        assert_eq!(root.len(), 3);
        assert_ne!(root.children()[2].id(), tail_id);
    }

    #[test]
    fn shorter_frame_drops_trailing_nodes() {
        let root = record_two_rects(Container::new(), red());
        assert_eq!(root.len(), 2);

        let mut canvas = RecordingCanvas::new(root);
        canvas.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red(), None);
        let root = canvas.finish();
        assert_eq!(root.len(), 1);
    }

    #[test]
    fn reused_transform_keeps_subtree() {
        let mut canvas = RecordingCanvas::new(Container::new());
        canvas.push_transform(Affine::translate((5.0, 0.0)));
        canvas.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red(), None);
        canvas.pop();
        let root = canvas.finish();
        let outer = root.children()[0].id();
        let inner = root.children()[0].container().unwrap().children()[0].id();

        let mut canvas = RecordingCanvas::new(root);
        canvas.push_transform(Affine::translate((5.0, 0.0)));
        canvas.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red(), None);
        canvas.pop();
        let root = canvas.finish();

        assert_eq!(root.children()[0].id(), outer);
        assert_eq!(
            root.children()[0].container().unwrap().children()[0].id(),
            inner
        );
    }

    #[test]
    fn changed_transform_is_replaced_but_subtree_diffs_in_place() {
        let mut canvas = RecordingCanvas::new(Container::new());
        canvas.push_transform(Affine::translate((5.0, 0.0)));
        canvas.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red(), None);
        canvas.pop();
        let root = canvas.finish();
        let outer = root.children()[0].id();
        let inner = root.children()[0].container().unwrap().children()[0].id();

        let mut canvas = RecordingCanvas::new(root);
        canvas.push_transform(Affine::translate((6.0, 0.0)));
        canvas.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red(), None);
        canvas.pop();
        let root = canvas.finish();

        // New container node, same reused child.
        assert_ne!(root.children()[0].id(), outer);
        assert_eq!(
            root.children()[0].container().unwrap().children()[0].id(),
            inner
        );
    }

    #[test]
    fn kind_change_discards_old_subtree() {
        let mut canvas = RecordingCanvas::new(Container::new());
        canvas.push_transform(Affine::IDENTITY);
        canvas.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red(), None);
        canvas.pop();
        let root = canvas.finish();

        let untracked = Cell::new(0usize);
        let mut canvas = RecordingCanvas::new(root).on_untracked(|_| {
            untracked.set(untracked.get() + 1);
        });
        canvas.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red(), None);
        let root = canvas.finish();

        assert_eq!(root.len(), 1);
        assert!(matches!(root.children()[0], RenderNode::Rect(_)));
        assert_eq!(untracked.get(), 1);
    }

    #[test]
    fn unbalanced_pop_is_a_no_op() {
        let mut canvas = RecordingCanvas::new(Container::new());
        canvas.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red(), None);
        canvas.pop();
        canvas.draw_rect(Rect::new(20.0, 0.0, 30.0, 10.0), red(), None);
        let root = canvas.finish();
        assert_eq!(root.len(), 2);
    }

    #[test]
    fn interrupted_descent_is_closed_by_finish() {
        let mut canvas = RecordingCanvas::new(Container::new());
        canvas.push_opacity(0.5);
        canvas.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red(), None);
        // No pop: a collaborator bailed early.
        let root = canvas.finish();
        assert_eq!(root.len(), 1);
        assert!(matches!(root.children()[0], RenderNode::Opacity(_)));
        assert_eq!(root.children()[0].container().unwrap().len(), 1);
    }
}
