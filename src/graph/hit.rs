//! Point membership tests over recorded node trees.
//!
//! Leaves answer from their own fill region or stroke band; transform containers invert their
//! matrix before delegating (a non-invertible transform makes everything beneath it miss, never
//! an error); clip containers gate on the clip shape; other containers delegate to children.

use kurbo::{ParamCurveNearest, Point, Shape as _};

use crate::foundation::core::{BezPath, Rect};
use crate::graph::node::{Container, RenderNode};
use crate::paint::{Brush, Pen};

const DEGENERATE_DET: f64 = 1e-12;
const NEAREST_ACCURACY: f64 = 1e-6;

impl RenderNode {
    /// Return `true` when `point` (in this node's coordinate space) hits recorded content.
    pub fn hit_test(&self, point: Point) -> bool {
        match self {
            RenderNode::Clear(_) => false,
            RenderNode::Rect(n) => shape_hit(
                point,
                n.fill,
                n.pen,
                |p| n.rect.abs().contains(p),
                |p| rect_boundary_distance(n.rect, p),
            ),
            RenderNode::Ellipse(n) => shape_hit(
                point,
                n.fill,
                n.pen,
                |p| ellipse_contains(n.rect, p),
                |p| ellipse_boundary_distance(n.rect, p),
            ),
            RenderNode::Geometry(n) => match &n.path {
                Some(path) => shape_hit(
                    point,
                    n.fill,
                    n.pen,
                    |p| path.contains(p),
                    |p| {
                        let d = path_boundary_distance(path, p);
                        if path.contains(p) { -d } else { d }
                    },
                ),
                None => false,
            },
            RenderNode::Image(n) => n
                .image
                .as_ref()
                .is_some_and(|i| i.bounds().contains(point)),
            RenderNode::Text(n) => n
                .text
                .as_ref()
                .is_some_and(|t| t.bounds().abs().contains(point)),
            RenderNode::Group(n) => hit_any(&n.children, point),
            RenderNode::Transform(n) => {
                if n.matrix.determinant().abs() <= DEGENERATE_DET {
                    return false;
                }
                hit_any(&n.children, n.matrix.inverse() * point)
            }
            RenderNode::Clip(n) => n.shape.admits(point, n.op) && hit_any(&n.children, point),
            RenderNode::Blend(n) => hit_any(&n.children, point),
            RenderNode::Opacity(n) => hit_any(&n.children, point),
            RenderNode::OpacityMask(n) => hit_any(&n.children, point),
            RenderNode::FilterEffect(n) => hit_any(&n.children, point),
        }
    }
}

/// Any-child-matches over a container, topmost (last-drawn) first.
pub(crate) fn hit_any(container: &Container, point: Point) -> bool {
    container
        .children()
        .iter()
        .rev()
        .any(|child| child.hit_test(point))
}

/// Shared fill-or-stroke membership: hit when inside the fill region (fill present) or within
/// the stroke band (pen present). `signed_distance` is negative inside the shape.
fn shape_hit(
    point: Point,
    fill: Option<Brush>,
    pen: Option<Pen>,
    contains: impl Fn(Point) -> bool,
    signed_distance: impl Fn(Point) -> f64,
) -> bool {
    if fill.is_some() && contains(point) {
        return true;
    }
    if let Some(pen) = pen {
        let (outward, inward) = pen.band();
        let sd = signed_distance(point);
        if sd >= 0.0 {
            return sd <= outward;
        }
        return -sd <= inward;
    }
    false
}

/// Signed distance from `point` to the rect boundary; negative inside.
pub(crate) fn rect_boundary_distance(rect: Rect, point: Point) -> f64 {
    let r = rect.abs();
    let dx = (r.x0 - point.x).max(point.x - r.x1);
    let dy = (r.y0 - point.y).max(point.y - r.y1);
    if dx <= 0.0 && dy <= 0.0 {
        // Inside; distance to the closest edge.
        dx.max(dy)
    } else {
        let ox = dx.max(0.0);
        let oy = dy.max(0.0);
        (ox * ox + oy * oy).sqrt()
    }
}

pub(crate) fn ellipse_contains(rect: Rect, point: Point) -> bool {
    let r = rect.abs();
    let rx = r.width() / 2.0;
    let ry = r.height() / 2.0;
    if rx <= 0.0 || ry <= 0.0 {
        return false;
    }
    let nx = (point.x - r.center().x) / rx;
    let ny = (point.y - r.center().y) / ry;
    nx * nx + ny * ny <= 1.0
}

/// Radial approximation of the signed distance to the ellipse boundary; negative inside.
///
/// Exact ellipse distance needs an iterative solve; the radial scale is accurate enough for the
/// stroke bands used in hit testing.
pub(crate) fn ellipse_boundary_distance(rect: Rect, point: Point) -> f64 {
    let r = rect.abs();
    let rx = r.width() / 2.0;
    let ry = r.height() / 2.0;
    if rx <= 0.0 || ry <= 0.0 {
        return f64::INFINITY;
    }
    let nx = (point.x - r.center().x) / rx;
    let ny = (point.y - r.center().y) / ry;
    let radial = (nx * nx + ny * ny).sqrt();
    (radial - 1.0) * rx.min(ry)
}

/// Unsigned distance from `point` to the nearest point on the path outline.
pub(crate) fn path_boundary_distance(path: &BezPath, point: Point) -> f64 {
    let mut best = f64::INFINITY;
    for seg in path.segments() {
        let nearest = seg.nearest(point, NEAREST_ACCURACY);
        best = best.min(nearest.distance_sq);
    }
    best.sqrt()
}
