//! Paint inputs for recorded draw operations.
//!
//! Everything here is a plain value: node diffing compares these by value equality, so brushes
//! and pens must stay cheap to compare and free of interior mutability.

use crate::foundation::core::Rect;

/// Straight-alpha RGBA color, 8 bits per channel.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Fully opaque color.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Return `true` when alpha is zero.
    pub fn is_transparent(self) -> bool {
        self.a == 0
    }
}

/// Fill source for a draw operation.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Brush {
    /// Uniform color fill.
    Solid(Rgba8),
}

impl Brush {
    /// The brush's flattened color, used by the CPU pixel target.
    pub fn color(self) -> Rgba8 {
        match self {
            Brush::Solid(c) => c,
        }
    }

    /// Return `true` when the brush contributes no coverage.
    pub fn is_transparent(self) -> bool {
        match self {
            Brush::Solid(c) => c.is_transparent(),
        }
    }
}

/// Where a stroke sits relative to the geometry boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StrokeAlign {
    #[default]
    Center,
    Inside,
    Outside,
}

/// Stroke description for a draw operation.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pen {
    pub brush: Brush,
    /// Stroke width in local units, must be finite and >= 0.
    pub width: f64,
    pub align: StrokeAlign,
}

impl Pen {
    pub fn new(brush: Brush, width: f64) -> Self {
        Self {
            brush,
            width,
            align: StrokeAlign::Center,
        }
    }

    /// Stroke band extent on each side of the boundary: `(outward, inward)`.
    pub fn band(self) -> (f64, f64) {
        let w = self.width.max(0.0);
        match self.align {
            StrokeAlign::Center => (w / 2.0, w / 2.0),
            StrokeAlign::Inside => (0.0, w),
            StrokeAlign::Outside => (w, 0.0),
        }
    }
}

/// Pixel blend applied by a `Blend` container node.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum BlendMode {
    #[default]
    SrcOver,
    Multiply,
    Screen,
    Plus,
}

/// How a clip shape combines with the current clip region.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum ClipOp {
    /// Keep only the part inside the shape.
    #[default]
    Intersect,
    /// Remove the part inside the shape.
    Difference,
}

/// Clip shapes supported by clip container nodes.
#[derive(Clone, Debug, PartialEq)]
pub enum ClipShape {
    Rect(Rect),
    Geometry(std::sync::Arc<kurbo::BezPath>),
}

impl ClipShape {
    /// Membership test in the shape's own coordinate space.
    pub fn contains(&self, p: kurbo::Point) -> bool {
        match self {
            ClipShape::Rect(r) => r.abs().contains(p),
            ClipShape::Geometry(path) => {
                use kurbo::Shape as _;
                path.contains(p)
            }
        }
    }

    /// Whether a point passes this clip under `op`.
    pub fn admits(&self, p: kurbo::Point, op: ClipOp) -> bool {
        match op {
            ClipOp::Intersect => self.contains(p),
            ClipOp::Difference => !self.contains(p),
        }
    }
}
