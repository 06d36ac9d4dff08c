//! CPU pixel target.
//!
//! [`PixelCanvas`] is a deliberately small raster canvas: solid fills under the full
//! transform/clip/opacity/blend state stack, inverse-mapped per-pixel coverage with no
//! antialiasing, nearest-neighbor image blits, text drawn as its layout box. It exists so
//! composition output is observable as actual pixels; production-quality rasterization and
//! pixel effects belong to external backends.

use std::sync::Arc;

use kurbo::{Point, Shape as _};

use crate::foundation::core::{Affine, BezPath, PixelSize, Rect};
use crate::graph::canvas::Canvas;
use crate::graph::hit::{
    ellipse_boundary_distance, ellipse_contains, path_boundary_distance, rect_boundary_distance,
};
use crate::paint::{BlendMode, Brush, ClipOp, ClipShape, Pen, Rgba8};
use crate::resource::{FilterEffect, FormattedText, ImageSource};

const DEGENERATE_DET: f64 = 1e-12;

/// One rendered frame: straight-alpha RGBA8 bytes, tightly packed, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRgba {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, `width * height * 4` of them.
    pub data: Vec<u8>,
}

impl FrameRgba {
    /// A fully transparent frame.
    pub fn new(size: PixelSize) -> Self {
        Self {
            width: size.width,
            height: size.height,
            data: vec![0; size.width as usize * size.height as usize * 4],
        }
    }

    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.width, self.height)
    }

    /// The color at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some(Rgba8::new(
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ))
    }

    fn composite(&mut self, x: u32, y: u32, src: Rgba8, mode: BlendMode) {
        if x >= self.width || y >= self.height || src.a == 0 {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let dst = Rgba8::new(
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        );
        let out = composite_straight(src, dst, mode);
        self.data[i] = out.r;
        self.data[i + 1] = out.g;
        self.data[i + 2] = out.b;
        self.data[i + 3] = out.a;
    }
}

/// Separable blend function on normalized channels; `cs` source, `cb` backdrop.
fn blend_channel(mode: BlendMode, cs: f64, cb: f64) -> f64 {
    match mode {
        BlendMode::SrcOver => cs,
        BlendMode::Multiply => cs * cb,
        BlendMode::Screen => cs + cb - cs * cb,
        BlendMode::Plus => (cs + cb).min(1.0),
    }
}

/// Source-over compositing of straight-alpha colors, with the source channel first run through
/// the blend function against the backdrop where the backdrop has coverage.
fn composite_straight(src: Rgba8, dst: Rgba8, mode: BlendMode) -> Rgba8 {
    let sa = f64::from(src.a) / 255.0;
    let da = f64::from(dst.a) / 255.0;
    let oa = sa + da * (1.0 - sa);
    if oa <= 0.0 {
        return Rgba8::TRANSPARENT;
    }
    let channel = |s: u8, d: u8| -> u8 {
        let cs = f64::from(s) / 255.0;
        let cd = f64::from(d) / 255.0;
        let mixed = (1.0 - da) * cs + da * blend_channel(mode, cs, cd);
        let out = (mixed * sa + cd * da * (1.0 - sa)) / oa;
        (out.clamp(0.0, 1.0) * 255.0).round() as u8
    };
    Rgba8::new(
        channel(src.r, dst.r),
        channel(src.g, dst.g),
        channel(src.b, dst.b),
        (oa.clamp(0.0, 1.0) * 255.0).round() as u8,
    )
}

#[derive(Clone, Copy)]
struct State {
    transform: Affine,
    opacity: f64,
    blend: BlendMode,
    /// Number of clip entries active when this state was pushed.
    clip_len: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            opacity: 1.0,
            blend: BlendMode::SrcOver,
            clip_len: 0,
        }
    }
}

struct ClipEntry {
    shape: ClipShape,
    op: ClipOp,
    /// Device-to-shape-space mapping, captured at push. `None` when the transform at push time
    /// was not invertible: an `Intersect` clip then rejects everything, a `Difference` clip
    /// passes everything.
    inverse: Option<Affine>,
}

impl ClipEntry {
    fn admits(&self, device: Point) -> bool {
        match self.inverse {
            Some(inv) => self.shape.admits(inv * device, self.op),
            None => matches!(self.op, ClipOp::Difference),
        }
    }
}

/// Immediate canvas rasterizing into a [`FrameRgba`].
pub struct PixelCanvas {
    frame: FrameRgba,
    state: State,
    saved: Vec<State>,
    clips: Vec<ClipEntry>,
}

impl PixelCanvas {
    pub fn new(size: PixelSize) -> Self {
        Self {
            frame: FrameRgba::new(size),
            state: State::default(),
            saved: Vec::new(),
            clips: Vec::new(),
        }
    }

    pub fn frame(&self) -> &FrameRgba {
        &self.frame
    }

    /// Consume the canvas and hand back the rendered frame.
    pub fn into_frame(self) -> FrameRgba {
        self.frame
    }

    fn admits(&self, device: Point) -> bool {
        self.clips.iter().all(|clip| clip.admits(device))
    }

    fn save(&mut self) {
        self.saved.push(self.state);
    }

    /// Fill the device-space projection of `local_bounds`, testing each pixel center through
    /// the inverse transform. `signed_distance` is negative inside the shape.
    fn fill_shape(
        &mut self,
        local_bounds: Rect,
        fill: Option<Brush>,
        pen: Option<Pen>,
        contains: impl Fn(Point) -> bool,
        signed_distance: impl Fn(Point) -> f64,
    ) {
        let transform = self.state.transform;
        if transform.determinant().abs() <= DEGENERATE_DET {
            return;
        }
        let inverse = transform.inverse();

        let outward = pen.map(|p| p.band().0).unwrap_or(0.0);
        let bounds = local_bounds.abs().inflate(outward, outward);
        let (x0, y0, x1, y1) = match self.device_span(transform.transform_rect_bbox(bounds)) {
            Some(span) => span,
            None => return,
        };

        let opacity = self.state.opacity;
        let blend = self.state.blend;
        for y in y0..y1 {
            for x in x0..x1 {
                let device = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if !self.admits(device) {
                    continue;
                }
                let local = inverse * device;
                let mut color = None;
                if let Some(brush) = fill
                    && contains(local)
                {
                    color = Some(brush.color());
                }
                if let Some(pen) = pen {
                    let (out, inw) = pen.band();
                    let sd = signed_distance(local);
                    let in_band = if sd >= 0.0 { sd <= out } else { -sd <= inw };
                    if in_band {
                        color = Some(pen.brush.color());
                    }
                }
                if let Some(color) = color {
                    self.frame
                        .composite(x, y, scale_alpha(color, opacity), blend);
                }
            }
        }
    }

    /// Clamp a device-space rect to the frame, as a half-open pixel span.
    fn device_span(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let r = rect.abs();
        let x0 = r.x0.floor().max(0.0) as u32;
        let y0 = r.y0.floor().max(0.0) as u32;
        let x1 = (r.x1.ceil().min(f64::from(self.frame.width))).max(0.0) as u32;
        let y1 = (r.y1.ceil().min(f64::from(self.frame.height))).max(0.0) as u32;
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }
}

fn scale_alpha(color: Rgba8, opacity: f64) -> Rgba8 {
    let a = (f64::from(color.a) * opacity.clamp(0.0, 1.0)).round() as u8;
    Rgba8::new(color.r, color.g, color.b, a)
}

impl Canvas for PixelCanvas {
    fn clear(&mut self, color: Rgba8) {
        for chunk in self.frame.data.chunks_exact_mut(4) {
            chunk[0] = color.r;
            chunk[1] = color.g;
            chunk[2] = color.b;
            chunk[3] = color.a;
        }
    }

    fn draw_rect(&mut self, rect: Rect, fill: Option<Brush>, pen: Option<Pen>) {
        self.fill_shape(
            rect,
            fill,
            pen,
            |p| rect.abs().contains(p),
            |p| rect_boundary_distance(rect, p),
        );
    }

    fn draw_ellipse(&mut self, rect: Rect, fill: Option<Brush>, pen: Option<Pen>) {
        self.fill_shape(
            rect,
            fill,
            pen,
            |p| ellipse_contains(rect, p),
            |p| ellipse_boundary_distance(rect, p),
        );
    }

    fn draw_geometry(&mut self, path: Arc<BezPath>, fill: Option<Brush>, pen: Option<Pen>) {
        let bounds = path.bounding_box();
        self.fill_shape(
            bounds,
            fill,
            pen,
            |p| path.contains(p),
            |p| {
                let d = path_boundary_distance(&path, p);
                if path.contains(p) { -d } else { d }
            },
        );
    }

    fn draw_image(&mut self, image: Arc<ImageSource>) {
        let transform = self.state.transform;
        if transform.determinant().abs() <= DEGENERATE_DET {
            return;
        }
        let inverse = transform.inverse();
        let (x0, y0, x1, y1) =
            match self.device_span(transform.transform_rect_bbox(image.bounds())) {
                Some(span) => span,
                None => return,
            };

        let opacity = self.state.opacity;
        let blend = self.state.blend;
        for y in y0..y1 {
            for x in x0..x1 {
                let device = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if !self.admits(device) {
                    continue;
                }
                let local = inverse * device;
                // Nearest neighbor.
                let Some(texel) = image.sample(local.x, local.y) else {
                    continue;
                };
                self.frame
                    .composite(x, y, scale_alpha(texel, opacity), blend);
            }
        }
    }

    fn draw_text(&mut self, text: Arc<FormattedText>, fill: Option<Brush>) {
        // Glyph rasterization lives outside this target; the layout box stands in.
        let bounds = text.bounds();
        self.fill_shape(
            bounds,
            fill,
            None,
            |p| bounds.abs().contains(p),
            |p| rect_boundary_distance(bounds, p),
        );
    }

    fn push_state(&mut self) {
        self.save();
    }

    fn push_transform(&mut self, matrix: Affine) {
        self.save();
        self.state.transform = self.state.transform * matrix;
    }

    fn push_clip_rect(&mut self, rect: Rect, op: ClipOp) {
        self.push_clip(ClipShape::Rect(rect), op);
    }

    fn push_clip_geometry(&mut self, path: Arc<BezPath>, op: ClipOp) {
        self.push_clip(ClipShape::Geometry(path), op);
    }

    fn push_blend(&mut self, mode: BlendMode) {
        self.save();
        self.state.blend = mode;
    }

    fn push_opacity(&mut self, opacity: f64) {
        self.save();
        self.state.opacity *= opacity.clamp(0.0, 1.0);
    }

    fn push_opacity_mask(&mut self, mask: Brush, bounds: Rect, invert: bool) {
        // Solid masks reduce to a uniform alpha scale over the mask bounds; treat them as a
        // clip to the bounds plus an opacity push.
        self.save();
        let alpha = f64::from(mask.color().a) / 255.0;
        let alpha = if invert { 1.0 - alpha } else { alpha };
        self.state.opacity *= alpha;
        let inverse = invertible(self.state.transform);
        self.clips.push(ClipEntry {
            shape: ClipShape::Rect(bounds),
            op: ClipOp::Intersect,
            inverse,
        });
        self.state.clip_len = self.clips.len();
    }

    fn push_filter_effect(&mut self, _effect: Arc<dyn FilterEffect>) {
        // Pixel effects are external collaborators; the node only groups here.
        self.save();
    }

    fn pop(&mut self) {
        let Some(state) = self.saved.pop() else {
            // Unbalanced pop from a collaborator; tolerated.
            return;
        };
        self.clips.truncate(state.clip_len);
        self.state = state;
    }
}

impl PixelCanvas {
    fn push_clip(&mut self, shape: ClipShape, op: ClipOp) {
        self.save();
        let inverse = invertible(self.state.transform);
        self.clips.push(ClipEntry { shape, op, inverse });
        self.state.clip_len = self.clips.len();
    }
}

fn invertible(transform: Affine) -> Option<Affine> {
    (transform.determinant().abs() > DEGENERATE_DET).then(|| transform.inverse())
}
