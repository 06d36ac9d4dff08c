//! Shared, immutable resources referenced by recorded nodes.
//!
//! Nodes compare these by `Arc` pointer identity during diffing: producing a new allocation is
//! how a collaborator signals "this input changed", mutating in place is forbidden.

use std::fmt::Debug;

use crate::foundation::core::{PixelSize, Rect};
use crate::paint::Rgba8;

/// Decoded raster image, straight-alpha RGBA8, row-major.
#[derive(Clone)]
pub struct ImageSource {
    size: PixelSize,
    data: Vec<u8>,
}

impl ImageSource {
    /// Wrap decoded pixels. `data` must be exactly `width * height * 4` bytes.
    pub fn from_rgba8(size: PixelSize, data: Vec<u8>) -> crate::VignetteResult<Self> {
        let expected = size.width as usize * size.height as usize * 4;
        if data.len() != expected {
            return Err(crate::VignetteError::validation(format!(
                "image data length {} does not match {}x{} RGBA8",
                data.len(),
                size.width,
                size.height
            )));
        }
        Ok(Self { size, data })
    }

    /// Uniform-color image, handy for tests.
    pub fn solid(size: PixelSize, color: Rgba8) -> Self {
        let n = size.width as usize * size.height as usize;
        let mut data = Vec::with_capacity(n * 4);
        for _ in 0..n {
            data.extend_from_slice(&[color.r, color.g, color.b, color.a]);
        }
        Self { size, data }
    }

    pub fn size(&self) -> PixelSize {
        self.size
    }

    /// Natural bounds at the origin.
    pub fn bounds(&self) -> Rect {
        self.size.to_rect()
    }

    /// Sample the pixel containing `(x, y)`; `None` outside the image.
    pub fn sample(&self, x: f64, y: f64) -> Option<Rgba8> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let (xi, yi) = (x as u32, y as u32);
        if xi >= self.size.width || yi >= self.size.height {
            return None;
        }
        let i = (yi as usize * self.size.width as usize + xi as usize) * 4;
        Some(Rgba8::new(
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ))
    }
}

impl Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSource")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Text that has already been shaped and measured by an external layout engine.
///
/// Font shaping is outside this core; the node tree only needs the final layout box.
#[derive(Clone, Debug)]
pub struct FormattedText {
    text: String,
    bounds: Rect,
}

impl FormattedText {
    pub fn new(text: impl Into<String>, bounds: Rect) -> Self {
        Self {
            text: text.into(),
            bounds,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Layout bounds in local space.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }
}

/// A pixel-level effect applied to a subtree.
///
/// Concrete effects (blur, border, color key, ...) live outside this core. The graph only
/// records which effect wraps which children; executing targets that cannot apply effects
/// simply treat the node as a group.
pub trait FilterEffect: Debug {}
