//! The retained draw-node hierarchy and its recording canvas.

pub mod canvas;
pub mod hit;
pub mod node;
