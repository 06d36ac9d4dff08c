//! Frame composition: render dispatch, the compositor facade and the CPU pixel target.

pub mod compose;
pub mod dispatch;
pub mod target;
