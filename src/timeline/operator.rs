//! Element pipeline stages.
//!
//! An element evaluates by threading a working list of [`Renderable`]s through its operators in
//! declaration order. Each operator declares a [`OperatorRole`] that fixes how it participates:
//! publishers append, transformers and filters rewrite the list, handlers observe the final
//! list for side effects. Filters additionally declare a [`FilterScope`]; a global-scope
//! filter's output is also surfaced to the tick-wide shared list for later scene-wide passes.

use std::fmt::Debug;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::drawable::Drawable;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::VignetteResult;

/// Opaque audio output. Audio composition happens outside this crate; sounds pass through
/// evaluation untouched and are surfaced in the tick report.
pub trait Sound: Debug {}

/// One frame's output item from an element pipeline.
#[derive(Clone, Debug)]
pub enum Renderable {
    Graphic {
        drawable: Arc<dyn Drawable>,
        /// Target layer override. `None` paints on the producing element's layer.
        z_override: Option<i32>,
    },
    Sound(Arc<dyn Sound>),
}

impl Renderable {
    /// A graphic destined for the producing element's own layer.
    pub fn graphic(drawable: Arc<dyn Drawable>) -> Self {
        Self::Graphic {
            drawable,
            z_override: None,
        }
    }

    /// A graphic rerouted to an explicit layer.
    pub fn graphic_on_layer(drawable: Arc<dyn Drawable>, z: i32) -> Self {
        Self::Graphic {
            drawable,
            z_override: Some(z),
        }
    }
}

/// Working list threaded through one element's pipeline. Short in practice.
pub type RenderableList = SmallVec<[Renderable; 4]>;

/// Reach of a filter's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterScope {
    /// Confined to the producing element's pipeline.
    Local,
    /// Also propagated to the tick's shared list for scene-wide passes.
    Global,
}

/// How an operator participates in pipeline evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorRole {
    Publisher,
    Transformer,
    Filter(FilterScope),
    Handler,
}

/// A pipeline stage owned by an element.
///
/// Only the method matching [`SourceOperator::role`] is called during evaluation; the defaults
/// are identity/no-op so implementors override exactly one. `enter`/`exit` bracket the owning
/// element's activity: `enter` runs once when the element becomes current, `exit` once when it
/// stops being current (or is removed while active), in reverse pipeline order.
pub trait SourceOperator: Debug {
    fn role(&self) -> OperatorRole;

    fn enter(&mut self) {}

    fn exit(&mut self) {}

    /// Produce a renderable for this frame. `Publisher` role.
    fn publish(&mut self, time: FrameIndex) -> VignetteResult<Option<Renderable>> {
        let _ = time;
        Ok(None)
    }

    /// Rewrite the working list. `Transformer` role.
    fn transform(
        &mut self,
        time: FrameIndex,
        input: RenderableList,
    ) -> VignetteResult<RenderableList> {
        let _ = time;
        Ok(input)
    }

    /// Shrink or replace the working list. `Filter` role.
    fn filter(
        &mut self,
        time: FrameIndex,
        input: RenderableList,
    ) -> VignetteResult<RenderableList> {
        let _ = time;
        Ok(input)
    }

    /// Observe the final working list. `Handler` role.
    fn handle(&mut self, time: FrameIndex, output: &[Renderable]) -> VignetteResult<()> {
        let _ = (time, output);
        Ok(())
    }
}

/// Publisher that emits one fixed drawable every frame.
#[derive(Debug)]
pub struct PublishDrawable {
    drawable: Arc<dyn Drawable>,
}

impl PublishDrawable {
    pub fn new(drawable: Arc<dyn Drawable>) -> Self {
        Self { drawable }
    }
}

impl SourceOperator for PublishDrawable {
    fn role(&self) -> OperatorRole {
        OperatorRole::Publisher
    }

    fn publish(&mut self, _time: FrameIndex) -> VignetteResult<Option<Renderable>> {
        Ok(Some(Renderable::graphic(Arc::clone(&self.drawable))))
    }
}

/// Transformer that reroutes every graphic in the working list to a fixed layer.
///
/// Decorator for content destined for a different layer than its producing element.
#[derive(Debug)]
pub struct RouteToLayer {
    z: i32,
}

impl RouteToLayer {
    pub fn new(z: i32) -> Self {
        Self { z }
    }
}

impl SourceOperator for RouteToLayer {
    fn role(&self) -> OperatorRole {
        OperatorRole::Transformer
    }

    fn transform(
        &mut self,
        _time: FrameIndex,
        input: RenderableList,
    ) -> VignetteResult<RenderableList> {
        Ok(input
            .into_iter()
            .map(|r| match r {
                Renderable::Graphic { drawable, .. } => Renderable::Graphic {
                    drawable,
                    z_override: Some(self.z),
                },
                sound => sound,
            })
            .collect())
    }
}
