//! Frame composition facade.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use crate::drawable::Drawable;
use crate::foundation::core::{FrameIndex, PixelSize, Point};
use crate::foundation::error::VignetteResult;
use crate::render::dispatch::Dispatcher;
use crate::render::target::{FrameRgba, PixelCanvas};
use crate::scene::Scene;
use crate::timeline::element::Timeline;
use crate::timeline::evaluator::{TickReport, TimelineEvaluator};

/// Single-owner in-progress flag with RAII release.
///
/// Plain `Cell<bool>`: the mutual-exclusion contract is against reentrancy on one thread, not
/// against other threads.
#[derive(Debug, Default)]
pub struct BusyFlag(Cell<bool>);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.0.get()
    }

    /// Claim the flag; `None` when already claimed. Released when the guard drops.
    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        if self.0.get() {
            return None;
        }
        self.0.set(true);
        Some(BusyGuard(&self.0))
    }
}

pub struct BusyGuard<'a>(&'a Cell<bool>);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Owns the scene, the timeline and the evaluator, and turns playhead positions into frames.
pub struct Compositor {
    scene: Scene,
    timeline: Timeline,
    evaluator: TimelineEvaluator,
    edits: Dispatcher<Timeline>,
    rendering: Rc<BusyFlag>,
    last_report: Option<TickReport>,
}

impl Compositor {
    pub fn new(size: PixelSize) -> Self {
        Self {
            scene: Scene::new(size),
            timeline: Timeline::new(),
            evaluator: TimelineEvaluator::new(),
            edits: Dispatcher::default(),
            rendering: Rc::new(BusyFlag::new()),
            last_report: None,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Queue a timeline edit to run at the start of the next composed frame.
    ///
    /// Edits posted mid-frame (from operators, hooks or host callbacks) must not mutate the
    /// timeline under the evaluator; deferring them to the frame boundary keeps the tick's
    /// survey consistent. Edits may post follow-up edits through the dispatcher they receive.
    pub fn post_edit(
        &mut self,
        edit: impl FnOnce(&mut Timeline, &mut Dispatcher<Timeline>) + 'static,
    ) {
        self.edits.post(edit);
    }

    /// Number of queued, not-yet-applied timeline edits.
    pub fn pending_edits(&self) -> usize {
        self.edits.pending()
    }

    /// The in-progress flag, shared so callers can observe (or pre-claim) render activity.
    pub fn render_flag(&self) -> Rc<BusyFlag> {
        Rc::clone(&self.rendering)
    }

    /// What the most recent completed frame's tick did.
    pub fn last_report(&self) -> Option<&TickReport> {
        self.last_report.as_ref()
    }

    /// Compose one frame at `time`.
    ///
    /// Returns `Ok(None)` when a render is already in progress: the frame is dropped, not
    /// queued. Callers poll or wait for invalidation to retry; this bounds preview latency
    /// instead of building a backlog.
    pub fn render_frame(&mut self, time: FrameIndex) -> VignetteResult<Option<FrameRgba>> {
        let flag = Rc::clone(&self.rendering);
        let Some(_guard) = flag.try_acquire() else {
            tracing::debug!(time = time.0, "render in progress, dropping frame");
            return Ok(None);
        };

        self.edits.flush(&mut self.timeline);
        self.scene.clear();
        let report = self
            .evaluator
            .tick(&mut self.timeline, time, &mut self.scene);

        let mut canvas = PixelCanvas::new(self.scene.size());
        self.scene.render(&mut canvas);
        self.last_report = Some(report);
        Ok(Some(canvas.into_frame()))
    }

    /// Topmost drawable at `point` as of the last composed frame.
    pub fn hit_test(&self, point: Point) -> Option<Arc<dyn Drawable>> {
        self.scene.hit_test(point)
    }
}
