//! The per-tick enter/exit/evaluate loop.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::foundation::core::FrameIndex;
use crate::scene::Scene;
use crate::timeline::element::{ElementId, Timeline};
use crate::timeline::operator::{Renderable, Sound};

/// What one evaluation tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Elements that became current this tick, evaluation order.
    pub entered: Vec<ElementId>,
    /// Elements that stopped being current this tick.
    pub exited: Vec<ElementId>,
    /// Elements whose pipeline ran to completion.
    pub evaluated: usize,
    /// Elements whose pipeline failed and was skipped.
    pub failed: usize,
    /// Global-scope filter output, across all elements, for scene-wide passes.
    pub shared: Vec<Renderable>,
    /// Audio output, surfaced for an external audio composer.
    pub sounds: Vec<Arc<dyn Sound>>,
}

/// Drives element lifecycles and pipelines against the playhead.
///
/// One tick classifies every element against the previous tick's activity, then processes
/// exits, entries and evaluation in that order, so operators observe a consistent boundary:
/// by the time any pipeline runs, every exited element has released its resources and every
/// entered one has acquired them.
#[derive(Debug, Default)]
pub struct TimelineEvaluator {
    previous: Option<FrameIndex>,
}

impl TimelineEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The playhead position of the last tick, if any.
    pub fn previous_time(&self) -> Option<FrameIndex> {
        self.previous
    }

    /// Evaluate one frame at `time`, painting results into `scene`.
    ///
    /// A single element's pipeline failure is logged and skipped; the rest of the frame
    /// proceeds. The caller is expected to have cleared the scene's current-frame lists.
    #[tracing::instrument(skip_all, fields(time = time.0))]
    pub fn tick(
        &mut self,
        timeline: &mut Timeline,
        time: FrameIndex,
        scene: &mut Scene,
    ) -> TickReport {
        let survey = timeline.survey(time);
        let mut report = TickReport::default();

        // Current elements, ascending z. Stable insertion sort: z changes are rare and the
        // list is short, so nearly-sorted input dominates.
        let mut current: SmallVec<[(ElementId, i32); 8]> = survey
            .iter()
            .filter(|(_, _, intersects, _)| *intersects)
            .map(|(id, z, _, _)| (*id, *z))
            .collect();
        sort_by_z(&mut current);

        // Exits first: release before anything new acquires.
        for (id, z, intersects, active) in survey.iter().copied() {
            if active && !intersects {
                if let Some(slot) = timeline.slot_mut(id) {
                    slot.element.exit();
                    slot.active = false;
                }
                scene.layer(z).clear_all_cache();
                report.exited.push(id);
            }
        }

        for (id, _, intersects, active) in survey.iter().copied() {
            if intersects && !active {
                if let Some(slot) = timeline.slot_mut(id) {
                    slot.element.enter();
                    slot.active = true;
                }
                report.entered.push(id);
            }
        }

        for (id, z) in current {
            let Some(element) = timeline.get_mut(id) else {
                continue;
            };
            match element.evaluate(time) {
                Ok(evaluation) => {
                    report.evaluated += 1;
                    for renderable in evaluation.renderables {
                        match renderable {
                            Renderable::Graphic {
                                drawable,
                                z_override,
                            } => {
                                scene.layer(z_override.unwrap_or(z)).add(&drawable);
                            }
                            Renderable::Sound(sound) => report.sounds.push(sound),
                        }
                    }
                    report.shared.extend(evaluation.shared);
                }
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(
                        element = %element.name(),
                        %error,
                        "element evaluation failed, skipping"
                    );
                }
            }
        }

        self.previous = Some(time);
        report
    }
}

fn sort_by_z(items: &mut SmallVec<[(ElementId, i32); 8]>) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && items[j - 1].1 > items[j].1 {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}
