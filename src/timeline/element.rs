//! Timeline elements and the timeline that owns them.

use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::error::VignetteResult;
use crate::timeline::operator::{FilterScope, OperatorRole, RenderableList, SourceOperator};

slotmap::new_key_type! {
    /// Generation-checked handle to a timeline element.
    pub struct ElementId;
}

/// Output of one element pipeline evaluation.
#[derive(Debug, Default)]
pub struct Evaluation {
    /// The final working list, to be painted on the element's layer.
    pub renderables: RenderableList,
    /// Global-scope filter output, surfaced tick-wide.
    pub shared: RenderableList,
}

/// A timeline object: a time range, a z-index, and an operator pipeline.
#[derive(Debug)]
pub struct Element {
    name: String,
    range: FrameRange,
    z_index: i32,
    enabled: bool,
    operators: Vec<Box<dyn SourceOperator>>,
}

impl Element {
    pub fn new(range: FrameRange, z_index: i32) -> Self {
        Self {
            name: String::new(),
            range,
            z_index,
            enabled: true,
            operators: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_operator(mut self, operator: Box<dyn SourceOperator>) -> Self {
        self.operators.push(operator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn range(&self) -> FrameRange {
        self.range
    }

    pub fn set_range(&mut self, range: FrameRange) {
        self.range = range;
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn set_z_index(&mut self, z: i32) {
        self.z_index = z;
    }

    /// A disabled element never intersects the playhead, whatever its range says.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn push_operator(&mut self, operator: Box<dyn SourceOperator>) {
        self.operators.push(operator);
    }

    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    /// Whether the element is live at `time`.
    pub fn intersects(&self, time: FrameIndex) -> bool {
        self.enabled && self.range.contains(time)
    }

    /// Start every operator, pipeline order.
    pub(crate) fn enter(&mut self) {
        for op in self.operators.iter_mut() {
            op.enter();
        }
    }

    /// Stop every operator, reverse pipeline order.
    pub(crate) fn exit(&mut self) {
        for op in self.operators.iter_mut().rev() {
            op.exit();
        }
    }

    /// Run the pipeline for one frame.
    ///
    /// The first operator error aborts this element's evaluation; partial output is discarded
    /// by the caller.
    pub fn evaluate(&mut self, time: FrameIndex) -> VignetteResult<Evaluation> {
        let mut working = RenderableList::new();
        let mut shared = RenderableList::new();
        for op in self.operators.iter_mut() {
            match op.role() {
                OperatorRole::Publisher => {
                    if let Some(renderable) = op.publish(time)? {
                        working.push(renderable);
                    }
                }
                OperatorRole::Transformer => {
                    working = op.transform(time, working)?;
                }
                OperatorRole::Filter(scope) => {
                    working = op.filter(time, working)?;
                    if scope == FilterScope::Global {
                        shared.extend(working.iter().cloned());
                    }
                }
                OperatorRole::Handler => op.handle(time, &working)?,
            }
        }
        Ok(Evaluation {
            renderables: working,
            shared,
        })
    }
}

pub(crate) struct Slot {
    pub(crate) element: Element,
    /// Whether the element was current at the previous tick.
    pub(crate) active: bool,
}

/// Owns elements and their activity state; insertion order is preserved for iteration.
#[derive(Default)]
pub struct Timeline {
    elements: SlotMap<ElementId, Slot>,
    order: Vec<ElementId>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, element: Element) -> ElementId {
        let id = self.elements.insert(Slot {
            element,
            active: false,
        });
        self.order.push(id);
        id
    }

    /// Unload an element. If it is active, its operators are stopped first.
    pub fn remove(&mut self, id: ElementId) -> Option<Element> {
        let mut slot = self.elements.remove(id)?;
        self.order.retain(|e| *e != id);
        if slot.active {
            slot.element.exit();
        }
        Some(slot.element)
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id).map(|s| &s.element)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id).map(|s| &mut s.element)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether the element was current at the last tick.
    pub fn is_active(&self, id: ElementId) -> bool {
        self.elements.get(id).is_some_and(|s| s.active)
    }

    /// Element ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.order.iter().copied()
    }

    pub(crate) fn slot_mut(&mut self, id: ElementId) -> Option<&mut Slot> {
        self.elements.get_mut(id)
    }

    /// Snapshot of `(id, z, intersects, active)` per element, insertion order. Lets the
    /// evaluator classify without holding a borrow across mutation.
    pub(crate) fn survey(&self, time: FrameIndex) -> SmallVec<[(ElementId, i32, bool, bool); 8]> {
        self.order
            .iter()
            .filter_map(|id| {
                self.elements.get(*id).map(|slot| {
                    (
                        *id,
                        slot.element.z_index(),
                        slot.element.intersects(time),
                        slot.active,
                    )
                })
            })
            .collect()
    }
}
