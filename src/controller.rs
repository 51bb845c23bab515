//! High-level controller for spatial canvas applications.
//!
//! The [`CanvasController`] reduces boilerplate by wiring the registry,
//! proximity detector, composition manager, morph engine, and store
//! together behind a drag-and-frame protocol.
//!
//! # Example
//!
//! ```ignore
//! use canvas_meld::{CanvasController, GlyphKind, MemoryStore, Rect};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! fn main() {
//!     let store = Rc::new(RefCell::new(MemoryStore::new()));
//!     let ctrl = CanvasController::new(store);
//!
//!     // Rebuild whatever the last session left behind
//!     ctrl.restore().unwrap();
//!
//!     // Highlight candidate targets as the user drags
//!     ctrl.set_feedback_hook(Box::new(|state| {
//!         // update hover affordances from state.tier
//!     }));
//!
//!     // Host event loop wiring
//!     canvas.on_pointer_down({
//!         let ctrl = ctrl.clone();
//!         move |id, x, y| {
//!             ctrl.begin_drag(&id.into(), x, y);
//!         }
//!     });
//!     canvas.on_pointer_move(ctrl.drag_move_callback());
//!     canvas.on_pointer_up(ctrl.drag_ended_callback());
//!     canvas.on_frame(ctrl.frame_callback());
//! }
//! ```

use crate::builder::{CompositionManager, MeldError, RestoreReport};
use crate::compat::{CompatibilityMatrix, Direction};
use crate::composition::CompositionId;
use crate::geometry::Rect;
use crate::glyph::{Glyph, GlyphId, GlyphKind, GlyphRef};
use crate::morph::{
    FrameTweenDriver, MorphEngine, MorphHandle, MorphSpec, MorphStatus, TweenDriver,
};
use crate::proximity::{FeedbackHook, FeedbackState, MeldTarget, ProximityDetector, ProximityFeedback};
use crate::registry::{GlyphRegistry, IdentityViolation, RebindHook};
use crate::store::{CompositionStore, StoredPlacement};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace, warn};

struct DragState {
    glyph: GlyphRef,
    grab_dx: f32,
    grab_dy: f32,
}

/// Controller that owns canvas state and provides the event-loop surface.
///
/// This provides a high-level API that handles:
/// - Glyph creation, removal, and restore-from-store
/// - Drag tracking with frame-throttled proximity probing
/// - Drop dispatch: meld, extend, or merge depending on what met what
/// - Morph conveniences (minimize, maximize, reshape) that apply committed
///   end rects to the model
/// - Placement and composition persistence on every structural change
///
/// Probes never run on pointer events directly; moves only mark a probe
/// pending and [`frame`](Self::frame) runs at most one per frame.
///
/// Clone this controller to share it across callbacks.
#[derive(Clone)]
pub struct CanvasController {
    registry: Rc<RefCell<GlyphRegistry>>,
    manager: Rc<RefCell<CompositionManager>>,
    detector: Rc<ProximityDetector>,
    feedback: Rc<RefCell<ProximityFeedback>>,
    morphs: Rc<MorphEngine>,
    store: Rc<RefCell<dyn CompositionStore>>,
    drag: Rc<RefCell<Option<DragState>>>,
    probe_pending: Rc<Cell<bool>>,
    minimized: Rc<RefCell<HashMap<GlyphId, Rect>>>,
}

impl CanvasController {
    /// Extent glyphs collapse to when minimized.
    pub const MINIMIZED_WIDTH: f32 = 120.0;
    pub const MINIMIZED_HEIGHT: f32 = 36.0;

    /// Create a controller with the default compatibility matrix and a
    /// frame-clocked tween driver.
    pub fn new(store: Rc<RefCell<dyn CompositionStore>>) -> Self {
        Self::with_driver(store, Rc::new(FrameTweenDriver::new()))
    }

    /// Create a controller with a specific tween driver.
    pub fn with_driver(
        store: Rc<RefCell<dyn CompositionStore>>,
        driver: Rc<dyn TweenDriver>,
    ) -> Self {
        Self::with_matrix(CompatibilityMatrix::default(), store, driver)
    }

    /// Create a controller with a custom compatibility matrix.
    pub fn with_matrix(
        matrix: CompatibilityMatrix,
        store: Rc<RefCell<dyn CompositionStore>>,
        driver: Rc<dyn TweenDriver>,
    ) -> Self {
        let matrix = Rc::new(matrix);
        Self {
            registry: Rc::new(RefCell::new(GlyphRegistry::new())),
            manager: Rc::new(RefCell::new(CompositionManager::new(
                matrix.clone(),
                store.clone(),
            ))),
            detector: Rc::new(ProximityDetector::new(matrix)),
            feedback: Rc::new(RefCell::new(ProximityFeedback::new())),
            morphs: Rc::new(MorphEngine::new(driver)),
            store,
            drag: Rc::new(RefCell::new(None)),
            probe_pending: Rc::new(Cell::new(false)),
            minimized: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Get access to the glyph registry.
    pub fn registry(&self) -> Rc<RefCell<GlyphRegistry>> {
        self.registry.clone()
    }

    /// Get access to the composition manager.
    pub fn manager(&self) -> Rc<RefCell<CompositionManager>> {
        self.manager.clone()
    }

    /// Get access to the morph engine.
    pub fn morphs(&self) -> Rc<MorphEngine> {
        self.morphs.clone()
    }

    /// Get access to the backing store.
    pub fn store(&self) -> Rc<RefCell<dyn CompositionStore>> {
        self.store.clone()
    }

    pub fn detector(&self) -> Rc<ProximityDetector> {
        self.detector.clone()
    }

    /// Register the hook fired when the highlighted meld candidate changes.
    ///
    /// The hook runs inside the probe; keep it to affordance updates.
    pub fn set_feedback_hook(&self, hook: FeedbackHook) {
        self.feedback.borrow_mut().set_hook(hook);
    }

    /// Register the hook fired when a glyph is reparented or relocated.
    pub fn set_rebind_hook(&self, hook: RebindHook) {
        self.registry.borrow_mut().set_rebind_hook(hook);
    }

    // === Glyph lifecycle ===

    /// Create a glyph and persist its placement.
    ///
    /// # Panics
    ///
    /// Panics if the id is already registered.
    pub fn create_glyph(&self, id: impl Into<GlyphId>, kind: GlyphKind, rect: Rect) -> GlyphRef {
        let glyph = self.registry.borrow_mut().create(id, kind, rect);
        self.sync_placement(&glyph);
        glyph
    }

    pub fn glyph(&self, id: &GlyphId) -> Option<GlyphRef> {
        self.registry.borrow().get(id)
    }

    /// Remove a glyph from the canvas, unmelding its composition first when
    /// it is a member. The placement record goes with it.
    ///
    /// # Panics
    ///
    /// Panics if the id is not registered.
    pub fn remove_glyph(&self, id: &GlyphId) {
        // An in-flight morph rolls back before the glyph goes, so its
        // commit path never touches a dead id.
        if self.morphs.cancel(id, false) {
            debug!(entity = %id, "rolled back morph on removal");
        }
        let tag = self
            .registry
            .borrow()
            .get(id)
            .and_then(|g| g.borrow().composition().cloned());
        if let Some(tag) = tag {
            if let Err(err) = self.unmeld(&tag) {
                warn!(%err, "could not unmeld before removal");
            }
        }
        self.registry.borrow_mut().remove(id);
        self.minimized.borrow_mut().remove(id);
        if let Err(err) = self.store.borrow_mut().remove_placement(id) {
            debug!(%err, "no placement record to remove");
        }
    }

    /// Rebuild canvas state from the store: placement records become
    /// glyphs, then composition records are replayed. Records that cannot
    /// be replayed are dropped with a warning.
    pub fn restore(&self) -> Result<RestoreReport, MeldError> {
        let placements = self.store.borrow().placements()?;
        {
            let mut registry = self.registry.borrow_mut();
            for placement in placements {
                if registry.contains(&placement.id) {
                    continue;
                }
                let rect = Rect::new(
                    placement.x,
                    placement.y,
                    placement.width.unwrap_or(Glyph::DEFAULT_WIDTH),
                    placement.height.unwrap_or(Glyph::DEFAULT_HEIGHT),
                );
                registry.create(placement.id.clone(), placement.kind, rect);
            }
        }
        let registry = self.registry.borrow();
        self.manager.borrow_mut().restore(&registry)
    }

    /// Sweep the identity invariant across every composition.
    pub fn verify(&self) -> Result<(), IdentityViolation> {
        self.registry
            .borrow()
            .verify_invariant(&self.manager.borrow())
    }

    // === Structural operations ===

    /// Meld two standalone glyphs directly, bypassing proximity.
    pub fn meld(
        &self,
        initiator: &GlyphId,
        target: &GlyphId,
        direction: Direction,
    ) -> Result<CompositionId, MeldError> {
        let a = self
            .registry
            .borrow()
            .get(initiator)
            .ok_or_else(|| MeldError::MissingMember(initiator.clone()))?;
        let b = self
            .registry
            .borrow()
            .get(target)
            .ok_or_else(|| MeldError::MissingMember(target.clone()))?;
        let id = self.manager.borrow_mut().meld(a.clone(), b.clone(), direction)?;
        self.registry.borrow().notify_relocated(&a);
        self.registry.borrow().notify_relocated(&b);
        self.sync_placement(&a);
        self.sync_placement(&b);
        Ok(id)
    }

    /// Disassemble a composition, spreading its members back onto the
    /// canvas as standalone glyphs.
    pub fn unmeld(&self, composition: &CompositionId) -> Result<Vec<GlyphRef>, MeldError> {
        let members = self.manager.borrow_mut().unmeld(composition)?;
        for member in &members {
            self.registry.borrow().notify_relocated(member);
            self.sync_placement(member);
        }
        self.feedback.borrow_mut().clear();
        Ok(members)
    }

    // === Drag protocol ===

    /// Start dragging a glyph (or the composition it belongs to) from the
    /// given pointer position. Unknown ids are a no-op.
    pub fn begin_drag(&self, id: &GlyphId, pointer_x: f32, pointer_y: f32) -> bool {
        let glyph = match self.registry.borrow().get(id) {
            Some(glyph) => glyph,
            None => return false,
        };
        let tag = glyph.borrow().composition().cloned();
        let origin = match tag {
            Some(tag) => match self.manager.borrow().get(&tag) {
                Some(composite) => composite.anchor(),
                None => return false,
            },
            None => glyph.borrow().rect.origin(),
        };
        *self.drag.borrow_mut() = Some(DragState {
            glyph,
            grab_dx: pointer_x - origin.0,
            grab_dy: pointer_y - origin.1,
        });
        self.probe_pending.set(false);
        true
    }

    /// Move the dragged entity to follow the pointer and mark a probe
    /// pending for the next frame. No-op outside a drag.
    pub fn drag_move(&self, pointer_x: f32, pointer_y: f32) {
        {
            let drag = self.drag.borrow();
            let state = match drag.as_ref() {
                Some(state) => state,
                None => return,
            };
            let x = pointer_x - state.grab_dx;
            let y = pointer_y - state.grab_dy;
            let tag = state.glyph.borrow().composition().cloned();
            match tag {
                Some(tag) => {
                    if let Err(err) = self.manager.borrow_mut().set_position(&tag, x, y) {
                        warn!(%err, "dragged composition vanished");
                        return;
                    }
                }
                None => {
                    let mut glyph = state.glyph.borrow_mut();
                    glyph.rect = glyph.rect.at(x, y);
                }
            }
        }
        self.probe_pending.set(true);
    }

    /// Advance one frame: tick morph tweens and run at most one pending
    /// proximity probe.
    pub fn frame(&self, dt: Duration) {
        self.morphs.tick(dt);
        if self.probe_pending.replace(false) {
            self.run_probe();
        }
    }

    /// Finish the drag. If the final probe lands inside meld range the
    /// join commits (meld, extend, or merge as appropriate) and the new
    /// composition id comes back; otherwise everything stays as dropped.
    /// The moved entity's position is persisted either way.
    pub fn end_drag(&self) -> Option<CompositionId> {
        let state = self.drag.borrow_mut().take()?;
        self.probe_pending.set(false);

        let hit = {
            let placed = self.registry.borrow().placed();
            let manager = self.manager.borrow();
            self.detector.find_target(&state.glyph, &placed, &manager)
        };
        self.feedback.borrow_mut().clear();

        let committed = match hit {
            Some(hit) if hit.within_meld_range(self.detector.config()) => self.commit_drop(hit),
            _ => None,
        };

        let tag = state.glyph.borrow().composition().cloned();
        match tag {
            Some(tag) => {
                let anchor = self.manager.borrow().get(&tag).map(|c| c.anchor());
                if let Some((x, y)) = anchor {
                    if let Err(err) = self.manager.borrow_mut().relocate(&tag, x, y) {
                        warn!(%err, "could not persist composition position");
                    }
                }
                let members = self
                    .manager
                    .borrow()
                    .get(&tag)
                    .map(|c| c.members())
                    .unwrap_or_default();
                for member in &members {
                    self.sync_placement(member);
                }
            }
            None => self.sync_placement(&state.glyph),
        }
        committed
    }

    /// Whether a drag is in flight.
    pub fn is_dragging(&self) -> bool {
        self.drag.borrow().is_some()
    }

    // === Morph conveniences ===

    /// Collapse a glyph to its minimized extent, remembering the full rect
    /// for [`maximize`](Self::maximize). Returns `None` for unknown ids or
    /// glyphs already minimized.
    pub fn minimize(&self, id: &GlyphId) -> Option<MorphHandle> {
        let glyph = self.registry.borrow().get(id)?;
        if self.minimized.borrow().contains_key(id) {
            return None;
        }
        let full = glyph.borrow().rect;
        self.minimized.borrow_mut().insert(id.clone(), full);
        let spec = MorphSpec::minimize(full, Self::MINIMIZED_WIDTH, Self::MINIMIZED_HEIGHT);
        let handle = self.begin_morph(glyph, spec);
        let ctrl = self.clone();
        let gid = id.clone();
        handle.on_settled(Box::new(move |status| {
            // A preempted minimize never became a chip; drop the stash.
            if status == MorphStatus::RolledBack {
                ctrl.minimized.borrow_mut().remove(&gid);
            }
        }));
        Some(handle)
    }

    /// Grow a minimized glyph back to its remembered extent at its current
    /// position. Returns `None` for unknown or non-minimized glyphs.
    pub fn maximize(&self, id: &GlyphId) -> Option<MorphHandle> {
        let glyph = self.registry.borrow().get(id)?;
        let full = self.minimized.borrow().get(id).copied()?;
        let current = glyph.borrow().rect;
        let spec = MorphSpec::maximize(Rect::new(current.x, current.y, full.width, full.height));
        let handle = self.begin_morph(glyph, spec);
        let ctrl = self.clone();
        let gid = id.clone();
        handle.on_settled(Box::new(move |status| {
            if status == MorphStatus::Committed {
                ctrl.minimized.borrow_mut().remove(&gid);
            }
        }));
        Some(handle)
    }

    /// Morph a glyph to an arbitrary rect. Returns `None` for unknown ids.
    pub fn morph_to(&self, id: &GlyphId, end: Rect) -> Option<MorphHandle> {
        let glyph = self.registry.borrow().get(id)?;
        Some(self.begin_morph(glyph, MorphSpec::reshape(end)))
    }

    // === Callback factories ===

    /// Returns a callback for pointer-move events during a drag.
    pub fn drag_move_callback(&self) -> impl Fn(f32, f32) {
        let ctrl = self.clone();
        move |x, y| ctrl.drag_move(x, y)
    }

    /// Returns a callback for pointer-up ending a drag.
    pub fn drag_ended_callback(&self) -> impl Fn() {
        let ctrl = self.clone();
        move || {
            ctrl.end_drag();
        }
    }

    /// Returns a callback for per-frame ticks.
    pub fn frame_callback(&self) -> impl Fn(Duration) {
        let ctrl = self.clone();
        move |dt| ctrl.frame(dt)
    }

    // === Internals ===

    fn run_probe(&self) {
        let dragged = self.drag.borrow().as_ref().map(|s| s.glyph.clone());
        match dragged {
            Some(glyph) => {
                let hit = {
                    let placed = self.registry.borrow().placed();
                    let manager = self.manager.borrow();
                    self.detector.find_target(&glyph, &placed, &manager)
                };
                let state = hit
                    .as_ref()
                    .map(|h| FeedbackState::of(h, self.detector.config()));
                trace!(hit = state.is_some(), "ran proximity probe");
                self.feedback.borrow_mut().update(state);
            }
            None => self.feedback.borrow_mut().clear(),
        }
    }

    /// Dispatch a committing drop to the right structural operation based
    /// on what each endpoint belongs to. Rejections degrade to a logged
    /// no-op; the drop simply does not join.
    fn commit_drop(&self, hit: MeldTarget) -> Option<CompositionId> {
        let direction = hit.direction;
        let initiator_id = hit.initiator.borrow().id().clone();
        let target_id = hit.target.borrow().id().clone();
        let init_tag = hit.initiator.borrow().composition().cloned();
        let targ_tag = hit.target.borrow().composition().cloned();

        let result = match (init_tag, targ_tag) {
            (None, None) => self
                .manager
                .borrow_mut()
                .meld(hit.initiator.clone(), hit.target.clone(), direction)
                .map(|id| (id, vec![hit.initiator.clone(), hit.target.clone()])),
            (Some(comp), None) => self
                .manager
                .borrow_mut()
                .extend(
                    &comp,
                    hit.target.clone(),
                    &initiator_id,
                    direction,
                    direction.initiator_first(),
                )
                .map(|id| (id, vec![hit.target.clone()])),
            (None, Some(comp)) => self
                .manager
                .borrow_mut()
                .extend(
                    &comp,
                    hit.initiator.clone(),
                    &target_id,
                    direction,
                    !direction.initiator_first(),
                )
                .map(|id| (id, vec![hit.initiator.clone()])),
            (Some(survivor), Some(absorbed)) if survivor != absorbed => {
                let reparented = self
                    .manager
                    .borrow()
                    .get(&absorbed)
                    .map(|c| c.members())
                    .unwrap_or_default();
                self.manager
                    .borrow_mut()
                    .merge(&survivor, &absorbed, &initiator_id, &target_id, direction)
                    .map(|id| (id, reparented))
            }
            // The detector never matches within one composition.
            (Some(_), Some(_)) => return None,
        };

        match result {
            Ok((id, reparented)) => {
                for glyph in &reparented {
                    self.registry.borrow().notify_relocated(glyph);
                }
                Some(id)
            }
            Err(err) => {
                debug!(%err, "drop did not commit");
                None
            }
        }
    }

    fn begin_morph(&self, glyph: GlyphRef, spec: MorphSpec) -> MorphHandle {
        let handle = self.morphs.begin(&glyph, spec);
        let ctrl = self.clone();
        let end = spec.end;
        handle.on_settled(Box::new(move |status| {
            if status == MorphStatus::Committed {
                glyph.borrow_mut().rect = end;
                ctrl.after_geometry_change(&glyph);
            }
        }));
        handle
    }

    /// Reflow and re-persist around a glyph whose extent just changed.
    fn after_geometry_change(&self, glyph: &GlyphRef) {
        let tag = glyph.borrow().composition().cloned();
        if let Some(tag) = tag {
            if let Some(composite) = self.manager.borrow().get(&tag) {
                composite.relayout();
            }
        }
        self.registry.borrow().notify_relocated(glyph);
        self.sync_placement(glyph);
    }

    fn sync_placement(&self, glyph: &GlyphRef) {
        let record = {
            let g = glyph.borrow();
            StoredPlacement {
                id: g.id().clone(),
                kind: g.kind,
                x: g.rect.x,
                y: g.rect.y,
                width: Some(g.rect.width),
                height: Some(g.rect.height),
            }
        };
        if let Err(err) = self.store.borrow_mut().put_placement(record) {
            warn!(%err, "could not persist placement");
        }
    }
}
