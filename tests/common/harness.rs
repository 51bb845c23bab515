//! Test harness for controller-level integration tests.
//!
//! Provides a complete setup mirroring a host embedding with hook
//! tracking and helper methods for simulating user interactions.

#![allow(dead_code)]

use super::HookTracker;
use canvas_meld::{
    CanvasController, CompositionId, Direction, FrameTweenDriver, GlyphId, GlyphKind, GlyphRef,
    InstantTweenDriver, MemoryStore, Rect, TweenDriver,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// One simulated frame at roughly 60fps.
pub const FRAME: Duration = Duration::from_millis(16);

/// Test harness for a canvas host.
///
/// Sets up glyphs, the controller, and all hooks with tracking.
pub struct CanvasTestHarness {
    pub ctrl: CanvasController,
    pub store: Rc<RefCell<MemoryStore>>,
    pub tracker: HookTracker,
}

impl CanvasTestHarness {
    /// Create a new test harness with two default script glyphs far
    /// enough apart that nothing melds on its own.
    pub fn new() -> Self {
        Self::with_glyphs(vec![
            ("alpha", GlyphKind::SCRIPT, Rect::new(100.0, 100.0, 200.0, 150.0)),
            ("beta", GlyphKind::SCRIPT, Rect::new(500.0, 300.0, 200.0, 150.0)),
        ])
    }

    /// Create a new test harness with custom glyphs and a frame-clocked
    /// tween driver.
    pub fn with_glyphs(glyphs: Vec<(&str, GlyphKind, Rect)>) -> Self {
        Self::build(glyphs, Rc::new(FrameTweenDriver::new()))
    }

    /// Create a harness whose morphs settle without animation frames.
    pub fn instant_with_glyphs(glyphs: Vec<(&str, GlyphKind, Rect)>) -> Self {
        Self::build(glyphs, Rc::new(InstantTweenDriver::new()))
    }

    fn build(glyphs: Vec<(&str, GlyphKind, Rect)>, driver: Rc<dyn TweenDriver>) -> Self {
        let store = Rc::new(RefCell::new(MemoryStore::new()));
        let ctrl = CanvasController::with_driver(store.clone(), driver);
        let tracker = HookTracker::new();

        // Hooks a host would install, recorded for assertions
        ctrl.set_feedback_hook({
            let tracker = tracker.clone();
            Box::new(move |state| {
                tracker.feedback_changes.borrow_mut().push(state.map(|s| {
                    (
                        s.initiator.as_str().to_owned(),
                        s.target.as_str().to_owned(),
                        s.tier,
                        s.reversed,
                    )
                }));
            })
        });
        ctrl.set_rebind_hook({
            let tracker = tracker.clone();
            Box::new(move |glyph| {
                tracker
                    .rebinds
                    .borrow_mut()
                    .push(glyph.borrow().id().as_str().to_owned());
            })
        });

        for (id, kind, rect) in glyphs {
            ctrl.create_glyph(id, kind, rect);
        }

        Self {
            ctrl,
            store,
            tracker,
        }
    }

    /// Advance one frame: tick morphs, run any pending probe.
    pub fn pump(&self) {
        self.ctrl.frame(FRAME);
    }

    /// Advance a given number of milliseconds one frame at a time.
    pub fn pump_ms(&self, ms: u64) {
        let mut remaining = ms;
        while remaining >= 16 {
            self.pump();
            remaining -= 16;
        }
        if remaining > 0 {
            self.ctrl.frame(Duration::from_millis(remaining));
        }
    }

    /// Look up a glyph, panicking on unknown ids.
    pub fn glyph(&self, id: &str) -> GlyphRef {
        self.ctrl
            .glyph(&GlyphId::new(id))
            .unwrap_or_else(|| panic!("no glyph {id}"))
    }

    pub fn rect_of(&self, id: &str) -> Rect {
        self.glyph(id).borrow().rect
    }

    pub fn origin_of(&self, id: &str) -> (f32, f32) {
        self.rect_of(id).origin()
    }

    /// The id of the composition a glyph belongs to, if any.
    pub fn composition_of(&self, id: &str) -> Option<CompositionId> {
        self.glyph(id).borrow().composition().cloned()
    }

    // === Pointer interaction helpers ===

    /// Press on a glyph, grabbing its drag entity at the entity origin.
    /// For melded glyphs that is the composition container.
    pub fn press(&self, id: &str) -> bool {
        let origin = match self.composition_of(id) {
            Some(tag) => {
                let manager = self.ctrl.manager();
                let manager = manager.borrow();
                match manager.get(&tag) {
                    Some(composite) => composite.anchor(),
                    None => return false,
                }
            }
            None => self.origin_of(id),
        };
        self.ctrl.begin_drag(&GlyphId::new(id), origin.0, origin.1)
    }

    /// Move the dragged entity so its origin lands at (x, y), then pump a
    /// frame so the probe runs.
    pub fn move_to(&self, x: f32, y: f32) {
        self.ctrl.drag_move(x, y);
        self.pump();
    }

    /// Release the drag, returning the committed composition if the drop
    /// joined anything.
    pub fn release(&self) -> Option<CompositionId> {
        self.ctrl.end_drag()
    }

    /// Simulate a complete drag of a glyph to a new origin.
    pub fn drag(&self, id: &str, x: f32, y: f32) -> Option<CompositionId> {
        assert!(self.press(id), "glyph {id} not draggable");
        self.move_to(x, y);
        self.release()
    }

    /// Meld two glyphs by id, bypassing the pointer protocol.
    pub fn meld(&self, initiator: &str, target: &str, direction: Direction) -> CompositionId {
        self.ctrl
            .meld(&GlyphId::new(initiator), &GlyphId::new(target), direction)
            .unwrap_or_else(|err| panic!("meld {initiator} -> {target} failed: {err}"))
    }
}

impl Default for CanvasTestHarness {
    fn default() -> Self {
        Self::new()
    }
}
