//! Morph transactions: animated geometry changes that commit or roll back.
//!
//! A morph is a transaction against one glyph's geometry, played out by a
//! [`TweenDriver`]. At most one morph runs per glyph: beginning a second
//! one preempts the first, which settles as rolled back before the new
//! transaction starts. Observers watch a [`MorphHandle`]; the engine never
//! writes glyph rects itself, leaving committed end states to the caller
//! so visual frames and model state stay in one place.

use crate::geometry::Rect;
use crate::glyph::{GlyphId, GlyphRef};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

/// Duration used when a spec does not name one.
pub const DEFAULT_MORPH_DURATION: Duration = Duration::from_millis(200);

/// Requested geometry change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MorphSpec {
    pub end: Rect,
    pub duration: Duration,
}

impl MorphSpec {
    /// Morph to an arbitrary end rect over the default duration.
    pub fn reshape(end: Rect) -> Self {
        Self {
            end,
            duration: DEFAULT_MORPH_DURATION,
        }
    }

    /// Collapse in place to the given extent, keeping the origin.
    pub fn minimize(from: Rect, width: f32, height: f32) -> Self {
        Self::reshape(Rect::new(from.x, from.y, width, height))
    }

    /// Grow back to a remembered full rect.
    pub fn maximize(full: Rect) -> Self {
        Self::reshape(full)
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Final disposition of a morph transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MorphStatus {
    Running,
    Committed,
    RolledBack,
}

/// One tween the driver should play.
#[derive(Clone, Debug, PartialEq)]
pub struct TweenRequest {
    pub entity: GlyphId,
    pub start: Rect,
    pub end: Rect,
    pub duration: Duration,
}

/// Handle to a running tween. Cancelling settles the tween synchronously:
/// the settle callback has run by the time `cancel` returns.
pub trait TweenControl {
    fn cancel(self: Box<Self>, commit: bool);
}

/// Animation backend seam.
///
/// `on_settled(true)` reports natural completion, `on_settled(false)` a
/// cancelled tween. Frame-based drivers advance in [`tick`](Self::tick);
/// drivers that settle elsewhere ignore it.
pub trait TweenDriver {
    fn start(
        &self,
        request: TweenRequest,
        on_settled: Box<dyn FnOnce(bool)>,
    ) -> Box<dyn TweenControl>;

    fn tick(&self, _dt: Duration) {}
}

/// Driver that settles every tween on the spot. Used where animation is
/// irrelevant, including most of the test suites.
#[derive(Default)]
pub struct InstantTweenDriver;

impl InstantTweenDriver {
    pub fn new() -> Self {
        Self
    }
}

struct NoopControl;

impl TweenControl for NoopControl {
    fn cancel(self: Box<Self>, _commit: bool) {}
}

impl TweenDriver for InstantTweenDriver {
    fn start(
        &self,
        _request: TweenRequest,
        on_settled: Box<dyn FnOnce(bool)>,
    ) -> Box<dyn TweenControl> {
        on_settled(true);
        Box::new(NoopControl)
    }
}

type SettleSlot = Rc<RefCell<Option<Box<dyn FnOnce(bool)>>>>;

struct FrameTween {
    request: TweenRequest,
    elapsed: Duration,
    slot: SettleSlot,
}

struct FrameTweenControl {
    slot: SettleSlot,
}

impl TweenControl for FrameTweenControl {
    fn cancel(self: Box<Self>, commit: bool) {
        // Settle synchronously; the driver drops the dead tween on its
        // next tick.
        let settle = self.slot.borrow_mut().take();
        if let Some(settle) = settle {
            settle(commit);
        }
    }
}

/// Callback receiving interpolated frames: the entity and its rect for
/// this frame.
pub type FrameSink = Box<dyn Fn(&GlyphId, Rect)>;

/// Frame-clocked driver interpolating rects linearly.
///
/// Hosts call [`tick`](TweenDriver::tick) once per frame with the elapsed
/// time; each active tween emits one interpolated rect through the sink
/// and settles when its duration runs out.
pub struct FrameTweenDriver {
    tweens: Rc<RefCell<Vec<FrameTween>>>,
    sink: Option<FrameSink>,
}

impl Default for FrameTweenDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTweenDriver {
    pub fn new() -> Self {
        Self {
            tweens: Rc::new(RefCell::new(Vec::new())),
            sink: None,
        }
    }

    pub fn with_sink(sink: FrameSink) -> Self {
        Self {
            tweens: Rc::new(RefCell::new(Vec::new())),
            sink: Some(sink),
        }
    }

    /// Tweens still playing (cancelled ones linger until the next tick).
    pub fn active_count(&self) -> usize {
        self.tweens
            .borrow()
            .iter()
            .filter(|t| t.slot.borrow().is_some())
            .count()
    }
}

impl TweenDriver for FrameTweenDriver {
    fn start(
        &self,
        request: TweenRequest,
        on_settled: Box<dyn FnOnce(bool)>,
    ) -> Box<dyn TweenControl> {
        let slot: SettleSlot = Rc::new(RefCell::new(Some(on_settled)));
        self.tweens.borrow_mut().push(FrameTween {
            request,
            elapsed: Duration::ZERO,
            slot: slot.clone(),
        });
        Box::new(FrameTweenControl { slot })
    }

    fn tick(&self, dt: Duration) {
        let mut finished: Vec<Box<dyn FnOnce(bool)>> = Vec::new();
        {
            let mut tweens = self.tweens.borrow_mut();
            tweens.retain_mut(|tween| {
                if tween.slot.borrow().is_none() {
                    return false;
                }
                tween.elapsed += dt;
                let t = if tween.request.duration.is_zero() {
                    1.0
                } else {
                    (tween.elapsed.as_secs_f32() / tween.request.duration.as_secs_f32()).min(1.0)
                };
                let frame = lerp_rect(&tween.request.start, &tween.request.end, t);
                if let Some(sink) = &self.sink {
                    sink(&tween.request.entity, frame);
                }
                if t >= 1.0 {
                    if let Some(settle) = tween.slot.borrow_mut().take() {
                        finished.push(settle);
                    }
                    false
                } else {
                    true
                }
            });
        }
        // Settle callbacks may start new tweens; the list borrow is
        // released before they run.
        for settle in finished {
            settle(true);
        }
    }
}

fn lerp_rect(a: &Rect, b: &Rect, t: f32) -> Rect {
    Rect::new(
        a.x + (b.x - a.x) * t,
        a.y + (b.y - a.y) * t,
        a.width + (b.width - a.width) * t,
        a.height + (b.height - a.height) * t,
    )
}

struct MorphShared {
    entity: GlyphId,
    target: Rect,
    status: Cell<MorphStatus>,
    waiters: RefCell<Vec<Box<dyn FnOnce(MorphStatus)>>>,
}

/// Observer handle for one morph transaction. Clones observe the same
/// transaction.
#[derive(Clone)]
pub struct MorphHandle {
    shared: Rc<MorphShared>,
}

impl MorphHandle {
    fn new(entity: GlyphId, target: Rect) -> Self {
        Self {
            shared: Rc::new(MorphShared {
                entity,
                target,
                status: Cell::new(MorphStatus::Running),
                waiters: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn entity(&self) -> &GlyphId {
        &self.shared.entity
    }

    /// The rect the morph is heading to.
    pub fn target(&self) -> Rect {
        self.shared.target
    }

    pub fn status(&self) -> MorphStatus {
        self.shared.status.get()
    }

    pub fn is_settled(&self) -> bool {
        self.status() != MorphStatus::Running
    }

    /// Run `callback` when the morph settles. Fires immediately if it
    /// already has.
    pub fn on_settled(&self, callback: Box<dyn FnOnce(MorphStatus)>) {
        let status = self.status();
        if status != MorphStatus::Running {
            callback(status);
            return;
        }
        self.shared.waiters.borrow_mut().push(callback);
    }

    fn settle(&self, status: MorphStatus) {
        if self.is_settled() {
            return;
        }
        self.shared.status.set(status);
        let waiters: Vec<_> = self.shared.waiters.borrow_mut().drain(..).collect();
        for waiter in waiters {
            waiter(status);
        }
    }
}

struct ActiveMorph {
    handle: MorphHandle,
    control: Box<dyn TweenControl>,
}

/// Runs morph transactions with per-glyph exclusivity.
pub struct MorphEngine {
    driver: Rc<dyn TweenDriver>,
    active: Rc<RefCell<HashMap<GlyphId, ActiveMorph>>>,
}

impl MorphEngine {
    pub fn new(driver: Rc<dyn TweenDriver>) -> Self {
        Self {
            driver,
            active: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Begin a morph on a glyph.
    ///
    /// If the glyph already has a morph in flight it is preempted: the
    /// prior transaction settles as [`MorphStatus::RolledBack`], and its
    /// observers run, before the new tween starts.
    pub fn begin(&self, entity: &GlyphRef, spec: MorphSpec) -> MorphHandle {
        let (id, start) = {
            let glyph = entity.borrow();
            (glyph.id().clone(), glyph.rect)
        };
        let preempted = self.active.borrow_mut().remove(&id);
        if let Some(prior) = preempted {
            debug!(entity = %id, "preempting active morph");
            prior.control.cancel(false);
            prior.handle.settle(MorphStatus::RolledBack);
        }

        let handle = MorphHandle::new(id.clone(), spec.end);
        let request = TweenRequest {
            entity: id.clone(),
            start,
            end: spec.end,
            duration: spec.duration,
        };
        let settle_handle = handle.clone();
        let settle_map = self.active.clone();
        let settle_id = id.clone();
        let control = self.driver.start(
            request,
            Box::new(move |completed| {
                settle_map.borrow_mut().remove(&settle_id);
                settle_handle.settle(if completed {
                    MorphStatus::Committed
                } else {
                    MorphStatus::RolledBack
                });
            }),
        );
        // An instant driver settles inside start(); only track tweens
        // still running.
        if !handle.is_settled() {
            self.active.borrow_mut().insert(
                id,
                ActiveMorph {
                    handle: handle.clone(),
                    control,
                },
            );
        }
        handle
    }

    /// Cancel a glyph's active morph, if any. Returns whether one was
    /// cancelled. `commit` decides how it settles.
    pub fn cancel(&self, entity: &GlyphId, commit: bool) -> bool {
        let removed = self.active.borrow_mut().remove(entity);
        match removed {
            Some(active) => {
                active.control.cancel(commit);
                active.handle.settle(if commit {
                    MorphStatus::Committed
                } else {
                    MorphStatus::RolledBack
                });
                true
            }
            None => false,
        }
    }

    /// Handle of the morph currently running on a glyph.
    pub fn handle(&self, entity: &GlyphId) -> Option<MorphHandle> {
        self.active.borrow().get(entity).map(|a| a.handle.clone())
    }

    pub fn is_morphing(&self, entity: &GlyphId) -> bool {
        self.active.borrow().contains_key(entity)
    }

    pub fn active_count(&self) -> usize {
        self.active.borrow().len()
    }

    /// Advance the underlying driver.
    pub fn tick(&self, dt: Duration) {
        self.driver.tick(dt);
    }
}
