//! Proximity detection for meldable glyph pairs.
//!
//! While a drag is in flight the detector scans the placed glyphs for the
//! nearest compatible join. Both orientations are probed: the moving glyph
//! initiating toward a stationary one, and a stationary glyph claiming the
//! moving one as its target (a `reversed` match). When the moving glyph is
//! already melded, every member of its composition scans as a moving rect
//! and the composition's own members never count as candidates.
//!
//! Matches carry a feedback tier derived from distance so hosts can stage
//! their affordances: `Distant` within the probe radius, `Approaching`
//! past the midpoint, `Ready` inside meld range.

use crate::builder::CompositionManager;
use crate::compat::{CompatibilityMatrix, Direction};
use crate::geometry::Rect;
use crate::glyph::{GlyphId, GlyphRef};
use std::rc::Rc;

/// Distance and alignment thresholds for the detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProximityConfig {
    /// Matches closer than this commit on drop.
    pub meld_threshold: f32,
    /// Matches beyond this are ignored entirely.
    pub proximity_threshold: f32,
    /// Minimum cross-axis overlap fraction for a pair to count as aligned.
    pub min_alignment: f32,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            meld_threshold: 30.0,
            proximity_threshold: 120.0,
            min_alignment: 0.3,
        }
    }
}

impl ProximityConfig {
    /// Boundary between `Approaching` and `Distant`.
    pub fn midpoint(&self) -> f32 {
        (self.meld_threshold + self.proximity_threshold) / 2.0
    }

    /// Tier for a distance already inside the probe radius.
    pub fn tier(&self, distance: f32) -> FeedbackTier {
        if distance < self.meld_threshold {
            FeedbackTier::Ready
        } else if distance < self.midpoint() {
            FeedbackTier::Approaching
        } else {
            FeedbackTier::Distant
        }
    }
}

/// Visual-affordance stage of a candidate match, ordered by urgency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeedbackTier {
    Distant,
    Approaching,
    Ready,
}

/// The nearest compatible join found by a probe.
#[derive(Clone)]
pub struct MeldTarget {
    /// The glyph whose edge initiates the join.
    pub initiator: GlyphRef,
    /// The glyph being joined toward.
    pub target: GlyphRef,
    pub direction: Direction,
    /// Gap between the facing edges, in world units.
    pub distance: f32,
    /// True when the stationary glyph is the initiator, claiming the
    /// dragged glyph as its target.
    pub reversed: bool,
}

impl MeldTarget {
    pub fn tier(&self, config: &ProximityConfig) -> FeedbackTier {
        config.tier(self.distance)
    }

    /// Whether dropping now would commit the join.
    pub fn within_meld_range(&self, config: &ProximityConfig) -> bool {
        self.distance < config.meld_threshold
    }

    /// The glyph being dragged.
    pub fn moving(&self) -> &GlyphRef {
        if self.reversed {
            &self.target
        } else {
            &self.initiator
        }
    }

    /// The stationary glyph, the one hosts highlight.
    pub fn stationary(&self) -> &GlyphRef {
        if self.reversed {
            &self.initiator
        } else {
            &self.target
        }
    }
}

/// Scans placed glyphs for the nearest compatible join to a moving one.
pub struct ProximityDetector {
    config: ProximityConfig,
    matrix: Rc<CompatibilityMatrix>,
}

impl ProximityDetector {
    pub fn new(matrix: Rc<CompatibilityMatrix>) -> Self {
        Self::with_config(matrix, ProximityConfig::default())
    }

    pub fn with_config(matrix: Rc<CompatibilityMatrix>, config: ProximityConfig) -> Self {
        Self { config, matrix }
    }

    pub fn config(&self) -> &ProximityConfig {
        &self.config
    }

    /// Find the closest compatible join for `moving` among `placed`.
    ///
    /// Candidates in `moving`'s own composition are skipped; if `moving` is
    /// melded, all of its fellow members probe as moving rects. The single
    /// globally closest eligible match wins, with ties going to the
    /// earliest candidate in `placed` order.
    pub fn find_target(
        &self,
        moving: &GlyphRef,
        placed: &[GlyphRef],
        compositions: &CompositionManager,
    ) -> Option<MeldTarget> {
        let moving_set: Vec<GlyphRef> = match compositions.composition_of(moving) {
            Some(composite) => composite.members(),
            None => vec![moving.clone()],
        };
        let moving_tag = moving.borrow().composition().cloned();

        let mut best: Option<MeldTarget> = None;
        for candidate in placed {
            if moving_set.iter().any(|m| Rc::ptr_eq(m, candidate)) {
                continue;
            }
            {
                let cand = candidate.borrow();
                if moving_tag.is_some() && cand.composition() == moving_tag.as_ref() {
                    continue;
                }
            }
            for mover in &moving_set {
                let (mover_kind, mover_rect) = {
                    let g = mover.borrow();
                    (g.kind, g.rect)
                };
                let (cand_kind, cand_rect) = {
                    let g = candidate.borrow();
                    (g.kind, g.rect)
                };

                for &direction in self.matrix.allowed(mover_kind, cand_kind) {
                    if let Some(distance) = self.probe(&mover_rect, &cand_rect, direction) {
                        consider(
                            &mut best,
                            MeldTarget {
                                initiator: mover.clone(),
                                target: candidate.clone(),
                                direction,
                                distance,
                                reversed: false,
                            },
                        );
                    }
                }
                for &direction in self.matrix.allowed(cand_kind, mover_kind) {
                    if let Some(distance) = self.probe(&cand_rect, &mover_rect, direction) {
                        consider(
                            &mut best,
                            MeldTarget {
                                initiator: candidate.clone(),
                                target: mover.clone(),
                                direction,
                                distance,
                                reversed: true,
                            },
                        );
                    }
                }
            }
        }
        best
    }

    /// Gap between initiator and target along `direction`, if the pair is
    /// on the right side of each other, in range, and aligned.
    fn probe(&self, initiator: &Rect, target: &Rect, direction: Direction) -> Option<f32> {
        let gap = match direction {
            Direction::Right => target.x - initiator.right(),
            Direction::Bottom => target.y - initiator.bottom(),
            Direction::Top => initiator.y - target.bottom(),
        };
        if gap < 0.0 || gap > self.config.proximity_threshold {
            return None;
        }
        let alignment = initiator.alignment_fraction(target, direction.axis().perpendicular());
        (alignment >= self.config.min_alignment).then_some(gap)
    }
}

fn consider(best: &mut Option<MeldTarget>, candidate: MeldTarget) {
    let closer = match best {
        Some(current) => candidate.distance < current.distance,
        None => true,
    };
    if closer {
        *best = Some(candidate);
    }
}

/// Identity of a match for change detection: which pair, which way, and
/// how urgent. Distance is deliberately absent so jitter within a tier
/// does not refire hooks.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedbackState {
    pub initiator: GlyphId,
    pub target: GlyphId,
    pub direction: Direction,
    pub tier: FeedbackTier,
    pub reversed: bool,
}

impl FeedbackState {
    pub fn of(target: &MeldTarget, config: &ProximityConfig) -> Self {
        Self {
            initiator: target.initiator.borrow().id().clone(),
            target: target.target.borrow().id().clone(),
            direction: target.direction,
            tier: target.tier(config),
            reversed: target.reversed,
        }
    }
}

/// Callback fired when the highlighted match changes.
pub type FeedbackHook = Box<dyn Fn(Option<&FeedbackState>)>;

/// Tracks the match currently shown to the user and fires a hook only on
/// change, so per-frame probing stays quiet while nothing moves between
/// tiers.
#[derive(Default)]
pub struct ProximityFeedback {
    current: Option<FeedbackState>,
    hook: Option<FeedbackHook>,
}

impl ProximityFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_hook(&mut self, hook: FeedbackHook) {
        self.hook = Some(hook);
    }

    pub fn current(&self) -> Option<&FeedbackState> {
        self.current.as_ref()
    }

    /// Adopt a new probe result, firing the hook if it differs from the
    /// current one.
    pub fn update(&mut self, state: Option<FeedbackState>) {
        if state == self.current {
            return;
        }
        self.current = state;
        if let Some(hook) = &self.hook {
            hook(self.current.as_ref());
        }
    }

    /// Drop any active highlight, firing the hook if one was showing.
    pub fn clear(&mut self) {
        self.update(None);
    }
}
