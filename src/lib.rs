//! # Canvas Meld Library
//!
//! A spatial composition engine for canvas applications. Glyphs dragged
//! into proximity meld into flow-managed compositions that move, persist,
//! and disassemble as units.
//!
//! ## Features
//!
//! - **Kind-Aware Melding** - A compatibility matrix decides which glyph
//!   kinds may join, and along which edges
//! - **Proximity Detection** - Frame-throttled probing with graded hover
//!   feedback while a drag closes in on a target
//! - **Flow Compositions** - Members give up absolute placement for flush
//!   row and column layout inside a shared container
//! - **Morph Transactions** - Animated reshapes that commit or roll back
//!   as a unit, at most one in flight per glyph
//! - **Identity Registry** - One live instance per glyph id, enforced
//!   across every structural operation
//! - **Persistence** - Ordered edge-list records rebuild compositions
//!   member for member on restore
//!
//! ## Quick Start
//!
//! ```
//! use canvas_meld::{CanvasController, Direction, GlyphId, GlyphKind, MemoryStore, Rect};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let store = Rc::new(RefCell::new(MemoryStore::new()));
//! let ctrl = CanvasController::new(store);
//!
//! ctrl.create_glyph("query", GlyphKind::QUERY, Rect::new(100.0, 100.0, 200.0, 150.0));
//! ctrl.create_glyph("prompt", GlyphKind::PROMPT, Rect::new(330.0, 100.0, 200.0, 150.0));
//!
//! let id = ctrl
//!     .meld(&GlyphId::new("query"), &GlyphId::new("prompt"), Direction::Right)
//!     .unwrap();
//! assert_eq!(id.as_str(), "meld-query-prompt");
//! ```
//!
//! ## Core Components
//!
//! - [`CanvasController`] - Drag, drop, morph, and restore surface for hosts
//! - [`CompositionManager`] - Meld, extend, merge, unmeld, and record replay
//! - [`ProximityDetector`] - Closest-compatible-join search
//! - [`MorphEngine`] - Transactional geometry tweens
//! - [`GlyphRegistry`] - Identity-checked glyph instances
//! - [`MemoryStore`] - In-memory [`CompositionStore`]
//!
//! Hosts that only need the structural model can drive
//! [`CompositionManager`] and friends directly; [`CanvasController`] layers
//! the pointer protocol on top.

pub mod geometry;
pub mod glyph;
pub mod compat;
pub mod composition;
pub mod store;
pub mod registry;
pub mod proximity;
pub mod builder;
pub mod morph;
pub mod controller;

// Re-export the working set
pub use geometry::{Axis, Rect};
pub use glyph::{Glyph, GlyphId, GlyphKind, GlyphRef};
pub use compat::{CompatibilityMatrix, Direction};
pub use composition::{Composite, CompositionId, Edge, MemberGroup, MemberSlot};
pub use store::{CompositionStore, MemoryStore, StoreError, StoredComposition, StoredPlacement};
pub use registry::{GlyphRegistry, IdentityViolation, RebindHook};
pub use proximity::{
    FeedbackHook, FeedbackState, FeedbackTier, MeldTarget, ProximityConfig, ProximityDetector,
    ProximityFeedback,
};
pub use builder::{CompositionManager, MeldError, RestoreReport, UNMELD_GAP};
pub use morph::{
    FrameSink, FrameTweenDriver, InstantTweenDriver, MorphEngine, MorphHandle, MorphSpec,
    MorphStatus, TweenControl, TweenDriver, TweenRequest, DEFAULT_MORPH_DURATION,
};
pub use controller::CanvasController;
