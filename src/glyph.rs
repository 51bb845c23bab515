//! Glyph identity and placement data.
//!
//! A glyph is the engine's view of one visual unit on the canvas: a stable
//! id, an opaque type tag, a world-space rect, and an optional back-pointer
//! to the composition it currently lives in. The engine shares glyphs as
//! [`GlyphRef`]s and compares them by identity (`Rc::ptr_eq`), never by
//! value: the same instance must survive every meld, unmeld, and morph.

use crate::composition::CompositionId;
use crate::geometry::Rect;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Stable, host-assigned glyph identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlyphId(String);

impl GlyphId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GlyphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GlyphId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for GlyphId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque glyph type tag.
///
/// The library never prescribes an encoding; applications choose their own
/// tag values and register them with the compatibility matrix. The named
/// constants below cover the default matrix and are ordinary values, not a
/// closed set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlyphKind(pub i32);

impl GlyphKind {
    /// Query glyphs (join/expand operators).
    pub const QUERY: GlyphKind = GlyphKind(1);
    /// Semantic glyphs (entailment operators).
    pub const SEMANTIC: GlyphKind = GlyphKind(2);
    /// Executable script glyphs.
    pub const SCRIPT: GlyphKind = GlyphKind(3);
    /// Prompt glyphs.
    pub const PROMPT: GlyphKind = GlyphKind(4);
    /// Inert annotation glyphs; not in the default matrix.
    pub const NOTE: GlyphKind = GlyphKind(5);
}

/// One visual unit on the canvas.
///
/// The id is immutable for the glyph's lifetime. While the glyph is a member
/// of a composition its `rect` is flow-managed (the composite layout pass
/// writes it); standalone glyphs own their rect absolutely.
#[derive(Clone, Debug)]
pub struct Glyph {
    id: GlyphId,
    pub kind: GlyphKind,
    pub rect: Rect,
    composition: Option<CompositionId>,
}

impl Glyph {
    /// Fallback extent for placements persisted without a size.
    pub const DEFAULT_WIDTH: f32 = 200.0;
    pub const DEFAULT_HEIGHT: f32 = 150.0;

    pub fn new(id: impl Into<GlyphId>, kind: GlyphKind, rect: Rect) -> Self {
        Self {
            id: id.into(),
            kind,
            rect,
            composition: None,
        }
    }

    pub fn id(&self) -> &GlyphId {
        &self.id
    }

    /// Id of the composition this glyph is melded into, if any.
    pub fn composition(&self) -> Option<&CompositionId> {
        self.composition.as_ref()
    }

    pub fn is_melded(&self) -> bool {
        self.composition.is_some()
    }

    pub(crate) fn set_composition(&mut self, composition: Option<CompositionId>) {
        self.composition = composition;
    }

    /// Wrap the glyph in the shared-reference form the engine works with.
    pub fn into_ref(self) -> GlyphRef {
        Rc::new(RefCell::new(self))
    }
}

/// Shared handle to a glyph. Identity comparisons use [`Rc::ptr_eq`].
pub type GlyphRef = Rc<RefCell<Glyph>>;
