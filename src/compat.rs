//! Join directions and the type compatibility matrix.
//!
//! The matrix answers one question: may a glyph of kind X initiate a join
//! toward a glyph of kind Y, and in which directions? It is configuration
//! consumed by the proximity detector, evaluated through capability queries
//! rather than scattered tag checks.

use crate::geometry::Axis;
use crate::glyph::GlyphKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Direction of a join edge, from the initiator's point of view.
///
/// Direction encodes both the layout axis and the relative order of the two
/// endpoints: `right` puts the target to the initiator's right in a row,
/// `bottom` puts it below in a column, `top` puts it above (so the target
/// comes first in column flow order).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Right,
    Bottom,
    Top,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::Right, Direction::Bottom, Direction::Top];

    /// Layout axis this direction joins along.
    pub fn axis(self) -> Axis {
        match self {
            Direction::Right => Axis::Row,
            Direction::Bottom | Direction::Top => Axis::Column,
        }
    }

    /// Whether the initiator precedes the target in flow order.
    ///
    /// True for `right` and `bottom`; false for `top`, where the initiator
    /// docks beneath the target.
    pub fn initiator_first(self) -> bool {
        !matches!(self, Direction::Top)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Right => "right",
            Direction::Bottom => "bottom",
            Direction::Top => "top",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration table mapping (initiator kind, target kind) to the join
/// directions that pair supports.
///
/// [`CompatibilityMatrix::default`] ships a ready-to-use table over the named
/// [`GlyphKind`] constants; [`allow`](Self::allow) registers additional pairs
/// for application-defined kinds. Registration order is preserved per pair,
/// which keeps detector scans deterministic.
#[derive(Clone, Debug)]
pub struct CompatibilityMatrix {
    allowed: HashMap<(GlyphKind, GlyphKind), Vec<Direction>>,
}

impl Default for CompatibilityMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl CompatibilityMatrix {
    /// An empty matrix permitting nothing.
    pub fn empty() -> Self {
        Self {
            allowed: HashMap::new(),
        }
    }

    /// The built-in table.
    ///
    /// Row joins carry data flow: query glyphs feed scripts and prompts,
    /// semantic glyphs chain into semantics, scripts, and prompts, and the
    /// executable kinds (script, prompt) join each other freely. Column
    /// joins stack executable kinds and semantic chains. Note glyphs are
    /// inert and appear nowhere.
    pub fn new() -> Self {
        use GlyphKind as K;
        let mut m = Self::empty();

        // Horizontal data flow
        m.allow(K::QUERY, K::SCRIPT, Direction::Right);
        m.allow(K::QUERY, K::PROMPT, Direction::Right);
        m.allow(K::SEMANTIC, K::SEMANTIC, Direction::Right);
        m.allow(K::SEMANTIC, K::SCRIPT, Direction::Right);
        m.allow(K::SEMANTIC, K::PROMPT, Direction::Right);
        for initiator in [K::SCRIPT, K::PROMPT] {
            for target in [K::SCRIPT, K::PROMPT] {
                m.allow(initiator, target, Direction::Right);
            }
        }

        // Vertical stacking
        m.allow(K::SEMANTIC, K::SEMANTIC, Direction::Bottom);
        m.allow(K::SEMANTIC, K::SEMANTIC, Direction::Top);
        for initiator in [K::SCRIPT, K::PROMPT] {
            for target in [K::SCRIPT, K::PROMPT] {
                m.allow(initiator, target, Direction::Bottom);
                m.allow(initiator, target, Direction::Top);
            }
        }

        m
    }

    /// Register a direction for an (initiator, target) pair.
    ///
    /// Duplicate registrations are absorbed.
    pub fn allow(&mut self, initiator: GlyphKind, target: GlyphKind, direction: Direction) {
        let entry = self.allowed.entry((initiator, target)).or_default();
        if !entry.contains(&direction) {
            entry.push(direction);
        }
    }

    /// Directions in which `initiator` may join toward `target`.
    ///
    /// Empty when the pair is not registered.
    pub fn allowed(&self, initiator: GlyphKind, target: GlyphKind) -> &[Direction] {
        self.allowed
            .get(&(initiator, target))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether a specific (initiator, target, direction) triple is permitted.
    pub fn permits(&self, initiator: GlyphKind, target: GlyphKind, direction: Direction) -> bool {
        self.allowed(initiator, target).contains(&direction)
    }

    /// Whether glyphs of this kind can start a join toward anything.
    pub fn can_initiate(&self, kind: GlyphKind) -> bool {
        self.allowed
            .iter()
            .any(|((initiator, _), dirs)| *initiator == kind && !dirs.is_empty())
    }

    /// Whether glyphs of this kind can be the target of any join.
    pub fn can_receive(&self, kind: GlyphKind) -> bool {
        self.allowed
            .iter()
            .any(|((_, target), dirs)| *target == kind && !dirs.is_empty())
    }
}
