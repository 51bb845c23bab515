//! Composite containers: edges, member trees, and flow layout.
//!
//! A composite owns its members by strong reference and arranges them in a
//! shallow tree: a root group flowing along the composite's primary axis,
//! with cross-axis branches wrapped in perpendicular sub-groups. The ordered
//! edge list records how the tree was built and is what gets persisted;
//! replaying it reproduces the tree deterministically.

use crate::compat::Direction;
use crate::geometry::{Axis, Rect};
use crate::glyph::{GlyphId, GlyphRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Identifier of a composition, derived from two endpoint glyph ids.
///
/// The id changes as the structure changes: every meld, extend, and merge
/// re-derives it from the endpoints of the most recent structural edge.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositionId(String);

impl CompositionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the id for a composition whose newest edge joins `from` → `to`.
    pub fn derive(from: &GlyphId, to: &GlyphId) -> Self {
        Self(format!("meld-{}-{}", from, to))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CompositionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A directed join between two glyphs.
///
/// `position` is the insertion index within the composition's edge list;
/// persisted lists are replayed in position order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: GlyphId,
    pub to: GlyphId,
    pub direction: Direction,
    pub position: u32,
}

impl Edge {
    pub fn new(
        from: impl Into<GlyphId>,
        to: impl Into<GlyphId>,
        direction: Direction,
        position: u32,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            direction,
            position,
        }
    }

    /// The two endpoints in flow order: for `right` and `bottom` the
    /// initiator comes first, for `top` the target does.
    pub fn flow_order(&self) -> (&GlyphId, &GlyphId) {
        if self.direction.initiator_first() {
            (&self.from, &self.to)
        } else {
            (&self.to, &self.from)
        }
    }
}

/// One slot in a member group: either a glyph or a nested sub-group.
#[derive(Clone)]
pub enum MemberSlot {
    Glyph(GlyphRef),
    Group(MemberGroup),
}

impl MemberSlot {
    fn contains(&self, id: &GlyphId) -> bool {
        match self {
            MemberSlot::Glyph(g) => g.borrow().id() == id,
            MemberSlot::Group(group) => group.contains(id),
        }
    }
}

/// An ordered run of members flowing along one axis.
#[derive(Clone)]
pub struct MemberGroup {
    pub axis: Axis,
    slots: Vec<MemberSlot>,
}

impl MemberGroup {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            slots: Vec::new(),
        }
    }

    pub fn slots(&self) -> &[MemberSlot] {
        &self.slots
    }

    pub fn contains(&self, id: &GlyphId) -> bool {
        self.slots.iter().any(|slot| slot.contains(id))
    }

    /// Member glyphs in flow order (depth-first through sub-groups).
    pub fn glyphs(&self) -> Vec<GlyphRef> {
        let mut out = Vec::new();
        self.collect_glyphs(&mut out);
        out
    }

    fn collect_glyphs(&self, out: &mut Vec<GlyphRef>) {
        for slot in &self.slots {
            match slot {
                MemberSlot::Glyph(g) => out.push(g.clone()),
                MemberSlot::Group(group) => group.collect_glyphs(out),
            }
        }
    }

    fn push(&mut self, slot: MemberSlot) {
        self.slots.push(slot);
    }

    fn insert_front(&mut self, slot: MemberSlot) {
        self.slots.insert(0, slot);
    }

    /// Lay the group out with its top-left at (x, y), writing member rects.
    /// Returns the group's total size.
    fn layout(&self, x: f32, y: f32) -> (f32, f32) {
        let mut main = 0.0f32;
        let mut cross = 0.0f32;
        for slot in &self.slots {
            let (ox, oy) = match self.axis {
                Axis::Row => (x + main, y),
                Axis::Column => (x, y + main),
            };
            let (w, h) = match slot {
                MemberSlot::Glyph(g) => {
                    let mut glyph = g.borrow_mut();
                    glyph.rect = glyph.rect.at(ox, oy);
                    (glyph.rect.width, glyph.rect.height)
                }
                MemberSlot::Group(group) => group.layout(ox, oy),
            };
            match self.axis {
                Axis::Row => {
                    main += w;
                    cross = cross.max(h);
                }
                Axis::Column => {
                    main += h;
                    cross = cross.max(w);
                }
            }
        }
        match self.axis {
            Axis::Row => (main, cross),
            Axis::Column => (cross, main),
        }
    }
}

/// A melded arrangement of glyphs sharing one container and one persisted
/// record.
///
/// Members keep their identity across every structural operation: the
/// composite holds the same [`GlyphRef`] instances the canvas does, and
/// reparenting never clones or recreates a glyph.
#[derive(Clone)]
pub struct Composite {
    id: CompositionId,
    edges: Vec<Edge>,
    anchor: (f32, f32),
    root: MemberGroup,
}

impl Composite {
    pub(crate) fn new(id: CompositionId, axis: Axis, anchor: (f32, f32)) -> Self {
        Self {
            id,
            edges: Vec::new(),
            anchor,
            root: MemberGroup::new(axis),
        }
    }

    pub fn id(&self) -> &CompositionId {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: CompositionId) {
        self.id = id;
    }

    /// The ordered edge list, positions matching list indices.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// World position of the container's top-left corner.
    pub fn anchor(&self) -> (f32, f32) {
        self.anchor
    }

    pub(crate) fn set_anchor(&mut self, x: f32, y: f32) {
        self.anchor = (x, y);
    }

    /// The primary layout axis.
    pub fn axis(&self) -> Axis {
        self.root.axis
    }

    pub fn root_group(&self) -> &MemberGroup {
        &self.root
    }

    /// Member glyphs in flow order.
    pub fn members(&self) -> Vec<GlyphRef> {
        self.root.glyphs()
    }

    pub fn member_count(&self) -> usize {
        self.members().len()
    }

    pub fn contains(&self, id: &GlyphId) -> bool {
        self.root.contains(id)
    }

    /// Look up a member by id.
    pub fn member(&self, id: &GlyphId) -> Option<GlyphRef> {
        self.members()
            .into_iter()
            .find(|g| g.borrow().id() == id)
    }

    /// Append an edge, assigning the next position index.
    pub(crate) fn push_edge(&mut self, from: GlyphId, to: GlyphId, direction: Direction) {
        let position = self.edges.len() as u32;
        self.edges.push(Edge::new(from, to, direction, position));
    }

    pub(crate) fn replace_edges(&mut self, edges: Vec<Edge>) {
        self.edges = edges;
        for (i, edge) in self.edges.iter_mut().enumerate() {
            edge.position = i as u32;
        }
    }

    /// Place the first two members of a fresh composite.
    pub(crate) fn seed_pair(&mut self, first: GlyphRef, second: GlyphRef, axis: Axis) {
        debug_assert!(self.root.slots.is_empty());
        if axis == self.root.axis {
            self.root.push(MemberSlot::Glyph(first));
            self.root.push(MemberSlot::Glyph(second));
        } else {
            let mut group = MemberGroup::new(axis);
            group.push(MemberSlot::Glyph(first));
            group.push(MemberSlot::Glyph(second));
            self.root.push(MemberSlot::Group(group));
        }
    }

    /// Insert a member in-line at the start or end of the primary flow.
    pub(crate) fn insert_inline(&mut self, glyph: GlyphRef, end: bool) {
        if end {
            self.root.push(MemberSlot::Glyph(glyph));
        } else {
            self.root.insert_front(MemberSlot::Glyph(glyph));
        }
    }

    /// Attach a member on the cross axis at the named anchor.
    ///
    /// If the anchor is a direct child of the root it is wrapped in a new
    /// perpendicular sub-group first; if it already lives in a sub-group the
    /// new member joins that group (idempotent grouping, no nesting).
    /// Returns false if the anchor is not a member.
    pub(crate) fn attach_cross_axis(&mut self, anchor: &GlyphId, glyph: GlyphRef, end: bool) -> bool {
        let cross = self.root.axis.perpendicular();
        for slot in self.root.slots.iter_mut() {
            match slot {
                MemberSlot::Glyph(existing) if existing.borrow().id() == anchor => {
                    let mut group = MemberGroup::new(cross);
                    group.push(MemberSlot::Glyph(existing.clone()));
                    if end {
                        group.push(MemberSlot::Glyph(glyph));
                    } else {
                        group.insert_front(MemberSlot::Glyph(glyph));
                    }
                    *slot = MemberSlot::Group(group);
                    return true;
                }
                MemberSlot::Group(group) if group.contains(anchor) => {
                    if end {
                        group.push(MemberSlot::Glyph(glyph));
                    } else {
                        group.insert_front(MemberSlot::Glyph(glyph));
                    }
                    return true;
                }
                _ => {}
            }
        }
        false
    }

    /// Take all member slots out, leaving the composite empty.
    pub(crate) fn take_members(&mut self) -> Vec<GlyphRef> {
        let members = self.root.glyphs();
        self.root.slots.clear();
        members
    }

    /// Flow the members from the anchor, writing their world rects.
    ///
    /// Members keep their sizes; only positions are flow-managed. Returns
    /// the composite's bounds.
    pub fn relayout(&self) -> Rect {
        let (w, h) = self.root.layout(self.anchor.0, self.anchor.1);
        Rect::new(self.anchor.0, self.anchor.1, w, h)
    }

    /// Bounds of the laid-out composite: the union of its member rects.
    ///
    /// Reads current member geometry without re-placing anything; every
    /// structural operation reflows before this is consulted.
    pub fn bounds(&self) -> Rect {
        let mut members = self.members().into_iter();
        let first = match members.next() {
            Some(g) => g.borrow().rect,
            None => return Rect::new(self.anchor.0, self.anchor.1, 0.0, 0.0),
        };
        members.fold(first, |acc, g| acc.union(&g.borrow().rect))
    }

    /// Whether two composites are the same container instance is tracked by
    /// id here; glyph identity is what the engine guards with `Rc::ptr_eq`.
    pub fn same_member(a: &GlyphRef, b: &GlyphRef) -> bool {
        Rc::ptr_eq(a, b)
    }
}
