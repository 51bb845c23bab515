//! Structural operations on compositions.
//!
//! [`CompositionManager`] owns every live [`Composite`] and is the only
//! place composition structure changes: melding two standalone glyphs,
//! extending a composition with one more, merging two compositions across
//! a bridge edge, disassembling one back to standalone glyphs, and
//! rebuilding one from its persisted record. Each mutation keeps three
//! things in step in the same call: the live member tree, the members'
//! back-tags, and the persisted record in the [`CompositionStore`].
//!
//! Composition ids are derived from the endpoints of the newest structural
//! edge, so they churn as structure changes: the manager removes the old
//! record and writes the new one as part of the operation.

use crate::compat::{CompatibilityMatrix, Direction};
use crate::composition::{Composite, CompositionId, Edge};
use crate::geometry::Axis;
use crate::glyph::{GlyphId, GlyphRef};
use crate::registry::GlyphRegistry;
use crate::store::{CompositionStore, StoreError, StoredComposition};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

/// Spacing slotted between members when a composition is disassembled,
/// so released glyphs land side by side instead of stacked flush.
pub const UNMELD_GAP: f32 = 24.0;

/// Why a structural operation was rejected. The canvas stays unchanged
/// when any of these come back.
#[derive(Debug, Error)]
pub enum MeldError {
    #[error("glyph {0} is already part of composition {1}")]
    AlreadyMelded(GlyphId, CompositionId),
    #[error("glyphs {from} and {to} cannot join {direction}")]
    Incompatible {
        from: GlyphId,
        to: GlyphId,
        direction: Direction,
    },
    #[error("cannot meld a glyph with itself")]
    SelfMeld,
    #[error("unknown composition: {0}")]
    UnknownComposition(CompositionId),
    #[error("glyph {0} is not a member of composition {1}")]
    UnknownAnchor(GlyphId, CompositionId),
    #[error("cannot merge a composition with itself")]
    MergeSelf,
    #[error("edge references unknown glyph {0}")]
    MissingMember(GlyphId),
    #[error("composition record {0} has no edges")]
    CorruptRecord(CompositionId),
    #[error("edge {from} -> {to} does not connect to the rest of the tree")]
    DisconnectedEdge { from: GlyphId, to: GlyphId },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of [`CompositionManager::restore`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub dropped: usize,
}

/// Owner of live compositions and executor of structural operations.
pub struct CompositionManager {
    compositions: IndexMap<CompositionId, Composite>,
    matrix: Rc<CompatibilityMatrix>,
    store: Rc<RefCell<dyn CompositionStore>>,
}

impl CompositionManager {
    pub fn new(
        matrix: Rc<CompatibilityMatrix>,
        store: Rc<RefCell<dyn CompositionStore>>,
    ) -> Self {
        Self {
            compositions: IndexMap::new(),
            matrix,
            store,
        }
    }

    pub fn get(&self, id: &CompositionId) -> Option<&Composite> {
        self.compositions.get(id)
    }

    /// The composition a glyph currently belongs to, resolved through its
    /// back-tag.
    pub fn composition_of(&self, glyph: &GlyphRef) -> Option<&Composite> {
        let tag = glyph.borrow().composition().cloned()?;
        self.compositions.get(&tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Composite> {
        self.compositions.values()
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&mut self, composite: Composite) {
        self.compositions
            .insert(composite.id().clone(), composite);
    }

    pub fn len(&self) -> usize {
        self.compositions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compositions.is_empty()
    }

    /// Meld two standalone glyphs into a fresh composition.
    ///
    /// The container anchors at the flow-first glyph's current position
    /// and both members give up absolute placement for flow layout. The
    /// recorded edge runs initiator → target with the matched direction.
    pub fn meld(
        &mut self,
        initiator: GlyphRef,
        target: GlyphRef,
        direction: Direction,
    ) -> Result<CompositionId, MeldError> {
        if Rc::ptr_eq(&initiator, &target) {
            return Err(MeldError::SelfMeld);
        }
        let from_id = initiator.borrow().id().clone();
        let to_id = target.borrow().id().clone();
        if let Some(tag) = initiator.borrow().composition().cloned() {
            return Err(MeldError::AlreadyMelded(from_id, tag));
        }
        if let Some(tag) = target.borrow().composition().cloned() {
            return Err(MeldError::AlreadyMelded(to_id, tag));
        }
        let from_kind = initiator.borrow().kind;
        let to_kind = target.borrow().kind;
        if !self.matrix.permits(from_kind, to_kind, direction) {
            return Err(MeldError::Incompatible {
                from: from_id,
                to: to_id,
                direction,
            });
        }

        let (first, second) = if direction.initiator_first() {
            (initiator.clone(), target.clone())
        } else {
            (target.clone(), initiator.clone())
        };
        let anchor = first.borrow().rect.origin();
        let id = CompositionId::derive(&from_id, &to_id);
        debug_assert!(!self.compositions.contains_key(&id));

        let mut composite = Composite::new(id.clone(), direction.axis(), anchor);
        composite.seed_pair(first, second, direction.axis());
        composite.push_edge(from_id.clone(), to_id.clone(), direction);
        initiator.borrow_mut().set_composition(Some(id.clone()));
        target.borrow_mut().set_composition(Some(id.clone()));
        composite.relayout();

        self.store
            .borrow_mut()
            .put_composition(record_of(&composite))?;
        self.compositions.insert(id.clone(), composite);

        debug!(%id, from = %from_id, to = %to_id, %direction, "melded glyphs");
        Ok(id)
    }

    /// Add a standalone glyph to an existing composition at the named
    /// anchor member.
    ///
    /// An edge on the composition's primary axis goes in-line at the start
    /// or end of the flow (`end`); a cross-axis edge wraps the anchor in a
    /// perpendicular sub-group, or joins the anchor's existing sub-group.
    /// The composition takes a new id derived from the new edge, and the
    /// persisted record moves with it.
    pub fn extend(
        &mut self,
        composition: &CompositionId,
        new_member: GlyphRef,
        anchor: &GlyphId,
        direction: Direction,
        end: bool,
    ) -> Result<CompositionId, MeldError> {
        let new_id = new_member.borrow().id().clone();
        if let Some(tag) = new_member.borrow().composition().cloned() {
            return Err(MeldError::AlreadyMelded(new_id, tag));
        }
        {
            let composite = self
                .compositions
                .get(composition)
                .ok_or_else(|| MeldError::UnknownComposition(composition.clone()))?;
            if !composite.contains(anchor) {
                return Err(MeldError::UnknownAnchor(anchor.clone(), composition.clone()));
            }
        }

        // The new member sits at the flow end when `end` is set; the edge
        // initiator is whichever endpoint the direction puts first in flow
        // (last for `top`).
        let (from_id, to_id) = if direction.initiator_first() == end {
            (anchor.clone(), new_id.clone())
        } else {
            (new_id.clone(), anchor.clone())
        };
        let anchor_ref = self
            .compositions
            .get(composition)
            .and_then(|c| c.member(anchor))
            .ok_or_else(|| MeldError::UnknownAnchor(anchor.clone(), composition.clone()))?;
        let (from_kind, to_kind) = if from_id == new_id {
            (new_member.borrow().kind, anchor_ref.borrow().kind)
        } else {
            (anchor_ref.borrow().kind, new_member.borrow().kind)
        };
        if !self.matrix.permits(from_kind, to_kind, direction) {
            return Err(MeldError::Incompatible {
                from: from_id,
                to: to_id,
                direction,
            });
        }

        let mut composite = self
            .compositions
            .shift_remove(composition)
            .ok_or_else(|| MeldError::UnknownComposition(composition.clone()))?;
        if direction.axis() == composite.axis() {
            composite.insert_inline(new_member.clone(), end);
        } else {
            composite.attach_cross_axis(anchor, new_member.clone(), end);
        }
        composite.push_edge(from_id.clone(), to_id.clone(), direction);

        let renamed = CompositionId::derive(&from_id, &to_id);
        composite.set_id(renamed.clone());
        for member in composite.members() {
            member
                .borrow_mut()
                .set_composition(Some(renamed.clone()));
        }
        composite.relayout();

        self.store.borrow_mut().remove_composition(composition)?;
        self.store
            .borrow_mut()
            .put_composition(record_of(&composite))?;
        self.compositions.insert(renamed.clone(), composite);

        debug!(
            old = %composition,
            new = %renamed,
            member = %new_id,
            %direction,
            "extended composition"
        );
        Ok(renamed)
    }

    /// Merge two compositions across a bridge edge.
    ///
    /// Every member of `absorbed` is reparented into `survivor`'s tree by
    /// replaying the edge union (survivor's edges, then the bridge, then
    /// absorbed's edges) with positions renumbered. `absorbed` ceases to
    /// exist; its record is removed. The merged composition takes a new id
    /// derived from the bridge endpoints and keeps survivor's anchor.
    pub fn merge(
        &mut self,
        survivor: &CompositionId,
        absorbed: &CompositionId,
        bridge_from: &GlyphId,
        bridge_to: &GlyphId,
        direction: Direction,
    ) -> Result<CompositionId, MeldError> {
        if survivor == absorbed {
            return Err(MeldError::MergeSelf);
        }
        let (union, members, anchor) = {
            let surviving = self
                .compositions
                .get(survivor)
                .ok_or_else(|| MeldError::UnknownComposition(survivor.clone()))?;
            let absorbing = self
                .compositions
                .get(absorbed)
                .ok_or_else(|| MeldError::UnknownComposition(absorbed.clone()))?;
            let bridge_from_ref = surviving.member(bridge_from).ok_or_else(|| {
                MeldError::UnknownAnchor(bridge_from.clone(), survivor.clone())
            })?;
            let bridge_to_ref = absorbing
                .member(bridge_to)
                .ok_or_else(|| MeldError::UnknownAnchor(bridge_to.clone(), absorbed.clone()))?;
            let from_kind = bridge_from_ref.borrow().kind;
            let to_kind = bridge_to_ref.borrow().kind;
            if !self.matrix.permits(from_kind, to_kind, direction) {
                return Err(MeldError::Incompatible {
                    from: bridge_from.clone(),
                    to: bridge_to.clone(),
                    direction,
                });
            }

            let mut union: Vec<Edge> = surviving.edges().to_vec();
            union.push(Edge::new(
                bridge_from.clone(),
                bridge_to.clone(),
                direction,
                0,
            ));
            union.extend(absorbing.edges().iter().cloned());
            for (i, edge) in union.iter_mut().enumerate() {
                edge.position = i as u32;
            }

            let mut members = HashMap::new();
            for glyph in surviving.members().into_iter().chain(absorbing.members()) {
                members.insert(glyph.borrow().id().clone(), glyph.clone());
            }
            (union, members, surviving.anchor())
        };

        let merged_id = CompositionId::derive(bridge_from, bridge_to);
        let merged = build_tree(merged_id.clone(), anchor, &union, &members)?;

        self.compositions.shift_remove(survivor);
        self.compositions.shift_remove(absorbed);
        self.store.borrow_mut().remove_composition(survivor)?;
        self.store.borrow_mut().remove_composition(absorbed)?;

        for member in merged.members() {
            member
                .borrow_mut()
                .set_composition(Some(merged_id.clone()));
        }
        merged.relayout();
        self.store
            .borrow_mut()
            .put_composition(record_of(&merged))?;
        self.compositions.insert(merged_id.clone(), merged);

        debug!(
            %survivor,
            %absorbed,
            merged = %merged_id,
            bridge_from = %bridge_from,
            bridge_to = %bridge_to,
            "merged compositions"
        );
        Ok(merged_id)
    }

    /// Disassemble a composition back to standalone glyphs.
    ///
    /// Members come back in flow order and are laid out along the old
    /// primary axis from the container's anchor, [`UNMELD_GAP`] apart.
    /// Their back-tags are cleared and the persisted record is removed.
    pub fn unmeld(&mut self, composition: &CompositionId) -> Result<Vec<GlyphRef>, MeldError> {
        let mut composite = self
            .compositions
            .shift_remove(composition)
            .ok_or_else(|| MeldError::UnknownComposition(composition.clone()))?;
        self.store.borrow_mut().remove_composition(composition)?;

        let axis = composite.axis();
        let (ax, ay) = composite.anchor();
        let members = composite.take_members();
        let mut cursor = 0.0f32;
        for member in &members {
            let mut glyph = member.borrow_mut();
            glyph.rect = match axis {
                Axis::Row => glyph.rect.at(ax + cursor, ay),
                Axis::Column => glyph.rect.at(ax, ay + cursor),
            };
            cursor += glyph.rect.extent(axis) + UNMELD_GAP;
            glyph.set_composition(None);
        }

        debug!(id = %composition, members = members.len(), "unmelded composition");
        Ok(members)
    }

    /// Rebuild one composition from its persisted record.
    ///
    /// Edges are replayed in position order; the first edge seats both
    /// endpoints and every later edge attaches one new member, exactly as
    /// live building would. Member glyphs must already be registered and
    /// standalone.
    pub fn reconstruct(
        &mut self,
        record: &StoredComposition,
        registry: &GlyphRegistry,
    ) -> Result<CompositionId, MeldError> {
        if record.edges.is_empty() {
            return Err(MeldError::CorruptRecord(record.id.clone()));
        }
        let mut edges = record.edges.clone();
        edges.sort_by_key(|e| e.position);

        let mut members: HashMap<GlyphId, GlyphRef> = HashMap::new();
        for edge in &edges {
            for id in [&edge.from, &edge.to] {
                if members.contains_key(id) {
                    continue;
                }
                let glyph = registry
                    .get(id)
                    .ok_or_else(|| MeldError::MissingMember(id.clone()))?;
                if let Some(tag) = glyph.borrow().composition().cloned() {
                    return Err(MeldError::AlreadyMelded(id.clone(), tag));
                }
                members.insert(id.clone(), glyph);
            }
        }

        let composite = build_tree(record.id.clone(), (record.x, record.y), &edges, &members)?;
        for member in composite.members() {
            member
                .borrow_mut()
                .set_composition(Some(record.id.clone()));
        }
        composite.relayout();
        self.compositions.insert(record.id.clone(), composite);

        debug!(id = %record.id, edges = edges.len(), "reconstructed composition");
        Ok(record.id.clone())
    }

    /// Restore every composition record in the store.
    ///
    /// Records that cannot be rebuilt (no edges, members missing from the
    /// registry) are dropped from the store with a warning; one bad record
    /// never aborts the rest of the restore.
    pub fn restore(&mut self, registry: &GlyphRegistry) -> Result<RestoreReport, MeldError> {
        let records = self.store.borrow().compositions()?;
        let mut report = RestoreReport::default();
        for record in records {
            match self.reconstruct(&record, registry) {
                Ok(_) => report.restored += 1,
                Err(MeldError::Store(err)) => return Err(err.into()),
                Err(err) => {
                    warn!(id = %record.id, %err, "dropping unrestorable composition record");
                    self.store.borrow_mut().remove_composition(&record.id)?;
                    report.dropped += 1;
                }
            }
        }
        Ok(report)
    }

    /// Move a composition's container without touching the store. Drag
    /// frames go through here; [`relocate`](Self::relocate) persists the
    /// final position on drop.
    pub fn set_position(
        &mut self,
        composition: &CompositionId,
        x: f32,
        y: f32,
    ) -> Result<(), MeldError> {
        let composite = self
            .compositions
            .get_mut(composition)
            .ok_or_else(|| MeldError::UnknownComposition(composition.clone()))?;
        composite.set_anchor(x, y);
        composite.relayout();
        Ok(())
    }

    /// Move a composition's container, reflowing members and updating the
    /// persisted anchor.
    pub fn relocate(&mut self, composition: &CompositionId, x: f32, y: f32) -> Result<(), MeldError> {
        let composite = self
            .compositions
            .get_mut(composition)
            .ok_or_else(|| MeldError::UnknownComposition(composition.clone()))?;
        composite.set_anchor(x, y);
        composite.relayout();
        let record = record_of(composite);
        self.store.borrow_mut().put_composition(record)?;
        Ok(())
    }
}

fn record_of(composite: &Composite) -> StoredComposition {
    let (x, y) = composite.anchor();
    StoredComposition::new(composite.id().clone(), composite.edges().to_vec(), x, y)
}

/// Replay an edge list into a member tree.
///
/// The primary axis is `Row` if any edge runs `right`, otherwise `Column`.
/// The first edge seats both endpoints in flow order; each later edge
/// attaches its one new endpoint next to the one already in the tree,
/// in-line for primary-axis edges and into a perpendicular sub-group for
/// cross-axis edges. Edges whose endpoints are both already present are
/// skipped; an edge touching no present member is rejected.
fn build_tree(
    id: CompositionId,
    anchor: (f32, f32),
    edges: &[Edge],
    members: &HashMap<GlyphId, GlyphRef>,
) -> Result<Composite, MeldError> {
    let primary = if edges.iter().any(|e| e.direction == Direction::Right) {
        Axis::Row
    } else {
        Axis::Column
    };
    let mut composite = Composite::new(id, primary, anchor);

    for edge in edges {
        let resolve = |id: &GlyphId| -> Result<GlyphRef, MeldError> {
            members
                .get(id)
                .cloned()
                .ok_or_else(|| MeldError::MissingMember(id.clone()))
        };
        let (first_id, second_id) = edge.flow_order();
        let has_from = composite.contains(&edge.from);
        let has_to = composite.contains(&edge.to);
        match (has_from, has_to) {
            (false, false) if composite.member_count() == 0 => {
                composite.seed_pair(resolve(first_id)?, resolve(second_id)?, edge.direction.axis());
            }
            (false, false) => {
                return Err(MeldError::DisconnectedEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
            (true, true) => {}
            (has_from, _) => {
                let (anchor_id, joining_id) = if has_from {
                    (&edge.from, &edge.to)
                } else {
                    (&edge.to, &edge.from)
                };
                let joining = resolve(joining_id)?;
                let at_end = joining_id == second_id;
                if edge.direction.axis() == composite.axis() {
                    composite.insert_inline(joining, at_end);
                } else if !composite.attach_cross_axis(anchor_id, joining, at_end) {
                    return Err(MeldError::MissingMember(anchor_id.clone()));
                }
            }
        }
    }

    composite.replace_edges(edges.to_vec());
    Ok(composite)
}
