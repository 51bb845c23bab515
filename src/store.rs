//! Persistence seam for composition and placement records.
//!
//! The engine never talks to disk or network itself. Hosts hand it a
//! [`CompositionStore`] and the structural operations keep it current:
//! every meld, extend, merge, and unmeld rewrites the affected records in
//! the same call that mutates the live tree. [`MemoryStore`] is the
//! reference backend and the one the test suites use.

use crate::composition::{CompositionId, Edge};
use crate::glyph::{GlyphId, GlyphKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("composition record not found: {0}")]
    MissingComposition(CompositionId),
    #[error("placement record not found: {0}")]
    MissingPlacement(GlyphId),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Persisted form of a composition: its id, ordered edge list, and the
/// world position of the container's top-left corner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredComposition {
    pub id: CompositionId,
    pub edges: Vec<Edge>,
    pub x: f32,
    pub y: f32,
}

impl StoredComposition {
    pub fn new(id: CompositionId, edges: Vec<Edge>, x: f32, y: f32) -> Self {
        Self { id, edges, x, y }
    }
}

/// Persisted form of a glyph placement. Width and height are optional;
/// hosts that size glyphs from content omit them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredPlacement {
    pub id: GlyphId,
    pub kind: GlyphKind,
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
}

/// Storage backend for canvas state.
///
/// Implementations decide where records live; the engine only requires
/// that a written record can be read back unchanged. All methods are
/// fallible so network- or file-backed stores can report real failures.
pub trait CompositionStore {
    /// All composition records, in backend order.
    fn compositions(&self) -> Result<Vec<StoredComposition>, StoreError>;

    /// Insert or overwrite one composition record.
    fn put_composition(&mut self, record: StoredComposition) -> Result<(), StoreError>;

    /// Remove one composition record.
    fn remove_composition(&mut self, id: &CompositionId) -> Result<(), StoreError>;

    /// All placement records, in backend order.
    fn placements(&self) -> Result<Vec<StoredPlacement>, StoreError>;

    /// Insert or overwrite one placement record.
    fn put_placement(&mut self, record: StoredPlacement) -> Result<(), StoreError>;

    /// Remove one placement record.
    fn remove_placement(&mut self, id: &GlyphId) -> Result<(), StoreError>;

    /// Replace every composition record at once.
    fn replace_compositions(&mut self, records: Vec<StoredComposition>) -> Result<(), StoreError>;

    /// Replace every placement record at once.
    fn replace_placements(&mut self, records: Vec<StoredPlacement>) -> Result<(), StoreError>;
}

/// In-memory store keyed by record id, iteration in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    compositions: IndexMap<CompositionId, StoredComposition>,
    placements: IndexMap<GlyphId, StoredPlacement>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn composition(&self, id: &CompositionId) -> Option<&StoredComposition> {
        self.compositions.get(id)
    }

    pub fn placement(&self, id: &GlyphId) -> Option<&StoredPlacement> {
        self.placements.get(id)
    }

    pub fn composition_count(&self) -> usize {
        self.compositions.len()
    }

    pub fn placement_count(&self) -> usize {
        self.placements.len()
    }
}

impl CompositionStore for MemoryStore {
    fn compositions(&self) -> Result<Vec<StoredComposition>, StoreError> {
        Ok(self.compositions.values().cloned().collect())
    }

    fn put_composition(&mut self, record: StoredComposition) -> Result<(), StoreError> {
        self.compositions.insert(record.id.clone(), record);
        Ok(())
    }

    fn remove_composition(&mut self, id: &CompositionId) -> Result<(), StoreError> {
        self.compositions
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::MissingComposition(id.clone()))
    }

    fn placements(&self) -> Result<Vec<StoredPlacement>, StoreError> {
        Ok(self.placements.values().cloned().collect())
    }

    fn put_placement(&mut self, record: StoredPlacement) -> Result<(), StoreError> {
        self.placements.insert(record.id.clone(), record);
        Ok(())
    }

    fn remove_placement(&mut self, id: &GlyphId) -> Result<(), StoreError> {
        self.placements
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::MissingPlacement(id.clone()))
    }

    fn replace_compositions(&mut self, records: Vec<StoredComposition>) -> Result<(), StoreError> {
        self.compositions = records
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        Ok(())
    }

    fn replace_placements(&mut self, records: Vec<StoredPlacement>) -> Result<(), StoreError> {
        self.placements = records
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        Ok(())
    }
}
