//! Glyph identity registry.
//!
//! Exactly one [`GlyphRef`] exists per id, and the registry is where it
//! lives. Structural operations hand the same `Rc` around instead of
//! cloning glyph state, so pointer equality is the identity test
//! everywhere. Creating a duplicate id or removing an unknown one is a
//! programming error and fails hard rather than limping along with two
//! instances fighting over one identity.

use crate::builder::CompositionManager;
use crate::composition::CompositionId;
use crate::geometry::Rect;
use crate::glyph::{Glyph, GlyphId, GlyphKind, GlyphRef};
use indexmap::IndexMap;
use std::rc::Rc;
use thiserror::Error;

/// A breach of the one-instance-per-id invariant, found by
/// [`GlyphRegistry::verify_invariant`].
#[derive(Debug, Error)]
pub enum IdentityViolation {
    #[error("composition {composition} holds glyph {id} which is not registered")]
    Unregistered {
        id: GlyphId,
        composition: CompositionId,
    },
    #[error("composition {composition} holds a foreign instance of glyph {id}")]
    ForeignInstance {
        id: GlyphId,
        composition: CompositionId,
    },
    #[error("glyph {id} is a member of composition {composition} but carries no back-tag")]
    MissingTag {
        id: GlyphId,
        composition: CompositionId,
    },
    #[error("glyph {id} is a member of composition {expected} but is tagged {actual}")]
    MisTagged {
        id: GlyphId,
        expected: CompositionId,
        actual: CompositionId,
    },
    #[error("glyph {id} is tagged with unknown composition {composition}")]
    UnknownComposition {
        id: GlyphId,
        composition: CompositionId,
    },
    #[error("glyph {id} is tagged with composition {composition} which does not contain it")]
    StaleTag {
        id: GlyphId,
        composition: CompositionId,
    },
    #[error("composition {composition} has no members")]
    ZeroMembers { composition: CompositionId },
}

/// Callback fired when a glyph has been relocated or reparented and the
/// host should rebind anything keyed to its on-screen representation.
pub type RebindHook = Box<dyn Fn(&GlyphRef)>;

/// Owner of every glyph on the canvas, iteration in creation order.
#[derive(Default)]
pub struct GlyphRegistry {
    glyphs: IndexMap<GlyphId, GlyphRef>,
    rebind_hook: Option<RebindHook>,
}

impl GlyphRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a glyph and register it. This is the only way glyphs come
    /// into existence.
    ///
    /// # Panics
    ///
    /// Panics if a glyph with this id is already registered.
    pub fn create(&mut self, id: impl Into<GlyphId>, kind: GlyphKind, rect: Rect) -> GlyphRef {
        let id = id.into();
        if self.glyphs.contains_key(&id) {
            panic!("glyph id already registered: {id}");
        }
        let glyph = Glyph::new(id.clone(), kind, rect).into_ref();
        self.glyphs.insert(id, glyph.clone());
        glyph
    }

    /// Remove a glyph from the canvas. This is the only way glyphs are
    /// destroyed; callers must unmeld first if the glyph is a member.
    ///
    /// # Panics
    ///
    /// Panics if no glyph with this id is registered.
    pub fn remove(&mut self, id: &GlyphId) -> GlyphRef {
        match self.glyphs.shift_remove(id) {
            Some(glyph) => glyph,
            None => panic!("cannot remove unregistered glyph: {id}"),
        }
    }

    pub fn get(&self, id: &GlyphId) -> Option<GlyphRef> {
        self.glyphs.get(id).cloned()
    }

    pub fn contains(&self, id: &GlyphId) -> bool {
        self.glyphs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GlyphId, &GlyphRef)> {
        self.glyphs.iter()
    }

    /// Every registered glyph in creation order. This is the scan set the
    /// proximity detector walks, so candidate ties resolve by creation
    /// order.
    pub fn placed(&self) -> Vec<GlyphRef> {
        self.glyphs.values().cloned().collect()
    }

    /// Register a callback fired by [`notify_relocated`].
    ///
    /// [`notify_relocated`]: Self::notify_relocated
    pub fn set_rebind_hook(&mut self, hook: RebindHook) {
        self.rebind_hook = Some(hook);
    }

    /// Announce that a glyph moved containers or positions in a way the
    /// host cannot observe through normal layout.
    pub fn notify_relocated(&self, glyph: &GlyphRef) {
        if let Some(hook) = &self.rebind_hook {
            hook(glyph);
        }
    }

    /// Sweep every composition and every glyph tag, confirming that no
    /// composition is empty, that member references resolve to registered
    /// instances, and that back-tags agree with actual membership. Returns
    /// the first violation found.
    pub fn verify_invariant(&self, manager: &CompositionManager) -> Result<(), IdentityViolation> {
        for composite in manager.iter() {
            if composite.member_count() == 0 {
                return Err(IdentityViolation::ZeroMembers {
                    composition: composite.id().clone(),
                });
            }
            for member in composite.members() {
                let id = member.borrow().id().clone();
                match self.glyphs.get(&id) {
                    None => {
                        return Err(IdentityViolation::Unregistered {
                            id,
                            composition: composite.id().clone(),
                        })
                    }
                    Some(registered) if !Rc::ptr_eq(registered, &member) => {
                        return Err(IdentityViolation::ForeignInstance {
                            id,
                            composition: composite.id().clone(),
                        })
                    }
                    Some(_) => {}
                }
                match member.borrow().composition() {
                    Some(tag) if tag == composite.id() => {}
                    Some(tag) => {
                        return Err(IdentityViolation::MisTagged {
                            id,
                            expected: composite.id().clone(),
                            actual: tag.clone(),
                        })
                    }
                    None => {
                        return Err(IdentityViolation::MissingTag {
                            id,
                            composition: composite.id().clone(),
                        })
                    }
                }
            }
        }
        for (id, glyph) in &self.glyphs {
            let tag = glyph.borrow().composition().cloned();
            if let Some(tag) = tag {
                match manager.get(&tag) {
                    None => {
                        return Err(IdentityViolation::UnknownComposition {
                            id: id.clone(),
                            composition: tag,
                        })
                    }
                    Some(composite) if !composite.contains(id) => {
                        return Err(IdentityViolation::StaleTag {
                            id: id.clone(),
                            composition: tag,
                        })
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}
