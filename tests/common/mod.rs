//! Common test utilities for integration tests.

#![allow(dead_code)]

pub mod harness;

use canvas_meld::FeedbackTier;
use std::cell::RefCell;
use std::rc::Rc;

/// Tracks hook invocations for testing.
///
/// Each field records calls to the corresponding hook with their arguments.
#[derive(Default, Clone)]
pub struct HookTracker {
    /// (initiator, target, tier, reversed), or None when the highlight cleared
    pub feedback_changes: Rc<RefCell<Vec<Option<(String, String, FeedbackTier, bool)>>>>,
    /// Glyph ids relocated or reparented by structural operations
    pub rebinds: Rc<RefCell<Vec<String>>>,
}

impl HookTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tier sequence seen so far, ignoring which pair matched.
    pub fn tiers(&self) -> Vec<Option<FeedbackTier>> {
        self.feedback_changes
            .borrow()
            .iter()
            .map(|change| change.as_ref().map(|(_, _, tier, _)| *tier))
            .collect()
    }

    /// Clear all recorded hook calls.
    pub fn clear(&self) {
        self.feedback_changes.borrow_mut().clear();
        self.rebinds.borrow_mut().clear();
    }
}
