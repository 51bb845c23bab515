//! Level 3: Drop Commit Tests
//!
//! Tests the meld, extend, and merge paths a released drag dispatches to,
//! and the rejections that leave the canvas untouched.

mod common;

use canvas_meld::{Direction, GlyphKind, Rect};
use common::harness::CanvasTestHarness;

fn scripts(positions: &[(&'static str, f32, f32)]) -> CanvasTestHarness {
    CanvasTestHarness::with_glyphs(
        positions
            .iter()
            .map(|&(id, x, y)| (id, GlyphKind::SCRIPT, Rect::new(x, y, 200.0, 150.0)))
            .collect(),
    )
}

#[test]
fn test_drop_in_range_melds_pair() {
    let harness = scripts(&[("a", 100.0, 100.0), ("b", 600.0, 100.0)]);

    let id = harness.drag("b", 320.0, 100.0).unwrap();

    assert_eq!(id.as_str(), "meld-a-b");
    assert_eq!(harness.composition_of("a"), Some(id.clone()));
    assert_eq!(harness.composition_of("b"), Some(id));
    // Members reflow flush from the stationary glyph's position
    assert_eq!(harness.origin_of("a"), (100.0, 100.0));
    assert_eq!(harness.origin_of("b"), (300.0, 100.0));
    assert!(harness.ctrl.verify().is_ok());
}

#[test]
fn test_drop_out_of_range_stays_standalone() {
    let harness = scripts(&[("a", 100.0, 100.0), ("b", 600.0, 100.0)]);

    // Gap 40: approaching, never meldable
    assert!(harness.drag("b", 340.0, 100.0).is_none());

    assert!(harness.composition_of("a").is_none());
    assert!(harness.composition_of("b").is_none());
    assert_eq!(harness.origin_of("b"), (340.0, 100.0));
}

#[test]
fn test_top_drop_seats_target_above() {
    let harness = CanvasTestHarness::with_glyphs(vec![
        ("upper", GlyphKind::SEMANTIC, Rect::new(100.0, 100.0, 200.0, 150.0)),
        ("lower", GlyphKind::SEMANTIC, Rect::new(100.0, 700.0, 200.0, 150.0)),
    ]);

    // Drag lower until its top edge sits 20 under upper's bottom (y=250)
    let id = harness.drag("lower", 100.0, 270.0).unwrap();

    // Flow runs target-first for top joins: the container anchors at the
    // stationary upper glyph and lower follows beneath
    assert_eq!(id.as_str(), "meld-lower-upper");
    assert_eq!(harness.origin_of("upper"), (100.0, 100.0));
    assert_eq!(harness.origin_of("lower"), (100.0, 250.0));
}

#[test]
fn test_rebind_hook_sees_both_members() {
    let harness = scripts(&[("a", 100.0, 100.0), ("b", 600.0, 100.0)]);
    harness.tracker.clear();

    harness.drag("b", 320.0, 100.0).unwrap();

    assert_eq!(harness.tracker.rebinds.borrow().as_slice(), ["a", "b"]);
}

#[test]
fn test_drop_extends_composition_at_end() {
    let harness = scripts(&[
        ("a", 100.0, 100.0),
        ("b", 330.0, 100.0),
        ("c", 900.0, 100.0),
    ]);
    let first = harness.meld("a", "b", Direction::Right);

    // b now ends at x=500; drop c 20 past it
    let id = harness.drag("c", 520.0, 100.0).unwrap();

    assert_ne!(id, first);
    assert_eq!(id.as_str(), "meld-b-c");
    assert_eq!(harness.ctrl.manager().borrow().len(), 1);
    assert_eq!(harness.composition_of("a"), Some(id.clone()));
    assert_eq!(harness.composition_of("c"), Some(id));
    assert_eq!(harness.origin_of("c"), (500.0, 100.0));
}

#[test]
fn test_drop_extends_composition_at_start() {
    let harness = scripts(&[
        ("a", 400.0, 100.0),
        ("b", 630.0, 100.0),
        ("c", 900.0, 600.0),
    ]);
    harness.meld("a", "b", Direction::Right);

    // Approach a from the left: c's right edge 20 short of a
    let id = harness.drag("c", 180.0, 100.0).unwrap();

    assert_eq!(id.as_str(), "meld-c-a");
    // The container keeps its anchor; c takes the first slot there
    assert_eq!(harness.origin_of("c"), (400.0, 100.0));
    assert_eq!(harness.origin_of("a"), (600.0, 100.0));
    assert_eq!(harness.origin_of("b"), (800.0, 100.0));
    assert!(harness.ctrl.verify().is_ok());
}

#[test]
fn test_drop_merges_two_compositions() {
    let harness = scripts(&[
        ("a", 0.0, 0.0),
        ("b", 230.0, 0.0),
        ("c", 1000.0, 0.0),
        ("d", 1230.0, 0.0),
    ]);
    let left = harness.meld("a", "b", Direction::Right);
    let right = harness.meld("c", "d", Direction::Right);
    harness.tracker.clear();

    // Drag the right pair so c lands 20 past b (b ends at x=400)
    let merged = harness.drag("c", 420.0, 0.0).unwrap();

    assert_ne!(merged, left);
    assert_ne!(merged, right);
    let manager = harness.ctrl.manager();
    let manager = manager.borrow();
    assert_eq!(manager.len(), 1);
    let composite = manager.get(&merged).unwrap();
    assert_eq!(composite.member_count(), 4);
    assert_eq!(composite.edges().len(), 3);
    // Survivor keeps its anchor; absorbed members flow on after it
    assert_eq!(composite.anchor(), (0.0, 0.0));
    drop(manager);
    assert_eq!(harness.origin_of("c"), (400.0, 0.0));
    assert_eq!(harness.origin_of("d"), (600.0, 0.0));
    // Only the absorbed side was reparented
    assert_eq!(harness.tracker.rebinds.borrow().as_slice(), ["c", "d"]);
    assert!(harness.ctrl.verify().is_ok());
}

#[test]
fn test_incompatible_drop_in_range_degrades_to_move() {
    let harness = CanvasTestHarness::with_glyphs(vec![
        ("ax", GlyphKind::QUERY, Rect::new(100.0, 100.0, 200.0, 150.0)),
        ("note", GlyphKind::NOTE, Rect::new(600.0, 100.0, 200.0, 150.0)),
    ]);

    // Notes match nothing, so even a flush drop is just a move
    assert!(harness.drag("note", 310.0, 100.0).is_none());
    assert_eq!(harness.origin_of("note"), (310.0, 100.0));
    assert_eq!(harness.ctrl.manager().borrow().len(), 0);
}

#[test]
fn test_query_receives_nothing_but_still_initiates() {
    let harness = CanvasTestHarness::with_glyphs(vec![
        ("ax", GlyphKind::QUERY, Rect::new(100.0, 100.0, 200.0, 150.0)),
        ("prompt", GlyphKind::PROMPT, Rect::new(600.0, 100.0, 200.0, 150.0)),
    ]);

    // The prompt is the pointer's glyph, yet the committed edge runs from
    // the stationary query
    let id = harness.drag("prompt", 320.0, 100.0).unwrap();

    assert_eq!(id.as_str(), "meld-ax-prompt");
    assert_eq!(harness.origin_of("ax"), (100.0, 100.0));
    assert_eq!(harness.origin_of("prompt"), (300.0, 100.0));
}

#[test]
fn test_direct_meld_rejects_double_membership() {
    let harness = scripts(&[
        ("a", 0.0, 0.0),
        ("b", 230.0, 0.0),
        ("c", 900.0, 0.0),
    ]);
    harness.meld("a", "b", Direction::Right);

    // a is already melded; a direct second meld must be rejected
    let err = harness
        .ctrl
        .meld(
            &"a".into(),
            &"c".into(),
            Direction::Right,
        )
        .unwrap_err();
    assert!(matches!(err, canvas_meld::MeldError::AlreadyMelded(_, _)));
    assert!(harness.composition_of("c").is_none());
}

#[test]
fn test_unmeld_spreads_members_apart() {
    let harness = scripts(&[("a", 100.0, 100.0), ("b", 330.0, 100.0)]);
    let id = harness.meld("a", "b", Direction::Right);
    harness.tracker.clear();

    let members = harness.ctrl.unmeld(&id).unwrap();

    assert_eq!(members.len(), 2);
    assert!(harness.composition_of("a").is_none());
    assert!(harness.composition_of("b").is_none());
    // Members keep flow order along the old axis with a visible gap
    assert_eq!(harness.origin_of("a"), (100.0, 100.0));
    assert_eq!(harness.origin_of("b"), (100.0 + 200.0 + canvas_meld::UNMELD_GAP, 100.0));
    assert_eq!(harness.tracker.rebinds.borrow().as_slice(), ["a", "b"]);
    assert_eq!(harness.ctrl.manager().borrow().len(), 0);
}

#[test]
fn test_unmelded_members_meld_again() {
    let harness = scripts(&[("a", 100.0, 100.0), ("b", 330.0, 100.0)]);
    let id = harness.meld("a", "b", Direction::Right);
    harness.ctrl.unmeld(&id).unwrap();

    // The same pair joins afresh under the same derived id
    let second = harness.drag("b", 320.0, 100.0).unwrap();
    assert_eq!(second.as_str(), "meld-a-b");
    assert_eq!(harness.ctrl.manager().borrow().len(), 1);
}
