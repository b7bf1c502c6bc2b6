//! Integration tests driving the engine the way the decoder does: a stream
//! of decoded updates in, snapshots and change callbacks out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rand::Rng;

use gridsync_client::{FaceCache, SyncEngine};
use gridsync_shared::constants::EMPTY_FACE;
use gridsync_shared::types::SquareVisibility;
use gridsync_shared::update::{FaceData, MapUpdate};
use gridsync_shared::SyncError;

/// An engine with a 7x7 window of 4 layers, like a small game view.
fn engine() -> SyncEngine {
    let engine = SyncEngine::new(Arc::new(FaceCache::new()));
    engine
        .apply(MapUpdate::NewMap {
            width: 7,
            height: 7,
            layers: 4,
        })
        .unwrap();
    engine
}

fn set_face(engine: &SyncEngine, x: i32, y: i32, layer: u8, face: u32) {
    engine
        .apply(MapUpdate::SetFace { x, y, layer, face })
        .unwrap();
}

#[test]
fn applied_values_survive_losing_sight() {
    let engine = engine();

    set_face(&engine, 3, 3, 0, 55);
    engine
        .apply(MapUpdate::ClearCell { x: 3, y: 3, layer: 0 })
        .unwrap();

    // the clear is a real value and is what the square remembers
    let snapshot = engine.snapshot(3, 3).unwrap();
    assert_eq!(snapshot.faces[0], EMPTY_FACE);
    assert!(!snapshot.fog);

    engine.apply(MapUpdate::HideSquare { x: 3, y: 3 }).unwrap();
    let hidden = engine.snapshot(3, 3).unwrap();
    assert_eq!(hidden.faces[0], EMPTY_FACE);
    assert!(hidden.fog);
    assert_eq!(hidden.visibility, SquareVisibility::Hidden);
}

#[test]
fn hiding_preserves_content_and_updates_reveal_it() {
    let engine = engine();

    set_face(&engine, 2, 4, 1, 33);
    engine.apply(MapUpdate::HideSquare { x: 2, y: 4 }).unwrap();

    let hidden = engine.snapshot(2, 4).unwrap();
    assert!(hidden.fog);
    assert_eq!(hidden.faces[1], 33);

    // the next applied update brings the square back into sight
    set_face(&engine, 2, 4, 0, 12);
    let revealed = engine.snapshot(2, 4).unwrap();
    assert!(!revealed.fog);
    assert_eq!(revealed.faces[1], 33);
    assert_eq!(revealed.faces[0], 12);
}

#[test]
fn any_update_sequence_ends_at_its_last_value() {
    let engine = engine();
    let mut rng = rand::thread_rng();

    let mut expected = EMPTY_FACE;
    for _ in 0..200 {
        let face = rng.gen_range(0..5u32);
        set_face(&engine, 3, 3, 0, face);
        expected = face;
    }

    engine.apply(MapUpdate::HideSquare { x: 3, y: 3 }).unwrap();
    let snapshot = engine.snapshot(3, 3).unwrap();
    assert_eq!(snapshot.faces[0], expected);
    assert!(snapshot.fog);
}

#[test]
fn scroll_round_trip_restores_content_and_fog() {
    let engine = engine();

    set_face(&engine, 1, 1, 0, 10); // evicted by the scroll
    set_face(&engine, 5, 5, 0, 20); // survives inside the window

    engine.apply(MapUpdate::Scroll { dx: 3, dy: 0 }).unwrap();

    // the surviving square moved against the scroll direction, still live
    let moved = engine.snapshot(2, 5).unwrap();
    assert_eq!(moved.faces[0], 20);
    assert!(!moved.fog);
    assert!(engine.snapshot(1, 1).unwrap().faces[0] == EMPTY_FACE);

    engine.apply(MapUpdate::Scroll { dx: -3, dy: 0 }).unwrap();

    let restored = engine.snapshot(1, 1).unwrap();
    assert_eq!(restored.faces[0], 10);
    assert!(restored.fog, "an evicted square comes back as fog");

    let back = engine.snapshot(5, 5).unwrap();
    assert_eq!(back.faces[0], 20);
    assert!(!back.fog, "a square that never left stays live");
}

#[test]
fn explicit_clear_forgets_across_scrolls() {
    let engine = engine();

    set_face(&engine, 1, 1, 0, 10);
    engine.apply(MapUpdate::ClearSquare { x: 1, y: 1 }).unwrap();
    assert_eq!(
        engine.snapshot(1, 1).unwrap().visibility,
        SquareVisibility::Cleared
    );

    engine.apply(MapUpdate::Scroll { dx: 7, dy: 0 }).unwrap();
    engine.apply(MapUpdate::Scroll { dx: -7, dy: 0 }).unwrap();
    assert_eq!(engine.snapshot(1, 1).unwrap().faces[0], EMPTY_FACE);
}

#[test]
fn animation_cycles_with_the_tick_clock() {
    let engine = engine();
    engine
        .apply(MapUpdate::DefineAnimation {
            id: 7,
            flags: 0,
            faces: vec![101, 102, 103],
        })
        .unwrap();
    engine
        .apply(MapUpdate::SetAnim {
            x: 2,
            y: 2,
            layer: 0,
            animation: 7,
            phase: 0,
        })
        .unwrap();

    assert_eq!(engine.snapshot(2, 2).unwrap().faces[0], 101);

    // the first tick only establishes the clock
    engine.apply(MapUpdate::Tick { tick: 10 }).unwrap();
    assert_eq!(engine.snapshot(2, 2).unwrap().faces[0], 101);

    engine.apply(MapUpdate::Tick { tick: 11 }).unwrap();
    assert_eq!(engine.snapshot(2, 2).unwrap().faces[0], 102);

    // a full cycle returns to the same frame
    engine.apply(MapUpdate::Tick { tick: 14 }).unwrap();
    assert_eq!(engine.snapshot(2, 2).unwrap().faces[0], 102);
}

#[test]
fn animation_speed_slows_the_cycle_without_jumping_frames() {
    let engine = engine();
    engine
        .apply(MapUpdate::DefineAnimation {
            id: 3,
            flags: 0,
            faces: vec![50, 51],
        })
        .unwrap();
    engine
        .apply(MapUpdate::SetAnim {
            x: 0,
            y: 0,
            layer: 2,
            animation: 3,
            phase: 0,
        })
        .unwrap();
    engine
        .apply(MapUpdate::SetAnimationSpeed {
            x: 0,
            y: 0,
            layer: 2,
            speed: 3,
        })
        .unwrap();

    engine.apply(MapUpdate::Tick { tick: 0 }).unwrap();
    let mut frames = Vec::new();
    for tick in 1..=6 {
        engine.apply(MapUpdate::Tick { tick }).unwrap();
        frames.push(engine.snapshot(0, 0).unwrap().faces[2]);
    }
    // three ticks per frame
    assert_eq!(frames, vec![50, 50, 51, 51, 51, 50]);
}

#[test]
fn hidden_squares_keep_their_last_seen_frame() {
    let engine = engine();
    engine
        .apply(MapUpdate::DefineAnimation {
            id: 1,
            flags: 0,
            faces: vec![60, 61],
        })
        .unwrap();
    engine
        .apply(MapUpdate::SetAnim {
            x: 4,
            y: 4,
            layer: 0,
            animation: 1,
            phase: 0,
        })
        .unwrap();
    engine.apply(MapUpdate::Tick { tick: 0 }).unwrap();
    engine.apply(MapUpdate::HideSquare { x: 4, y: 4 }).unwrap();

    engine.apply(MapUpdate::Tick { tick: 5 }).unwrap();
    assert_eq!(engine.snapshot(4, 4).unwrap().faces[0], 60);
}

#[test]
fn bad_frames_are_skipped_and_the_stream_continues() {
    let engine = engine();

    // unknown animation, out-of-range layer, out-of-window coordinate
    engine
        .apply(MapUpdate::SetAnim {
            x: 1,
            y: 1,
            layer: 0,
            animation: 999,
            phase: 0,
        })
        .unwrap();
    engine
        .apply(MapUpdate::SetFace {
            x: 1,
            y: 1,
            layer: 9,
            face: 5,
        })
        .unwrap();
    engine
        .apply(MapUpdate::SetFace {
            x: 40,
            y: 1,
            layer: 0,
            face: 5,
        })
        .unwrap();

    assert_eq!(engine.snapshot(1, 1).unwrap().faces[0], EMPTY_FACE);

    // the session is still good
    set_face(&engine, 1, 1, 0, 5);
    assert_eq!(engine.snapshot(1, 1).unwrap().faces[0], 5);
}

#[test]
fn scroll_overflow_is_a_fatal_desync() {
    let engine = engine();
    engine
        .apply(MapUpdate::Scroll {
            dx: i32::MAX - 10,
            dy: 0,
        })
        .unwrap();
    let result = engine.apply(MapUpdate::Scroll { dx: 100, dy: 0 });
    assert!(matches!(result, Err(SyncError::ScrollOverflow { .. })));
}

#[test]
fn multi_tile_face_paints_and_releases_covered_squares() {
    let engine = engine();
    // two tiles wide, anchored bottom-right: covers the square to the left
    engine.face_data_available(9, FaceData::new(64, 32, vec![1]));

    set_face(&engine, 5, 5, 1, 9);
    assert_eq!(engine.snapshot(4, 5).unwrap().faces[1], 9);
    assert_eq!(engine.snapshot(5, 5).unwrap().faces[1], 9);

    // the object moves away; the covered square reads empty again
    set_face(&engine, 5, 5, 1, EMPTY_FACE);
    assert_eq!(engine.snapshot(4, 5).unwrap().faces[1], EMPTY_FACE);
    assert_eq!(engine.snapshot(5, 5).unwrap().faces[1], EMPTY_FACE);
}

#[test]
fn overlay_never_disturbs_the_underlying_content() {
    let engine = engine();
    engine.face_data_available(9, FaceData::new(64, 32, vec![1]));

    set_face(&engine, 4, 5, 1, 77); // terrain underneath the object
    set_face(&engine, 5, 5, 1, 9); // large object covers (4, 5)
    assert_eq!(engine.snapshot(4, 5).unwrap().faces[1], 9);

    set_face(&engine, 5, 5, 1, EMPTY_FACE);
    assert_eq!(
        engine.snapshot(4, 5).unwrap().faces[1],
        77,
        "the covered square remembers what was underneath"
    );
}

#[test]
fn late_face_delivery_expands_an_already_placed_object() {
    let engine = engine();

    // placed while the payload, and therefore the size, is unknown
    set_face(&engine, 5, 5, 1, 9);
    assert_eq!(engine.snapshot(4, 5).unwrap().faces[1], EMPTY_FACE);

    engine.face_data_available(9, FaceData::new(64, 64, vec![1]));
    assert_eq!(engine.snapshot(4, 5).unwrap().faces[1], 9);
    assert_eq!(engine.snapshot(5, 4).unwrap().faces[1], 9);
    assert_eq!(engine.snapshot(4, 4).unwrap().faces[1], 9);
}

#[test]
fn scrolled_out_anchor_releases_its_overlays() {
    let engine = engine();
    engine.face_data_available(9, FaceData::new(64, 32, vec![1]));
    set_face(&engine, 5, 5, 1, 9);
    assert_eq!(engine.snapshot(4, 5).unwrap().faces[1], 9);

    // the anchor leaves through the right edge, its covered square survives
    engine.apply(MapUpdate::Scroll { dx: -2, dy: 0 }).unwrap();
    assert_eq!(engine.snapshot(6, 5).unwrap().faces[1], EMPTY_FACE);

    // the anchor returns as retained fog content; overlays stay released
    // until the server re-applies the object
    engine.apply(MapUpdate::Scroll { dx: 2, dy: 0 }).unwrap();
    let anchor = engine.snapshot(5, 5).unwrap();
    assert_eq!(anchor.faces[1], 9);
    assert!(anchor.fog);
    assert_eq!(engine.snapshot(4, 5).unwrap().faces[1], EMPTY_FACE);

    set_face(&engine, 5, 5, 1, 9);
    assert_eq!(engine.snapshot(4, 5).unwrap().faces[1], 9);
    assert!(!engine.snapshot(5, 5).unwrap().fog);
}

#[test]
fn face_delivery_notifies_exactly_once_per_delivery() {
    let cache = Arc::new(FaceCache::new());
    let engine = SyncEngine::new(cache.clone());
    engine
        .apply(MapUpdate::NewMap {
            width: 7,
            height: 7,
            layers: 4,
        })
        .unwrap();

    let deliveries = Arc::new(AtomicUsize::new(0));
    let counter = deliveries.clone();
    cache.on_update(12, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    set_face(&engine, 0, 0, 0, 12);
    assert_eq!(deliveries.load(Ordering::SeqCst), 0);

    engine.face_data_available(12, FaceData::new(32, 32, vec![1]));
    assert_eq!(deliveries.load(Ordering::SeqCst), 1);

    // a resend with changed bytes re-notifies, once
    engine.face_data_available(12, FaceData::new(32, 32, vec![2]));
    assert_eq!(deliveries.load(Ordering::SeqCst), 2);
}

#[test]
fn change_callbacks_fire_once_per_changed_square() {
    let engine = engine();
    let changes: Arc<Mutex<Vec<(i32, i32)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    engine.add_square_listener(move |x, y| {
        sink.lock().unwrap().push((x, y));
    });

    set_face(&engine, 2, 3, 0, 8);
    assert_eq!(changes.lock().unwrap().clone(), vec![(2, 3)]);

    // re-applying the same value changes nothing and stays silent
    set_face(&engine, 2, 3, 0, 8);
    assert_eq!(changes.lock().unwrap().len(), 1);
}

#[test]
fn new_map_forgets_everything_retained() {
    let engine = engine();
    set_face(&engine, 1, 1, 0, 10);
    engine.apply(MapUpdate::Scroll { dx: 7, dy: 0 }).unwrap();

    engine
        .apply(MapUpdate::NewMap {
            width: 7,
            height: 7,
            layers: 4,
        })
        .unwrap();
    engine.apply(MapUpdate::Scroll { dx: -7, dy: 0 }).unwrap();

    let snapshot = engine.snapshot(1, 1).unwrap();
    assert_eq!(snapshot.faces[0], EMPTY_FACE);
    assert_eq!(snapshot.visibility, SquareVisibility::Unseen);
}

#[test]
fn zero_sized_map_announcement_is_rejected() {
    let engine = SyncEngine::new(Arc::new(FaceCache::new()));
    let result = engine.apply(MapUpdate::NewMap {
        width: 0,
        height: 7,
        layers: 4,
    });
    assert!(matches!(result, Err(SyncError::InvalidGridShape { .. })));
}

#[test]
fn updates_before_the_first_map_are_skipped() {
    let engine = SyncEngine::new(Arc::new(FaceCache::new()));
    engine
        .apply(MapUpdate::SetFace {
            x: 0,
            y: 0,
            layer: 0,
            face: 1,
        })
        .unwrap();
    assert!(engine.snapshot(0, 0).is_none());
}
