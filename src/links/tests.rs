//! Unit tests for the link registry.

use std::time::{Duration, Instant};

use bevy::math::Vec2;

use super::*;
use crate::features::{Feature, FeatureCollection};
use crate::host::{GraphSnapshot, ViewState};

fn registry() -> LinkRegistry {
    LinkRegistry::new(Duration::from_millis(100))
}

fn arrow(store: &FeatureStore, id: &str) -> ArrowShape {
    store
        .get_feature(id)
        .and_then(|f| f.geometry.as_arrow())
        .cloned()
        .unwrap()
}

fn two_nodes() -> GraphSnapshot {
    let mut graph = GraphSnapshot::new();
    graph.set_node("n1", Vec2::ZERO, 10.0);
    graph.set_node("n2", Vec2::new(100.0, 0.0), 10.0);
    graph
}

#[test]
fn test_add_writes_mirror_and_snaps_endpoint() {
    let mut store = FeatureStore::new(10);
    let graph = GraphSnapshot::new();
    let mut links = registry();
    store.add_feature(Feature::rect_box("b", Vec2::ZERO, 100.0, 50.0));
    store.add_feature(Feature::arrow("a", Vec2::new(-50.0, 0.0), Vec2::new(90.0, 20.0)));
    let sub = store.subscribe();

    let magnet = Vec2::new(0.5, 0.0);
    assert!(links.add(&mut store, &graph, "a", Side::End, "b", TargetKind::Box, magnet));

    let shape = arrow(&store, "a");
    assert_eq!(shape.end, Vec2::new(100.0, 25.0));
    assert_eq!(shape.end_link.as_ref().unwrap().target, "b");
    let link = links.get_arrow_link("a", Side::End).unwrap();
    assert_eq!(link.target, "b");
    assert_eq!(link.kind, TargetKind::Box);
    assert!(links.get_arrow_link("a", Side::Start).is_none());
    assert!(store.drain_events(sub).iter().any(|e| matches!(
        e,
        AnnotationEvent::Linked { arrow, side: Side::End, .. } if arrow == "a"
    )));
}

#[test]
fn test_add_rejects_missing_targets() {
    let mut store = FeatureStore::new(10);
    let graph = two_nodes();
    let mut links = registry();
    store.add_feature(Feature::arrow("a", Vec2::ZERO, Vec2::new(50.0, 0.0)));
    store.add_feature(Feature::rect_box("b", Vec2::ZERO, 10.0, 10.0));

    let mut add = |arrow: &str, target: &str, kind: TargetKind| {
        links.add(&mut store, &graph, arrow, Side::Start, target, kind, Vec2::ZERO)
    };
    assert!(!add("a", "ghost", TargetKind::Node));
    assert!(!add("a", "nope", TargetKind::Box));
    // Wrong kind for an existing feature
    assert!(!add("a", "b", TargetKind::Text));
    assert!(!add("missing", "n1", TargetKind::Node));
    assert!(links.is_empty());
    assert!(arrow(&store, "a").start_link.is_none());
}

#[test]
fn test_add_replaces_existing_link_on_side() {
    let mut store = FeatureStore::new(10);
    let graph = two_nodes();
    let mut links = registry();
    store.add_feature(Feature::arrow("a", Vec2::ZERO, Vec2::new(50.0, 50.0)));

    links.add(&mut store, &graph, "a", Side::Start, "n1", TargetKind::Node, Vec2::ZERO);
    links.add(&mut store, &graph, "a", Side::Start, "n2", TargetKind::Node, Vec2::ZERO);

    assert_eq!(links.len(), 1);
    assert!(links.links_to("n1").is_empty());
    assert_eq!(links.incoming_arrows("n2"), vec!["a".to_string()]);
    assert_eq!(arrow(&store, "a").start, Vec2::new(100.0, 0.0));
}

#[test]
fn test_remove_is_noop_when_unlinked() {
    let mut store = FeatureStore::new(10);
    let graph = two_nodes();
    let mut links = registry();
    store.add_feature(Feature::arrow("a", Vec2::ZERO, Vec2::new(50.0, 0.0)));
    let before = store.undo_count();

    assert!(!links.remove(&mut store, "a", Side::End));
    assert_eq!(store.undo_count(), before);

    links.add(&mut store, &graph, "a", Side::End, "n2", TargetKind::Node, Vec2::ZERO);
    assert!(links.remove(&mut store, "a", Side::End));
    assert!(arrow(&store, "a").end_link.is_none());
    assert!(links.is_empty());
}

#[test]
fn test_link_round_trip_through_collection() {
    let mut store = FeatureStore::new(10);
    let graph = GraphSnapshot::new();
    let mut links = registry();
    store.add_feature(Feature::rect_box("b", Vec2::ZERO, 100.0, 50.0));
    store.add_feature(Feature::arrow("a", Vec2::new(-50.0, 0.0), Vec2::ZERO));
    links.add(&mut store, &graph, "a", Side::End, "b", TargetKind::Box, Vec2::new(-0.5, 0.25));

    let collection = FeatureCollection {
        features: store.features().cloned().collect(),
    };
    let json = serde_json::to_string(&collection).unwrap();
    let parsed: FeatureCollection = serde_json::from_str(&json).unwrap();

    let mut fresh = FeatureStore::new(10);
    fresh.replace_all(parsed.features);
    let mut restored = registry();
    restored.rebuild(&fresh, &graph);

    let original = links.get_arrow_link("a", Side::End).unwrap();
    let link = restored.get_arrow_link("a", Side::End).unwrap();
    assert_eq!(link.target, original.target);
    assert_eq!(link.side, original.side);
    assert_eq!(link.magnet, original.magnet);
}

#[test]
fn test_magnet_invariance_under_translation() {
    let mut store = FeatureStore::new(10);
    let graph = GraphSnapshot::new();
    let mut links = registry();
    store.add_feature(Feature::rect_box("b", Vec2::ZERO, 100.0, 50.0));
    store.add_feature(Feature::arrow("a", Vec2::new(-50.0, -50.0), Vec2::ZERO));
    links.add(&mut store, &graph, "a", Side::End, "b", TargetKind::Box, Vec2::new(0.5, -0.5));
    let before = arrow(&store, "a").end;

    let delta = Vec2::new(30.0, -20.0);
    store.update_feature("b", |f| f.geometry.translate(delta));
    let resolved = resolve_arrow(&store, &graph, &arrow(&store, "a"));

    assert!((resolved.end - (before + delta)).length() < 1e-4);
    assert_eq!(resolved.start, Vec2::new(-50.0, -50.0));
}

#[test]
fn test_node_resync_commits_once_after_debounce() {
    let mut store = FeatureStore::new(10);
    let mut graph = two_nodes();
    let mut links = registry();
    store.add_feature(Feature::arrow("A", Vec2::ZERO, Vec2::new(90.0, 0.0)));
    links.add(&mut store, &graph, "A", Side::Start, "n1", TargetKind::Node, Vec2::ZERO);
    links.add(&mut store, &graph, "A", Side::End, "n2", TargetKind::Node, Vec2::new(-1.0, 0.0));
    assert_eq!(arrow(&store, "A").end, Vec2::new(90.0, 0.0));
    let history = store.undo_count();

    let t0 = Instant::now();
    graph.set_node("n1", Vec2::new(0.0, 50.0), 10.0);
    assert_eq!(links.refresh_targets(&mut store, &graph, &["n1".to_string()], t0), 1);

    // Committed state untouched until the debounce fires
    assert_eq!(arrow(&store, "A").start, Vec2::ZERO);
    assert!(links.tick(&mut store, &graph, t0 + Duration::from_millis(50)).is_empty());
    assert_eq!(
        links.tick(&mut store, &graph, t0 + Duration::from_millis(100)),
        vec!["A".to_string()]
    );

    let shape = arrow(&store, "A");
    assert_eq!(shape.start, Vec2::new(0.0, 50.0));
    let expected = Vec2::new(100.0, 0.0) + Vec2::new(-100.0, 50.0).normalize() * 10.0;
    assert!((shape.end - expected).length() < 1e-3);
    assert!((shape.end - Vec2::new(91.056, 4.472)).length() < 1e-2);
    assert_eq!(store.undo_count(), history + 1);
}

#[test]
fn test_burst_of_moves_is_one_history_entry() {
    let mut store = FeatureStore::new(10);
    let mut graph = two_nodes();
    let mut links = registry();
    store.add_feature(Feature::arrow("A", Vec2::ZERO, Vec2::new(90.0, 0.0)));
    links.add(&mut store, &graph, "A", Side::Start, "n1", TargetKind::Node, Vec2::ZERO);
    let history = store.undo_count();

    let t0 = Instant::now();
    for step in 0..10u64 {
        graph.set_node("n1", Vec2::new(0.0, step as f32 * 5.0 + 5.0), 10.0);
        links.refresh_targets(
            &mut store,
            &graph,
            &["n1".to_string()],
            t0 + Duration::from_millis(step * 20),
        );
    }

    // Last move at +180ms
    assert!(links.tick(&mut store, &graph, t0 + Duration::from_millis(250)).is_empty());
    assert!(links.has_pending_resync());
    assert_eq!(links.tick(&mut store, &graph, t0 + Duration::from_millis(280)).len(), 1);
    assert_eq!(arrow(&store, "A").start, Vec2::new(0.0, 50.0));
    assert_eq!(store.undo_count(), history + 1);
    assert!(!links.has_pending_resync());
}

#[test]
fn test_tick_waits_for_active_gesture() {
    let mut store = FeatureStore::new(10);
    let mut graph = two_nodes();
    let mut links = registry();
    store.add_feature(Feature::arrow("A", Vec2::ZERO, Vec2::new(90.0, 0.0)));
    store.add_feature(Feature::rect_box("b", Vec2::new(200.0, 0.0), 10.0, 10.0));
    links.add(&mut store, &graph, "A", Side::Start, "n1", TargetKind::Node, Vec2::ZERO);

    let t0 = Instant::now();
    graph.set_node("n1", Vec2::new(0.0, 20.0), 10.0);
    links.refresh_targets(&mut store, &graph, &["n1".to_string()], t0);
    store.start_live_update(&["b".to_string()]);

    assert!(links.tick(&mut store, &graph, t0 + Duration::from_millis(150)).is_empty());
    assert!(links.has_pending_resync());

    // Cancelling the gesture leaves the resync overlay alone
    store.cancel_live_updates();
    assert!(!store.is_dragging());
    assert!(store.is_live("A"));
    assert_eq!(links.tick(&mut store, &graph, t0 + Duration::from_millis(300)).len(), 1);
    assert_eq!(arrow(&store, "A").start, Vec2::new(0.0, 20.0));
}

#[test]
fn test_flush_holds_arrows_in_gesture_session() {
    let mut store = FeatureStore::new(10);
    let mut graph = two_nodes();
    let mut links = registry();
    store.add_feature(Feature::arrow("A", Vec2::ZERO, Vec2::new(90.0, 0.0)));
    links.add(&mut store, &graph, "A", Side::Start, "n1", TargetKind::Node, Vec2::ZERO);
    let history = store.undo_count();

    store.start_live_update(&["A".to_string()]);
    graph.set_node("n1", Vec2::new(0.0, 20.0), 10.0);
    links.refresh_targets(&mut store, &graph, &["n1".to_string()], Instant::now());

    assert!(links.flush(&mut store, &graph).is_empty());
    assert!(links.has_pending_resync());
    assert!(store.is_live("A"));

    // The gesture commits the arrow together with its resolved start
    store.commit_live_updates(Some(&["A".to_string()]));
    assert_eq!(arrow(&store, "A").start, Vec2::new(0.0, 20.0));
    assert_eq!(store.undo_count(), history + 1);
    assert!(links.flush(&mut store, &graph).is_empty());
    assert!(!links.has_pending_resync());
    assert_eq!(store.undo_count(), history + 1);
}

#[test]
fn test_cancelled_session_arrow_still_resyncs() {
    let mut store = FeatureStore::new(10);
    let mut graph = two_nodes();
    let mut links = registry();
    store.add_feature(Feature::arrow("A", Vec2::ZERO, Vec2::new(90.0, 0.0)));
    links.add(&mut store, &graph, "A", Side::Start, "n1", TargetKind::Node, Vec2::ZERO);

    let t0 = Instant::now();
    store.start_live_update(&["A".to_string()]);
    graph.set_node("n1", Vec2::new(0.0, 20.0), 10.0);
    links.refresh_targets(&mut store, &graph, &["n1".to_string()], t0);
    store.cancel_live_updates();
    assert!(!store.is_live("A"));

    assert_eq!(
        links.tick(&mut store, &graph, t0 + Duration::from_millis(100)),
        vec!["A".to_string()]
    );
    assert_eq!(arrow(&store, "A").start, Vec2::new(0.0, 20.0));
}

#[test]
fn test_flush_follows_target_moved_after_refresh() {
    let mut store = FeatureStore::new(10);
    let mut graph = two_nodes();
    let mut links = registry();
    store.add_feature(Feature::arrow("A", Vec2::ZERO, Vec2::new(90.0, 0.0)));
    links.add(&mut store, &graph, "A", Side::Start, "n1", TargetKind::Node, Vec2::ZERO);

    graph.set_node("n1", Vec2::new(0.0, 20.0), 10.0);
    links.refresh_targets(&mut store, &graph, &["n1".to_string()], Instant::now());
    graph.set_node("n1", Vec2::new(0.0, 40.0), 10.0);

    assert_eq!(links.flush(&mut store, &graph), vec!["A".to_string()]);
    assert_eq!(arrow(&store, "A").start, Vec2::new(0.0, 40.0));
}

#[test]
fn test_removing_target_strips_incoming_links() {
    let mut store = FeatureStore::new(10);
    let graph = GraphSnapshot::new();
    let mut links = registry();
    store.add_feature(Feature::rect_box("b", Vec2::ZERO, 100.0, 50.0));
    store.add_feature(Feature::arrow("a1", Vec2::new(-50.0, 0.0), Vec2::ZERO));
    store.add_feature(Feature::arrow("a2", Vec2::new(50.0, -80.0), Vec2::ZERO));
    links.add(&mut store, &graph, "a1", Side::End, "b", TargetKind::Box, Vec2::new(-0.5, 0.0));
    links.add(&mut store, &graph, "a2", Side::End, "b", TargetKind::Box, Vec2::new(0.0, -0.5));
    let end = arrow(&store, "a2").end;

    store.remove_feature("b");
    let mut lost = links.on_feature_removed(&mut store, "b");
    lost.sort();

    assert_eq!(lost, vec!["a1".to_string(), "a2".to_string()]);
    assert!(links.is_empty());
    assert!(arrow(&store, "a1").end_link.is_none());
    // Endpoint stays where it was
    assert_eq!(arrow(&store, "a2").end, end);
}

#[test]
fn test_removing_arrow_drops_its_links() {
    let mut store = FeatureStore::new(10);
    let graph = two_nodes();
    let mut links = registry();
    store.add_feature(Feature::arrow("a", Vec2::ZERO, Vec2::new(100.0, 0.0)));
    links.add(&mut store, &graph, "a", Side::Start, "n1", TargetKind::Node, Vec2::ZERO);
    links.add(&mut store, &graph, "a", Side::End, "n2", TargetKind::Node, Vec2::ZERO);

    store.remove_feature("a");
    links.on_feature_removed(&mut store, "a");

    assert!(links.is_empty());
    assert!(!links.is_linked("n1"));
    assert!(!links.is_linked("n2"));
}

#[test]
fn test_removing_node_unlinks_arrows() {
    let mut store = FeatureStore::new(10);
    let mut graph = two_nodes();
    let mut links = registry();
    store.add_feature(Feature::arrow("a", Vec2::ZERO, Vec2::new(100.0, 0.0)));
    links.add(&mut store, &graph, "a", Side::End, "n2", TargetKind::Node, Vec2::ZERO);

    graph.remove_node("n2");
    assert_eq!(links.on_node_removed(&mut store, "n2"), vec!["a".to_string()]);
    assert!(arrow(&store, "a").end_link.is_none());
}

#[test]
fn test_target_anchor_preconditions() {
    let mut store = FeatureStore::new(10);
    let graph = GraphSnapshot::new();
    store.add_feature(Feature::rect_box("b", Vec2::ZERO, 100.0, 50.0));

    let wrong_kind = LinkRecord {
        target: "b".to_string(),
        kind: TargetKind::Polygon,
        magnet: Vec2::ZERO,
    };
    assert!(matches!(
        target_anchor(&store, &graph, &wrong_kind),
        Err(AnnotationError::TargetKindMismatch { .. })
    ));

    let missing = LinkRecord {
        target: "gone".to_string(),
        kind: TargetKind::Box,
        magnet: Vec2::ZERO,
    };
    assert!(matches!(
        target_anchor(&store, &graph, &missing),
        Err(AnnotationError::UnknownFeature { .. })
    ));

    let ok = LinkRecord {
        target: "b".to_string(),
        kind: TargetKind::Box,
        magnet: Vec2::new(-0.5, -0.5),
    };
    assert_eq!(target_anchor(&store, &graph, &ok).unwrap(), Vec2::ZERO);
}

#[test]
fn test_dangling_mirror_adopted_when_target_arrives() {
    let mut store = FeatureStore::new(10);
    let graph = GraphSnapshot::new();
    let mut links = registry();
    let mut shape = ArrowShape::new(Vec2::ZERO, Vec2::new(10.0, 0.0));
    shape.end_link = Some(LinkRecord {
        target: "b".to_string(),
        kind: TargetKind::Box,
        magnet: Vec2::ZERO,
    });
    store.add_feature(Feature::new("a", crate::features::Geometry::Arrow(shape)));
    links.rebuild(&store, &graph);
    assert!(links.is_empty());

    store.add_feature(Feature::rect_box("b", Vec2::ZERO, 20.0, 20.0));
    links.on_feature_added(&store, &graph, "b");
    assert_eq!(links.get_arrow_link("a", Side::End).unwrap().target, "b");
}

#[test]
fn test_view_rotation_moves_text_linked_arrows() {
    let mut store = FeatureStore::new(10);
    let mut graph = GraphSnapshot::new();
    let mut links = registry();
    store.add_feature(Feature::text("t", Vec2::new(-20.0, -10.0), 40.0, 20.0, "note"));
    store.add_feature(Feature::rect_box("b", Vec2::new(100.0, 100.0), 40.0, 20.0));
    store.add_feature(Feature::arrow("to-text", Vec2::new(100.0, 0.0), Vec2::ZERO));
    store.add_feature(Feature::arrow("to-box", Vec2::new(0.0, 200.0), Vec2::ZERO));
    links.add(&mut store, &graph, "to-text", Side::End, "t", TargetKind::Text, Vec2::new(0.5, 0.0));
    links.add(&mut store, &graph, "to-box", Side::End, "b", TargetKind::Box, Vec2::new(0.5, 0.0));
    assert_eq!(arrow(&store, "to-text").end, Vec2::new(20.0, 0.0));

    graph.set_view(ViewState {
        rotation: std::f32::consts::FRAC_PI_2,
        ..Default::default()
    });
    let now = Instant::now();
    assert_eq!(links.refresh_view_dependent(&mut store, &graph, now), 1);
    links.flush(&mut store, &graph);

    assert!((arrow(&store, "to-text").end - Vec2::new(0.0, -20.0)).length() < 1e-4);
    assert_eq!(arrow(&store, "to-box").end, Vec2::new(140.0, 110.0));
}
