//! Unit tests for the annotator facade.

use std::time::{Duration, Instant};

use bevy::math::Vec2;

use super::*;
use crate::features::{LinkRecord, TargetKind};
use crate::host::ViewState;

fn linked_arrow(id: &str, start: Vec2, end: Vec2, links: [Option<LinkRecord>; 2]) -> Feature {
    let mut feature = Feature::arrow(id, start, end);
    if let Some(arrow) = feature.geometry.as_arrow_mut() {
        let [start_link, end_link] = links;
        arrow.start_link = start_link;
        arrow.end_link = end_link;
    }
    feature
}

fn node_link(target: &str, magnet: Vec2) -> Option<LinkRecord> {
    Some(LinkRecord {
        target: target.to_string(),
        kind: TargetKind::Node,
        magnet,
    })
}

fn with_two_nodes() -> Annotator {
    let mut annotator = Annotator::default();
    annotator.host_mut().set_node("n1", Vec2::ZERO, 10.0);
    annotator.host_mut().set_node("n2", Vec2::new(100.0, 0.0), 10.0);
    annotator
}

fn arrow_of(annotator: &Annotator, id: &str) -> crate::features::ArrowShape {
    annotator
        .get_feature(id)
        .and_then(|f| f.geometry.as_arrow())
        .cloned()
        .unwrap()
}

#[test]
fn test_node_move_resyncs_after_debounce() {
    let mut annotator = with_two_nodes();
    annotator.add_collection(FeatureCollection {
        features: vec![linked_arrow(
            "a",
            Vec2::ZERO,
            Vec2::new(90.0, 0.0),
            [node_link("n1", Vec2::ZERO), node_link("n2", Vec2::NEG_X)],
        )],
    });
    assert_eq!(annotator.links().len(), 2);
    let before = annotator.store().undo_count();

    let t0 = Instant::now();
    annotator.host_mut().set_node("n1", Vec2::new(0.0, 50.0), 10.0);
    assert_eq!(annotator.notify_nodes_changed(&["n1".to_string()], t0), 1);

    // Overlay moved, committed state waits for the debounce
    assert_eq!(arrow_of(&annotator, "a").start, Vec2::ZERO);
    let live = annotator.get_merged_feature("a").unwrap().geometry.as_arrow().unwrap();
    assert_eq!(live.start, Vec2::new(0.0, 50.0));
    assert!(annotator.tick(t0 + Duration::from_millis(50)).is_empty());

    assert_eq!(annotator.tick(t0 + Duration::from_millis(150)), vec!["a".to_string()]);
    let committed = arrow_of(&annotator, "a");
    assert_eq!(committed.start, Vec2::new(0.0, 50.0));
    let expected_end = Vec2::new(100.0, 0.0) + Vec2::new(-100.0, 50.0).normalize() * 10.0;
    assert!(committed.end.abs_diff_eq(expected_end, 1e-3));
    assert_eq!(annotator.store().undo_count(), before + 1);
}

#[test]
fn test_removed_node_drops_links() {
    let mut annotator = with_two_nodes();
    annotator.add_collection(FeatureCollection {
        features: vec![linked_arrow(
            "a",
            Vec2::ZERO,
            Vec2::new(90.0, 0.0),
            [node_link("n1", Vec2::ZERO), node_link("n2", Vec2::NEG_X)],
        )],
    });
    let before = annotator.store().undo_count();

    annotator.host_mut().remove_node("n2");
    annotator.notify_nodes_changed(&["n2".to_string()], Instant::now());

    assert_eq!(annotator.links().len(), 1);
    assert!(arrow_of(&annotator, "a").end_link.is_none());
    assert_eq!(annotator.store().undo_count(), before + 1);
}

#[test]
fn test_late_node_picks_up_waiting_mirror() {
    let mut annotator = Annotator::default();
    annotator.add_collection(FeatureCollection {
        features: vec![linked_arrow(
            "a",
            Vec2::ZERO,
            Vec2::new(90.0, 0.0),
            [node_link("n1", Vec2::ZERO), None],
        )],
    });
    assert!(annotator.links().is_empty());

    annotator.host_mut().set_node("n1", Vec2::ZERO, 10.0);
    annotator.notify_nodes_changed(&["n1".to_string()], Instant::now());
    assert!(annotator.links().get_arrow_link("a", Side::Start).is_some());
}

#[test]
fn test_export_then_import_restores_links() {
    let mut annotator = Annotator::default();
    annotator.add_feature(Feature::rect_box("b", Vec2::ZERO, 100.0, 50.0));
    annotator.add_collection(FeatureCollection {
        features: vec![linked_arrow(
            "a",
            Vec2::new(-50.0, 0.0),
            Vec2::new(100.0, 25.0),
            [
                None,
                Some(LinkRecord {
                    target: "b".to_string(),
                    kind: TargetKind::Box,
                    magnet: Vec2::new(0.5, 0.0),
                }),
            ],
        )],
    });
    let exported = annotator.export_collection();

    let mut fresh = Annotator::default();
    assert_eq!(fresh.add_collection(exported), 2);
    let link = fresh.links().get_arrow_link("a", Side::End).unwrap();
    assert_eq!(link.target, "b");
    assert_eq!(link.magnet, Vec2::new(0.5, 0.0));
    // Arrow listed before its target still links
    let mut reversed = fresh.export_collection();
    reversed.features.reverse();
    let mut third = Annotator::default();
    third.add_collection(reversed);
    assert!(third.links().get_arrow_link("a", Side::End).is_some());
}

#[test]
fn test_update_feature_carries_linked_arrow() {
    let mut annotator = Annotator::default();
    annotator.add_feature(Feature::rect_box("b", Vec2::ZERO, 100.0, 50.0));
    annotator.add_feature(linked_arrow(
        "a",
        Vec2::new(-50.0, 0.0),
        Vec2::new(100.0, 25.0),
        [
            None,
            Some(LinkRecord {
                target: "b".to_string(),
                kind: TargetKind::Box,
                magnet: Vec2::new(0.5, 0.0),
            }),
        ],
    ));
    let before = annotator.store().undo_count();

    assert!(annotator.update_feature("b", |f| f.geometry.translate(Vec2::new(30.0, -10.0))));

    assert_eq!(arrow_of(&annotator, "a").end, Vec2::new(130.0, 15.0));
    assert_eq!(arrow_of(&annotator, "a").start, Vec2::new(-50.0, 0.0));
    assert_eq!(annotator.store().undo_count(), before + 1);
    // Index follows the committed move
    assert_eq!(
        annotator.index().bounds("b").unwrap().min,
        Vec2::new(30.0, -10.0)
    );
    assert!(!annotator.update_feature("ghost", |_| {}));
}

#[test]
fn test_zoom_resyncs_arrows_on_fixed_size_text() {
    let mut annotator = Annotator::default();
    let mut text = Feature::text("t", Vec2::ZERO, 100.0, 40.0, "label");
    if let Some(rect) = text.geometry.rect_mut() {
        rect.fixed_size = true;
    }
    annotator.add_feature(text);
    annotator.add_feature(linked_arrow(
        "a",
        Vec2::new(200.0, 20.0),
        Vec2::new(100.0, 20.0),
        [
            None,
            Some(LinkRecord {
                target: "t".to_string(),
                kind: TargetKind::Text,
                magnet: Vec2::new(0.5, 0.0),
            }),
        ],
    ));

    let t0 = Instant::now();
    annotator.host_mut().set_view(ViewState {
        zoom: 2.0,
        ..Default::default()
    });
    assert_eq!(annotator.notify_view_changed(t0), 1);
    assert_eq!(annotator.index().bounds("t").unwrap().max.x, 75.0);

    annotator.tick(t0 + Duration::from_millis(200));
    assert_eq!(arrow_of(&annotator, "a").end, Vec2::new(75.0, 20.0));

    // Pan only: nothing to resync
    annotator.host_mut().set_view(ViewState {
        zoom: 2.0,
        pan: Vec2::new(10.0, 0.0),
        ..Default::default()
    });
    assert_eq!(annotator.notify_view_changed(t0), 0);
}

#[test]
fn test_remove_feature_honors_comment_invariant() {
    let mut annotator = Annotator::default();
    annotator.add_feature(Feature::comment("c", Vec2::new(200.0, 0.0), 100.0, 50.0));
    annotator.add_feature(linked_arrow(
        "a",
        Vec2::new(200.0, 0.0),
        Vec2::ZERO,
        [
            Some(LinkRecord {
                target: "c".to_string(),
                kind: TargetKind::Comment,
                magnet: Vec2::ZERO,
            }),
            None,
        ],
    ));
    assert_eq!(annotator.comment_arrows("c"), vec!["a".to_string()]);

    assert!(!annotator.remove_feature("a"));
    assert!(!annotator.delete_arrow_from_comment("c", "a"));
    assert!(annotator.store().contains("a"));

    assert!(annotator.remove_feature("c"));
    assert!(annotator.store().is_empty());
    assert!(annotator.index().is_empty());

    assert!(annotator.undo());
    assert_eq!(annotator.store().len(), 2);
    assert_eq!(annotator.links().len(), 1);
    assert_eq!(annotator.index().len(), 2);
}

#[test]
fn test_orphaned_comments_are_reported_not_repaired() {
    let mut annotator = Annotator::default();
    annotator.add_collection(FeatureCollection {
        features: vec![Feature::comment("c", Vec2::ZERO, 100.0, 50.0)],
    });
    assert_eq!(annotator.find_orphaned_comments(), vec!["c".to_string()]);
    assert!(annotator.store().contains("c"));
}

#[test]
fn test_draw_through_facade_updates_index() {
    let mut annotator = Annotator::default();
    let sub = annotator.subscribe();
    annotator.enable_box();
    annotator.pointer_down(Vec2::new(10.0, 10.0), Modifiers::NONE);
    annotator.pointer_move(Vec2::new(60.0, 40.0));
    // Live drawing stays out of the index
    assert!(annotator.index().is_empty());
    let id = annotator.pointer_up(Vec2::new(60.0, 40.0)).unwrap();

    assert!(annotator.index().contains(&id));
    assert_eq!(annotator.features_in(Rect::new(0.0, 0.0, 20.0, 20.0)), vec![id.clone()]);
    let events = annotator.drain_events(sub);
    assert!(events.contains(&AnnotationEvent::Added(id.clone())));
    assert!(events.contains(&AnnotationEvent::DrawingComplete(id)));
    assert!(annotator.unsubscribe(sub));
}

#[test]
fn test_start_tool_draws_immediately() {
    let mut annotator = Annotator::default();
    annotator.start_polygon(Vec2::ZERO);
    annotator.pointer_up(Vec2::ZERO);
    annotator.pointer_down(Vec2::new(100.0, 0.0), Modifiers::NONE);
    annotator.pointer_up(Vec2::new(100.0, 0.0));
    annotator.pointer_down(Vec2::new(50.0, 80.0), Modifiers::NONE);
    annotator.pointer_up(Vec2::new(50.0, 80.0));
    let id = annotator.finish_drawing().unwrap();
    let bounds = annotator.index().bounds(&id).unwrap();
    assert_eq!(bounds.min.y, 0.0 - crate::constants::DEFAULT_STROKE_WIDTH / 2.0);
    assert!(!annotator.is_busy());
}

#[test]
fn test_cache_feed_is_private() {
    let mut annotator = Annotator::default();
    let feed = annotator.cache_feed;
    assert!(!annotator.unsubscribe(feed));
    annotator.add_feature(Feature::rect_box("b", Vec2::ZERO, 10.0, 10.0));
    assert!(annotator.drain_events(feed).is_empty());
    assert!(annotator.index().contains("b"));
}

#[test]
fn test_save_and_load_replace_content() {
    let path = std::env::temp_dir().join("graph_annotations_facade_roundtrip.json");
    let mut annotator = Annotator::default();
    annotator.add_feature(Feature::rect_box("b", Vec2::ZERO, 10.0, 10.0));
    annotator.save_collection(&path).unwrap();

    let mut other = Annotator::default();
    other.add_feature(Feature::arrow("x", Vec2::ZERO, Vec2::X * 20.0));
    assert_eq!(other.load_collection(&path).unwrap(), 1);
    assert!(other.store().contains("b"));
    assert!(!other.store().contains("x"));
    assert!(!other.can_undo());
    assert!(other.index().contains("b"));
    let _ = std::fs::remove_file(&path);
}

/// Arrow `a` from n1 to n2 and an unrelated box `b` centered on (230, 0).
fn box_beside_linked_arrow() -> Annotator {
    let mut annotator = with_two_nodes();
    annotator.add_collection(FeatureCollection {
        features: vec![
            linked_arrow(
                "a",
                Vec2::ZERO,
                Vec2::new(90.0, 0.0),
                [node_link("n1", Vec2::ZERO), node_link("n2", Vec2::NEG_X)],
            ),
            Feature::rect_box("b", Vec2::new(200.0, -20.0), 60.0, 40.0),
        ],
    });
    annotator
}

/// Press on `b`, drag it, and move n1 while the drag is in flight.
fn drag_box_while_node_moves(annotator: &mut Annotator, t0: Instant) {
    annotator.pointer_down(Vec2::new(230.0, 0.0), Modifiers::NONE);
    annotator.pointer_move(Vec2::new(250.0, 10.0));
    annotator.host_mut().set_node("n1", Vec2::new(0.0, 50.0), 10.0);
    assert_eq!(annotator.notify_nodes_changed(&["n1".to_string()], t0), 1);
    assert!(annotator.store().is_dragging());
}

fn box_position(annotator: &Annotator) -> Vec2 {
    annotator.get_feature("b").unwrap().geometry.rect().unwrap().position
}

#[test]
fn test_node_move_during_box_drag() {
    let mut annotator = box_beside_linked_arrow();
    let before = annotator.store().undo_count();
    let t0 = Instant::now();
    drag_box_while_node_moves(&mut annotator, t0);

    // Due while the box is still held
    assert!(annotator.tick(t0 + Duration::from_millis(120)).is_empty());
    assert!(annotator.links().has_pending_resync());

    annotator.pointer_up(Vec2::new(250.0, 10.0));
    assert!(!annotator.store().is_dragging());
    assert_eq!(box_position(&annotator), Vec2::new(220.0, -10.0));
    assert_eq!(annotator.store().undo_count(), before + 1);
    assert_eq!(arrow_of(&annotator, "a").start, Vec2::ZERO);

    assert_eq!(annotator.tick(t0 + Duration::from_millis(250)), vec!["a".to_string()]);
    assert_eq!(arrow_of(&annotator, "a").start, Vec2::new(0.0, 50.0));
    assert_eq!(annotator.store().undo_count(), before + 2);
    assert!(!annotator.links().has_pending_resync());
}

#[test]
fn test_escape_during_drag_keeps_pending_resync() {
    let mut annotator = box_beside_linked_arrow();
    let before = annotator.store().undo_count();
    let t0 = Instant::now();
    drag_box_while_node_moves(&mut annotator, t0);

    assert_eq!(annotator.key_down(Key::Escape, Modifiers::NONE), KeyOutcome::Cancelled);
    assert!(!annotator.store().is_dragging());
    assert_eq!(box_position(&annotator), Vec2::new(200.0, -20.0));
    let live = annotator.get_merged_feature("a").unwrap().geometry.as_arrow().unwrap();
    assert_eq!(live.start, Vec2::new(0.0, 50.0));

    assert_eq!(annotator.tick(t0 + Duration::from_millis(150)), vec!["a".to_string()]);
    assert_eq!(arrow_of(&annotator, "a").start, Vec2::new(0.0, 50.0));
    assert_eq!(annotator.store().undo_count(), before + 1);
}

#[test]
fn test_undo_during_drag_commits_resync_first() {
    let mut annotator = box_beside_linked_arrow();
    annotator.add_feature(Feature::rect_box("c", Vec2::new(-200.0, 0.0), 20.0, 20.0));
    let before = annotator.store().undo_count();
    let t0 = Instant::now();
    drag_box_while_node_moves(&mut annotator, t0);

    // Undo takes back the resync, not the earlier add
    assert!(annotator.undo());
    assert!(!annotator.is_busy());
    assert!(annotator.store().contains("c"));
    assert_eq!(box_position(&annotator), Vec2::new(200.0, -20.0));
    assert_eq!(arrow_of(&annotator, "a").start, Vec2::ZERO);
    assert_eq!(annotator.store().undo_count(), before);
    assert!(!annotator.links().has_pending_resync());

    assert!(annotator.redo());
    assert_eq!(arrow_of(&annotator, "a").start, Vec2::new(0.0, 50.0));
}

#[test]
fn test_large_import_overflowing_cache_feed_keeps_links() {
    let mut annotator = with_two_nodes();
    let mut features = vec![linked_arrow(
        "a",
        Vec2::ZERO,
        Vec2::new(90.0, 0.0),
        [node_link("n1", Vec2::ZERO), None],
    )];
    let count = crate::constants::EVENT_QUEUE_CAPACITY + 50;
    features.extend((0..count).map(|n| {
        Feature::rect_box(format!("b{n}"), Vec2::new(n as f32 * 20.0, 200.0), 10.0, 10.0)
    }));

    assert_eq!(annotator.add_collection(FeatureCollection { features }), count + 1);
    assert!(annotator.links().get_arrow_link("a", Side::Start).is_some());
    assert!(annotator.index().contains("a"));
    assert_eq!(annotator.index().len(), count + 1);
}
