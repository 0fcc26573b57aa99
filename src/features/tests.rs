//! Unit tests for the feature model.

use bevy::math::Vec2;

use super::*;
use crate::host::ViewState;

#[test]
fn test_arrow_serializes_with_type_tag_and_link_mirror() {
    let mut feature = Feature::arrow("arrow-1", Vec2::ZERO, Vec2::new(10.0, 0.0));
    if let Some(arrow) = feature.geometry.as_arrow_mut() {
        arrow.set_link(
            Side::End,
            Some(LinkRecord {
                target: "n1".to_string(),
                kind: TargetKind::Node,
                magnet: Vec2::new(-1.0, 0.0),
            }),
        );
    }

    let json = serde_json::to_value(&feature).unwrap();
    assert_eq!(json["geometry"]["type"], "arrow");
    assert_eq!(json["geometry"]["end_link"]["target"], "n1");
    assert!(json["geometry"].get("start_link").is_none());

    let parsed: Feature = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, feature);
}

#[test]
fn test_missing_style_uses_defaults() {
    let json = r#"{"id":"b","geometry":
        {"type":"box","position":[0.0,0.0],"width":10.0,"height":5.0}}"#;
    let parsed: Feature = serde_json::from_str(json).unwrap();
    assert_eq!(parsed.style, Style::default());
    assert_eq!(parsed.kind(), FeatureType::Box);
}

#[test]
fn test_fixed_size_rect_scales_around_center() {
    let mut rect = RectShape::new(Vec2::new(0.0, 0.0), 40.0, 20.0);
    rect.fixed_size = true;
    assert_eq!(rect.graph_size(2.0), Vec2::new(20.0, 10.0));
    assert_eq!(rect.center(), Vec2::new(20.0, 10.0));

    rect.set_graph_frame(Vec2::new(20.0, 10.0), Vec2::new(30.0, 10.0), 2.0);
    assert_eq!(rect.width, 60.0);
    assert_eq!(rect.center(), Vec2::new(20.0, 10.0));
}

#[test]
fn test_text_frame_counter_rotates() {
    let text = Feature::text("t", Vec2::ZERO, 20.0, 10.0, "hi");
    let view = ViewState {
        rotation: 0.5,
        ..Default::default()
    };
    let frame = text.geometry.frame(&view).unwrap();
    assert_eq!(frame.angle, -0.5);

    let boxed = Feature::rect_box("b", Vec2::ZERO, 20.0, 10.0);
    assert_eq!(boxed.geometry.frame(&view).unwrap().angle, 0.0);
}

#[test]
fn test_frame_magnet_round_trip() {
    let frame = RectFrame::new(Vec2::new(5.0, 5.0), Vec2::new(10.0, 20.0), 0.3);
    let p = frame.magnet_point(Vec2::new(0.5, 0.0));
    let m = frame.magnet_for(p);
    assert!((m - Vec2::new(0.5, 0.0)).length() < 1e-5);
}

#[test]
fn test_collapsed_comment_frame_is_icon_sized() {
    let mut comment = Feature::comment("c", Vec2::new(50.0, 50.0), 160.0, 80.0);
    if let Geometry::Comment(c) = &mut comment.geometry {
        c.expanded = false;
    }
    let view = ViewState {
        zoom: 2.0,
        ..Default::default()
    };
    let frame = comment.geometry.frame(&view).unwrap();
    assert_eq!(frame.center, Vec2::new(50.0, 50.0));
    assert_eq!(frame.size, Vec2::splat(crate::constants::COMMENT_ICON_RADIUS));
}

#[test]
fn test_polygon_constructor_closes_ring() {
    let polygon = Feature::polygon(
        "p",
        &[Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(5.0, 8.0)],
    );
    let shape = polygon.geometry.as_polygon().unwrap();
    assert_eq!(shape.ring.len(), 4);
    assert_eq!(shape.ring.first(), shape.ring.last());
    assert_eq!(shape.vertices().len(), 3);
    assert!(!shape.uses_curve());
}

#[test]
fn test_translate_moves_every_kind() {
    let delta = Vec2::new(3.0, -2.0);
    let mut arrow = Feature::arrow("a", Vec2::ZERO, Vec2::X);
    arrow.geometry.translate(delta);
    assert_eq!(arrow.geometry.as_arrow().unwrap().start, delta);

    let mut rect = Feature::rect_box("b", Vec2::ZERO, 1.0, 1.0);
    rect.geometry.translate(delta);
    assert_eq!(rect.geometry.rect().unwrap().position, delta);
}
