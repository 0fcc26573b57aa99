//! Exact (narrow-phase) point-in-feature tests.
//!
//! The spatial index only narrows candidates down by bounding box; these
//! predicates decide whether the pointer really is on a feature. `margin` is
//! in graph units.

use bevy::math::Vec2;

use crate::constants::COMMENT_ICON_RADIUS;
use crate::features::{ArrowShape, CommentShape, Feature, Geometry, PolygonShape, RectFrame};
use crate::geometry::{closest_point_on_polyline, point_in_polygon};
use crate::host::ViewState;

/// Point lies over the stroke: its projection falls within the segment and
/// the perpendicular distance is under half the stroke width plus margin.
pub fn hit_arrow(point: Vec2, arrow: &ArrowShape, stroke_width: f32, margin: f32) -> bool {
    let seg = arrow.end - arrow.start;
    let len = seg.length();
    let reach = stroke_width / 2.0 + margin;
    if len < f32::EPSILON {
        return point.distance(arrow.start) <= reach;
    }
    let rel = point - arrow.start;
    let along = rel.dot(seg) / len;
    if !(0.0..=len).contains(&along) {
        return false;
    }
    let perpendicular = rel.perp_dot(seg).abs() / len;
    perpendicular < reach
}

/// Point, taken into the box's local frame, falls inside the margin-expanded box.
pub fn hit_rect(point: Vec2, frame: &RectFrame, margin: f32) -> bool {
    frame.contains(point, margin)
}

/// Inside the ring, or within `margin` of its (possibly smoothed) outline.
pub fn hit_polygon(point: Vec2, polygon: &PolygonShape, margin: f32) -> bool {
    let outline = polygon.outline();
    if point_in_polygon(point, &outline) {
        return true;
    }
    closest_point_on_polyline(point, &outline)
        .map(|(_, dist)| dist <= margin)
        .unwrap_or(false)
}

/// Collapsed comments are hit on their icon square; expanded ones like text.
pub fn hit_comment(point: Vec2, comment: &CommentShape, view: &ViewState, margin: f32) -> bool {
    if comment.expanded {
        let frame = RectFrame::new(
            comment.rect.center(),
            comment.rect.graph_size(view.zoom),
            -view.rotation,
        );
        return hit_rect(point, &frame, margin);
    }
    let reach = view.screen_distance(COMMENT_ICON_RADIUS) + margin;
    let d = (point - comment.anchor()).abs();
    d.x <= reach && d.y <= reach
}

/// Dispatch on the feature kind.
pub fn hit_test(feature: &Feature, point: Vec2, margin: f32, view: &ViewState) -> bool {
    match &feature.geometry {
        Geometry::Arrow(arrow) => hit_arrow(point, arrow, feature.style.stroke_width, margin),
        Geometry::Polygon(polygon) => hit_polygon(point, polygon, margin),
        Geometry::Comment(comment) => hit_comment(point, comment, view, margin),
        Geometry::Box(_) | Geometry::Text(_) => feature
            .geometry
            .frame(view)
            .map(|frame| hit_rect(point, &frame, margin))
            .unwrap_or(false),
    }
}
