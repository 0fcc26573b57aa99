//! Snapping engine: decides what a dragged arrow endpoint attaches to.
//!
//! Given a graph-space point and a search radius, at most one anchor is
//! returned, tried in fixed priority order: graph nodes, then text/box/comment
//! regions, then polygons. The first match wins.
//!
//! Every [`SnapResult`] carries a target-relative magnet rather than an
//! absolute position, so the link it produces survives the target moving,
//! resizing, or the view rotating and zooming.


use bevy::math::{Rect, Vec2};

use crate::features::{
    BOX_MAGNETS, Feature, FeatureId, Geometry, PolygonShape, RectFrame, TargetKind,
};
use crate::geometry::{closest_point_on_polyline, point_in_polygon};
use crate::host::GraphHost;
use crate::spatial::SpatialIndex;
use crate::store::FeatureStore;

/// Where a point snapped to
#[derive(Debug, Clone, PartialEq)]
pub struct SnapResult {
    pub target: String,
    pub kind: TargetKind,
    pub magnet: Vec2,
    /// Resolved graph-space anchor position
    pub point: Vec2,
}

/// Search distances, already converted to graph units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapRadius {
    pub radius: f32,
    /// Lower bound for box magnet hits
    pub min_handle_radius: f32,
}

impl SnapRadius {
    pub fn new(radius: f32, min_handle_radius: f32) -> Self {
        Self {
            radius,
            min_handle_radius,
        }
    }

    fn handle_radius(&self) -> f32 {
        self.radius.max(self.min_handle_radius)
    }
}

/// Read-only view over everything a snap may land on.
pub struct SnappingEngine<'a> {
    store: &'a FeatureStore,
    index: &'a SpatialIndex,
    host: &'a dyn GraphHost,
}

impl<'a> SnappingEngine<'a> {
    pub fn new(store: &'a FeatureStore, index: &'a SpatialIndex, host: &'a dyn GraphHost) -> Self {
        Self { store, index, host }
    }

    /// Best anchor for `point`, skipping any feature in `exclude`.
    pub fn snap(
        &self,
        point: Vec2,
        radius: SnapRadius,
        exclude: &[FeatureId],
    ) -> Option<SnapResult> {
        self.snap_to_node(point, radius.radius)
            .or_else(|| self.snap_to_regions(point, radius, exclude))
            .or_else(|| self.snap_to_polygons(point, radius.radius, exclude))
    }

    pub fn snap_to_node(&self, point: Vec2, radius: f32) -> Option<SnapResult> {
        let window = Rect::from_center_half_size(point, Vec2::splat(radius));
        let (id, node, dist) = self
            .host
            .nodes_in_rect(window)
            .into_iter()
            .filter_map(|id| {
                let node = self.host.node(&id)?;
                let dist = point.distance(node.position);
                (dist <= radius + node.radius).then_some((id, node, dist))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))?;

        let direction = (point - node.position).normalize_or_zero();
        let (magnet, anchor) = if dist < radius / 2.0 || direction == Vec2::ZERO {
            (Vec2::ZERO, node.position)
        } else {
            (direction, node.position + direction * node.radius)
        };
        Some(SnapResult {
            target: id,
            kind: TargetKind::Node,
            magnet,
            point: anchor,
        })
    }

    /// Text, box and comment regions.
    pub fn snap_to_regions(
        &self,
        point: Vec2,
        radius: SnapRadius,
        exclude: &[FeatureId],
    ) -> Option<SnapResult> {
        let view = self.host.view();
        let mut candidates: Vec<(&Feature, RectFrame)> = self
            .candidates(point, radius.handle_radius(), exclude)
            .into_iter()
            .filter_map(|feature| {
                let frame = match feature.geometry {
                    Geometry::Box(_) | Geometry::Text(_) | Geometry::Comment(_) => {
                        feature.geometry.frame(&view)?
                    }
                    _ => return None,
                };
                Some((feature, frame))
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.1.center
                .distance_squared(point)
                .total_cmp(&b.1.center.distance_squared(point))
        });

        candidates.into_iter().find_map(|(feature, frame)| {
            let kind = TargetKind::for_feature(feature.kind())?;
            snap_to_frame(point, &frame, radius).map(|(magnet, anchor)| SnapResult {
                target: feature.id.clone(),
                kind,
                magnet,
                point: anchor,
            })
        })
    }

    pub fn snap_to_polygons(
        &self,
        point: Vec2,
        radius: f32,
        exclude: &[FeatureId],
    ) -> Option<SnapResult> {
        let mut candidates: Vec<(&Feature, &PolygonShape)> = self
            .candidates(point, radius, exclude)
            .into_iter()
            .filter_map(|feature| feature.geometry.as_polygon().map(|p| (feature, p)))
            .collect();
        // Topmost first
        candidates.sort_by_key(|(feature, _)| std::cmp::Reverse(self.store.z_order(&feature.id)));

        candidates.into_iter().find_map(|(feature, polygon)| {
            snap_to_polygon(point, polygon, radius).map(|anchor| SnapResult {
                target: feature.id.clone(),
                kind: TargetKind::Polygon,
                magnet: polygon.bounding_frame().magnet_for(anchor),
                point: anchor,
            })
        })
    }

    /// Features near `point` as currently drawn, overlay edits included.
    fn candidates(&self, point: Vec2, radius: f32, exclude: &[FeatureId]) -> Vec<&'a Feature> {
        self.index
            .query_point(point, radius)
            .into_iter()
            .filter(|id| !exclude.contains(id))
            .filter_map(|id| self.store.get_merged_feature(&id))
            .collect()
    }
}

/// Magnet points first, then the nearest edge. A point inside the frame
/// always lands on its closest edge.
pub fn snap_to_frame(point: Vec2, frame: &RectFrame, radius: SnapRadius) -> Option<(Vec2, Vec2)> {
    let handle_radius = radius.handle_radius();
    if let Some(magnet) = BOX_MAGNETS
        .iter()
        .find(|m| frame.magnet_point(**m).distance(point) <= handle_radius)
    {
        return Some((*magnet, frame.magnet_point(*magnet)));
    }

    let (edge_point, dist) = closest_point_on_polyline(point, &frame_outline(frame))?;
    if dist <= radius.radius || frame.contains(point, 0.0) {
        return Some((frame.magnet_for(edge_point), edge_point));
    }
    None
}

/// Vertices, then the straight or smoothed outline; interior points fall back
/// to the closest outline point regardless of distance.
pub fn snap_to_polygon(point: Vec2, polygon: &PolygonShape, radius: f32) -> Option<Vec2> {
    if let Some(vertex) = polygon
        .vertices()
        .iter()
        .find(|v| v.distance(point) <= radius)
    {
        return Some(*vertex);
    }

    let outline = polygon.outline();
    let inside = point_in_polygon(point, &outline);
    let (anchor, dist) = if polygon.uses_curve() {
        outline
            .iter()
            .map(|p| (*p, p.distance(point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))?
    } else {
        closest_point_on_polyline(point, &outline)?
    };
    (inside || dist <= radius).then_some(anchor)
}

fn frame_outline(frame: &RectFrame) -> Vec<Vec2> {
    let corners = frame.corners();
    vec![corners[0], corners[1], corners[2], corners[3], corners[0]]
}
