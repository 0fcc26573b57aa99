//! Gizmo outlines for annotations and graph nodes.
//!
//! Outlines only; fills and typography belong to a real renderer. Everything
//! is drawn from merged features so in-flight drags show up immediately.

use bevy::gizmos::config::{GizmoConfigGroup, GizmoConfigStore};
use bevy::prelude::*;

use super::{graph_to_world, AnnotationLayer, GraphNode};
use crate::features::{Feature, Geometry, Side};
use crate::host::{GraphHost, ViewState};

const SELECTED_COLOR: Color = Color::srgb(0.2, 0.6, 1.0);
const HOVER_COLOR: Color = Color::srgb(1.0, 0.85, 0.3);
const LINK_COLOR: Color = Color::srgb(0.3, 0.9, 0.4);
const NODE_COLOR: Color = Color::srgb(0.7, 0.7, 0.75);

/// Custom gizmo group for annotation outlines
#[derive(Default, Reflect, GizmoConfigGroup)]
pub struct AnnotationGizmoGroup;

pub fn configure_annotation_gizmos(mut config_store: ResMut<GizmoConfigStore>) {
    let (config, _) = config_store.config_mut::<AnnotationGizmoGroup>();
    config.line.width = 2.0;
}

/// Closed outline of a feature in graph space; arrows have none.
pub fn outline(feature: &Feature, view: &ViewState) -> Vec<Vec2> {
    match &feature.geometry {
        Geometry::Arrow(_) => Vec::new(),
        Geometry::Polygon(polygon) => polygon.outline(),
        _ => feature
            .geometry
            .frame(view)
            .map(|frame| {
                let half = frame.size / 2.0;
                let mut corners: Vec<Vec2> = [
                    Vec2::new(-half.x, -half.y),
                    Vec2::new(half.x, -half.y),
                    Vec2::new(half.x, half.y),
                    Vec2::new(-half.x, half.y),
                ]
                .into_iter()
                .map(|corner| frame.to_graph(corner))
                .collect();
                corners.push(corners[0]);
                corners
            })
            .unwrap_or_default(),
    }
}

fn style_color(feature: &Feature) -> Color {
    let [r, g, b, a] = feature.style.stroke_color;
    Color::srgba(r, g, b, a)
}

pub fn draw_graph_nodes(
    nodes: Query<(&GraphNode, &GlobalTransform)>,
    mut gizmos: Gizmos<AnnotationGizmoGroup>,
) {
    for (node, transform) in nodes.iter() {
        gizmos.circle_2d(transform.translation().truncate(), node.radius, NODE_COLOR);
    }
}

pub fn draw_annotations(layer: Res<AnnotationLayer>, mut gizmos: Gizmos<AnnotationGizmoGroup>) {
    let view = layer.host().view();
    let marker = view.screen_distance(4.0);
    let hovered = layer.hovered();
    let to_world = |points: Vec<Vec2>| points.into_iter().map(graph_to_world);

    for feature in layer.store().merged_features() {
        let color = if layer.is_selected(&feature.id) {
            SELECTED_COLOR
        } else if hovered.contains(&feature.id) {
            HOVER_COLOR
        } else {
            style_color(feature)
        };

        match &feature.geometry {
            Geometry::Arrow(arrow) => {
                gizmos.arrow_2d(graph_to_world(arrow.start), graph_to_world(arrow.end), color);
                for side in Side::BOTH {
                    if arrow.link(side).is_some() {
                        gizmos.circle_2d(graph_to_world(arrow.endpoint(side)), marker, LINK_COLOR);
                    }
                }
            }
            _ => {
                gizmos.linestrip_2d(to_world(outline(feature, &view)), color);
            }
        }
    }
}
