//! Seam to the host graph visualization.
//!
//! The core never owns graph nodes or the camera. It reads them through
//! [`GraphHost`]; [`GraphSnapshot`] is the stock implementation the Bevy
//! plugin refreshes every frame and tests build by hand.

use bevy::math::{Rect, Vec2};
use indexmap::IndexMap;

use crate::features::NodeId;
use crate::geometry::rotate;

/// Camera state: `screen = rotate(graph, rotation) * zoom + pan`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub pan: Vec2,
    pub zoom: f32,
    pub rotation: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
            rotation: 0.0,
        }
    }
}

impl ViewState {
    pub fn graph_to_screen(&self, point: Vec2) -> Vec2 {
        rotate(point, self.rotation) * self.zoom + self.pan
    }

    pub fn screen_to_graph(&self, point: Vec2) -> Vec2 {
        rotate((point - self.pan) / self.zoom.max(f32::EPSILON), -self.rotation)
    }

    /// Convert a screen-pixel distance into graph units.
    pub fn screen_distance(&self, pixels: f32) -> f32 {
        pixels / self.zoom.max(f32::EPSILON)
    }
}

/// Position and radius of a graph node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeInfo {
    pub position: Vec2,
    pub radius: f32,
}

pub trait GraphHost {
    fn node(&self, id: &str) -> Option<NodeInfo>;

    /// Ids of nodes whose disc overlaps `rect`.
    fn nodes_in_rect(&self, rect: Rect) -> Vec<NodeId>;

    fn view(&self) -> ViewState;

    fn has_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    fn zoom(&self) -> f32 {
        self.view().zoom
    }

    fn rotation(&self) -> f32 {
        self.view().rotation
    }

    fn screen_to_graph(&self, point: Vec2) -> Vec2 {
        self.view().screen_to_graph(point)
    }

    fn graph_to_screen(&self, point: Vec2) -> Vec2 {
        self.view().graph_to_screen(point)
    }
}

/// In-memory node table plus view state.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    nodes: IndexMap<NodeId, NodeInfo>,
    view: ViewState,
}

impl GraphSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or move a node. Returns true when anything changed.
    pub fn set_node(&mut self, id: impl Into<NodeId>, position: Vec2, radius: f32) -> bool {
        let info = NodeInfo { position, radius };
        self.nodes.insert(id.into(), info) != Some(info)
    }

    pub fn remove_node(&mut self, id: &str) -> bool {
        self.nodes.shift_remove(id).is_some()
    }

    /// Returns true when the view actually changed.
    pub fn set_view(&mut self, view: ViewState) -> bool {
        let changed = self.view != view;
        self.view = view;
        changed
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }
}

impl GraphHost for GraphSnapshot {
    fn node(&self, id: &str) -> Option<NodeInfo> {
        self.nodes.get(id).copied()
    }

    fn nodes_in_rect(&self, rect: Rect) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| {
                let disc = Rect::from_center_half_size(n.position, Vec2::splat(n.radius));
                !disc.intersect(rect).is_empty() || rect.contains(n.position)
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn view(&self) -> ViewState {
        self.view
    }
}
