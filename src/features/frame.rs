//! Oriented rectangle used for box-like hit testing, snapping and resizing.

use bevy::math::Vec2;

use crate::geometry::rotate;

/// Corner and edge-midpoint magnets, as fractions of size from the center.
pub const BOX_MAGNETS: [Vec2; 8] = [
    Vec2::new(-0.5, -0.5),
    Vec2::new(0.0, -0.5),
    Vec2::new(0.5, -0.5),
    Vec2::new(0.5, 0.0),
    Vec2::new(0.5, 0.5),
    Vec2::new(0.0, 0.5),
    Vec2::new(-0.5, 0.5),
    Vec2::new(-0.5, 0.0),
];

/// A rectangle in graph space: center, graph-space size and orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectFrame {
    pub center: Vec2,
    pub size: Vec2,
    pub angle: f32,
}

impl RectFrame {
    pub fn new(center: Vec2, size: Vec2, angle: f32) -> Self {
        Self {
            center,
            size,
            angle,
        }
    }

    pub fn half_size(&self) -> Vec2 {
        self.size / 2.0
    }

    /// Graph point expressed in the frame's unrotated local coordinates.
    pub fn to_local(&self, point: Vec2) -> Vec2 {
        rotate(point - self.center, -self.angle)
    }

    pub fn to_graph(&self, local: Vec2) -> Vec2 {
        self.center + rotate(local, self.angle)
    }

    pub fn contains(&self, point: Vec2, margin: f32) -> bool {
        let local = self.to_local(point).abs();
        let half = self.half_size() + Vec2::splat(margin);
        local.x <= half.x && local.y <= half.y
    }

    /// Graph position of a size-relative magnet.
    pub fn magnet_point(&self, magnet: Vec2) -> Vec2 {
        self.to_graph(magnet * self.size)
    }

    /// Size-relative magnet for a graph point.
    pub fn magnet_for(&self, point: Vec2) -> Vec2 {
        let local = self.to_local(point);
        let ratio = |value: f32, extent: f32| {
            if extent.abs() > f32::EPSILON {
                value / extent
            } else {
                0.0
            }
        };
        Vec2::new(ratio(local.x, self.size.x), ratio(local.y, self.size.y))
    }

    /// Corners in graph space, clockwise from top-left (local -x,-y).
    pub fn corners(&self) -> [Vec2; 4] {
        let h = self.half_size();
        [
            Vec2::new(-h.x, -h.y),
            Vec2::new(h.x, -h.y),
            Vec2::new(h.x, h.y),
            Vec2::new(-h.x, h.y),
        ]
        .map(|c| self.to_graph(c))
    }

    pub fn edges(&self) -> [(Vec2, Vec2); 4] {
        let c = self.corners();
        [(c[0], c[1]), (c[1], c[2]), (c[2], c[3]), (c[3], c[0])]
    }
}
