//! Annotation feature model.
//!
//! A [`Feature`] is one annotation: an id, a [`Geometry`] (tagged by kind) and a
//! [`Style`]. All coordinates are graph space. Arrows carry a serializable mirror
//! of their links ([`LinkRecord`]) so an exported collection is self-describing.
//!
//! ## Kinds
//!
//! - [`ArrowShape`]: two-point line, optionally linked at either end
//! - [`RectShape`]: plain box, follows graph rotation
//! - [`TextShape`]: screen-aligned box with text content
//! - [`PolygonShape`]: closed ring, optionally Catmull-Rom smoothed
//! - [`CommentShape`]: screen-aligned call-out, collapsed to an icon or expanded

mod frame;
mod style;

#[cfg(test)]
mod tests;

use bevy::math::{Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::constants::{COMMENT_ICON_RADIUS, CURVE_SAMPLES_PER_SEGMENT};
use crate::geometry::{bounds_of, catmull_rom_closed, open_ring, rotated_rect_bounds};
use crate::host::ViewState;

pub use frame::{BOX_MAGNETS, RectFrame};
pub use style::{Style, StylePatch};

pub type FeatureId = String;
pub type NodeId = String;

/// Discriminant of a [`Geometry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Arrow,
    Box,
    Text,
    Polygon,
    Comment,
}

impl FeatureType {
    pub fn id_prefix(&self) -> &'static str {
        match self {
            FeatureType::Arrow => "arrow",
            FeatureType::Box => "box",
            FeatureType::Text => "text",
            FeatureType::Polygon => "polygon",
            FeatureType::Comment => "comment",
        }
    }
}

/// Which end of an arrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Start,
    End,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Start, Side::End];

    pub fn opposite(self) -> Side {
        match self {
            Side::Start => Side::End,
            Side::End => Side::Start,
        }
    }
}

/// What an arrow end may be linked to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Node,
    Text,
    Box,
    Polygon,
    Comment,
}

impl TargetKind {
    /// Target kind for an annotation feature; arrows are never link targets.
    pub fn for_feature(kind: FeatureType) -> Option<TargetKind> {
        match kind {
            FeatureType::Arrow => None,
            FeatureType::Box => Some(TargetKind::Box),
            FeatureType::Text => Some(TargetKind::Text),
            FeatureType::Polygon => Some(TargetKind::Polygon),
            FeatureType::Comment => Some(TargetKind::Comment),
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, TargetKind::Node)
    }
}

/// Serializable mirror of one arrow-end link, stored on the arrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub target: String,
    pub kind: TargetKind,
    /// Target-relative anchor (fraction of size, or unit vector for nodes)
    pub magnet: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowShape {
    pub start: Vec2,
    pub end: Vec2,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_link: Option<LinkRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_link: Option<LinkRecord>,
}

impl ArrowShape {
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self {
            start,
            end,
            start_link: None,
            end_link: None,
        }
    }

    pub fn endpoint(&self, side: Side) -> Vec2 {
        match side {
            Side::Start => self.start,
            Side::End => self.end,
        }
    }

    pub fn set_endpoint(&mut self, side: Side, point: Vec2) {
        match side {
            Side::Start => self.start = point,
            Side::End => self.end = point,
        }
    }

    pub fn link(&self, side: Side) -> Option<&LinkRecord> {
        match side {
            Side::Start => self.start_link.as_ref(),
            Side::End => self.end_link.as_ref(),
        }
    }

    pub fn set_link(&mut self, side: Side, link: Option<LinkRecord>) {
        match side {
            Side::Start => self.start_link = link,
            Side::End => self.end_link = link,
        }
    }

    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }
}

/// Axis-aligned region; `position` is the top-left corner at unit zoom.
///
/// Fixed-size regions keep `width`/`height` in screen pixels and scale around
/// their center in graph space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectShape {
    pub position: Vec2,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub fixed_size: bool,
}

impl RectShape {
    pub fn new(position: Vec2, width: f32, height: f32) -> Self {
        Self {
            position,
            width,
            height,
            fixed_size: false,
        }
    }

    /// Build from a center point and a graph-space size.
    pub fn centered(center: Vec2, width: f32, height: f32) -> Self {
        Self::new(center - Vec2::new(width, height) / 2.0, width, height)
    }

    pub fn center(&self) -> Vec2 {
        self.position + self.stored_size() / 2.0
    }

    pub fn stored_size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Size in graph units at the given zoom.
    pub fn graph_size(&self, zoom: f32) -> Vec2 {
        if self.fixed_size && zoom > 0.0 {
            self.stored_size() / zoom
        } else {
            self.stored_size()
        }
    }

    /// Re-centre on `center` with a new graph-space size, converting back to
    /// stored units for fixed-size regions.
    pub fn set_graph_frame(&mut self, center: Vec2, graph_size: Vec2, zoom: f32) {
        let stored = if self.fixed_size && zoom > 0.0 {
            graph_size * zoom
        } else {
            graph_size
        };
        self.width = stored.x;
        self.height = stored.y;
        self.position = center - stored / 2.0;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextShape {
    pub rect: RectShape,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonShape {
    /// Closed ring: the first point is repeated as the last
    pub ring: Vec<Vec2>,
    #[serde(default)]
    pub smooth: bool,
}

impl PolygonShape {
    pub fn vertices(&self) -> &[Vec2] {
        open_ring(&self.ring)
    }

    /// Whether edges are rendered (and snapped) as a Catmull-Rom curve.
    pub fn uses_curve(&self) -> bool {
        self.smooth && self.vertices().len() >= 4
    }

    /// Axis-aligned frame around the vertices; polygon magnets are relative to it.
    pub fn bounding_frame(&self) -> RectFrame {
        let bounds =
            bounds_of(self.vertices()).unwrap_or(Rect::from_corners(Vec2::ZERO, Vec2::ZERO));
        RectFrame::new(bounds.center(), bounds.size(), 0.0)
    }

    /// The outline used for snapping and hit testing, as a closed polyline.
    pub fn outline(&self) -> Vec<Vec2> {
        if self.uses_curve() {
            catmull_rom_closed(&self.ring, CURVE_SAMPLES_PER_SEGMENT)
        } else {
            self.ring.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentShape {
    pub rect: RectShape,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub expanded: bool,
}

impl CommentShape {
    pub fn anchor(&self) -> Vec2 {
        self.rect.center()
    }
}

/// Type-specific coordinates of a feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    Arrow(ArrowShape),
    Box(RectShape),
    Text(TextShape),
    Polygon(PolygonShape),
    Comment(CommentShape),
}

impl Geometry {
    pub fn kind(&self) -> FeatureType {
        match self {
            Geometry::Arrow(_) => FeatureType::Arrow,
            Geometry::Box(_) => FeatureType::Box,
            Geometry::Text(_) => FeatureType::Text,
            Geometry::Polygon(_) => FeatureType::Polygon,
            Geometry::Comment(_) => FeatureType::Comment,
        }
    }

    /// Text and comments are drawn counter-rotated against the view.
    pub fn is_screen_aligned(&self) -> bool {
        matches!(self, Geometry::Text(_) | Geometry::Comment(_))
    }

    /// Whether this geometry's graph-space footprint depends on zoom or rotation.
    pub fn is_view_dependent(&self) -> bool {
        match self {
            Geometry::Text(_) | Geometry::Comment(_) => true,
            Geometry::Box(r) => r.fixed_size,
            Geometry::Arrow(_) | Geometry::Polygon(_) => false,
        }
    }

    pub fn rect(&self) -> Option<&RectShape> {
        match self {
            Geometry::Box(r) => Some(r),
            Geometry::Text(t) => Some(&t.rect),
            Geometry::Comment(c) => Some(&c.rect),
            Geometry::Arrow(_) | Geometry::Polygon(_) => None,
        }
    }

    pub fn rect_mut(&mut self) -> Option<&mut RectShape> {
        match self {
            Geometry::Box(r) => Some(r),
            Geometry::Text(t) => Some(&mut t.rect),
            Geometry::Comment(c) => Some(&mut c.rect),
            Geometry::Arrow(_) | Geometry::Polygon(_) => None,
        }
    }

    /// Oriented frame for box-like geometry under the given view.
    ///
    /// A collapsed comment is framed by its icon square.
    pub fn frame(&self, view: &ViewState) -> Option<RectFrame> {
        let angle = if self.is_screen_aligned() {
            -view.rotation
        } else {
            0.0
        };
        match self {
            Geometry::Comment(c) if !c.expanded => {
                let side = 2.0 * COMMENT_ICON_RADIUS / view.zoom.max(f32::EPSILON);
                Some(RectFrame::new(c.anchor(), Vec2::splat(side), angle))
            }
            _ => self
                .rect()
                .map(|r| RectFrame::new(r.center(), r.graph_size(view.zoom), angle)),
        }
    }

    /// Conservative axis-aligned bounds in graph space.
    pub fn bounds(&self, view: &ViewState, stroke_width: f32) -> Rect {
        match self {
            Geometry::Arrow(a) => Rect::from_corners(a.start, a.end).inflate(stroke_width / 2.0),
            Geometry::Polygon(p) => bounds_of(&p.outline())
                .unwrap_or(Rect::from_corners(Vec2::ZERO, Vec2::ZERO))
                .inflate(stroke_width / 2.0),
            Geometry::Box(_) | Geometry::Text(_) | Geometry::Comment(_) => self
                .frame(view)
                .map(|f| rotated_rect_bounds(f.center, f.size, f.angle))
                .unwrap_or(Rect::from_corners(Vec2::ZERO, Vec2::ZERO)),
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        match self {
            Geometry::Arrow(a) => {
                a.start += delta;
                a.end += delta;
            }
            Geometry::Box(r) => r.position += delta,
            Geometry::Text(t) => t.rect.position += delta,
            Geometry::Comment(c) => c.rect.position += delta,
            Geometry::Polygon(p) => p.ring.iter_mut().for_each(|v| *v += delta),
        }
    }

    pub fn as_arrow(&self) -> Option<&ArrowShape> {
        match self {
            Geometry::Arrow(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_arrow_mut(&mut self) -> Option<&mut ArrowShape> {
        match self {
            Geometry::Arrow(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_polygon(&self) -> Option<&PolygonShape> {
        match self {
            Geometry::Polygon(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_polygon_mut(&mut self) -> Option<&mut PolygonShape> {
        match self {
            Geometry::Polygon(p) => Some(p),
            _ => None,
        }
    }
}

/// One annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Geometry,
    #[serde(default)]
    pub style: Style,
}

impl Feature {
    pub fn new(id: impl Into<FeatureId>, geometry: Geometry) -> Self {
        Self {
            id: id.into(),
            geometry,
            style: Style::default(),
        }
    }

    pub fn arrow(id: impl Into<FeatureId>, start: Vec2, end: Vec2) -> Self {
        Self::new(id, Geometry::Arrow(ArrowShape::new(start, end)))
    }

    pub fn rect_box(id: impl Into<FeatureId>, position: Vec2, width: f32, height: f32) -> Self {
        Self::new(id, Geometry::Box(RectShape::new(position, width, height)))
    }

    pub fn text(
        id: impl Into<FeatureId>,
        position: Vec2,
        width: f32,
        height: f32,
        content: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            Geometry::Text(TextShape {
                rect: RectShape::new(position, width, height),
                content: content.into(),
            }),
        )
    }

    /// Polygon from its vertices; the ring is closed automatically.
    pub fn polygon(id: impl Into<FeatureId>, vertices: &[Vec2]) -> Self {
        Self::new(
            id,
            Geometry::Polygon(PolygonShape {
                ring: crate::geometry::close_ring(vertices),
                smooth: false,
            }),
        )
    }

    pub fn comment(id: impl Into<FeatureId>, anchor: Vec2, width: f32, height: f32) -> Self {
        Self::new(
            id,
            Geometry::Comment(CommentShape {
                rect: RectShape::centered(anchor, width, height),
                content: String::new(),
                expanded: true,
            }),
        )
    }

    pub fn kind(&self) -> FeatureType {
        self.geometry.kind()
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn bounds(&self, view: &ViewState) -> Rect {
        self.geometry.bounds(view, self.style.stroke_width)
    }
}

/// Flat, serializable set of features; the sole round-trip format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}
