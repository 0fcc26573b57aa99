//! Per-tool pointer state machines.
//!
//! Every handler moves between `Idle`, `Drawing` (a new feature) and `Editing`
//! (an existing one), and follows the same store discipline: open a live
//! session on pointer-down, write the overlay on every move, then commit or
//! cancel on release. A gesture is therefore one history entry or none.
//!
//! Handlers never touch the spatial index or the link index directly; they go
//! through the store and [`LinkRegistry`] operations.
//!
//! ## Module Structure
//!
//! - [`arrow`] - draw arrows, drag endpoints (re-snapping) or the whole body
//! - [`rect_tool`] - boxes and text; also edits comments
//! - [`polygon`] - click or freehand polygon drawing, vertex and body drags
//! - [`comment`] - composite: an arrow gesture that drops a comment

pub mod arrow;
pub mod comment;
pub mod polygon;
pub mod rect_tool;


use bevy::math::Vec2;

use crate::config::AnnotationConfig;
use crate::features::{FeatureId, FeatureType};
use crate::host::{GraphHost, ViewState};
use crate::links::LinkRegistry;
use crate::snapping::{SnapResult, SnappingEngine};
use crate::spatial::SpatialIndex;
use crate::store::FeatureStore;

pub use arrow::ArrowHandler;
pub use comment::CommentHandler;
pub use polygon::PolygonHandler;
pub use rect_tool::RectHandler;

/// Drawing tools a user can arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Arrow,
    Box,
    Text,
    Polygon,
    Comment,
}

impl Tool {
    pub fn display_name(&self) -> &'static str {
        match self {
            Tool::Arrow => "Arrow (A)",
            Tool::Box => "Box (B)",
            Tool::Text => "Text (T)",
            Tool::Polygon => "Polygon (P)",
            Tool::Comment => "Comment (C)",
        }
    }

    pub fn all() -> &'static [Tool] {
        &[Tool::Arrow, Tool::Box, Tool::Text, Tool::Polygon, Tool::Comment]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerState {
    #[default]
    Idle,
    Drawing,
    Editing,
}

/// Everything a handler may read or write during one pointer event.
pub struct ToolContext<'a> {
    pub store: &'a mut FeatureStore,
    pub index: &'a SpatialIndex,
    pub links: &'a mut LinkRegistry,
    pub host: &'a dyn GraphHost,
    pub config: &'a AnnotationConfig,
}

impl ToolContext<'_> {
    pub fn view(&self) -> ViewState {
        self.host.view()
    }

    pub fn zoom(&self) -> f32 {
        self.host.zoom()
    }

    /// Best snap anchor for `point`, ignoring `exclude`.
    pub fn snap(&self, point: Vec2, exclude: &[FeatureId]) -> Option<SnapResult> {
        SnappingEngine::new(self.store, self.index, self.host).snap(
            point,
            self.config.snap_radius_at(self.zoom()),
            exclude,
        )
    }

    pub fn handle_radius(&self) -> f32 {
        self.config.handle_radius_at(self.zoom())
    }

    pub fn click_tolerance(&self) -> f32 {
        self.config.click_tolerance_at(self.zoom())
    }

    /// Run `f` as one history entry.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.store.begin_batch();
        let result = f(self);
        self.store.end_batch();
        result
    }

    /// Move arrows linked to `targets` along with their live edits.
    pub fn drag_linked_arrows(&mut self, targets: &[FeatureId]) -> Vec<FeatureId> {
        self.links.resolve_live(self.store, self.host, targets)
    }
}

/// Common surface of every tool handler.
pub trait ToolHandler {
    fn state(&self) -> HandlerState;

    /// Pointer went down with this tool armed.
    fn start_drawing(&mut self, ctx: &mut ToolContext, point: Vec2);

    /// Pointer went down on an existing feature. Returns false if the feature
    /// cannot be edited by this handler.
    fn start_editing(&mut self, ctx: &mut ToolContext, id: &str, point: Vec2) -> bool;

    /// Further presses while drawing (polygon vertices).
    fn pointer_down(&mut self, _ctx: &mut ToolContext, _point: Vec2) {}

    fn pointer_move(&mut self, ctx: &mut ToolContext, point: Vec2);

    /// Returns the feature that was created or changed, if any.
    fn pointer_up(&mut self, ctx: &mut ToolContext, point: Vec2) -> Option<FeatureId>;

    /// Complete a multi-press drawing. Safe to call repeatedly.
    fn finish(&mut self, _ctx: &mut ToolContext) -> Option<FeatureId> {
        None
    }

    /// Abandon the gesture; drawn-but-uncommitted features vanish.
    fn cancel(&mut self, ctx: &mut ToolContext);
}

/// The handler currently receiving pointer events.
#[derive(Debug)]
pub enum ActiveHandler {
    Arrow(ArrowHandler),
    Rect(RectHandler),
    Polygon(PolygonHandler),
    Comment(CommentHandler),
}

impl ActiveHandler {
    pub fn for_tool(tool: Tool) -> Self {
        match tool {
            Tool::Arrow => ActiveHandler::Arrow(ArrowHandler::default()),
            Tool::Box => ActiveHandler::Rect(RectHandler::new(FeatureType::Box)),
            Tool::Text => ActiveHandler::Rect(RectHandler::new(FeatureType::Text)),
            Tool::Polygon => ActiveHandler::Polygon(PolygonHandler::default()),
            Tool::Comment => ActiveHandler::Comment(CommentHandler::default()),
        }
    }

    /// Handler that edits an existing feature of `kind`.
    pub fn for_feature(kind: FeatureType) -> Self {
        match kind {
            FeatureType::Arrow => ActiveHandler::Arrow(ArrowHandler::default()),
            FeatureType::Box | FeatureType::Text | FeatureType::Comment => {
                ActiveHandler::Rect(RectHandler::new(kind))
            }
            FeatureType::Polygon => ActiveHandler::Polygon(PolygonHandler::default()),
        }
    }

    pub fn handler(&self) -> &dyn ToolHandler {
        match self {
            ActiveHandler::Arrow(h) => h,
            ActiveHandler::Rect(h) => h,
            ActiveHandler::Polygon(h) => h,
            ActiveHandler::Comment(h) => h,
        }
    }

    pub fn handler_mut(&mut self) -> &mut dyn ToolHandler {
        match self {
            ActiveHandler::Arrow(h) => h,
            ActiveHandler::Rect(h) => h,
            ActiveHandler::Polygon(h) => h,
            ActiveHandler::Comment(h) => h,
        }
    }

    pub fn state(&self) -> HandlerState {
        self.handler().state()
    }
}
