//! Polygon drawing and editing.
//!
//! Drawing supports two gestures that can be mixed. Clicks add vertices one at
//! a time; pressing back on the first vertex (or [`finish`]) closes the ring.
//! Dragging with the button held records a freehand path that is simplified
//! and closed on release.
//!
//! [`finish`]: ToolHandler::finish

use bevy::log::debug;
use bevy::math::Vec2;

use crate::constants::MIN_POINT_SPACING;
use crate::features::{Feature, FeatureId, FeatureType, PolygonShape};
use crate::geometry::{close_ring, simplify_path};
use crate::store::AnnotationEvent;

use super::{HandlerState, ToolContext, ToolHandler};

/// Which part of an existing polygon was grabbed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonGrab {
    Vertex(usize),
    Body,
}

#[derive(Debug, Default)]
enum Session {
    #[default]
    Idle,
    Drawing {
        id: FeatureId,
        points: Vec<Vec2>,
        /// Button held since the last press
        pressed: bool,
        /// Where the button went down
        press_origin: Vec2,
        freehand: bool,
    },
    Editing {
        id: FeatureId,
        grab: PolygonGrab,
        origin: Vec2,
        original: PolygonShape,
        session_ids: Vec<FeatureId>,
    },
}

#[derive(Debug, Default)]
pub struct PolygonHandler {
    session: Session,
}

impl PolygonHandler {
    /// Vertices placed so far in the current drawing.
    pub fn points(&self) -> &[Vec2] {
        match &self.session {
            Session::Drawing { points, .. } => points,
            _ => &[],
        }
    }

    pub fn grab(&self) -> Option<PolygonGrab> {
        match &self.session {
            Session::Editing { grab, .. } => Some(*grab),
            _ => None,
        }
    }

    pub fn classify(polygon: &PolygonShape, point: Vec2, handle_radius: f32) -> PolygonGrab {
        polygon
            .vertices()
            .iter()
            .enumerate()
            .map(|(i, v)| (i, v.distance(point)))
            .filter(|(_, d)| *d <= handle_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| PolygonGrab::Vertex(i))
            .unwrap_or(PolygonGrab::Body)
    }

    /// Overlay preview: placed vertices plus an optional rubber-band point.
    fn preview(ctx: &mut ToolContext, id: &str, points: &[Vec2], cursor: Option<Vec2>) {
        let mut ring: Vec<Vec2> = points.to_vec();
        ring.extend(cursor);
        let ring = close_ring(&ring);
        ctx.store.apply_live_update(id, |f| {
            if let Some(polygon) = f.geometry.as_polygon_mut() {
                polygon.ring = ring;
            }
        });
    }

    /// Close and commit the drawing, or drop it when it has too few vertices.
    fn complete(&mut self, ctx: &mut ToolContext) -> Option<FeatureId> {
        let Session::Drawing {
            id,
            points,
            freehand,
            ..
        } = std::mem::take(&mut self.session)
        else {
            return None;
        };
        let points = if freehand {
            simplify_path(&points, ctx.config.simplify_tolerance / ctx.zoom().max(f32::EPSILON))
        } else {
            points
        };
        let points = dedup_closing_point(points);
        if points.len() < 3 {
            debug!("Polygon {} dropped with {} vertices", id, points.len());
            ctx.store.cancel_live_updates();
            return None;
        }

        let ring = close_ring(&points);
        ctx.store.apply_live_update(&id, |f| {
            if let Some(polygon) = f.geometry.as_polygon_mut() {
                polygon.ring = ring;
                polygon.smooth = freehand;
            }
        });
        ctx.store.commit_live_updates(Some(&[id.clone()]));
        ctx.store
            .notify(AnnotationEvent::DrawingComplete(id.clone()));
        debug!("Polygon {} complete with {} vertices", id, points.len());
        Some(id)
    }
}

/// A freehand path that ends where it started would otherwise repeat the
/// first vertex.
fn dedup_closing_point(mut points: Vec<Vec2>) -> Vec<Vec2> {
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

impl ToolHandler for PolygonHandler {
    fn state(&self) -> HandlerState {
        match self.session {
            Session::Idle => HandlerState::Idle,
            Session::Drawing { .. } => HandlerState::Drawing,
            Session::Editing { .. } => HandlerState::Editing,
        }
    }

    fn start_drawing(&mut self, ctx: &mut ToolContext, point: Vec2) {
        let id = ctx.store.generate_id(FeatureType::Polygon);
        ctx.store
            .insert_live_feature(Feature::polygon(id.clone(), &[point]));
        debug!("Drawing polygon {} from {:?}", id, point);
        self.session = Session::Drawing {
            id,
            points: vec![point],
            pressed: true,
            press_origin: point,
            freehand: false,
        };
    }

    fn start_editing(&mut self, ctx: &mut ToolContext, id: &str, point: Vec2) -> bool {
        let Some(original) = ctx
            .store
            .get_feature(id)
            .and_then(|f| f.geometry.as_polygon())
            .cloned()
        else {
            return false;
        };
        let grab = Self::classify(&original, point, ctx.handle_radius());
        let mut session_ids = vec![id.to_string()];
        session_ids.extend(ctx.links.incoming_arrows(id));
        ctx.store.start_live_update(&session_ids);
        debug!("Editing polygon {} ({:?})", id, grab);
        self.session = Session::Editing {
            id: id.to_string(),
            grab,
            origin: point,
            original,
            session_ids,
        };
        true
    }

    fn pointer_down(&mut self, ctx: &mut ToolContext, point: Vec2) {
        let close_radius = ctx.handle_radius();
        let points = self.points();
        if points.len() >= 3 && points[0].distance(point) <= close_radius {
            self.complete(ctx);
            return;
        }
        let Session::Drawing {
            id,
            points,
            pressed,
            press_origin,
            ..
        } = &mut self.session
        else {
            return;
        };
        points.push(point);
        *pressed = true;
        *press_origin = point;
        let (id, points) = (id.clone(), points.clone());
        Self::preview(ctx, &id, &points, None);
    }

    fn pointer_move(&mut self, ctx: &mut ToolContext, point: Vec2) {
        let tolerance = ctx.click_tolerance();
        let spacing = MIN_POINT_SPACING / ctx.zoom().max(f32::EPSILON);
        match &mut self.session {
            Session::Idle => {}
            Session::Drawing {
                id,
                points,
                pressed,
                press_origin,
                freehand,
            } => {
                if *pressed && !*freehand && point.distance(*press_origin) > tolerance {
                    *freehand = true;
                }
                let cursor = if *pressed && *freehand {
                    let far_enough = points
                        .last()
                        .is_none_or(|last| last.distance(point) >= spacing);
                    if far_enough {
                        points.push(point);
                    }
                    None
                } else {
                    Some(point)
                };
                let (id, points) = (id.clone(), points.clone());
                Self::preview(ctx, &id, &points, cursor);
            }
            Session::Editing {
                id,
                grab,
                origin,
                original,
                ..
            } => {
                let delta = point - *origin;
                let mut ring = original.ring.clone();
                match *grab {
                    PolygonGrab::Body => ring.iter_mut().for_each(|v| *v += delta),
                    PolygonGrab::Vertex(i) => {
                        let last = ring.len() - 1;
                        ring[i] += delta;
                        // The closing point mirrors the first vertex
                        if i == 0 && last > 0 {
                            ring[last] = ring[0];
                        }
                    }
                }
                ctx.store.apply_live_update(id, |f| {
                    if let Some(polygon) = f.geometry.as_polygon_mut() {
                        polygon.ring = ring;
                    }
                });
                let id = id.clone();
                ctx.drag_linked_arrows(&[id]);
            }
        }
    }

    fn pointer_up(&mut self, ctx: &mut ToolContext, point: Vec2) -> Option<FeatureId> {
        match std::mem::take(&mut self.session) {
            Session::Idle => None,
            Session::Drawing {
                id,
                points,
                press_origin,
                freehand,
                ..
            } => {
                self.session = Session::Drawing {
                    id,
                    points,
                    pressed: freehand,
                    press_origin,
                    freehand,
                };
                if freehand {
                    self.pointer_move(ctx, point);
                    self.complete(ctx)
                } else {
                    None
                }
            }
            Session::Editing {
                id, session_ids, ..
            } => {
                let committed = ctx.store.commit_live_updates(Some(&session_ids));
                committed.contains(&id).then_some(id)
            }
        }
    }

    fn finish(&mut self, ctx: &mut ToolContext) -> Option<FeatureId> {
        self.complete(ctx)
    }

    fn cancel(&mut self, ctx: &mut ToolContext) {
        if !matches!(std::mem::take(&mut self.session), Session::Idle) {
            debug!("Polygon gesture cancelled");
            ctx.store.cancel_live_updates();
        }
    }
}
