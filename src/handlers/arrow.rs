//! Arrow drawing and editing.

use bevy::log::debug;
use bevy::math::Vec2;

use crate::features::{ArrowShape, Feature, FeatureId, FeatureType, LinkRecord, Side};
use crate::links::resolve_arrow;
use crate::snapping::SnapResult;
use crate::store::AnnotationEvent;

use super::{HandlerState, ToolContext, ToolHandler};

/// Which part of an existing arrow was grabbed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowGrab {
    Endpoint(Side),
    Body,
}

/// A drawn arrow that has not been committed yet. It lives in the overlay.
#[derive(Debug, Clone)]
pub struct ArrowDraft {
    pub id: FeatureId,
    pub shape: ArrowShape,
    /// Raw pointer position at release, before snapping
    pub release_point: Vec2,
    pub start_snap: Option<SnapResult>,
    pub end_snap: Option<SnapResult>,
}

#[derive(Debug, Default)]
enum Session {
    #[default]
    Idle,
    Drawing {
        id: FeatureId,
        start_snap: Option<SnapResult>,
        end_snap: Option<SnapResult>,
    },
    Editing {
        id: FeatureId,
        grab: ArrowGrab,
        origin: Vec2,
        original: ArrowShape,
        snap: Option<SnapResult>,
        moved: bool,
    },
}

#[derive(Debug, Default)]
pub struct ArrowHandler {
    session: Session,
}

fn record_of(snap: &SnapResult) -> LinkRecord {
    LinkRecord {
        target: snap.target.clone(),
        kind: snap.kind,
        magnet: snap.magnet,
    }
}

fn set_shape(ctx: &mut ToolContext, id: &str, shape: &ArrowShape) {
    let (start, end) = (shape.start, shape.end);
    ctx.store.apply_live_update(id, |f| {
        if let Some(arrow) = f.geometry.as_arrow_mut() {
            arrow.start = start;
            arrow.end = end;
        }
    });
}

impl ArrowHandler {
    pub fn grab(&self) -> Option<ArrowGrab> {
        match &self.session {
            Session::Editing { grab, .. } => Some(*grab),
            _ => None,
        }
    }

    /// Classify a press on an existing arrow.
    pub fn classify(arrow: &ArrowShape, point: Vec2, handle_radius: f32) -> ArrowGrab {
        let to_start = point.distance(arrow.start);
        let to_end = point.distance(arrow.end);
        if to_start.min(to_end) > handle_radius {
            ArrowGrab::Body
        } else if to_start <= to_end {
            ArrowGrab::Endpoint(Side::Start)
        } else {
            ArrowGrab::Endpoint(Side::End)
        }
    }

    /// Ends the drawing gesture without committing; the caller owns the
    /// overlay arrow from here on.
    pub fn take_draft(&mut self, ctx: &mut ToolContext, point: Vec2) -> Option<ArrowDraft> {
        self.pointer_move(ctx, point);
        let Session::Drawing {
            id,
            start_snap,
            end_snap,
            ..
        } = std::mem::take(&mut self.session)
        else {
            return None;
        };
        let mut shape = ctx
            .store
            .get_merged_feature(&id)
            .and_then(|f| f.geometry.as_arrow())
            .cloned()?;

        let min_length = ctx.config.min_arrow_length;
        if shape.length() < min_length {
            let direction = (shape.end - shape.start).try_normalize().unwrap_or(Vec2::X);
            shape.end = shape.start + direction * min_length;
            set_shape(ctx, &id, &shape);
        }
        Some(ArrowDraft {
            id,
            shape,
            release_point: point,
            start_snap,
            end_snap,
        })
    }

    /// Shape with the in-progress snaps applied as links, endpoints resolved.
    fn drawn_shape(
        ctx: &ToolContext,
        base: &ArrowShape,
        start_snap: Option<&SnapResult>,
        end_snap: Option<&SnapResult>,
        end: Vec2,
    ) -> ArrowShape {
        let mut shape = base.clone();
        shape.end = end_snap.map(|s| s.point).unwrap_or(end);
        shape.start_link = start_snap.map(record_of);
        shape.end_link = end_snap.map(record_of);
        resolve_arrow(ctx.store, ctx.host, &shape)
    }
}

impl ToolHandler for ArrowHandler {
    fn state(&self) -> HandlerState {
        match self.session {
            Session::Idle => HandlerState::Idle,
            Session::Drawing { .. } => HandlerState::Drawing,
            Session::Editing { .. } => HandlerState::Editing,
        }
    }

    fn start_drawing(&mut self, ctx: &mut ToolContext, point: Vec2) {
        let start_snap = ctx.snap(point, &[]);
        let start = start_snap.as_ref().map(|s| s.point).unwrap_or(point);
        let id = ctx.store.generate_id(FeatureType::Arrow);
        ctx.store
            .insert_live_feature(Feature::arrow(id.clone(), start, start));
        debug!("Drawing arrow {} from {:?}", id, start);
        self.session = Session::Drawing {
            id,
            start_snap,
            end_snap: None,
        };
    }

    fn start_editing(&mut self, ctx: &mut ToolContext, id: &str, point: Vec2) -> bool {
        let Some(original) = ctx
            .store
            .get_feature(id)
            .and_then(|f| f.geometry.as_arrow())
            .cloned()
        else {
            return false;
        };
        let grab = Self::classify(&original, point, ctx.handle_radius());
        ctx.store.start_live_update(&[id.to_string()]);
        debug!("Editing arrow {} ({:?})", id, grab);
        self.session = Session::Editing {
            id: id.to_string(),
            grab,
            origin: point,
            original,
            snap: None,
            moved: false,
        };
        true
    }

    fn pointer_move(&mut self, ctx: &mut ToolContext, point: Vec2) {
        let tolerance = ctx.click_tolerance();
        match &mut self.session {
            Session::Idle => {}
            Session::Drawing {
                id,
                start_snap,
                end_snap,
            } => {
                *end_snap = ctx.snap(point, &[id.clone()]);
                let Some(base) = ctx
                    .store
                    .get_merged_feature(id)
                    .and_then(|f| f.geometry.as_arrow())
                    .cloned()
                else {
                    return;
                };
                let shape =
                    Self::drawn_shape(ctx, &base, start_snap.as_ref(), end_snap.as_ref(), point);
                set_shape(ctx, id, &shape);
            }
            Session::Editing {
                id,
                grab,
                origin,
                original,
                snap,
                moved,
            } => {
                *moved |= point.distance(*origin) > tolerance;
                let shape = match grab {
                    ArrowGrab::Body => {
                        let delta = point - *origin;
                        ArrowShape::new(original.start + delta, original.end + delta)
                    }
                    ArrowGrab::Endpoint(side) => {
                        *snap = ctx.snap(point, &[id.clone()]);
                        let mut shape = original.clone();
                        shape.set_endpoint(*side, snap.as_ref().map(|s| s.point).unwrap_or(point));
                        shape.set_link(*side, snap.as_ref().map(record_of));
                        resolve_arrow(ctx.store, ctx.host, &shape)
                    }
                };
                set_shape(ctx, id, &shape);
            }
        }
    }

    fn pointer_up(&mut self, ctx: &mut ToolContext, point: Vec2) -> Option<FeatureId> {
        if matches!(self.session, Session::Drawing { .. }) {
            let draft = self.take_draft(ctx, point)?;
            let id = draft.id.clone();
            ctx.batch(|ctx| {
                ctx.store.commit_live_updates(Some(&[id.clone()]));
                let snaps = [(Side::Start, &draft.start_snap), (Side::End, &draft.end_snap)];
                for (side, snap) in snaps {
                    if let Some(snap) = snap {
                        ctx.links.add(
                            ctx.store,
                            ctx.host,
                            &id,
                            side,
                            &snap.target,
                            snap.kind,
                            snap.magnet,
                        );
                    }
                }
            });
            ctx.store
                .notify(AnnotationEvent::DrawingComplete(id.clone()));
            debug!("Arrow {} complete", id);
            return Some(id);
        }

        self.pointer_move(ctx, point);
        let Session::Editing {
            id,
            grab,
            snap,
            moved,
            ..
        } = std::mem::take(&mut self.session)
        else {
            return None;
        };
        if !moved {
            ctx.store.cancel_live_updates();
            return None;
        }
        ctx.batch(|ctx| {
            ctx.store.commit_live_updates(Some(&[id.clone()]));
            match (grab, snap) {
                // Moving the whole arrow detaches it
                (ArrowGrab::Body, _) => {
                    ctx.links.remove_arrow_links(ctx.store, &id);
                }
                (ArrowGrab::Endpoint(side), Some(snap)) => {
                    ctx.links
                        .add(ctx.store, ctx.host, &id, side, &snap.target, snap.kind, snap.magnet);
                }
                (ArrowGrab::Endpoint(side), None) => {
                    ctx.links.remove(ctx.store, &id, side);
                }
            }
        });
        Some(id)
    }

    fn cancel(&mut self, ctx: &mut ToolContext) {
        if let Session::Drawing { id, .. } | Session::Editing { id, .. } =
            std::mem::take(&mut self.session)
        {
            debug!("Arrow gesture on {} cancelled", id);
            ctx.store.cancel_live_updates();
        }
    }
}
