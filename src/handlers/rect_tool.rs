//! Box and text tool; also moves and resizes comments.
//!
//! Resizing works in the region's own frame, so screen-aligned text resizes
//! along screen axes under any view rotation. The edge or corner opposite the
//! grabbed handle stays put and the size never drops below the minimum.

use bevy::log::debug;
use bevy::math::Vec2;

use crate::common::DragMode;
use crate::features::{
    Feature, FeatureId, FeatureType, Geometry, RectFrame, RectShape, TextShape,
};
use crate::geometry::rotate;
use crate::store::AnnotationEvent;

use super::{HandlerState, ToolContext, ToolHandler};

#[derive(Debug, Default)]
enum Session {
    #[default]
    Idle,
    Drawing {
        id: FeatureId,
        origin: Vec2,
        moved: bool,
    },
    Editing {
        id: FeatureId,
        mode: DragMode,
        origin: Vec2,
        original: RectShape,
        frame: RectFrame,
        /// Feature plus the arrows linked to it
        session_ids: Vec<FeatureId>,
    },
}

#[derive(Debug)]
pub struct RectHandler {
    kind: FeatureType,
    session: Session,
}

impl RectHandler {
    pub fn new(kind: FeatureType) -> Self {
        Self {
            kind,
            session: Session::Idle,
        }
    }

    pub fn kind(&self) -> FeatureType {
        self.kind
    }

    pub fn drag_mode(&self) -> DragMode {
        match &self.session {
            Session::Editing { mode, .. } => *mode,
            _ => DragMode::None,
        }
    }

    /// Which handle (or the body) a press at `point` grabs.
    pub fn classify(
        frame: &RectFrame,
        point: Vec2,
        handle_radius: f32,
        resizable: bool,
    ) -> DragMode {
        if !resizable {
            return DragMode::Move;
        }
        DragMode::RESIZE_HANDLES
            .into_iter()
            .find(|mode| {
                mode.handle_offset().is_some_and(|offset| {
                    frame.magnet_point(offset).distance(point) <= handle_radius
                })
            })
            .unwrap_or(DragMode::Move)
    }

    /// New center and size after dragging `mode`'s handle to `point`.
    pub fn resize_frame(
        frame: &RectFrame,
        mode: DragMode,
        point: Vec2,
        min_size: f32,
    ) -> (Vec2, Vec2) {
        let Some(offset) = mode.handle_offset() else {
            return (frame.center, frame.size);
        };
        let local = frame.to_local(point);
        let half = frame.half_size();
        let mut center = Vec2::ZERO;
        let mut size = frame.size;
        for axis in 0..2 {
            let sign = offset[axis].signum();
            if offset[axis] == 0.0 {
                continue;
            }
            let fixed = -sign * half[axis];
            let extent = ((local[axis] - fixed) * sign).max(min_size);
            size[axis] = extent;
            center[axis] = fixed + sign * extent / 2.0;
        }
        (frame.to_graph(center), size)
    }

    fn new_feature(&self, id: FeatureId, origin: Vec2) -> Feature {
        let rect = RectShape::new(origin, 0.0, 0.0);
        match self.kind {
            FeatureType::Text => Feature::new(
                id,
                Geometry::Text(TextShape {
                    rect,
                    content: String::new(),
                }),
            ),
            _ => Feature::new(id, Geometry::Box(rect)),
        }
    }

    /// Angle of the drawn region's frame under the current view.
    fn frame_angle(&self, ctx: &ToolContext) -> f32 {
        if self.kind == FeatureType::Text {
            -ctx.view().rotation
        } else {
            0.0
        }
    }
}

fn set_rect(ctx: &mut ToolContext, id: &str, center: Vec2, size: Vec2) {
    let zoom = ctx.zoom();
    ctx.store.apply_live_update(id, |f| {
        if let Some(rect) = f.geometry.rect_mut() {
            rect.set_graph_frame(center, size, zoom);
        }
    });
}

impl ToolHandler for RectHandler {
    fn state(&self) -> HandlerState {
        match self.session {
            Session::Idle => HandlerState::Idle,
            Session::Drawing { .. } => HandlerState::Drawing,
            Session::Editing { .. } => HandlerState::Editing,
        }
    }

    fn start_drawing(&mut self, ctx: &mut ToolContext, point: Vec2) {
        let id = ctx.store.generate_id(self.kind);
        ctx.store
            .insert_live_feature(self.new_feature(id.clone(), point));
        debug!("Drawing {:?} {} at {:?}", self.kind, id, point);
        self.session = Session::Drawing {
            id,
            origin: point,
            moved: false,
        };
    }

    fn start_editing(&mut self, ctx: &mut ToolContext, id: &str, point: Vec2) -> bool {
        let view = ctx.view();
        let Some(feature) = ctx.store.get_feature(id) else {
            return false;
        };
        let (Some(original), Some(frame)) =
            (feature.geometry.rect().cloned(), feature.geometry.frame(&view))
        else {
            return false;
        };
        // Collapsed comments only move
        let resizable = !matches!(&feature.geometry, Geometry::Comment(c) if !c.expanded);
        let mode = Self::classify(&frame, point, ctx.handle_radius(), resizable);

        let mut session_ids = vec![id.to_string()];
        session_ids.extend(ctx.links.incoming_arrows(id));
        ctx.store.start_live_update(&session_ids);
        debug!("Editing {} ({:?})", id, mode);
        self.session = Session::Editing {
            id: id.to_string(),
            mode,
            origin: point,
            original,
            frame,
            session_ids,
        };
        true
    }

    fn pointer_move(&mut self, ctx: &mut ToolContext, point: Vec2) {
        let angle = self.frame_angle(ctx);
        let min_size = ctx.config.min_box_size;
        let tolerance = ctx.click_tolerance();
        match &mut self.session {
            Session::Idle => {}
            Session::Drawing { id, origin, moved } => {
                *moved |= point.distance(*origin) > tolerance;
                let span = rotate(point - *origin, -angle).abs();
                let center = (*origin + point) / 2.0;
                set_rect(ctx, id, center, span);
            }
            Session::Editing {
                id,
                mode,
                origin,
                original,
                frame,
                ..
            } => {
                if *mode == DragMode::Move {
                    let position = original.position + (point - *origin);
                    ctx.store.apply_live_update(id, |f| {
                        if let Some(rect) = f.geometry.rect_mut() {
                            rect.position = position;
                        }
                    });
                } else {
                    let (center, size) = Self::resize_frame(frame, *mode, point, min_size);
                    set_rect(ctx, id, center, size);
                }
                let id = id.clone();
                ctx.drag_linked_arrows(&[id]);
            }
        }
    }

    fn pointer_up(&mut self, ctx: &mut ToolContext, point: Vec2) -> Option<FeatureId> {
        match std::mem::take(&mut self.session) {
            Session::Idle => None,
            Session::Drawing { id, origin, moved } => {
                let zoom = ctx.zoom();
                let angle = self.frame_angle(ctx);
                let (center, size) = if moved {
                    let min = ctx.config.min_box_size;
                    let span = rotate(point - origin, -angle).abs().max(Vec2::splat(min));
                    ((origin + point) / 2.0, span)
                } else {
                    // A click drops a default-sized region centered on the press
                    let size = match self.kind {
                        FeatureType::Text => ctx.config.text_size / zoom.max(f32::EPSILON),
                        _ => Vec2::splat(ctx.config.min_box_size),
                    };
                    (origin, size)
                };
                set_rect(ctx, &id, center, size);
                ctx.store.commit_live_updates(Some(&[id.clone()]));
                ctx.store
                    .notify(AnnotationEvent::DrawingComplete(id.clone()));
                debug!("{:?} {} complete", self.kind, id);
                Some(id)
            }
            Session::Editing {
                id, session_ids, ..
            } => {
                let committed = ctx.store.commit_live_updates(Some(&session_ids));
                committed.contains(&id).then_some(id)
            }
        }
    }

    fn cancel(&mut self, ctx: &mut ToolContext) {
        if !matches!(self.session, Session::Idle) {
            debug!("{:?} gesture cancelled", self.kind);
            ctx.store.cancel_live_updates();
        }
        self.session = Session::Idle;
    }
}
