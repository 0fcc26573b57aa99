//! Comment tool: an arrow gesture that drops a comment at its far end.
//!
//! The user drags from the thing being commented on. On release the comment
//! is placed at the release point, or at a fixed screen offset from the press
//! when the gesture was a click. The committed arrow points from the comment
//! back to the press point: its start is linked to the comment and any snap
//! found under the press moves to its end.

use bevy::log::debug;
use bevy::math::Vec2;

use crate::features::{Feature, FeatureId, FeatureType, Geometry, Side, TargetKind};
use crate::geometry::rotate;
use crate::store::AnnotationEvent;

use super::arrow::{ArrowDraft, ArrowHandler};
use super::{HandlerState, ToolContext, ToolHandler};

#[derive(Debug, Default)]
pub struct CommentHandler {
    arrow: ArrowHandler,
    /// Press position of the current gesture
    origin: Option<Vec2>,
}

impl CommentHandler {
    /// Where the comment lands for a gesture that started at `origin`.
    fn comment_center(ctx: &ToolContext, origin: Vec2, draft: &ArrowDraft) -> Vec2 {
        if draft.release_point.distance(origin) > ctx.click_tolerance() {
            return draft.release_point;
        }
        let view = ctx.view();
        let offset = rotate(ctx.config.comment_click_offset, -view.rotation);
        origin + offset / view.zoom.max(f32::EPSILON)
    }
}

impl ToolHandler for CommentHandler {
    fn state(&self) -> HandlerState {
        self.arrow.state()
    }

    fn start_drawing(&mut self, ctx: &mut ToolContext, point: Vec2) {
        self.origin = Some(point);
        self.arrow.start_drawing(ctx, point);
    }

    /// Existing comments are moved and resized by the box tool.
    fn start_editing(&mut self, _ctx: &mut ToolContext, _id: &str, _point: Vec2) -> bool {
        false
    }

    fn pointer_move(&mut self, ctx: &mut ToolContext, point: Vec2) {
        self.arrow.pointer_move(ctx, point);
    }

    fn pointer_up(&mut self, ctx: &mut ToolContext, point: Vec2) -> Option<FeatureId> {
        let origin = self.origin.take()?;
        let draft = self.arrow.take_draft(ctx, point)?;
        let center = Self::comment_center(ctx, origin, &draft);
        let anchor = draft.start_snap.as_ref().map(|s| s.point).unwrap_or(origin);

        let comment_id = ctx.store.generate_id(FeatureType::Comment);
        let size = ctx.config.comment_size;
        let mut comment = Feature::comment(comment_id.clone(), center, size.x, size.y);
        if let Geometry::Comment(shape) = &mut comment.geometry {
            shape.rect.fixed_size = true;
        }
        ctx.store.insert_live_feature(comment);

        let arrow_id = draft.id.clone();
        ctx.store.apply_live_update(&arrow_id, |f| {
            if let Some(arrow) = f.geometry.as_arrow_mut() {
                arrow.start = center;
                arrow.end = anchor;
                arrow.start_link = None;
                arrow.end_link = None;
            }
        });

        ctx.batch(|ctx| {
            ctx.store
                .commit_live_updates(Some(&[comment_id.clone(), arrow_id.clone()]));
            ctx.links.add(
                ctx.store,
                ctx.host,
                &arrow_id,
                Side::Start,
                &comment_id,
                TargetKind::Comment,
                Vec2::ZERO,
            );
            if let Some(snap) = &draft.start_snap {
                ctx.links.add(
                    ctx.store,
                    ctx.host,
                    &arrow_id,
                    Side::End,
                    &snap.target,
                    snap.kind,
                    snap.magnet,
                );
            }
        });
        ctx.store
            .notify(AnnotationEvent::DrawingComplete(comment_id.clone()));
        debug!("Comment {} placed with arrow {}", comment_id, arrow_id);
        Some(comment_id)
    }

    fn cancel(&mut self, ctx: &mut ToolContext) {
        self.origin = None;
        self.arrow.cancel(ctx);
    }
}
