//! Interaction controller: routes pointer and keyboard input to tool handlers.
//!
//! With a tool armed, the next press starts drawing. Otherwise a press
//! hit-tests the annotations: a hit selects the feature and starts editing it
//! with the handler for its kind, a miss clears the selection. Shift toggles
//! membership instead and never starts a drag.
//!
//! Hit-testing is two-phase: the spatial index supplies candidates whose
//! bounds lie near the pointer, then [`detection::hit_test`] decides exactly.
//! The topmost hit (last in z-order) wins.
//!
//! [`detection::hit_test`]: crate::detection::hit_test


use bevy::log::{debug, info};
use bevy::math::Vec2;

use crate::comments::delete_features;
use crate::detection::hit_test;
use crate::features::FeatureId;
use crate::handlers::{ActiveHandler, HandlerState, Tool, ToolContext};

/// Keys the controller reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Delete,
    Backspace,
    Enter,
    Z,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    /// Ctrl, or Cmd on macOS
    pub command: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        command: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        command: false,
    };

    pub const COMMAND: Modifiers = Modifiers {
        shift: false,
        command: true,
    };
}

/// Result of a keyboard command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Cancelled,
    Deleted(Vec<FeatureId>),
    Finished(Option<FeatureId>),
    /// Undo or redo replaced the feature map
    HistoryRestored,
}

#[derive(Debug, Default)]
pub struct InteractionController {
    armed: Option<Tool>,
    active: Option<ActiveHandler>,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `tool` for the next pointer-down.
    pub fn arm(&mut self, tool: Tool) {
        debug!("Armed {}", tool.display_name());
        self.armed = Some(tool);
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }

    pub fn armed(&self) -> Option<Tool> {
        self.armed
    }

    pub fn active(&self) -> Option<&ActiveHandler> {
        self.active.as_ref()
    }

    pub fn state(&self) -> HandlerState {
        self.active
            .as_ref()
            .map(ActiveHandler::state)
            .unwrap_or_default()
    }

    /// A drawing or editing gesture is in progress.
    pub fn is_busy(&self) -> bool {
        self.state() != HandlerState::Idle
    }

    /// Topmost feature under `point`, if any.
    pub fn pick(&self, ctx: &ToolContext, point: Vec2) -> Option<FeatureId> {
        let view = ctx.view();
        let margin = ctx.config.hit_margin_at(view.zoom);
        // Selected features keep their handles grabbable just outside the outline
        let selected_margin = margin + ctx.handle_radius();

        ctx.index
            .query_point(point, selected_margin)
            .into_iter()
            .filter_map(|id| {
                let feature = ctx.store.get_feature(&id)?;
                let margin = if ctx.store.is_selected(&id) {
                    selected_margin
                } else {
                    margin
                };
                hit_test(feature, point, margin, &view).then(|| (ctx.store.z_order(&id), id))
            })
            .max_by_key(|(z, _)| *z)
            .map(|(_, id)| id)
    }

    /// Start drawing with `tool` right away, abandoning any gesture in flight.
    pub fn start_tool(&mut self, ctx: &mut ToolContext, tool: Tool, point: Vec2) {
        self.cancel(ctx);
        ctx.links.flush(ctx.store, ctx.host);
        self.armed = None;
        let mut handler = ActiveHandler::for_tool(tool);
        handler.handler_mut().start_drawing(ctx, point);
        self.active = Some(handler);
    }

    pub fn pointer_down(&mut self, ctx: &mut ToolContext, point: Vec2, modifiers: Modifiers) {
        // A multi-press drawing (polygon) keeps receiving presses
        if let Some(handler) = self.active.as_mut()
            && handler.state() == HandlerState::Drawing
        {
            handler.handler_mut().pointer_down(ctx, point);
            self.clear_if_idle();
            return;
        }
        // Pending resync edits would otherwise be swept up by this gesture
        ctx.links.flush(ctx.store, ctx.host);

        if let Some(tool) = self.armed.take() {
            let mut handler = ActiveHandler::for_tool(tool);
            handler.handler_mut().start_drawing(ctx, point);
            self.active = Some(handler);
            return;
        }

        let Some(id) = self.pick(ctx, point) else {
            if !modifiers.shift {
                ctx.store.clear_selection();
            }
            return;
        };
        if modifiers.shift {
            ctx.store.toggle_selection(&id);
            return;
        }
        if !ctx.store.is_selected(&id) {
            ctx.store.set_selection(&[id.clone()]);
        }
        let Some(kind) = ctx.store.get_feature(&id).map(|f| f.kind()) else {
            return;
        };
        let mut handler = ActiveHandler::for_feature(kind);
        if handler.handler_mut().start_editing(ctx, &id, point) {
            self.active = Some(handler);
        }
    }

    pub fn pointer_move(&mut self, ctx: &mut ToolContext, point: Vec2) {
        match self.active.as_mut() {
            Some(handler) if handler.state() != HandlerState::Idle => {
                handler.handler_mut().pointer_move(ctx, point);
            }
            _ => {
                let hovered: Vec<FeatureId> = self.pick(ctx, point).into_iter().collect();
                ctx.store.set_hovered(&hovered);
            }
        }
    }

    /// Returns the feature a finished gesture created or changed.
    pub fn pointer_up(&mut self, ctx: &mut ToolContext, point: Vec2) -> Option<FeatureId> {
        let handler = self.active.as_mut()?;
        let result = handler.handler_mut().pointer_up(ctx, point);
        self.clear_if_idle();
        result
    }

    /// Complete a multi-press drawing.
    pub fn finish(&mut self, ctx: &mut ToolContext) -> Option<FeatureId> {
        let handler = self.active.as_mut()?;
        let result = handler.handler_mut().finish(ctx);
        self.clear_if_idle();
        result
    }

    /// Abandon the gesture in flight, if any.
    pub fn cancel(&mut self, ctx: &mut ToolContext) -> bool {
        match self.active.take() {
            Some(mut handler) if handler.state() != HandlerState::Idle => {
                handler.handler_mut().cancel(ctx);
                true
            }
            _ => false,
        }
    }

    pub fn key_down(
        &mut self,
        ctx: &mut ToolContext,
        key: Key,
        modifiers: Modifiers,
    ) -> KeyOutcome {
        match key {
            Key::Escape => {
                let disarmed = self.armed.take().is_some();
                if self.cancel(ctx) || disarmed {
                    KeyOutcome::Cancelled
                } else {
                    KeyOutcome::Ignored
                }
            }
            Key::Enter if self.state() == HandlerState::Drawing => {
                KeyOutcome::Finished(self.finish(ctx))
            }
            Key::Delete | Key::Backspace if !self.is_busy() => {
                let selection = ctx.store.selection();
                if selection.is_empty() {
                    return KeyOutcome::Ignored;
                }
                ctx.links.flush(ctx.store, ctx.host);
                let removed = delete_features(ctx.store, ctx.links, &selection);
                info!("Deleted {} features", removed.len());
                KeyOutcome::Deleted(removed)
            }
            Key::Z if modifiers.command => self.restore(ctx, !modifiers.shift),
            Key::Y if modifiers.command => self.restore(ctx, false),
            _ => KeyOutcome::Ignored,
        }
    }

    fn restore(&mut self, ctx: &mut ToolContext, undo: bool) -> KeyOutcome {
        self.cancel(ctx);
        ctx.links.flush(ctx.store, ctx.host);
        let restored = if undo {
            ctx.store.undo()
        } else {
            ctx.store.redo()
        };
        if restored {
            KeyOutcome::HistoryRestored
        } else {
            KeyOutcome::Ignored
        }
    }

    fn clear_if_idle(&mut self) {
        if self
            .active
            .as_ref()
            .is_some_and(|h| h.state() == HandlerState::Idle)
        {
            self.active = None;
        }
    }
}
