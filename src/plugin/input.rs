//! Input routing from Bevy into the annotation layer.
//!
//! Pointer positions are converted to graph space before they reach the
//! core. Presses over egui panels are ignored, and keyboard shortcuts are
//! skipped while egui has keyboard focus.

use std::time::Instant;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::window::{CursorIcon, PrimaryWindow, SystemCursorIcon};
use bevy_egui::EguiContexts;

use super::camera::AnnotationCamera;
use super::{
    world_to_graph, AnnotationLayer, GraphNode, LoadAnnotationsRequest, SaveAnnotationsRequest,
};
use crate::handlers::{ActiveHandler, Tool};
use crate::interaction::{Key, Modifiers};
use crate::paths;

/// Bundled camera and window queries for cursor-to-world calculations
#[derive(SystemParam)]
pub struct CameraParams<'w, 's> {
    pub window: Query<'w, 's, &'static Window, With<PrimaryWindow>>,
    pub camera: Query<'w, 's, (&'static Camera, &'static GlobalTransform), With<AnnotationCamera>>,
}

impl CameraParams<'_, '_> {
    /// Get the world position of the cursor, if available
    pub fn cursor_world_pos(&self) -> Option<Vec2> {
        let window = self.window.single().ok()?;
        let (camera, transform) = self.camera.single().ok()?;
        let cursor_pos = window.cursor_position()?;
        camera.viewport_to_world_2d(transform, cursor_pos).ok()
    }

    pub fn cursor_graph_pos(&self) -> Option<Vec2> {
        self.cursor_world_pos().map(world_to_graph)
    }
}

/// Check if the cursor is over egui UI
pub fn is_cursor_over_ui(contexts: &mut EguiContexts) -> bool {
    contexts
        .ctx_mut()
        .map(|ctx| ctx.is_pointer_over_area())
        .unwrap_or(false)
}

fn wants_keyboard(contexts: &mut EguiContexts) -> bool {
    contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_keyboard_input())
        .unwrap_or(false)
}

pub fn modifiers(keyboard: &ButtonInput<KeyCode>) -> Modifiers {
    Modifiers {
        shift: keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]),
        command: keyboard.any_pressed([
            KeyCode::ControlLeft,
            KeyCode::ControlRight,
            KeyCode::SuperLeft,
            KeyCode::SuperRight,
        ]),
    }
}

/// Core key for a Bevy key code
pub fn map_key(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::Escape => Some(Key::Escape),
        KeyCode::Delete => Some(Key::Delete),
        KeyCode::Backspace => Some(Key::Backspace),
        KeyCode::Enter | KeyCode::NumpadEnter => Some(Key::Enter),
        KeyCode::KeyZ => Some(Key::Z),
        KeyCode::KeyY => Some(Key::Y),
        _ => None,
    }
}

/// Drawing tool armed by a bare letter key
pub fn tool_for_key(code: KeyCode) -> Option<Tool> {
    match code {
        KeyCode::KeyA => Some(Tool::Arrow),
        KeyCode::KeyB => Some(Tool::Box),
        KeyCode::KeyT => Some(Tool::Text),
        KeyCode::KeyP => Some(Tool::Polygon),
        KeyCode::KeyC => Some(Tool::Comment),
        _ => None,
    }
}

/// A graph node being dragged with the right mouse button
#[derive(Resource, Default)]
pub struct NodeDrag {
    pub entity: Option<Entity>,
    pub offset: Vec2,
}

/// Right-drag moves graph nodes so linked arrows can be seen following.
pub fn drag_graph_nodes(
    mouse: Res<ButtonInput<MouseButton>>,
    camera: CameraParams,
    mut contexts: EguiContexts,
    mut drag: ResMut<NodeDrag>,
    mut nodes: Query<(Entity, &GraphNode, &mut Transform)>,
) {
    let Some(cursor) = camera.cursor_world_pos() else {
        return;
    };

    if mouse.just_pressed(MouseButton::Right) && !is_cursor_over_ui(&mut contexts) {
        let hit = nodes
            .iter()
            .find(|(_, node, transform)| {
                transform.translation.truncate().distance(cursor) <= node.radius
            })
            .map(|(entity, _, transform)| (entity, transform.translation.truncate() - cursor));
        drag.entity = hit.map(|(entity, _)| entity);
        drag.offset = hit.map(|(_, offset)| offset).unwrap_or_default();
    }

    if mouse.just_released(MouseButton::Right) {
        drag.entity = None;
        return;
    }

    if let Some(entity) = drag.entity
        && let Ok((_, _, mut transform)) = nodes.get_mut(entity)
    {
        let target = cursor + drag.offset;
        if transform.translation.truncate() != target {
            transform.translation.x = target.x;
            transform.translation.y = target.y;
        }
    }
}

/// Mirror node entities into the host snapshot and report what changed.
pub fn sync_graph_nodes(
    nodes: Query<(&GraphNode, &GlobalTransform)>,
    mut layer: ResMut<AnnotationLayer>,
) {
    let mut changed = Vec::new();
    let mut seen = Vec::new();
    for (node, transform) in nodes.iter() {
        let position = world_to_graph(transform.translation().truncate());
        if layer.host_mut().set_node(node.id.clone(), position, node.radius) {
            changed.push(node.id.clone());
        }
        seen.push(node.id.as_str());
    }

    let gone: Vec<String> = layer
        .host()
        .node_ids()
        .filter(|id| !seen.contains(&id.as_str()))
        .cloned()
        .collect();
    for id in &gone {
        layer.host_mut().remove_node(id);
    }
    changed.extend(gone);

    if !changed.is_empty() {
        layer.notify_nodes_changed(&changed, Instant::now());
    }
}

/// A/B/T/P/C arm a drawing tool; Ctrl+S / Ctrl+O save and load.
pub fn handle_tool_shortcuts(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut contexts: EguiContexts,
    mut layer: ResMut<AnnotationLayer>,
    mut save: MessageWriter<SaveAnnotationsRequest>,
    mut load: MessageWriter<LoadAnnotationsRequest>,
) {
    // Don't change tools if typing in a text field
    if wants_keyboard(&mut contexts) {
        return;
    }
    let mods = modifiers(&keyboard);

    if mods.command {
        if keyboard.just_pressed(KeyCode::KeyS) {
            save.write(SaveAnnotationsRequest {
                path: paths::annotations_file(),
            });
        } else if keyboard.just_pressed(KeyCode::KeyO) {
            load.write(LoadAnnotationsRequest {
                path: paths::annotations_file(),
            });
        }
        return;
    }

    if let Some(tool) = keyboard.get_just_pressed().find_map(|code| tool_for_key(*code)) {
        layer.enable_tool(tool);
    }
}

pub fn route_keyboard(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut contexts: EguiContexts,
    mut layer: ResMut<AnnotationLayer>,
) {
    if wants_keyboard(&mut contexts) {
        return;
    }
    let mods = modifiers(&keyboard);
    let keys: Vec<Key> = keyboard
        .get_just_pressed()
        .filter_map(|code| map_key(*code))
        .collect();
    for key in keys {
        let outcome = layer.key_down(key, mods);
        debug!("{:?} -> {:?}", key, outcome);
    }
}

pub fn route_pointer(
    mouse: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    camera: CameraParams,
    mut contexts: EguiContexts,
    mut layer: ResMut<AnnotationLayer>,
    mut last: Local<Option<Vec2>>,
) {
    let Some(point) = camera.cursor_graph_pos() else {
        return;
    };
    let over_ui = is_cursor_over_ui(&mut contexts);

    if mouse.just_pressed(MouseButton::Left) && !over_ui {
        layer.pointer_down(point, modifiers(&keyboard));
    }
    if *last != Some(point) && (layer.is_busy() || !over_ui) {
        layer.pointer_move(point);
    }
    if mouse.just_released(MouseButton::Left) && layer.is_busy() {
        layer.pointer_up(point);
    }
    *last = Some(point);
}

pub fn tick_annotations(mut layer: ResMut<AnnotationLayer>) {
    layer.tick(Instant::now());
}

pub fn update_cursor_icon(
    layer: Res<AnnotationLayer>,
    window_query: Query<Entity, With<PrimaryWindow>>,
    mut commands: Commands,
    mut contexts: EguiContexts,
) {
    let Ok(entity) = window_query.single() else {
        return;
    };

    // Use default cursor over UI, tool cursor in canvas space
    let icon = if is_cursor_over_ui(&mut contexts) {
        CursorIcon::System(SystemCursorIcon::Default)
    } else if let Some(ActiveHandler::Rect(handler)) = layer.controller().active()
        && let Some(icon) = handler.drag_mode().cursor_icon()
    {
        icon
    } else if layer.armed_tool().is_some() || layer.is_busy() {
        CursorIcon::System(SystemCursorIcon::Crosshair)
    } else if !layer.hovered().is_empty() {
        CursorIcon::System(SystemCursorIcon::Pointer)
    } else {
        CursorIcon::System(SystemCursorIcon::Default)
    };
    commands.entity(entity).insert(icon);
}
