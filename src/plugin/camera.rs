use std::time::Instant;

use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use super::{world_to_graph, AnnotationLayer};
use crate::geometry::rotate;
use crate::host::ViewState;

/// Radians per second while Q/E is held
const ROTATE_SPEED: f32 = 1.0;

#[derive(Component)]
pub struct AnnotationCamera;

#[derive(Component)]
pub struct CameraZoom {
    /// World units per screen pixel
    pub scale: f32,
}

impl Default for CameraZoom {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

pub fn spawn_camera(mut commands: Commands) {
    commands.spawn((
        Camera2d,
        AnnotationCamera,
        CameraZoom::default(),
        Transform::from_translation(Vec3::new(0.0, 0.0, 1000.0)),
    ));
}

pub fn camera_pan(
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut camera_query: Query<(&mut Transform, &CameraZoom), With<AnnotationCamera>>,
) {
    if !mouse_button.pressed(MouseButton::Middle) {
        mouse_motion.clear();
        return;
    }

    let Ok((mut transform, zoom)) = camera_query.single_mut() else {
        return;
    };

    for event in mouse_motion.read() {
        // Screen deltas follow the camera's own axes
        let delta = transform.rotation * Vec3::new(-event.delta.x, event.delta.y, 0.0);
        transform.translation += delta * zoom.scale;
    }
}

pub fn camera_zoom(
    mut scroll_events: MessageReader<MouseWheel>,
    mut camera_query: Query<&mut CameraZoom, With<AnnotationCamera>>,
) {
    let Ok(mut zoom) = camera_query.single_mut() else {
        return;
    };

    for event in scroll_events.read() {
        let scroll_amount = match event.unit {
            MouseScrollUnit::Line => event.y * 0.1,
            MouseScrollUnit::Pixel => event.y * 0.001,
        };

        zoom.scale = (zoom.scale - scroll_amount).clamp(0.1, 10.0);
    }
}

/// Q/E rotate the view; R resets it.
pub fn camera_rotate(
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    mut camera_query: Query<&mut Transform, With<AnnotationCamera>>,
) {
    let Ok(mut transform) = camera_query.single_mut() else {
        return;
    };
    if keyboard.just_pressed(KeyCode::KeyR) {
        transform.rotation = Quat::IDENTITY;
        return;
    }
    let mut direction = 0.0;
    if keyboard.pressed(KeyCode::KeyQ) {
        direction += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyE) {
        direction -= 1.0;
    }
    if direction != 0.0 {
        transform.rotate_z(direction * ROTATE_SPEED * time.delta_secs());
    }
}

pub fn apply_camera_zoom(
    mut camera_query: Query<
        (&CameraZoom, &mut Projection),
        (With<AnnotationCamera>, Changed<CameraZoom>),
    >,
) {
    for (zoom, mut projection) in camera_query.iter_mut() {
        if let Projection::Orthographic(ref mut ortho) = *projection {
            ortho.scale = zoom.scale;
        }
    }
}

/// View state of a camera centered on `center` (world), rotated by `angle`
/// (world, counter-clockwise) with `scale` world units per pixel, in a
/// viewport of `viewport` pixels.
///
/// A counter-clockwise world turn is the same signed angle in y-down graph
/// and screen space.
pub fn view_state(center: Vec2, angle: f32, scale: f32, viewport: Vec2) -> ViewState {
    let zoom = 1.0 / scale.max(f32::EPSILON);
    let center = world_to_graph(center);
    ViewState {
        pan: viewport / 2.0 - rotate(center, angle) * zoom,
        zoom,
        rotation: angle,
    }
}

/// Mirror the camera into the layer's view; resync view-dependent links on change.
pub fn sync_camera_view(
    window: Query<&Window, With<PrimaryWindow>>,
    camera: Query<(&Transform, &CameraZoom), With<AnnotationCamera>>,
    mut layer: ResMut<AnnotationLayer>,
) {
    let (Ok(window), Ok((transform, zoom))) = (window.single(), camera.single()) else {
        return;
    };
    let (_, _, angle) = transform.rotation.to_euler(EulerRot::XYZ);
    let view = view_state(
        transform.translation.truncate(),
        angle,
        zoom.scale,
        window.size(),
    );
    if layer.host_mut().set_view(view) {
        layer.notify_view_changed(Instant::now());
    }
}
