//! Bevy host for the annotation core.
//!
//! Graph nodes are entities carrying [`GraphNode`]; the camera is a plain 2D
//! camera. Every frame the plugin mirrors both into the [`GraphSnapshot`]
//! owned by the [`AnnotationLayer`], routes mouse and keyboard input to it,
//! ticks deferred work and draws gizmo outlines.
//!
//! Graph space is y-down while Bevy world space is y-up, so every crossing
//! flips y ([`world_to_graph`], [`graph_to_world`]).
//!
//! ## Module Structure
//!
//! - [`camera`] - pan, zoom and rotation; camera to [`ViewState`](crate::host::ViewState)
//! - [`input`] - pointer, keyboard and node-drag routing
//! - [`gizmos`] - outline rendering of annotations and nodes
//! - [`toolbar`] - egui toolbar and settings

pub mod camera;
pub mod gizmos;
pub mod input;
mod toolbar;

use std::path::PathBuf;

use bevy::prelude::*;
use bevy_egui::EguiPrimaryContextPass;

use crate::annotator::Annotator;
use crate::config::{AppConfig, ConfigLoaded};
use crate::host::GraphSnapshot;

pub use camera::AnnotationCamera;

/// A graph node the annotations can link to
#[derive(Component, Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub radius: f32,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, radius: f32) -> Self {
        Self {
            id: id.into(),
            radius,
        }
    }
}

/// The annotation core, as a resource
#[derive(Resource, Deref, DerefMut)]
pub struct AnnotationLayer(pub Annotator<GraphSnapshot>);

#[derive(Message)]
pub struct SaveAnnotationsRequest {
    pub path: PathBuf,
}

#[derive(Message)]
pub struct LoadAnnotationsRequest {
    pub path: PathBuf,
}

/// Last persistence failure, shown in the toolbar
#[derive(Resource, Default)]
pub struct PersistenceError {
    pub message: Option<String>,
}

/// Bevy world (y-up) to graph space (y-down).
pub fn world_to_graph(world: Vec2) -> Vec2 {
    Vec2::new(world.x, -world.y)
}

pub fn graph_to_world(graph: Vec2) -> Vec2 {
    Vec2::new(graph.x, -graph.y)
}

/// Startup system: build the layer from the loaded config
fn setup_annotation_layer(mut commands: Commands, config: Res<AppConfig>) {
    let annotator = Annotator::new(config.data.clone(), GraphSnapshot::new());
    commands.insert_resource(AnnotationLayer(annotator));
    info!("Annotation layer ready");
}

fn save_annotations_system(
    mut events: MessageReader<SaveAnnotationsRequest>,
    layer: Res<AnnotationLayer>,
    mut status: ResMut<PersistenceError>,
) {
    for event in events.read() {
        match layer.save_collection(&event.path) {
            Ok(()) => status.message = None,
            Err(e) => {
                error!("Failed to save annotations: {}", e);
                status.message = Some(e.to_string());
            }
        }
    }
}

fn load_annotations_system(
    mut events: MessageReader<LoadAnnotationsRequest>,
    mut layer: ResMut<AnnotationLayer>,
    mut status: ResMut<PersistenceError>,
) {
    for event in events.read() {
        match layer.load_collection(&event.path) {
            Ok(count) => {
                info!("Loaded {} annotations", count);
                status.message = None;
            }
            Err(e) => {
                error!("Failed to load annotations: {}", e);
                status.message = Some(e.to_string());
            }
        }
    }
}

pub struct AnnotationPlugin;

impl Plugin for AnnotationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PersistenceError>()
            .init_resource::<input::NodeDrag>()
            .add_message::<SaveAnnotationsRequest>()
            .add_message::<LoadAnnotationsRequest>()
            .init_gizmo_group::<gizmos::AnnotationGizmoGroup>()
            .add_systems(
                Startup,
                (
                    camera::spawn_camera,
                    gizmos::configure_annotation_gizmos,
                    setup_annotation_layer.after(ConfigLoaded),
                ),
            )
            .add_systems(
                Update,
                (
                    camera::camera_pan,
                    camera::camera_zoom,
                    camera::camera_rotate,
                    camera::apply_camera_zoom,
                ),
            )
            .add_systems(
                Update,
                (
                    input::drag_graph_nodes,
                    input::sync_graph_nodes,
                    camera::sync_camera_view,
                    input::handle_tool_shortcuts,
                    input::route_keyboard,
                    input::route_pointer,
                    input::tick_annotations,
                    input::update_cursor_icon,
                    gizmos::draw_graph_nodes,
                    gizmos::draw_annotations,
                )
                    .chain()
                    .run_if(resource_exists::<AnnotationLayer>),
            )
            .add_systems(
                Update,
                (
                    save_annotations_system.run_if(on_message::<SaveAnnotationsRequest>),
                    load_annotations_system.run_if(on_message::<LoadAnnotationsRequest>),
                )
                    .run_if(resource_exists::<AnnotationLayer>),
            )
            .add_systems(
                EguiPrimaryContextPass,
                toolbar::toolbar_ui.run_if(resource_exists::<AnnotationLayer>),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_graph_flip() {
        let world = Vec2::new(12.0, 30.0);
        assert_eq!(world_to_graph(world), Vec2::new(12.0, -30.0));
        assert_eq!(graph_to_world(world_to_graph(world)), world);
    }
}
