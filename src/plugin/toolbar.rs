use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};

use super::{AnnotationLayer, LoadAnnotationsRequest, PersistenceError, SaveAnnotationsRequest};
use crate::config::{AppConfig, SaveConfigRequest};
use crate::handlers::Tool;
use crate::paths;

fn tool_button_label(tool: &Tool) -> &'static str {
    match tool {
        Tool::Arrow => "Arrow",
        Tool::Box => "Box",
        Tool::Text => "Text",
        Tool::Polygon => "Polygon",
        Tool::Comment => "Comment",
    }
}

/// Main toolbar: drawing tools, history, persistence and snapping settings
#[allow(clippy::too_many_arguments)]
pub fn toolbar_ui(
    mut contexts: EguiContexts,
    mut layer: ResMut<AnnotationLayer>,
    mut config: ResMut<AppConfig>,
    status: Res<PersistenceError>,
    mut save: MessageWriter<SaveAnnotationsRequest>,
    mut load: MessageWriter<LoadAnnotationsRequest>,
    mut save_config: MessageWriter<SaveConfigRequest>,
) -> Result {
    egui::TopBottomPanel::top("main_toolbar")
        .frame(
            egui::Frame::side_top_panel(&contexts.ctx_mut()?.style())
                .inner_margin(egui::Margin::symmetric(12, 8)),
        )
        .show(contexts.ctx_mut()?, |ui| {
            ui.horizontal(|ui| {
                ui.spacing_mut().item_spacing.x = 4.0;

                // Tool buttons with keyboard shortcuts
                for tool in Tool::all() {
                    let selected = layer.armed_tool() == Some(*tool);
                    let button = egui::Button::new(
                        egui::RichText::new(tool_button_label(tool)).size(14.0).strong(),
                    )
                    .min_size(egui::vec2(0.0, 28.0))
                    .selected(selected);

                    let response = ui.add(button);
                    if response.clicked() {
                        layer.enable_tool(*tool);
                    }
                    response.on_hover_text(tool.display_name());
                }

                ui.add_space(8.0);
                ui.separator();
                ui.add_space(8.0);

                let can_undo = layer.can_undo();
                if ui.add_enabled(can_undo, egui::Button::new("Undo")).clicked() {
                    layer.undo();
                }
                let can_redo = layer.can_redo();
                if ui.add_enabled(can_redo, egui::Button::new("Redo")).clicked() {
                    layer.redo();
                }

                ui.add_space(8.0);
                ui.separator();
                ui.add_space(8.0);

                if ui.button("Save").clicked() {
                    save.write(SaveAnnotationsRequest {
                        path: paths::annotations_file(),
                    });
                }
                if ui.button("Load").clicked() {
                    load.write(LoadAnnotationsRequest {
                        path: paths::annotations_file(),
                    });
                }

                ui.add_space(8.0);
                ui.separator();
                ui.add_space(8.0);

                let mut changed = false;
                ui.label("Snap:");
                changed |= ui
                    .add(egui::Slider::new(&mut config.data.snap_radius, 2.0..=40.0).suffix(" px"))
                    .changed();
                ui.label("Hit margin:");
                changed |= ui
                    .add(egui::Slider::new(&mut config.data.hit_margin, 0.0..=20.0).suffix(" px"))
                    .changed();
                if changed {
                    let data = config.data.clone();
                    layer.set_config(data);
                    config.dirty = true;
                }
                if ui
                    .add_enabled(config.dirty, egui::Button::new("Save settings"))
                    .clicked()
                {
                    save_config.write(SaveConfigRequest);
                }

                // Right-aligned status
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(message) = &status.message {
                        ui.colored_label(egui::Color32::from_rgb(220, 90, 90), message);
                    } else {
                        ui.label(
                            egui::RichText::new(format!(
                                "{} annotations, {} links",
                                layer.store().len(),
                                layer.links().len()
                            ))
                            .color(egui::Color32::GRAY),
                        );
                    }
                });
            });
        });
    Ok(())
}
