use std::path::{Path, PathBuf};
use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CLICK_TOLERANCE, COMMENT_CLICK_OFFSET, DEFAULT_COMMENT_SIZE,
    DEFAULT_HISTORY_DEPTH, DEFAULT_HIT_MARGIN, DEFAULT_SNAP_RADIUS, DEFAULT_TEXT_SIZE,
    HANDLE_RADIUS, LINK_RESYNC_DEBOUNCE_MS, MIN_ARROW_LENGTH, MIN_BOX_SIZE, MIN_HANDLE_RADIUS,
    SIMPLIFY_TOLERANCE,
};
use crate::error::{AnnotationError, Result};
use crate::snapping::SnapRadius;

/// System set for config loading (other plugins can run after this)
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigLoaded;

/// Every annotation tunable. Distances are in screen pixels unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub snap_radius: f32,
    /// Lower bound for box magnet hits
    pub min_handle_radius: f32,
    pub hit_margin: f32,
    /// Grab radius of resize and endpoint handles
    pub handle_radius: f32,
    pub history_depth: usize,
    pub link_resync_debounce_ms: u64,
    /// Graph units
    pub min_box_size: f32,
    /// Graph units
    pub min_arrow_length: f32,
    pub text_size: Vec2,
    pub comment_size: Vec2,
    /// Where a clicked (not dragged) comment lands relative to the arrow start
    pub comment_click_offset: Vec2,
    /// Graph units
    pub simplify_tolerance: f32,
    /// Pointer travel below which a gesture counts as a click
    pub click_tolerance: f32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            snap_radius: DEFAULT_SNAP_RADIUS,
            min_handle_radius: MIN_HANDLE_RADIUS,
            hit_margin: DEFAULT_HIT_MARGIN,
            handle_radius: HANDLE_RADIUS,
            history_depth: DEFAULT_HISTORY_DEPTH,
            link_resync_debounce_ms: LINK_RESYNC_DEBOUNCE_MS,
            min_box_size: MIN_BOX_SIZE,
            min_arrow_length: MIN_ARROW_LENGTH,
            text_size: Vec2::new(DEFAULT_TEXT_SIZE.0, DEFAULT_TEXT_SIZE.1),
            comment_size: Vec2::new(DEFAULT_COMMENT_SIZE.0, DEFAULT_COMMENT_SIZE.1),
            comment_click_offset: Vec2::new(COMMENT_CLICK_OFFSET.0, COMMENT_CLICK_OFFSET.1),
            simplify_tolerance: SIMPLIFY_TOLERANCE,
            click_tolerance: CLICK_TOLERANCE,
        }
    }
}

impl AnnotationConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.link_resync_debounce_ms)
    }

    /// Snap distances converted to graph units at `zoom`.
    pub fn snap_radius_at(&self, zoom: f32) -> SnapRadius {
        let zoom = zoom.max(f32::EPSILON);
        SnapRadius::new(self.snap_radius / zoom, self.min_handle_radius / zoom)
    }

    pub fn hit_margin_at(&self, zoom: f32) -> f32 {
        self.hit_margin / zoom.max(f32::EPSILON)
    }

    pub fn handle_radius_at(&self, zoom: f32) -> f32 {
        self.handle_radius / zoom.max(f32::EPSILON)
    }

    pub fn click_tolerance_at(&self, zoom: f32) -> f32 {
        self.click_tolerance / zoom.max(f32::EPSILON)
    }

    /// Reads a config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| AnnotationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| AnnotationError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Runtime configuration resource
#[derive(Resource)]
pub struct AppConfig {
    pub data: AnnotationConfig,
    pub config_path: PathBuf,
    /// Whether config needs to be saved
    pub dirty: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: AnnotationConfig::default(),
            config_path: crate::paths::config_file(),
            dirty: false,
        }
    }
}

/// Message to trigger config save
#[derive(Message)]
pub struct SaveConfigRequest;

/// Load configuration, falling back to defaults with a warning on any error.
pub fn load_config(config_path: &Path) -> AnnotationConfig {
    if !config_path.exists() {
        info!("No config file found, using defaults");
        return AnnotationConfig::default();
    }
    match AnnotationConfig::load(config_path) {
        Ok(data) => {
            info!("Loaded config from {:?}", config_path);
            data
        }
        Err(e) => {
            warn!("Config reset to defaults: {}", e);
            AnnotationConfig::default()
        }
    }
}

/// Startup system to load config from disk into the existing resource
fn load_config_system(mut config: ResMut<AppConfig>) {
    config.data = load_config(&config.config_path);
    config.dirty = false;
}

/// System to save config when requested
fn save_config_system(mut events: MessageReader<SaveConfigRequest>, mut config: ResMut<AppConfig>) {
    for _ in events.read() {
        if !config.dirty {
            continue;
        }
        match config.data.save(&config.config_path) {
            Ok(()) => info!("Config saved to {:?}", config.config_path),
            Err(e) => error!("Failed to save config: {}", e),
        }
        config.dirty = false;
    }
}

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AppConfig>()
            .add_message::<SaveConfigRequest>()
            .add_systems(Startup, load_config_system.in_set(ConfigLoaded))
            .add_systems(
                Update,
                save_config_system.run_if(on_message::<SaveConfigRequest>),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AnnotationConfig::default();
        assert_eq!(config.history_depth, 100);
        assert_eq!(config.debounce(), Duration::from_millis(100));
        assert_eq!(config.snap_radius, DEFAULT_SNAP_RADIUS);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let parsed: AnnotationConfig = serde_json::from_str(r#"{ "snap_radius": 20.0 }"#).unwrap();
        assert_eq!(parsed.snap_radius, 20.0);
        assert_eq!(parsed.history_depth, DEFAULT_HISTORY_DEPTH);
        assert_eq!(parsed.min_box_size, MIN_BOX_SIZE);
    }

    #[test]
    fn test_config_serialization() {
        let config = AnnotationConfig {
            hit_margin: 7.5,
            comment_click_offset: Vec2::new(10.0, 20.0),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AnnotationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_radii_scale_with_zoom() {
        let config = AnnotationConfig::default();
        let radius = config.snap_radius_at(2.0);
        assert_eq!(radius.radius, DEFAULT_SNAP_RADIUS / 2.0);
        assert_eq!(radius.min_handle_radius, MIN_HANDLE_RADIUS / 2.0);
        assert_eq!(config.hit_margin_at(0.5), DEFAULT_HIT_MARGIN * 2.0);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("graph_annotations_corrupt_config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config(&path), AnnotationConfig::default());
        let _ = std::fs::remove_file(&path);
    }
}
