//! Reading and writing [`FeatureCollection`] JSON files.
//!
//! Only committed features are written. Live overlays, selection, hover and
//! history never reach disk.

use std::path::Path;

use bevy::log::info;

use crate::error::{AnnotationError, Result};
use crate::features::FeatureCollection;

pub fn to_json(collection: &FeatureCollection) -> Result<String> {
    Ok(serde_json::to_string_pretty(collection)?)
}

pub fn from_json(json: &str) -> Result<FeatureCollection> {
    Ok(serde_json::from_str(json)?)
}

pub fn save_collection(path: &Path, collection: &FeatureCollection) -> Result<()> {
    let json = to_json(collection)?;
    std::fs::write(path, json).map_err(|source| AnnotationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "Saved {} annotations to {:?}",
        collection.features.len(),
        path
    );
    Ok(())
}

pub fn load_collection(path: &Path) -> Result<FeatureCollection> {
    let json = std::fs::read_to_string(path).map_err(|source| AnnotationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let collection = from_json(&json)?;
    info!(
        "Loaded {} annotations from {:?}",
        collection.features.len(),
        path
    );
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use bevy::math::Vec2;

    use super::*;
    use crate::features::Feature;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("graph_annotations_{}.json", name))
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("save_then_load");
        let collection = FeatureCollection {
            features: vec![
                Feature::rect_box("box-1", Vec2::ZERO, 40.0, 20.0),
                Feature::arrow("arrow-1", Vec2::ZERO, Vec2::new(10.0, 5.0)),
            ],
        };
        save_collection(&path, &collection).unwrap();
        let loaded = load_collection(&path).unwrap();
        assert_eq!(loaded, collection);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let path = temp_path("does_not_exist");
        let _ = std::fs::remove_file(&path);
        let err = load_collection(&path).unwrap_err();
        assert!(matches!(err, AnnotationError::Io { .. }));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = from_json("{ \"features\": [ { \"id\": 3 } ] }").unwrap_err();
        assert!(matches!(err, AnnotationError::Parse(_)));
    }

    #[test]
    fn test_empty_collection() {
        let json = to_json(&FeatureCollection::default()).unwrap();
        assert!(from_json(&json).unwrap().features.is_empty());
    }
}
