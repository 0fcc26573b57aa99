//! Where config, saved annotations and logs live.
//!
//! Debug builds and `cargo run` keep everything in the working directory.
//! Installed builds use the platform directories from `dirs`:
//! - Linux: `~/.config/graph-annotations/` for config, `~/.local/share/graph-annotations/` for data
//! - Windows: `%APPDATA%\GraphAnnotations\`
//! - macOS: `~/Library/Application Support/GraphAnnotations/`

use std::path::PathBuf;

#[cfg(target_os = "linux")]
const APP_DIR: &str = "graph-annotations";
#[cfg(not(target_os = "linux"))]
const APP_DIR: &str = "GraphAnnotations";

const CONFIG_FILE: &str = "config.json";
const ANNOTATIONS_FILE: &str = "annotations.json";
const LOGS_DIR: &str = "logs";

/// Running from a checkout: `CARGO` is set by `cargo run`, or this is a debug build.
pub fn is_dev_mode() -> bool {
    std::env::var("CARGO").is_ok() || cfg!(debug_assertions)
}

/// Config directory. Only Linux separates config from data.
pub fn config_dir() -> Option<PathBuf> {
    if is_dev_mode() {
        return Some(PathBuf::from("."));
    }
    if cfg!(target_os = "linux") {
        dirs::config_dir().map(|p| p.join(APP_DIR))
    } else {
        data_dir()
    }
}

pub fn data_dir() -> Option<PathBuf> {
    if is_dev_mode() {
        return Some(PathBuf::from("."));
    }
    dirs::data_dir().map(|p| p.join(APP_DIR))
}

/// `name` under `base`, or relative to the working directory when the
/// platform has no such directory.
fn under(base: Option<PathBuf>, name: &str) -> PathBuf {
    base.map(|p| p.join(name))
        .unwrap_or_else(|| PathBuf::from(name))
}

pub fn config_file() -> PathBuf {
    under(config_dir(), CONFIG_FILE)
}

/// Default target of the Save and Load commands.
pub fn annotations_file() -> PathBuf {
    under(data_dir(), ANNOTATIONS_FILE)
}

pub fn logs_dir() -> PathBuf {
    under(data_dir(), LOGS_DIR)
}

/// Create the config, data and log directories of an installed build.
pub fn ensure_directories() -> std::io::Result<()> {
    if is_dev_mode() {
        return Ok(());
    }
    if let Some(config) = config_dir() {
        std::fs::create_dir_all(config)?;
    }
    std::fs::create_dir_all(logs_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_keep_their_names() {
        assert!(config_file().ends_with(CONFIG_FILE));
        assert!(annotations_file().ends_with(ANNOTATIONS_FILE));
    }

    #[test]
    fn test_dev_mode_returns_local_paths() {
        // Tests are debug builds
        assert!(is_dev_mode());
        assert_eq!(config_dir(), Some(PathBuf::from(".")));
        assert_eq!(annotations_file(), PathBuf::from("./annotations.json"));
        assert_eq!(logs_dir(), PathBuf::from("./logs"));
    }

    #[test]
    fn test_under_falls_back_to_relative() {
        assert_eq!(under(None, "x.json"), PathBuf::from("x.json"));
    }
}
