use bevy::prelude::*;
use bevy_egui::EguiPlugin;

use graph_annotations::config::ConfigPlugin;
use graph_annotations::constants::{DEFAULT_WINDOW_HEIGHT, DEFAULT_WINDOW_WIDTH};
use graph_annotations::paths;
use graph_annotations::plugin::{AnnotationPlugin, GraphNode, LoadAnnotationsRequest};

/// Set up file logging for debug builds
#[cfg(debug_assertions)]
fn setup_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use std::fs::OpenOptions;
    use std::io::Write;
    use tracing_subscriber::prelude::*;

    // Create logs directory if it doesn't exist
    let logs_dir = paths::logs_dir();
    if std::fs::create_dir_all(&logs_dir).is_err() {
        eprintln!("Failed to create logs directory");
        return None;
    }

    let log_file_path = logs_dir.join("graph-annotations.log");

    // Append session separator to existing log file
    if let Ok(mut file) = OpenOptions::new().append(true).open(&log_file_path) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let separator = "=".repeat(80);
        let _ = writeln!(
            file,
            "\n\n{}\n=== New Session Started at {} ===\n{}\n",
            separator, timestamp, separator
        );
    }

    let file_appender = tracing_appender::rolling::never(&logs_dir, "graph-annotations.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Configure file layer (no ANSI colors for file output)
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_level(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true)
        .with_level(true);

    // Default to info for bevy, debug for the annotation core
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,graph_annotations=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Some(guard)
}

#[cfg(not(debug_assertions))]
fn setup_logging() -> Option<()> {
    None
}

/// A small graph to annotate
fn spawn_demo_nodes(mut commands: Commands) {
    let nodes = [
        ("alpha", Vec2::new(-250.0, 120.0), 24.0),
        ("beta", Vec2::new(0.0, 0.0), 32.0),
        ("gamma", Vec2::new(260.0, 150.0), 20.0),
        ("delta", Vec2::new(120.0, -200.0), 28.0),
    ];
    for (id, position, radius) in nodes {
        commands.spawn((
            GraphNode::new(id, radius),
            Transform::from_translation(position.extend(0.0)),
        ));
    }
}

/// Pick up the last saved annotations, if any
fn load_saved_annotations(mut load: MessageWriter<LoadAnnotationsRequest>) {
    let path = paths::annotations_file();
    if path.exists() {
        load.write(LoadAnnotationsRequest { path });
    }
}

fn main() {
    // Keep the guard alive for the duration of the program
    let _log_guard = setup_logging();
    if let Err(e) = paths::ensure_directories() {
        eprintln!("Failed to create data directories: {}", e);
    }

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Graph Annotations".into(),
                resolution: (DEFAULT_WINDOW_WIDTH as u32, DEFAULT_WINDOW_HEIGHT as u32).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_plugins(ConfigPlugin)
        .add_plugins(AnnotationPlugin)
        .add_systems(Startup, spawn_demo_nodes)
        .add_systems(PostStartup, load_saved_annotations)
        .run();
}
