//! Anchored, undoable annotations for zoomable, rotatable graph canvases.
//!
//! Arrows, boxes, text, polygons and comments live in a transactional
//! [`store::FeatureStore`]. Arrow ends can be linked to graph nodes or to other
//! annotations and follow them as they move; drags render through a live
//! overlay and land in history as a single entry.
//!
//! [`annotator::Annotator`] is the entry point. The [`plugin`] module hosts it
//! inside a Bevy app.

pub mod annotator;
pub mod comments;
pub mod common;
pub mod config;
pub mod constants;
pub mod detection;
pub mod error;
pub mod features;
pub mod geometry;
pub mod handlers;
pub mod host;
pub mod interaction;
pub mod links;
pub mod paths;
pub mod persistence;
pub mod plugin;
pub mod snapping;
pub mod spatial;
pub mod store;

pub use annotator::Annotator;
pub use error::{AnnotationError, Result};
pub use features::{Feature, FeatureCollection, FeatureId, FeatureType};
pub use host::{GraphHost, GraphSnapshot, ViewState};
