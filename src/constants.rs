//! Centralized constants used across the crate.
//!
//! These are the defaults behind [`crate::config::AnnotationConfig`]; anything a
//! user may want to tune lives there, this module only names the numbers.

/// Default window width in pixels
pub const DEFAULT_WINDOW_WIDTH: f32 = 1600.0;

/// Default window height in pixels
pub const DEFAULT_WINDOW_HEIGHT: f32 = 900.0;

/// Maximum number of snapshots kept on the undo stack
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// Snap search radius in screen pixels
pub const DEFAULT_SNAP_RADIUS: f32 = 10.0;

/// Lower bound for magnet hit radius in screen pixels (magnets are small targets)
pub const MIN_HANDLE_RADIUS: f32 = 12.0;

/// Extra slack around features when hit testing, in screen pixels
pub const DEFAULT_HIT_MARGIN: f32 = 4.0;

/// Radius of resize/endpoint handles, in screen pixels
pub const HANDLE_RADIUS: f32 = 6.0;

/// Quiet period before linked-arrow resync is committed to history
pub const LINK_RESYNC_DEBOUNCE_MS: u64 = 100;

/// Events held per subscriber before the oldest are dropped
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Boxes and text are never smaller than this on either axis
pub const MIN_BOX_SIZE: f32 = 10.0;

/// Arrows shorter than this are stretched to it
pub const MIN_ARROW_LENGTH: f32 = 5.0;

/// Default size of a text feature created by a click
pub const DEFAULT_TEXT_SIZE: (f32, f32) = (120.0, 40.0);

/// Default size of a freshly created comment
pub const DEFAULT_COMMENT_SIZE: (f32, f32) = (160.0, 80.0);

/// Offset from the arrow start at which a click-created comment is placed (screen px)
pub const COMMENT_CLICK_OFFSET: (f32, f32) = (60.0, -60.0);

/// Radius of a collapsed comment icon, in screen pixels
pub const COMMENT_ICON_RADIUS: f32 = 12.0;

/// Catmull-Rom samples per ring segment
pub const CURVE_SAMPLES_PER_SEGMENT: usize = 8;

/// Douglas-Peucker tolerance for freehand polygons, in screen pixels
pub const SIMPLIFY_TOLERANCE: f32 = 2.0;

/// Pointer travel (screen px) below which a gesture counts as a click
pub const CLICK_TOLERANCE: f32 = 4.0;

/// Freehand polygon points closer than this (screen px) are dropped while drawing
pub const MIN_POINT_SPACING: f32 = 2.0;

/// Default arrow / outline stroke width
pub const DEFAULT_STROKE_WIDTH: f32 = 2.0;

/// Default font size for text and comments
pub const DEFAULT_FONT_SIZE: f32 = 14.0;
