//! Common types shared by the tool handlers and the Bevy host.

use bevy::math::Vec2;
use bevy::window::{CursorIcon, SystemCursorIcon};

/// What grabbing a box-like feature does.
///
/// Compass names are in screen terms: north is toward negative y.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum DragMode {
    #[default]
    None,
    Move,
    ResizeN,
    ResizeS,
    ResizeE,
    ResizeW,
    ResizeNE,
    ResizeNW,
    ResizeSE,
    ResizeSW,
}

impl DragMode {
    /// The eight resize handles, corners first.
    pub const RESIZE_HANDLES: [DragMode; 8] = [
        DragMode::ResizeNW,
        DragMode::ResizeNE,
        DragMode::ResizeSE,
        DragMode::ResizeSW,
        DragMode::ResizeN,
        DragMode::ResizeE,
        DragMode::ResizeS,
        DragMode::ResizeW,
    ];

    /// Handle position as a fraction of size from the center.
    pub fn handle_offset(&self) -> Option<Vec2> {
        match self {
            DragMode::None | DragMode::Move => None,
            DragMode::ResizeN => Some(Vec2::new(0.0, -0.5)),
            DragMode::ResizeS => Some(Vec2::new(0.0, 0.5)),
            DragMode::ResizeE => Some(Vec2::new(0.5, 0.0)),
            DragMode::ResizeW => Some(Vec2::new(-0.5, 0.0)),
            DragMode::ResizeNE => Some(Vec2::new(0.5, -0.5)),
            DragMode::ResizeNW => Some(Vec2::new(-0.5, -0.5)),
            DragMode::ResizeSE => Some(Vec2::new(0.5, 0.5)),
            DragMode::ResizeSW => Some(Vec2::new(-0.5, 0.5)),
        }
    }

    /// Get the appropriate cursor icon for this drag mode.
    pub fn cursor_icon(&self) -> Option<CursorIcon> {
        match self {
            DragMode::None => None,
            DragMode::Move => Some(CursorIcon::System(SystemCursorIcon::Move)),
            DragMode::ResizeN | DragMode::ResizeS => {
                Some(CursorIcon::System(SystemCursorIcon::NsResize))
            }
            DragMode::ResizeE | DragMode::ResizeW => {
                Some(CursorIcon::System(SystemCursorIcon::EwResize))
            }
            DragMode::ResizeNE | DragMode::ResizeSW => {
                Some(CursorIcon::System(SystemCursorIcon::NeswResize))
            }
            DragMode::ResizeNW | DragMode::ResizeSE => {
                Some(CursorIcon::System(SystemCursorIcon::NwseResize))
            }
        }
    }

    pub fn is_resize(&self) -> bool {
        self.handle_offset().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_mode_default() {
        assert_eq!(DragMode::default(), DragMode::None);
    }

    #[test]
    fn test_cursor_icon_none() {
        assert!(DragMode::None.cursor_icon().is_none());
        assert!(DragMode::Move.cursor_icon().is_some());
    }

    #[test]
    fn test_is_resize() {
        assert!(!DragMode::None.is_resize());
        assert!(!DragMode::Move.is_resize());
        assert!(DragMode::ResizeN.is_resize());
        assert!(DragMode::ResizeSW.is_resize());
    }

    #[test]
    fn test_handles_sit_on_box_magnets() {
        for mode in DragMode::RESIZE_HANDLES {
            let offset = mode.handle_offset().unwrap();
            assert!(crate::features::BOX_MAGNETS.contains(&offset));
        }
    }
}
