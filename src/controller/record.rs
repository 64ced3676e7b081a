//! Per-window memory kept by the controller

use super::host::{WindowKind, WindowState};
use crate::protocol::WindowId;

/// Whether the controller may act on a window at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClass {
    Normal,
    /// Popups, panels, app windows and devtools panes
    Utility,
}

impl From<WindowKind> for WindowClass {
    fn from(kind: WindowKind) -> Self {
        match kind {
            WindowKind::Normal => WindowClass::Normal,
            WindowKind::Popup | WindowKind::Panel | WindowKind::App | WindowKind::Devtools => {
                WindowClass::Utility
            }
        }
    }
}

/// State restored on fullscreen exit when nothing was recorded
pub const DEFAULT_RESTORE_STATE: WindowState = WindowState::Maximized;

/// Controller-side record for one host window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRecord {
    pub window_id: WindowId,
    /// Last state observed right before a transition into fullscreen
    pub previous_state: Option<WindowState>,
    pub class: WindowClass,
}

impl WindowRecord {
    pub fn new(window_id: WindowId, class: WindowClass) -> Self {
        Self {
            window_id,
            previous_state: None,
            class,
        }
    }

    /// Remember the state a window had before entering fullscreen.
    ///
    /// A window that is already fullscreen keeps its existing record, so
    /// repeated enter requests never overwrite the state to restore.
    pub fn remember_before_fullscreen(&mut self, current: WindowState) {
        if current != WindowState::Fullscreen {
            self.previous_state = Some(current);
        }
    }

    /// The state to restore when leaving fullscreen
    pub fn restore_state(&self) -> WindowState {
        self.previous_state.unwrap_or(DEFAULT_RESTORE_STATE)
    }

    pub fn is_normal(&self) -> bool {
        self.class == WindowClass::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_defaults_to_maximized() {
        let record = WindowRecord::new(1, WindowClass::Normal);
        assert_eq!(record.restore_state(), WindowState::Maximized);
    }

    #[test]
    fn test_fullscreen_never_recorded_as_previous() {
        let mut record = WindowRecord::new(1, WindowClass::Normal);
        record.remember_before_fullscreen(WindowState::Normal);
        record.remember_before_fullscreen(WindowState::Fullscreen);
        assert_eq!(record.restore_state(), WindowState::Normal);
    }

    #[test]
    fn test_window_kind_classification() {
        assert_eq!(WindowClass::from(WindowKind::Normal), WindowClass::Normal);
        assert_eq!(WindowClass::from(WindowKind::Devtools), WindowClass::Utility);
        assert_eq!(WindowClass::from(WindowKind::Popup), WindowClass::Utility);
    }
}
