//! Host window-management interface
//!
//! Defines the primitives the controller needs from the platform that owns
//! the actual windows and tabs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{TabId, WindowId};

/// Errors reported by a window host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Window not found: {0}")]
    WindowNotFound(WindowId),

    #[error("Tab not found: {0}")]
    TabNotFound(TabId),

    #[error("No history entry in that direction for tab {0}")]
    NoHistoryEntry(TabId),
}

pub type HostResult<T> = Result<T, HostError>;

/// Display state of a host window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    Normal,
    Minimized,
    Maximized,
    Fullscreen,
}

impl std::fmt::Display for WindowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WindowState::Normal => "normal",
            WindowState::Minimized => "minimized",
            WindowState::Maximized => "maximized",
            WindowState::Fullscreen => "fullscreen",
        };
        f.write_str(name)
    }
}

/// Kind of a host window as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Normal,
    Popup,
    Panel,
    App,
    Devtools,
}

/// Snapshot of a host window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub kind: WindowKind,
    pub state: WindowState,
    pub focused: bool,
}

/// Trait for the privileged window/tab primitives of a platform
#[async_trait]
pub trait WindowHost: Send + Sync {
    /// Query a window
    async fn window(&self, window_id: WindowId) -> HostResult<WindowInfo>;

    /// Change a window's display state
    async fn set_window_state(&self, window_id: WindowId, state: WindowState) -> HostResult<()>;

    /// Traverse a tab's history one entry back
    async fn go_back(&self, tab_id: TabId) -> HostResult<()>;

    /// Traverse a tab's history one entry forward
    async fn go_forward(&self, tab_id: TabId) -> HostResult<()>;
}
