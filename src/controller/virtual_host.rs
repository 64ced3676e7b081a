//! In-memory window host
//!
//! Keeps windows, tabs and per-tab history in memory. Used by the controller
//! service, the trace simulator and the tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::host::{HostError, HostResult, WindowHost, WindowInfo, WindowKind, WindowState};
use crate::protocol::{TabId, WindowId};

#[derive(Debug)]
struct VirtualWindow {
    kind: WindowKind,
    state: WindowState,
    tabs: Vec<TabId>,
    active_tab: Option<TabId>,
}

#[derive(Debug)]
struct VirtualTab {
    window_id: WindowId,
    history: Vec<String>,
    index: usize,
}

#[derive(Debug, Default)]
struct Inner {
    windows: HashMap<WindowId, VirtualWindow>,
    tabs: HashMap<TabId, VirtualTab>,
    focused: Option<WindowId>,
    next_window: WindowId,
    next_tab: TabId,
}

/// Shared handle to an in-memory set of windows and tabs
#[derive(Debug, Clone, Default)]
pub struct VirtualHost {
    inner: Arc<Mutex<Inner>>,
}

impl VirtualHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a window; the first window opened receives focus
    pub fn open_window(&self, kind: WindowKind, state: WindowState) -> WindowId {
        let mut inner = self.inner();
        inner.next_window += 1;
        let id = inner.next_window;
        inner.windows.insert(
            id,
            VirtualWindow {
                kind,
                state,
                tabs: Vec::new(),
                active_tab: None,
            },
        );
        if inner.focused.is_none() {
            inner.focused = Some(id);
        }
        id
    }

    /// Open a tab in a window and make it that window's active tab
    pub fn open_tab(&self, window_id: WindowId, url: &str) -> HostResult<TabId> {
        let mut inner = self.inner();
        if !inner.windows.contains_key(&window_id) {
            return Err(HostError::WindowNotFound(window_id));
        }
        inner.next_tab += 1;
        let id = inner.next_tab;
        inner.tabs.insert(
            id,
            VirtualTab {
                window_id,
                history: vec![url.to_string()],
                index: 0,
            },
        );
        if let Some(window) = inner.windows.get_mut(&window_id) {
            window.tabs.push(id);
            window.active_tab = Some(id);
        }
        Ok(id)
    }

    /// Load a new page in a tab, dropping any forward entries
    pub fn navigate(&self, tab_id: TabId, url: &str) -> HostResult<()> {
        let mut inner = self.inner();
        let tab = inner
            .tabs
            .get_mut(&tab_id)
            .ok_or(HostError::TabNotFound(tab_id))?;
        tab.history.truncate(tab.index + 1);
        tab.history.push(url.to_string());
        tab.index = tab.history.len() - 1;
        Ok(())
    }

    pub fn focus_window(&self, window_id: Option<WindowId>) {
        self.inner().focused = window_id;
    }

    pub fn activate_tab(&self, tab_id: TabId) -> HostResult<()> {
        let mut inner = self.inner();
        let window_id = inner
            .tabs
            .get(&tab_id)
            .map(|tab| tab.window_id)
            .ok_or(HostError::TabNotFound(tab_id))?;
        if let Some(window) = inner.windows.get_mut(&window_id) {
            window.active_tab = Some(tab_id);
        }
        Ok(())
    }

    /// Change a window's state behind the controller's back (OS shortcuts, the user)
    pub fn set_state_externally(&self, window_id: WindowId, state: WindowState) -> HostResult<()> {
        let mut inner = self.inner();
        let window = inner
            .windows
            .get_mut(&window_id)
            .ok_or(HostError::WindowNotFound(window_id))?;
        window.state = state;
        Ok(())
    }

    pub fn window_state(&self, window_id: WindowId) -> Option<WindowState> {
        self.inner().windows.get(&window_id).map(|w| w.state)
    }

    pub fn window_of(&self, tab_id: TabId) -> Option<WindowId> {
        self.inner().tabs.get(&tab_id).map(|tab| tab.window_id)
    }

    pub fn is_tab_active(&self, tab_id: TabId) -> bool {
        let inner = self.inner();
        inner
            .tabs
            .get(&tab_id)
            .and_then(|tab| inner.windows.get(&tab.window_id))
            .is_some_and(|window| window.active_tab == Some(tab_id))
    }

    pub fn current_url(&self, tab_id: TabId) -> Option<String> {
        self.inner()
            .tabs
            .get(&tab_id)
            .map(|tab| tab.history[tab.index].clone())
    }

    /// Number of entries up to and including the current one
    pub fn history_length(&self, tab_id: TabId) -> usize {
        self.inner()
            .tabs
            .get(&tab_id)
            .map(|tab| tab.index + 1)
            .unwrap_or(0)
    }

    pub fn can_go_forward(&self, tab_id: TabId) -> bool {
        self.inner()
            .tabs
            .get(&tab_id)
            .is_some_and(|tab| tab.index + 1 < tab.history.len())
    }

    fn step_history(&self, tab_id: TabId, forward: bool) -> HostResult<()> {
        let mut inner = self.inner();
        let tab = inner
            .tabs
            .get_mut(&tab_id)
            .ok_or(HostError::TabNotFound(tab_id))?;
        if forward {
            if tab.index + 1 >= tab.history.len() {
                return Err(HostError::NoHistoryEntry(tab_id));
            }
            tab.index += 1;
        } else {
            if tab.index == 0 {
                return Err(HostError::NoHistoryEntry(tab_id));
            }
            tab.index -= 1;
        }
        Ok(())
    }
}

#[async_trait]
impl WindowHost for VirtualHost {
    async fn window(&self, window_id: WindowId) -> HostResult<WindowInfo> {
        let inner = self.inner();
        let window = inner
            .windows
            .get(&window_id)
            .ok_or(HostError::WindowNotFound(window_id))?;
        Ok(WindowInfo {
            id: window_id,
            kind: window.kind,
            state: window.state,
            focused: inner.focused == Some(window_id),
        })
    }

    async fn set_window_state(&self, window_id: WindowId, state: WindowState) -> HostResult<()> {
        self.set_state_externally(window_id, state)
    }

    async fn go_back(&self, tab_id: TabId) -> HostResult<()> {
        self.step_history(tab_id, false)
    }

    async fn go_forward(&self, tab_id: TabId) -> HostResult<()> {
        self.step_history(tab_id, true)
    }
}
