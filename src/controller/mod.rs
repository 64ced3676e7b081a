//! Controller module - The privileged side that owns real window state
//!
//! Provides:
//! - Focus and window-class queries for detectors
//! - Fullscreen enter/exit with per-window restore memory
//! - History navigation delegated to the host

mod host;
mod policy;
mod record;
mod virtual_host;

pub use host::*;
pub use policy::*;
pub use record::*;
pub use virtual_host::*;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::protocol::{Envelope, Request, Response, TabId, WindowId};

/// A controller shared between every connected page
pub type SharedController = Arc<Mutex<Controller>>;

/// Owns the window records and performs host operations on behalf of pages
pub struct Controller {
    host: Arc<dyn WindowHost>,
    records: HashMap<WindowId, WindowRecord>,
    policy: ProtectedContexts,
}

impl Controller {
    /// Create a new controller over a window host
    pub fn new(host: Arc<dyn WindowHost>, policy: ProtectedContexts) -> Self {
        Self {
            host,
            records: HashMap::new(),
            policy,
        }
    }

    /// Wrap the controller for concurrent callers; each request runs to completion under the lock
    pub fn into_shared(self) -> SharedController {
        Arc::new(Mutex::new(self))
    }

    /// Dispatch one request from a page
    pub async fn handle(&mut self, envelope: Envelope) -> Option<Response> {
        let Envelope { sender, request } = envelope;
        tracing::debug!(
            "{} from tab {} (window {})",
            request.action(),
            sender.tab_id,
            sender.window_id
        );

        match request {
            Request::CheckFocus => self
                .check_focus(sender.window_id, sender.tab_active)
                .await
                .map_err(|e| tracing::warn!("checkFocus failed: {}", e))
                .ok(),
            Request::CheckWindow => self
                .check_window(sender.window_id)
                .await
                .map_err(|e| tracing::warn!("checkWindow failed: {}", e))
                .ok(),
            Request::ToggleFullscreen { enter_fullscreen } => {
                let protected = self.policy.is_protected(&sender.url);
                if let Err(e) = self
                    .set_fullscreen(sender.window_id, enter_fullscreen, protected)
                    .await
                {
                    tracing::warn!("toggleFullscreen failed: {}", e);
                }
                None
            }
            Request::NavigateBack => {
                if let Err(e) = self.navigate_back(sender.tab_id).await {
                    tracing::warn!("navigateBack failed: {}", e);
                }
                None
            }
            Request::NavigateForward => {
                if let Err(e) = self.navigate_forward(sender.tab_id).await {
                    tracing::warn!("navigateForward failed: {}", e);
                }
                None
            }
            Request::ToggleExtension { .. } => {
                tracing::debug!("toggleExtension is addressed to pages, ignoring");
                None
            }
        }
    }

    /// Active iff the window is focused and the tab is its active tab
    pub async fn check_focus(&self, window_id: WindowId, tab_is_active: bool) -> HostResult<Response> {
        let window = self.host.window(window_id).await?;
        Ok(Response::Focus {
            is_active: window.focused && tab_is_active,
        })
    }

    /// Disabled iff the window is not a normal browsing window
    pub async fn check_window(&mut self, window_id: WindowId) -> HostResult<Response> {
        let record = self.record(window_id).await?;
        Ok(Response::Window {
            is_disabled_window: !record.is_normal(),
        })
    }

    /// Enter or leave fullscreen, remembering what to restore
    pub async fn set_fullscreen(
        &mut self,
        window_id: WindowId,
        enter: bool,
        is_protected_context: bool,
    ) -> HostResult<()> {
        if is_protected_context {
            tracing::debug!("Window {}: protected context, ignoring fullscreen", window_id);
            return Ok(());
        }

        let window = self.host.window(window_id).await?;
        let record = self.record_from(&window);
        if !record.is_normal() {
            tracing::debug!("Window {}: utility window, ignoring fullscreen", window_id);
            return Ok(());
        }

        let target = if enter {
            if window.state == WindowState::Fullscreen {
                tracing::debug!("Window {} already fullscreen", window_id);
                return Ok(());
            }
            record.remember_before_fullscreen(window.state);
            WindowState::Fullscreen
        } else {
            record.restore_state()
        };

        tracing::info!("Window {}: {} -> {}", window_id, window.state, target);
        self.host.set_window_state(window_id, target).await
    }

    pub async fn navigate_back(&self, tab_id: TabId) -> HostResult<()> {
        tracing::info!("Tab {}: navigating back", tab_id);
        self.host.go_back(tab_id).await
    }

    pub async fn navigate_forward(&self, tab_id: TabId) -> HostResult<()> {
        tracing::info!("Tab {}: navigating forward", tab_id);
        self.host.go_forward(tab_id).await
    }

    /// Get the record for a window, if one has been created
    pub fn window_record(&self, window_id: WindowId) -> Option<&WindowRecord> {
        self.records.get(&window_id)
    }

    async fn record(&mut self, window_id: WindowId) -> HostResult<&mut WindowRecord> {
        let window = self.host.window(window_id).await?;
        Ok(self.record_from(&window))
    }

    /// Create the record lazily and refresh its class from a host snapshot
    fn record_from(&mut self, window: &WindowInfo) -> &mut WindowRecord {
        let class = WindowClass::from(window.kind);
        let record = self
            .records
            .entry(window.id)
            .or_insert_with(|| WindowRecord::new(window.id, class));
        record.class = class;
        record
    }
}
