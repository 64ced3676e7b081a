//! Simulated page and halo surface

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::controller::VirtualHost;
use crate::detector::{HaloStyle, HaloSurface, PageContext};
use crate::protocol::{Sender, TabId, WindowId};

/// A page living in a virtual host tab
#[derive(Debug, Clone)]
pub struct SimPage {
    host: VirtualHost,
    window_id: WindowId,
    tab_id: TabId,
    valid: Arc<AtomicBool>,
    listening: Arc<AtomicBool>,
}

impl SimPage {
    pub fn new(host: VirtualHost, window_id: WindowId, tab_id: TabId) -> Self {
        Self {
            host,
            window_id,
            tab_id,
            valid: Arc::new(AtomicBool::new(true)),
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Tear the page down; every clone sees it
    pub fn invalidate(&self) {
        tracing::info!("Page for tab {} invalidated", self.tab_id);
        self.valid.store(false, Ordering::SeqCst);
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

impl PageContext for SimPage {
    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn sender(&self) -> Sender {
        let mut sender = Sender::new(
            self.tab_id,
            self.window_id,
            self.host.current_url(self.tab_id).unwrap_or_default(),
        );
        sender.tab_active = self.host.is_tab_active(self.tab_id);
        sender
    }

    fn history_length(&self) -> usize {
        self.host.history_length(self.tab_id)
    }

    fn can_go_forward(&self) -> bool {
        self.host.can_go_forward(self.tab_id)
    }

    fn add_listeners(&mut self) {
        self.listening.store(true, Ordering::SeqCst);
    }

    fn remove_listeners(&mut self) {
        self.listening.store(false, Ordering::SeqCst);
    }
}

/// Halo surface that only logs what it would draw
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSurface;

impl HaloSurface for LogSurface {
    fn show(&mut self, style: &HaloStyle) {
        tracing::info!(
            "Halo on {:?} edge at y={} ({}px, {}, fade-in {:?})",
            style.side,
            style.y,
            style.width,
            style.color,
            style.fade_in
        );
    }

    fn move_to(&mut self, y: i32) {
        tracing::trace!("Halo moved to y={}", y);
    }

    fn remove(&mut self) {
        tracing::info!("Halo removed");
    }
}
