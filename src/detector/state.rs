//! Detector configuration and mutable state

use std::time::Duration;
use tokio::sync::mpsc;

use super::timer::{Timer, TimerFired, TimerKind};
use super::zones::Side;

/// Tunables of the edge detector
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Height of the top band that reveals the browser chrome (px)
    pub trigger_height: u32,
    /// Quiet time below the band before fullscreen is re-entered
    pub re_enter_delay: Duration,
    /// Delay before the first fullscreen entry after the page loads
    pub initial_load_delay: Duration,
    /// Width of the navigation trigger zone at each side (px)
    pub edge_trigger_width: u32,
    /// Hover time in a trigger zone before navigating
    pub edge_hover_delay: Duration,
    /// Width of the rendered glow (px)
    pub halo_width: u32,
    /// CSS color of the rendered glow
    pub halo_color: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            trigger_height: 10,
            re_enter_delay: Duration::from_millis(500),
            initial_load_delay: Duration::from_millis(500),
            edge_trigger_width: 20,
            edge_hover_delay: Duration::from_millis(800),
            halo_width: 48,
            halo_color: "rgba(66, 133, 244, 0.45)".to_string(),
        }
    }
}

/// Everything a detector remembers between events
#[derive(Debug)]
pub struct DetectorState {
    pub enabled: bool,
    /// What the detector believes; the controller's window may disagree
    pub fullscreen_active: bool,
    pub edge_navigation_enabled: bool,
    /// Cached only; no detector behavior depends on it
    pub tab_auto_focus_enabled: bool,
    /// Set while an edge timer is armed for that side
    pub hovering_edge: Option<Side>,
    pub pending_fullscreen_timer: Timer,
    pub pending_edge_timer: Timer,
    pub connection_valid: bool,
}

impl DetectorState {
    pub fn new(timer_tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            enabled: false,
            fullscreen_active: false,
            edge_navigation_enabled: false,
            tab_auto_focus_enabled: false,
            hovering_edge: None,
            pending_fullscreen_timer: Timer::new(TimerKind::Fullscreen, timer_tx.clone()),
            pending_edge_timer: Timer::new(TimerKind::Edge, timer_tx),
            connection_valid: true,
        }
    }

    /// Cancel both timers and forget the hovered edge
    pub fn cancel_timers(&mut self) {
        self.pending_fullscreen_timer.cancel();
        self.pending_edge_timer.cancel();
        self.hovering_edge = None;
    }
}
