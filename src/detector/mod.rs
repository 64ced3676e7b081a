//! Edge detector - Turns pointer motion into fullscreen and navigation commands
//!
//! Handles:
//! - The top trigger band (leave fullscreen instantly, re-enter debounced)
//! - Left/right edge zones (halo glow, hover-delayed history navigation)
//! - Self-disablement once the hosting page goes away

mod halo;
mod page;
mod settings;
mod state;
mod timer;
mod zones;

pub use halo::{HaloAffordance, HaloStyle, HaloSurface};
pub use page::PageContext;
pub use settings::SettingsPatch;
pub use state::{DetectorConfig, DetectorState};
pub use timer::{TimerFired, TimerKind};
pub use zones::{classify_edge, in_top_band, EdgeZone, Side};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::channel::Channel;
use crate::controller::ProtectedContexts;
use crate::protocol::{Envelope, Request, Response};

/// Detector errors
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Protected context: {0}")]
    ProtectedContext(String),

    #[error("Hosting context is no longer valid")]
    ContextInvalid,
}

pub type DetectorResult<T> = Result<T, DetectorError>;

/// Inputs delivered to a running detector
#[derive(Debug)]
pub enum DetectorEvent {
    PointerMove {
        x: i32,
        y: i32,
        viewport_width: u32,
    },
    SettingsChanged(SettingsPatch),
    HostMessage {
        request: Request,
        reply: oneshot::Sender<Option<Response>>,
    },
}

/// Per-page edge interaction state machine
pub struct EdgeDetector {
    config: DetectorConfig,
    state: DetectorState,
    channel: Channel,
    page: Box<dyn PageContext>,
    surface: Box<dyn HaloSurface>,
    halo: HaloAffordance,
    timer_rx: mpsc::UnboundedReceiver<TimerFired>,
}

impl EdgeDetector {
    /// Attach a detector to a page, refusing protected contexts
    pub fn attach(
        config: DetectorConfig,
        settings: SettingsPatch,
        channel: Channel,
        page: Box<dyn PageContext>,
        surface: Box<dyn HaloSurface>,
        policy: &ProtectedContexts,
    ) -> DetectorResult<Self> {
        let url = page.sender().url;
        if policy.is_protected(&url) {
            return Err(DetectorError::ProtectedContext(url));
        }

        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let mut detector = Self {
            config,
            state: DetectorState::new(timer_tx),
            channel,
            page,
            surface,
            halo: HaloAffordance::new(),
            timer_rx,
        };
        settings.apply(&mut detector.config, &mut detector.state);
        Ok(detector)
    }

    /// Register listeners and schedule the initial fullscreen entry
    pub fn start(&mut self) -> DetectorResult<()> {
        if !self.check_connection() {
            return Err(DetectorError::ContextInvalid);
        }
        self.page.add_listeners();

        if self.state.enabled {
            self.state
                .pending_fullscreen_timer
                .arm(self.config.initial_load_delay);
        }
        tracing::info!(
            "Detector attached to {} (enabled: {}, edge navigation: {})",
            self.page.sender().url,
            self.state.enabled,
            self.state.edge_navigation_enabled
        );
        Ok(())
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Whether the detector has permanently disabled itself
    pub fn is_inert(&self) -> bool {
        !self.state.connection_valid
    }

    pub fn halo_side(&self) -> Option<Side> {
        self.halo.side()
    }

    /// Liveness check; the first failure tears everything down for good
    fn check_connection(&mut self) -> bool {
        if !self.state.connection_valid {
            return false;
        }
        if self.page.is_valid() {
            return true;
        }
        self.teardown();
        false
    }

    fn teardown(&mut self) {
        tracing::info!("Hosting context invalidated, detector going inert");
        self.state.connection_valid = false;
        self.state.cancel_timers();
        self.halo.clear(self.surface.as_mut());
        self.page.remove_listeners();
    }

    /// Send a query; absent when the context is gone or the controller did not answer
    async fn query(&mut self, request: Request) -> Option<Response> {
        if !self.check_connection() {
            return None;
        }
        let envelope = Envelope::new(self.page.sender(), request);
        self.channel.request(&envelope).await
    }

    /// Send a command; returns whether it went out
    async fn command(&mut self, request: Request) -> bool {
        if !self.check_connection() {
            return false;
        }
        tracing::debug!("Issuing {}", request.action());
        let envelope = Envelope::new(self.page.sender(), request);
        self.channel.request(&envelope).await;
        true
    }

    /// Handle one pointer sample
    pub async fn on_pointer_move(&mut self, x: i32, y: i32, viewport_width: u32) {
        if !self.check_connection() {
            return;
        }
        if !self.state.enabled {
            // Disabled by a settings push; drop whatever was still pending
            self.state.pending_fullscreen_timer.cancel();
            self.leave_edges();
            return;
        }

        self.track_top_band(y).await;

        if self.state.edge_navigation_enabled {
            self.track_edges(x, y, viewport_width);
        } else {
            self.leave_edges();
        }
    }

    async fn track_top_band(&mut self, y: i32) {
        if in_top_band(y, self.config.trigger_height) {
            self.state.pending_fullscreen_timer.cancel();
            if self.state.fullscreen_active {
                self.exit_fullscreen().await;
            }
        } else if !self.state.fullscreen_active {
            // Restarting on every qualifying move coalesces a burst into one entry
            self.state
                .pending_fullscreen_timer
                .arm(self.config.re_enter_delay);
        }
    }

    fn track_edges(&mut self, x: i32, y: i32, viewport_width: u32) {
        let zone = classify_edge(x, viewport_width, self.config.edge_trigger_width);
        let side = match zone.side() {
            Some(side) if self.can_navigate(side) => side,
            _ => {
                self.leave_edges();
                return;
            }
        };

        if let EdgeZone::Trigger(_) = zone {
            if self.state.hovering_edge != Some(side) {
                self.disarm_edge();
                self.state
                    .pending_edge_timer
                    .arm(self.config.edge_hover_delay);
                self.state.hovering_edge = Some(side);
                tracing::debug!("Hovering {:?} edge", side);
            }
        } else {
            self.disarm_edge();
        }

        self.halo
            .track(self.surface.as_mut(), side, y, &self.config);
    }

    fn can_navigate(&self, side: Side) -> bool {
        match side {
            Side::Left => self.page.history_length() > 1,
            Side::Right => self.page.can_go_forward(),
        }
    }

    /// Cancel edge navigation but keep the halo
    fn disarm_edge(&mut self) {
        self.state.pending_edge_timer.cancel();
        self.state.hovering_edge = None;
    }

    /// Cancel edge navigation and remove the halo
    fn leave_edges(&mut self) {
        self.disarm_edge();
        self.halo.clear(self.surface.as_mut());
    }

    /// Merge pushed settings; pending timers are left as they are
    pub fn on_settings_changed(&mut self, patch: SettingsPatch) {
        if !self.state.connection_valid || patch.is_empty() {
            return;
        }
        tracing::debug!("Settings changed: {:?}", patch);
        patch.apply(&mut self.config, &mut self.state);
    }

    /// Handle a message pushed by the extension (only `toggleExtension`)
    pub async fn on_host_message(&mut self, request: Request) -> Option<Response> {
        if !self.check_connection() {
            return None;
        }

        match request {
            Request::ToggleExtension { enabled } => {
                self.set_enabled(enabled).await;
                Some(Response::Received { received: true })
            }
            other => {
                tracing::debug!("Ignoring {} addressed to page", other.action());
                None
            }
        }
    }

    async fn set_enabled(&mut self, enabled: bool) {
        tracing::info!("Extension {}", if enabled { "enabled" } else { "disabled" });
        self.state.enabled = enabled;

        if enabled {
            if !self.state.fullscreen_active {
                self.state.pending_fullscreen_timer.cancel();
                self.enter_fullscreen_if_allowed().await;
            }
        } else {
            self.state.pending_fullscreen_timer.cancel();
            self.leave_edges();
            if self.state.fullscreen_active {
                self.exit_fullscreen().await;
            }
        }
    }

    /// Enter fullscreen when the window is usable and the tab has focus
    async fn enter_fullscreen_if_allowed(&mut self) -> bool {
        // An absent checkWindow answer must not block the detector forever
        let disabled = matches!(
            self.query(Request::CheckWindow).await,
            Some(Response::Window {
                is_disabled_window: true
            })
        );
        if disabled {
            tracing::debug!("Window is disabled for fullscreen");
            return false;
        }

        // An absent checkFocus answer counts as not focused
        let focused = matches!(
            self.query(Request::CheckFocus).await,
            Some(Response::Focus { is_active: true })
        );
        if !focused {
            tracing::debug!("Tab or window not focused, staying windowed");
            return false;
        }

        if self
            .command(Request::ToggleFullscreen {
                enter_fullscreen: true,
            })
            .await
        {
            self.state.fullscreen_active = true;
            return true;
        }
        false
    }

    async fn exit_fullscreen(&mut self) {
        if self
            .command(Request::ToggleFullscreen {
                enter_fullscreen: false,
            })
            .await
        {
            self.state.fullscreen_active = false;
        }
    }

    /// Handle a timer expiry from the timer queue
    pub async fn on_timer(&mut self, fired: TimerFired) {
        if !self.check_connection() {
            return;
        }

        match fired.kind {
            TimerKind::Fullscreen => {
                if !self.state.pending_fullscreen_timer.fire(fired) {
                    return;
                }
                if self.state.enabled && !self.state.fullscreen_active {
                    self.enter_fullscreen_if_allowed().await;
                }
            }
            TimerKind::Edge => {
                if !self.state.pending_edge_timer.fire(fired) {
                    return;
                }
                let Some(side) = self.state.hovering_edge.take() else {
                    return;
                };
                self.halo.clear(self.surface.as_mut());
                if !self.state.enabled || !self.state.edge_navigation_enabled {
                    tracing::debug!("Edge navigation turned off while hovering, not navigating");
                    return;
                }
                let request = match side {
                    Side::Left => Request::NavigateBack,
                    Side::Right => Request::NavigateForward,
                };
                self.command(request).await;
            }
        }
    }

    /// Wait for the next timer expiry
    pub async fn next_timer(&mut self) -> Option<TimerFired> {
        self.timer_rx.recv().await
    }

    /// Process events until every handle is dropped or the detector goes inert
    pub async fn run(mut self, mut events: mpsc::Receiver<DetectorEvent>) {
        enum Step {
            Event(DetectorEvent),
            Timer(TimerFired),
        }

        loop {
            let step = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => Step::Event(event),
                    None => break,
                },
                Some(fired) = self.timer_rx.recv() => Step::Timer(fired),
            };

            match step {
                Step::Event(DetectorEvent::PointerMove {
                    x,
                    y,
                    viewport_width,
                }) => self.on_pointer_move(x, y, viewport_width).await,
                Step::Event(DetectorEvent::SettingsChanged(patch)) => {
                    self.on_settings_changed(patch)
                }
                Step::Event(DetectorEvent::HostMessage { request, reply }) => {
                    let response = self.on_host_message(request).await;
                    let _ = reply.send(response);
                }
                Step::Timer(fired) => self.on_timer(fired).await,
            }

            if self.is_inert() {
                break;
            }
        }

        self.state.cancel_timers();
        self.halo.clear(self.surface.as_mut());
        tracing::debug!("Detector loop finished");
    }
}

/// Sending side of a running detector
#[derive(Clone)]
pub struct DetectorHandle {
    tx: mpsc::Sender<DetectorEvent>,
}

impl DetectorHandle {
    pub async fn pointer_move(&self, x: i32, y: i32, viewport_width: u32) {
        let _ = self
            .tx
            .send(DetectorEvent::PointerMove {
                x,
                y,
                viewport_width,
            })
            .await;
    }

    pub async fn settings_changed(&self, patch: SettingsPatch) {
        let _ = self.tx.send(DetectorEvent::SettingsChanged(patch)).await;
    }

    /// Deliver a host message and wait for the detector's reply
    pub async fn host_message(&self, request: Request) -> Option<Response> {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(DetectorEvent::HostMessage { request, reply })
            .await
            .is_err()
        {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Whether the detector loop has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Run a detector on its own task
pub fn spawn(detector: EdgeDetector) -> (DetectorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(256);
    let task = tokio::spawn(detector.run(rx));
    (DetectorHandle { tx }, task)
}

#[cfg(test)]
mod tests {
    use super::halo::testing::{HaloEvent, RecordingSurface};
    use super::page::testing::TestPage;
    use super::*;
    use crate::channel::testing::ScriptedTransport;
    use crate::channel::RetryPolicy;
    use std::sync::Arc;
    use std::time::Duration;

    const WIDTH: u32 = 1000;

    struct Harness {
        detector: EdgeDetector,
        transport: Arc<ScriptedTransport>,
        page: TestPage,
        surface: RecordingSurface,
    }

    fn harness(settings: SettingsPatch) -> Harness {
        let transport = ScriptedTransport::new();
        transport.answer(Request::CheckFocus, Some(Response::Focus { is_active: true }));
        transport.answer(
            Request::CheckWindow,
            Some(Response::Window {
                is_disabled_window: false,
            }),
        );
        let page = TestPage::new("https://example.com");
        let surface = RecordingSurface::default();
        let channel = Channel::new(transport.clone(), RetryPolicy::default());

        let mut detector = EdgeDetector::attach(
            DetectorConfig::default(),
            settings,
            channel,
            Box::new(page.clone()),
            Box::new(surface.clone()),
            &ProtectedContexts::new(),
        )
        .unwrap();
        detector.start().unwrap();

        Harness {
            detector,
            transport,
            page,
            surface,
        }
    }

    fn enabled() -> SettingsPatch {
        SettingsPatch {
            enabled: Some(true),
            ..Default::default()
        }
    }

    fn with_edges() -> SettingsPatch {
        SettingsPatch {
            enabled: Some(true),
            is_edge_navigation_enabled: Some(true),
            ..Default::default()
        }
    }

    fn enter() -> Request {
        Request::ToggleFullscreen {
            enter_fullscreen: true,
        }
    }

    fn exit() -> Request {
        Request::ToggleFullscreen {
            enter_fullscreen: false,
        }
    }

    /// Deliver timer expiries until none arrives within `window`
    async fn drain_timers(detector: &mut EdgeDetector, window: Duration) {
        while let Ok(Some(fired)) = tokio::time::timeout(window, detector.next_timer()).await {
            detector.on_timer(fired).await;
        }
    }

    async fn fullscreen_harness() -> Harness {
        let mut h = harness(enabled());
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;
        assert!(h.detector.state().fullscreen_active);
        h
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_load_enters_fullscreen() {
        let mut h = harness(enabled());
        assert!(h.page.is_listening());

        let started = tokio::time::Instant::now();
        let fired = h.detector.next_timer().await.unwrap();
        assert!(started.elapsed() >= h.detector.config().initial_load_delay);
        h.detector.on_timer(fired).await;

        assert_eq!(
            h.transport.requests(),
            vec![Request::CheckWindow, Request::CheckFocus, enter()]
        );
        assert!(h.detector.state().fullscreen_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_detector_does_nothing() {
        let mut h = harness(SettingsPatch::default());
        h.detector.on_pointer_move(500, 300, WIDTH).await;
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;

        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_top_band_exits_immediately_once() {
        let mut h = fullscreen_harness().await;

        h.detector.on_pointer_move(500, 5, WIDTH).await;
        assert_eq!(h.transport.commands(), vec![enter(), exit()]);
        assert!(!h.detector.state().fullscreen_active);

        h.detector.on_pointer_move(500, 0, WIDTH).await;
        h.detector.on_pointer_move(500, 10, WIDTH).await;
        assert_eq!(h.transport.commands(), vec![enter(), exit()]);
        assert!(!h.detector.state().pending_fullscreen_timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_moves_coalesce_into_one_entry() {
        let mut h = fullscreen_harness().await;
        h.detector.on_pointer_move(500, 5, WIDTH).await;

        for i in 0..10 {
            h.detector.on_pointer_move(500, 100 + i * 10, WIDTH).await;
            tokio::time::advance(Duration::from_millis(100)).await;
        }
        let last_move = tokio::time::Instant::now();

        let fired = h.detector.next_timer().await.unwrap();
        let waited = last_move.elapsed();
        h.detector.on_timer(fired).await;
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;

        // One 100ms step had already elapsed after the last move
        assert!(waited >= h.detector.config().re_enter_delay - Duration::from_millis(100));
        assert_eq!(h.transport.commands(), vec![enter(), exit(), enter()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returning_to_band_cancels_pending_entry() {
        let mut h = fullscreen_harness().await;
        h.detector.on_pointer_move(500, 5, WIDTH).await;
        h.detector.on_pointer_move(500, 300, WIDTH).await;
        h.detector.on_pointer_move(500, 3, WIDTH).await;
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;

        assert_eq!(h.transport.commands(), vec![enter(), exit()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unfocused_tab_does_not_enter() {
        let mut h = harness(enabled());
        h.transport
            .answer(Request::CheckFocus, Some(Response::Focus { is_active: false }));
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;

        assert!(h.transport.commands().is_empty());
        assert!(!h.detector.state().fullscreen_active);
        assert!(!h.detector.state().pending_fullscreen_timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_answers_fall_back_conservatively() {
        let mut h = harness(enabled());
        h.transport.answer(Request::CheckWindow, None);
        h.transport.answer(Request::CheckFocus, None);
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;

        // checkWindow absent is not blocking, so checkFocus is still asked
        assert_eq!(
            h.transport.requests(),
            vec![Request::CheckWindow, Request::CheckFocus]
        );
        assert!(!h.detector.state().fullscreen_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_window_does_not_enter() {
        let mut h = harness(enabled());
        h.transport.answer(
            Request::CheckWindow,
            Some(Response::Window {
                is_disabled_window: true,
            }),
        );
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;

        assert_eq!(h.transport.requests(), vec![Request::CheckWindow]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_enabled_twice_enters_once() {
        let mut h = harness(SettingsPatch::default());

        let reply = h
            .detector
            .on_host_message(Request::ToggleExtension { enabled: true })
            .await;
        assert_eq!(reply, Some(Response::Received { received: true }));
        h.detector
            .on_host_message(Request::ToggleExtension { enabled: true })
            .await;

        assert_eq!(h.transport.commands(), vec![enter()]);
        assert!(h.detector.state().fullscreen_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_disabled_exits_and_cancels() {
        let mut h = with_fullscreen_and_edges().await;
        h.detector.on_pointer_move(5, 300, WIDTH).await;
        assert!(h.detector.state().pending_edge_timer.is_armed());

        h.detector
            .on_host_message(Request::ToggleExtension { enabled: false })
            .await;

        assert_eq!(h.transport.commands(), vec![enter(), exit()]);
        assert!(!h.detector.state().pending_edge_timer.is_armed());
        assert!(!h.detector.state().pending_fullscreen_timer.is_armed());
        assert!(!h.surface.visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_host_messages_are_ignored() {
        let mut h = harness(enabled());
        assert_eq!(h.detector.on_host_message(Request::CheckFocus).await, None);
    }

    async fn with_fullscreen_and_edges() -> Harness {
        let mut h = harness(with_edges());
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;
        assert!(h.detector.state().fullscreen_active);
        h
    }

    #[tokio::test(start_paused = true)]
    async fn test_left_hover_navigates_back_once() {
        let mut h = with_fullscreen_and_edges().await;

        h.detector.on_pointer_move(5, 300, WIDTH).await;
        assert_eq!(h.detector.state().hovering_edge, Some(Side::Left));

        let started = tokio::time::Instant::now();
        let fired = h.detector.next_timer().await.unwrap();
        assert!(started.elapsed() >= h.detector.config().edge_hover_delay);
        h.detector.on_timer(fired).await;
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;

        assert_eq!(
            h.transport.commands(),
            vec![enter(), Request::NavigateBack]
        );
        assert_eq!(h.detector.state().hovering_edge, None);
        assert!(!h.surface.visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_halo_zone_cancels_navigation() {
        let mut h = with_fullscreen_and_edges().await;

        h.detector.on_pointer_move(5, 300, WIDTH).await;
        tokio::time::advance(Duration::from_millis(400)).await;
        h.detector.on_pointer_move(500, 300, WIDTH).await;
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;

        assert_eq!(h.transport.commands(), vec![enter()]);
        assert!(!h.surface.visible());
        assert_eq!(h.detector.halo_side(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_halo_zone_keeps_halo_but_disarms() {
        let mut h = with_fullscreen_and_edges().await;

        h.detector.on_pointer_move(5, 300, WIDTH).await;
        h.detector.on_pointer_move(40, 320, WIDTH).await;
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;

        assert_eq!(h.transport.commands(), vec![enter()]);
        assert_eq!(h.detector.state().hovering_edge, None);
        assert_eq!(h.detector.halo_side(), Some(Side::Left));
        assert_eq!(
            h.surface.events(),
            vec![HaloEvent::Show(Side::Left, 300), HaloEvent::Move(320)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_halo_tracks_vertical_position() {
        let mut h = with_fullscreen_and_edges().await;

        h.detector.on_pointer_move(5, 300, WIDTH).await;
        h.detector.on_pointer_move(5, 350, WIDTH).await;
        h.detector.on_pointer_move(8, 420, WIDTH).await;

        assert_eq!(
            h.surface.events(),
            vec![
                HaloEvent::Show(Side::Left, 300),
                HaloEvent::Move(350),
                HaloEvent::Move(420)
            ]
        );
        // Staying in the trigger zone does not restart the hover delay
        assert!(h.detector.state().pending_edge_timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_sides_rearms_for_new_side() {
        let mut h = with_fullscreen_and_edges().await;

        h.detector.on_pointer_move(5, 300, WIDTH).await;
        tokio::time::advance(Duration::from_millis(600)).await;
        h.detector.on_pointer_move(995, 300, WIDTH).await;
        assert_eq!(h.detector.state().hovering_edge, Some(Side::Right));

        drain_timers(&mut h.detector, Duration::from_secs(2)).await;
        assert_eq!(
            h.transport.commands(),
            vec![enter(), Request::NavigateForward]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_edges_without_history_stay_dark() {
        let mut h = with_fullscreen_and_edges().await;
        h.page
            .history_length
            .store(1, std::sync::atomic::Ordering::SeqCst);
        h.page
            .forward
            .store(false, std::sync::atomic::Ordering::SeqCst);

        h.detector.on_pointer_move(5, 300, WIDTH).await;
        h.detector.on_pointer_move(995, 300, WIDTH).await;
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;

        assert_eq!(h.transport.commands(), vec![enter()]);
        assert!(h.surface.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_disable_mid_hover_does_not_navigate() {
        let mut h = with_fullscreen_and_edges().await;
        h.detector.on_pointer_move(5, 300, WIDTH).await;
        assert!(h.detector.state().pending_edge_timer.is_armed());

        h.detector.on_settings_changed(SettingsPatch {
            enabled: Some(false),
            ..Default::default()
        });
        h.detector.on_pointer_move(500, 300, WIDTH).await;

        assert!(!h.detector.state().pending_edge_timer.is_armed());
        assert!(!h.surface.visible());
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;
        assert_eq!(h.transport.commands(), vec![enter()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_disable_without_moving_does_not_navigate() {
        let mut h = with_fullscreen_and_edges().await;
        h.detector.on_pointer_move(5, 300, WIDTH).await;

        h.detector.on_settings_changed(SettingsPatch {
            enabled: Some(false),
            ..Default::default()
        });
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;

        assert_eq!(h.transport.commands(), vec![enter()]);
        assert!(!h.surface.visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edge_navigation_turned_off_mid_hover() {
        let mut h = with_fullscreen_and_edges().await;
        h.detector.on_pointer_move(5, 300, WIDTH).await;

        h.detector.on_settings_changed(SettingsPatch {
            is_edge_navigation_enabled: Some(false),
            ..Default::default()
        });
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;
        assert_eq!(h.transport.commands(), vec![enter()]);
        assert!(!h.surface.visible());

        // Moving again with edges off keeps them dark
        h.detector.on_pointer_move(5, 300, WIDTH).await;
        assert!(!h.detector.state().pending_edge_timer.is_armed());
        assert!(!h.surface.visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edge_navigation_setting_gates_edges() {
        let mut h = fullscreen_harness().await;

        h.detector.on_pointer_move(5, 300, WIDTH).await;
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;
        assert_eq!(h.transport.commands(), vec![enter()]);

        h.detector.on_settings_changed(SettingsPatch {
            is_edge_navigation_enabled: Some(true),
            ..Default::default()
        });
        h.detector.on_pointer_move(5, 300, WIDTH).await;
        drain_timers(&mut h.detector, Duration::from_secs(2)).await;
        assert_eq!(
            h.transport.commands(),
            vec![enter(), Request::NavigateBack]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_mid_hover_goes_inert() {
        let mut h = with_fullscreen_and_edges().await;
        h.detector.on_pointer_move(5, 300, WIDTH).await;
        assert!(h.surface.visible());

        h.page.invalidate();
        let fired = h.detector.next_timer().await.unwrap();
        h.detector.on_timer(fired).await;

        assert!(h.detector.is_inert());
        assert!(!h.detector.state().pending_edge_timer.is_armed());
        assert!(!h.surface.visible());
        assert!(!h.page.is_listening());
        assert_eq!(h.transport.commands(), vec![enter()]);

        // No resurrection, even if the page claims to be valid again
        h.page.valid.store(true, std::sync::atomic::Ordering::SeqCst);
        h.detector.on_pointer_move(500, 5, WIDTH).await;
        assert_eq!(h.transport.commands(), vec![enter()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_detected_on_pointer_move() {
        let mut h = with_fullscreen_and_edges().await;
        h.detector.on_pointer_move(5, 300, WIDTH).await;

        h.page.invalidate();
        h.detector.on_pointer_move(6, 300, WIDTH).await;

        assert!(h.detector.is_inert());
        assert!(!h.detector.state().pending_edge_timer.is_armed());
        assert_eq!(h.surface.events().last(), Some(&HaloEvent::Remove));
        let waited = tokio::time::timeout(Duration::from_secs(2), h.detector.next_timer()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_protected_page_is_refused() {
        let transport = ScriptedTransport::new();
        let result = EdgeDetector::attach(
            DetectorConfig::default(),
            enabled(),
            Channel::new(transport, RetryPolicy::default()),
            Box::new(TestPage::new("chrome://extensions")),
            Box::new(RecordingSurface::default()),
            &ProtectedContexts::new(),
        );
        assert!(matches!(result, Err(DetectorError::ProtectedContext(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_detector_handles_events_in_order() {
        let h = harness(SettingsPatch::default());
        let transport = h.transport.clone();
        let (handle, task) = spawn(h.detector);

        let reply = handle
            .host_message(Request::ToggleExtension { enabled: true })
            .await;
        assert_eq!(reply, Some(Response::Received { received: true }));

        handle.pointer_move(500, 2, WIDTH).await;
        handle.pointer_move(500, 400, WIDTH).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        drop(handle);
        task.await.unwrap();
        assert_eq!(transport.commands(), vec![enter(), exit(), enter()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_detector_stops_when_inert() {
        let h = harness(enabled());
        let page = h.page.clone();
        let (handle, task) = spawn(h.detector);

        page.invalidate();
        handle.pointer_move(500, 300, WIDTH).await;
        task.await.unwrap();

        assert!(handle.is_closed());
        assert_eq!(
            handle
                .host_message(Request::ToggleExtension { enabled: true })
                .await,
            None
        );
    }
}
