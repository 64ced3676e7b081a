//! Simulation module - Replays recorded pointer traces through a detector
//!
//! The simulated page lives in a `VirtualHost` tab, so history depth and the
//! window state follow whatever the controller does to them.

mod page;

pub use page::*;

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::controller::{
    Controller, HostResult, ProtectedContexts, SharedController, VirtualHost, WindowKind,
    WindowState,
};
use crate::detector::{DetectorHandle, SettingsPatch};
use crate::protocol::{Request, TabId, WindowId};

/// Trace errors
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid trace: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Invalid settings change at step {step}: {source}")]
    Settings {
        step: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub type TraceResult<T> = Result<T, TraceError>;

/// One recorded input
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum TraceStep {
    /// Pointer sample in a viewport `width` pixels wide
    Move { x: i32, y: i32, width: u32 },
    /// Let time pass
    Wait { ms: u64 },
    /// Extension toggled from the toolbar
    Toggle { enabled: bool },
    /// Settings change notification, shaped `{key: {newValue}}`
    Settings { changes: Value },
    /// The hosting page goes away
    Invalidate,
}

/// A recorded sequence of steps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    pub steps: Vec<TraceStep>,
}

impl Trace {
    pub fn from_json(json: &str) -> TraceResult<Self> {
        let steps = serde_json::from_str(json).map_err(TraceError::Parse)?;
        Ok(Self { steps })
    }

    pub fn load(path: &Path) -> TraceResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Total time spent in `wait` steps
    pub fn duration(&self) -> Duration {
        self.steps
            .iter()
            .map(|step| match step {
                TraceStep::Wait { ms } => Duration::from_millis(*ms),
                _ => Duration::ZERO,
            })
            .sum()
    }
}

/// Feed a trace to a running detector, in order
pub async fn replay(trace: &Trace, handle: &DetectorHandle, page: &SimPage) -> TraceResult<()> {
    for (index, step) in trace.steps.iter().enumerate() {
        tracing::debug!("Step {}: {:?}", index, step);
        match step {
            TraceStep::Move { x, y, width } => handle.pointer_move(*x, *y, *width).await,
            TraceStep::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            TraceStep::Toggle { enabled } => {
                let reply = handle
                    .host_message(Request::ToggleExtension { enabled: *enabled })
                    .await;
                tracing::debug!("toggleExtension reply: {:?}", reply);
            }
            TraceStep::Settings { changes } => {
                let patch = SettingsPatch::from_change_notification(changes)
                    .map_err(|source| TraceError::Settings { step: index, source })?;
                handle.settings_changed(patch).await;
            }
            TraceStep::Invalidate => page.invalidate(),
        }
    }
    Ok(())
}

/// A virtual browser with one window and one tab for a simulated page
pub struct SimWorld {
    pub host: VirtualHost,
    pub window_id: WindowId,
    pub tab_id: TabId,
}

impl SimWorld {
    /// Open a maximized window whose tab visited `history` in order
    pub fn new(history: &[&str]) -> HostResult<Self> {
        let host = VirtualHost::new();
        let window_id = host.open_window(WindowKind::Normal, WindowState::Maximized);
        let mut history = history.iter();
        let first = history.next().copied().unwrap_or("about:blank");
        let tab_id = host.open_tab(window_id, first)?;
        for url in history {
            host.navigate(tab_id, url)?;
        }
        Ok(Self {
            host,
            window_id,
            tab_id,
        })
    }

    /// A controller driving this world's windows
    pub fn controller(&self, policy: ProtectedContexts) -> SharedController {
        Controller::new(std::sync::Arc::new(self.host.clone()), policy).into_shared()
    }

    pub fn page(&self) -> SimPage {
        SimPage::new(self.host.clone(), self.window_id, self.tab_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, LoopbackTransport, RetryPolicy};
    use crate::detector::{self, DetectorConfig, EdgeDetector};
    use std::sync::Arc;

    const TRACE: &str = r#"[
        {"step": "toggle", "enabled": true},
        {"step": "move", "x": 600, "y": 4, "width": 1200},
        {"step": "wait", "ms": 100},
        {"step": "move", "x": 600, "y": 400, "width": 1200},
        {"step": "wait", "ms": 1000},
        {"step": "settings", "changes": {"isEdgeNavigationEnabled": {"newValue": true}}},
        {"step": "move", "x": 3, "y": 400, "width": 1200},
        {"step": "wait", "ms": 1500},
        {"step": "invalidate"},
        {"step": "move", "x": 600, "y": 2, "width": 1200}
    ]"#;

    #[test]
    fn test_parse_trace() {
        let trace = tokio_test::assert_ok!(Trace::from_json(TRACE));
        assert_eq!(trace.steps.len(), 10);
        assert_eq!(trace.steps[8], TraceStep::Invalidate);
        assert_eq!(trace.duration(), Duration::from_millis(2600));
    }

    #[test]
    fn test_unknown_step_rejected() {
        let result = Trace::from_json(r#"[{"step": "scroll", "dy": 3}]"#);
        assert!(matches!(result, Err(TraceError::Parse(_))));
    }

    #[test]
    fn test_world_history() {
        let world = SimWorld::new(&["https://a.test/", "https://b.test/"]).unwrap();
        let page = world.page();

        use crate::detector::PageContext;
        assert_eq!(page.history_length(), 2);
        assert!(!page.can_go_forward());
        assert_eq!(page.sender().url, "https://b.test/");
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_in_process() {
        let world = SimWorld::new(&["https://a.test/", "https://b.test/"]).unwrap();
        let policy = ProtectedContexts::new();
        let controller = world.controller(policy.clone());
        let channel = Channel::new(
            Arc::new(LoopbackTransport::new(&controller)),
            RetryPolicy::default(),
        );
        let page = world.page();

        let mut detector = EdgeDetector::attach(
            DetectorConfig::default(),
            SettingsPatch::default(),
            channel,
            Box::new(page.clone()),
            Box::new(LogSurface),
            &policy,
        )
        .unwrap();
        detector.start().unwrap();
        let (handle, task) = detector::spawn(detector);

        let trace = Trace::from_json(TRACE).unwrap();
        replay(&trace, &handle, &page).await.unwrap();
        drop(handle);
        task.await.unwrap();

        // Re-entered fullscreen, then navigated back; the last move was ignored
        assert_eq!(
            world.host.window_state(world.window_id),
            Some(WindowState::Fullscreen)
        );
        assert_eq!(
            world.host.current_url(world.tab_id).as_deref(),
            Some("https://a.test/")
        );
        assert!(!page.is_listening());
    }

    #[tokio::test]
    async fn test_bad_settings_step() {
        let world = SimWorld::new(&["https://a.test/"]).unwrap();
        let policy = ProtectedContexts::new();
        let controller = world.controller(policy.clone());
        let channel = Channel::new(
            Arc::new(LoopbackTransport::new(&controller)),
            RetryPolicy::default(),
        );
        let page = world.page();
        let detector = EdgeDetector::attach(
            DetectorConfig::default(),
            SettingsPatch::default(),
            channel,
            Box::new(page.clone()),
            Box::new(LogSurface),
            &policy,
        )
        .unwrap();
        let (handle, _task) = detector::spawn(detector);

        let trace = Trace::from_json(
            r#"[{"step": "settings", "changes": {"enabled": {"newValue": "yes"}}}]"#,
        )
        .unwrap();
        let result = replay(&trace, &handle, &page).await;
        assert!(matches!(result, Err(TraceError::Settings { step: 0, .. })));
    }
}
