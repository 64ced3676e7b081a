//! Cancellable one-shot timers
//!
//! Arming spawns a sleep that reports back on the detector's timer queue.
//! Every arm gets a fresh generation, so an expiry that was already queued
//! when the timer got cancelled or re-armed is recognized as stale.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Which detector timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Debounce before (re-)entering fullscreen
    Fullscreen,
    /// Hover delay before edge navigation
    Edge,
}

/// Expiry notification delivered on the timer queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub generation: u64,
}

/// A one-shot timer with arm / cancel / fire primitives
#[derive(Debug)]
pub struct Timer {
    kind: TimerKind,
    generation: u64,
    armed: bool,
    task: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<TimerFired>,
}

impl Timer {
    pub fn new(kind: TimerKind, tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            kind,
            generation: 0,
            armed: false,
            task: None,
            tx,
        }
    }

    /// Start (or restart) the timer
    pub fn arm(&mut self, delay: Duration) {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);

        let fired = TimerFired {
            kind: self.kind,
            generation: self.generation,
        };
        let tx = self.tx.clone();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(fired);
        }));
        self.armed = true;
    }

    /// Stop the timer; returns whether it was armed
    pub fn cancel(&mut self) -> bool {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        std::mem::replace(&mut self.armed, false)
    }

    /// Accept an expiry. Only the latest arm of a still-armed timer is accepted.
    pub fn fire(&mut self, fired: TimerFired) -> bool {
        if !self.armed || fired.kind != self.kind || fired.generation != self.generation {
            return false;
        }
        self.armed = false;
        self.task = None;
        true
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}
