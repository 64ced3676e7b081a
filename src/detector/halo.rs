//! The edge glow shown while the pointer hovers near a navigable edge

use std::time::Duration;

use super::state::DetectorConfig;
use super::zones::Side;

/// How a halo should be drawn
#[derive(Debug, Clone, PartialEq)]
pub struct HaloStyle {
    pub side: Side,
    /// Vertical center of the glow
    pub y: i32,
    pub width: u32,
    pub color: String,
    /// Time the glow takes to reach full strength
    pub fade_in: Duration,
}

impl HaloStyle {
    pub fn new(side: Side, y: i32, config: &DetectorConfig) -> Self {
        Self {
            side,
            y,
            width: config.halo_width,
            color: config.halo_color.clone(),
            fade_in: config.edge_hover_delay,
        }
    }
}

/// Rendering surface for the halo, provided by the page
pub trait HaloSurface: Send {
    fn show(&mut self, style: &HaloStyle);

    /// Follow the pointer vertically
    fn move_to(&mut self, y: i32);

    fn remove(&mut self);
}

/// Tracks the one halo a detector may have on screen
#[derive(Debug, Default)]
pub struct HaloAffordance {
    shown: Option<Side>,
}

impl HaloAffordance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the halo on `side` at `y`, replacing one on the other side
    pub fn track(&mut self, surface: &mut dyn HaloSurface, side: Side, y: i32, config: &DetectorConfig) {
        match self.shown {
            Some(current) if current == side => surface.move_to(y),
            Some(_) => {
                surface.remove();
                surface.show(&HaloStyle::new(side, y, config));
                self.shown = Some(side);
            }
            None => {
                surface.show(&HaloStyle::new(side, y, config));
                self.shown = Some(side);
            }
        }
    }

    /// Remove the halo if one is shown
    pub fn clear(&mut self, surface: &mut dyn HaloSurface) {
        if self.shown.take().is_some() {
            surface.remove();
        }
    }

    pub fn side(&self) -> Option<Side> {
        self.shown
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    pub enum HaloEvent {
        Show(Side, i32),
        Move(i32),
        Remove,
    }

    /// Surface that records what it was asked to draw
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSurface {
        pub events: Arc<Mutex<Vec<HaloEvent>>>,
    }

    impl RecordingSurface {
        pub fn events(&self) -> Vec<HaloEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn visible(&self) -> bool {
            let events = self.events.lock().unwrap();
            let shows = events.iter().filter(|e| matches!(e, HaloEvent::Show(..))).count();
            let removes = events.iter().filter(|e| **e == HaloEvent::Remove).count();
            shows > removes
        }
    }

    impl HaloSurface for RecordingSurface {
        fn show(&mut self, style: &HaloStyle) {
            self.events.lock().unwrap().push(HaloEvent::Show(style.side, style.y));
        }

        fn move_to(&mut self, y: i32) {
            self.events.lock().unwrap().push(HaloEvent::Move(y));
        }

        fn remove(&mut self) {
            self.events.lock().unwrap().push(HaloEvent::Remove);
        }
    }
}
