//! Spatial zone classification for pointer samples

use serde::{Deserialize, Serialize};

/// Horizontal edge of the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// Where a pointer sample falls horizontally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeZone {
    /// Away from both edges
    Outside,
    /// Cosmetic glow only
    Halo(Side),
    /// Arms navigation
    Trigger(Side),
}

impl EdgeZone {
    pub fn side(&self) -> Option<Side> {
        match self {
            EdgeZone::Outside => None,
            EdgeZone::Halo(side) | EdgeZone::Trigger(side) => Some(*side),
        }
    }
}

/// Halo zones are this many trigger widths wide
pub const HALO_ZONE_FACTOR: u32 = 3;

/// Classify the horizontal position against both edges.
///
/// The left edge wins when the zones overlap on a narrow viewport.
pub fn classify_edge(x: i32, viewport_width: u32, trigger_width: u32) -> EdgeZone {
    let x = i64::from(x);
    let width = i64::from(viewport_width);
    let trigger = i64::from(trigger_width);
    let halo = trigger * i64::from(HALO_ZONE_FACTOR);

    if x <= trigger {
        EdgeZone::Trigger(Side::Left)
    } else if x <= halo {
        EdgeZone::Halo(Side::Left)
    } else if x >= width - trigger {
        EdgeZone::Trigger(Side::Right)
    } else if x >= width - halo {
        EdgeZone::Halo(Side::Right)
    } else {
        EdgeZone::Outside
    }
}

/// Whether a vertical position lies in the top trigger band
pub fn in_top_band(y: i32, trigger_height: u32) -> bool {
    i64::from(y) <= i64::from(trigger_height)
}
