//! Settings pushed into a detector from the settings store

use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

use super::state::{DetectorConfig, DetectorState};

/// A partial update of detector settings; absent fields are left alone.
///
/// Field names match the persisted keys. Delays are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub enabled: Option<bool>,
    pub is_tab_auto_focus_enabled: Option<bool>,
    pub is_edge_navigation_enabled: Option<bool>,
    pub trigger_height: Option<u32>,
    pub re_enter_delay: Option<u64>,
    pub initial_load_delay: Option<u64>,
    pub edge_trigger_width: Option<u32>,
    pub edge_hover_delay: Option<u64>,
    pub halo_width: Option<u32>,
    pub halo_color: Option<String>,
}

impl SettingsPatch {
    /// Build a patch from a change notification shaped `{key: {newValue}}`.
    ///
    /// Removed keys (no `newValue`) and unknown keys are skipped.
    pub fn from_change_notification(changes: &Value) -> Result<Self, serde_json::Error> {
        let mut values = Map::new();
        if let Some(changes) = changes.as_object() {
            for (key, change) in changes {
                if let Some(new_value) = change.get("newValue") {
                    values.insert(key.clone(), new_value.clone());
                }
            }
        }
        serde_json::from_value(Value::Object(values))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge into the local cache
    pub fn apply(self, config: &mut DetectorConfig, state: &mut DetectorState) {
        if let Some(enabled) = self.enabled {
            state.enabled = enabled;
        }
        if let Some(enabled) = self.is_tab_auto_focus_enabled {
            state.tab_auto_focus_enabled = enabled;
        }
        if let Some(enabled) = self.is_edge_navigation_enabled {
            state.edge_navigation_enabled = enabled;
        }
        if let Some(height) = self.trigger_height {
            config.trigger_height = height;
        }
        if let Some(ms) = self.re_enter_delay {
            config.re_enter_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.initial_load_delay {
            config.initial_load_delay = Duration::from_millis(ms);
        }
        if let Some(width) = self.edge_trigger_width {
            config.edge_trigger_width = width;
        }
        if let Some(ms) = self.edge_hover_delay {
            config.edge_hover_delay = Duration::from_millis(ms);
        }
        if let Some(width) = self.halo_width {
            config.halo_width = width;
        }
        if let Some(color) = self.halo_color {
            config.halo_color = color;
        }
    }
}
