//! Configuration module
//!
//! Handles loading and saving edgefull configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::channel::RetryPolicy;
use crate::controller::ProtectedContexts;
use crate::detector::{DetectorConfig, SettingsPatch};
use crate::network::NetworkConfig;
use crate::protocol::DEFAULT_PORT;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Initial detector settings
    #[serde(default)]
    pub detector: DetectorSection,

    /// Channel retry behavior
    #[serde(default)]
    pub channel: ChannelSection,

    /// Controller endpoint
    #[serde(default)]
    pub controller: ControllerSection,

    /// Protected contexts
    #[serde(default)]
    pub policy: PolicySection,
}

/// General configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
    /// Client identifier for TCP sessions (random if not set)
    pub client_id: Option<String>,
}

/// Detector settings, as persisted by the settings store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub tab_auto_focus: bool,
    #[serde(default)]
    pub edge_navigation: bool,
    #[serde(default = "default_trigger_height")]
    pub trigger_height: u32,
    #[serde(default = "default_delay_ms")]
    pub re_enter_delay_ms: u64,
    #[serde(default = "default_delay_ms")]
    pub initial_load_delay_ms: u64,
    #[serde(default = "default_edge_trigger_width")]
    pub edge_trigger_width: u32,
    #[serde(default = "default_edge_hover_delay")]
    pub edge_hover_delay_ms: u64,
    #[serde(default = "default_halo_width")]
    pub halo_width: u32,
    #[serde(default = "default_halo_color")]
    pub halo_color: String,
}

fn default_trigger_height() -> u32 {
    10
}

fn default_delay_ms() -> u64 {
    500
}

fn default_edge_trigger_width() -> u32 {
    20
}

fn default_edge_hover_delay() -> u64 {
    800
}

fn default_halo_width() -> u32 {
    48
}

fn default_halo_color() -> String {
    DetectorConfig::default().halo_color
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            enabled: false,
            tab_auto_focus: false,
            edge_navigation: false,
            trigger_height: default_trigger_height(),
            re_enter_delay_ms: default_delay_ms(),
            initial_load_delay_ms: default_delay_ms(),
            edge_trigger_width: default_edge_trigger_width(),
            edge_hover_delay_ms: default_edge_hover_delay(),
            halo_width: default_halo_width(),
            halo_color: default_halo_color(),
        }
    }
}

impl DetectorSection {
    /// Stored toggles, as a detector receives them at attach time
    pub fn initial_settings(&self) -> SettingsPatch {
        SettingsPatch {
            enabled: Some(self.enabled),
            is_tab_auto_focus_enabled: Some(self.tab_auto_focus),
            is_edge_navigation_enabled: Some(self.edge_navigation),
            ..Default::default()
        }
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            trigger_height: self.trigger_height,
            re_enter_delay: Duration::from_millis(self.re_enter_delay_ms),
            initial_load_delay: Duration::from_millis(self.initial_load_delay_ms),
            edge_trigger_width: self.edge_trigger_width,
            edge_hover_delay: Duration::from_millis(self.edge_hover_delay_ms),
            halo_width: self.halo_width,
            halo_color: self.halo_color.clone(),
        }
    }
}

/// Channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSection {
    /// Retries while the controller is not registered yet
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before each retry in ms
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    1
}

fn default_backoff() -> u64 {
    100
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff(),
        }
    }
}

impl ChannelSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

/// Controller endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSection {
    /// Address to bind or reach
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connection timeout in ms
    #[serde(default = "default_timeout")]
    pub connect_timeout_ms: u64,
    /// Reply timeout in ms
    #[serde(default = "default_timeout")]
    pub request_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> u64 {
    2000
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_timeout(),
            request_timeout_ms: default_timeout(),
        }
    }
}

impl ControllerSection {
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            connect_timeout_ms: self.connect_timeout_ms,
            request_timeout_ms: self.request_timeout_ms,
        }
    }
}

/// Protected context configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySection {
    /// URL prefixes protected in addition to the built-in ones
    #[serde(default)]
    pub extra_protected_prefixes: Vec<String>,
}

impl PolicySection {
    pub fn protected_contexts(&self) -> ProtectedContexts {
        ProtectedContexts::new().with_extra(self.extra_protected_prefixes.iter().cloned())
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("edgefull/config.toml")),
            Some(PathBuf::from("./edgefull.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the client ID, generating one if not set
    pub fn client_id(&self) -> String {
        self.general
            .client_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        detector: DetectorSection {
            enabled: true,
            edge_navigation: true,
            ..Default::default()
        },
        policy: PolicySection {
            extra_protected_prefixes: vec!["file://".to_string()],
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}
