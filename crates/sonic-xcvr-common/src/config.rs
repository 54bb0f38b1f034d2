//! Configuration file support.
//!
//! Loads and validates transceiver event configuration from TOML files.
//! Default location: /etc/sonic/xcvreventd.toml
//!
//! Everything is resolved once at startup; providers copy what they need
//! into their own per-port tables at construction.

use crate::error::{XcvrError, XcvrResult};
use crate::presence::TrackerConfig;
use crate::shell::IPMITOOL_CMD;
use crate::types::PortNumbering;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/xcvreventd.toml";

/// Placeholder substituted with the PDDF device name (`PORT1`, ...).
pub const DEVICE_PLACEHOLDER: &str = "{device}";

/// Which presence provider to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Probe for a BMC once at startup and pick accordingly.
    #[default]
    Auto,
    /// PDDF sysfs attributes.
    Pddf,
    /// BMC via ipmitool.
    Bmc,
}

impl FromStr for Backend {
    type Err = XcvrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Backend::Auto),
            "pddf" => Ok(Backend::Pddf),
            "bmc" => Ok(Backend::Bmc),
            other => Err(XcvrError::invalid_config(
                "platform.backend",
                format!("unknown backend '{}' (expected auto, pddf or bmc)", other),
            )),
        }
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Sleep between probe cycles in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How event keys are numbered
    #[serde(default)]
    pub port_numbering: PortNumbering,

    /// Seed the baseline from a probe instead of "nothing inserted"
    #[serde(default)]
    pub prime_baseline: bool,
}

/// Platform inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Number of transceiver ports
    #[serde(default = "default_num_ports")]
    pub num_ports: usize,

    /// Presence provider selection
    #[serde(default)]
    pub backend: Backend,
}

/// Ports of one cage type, 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortTypeRange {
    /// First front-panel port
    pub first: usize,
    /// Last front-panel port
    pub last: usize,
    /// Cage type, e.g. "OSFP" or "SFP28"
    pub port_type: String,
}

/// PDDF sysfs provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PddfConfig {
    /// Path of the `xcvr_present` attribute, `{device}` is replaced by `PORT<n>`
    #[serde(default = "default_attr_path_template")]
    pub attr_path_template: String,

    /// Cage types per port range
    #[serde(default)]
    pub port_types: Vec<PortTypeRange>,

    /// Raw attribute value to presence, per cage type
    #[serde(default)]
    pub presence_value_map: HashMap<String, HashMap<String, bool>>,
}

/// BMC provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BmcConfig {
    /// Command printing the presence bitmap as hex bytes, port 0 in bit 0
    /// of the first byte.
    ///
    /// The default raw command and bitmap layout are a placeholder, not a
    /// documented BMC interface; every BMC platform must set its own.
    #[serde(default = "default_presence_cmd")]
    pub presence_cmd: String,

    /// Bitmap bit cleared means present
    #[serde(default)]
    pub active_low: bool,

    /// Kill BMC commands running longer than this, in milliseconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,

    /// Command whose output identifies a BMC
    #[serde(default = "default_detect_cmd")]
    pub detect_cmd: String,

    /// Text searched for in `detect_cmd` output
    #[serde(default = "default_detect_key")]
    pub detect_key: String,
}

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XcvrConfig {
    /// Poll loop configuration
    #[serde(default)]
    pub tracker: TrackerSettings,

    /// Platform inventory
    #[serde(default)]
    pub platform: PlatformConfig,

    /// PDDF sysfs provider
    #[serde(default)]
    pub pddf: PddfConfig,

    /// BMC provider
    #[serde(default)]
    pub bmc: BmcConfig,
}

// Default functions
fn default_poll_interval() -> u64 {
    1000
}

fn default_num_ports() -> usize {
    32
}

fn default_attr_path_template() -> String {
    "/sys/kernel/pddf/devices/xcvr/{device}/xcvr_present".to_string()
}

fn default_presence_cmd() -> String {
    format!("{} raw 0x3a 0x03 0x01", IPMITOOL_CMD)
}

fn default_command_timeout() -> u64 {
    5000
}

fn default_detect_cmd() -> String {
    format!("{} mc info", IPMITOOL_CMD)
}

fn default_detect_key() -> String {
    "Firmware Revision".to_string()
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            port_numbering: PortNumbering::default(),
            prime_baseline: false,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            num_ports: default_num_ports(),
            backend: Backend::default(),
        }
    }
}

impl Default for PddfConfig {
    fn default() -> Self {
        Self {
            attr_path_template: default_attr_path_template(),
            port_types: Vec::new(),
            presence_value_map: HashMap::new(),
        }
    }
}

impl Default for BmcConfig {
    fn default() -> Self {
        Self {
            presence_cmd: default_presence_cmd(),
            active_low: false,
            command_timeout_ms: default_command_timeout(),
            detect_cmd: default_detect_cmd(),
            detect_key: default_detect_key(),
        }
    }
}

impl TrackerSettings {
    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl From<&TrackerSettings> for TrackerConfig {
    fn from(settings: &TrackerSettings) -> Self {
        TrackerConfig {
            poll_interval: settings.poll_interval(),
            numbering: settings.port_numbering,
        }
    }
}

impl BmcConfig {
    /// Get command timeout as Duration
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl PddfConfig {
    /// Cage type of a 1-based port, if configured.
    pub fn port_type(&self, front_panel_port: usize) -> Option<&str> {
        self.port_types
            .iter()
            .find(|range| (range.first..=range.last).contains(&front_panel_port))
            .map(|range| range.port_type.as_str())
    }
}

impl XcvrConfig {
    /// Parses configuration from TOML text and validates it.
    pub fn from_toml(content: &str) -> XcvrResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| XcvrError::invalid_config("toml", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> XcvrResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(XcvrError::io(path, e)),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> XcvrResult<()> {
        if self.tracker.poll_interval_ms == 0 {
            return Err(XcvrError::invalid_config(
                "tracker.poll_interval_ms",
                "must be greater than 0",
            ));
        }

        if !self.pddf.attr_path_template.contains(DEVICE_PLACEHOLDER) {
            return Err(XcvrError::invalid_config(
                "pddf.attr_path_template",
                format!("must contain {}", DEVICE_PLACEHOLDER),
            ));
        }

        for range in &self.pddf.port_types {
            if range.first == 0 || range.first > range.last || range.last > self.platform.num_ports
            {
                return Err(XcvrError::invalid_config(
                    "pddf.port_types",
                    format!(
                        "range {}-{} ({}) outside 1-{}",
                        range.first, range.last, range.port_type, self.platform.num_ports
                    ),
                ));
            }
        }

        if self.bmc.presence_cmd.trim().is_empty() {
            return Err(XcvrError::invalid_config(
                "bmc.presence_cmd",
                "must not be empty",
            ));
        }

        if self.bmc.command_timeout_ms == 0 {
            return Err(XcvrError::invalid_config(
                "bmc.command_timeout_ms",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}
