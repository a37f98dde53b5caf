//! Configuration module for pixelbox
//!
//! The configuration is a TOML file describing where sACN comes in, which
//! GPIO lines drive which strips, and how the render loop and logging behave.
//!
//! # Example
//!
//! ```toml
//! version = "1.0"
//!
//! [input]
//! protocol = "sacn"
//! mode = "multicast"
//!
//! [outputs.out1]
//! gpio = "gpio18"
//! pixel_type = "rgb8"
//! byte_order = "GRB"
//!
//! [[outputs.out1.strips]]
//! label = "door"
//! pixel_count = 60
//! universe = 1
//! start_channel = 1
//! ```
//!
//! # Log Location
//!
//! Unless `[logging] directory` is set, logs go to the platform local data
//! directory, e.g. `~/.local/share/pixelbox/logs/` on Linux.

pub mod settings;

pub use settings::*;

use crate::error::{PixelBoxError, Result, ResultExt};
use crate::fixture::{patch, PixelProfile};
use crate::types::{ChannelOrder, OutputLabel, OutputLine, MAX_OUTPUTS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};

/// Application directory name under the platform data directory
pub const APP_DIR: &str = "pixelbox";

/// Only accepted config file version
pub const CONFIG_VERSION: &str = "1.0";

/// Config file used when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Default UDP port for sACN
pub const DEFAULT_SACN_PORT: u16 = 5568;

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_local_dir().map(|p| p.join(APP_DIR))
}

/// Default log directory, relative `logs/` if no data directory exists
pub fn default_log_dir() -> PathBuf {
    app_data_dir()
        .map(|p| p.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Network protocol the input listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputProtocol {
    #[default]
    Sacn,
}

/// How sACN reaches this host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Unicast,
    Multicast,
}

/// `[input]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub protocol: InputProtocol,

    #[serde(default)]
    pub mode: InputMode,

    /// Local address the receiver binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: Ipv4Addr,

    /// Local UDP port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_address() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_port() -> u16 {
    DEFAULT_SACN_PORT
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            protocol: InputProtocol::Sacn,
            mode: InputMode::Unicast,
            bind_address: default_bind_address(),
            port: DEFAULT_SACN_PORT,
        }
    }
}

impl InputConfig {
    /// Socket address the receiver binds to
    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.bind_address, self.port)
    }
}

/// One strip of pixels declared on an output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripConfig {
    /// Unique label across the whole configuration
    pub label: String,
    pub pixel_count: u16,
    pub universe: u16,
    pub start_channel: u16,
}

/// `[outputs.outN]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// GPIO line the strips are chained on
    pub gpio: OutputLine,

    /// Pixel profile label shared by every strip on this output
    pub pixel_type: String,

    /// Byte order on the wire, defaults to the profile's channel order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_order: Option<ChannelOrder>,

    /// Character device or file receiving the raw frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<PathBuf>,

    /// Strips in daisy-chain order
    #[serde(default)]
    pub strips: Vec<StripConfig>,
}

impl OutputConfig {
    /// Catalog profile for `pixel_type`
    pub fn profile(&self) -> Option<&'static PixelProfile> {
        PixelProfile::from_label(&self.pixel_type)
    }

    /// Configured byte order, or the profile's own channel order
    pub fn resolved_byte_order(&self) -> ChannelOrder {
        self.byte_order.clone().unwrap_or_else(|| {
            self.profile()
                .map(|p| p.channel_order())
                .unwrap_or_else(ChannelOrder::rgb)
        })
    }

    /// Total pixels chained on this output
    pub fn pixel_count(&self) -> usize {
        self.strips.iter().map(|s| s.pixel_count as usize).sum()
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub input: InputConfig,

    /// Declared outputs keyed by slot
    #[serde(default)]
    pub outputs: BTreeMap<OutputLabel, OutputConfig>,

    #[serde(default)]
    pub render: RenderSettings,

    #[serde(default)]
    pub logging: LogSettings,
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

impl AppConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(PixelBoxError::from)
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load config {}", path.display()))
    }

    /// Parse and validate a config document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| PixelBoxError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| PixelBoxError::Config(format!("Failed to write config: {}", e)))
    }

    /// Check field ranges, collecting every problem before failing
    ///
    /// Cross-strip rules (pin reuse, label reuse, universe overflow) are
    /// checked when the patch table is built.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.version != CONFIG_VERSION {
            errors.push(format!(
                "Unsupported config version [{}], expected [{}]",
                self.version, CONFIG_VERSION
            ));
        }
        if self.outputs.is_empty() || self.outputs.len() > MAX_OUTPUTS {
            errors.push(format!(
                "Expected 1 to {} outputs, got {}",
                MAX_OUTPUTS,
                self.outputs.len()
            ));
        }
        if self.render.refresh_rate_hz == 0 {
            errors.push("Render refresh rate must be above 0".to_string());
        }
        if self.render.queue_capacity == 0 {
            errors.push("Render queue capacity must be above 0".to_string());
        }

        for (name, output) in &self.outputs {
            if output.strips.is_empty() {
                errors.push(format!("Output [{}]: at least one strip is required", name));
            }
        }
        errors.extend(patch::validation_errors(&self.outputs));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PixelBoxError::ConfigValidation(errors))
        }
    }

    /// Example configuration with two outputs
    pub fn sample() -> Self {
        let mut outputs = BTreeMap::new();
        outputs.insert(
            OutputLabel::Out1,
            OutputConfig {
                gpio: OutputLine::Gpio18,
                pixel_type: "rgb8".to_string(),
                byte_order: "GRB".parse().ok(),
                device: None,
                strips: vec![
                    StripConfig {
                        label: "bar_left".to_string(),
                        pixel_count: 60,
                        universe: 1,
                        start_channel: 1,
                    },
                    StripConfig {
                        label: "bar_right".to_string(),
                        pixel_count: 60,
                        universe: 1,
                        start_channel: 181,
                    },
                ],
            },
        );
        outputs.insert(
            OutputLabel::Out2,
            OutputConfig {
                gpio: OutputLine::Gpio21,
                pixel_type: "rgb8".to_string(),
                byte_order: None,
                device: None,
                strips: vec![StripConfig {
                    label: "ceiling".to_string(),
                    pixel_count: 170,
                    universe: 2,
                    start_channel: 1,
                }],
            },
        );

        Self {
            version: CONFIG_VERSION.to_string(),
            input: InputConfig {
                mode: InputMode::Multicast,
                ..Default::default()
            },
            outputs,
            render: RenderSettings::default(),
            logging: LogSettings::default(),
        }
    }
}
