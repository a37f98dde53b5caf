//! Test data builders for creating test configurations

use pixelbox::config::{AppConfig, InputConfig, LogSettings, OutputConfig, RenderSettings, StripConfig};
use pixelbox::types::{OutputLabel, OutputLine};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;

/// Strip shorthand
pub fn strip(label: &str, pixel_count: u16, universe: u16, start_channel: u16) -> StripConfig {
    StripConfig {
        label: label.to_string(),
        pixel_count,
        universe,
        start_channel,
    }
}

/// Builder for creating test outputs
pub struct OutputBuilder {
    gpio: OutputLine,
    pixel_type: String,
    byte_order: Option<String>,
    strips: Vec<StripConfig>,
}

impl OutputBuilder {
    pub fn new(gpio: OutputLine) -> Self {
        Self {
            gpio,
            pixel_type: "rgb8".to_string(),
            byte_order: None,
            strips: Vec::new(),
        }
    }

    pub fn pixel_type(mut self, pixel_type: &str) -> Self {
        self.pixel_type = pixel_type.to_string();
        self
    }

    pub fn byte_order(mut self, order: &str) -> Self {
        self.byte_order = Some(order.to_string());
        self
    }

    pub fn strip(mut self, label: &str, pixel_count: u16, universe: u16, start_channel: u16) -> Self {
        self.strips.push(strip(label, pixel_count, universe, start_channel));
        self
    }

    pub fn build(self) -> OutputConfig {
        OutputConfig {
            gpio: self.gpio,
            pixel_type: self.pixel_type,
            byte_order: self.byte_order.map(|o| o.parse().unwrap()),
            device: None,
            strips: self.strips,
        }
    }
}

/// Builder for creating test application configs
///
/// Defaults bind the receiver to an ephemeral loopback port and keep logging
/// off the console.
pub struct ConfigBuilder {
    outputs: BTreeMap<OutputLabel, OutputConfig>,
    render: RenderSettings,
    logging: LogSettings,
}

impl ConfigBuilder {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            outputs: BTreeMap::new(),
            render: RenderSettings::default(),
            logging: LogSettings::file_only(log_dir),
        }
    }

    pub fn output(mut self, label: OutputLabel, output: OutputConfig) -> Self {
        self.outputs.insert(label, output);
        self
    }

    pub fn render(mut self, render: RenderSettings) -> Self {
        self.render = render;
        self
    }

    pub fn logging(mut self, logging: LogSettings) -> Self {
        self.logging = logging;
        self
    }

    pub fn build(self) -> AppConfig {
        AppConfig {
            input: InputConfig {
                bind_address: Ipv4Addr::LOCALHOST,
                port: 0,
                ..Default::default()
            },
            outputs: self.outputs,
            render: self.render,
            logging: self.logging,
            ..AppConfig::sample()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_builder() {
        let output = OutputBuilder::new(OutputLine::Gpio18)
            .byte_order("GRB")
            .strip("a", 10, 1, 1)
            .build();

        assert_eq!(output.pixel_type, "rgb8");
        assert_eq!(output.byte_order.unwrap().to_string(), "GRB");
        assert_eq!(output.strips.len(), 1);
    }
}
