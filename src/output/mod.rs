//! Hardware output abstraction
//!
//! The render worker writes pixels into one [`PixelBuffer`] per output line
//! and pushes each buffer through an [`LedDriver`]. Drivers only see the final
//! byte stream, already in the line's channel order.
//!
//! # Drivers
//!
//! - [`MemoryDriver`] - Records frames in memory (tests, benches)
//! - [`DeviceDriver`] - Writes frames to a character device or file
//! - [`DryRunDriver`] - Traces frame sizes only

pub mod device;
pub mod memory;

pub use device::{driver_for, DeviceDriver, DryRunDriver};
pub use memory::{FrameLog, MemoryDriver};

use crate::error::{PixelBoxError, Result};
use crate::fixture::{PatchTable, PixelProfile, RGB8};
use crate::types::{ChannelDepth, ChannelOrder, OutputLine, Pixel};
use std::collections::{BTreeMap, BTreeSet};
use tracing::error;

/// Sink for the raw bytes of one output line
///
/// Transmission is synchronous and bounded.
#[cfg_attr(test, mockall::automock)]
pub trait LedDriver: Send {
    /// Short driver name for logs
    fn kind(&self) -> &'static str;

    /// Push one complete frame to the line
    fn transmit(&mut self, line: OutputLine, data: &[u8]) -> Result<()>;
}

/// Whether the worker can drive strips of this profile
pub fn is_supported(profile: &PixelProfile) -> bool {
    profile.label == RGB8.label
}

/// Fixed-size 8 bit pixel buffer of one output line
pub struct PixelBuffer {
    line: OutputLine,
    order: ChannelOrder,
    pixels: Vec<Pixel>,
    frame: Vec<u8>,
    driver: Box<dyn LedDriver>,
}

impl PixelBuffer {
    /// All-black buffer of `pixel_count` pixels
    pub fn new(
        line: OutputLine,
        pixel_count: usize,
        order: ChannelOrder,
        driver: Box<dyn LedDriver>,
    ) -> Self {
        Self {
            line,
            frame: Vec::with_capacity(pixel_count * order.len()),
            order,
            pixels: vec![Pixel::BLACK; pixel_count],
            driver,
        }
    }

    pub fn line(&self) -> OutputLine {
        self.line
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn byte_order(&self) -> &ChannelOrder {
        &self.order
    }

    pub fn driver_kind(&self) -> &'static str {
        self.driver.kind()
    }

    /// Set every pixel to `pixel`
    pub fn fill(&mut self, pixel: Pixel) {
        let pixel = pixel.rescale(ChannelDepth::D8);
        self.pixels.iter_mut().for_each(|p| *p = pixel);
    }

    /// Set one pixel, rescaled to 8 bit
    pub fn set(&mut self, index: usize, pixel: Pixel) -> Result<()> {
        let len = self.pixels.len();
        let slot = self.pixels.get_mut(index).ok_or_else(|| PixelBoxError::Output {
            line: self.line,
            message: format!("Pixel index {index} out of range for {len} pixels"),
        })?;
        *slot = pixel.rescale(ChannelDepth::D8);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<Pixel> {
        self.pixels.get(index).copied()
    }

    /// Wire bytes of the current buffer
    pub fn frame_bytes(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.pixels.len() * self.order.len());
        encode_frame(&self.pixels, &self.order, &mut frame);
        frame
    }

    /// Push the buffer to the driver
    pub fn transmit(&mut self) -> Result<()> {
        encode_frame(&self.pixels, &self.order, &mut self.frame);
        self.driver.transmit(self.line, &self.frame)
    }
}

fn encode_frame(pixels: &[Pixel], order: &ChannelOrder, out: &mut Vec<u8>) {
    out.clear();
    for pixel in pixels {
        // Buffers hold 8 bit pixels only.
        out.extend(pixel.ordered(order).map(|v| v as u8));
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("line", &self.line)
            .field("order", &self.order.to_string())
            .field("pixels", &self.pixels.len())
            .field("driver", &self.driver.kind())
            .finish()
    }
}

/// Per-line hardware setup handed to [`OutputBank::from_patch`]
pub struct OutputSetup {
    /// Overrides the profile's channel order
    pub byte_order: Option<ChannelOrder>,
    pub driver: Box<dyn LedDriver>,
}

/// Pixel buffers of every drivable output line
#[derive(Debug, Default)]
pub struct OutputBank {
    buffers: BTreeMap<OutputLine, PixelBuffer>,
    unsupported: BTreeSet<OutputLine>,
}

impl OutputBank {
    /// One buffer per patched line whose strips are all 8 bit RGB
    ///
    /// Lines carrying any other profile are logged and left out.
    pub fn from_patch<F>(table: &PatchTable, mut setup: F) -> Result<Self>
    where
        F: FnMut(OutputLine) -> Result<OutputSetup>,
    {
        let mut bank = OutputBank::default();
        for (line, patches) in table.outputs() {
            if let Some(strip) = patches.iter().find(|p| !is_supported(p.profile)) {
                let err = PixelBoxError::UnsupportedFixture {
                    output: *line,
                    label: strip.label.clone(),
                    profile: strip.profile.label.to_string(),
                };
                error!("{}; output skipped", err);
                bank.unsupported.insert(*line);
                continue;
            }

            let pixel_count = patches.iter().map(|p| p.pixel_count as usize).sum();
            let OutputSetup { byte_order, driver } = setup(*line)?;
            let order = byte_order.unwrap_or_else(|| RGB8.channel_order());
            bank.insert(PixelBuffer::new(*line, pixel_count, order, driver));
        }
        Ok(bank)
    }

    /// Add or replace the buffer of a line
    pub fn insert(&mut self, buffer: PixelBuffer) {
        self.buffers.insert(buffer.line(), buffer);
    }

    pub fn buffer(&self, line: OutputLine) -> Option<&PixelBuffer> {
        self.buffers.get(&line)
    }

    pub fn buffers_mut(&mut self) -> impl Iterator<Item = &mut PixelBuffer> {
        self.buffers.values_mut()
    }

    /// Lines with a buffer
    pub fn lines(&self) -> impl Iterator<Item = OutputLine> + '_ {
        self.buffers.keys().copied()
    }

    /// Patched lines skipped for unsupported profiles
    pub fn unsupported(&self) -> impl Iterator<Item = OutputLine> + '_ {
        self.unsupported.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Write and transmit an all-zero frame on every line
    ///
    /// Every line is attempted; the first failure is returned.
    pub fn blackout(&mut self) -> Result<()> {
        let mut first_error = None;
        for buffer in self.buffers.values_mut() {
            buffer.fill(Pixel::BLACK);
            if let Err(e) = buffer.transmit() {
                error!("Blackout failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputConfig, StripConfig};
    use crate::types::OutputLabel;

    fn table(entries: &[(OutputLabel, OutputLine, &str, u16)]) -> PatchTable {
        let outputs = entries
            .iter()
            .enumerate()
            .map(|(i, (label, line, profile, count))| {
                (
                    *label,
                    OutputConfig {
                        gpio: *line,
                        pixel_type: profile.to_string(),
                        byte_order: None,
                        device: None,
                        strips: vec![StripConfig {
                            label: format!("strip{i}"),
                            pixel_count: *count,
                            universe: 1,
                            start_channel: 1,
                        }],
                    },
                )
            })
            .collect();
        PatchTable::build(&outputs).unwrap()
    }

    #[test]
    fn test_transmit_uses_byte_order() {
        let mut driver = MockLedDriver::new();
        driver
            .expect_transmit()
            .withf(|line, data| {
                *line == OutputLine::Gpio18 && data == &[128u8, 255, 0, 0, 0, 0][..]
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut buffer = PixelBuffer::new(
            OutputLine::Gpio18,
            2,
            "GRB".parse().unwrap(),
            Box::new(driver),
        );
        buffer.set(0, Pixel::rgb8(255, 128, 0)).unwrap();
        buffer.transmit().unwrap();
    }

    #[test]
    fn test_set_out_of_range_and_rescale() {
        let mut buffer = PixelBuffer::new(
            OutputLine::Gpio4,
            1,
            ChannelOrder::rgb(),
            Box::new(MemoryDriver::new()),
        );
        assert!(buffer.set(1, Pixel::BLACK).is_err());

        let wide = Pixel::new(65535, 0, 257, 0, ChannelDepth::D16).unwrap();
        buffer.set(0, wide).unwrap();
        assert_eq!(buffer.get(0), Some(Pixel::rgb8(255, 0, 1)));
        assert_eq!(buffer.frame_bytes(), vec![255, 0, 1]);
    }

    #[test]
    fn test_bank_skips_unsupported_lines() {
        let table = table(&[
            (OutputLabel::Out1, OutputLine::Gpio18, "rgb8", 10),
            (OutputLabel::Out2, OutputLine::Gpio21, "rgbw8", 10),
        ]);
        let mut requested = Vec::new();
        let bank = OutputBank::from_patch(&table, |line| {
            requested.push(line);
            Ok(OutputSetup {
                byte_order: None,
                driver: Box::new(MemoryDriver::new()),
            })
        })
        .unwrap();

        assert_eq!(requested, vec![OutputLine::Gpio18]);
        assert_eq!(bank.lines().collect::<Vec<_>>(), vec![OutputLine::Gpio18]);
        assert_eq!(bank.unsupported().collect::<Vec<_>>(), vec![OutputLine::Gpio21]);
        assert_eq!(bank.buffer(OutputLine::Gpio18).unwrap().len(), 10);
        assert_eq!(
            bank.buffer(OutputLine::Gpio18).unwrap().byte_order().to_string(),
            "RGB"
        );
    }

    #[test]
    fn test_blackout_tries_every_line() {
        let mut failing = MockLedDriver::new();
        failing.expect_kind().return_const("failing");
        failing.expect_transmit().times(1).returning(|line, _| {
            Err(PixelBoxError::Output {
                line,
                message: "device gone".to_string(),
            })
        });

        let memory = MemoryDriver::new();
        let log = memory.frames();

        let mut bank = OutputBank::default();
        bank.insert(PixelBuffer::new(OutputLine::Gpio2, 1, ChannelOrder::rgb(), Box::new(failing)));
        let mut lit = PixelBuffer::new(OutputLine::Gpio3, 2, ChannelOrder::rgb(), Box::new(memory));
        lit.fill(Pixel::rgb8(9, 9, 9));
        bank.insert(lit);

        assert!(bank.blackout().is_err());
        assert_eq!(log.last(OutputLine::Gpio3).unwrap(), vec![0u8; 6]);
    }
}
