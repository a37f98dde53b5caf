//! Core data types for pixelbox
//!
//! This module contains the small value types shared by the patch model, the
//! ingest path and the render worker.
//!
//! # Main Types
//!
//! - [`OutputLine`] - Physical GPIO line driving one chain of pixels
//! - [`OutputLabel`] - Configuration slot (`out1`..`out4`) an output is declared in
//! - [`ChannelRole`] / [`ChannelDepth`] - What a pixel channel carries and how wide it is
//! - [`ChannelOrder`] - Byte order a pixel buffer puts on the wire (e.g. "GRB")
//! - [`Pixel`] - Immutable, range-checked pixel value

use crate::error::{PixelBoxError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Channel count of a standard DMX universe
pub const DMX_UNIVERSE_SIZE: usize = 512;

/// Lowest valid sACN universe id
pub const SACN_UNIVERSE_MIN: u16 = 1;

/// Highest valid sACN universe id
pub const SACN_UNIVERSE_MAX: u16 = 63999;

/// Highest sACN priority a source may announce
pub const SACN_PRIORITY_MAX: u8 = 200;

/// Maximum pixels a single strip may declare (170 x RGB fills one universe)
pub const MAX_PIXELS_PER_STRIP: u16 = 170;

/// Maximum number of declared outputs
pub const MAX_OUTPUTS: usize = 4;

/// Check whether a universe id is inside the sACN range
pub fn is_valid_universe(universe: u16) -> bool {
    (SACN_UNIVERSE_MIN..=SACN_UNIVERSE_MAX).contains(&universe)
}

/// Function of a single pixel channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelRole {
    Red,
    Green,
    Blue,
    White,
}

impl ChannelRole {
    /// One-letter code used in channel order strings
    pub fn code(self) -> char {
        match self {
            ChannelRole::Red => 'R',
            ChannelRole::Green => 'G',
            ChannelRole::Blue => 'B',
            ChannelRole::White => 'W',
        }
    }

    /// Parse a one-letter channel code
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'R' => Some(ChannelRole::Red),
            'G' => Some(ChannelRole::Green),
            'B' => Some(ChannelRole::Blue),
            'W' => Some(ChannelRole::White),
            _ => None,
        }
    }
}

/// Depth of a single DMX channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChannelDepth {
    /// 8 bit, one DMX slot
    #[default]
    D8,
    /// 16 bit, two DMX slots (coarse then fine)
    D16,
}

impl ChannelDepth {
    /// Number of DMX slots one channel occupies
    pub fn byte_count(self) -> usize {
        match self {
            ChannelDepth::D8 => 1,
            ChannelDepth::D16 => 2,
        }
    }

    /// Channel depth in bits
    pub fn bit_count(self) -> u32 {
        8 * self.byte_count() as u32
    }

    /// Maximum value this depth can represent
    pub fn max_value(self) -> u16 {
        match self {
            ChannelDepth::D8 => u8::MAX as u16,
            ChannelDepth::D16 => u16::MAX,
        }
    }
}

/// Physical GPIO lines an output may be bound to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputLine {
    Gpio1,
    Gpio2,
    Gpio3,
    Gpio4,
    Gpio5,
    Gpio6,
    Gpio7,
    Gpio8,
    Gpio9,
    Gpio10,
    Gpio11,
    Gpio12,
    Gpio13,
    Gpio14,
    Gpio15,
    Gpio16,
    Gpio17,
    Gpio18,
    Gpio19,
    Gpio20,
    Gpio21,
    Gpio22,
    Gpio23,
    Gpio24,
    Gpio25,
    Gpio26,
    Gpio27,
}

impl OutputLine {
    /// All lines, in pin order
    pub const ALL: [OutputLine; 27] = [
        OutputLine::Gpio1,
        OutputLine::Gpio2,
        OutputLine::Gpio3,
        OutputLine::Gpio4,
        OutputLine::Gpio5,
        OutputLine::Gpio6,
        OutputLine::Gpio7,
        OutputLine::Gpio8,
        OutputLine::Gpio9,
        OutputLine::Gpio10,
        OutputLine::Gpio11,
        OutputLine::Gpio12,
        OutputLine::Gpio13,
        OutputLine::Gpio14,
        OutputLine::Gpio15,
        OutputLine::Gpio16,
        OutputLine::Gpio17,
        OutputLine::Gpio18,
        OutputLine::Gpio19,
        OutputLine::Gpio20,
        OutputLine::Gpio21,
        OutputLine::Gpio22,
        OutputLine::Gpio23,
        OutputLine::Gpio24,
        OutputLine::Gpio25,
        OutputLine::Gpio26,
        OutputLine::Gpio27,
    ];

    /// BCM pin number of this line
    pub fn pin_number(self) -> u8 {
        self as u8 + 1
    }

    /// Look up a line by BCM pin number
    pub fn from_pin_number(pin: u8) -> Option<Self> {
        Self::ALL.get((pin as usize).checked_sub(1)?).copied()
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpio{}", self.pin_number())
    }
}

/// Configuration slot of an output (at most four)
///
/// Used as a table key in the config file, so it goes through strings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum OutputLabel {
    Out1,
    Out2,
    Out3,
    Out4,
}

impl fmt::Display for OutputLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutputLabel::Out1 => "out1",
            OutputLabel::Out2 => "out2",
            OutputLabel::Out3 => "out3",
            OutputLabel::Out4 => "out4",
        };
        f.write_str(label)
    }
}

impl FromStr for OutputLabel {
    type Err = PixelBoxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "out1" => Ok(OutputLabel::Out1),
            "out2" => Ok(OutputLabel::Out2),
            "out3" => Ok(OutputLabel::Out3),
            "out4" => Ok(OutputLabel::Out4),
            other => Err(PixelBoxError::Config(format!(
                "Unknown output [{other}], expected out1..out4"
            ))),
        }
    }
}

impl TryFrom<String> for OutputLabel {
    type Error = PixelBoxError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<OutputLabel> for String {
    fn from(label: OutputLabel) -> Self {
        label.to_string()
    }
}

/// Order in which pixel channels are put on the wire, e.g. "RGB" or "GRBW"
///
/// Duplicated roles are allowed ("RGBB").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelOrder(Vec<ChannelRole>);

impl ChannelOrder {
    /// Plain RGB order
    pub fn rgb() -> Self {
        Self(vec![ChannelRole::Red, ChannelRole::Green, ChannelRole::Blue])
    }

    /// Build an order from roles
    pub fn from_roles(roles: impl IntoIterator<Item = ChannelRole>) -> Result<Self> {
        let roles: Vec<ChannelRole> = roles.into_iter().collect();
        if !(3..=4).contains(&roles.len()) {
            return Err(PixelBoxError::Config(format!(
                "Channel order must have 3 or 4 channels, got {}",
                roles.len()
            )));
        }
        Ok(Self(roles))
    }

    /// Roles in wire order
    pub fn roles(&self) -> &[ChannelRole] {
        &self.0
    }

    /// Bytes per pixel on the wire
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a valid order
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for ChannelOrder {
    type Err = PixelBoxError;

    fn from_str(s: &str) -> Result<Self> {
        let roles = s
            .chars()
            .map(|c| {
                ChannelRole::from_code(c).ok_or_else(|| {
                    PixelBoxError::Config(format!("Invalid channel [{c}] in order [{s}]"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_roles(roles)
    }
}

impl TryFrom<String> for ChannelOrder {
    type Error = PixelBoxError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ChannelOrder> for String {
    fn from(order: ChannelOrder) -> Self {
        order.to_string()
    }
}

impl fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for role in &self.0 {
            write!(f, "{}", role.code())?;
        }
        Ok(())
    }
}

/// Value of a single pixel at a given bit depth
///
/// Fields are validated at construction; use [`Pixel::rescale`] to move
/// between depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Pixel {
    red: u16,
    green: u16,
    blue: u16,
    white: u16,
    depth: ChannelDepth,
}

impl Pixel {
    /// All channels off, 8 bit
    pub const BLACK: Pixel = Pixel::rgb8(0, 0, 0);

    /// Create a pixel, failing if any channel exceeds the depth's range
    pub fn new(red: u16, green: u16, blue: u16, white: u16, depth: ChannelDepth) -> Result<Self> {
        let max = depth.max_value();
        for (name, value) in [("Red", red), ("Green", green), ("Blue", blue), ("White", white)] {
            if value > max {
                return Err(PixelBoxError::PixelValue(format!(
                    "{name} [{value}] out of range for {} bit",
                    depth.bit_count()
                )));
            }
        }
        Ok(Self {
            red,
            green,
            blue,
            white,
            depth,
        })
    }

    /// 8 bit RGB pixel, white off
    pub const fn rgb8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as u16,
            green: green as u16,
            blue: blue as u16,
            white: 0,
            depth: ChannelDepth::D8,
        }
    }

    /// Bit depth of the channel values
    pub fn depth(&self) -> ChannelDepth {
        self.depth
    }

    /// Value of one channel
    pub fn channel(&self, role: ChannelRole) -> u16 {
        match role {
            ChannelRole::Red => self.red,
            ChannelRole::Green => self.green,
            ChannelRole::Blue => self.blue,
            ChannelRole::White => self.white,
        }
    }

    /// Same color at another bit depth, rounded to nearest
    pub fn rescale(self, depth: ChannelDepth) -> Self {
        if depth == self.depth {
            return self;
        }
        let from = self.depth.max_value() as u32;
        let to = depth.max_value() as u32;
        let scale = |v: u16| ((v as u32 * to + from / 2) / from) as u16;
        Self {
            red: scale(self.red),
            green: scale(self.green),
            blue: scale(self.blue),
            white: scale(self.white),
            depth,
        }
    }

    /// Channel values in the given order
    pub fn ordered<'a>(&'a self, order: &'a ChannelOrder) -> impl Iterator<Item = u16> + 'a {
        order.roles().iter().map(move |role| self.channel(*role))
    }
}

impl fmt::Display for Pixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "R {} | G {} | B {} | W {} @ {} bit",
            self.red,
            self.green,
            self.blue,
            self.white,
            self.depth.bit_count()
        )
    }
}
