//! Fixture catalog and patch model
//!
//! The catalog is a fixed table of [`PixelProfile`] records, one per supported
//! pixel type. Profiles are looked up by label (`"rgb8"`, `"rgbw16"`, ...) and
//! never change at runtime.
//!
//! The patch model lives in [`patch`]: it turns the configured outputs and
//! strips into a validated [`PatchTable`].

pub mod patch;

pub use patch::{FixturePatch, PatchInfo, PatchTable};

use crate::types::{ChannelDepth, ChannelOrder, ChannelRole};

/// One channel of a pixel profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureChannel {
    pub role: ChannelRole,
    pub depth: ChannelDepth,
    pub description: &'static str,
    pub default_value: u16,
}

impl FixtureChannel {
    const fn new(role: ChannelRole, depth: ChannelDepth, description: &'static str) -> Self {
        Self {
            role,
            depth,
            description,
            default_value: 0,
        }
    }

    /// Maximum value of this channel (`2^bits - 1`)
    pub fn max_value(&self) -> u16 {
        self.depth.max_value()
    }
}

/// Channel composition and byte layout of one addressable pixel
#[derive(Debug, PartialEq, Eq)]
pub struct PixelProfile {
    pub label: &'static str,
    pub channels: &'static [FixtureChannel],
}

impl PixelProfile {
    /// Look up a profile by label
    pub fn from_label(label: &str) -> Option<&'static PixelProfile> {
        PROFILES.iter().find(|p| p.label == label)
    }

    /// Labels of every profile in the catalog
    pub fn labels() -> impl Iterator<Item = &'static str> {
        PROFILES.iter().map(|p| p.label)
    }

    /// Number of channels per pixel
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// DMX slots one pixel occupies
    pub fn footprint(&self) -> usize {
        self.channels.iter().map(|c| c.depth.byte_count()).sum()
    }

    /// Byte offset of each channel inside the pixel footprint
    pub fn channel_offsets(&self) -> Vec<usize> {
        self.channels
            .iter()
            .scan(0, |offset, channel| {
                let current = *offset;
                *offset += channel.depth.byte_count();
                Some(current)
            })
            .collect()
    }

    /// Channel order code, e.g. "RGB" or "RGBW"
    pub fn channel_order(&self) -> ChannelOrder {
        // Every catalog entry has 3 or 4 channels.
        ChannelOrder::from_roles(self.channels.iter().map(|c| c.role))
            .unwrap_or_else(|_| ChannelOrder::rgb())
    }

    /// Depth shared by all channels of the profile
    pub fn depth(&self) -> ChannelDepth {
        self.channels
            .first()
            .map(|c| c.depth)
            .unwrap_or_default()
    }
}

const RGB8_CHANNELS: [FixtureChannel; 3] = [
    FixtureChannel::new(ChannelRole::Red, ChannelDepth::D8, "Red"),
    FixtureChannel::new(ChannelRole::Green, ChannelDepth::D8, "Green"),
    FixtureChannel::new(ChannelRole::Blue, ChannelDepth::D8, "Blue"),
];

const RGB16_CHANNELS: [FixtureChannel; 3] = [
    FixtureChannel::new(ChannelRole::Red, ChannelDepth::D16, "Red"),
    FixtureChannel::new(ChannelRole::Green, ChannelDepth::D16, "Green"),
    FixtureChannel::new(ChannelRole::Blue, ChannelDepth::D16, "Blue"),
];

const RGBW8_CHANNELS: [FixtureChannel; 4] = [
    FixtureChannel::new(ChannelRole::Red, ChannelDepth::D8, "Red"),
    FixtureChannel::new(ChannelRole::Green, ChannelDepth::D8, "Green"),
    FixtureChannel::new(ChannelRole::Blue, ChannelDepth::D8, "Blue"),
    FixtureChannel::new(ChannelRole::White, ChannelDepth::D8, "White"),
];

const RGBW16_CHANNELS: [FixtureChannel; 4] = [
    FixtureChannel::new(ChannelRole::Red, ChannelDepth::D16, "Red"),
    FixtureChannel::new(ChannelRole::Green, ChannelDepth::D16, "Green"),
    FixtureChannel::new(ChannelRole::Blue, ChannelDepth::D16, "Blue"),
    FixtureChannel::new(ChannelRole::White, ChannelDepth::D16, "White"),
];

/// 8 bit RGB, the only profile the render worker can drive
pub const RGB8: PixelProfile = PixelProfile {
    label: "rgb8",
    channels: &RGB8_CHANNELS,
};

pub const RGB16: PixelProfile = PixelProfile {
    label: "rgb16",
    channels: &RGB16_CHANNELS,
};

pub const RGBW8: PixelProfile = PixelProfile {
    label: "rgbw8",
    channels: &RGBW8_CHANNELS,
};

pub const RGBW16: PixelProfile = PixelProfile {
    label: "rgbw16",
    channels: &RGBW16_CHANNELS,
};

/// Every supported pixel profile
pub static PROFILES: [PixelProfile; 4] = [RGB8, RGB16, RGBW8, RGBW16];
