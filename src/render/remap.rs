//! DMX to pixel remapping

use crate::error::{PixelBoxError, Result};
use crate::fixture::FixturePatch;
use crate::output::PixelBuffer;
use crate::sacn::SnapshotFrame;
use crate::types::{ChannelDepth, ChannelRole, Pixel};

fn outside_universe(strip: &FixturePatch) -> PixelBoxError {
    PixelBoxError::Output {
        line: strip.output,
        message: format!(
            "Strip [{}] addresses slots outside universe {} (start {}, {} pixels)",
            strip.label, strip.universe, strip.start_channel, strip.pixel_count
        ),
    }
}

/// Fill `buffer` from the strips of one output line
///
/// Strips are laid out back to back in queue order. A strip whose universe
/// has no snapshot keeps its previous pixels. A strip reaching outside its
/// universe fails the line. Returns the pixels written.
pub fn remap_output(
    strips: &[FixturePatch],
    frame: &SnapshotFrame,
    buffer: &mut PixelBuffer,
) -> Result<usize> {
    let mut offset = 0;
    let mut written = 0;

    for strip in strips {
        let count = strip.pixel_count as usize;
        if let Some(snapshot) = frame.get(strip.universe) {
            let profile = strip.profile;
            let footprint = profile.footprint();
            let offsets = profile.channel_offsets();

            // 0-based index of the strip's first slot
            let first = (strip.start_channel as usize)
                .checked_sub(1)
                .ok_or_else(|| outside_universe(strip))?;
            let slot = |at: usize| {
                snapshot
                    .dmx_data
                    .get(at)
                    .copied()
                    .ok_or_else(|| outside_universe(strip))
            };

            for p in 0..count {
                let base = first + p * footprint;
                let mut rgbw = [0u16; 4];
                for (channel, channel_offset) in profile.channels.iter().zip(&offsets) {
                    let at = base + channel_offset;
                    let value = match channel.depth {
                        ChannelDepth::D8 => slot(at)? as u16,
                        ChannelDepth::D16 => u16::from_be_bytes([slot(at)?, slot(at + 1)?]),
                    };
                    let slot = match channel.role {
                        ChannelRole::Red => 0,
                        ChannelRole::Green => 1,
                        ChannelRole::Blue => 2,
                        ChannelRole::White => 3,
                    };
                    rgbw[slot] = value;
                }

                let [red, green, blue, white] = rgbw;
                let pixel = Pixel::new(red, green, blue, white, profile.depth())?;
                buffer.set(offset + p, pixel)?;
                written += 1;
            }
        }
        offset += count;
    }

    Ok(written)
}
