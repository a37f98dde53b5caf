//! Mock construction helpers

use pixelbox::config::OutputConfig;
use pixelbox::output::{FrameLog, LedDriver, MemoryDriver};
use pixelbox::sacn::{DataPacket, SnapshotFrame, UniverseSnapshot};
use pixelbox::types::DMX_UNIVERSE_SIZE;
use pixelbox::Result;
use std::collections::BTreeMap;
use std::time::Duration;

/// DMX packet for `universe` with `slots` set as (1-based channel, value)
pub fn dmx_packet(universe: u16, sequence: u8, slots: &[(usize, u8)]) -> DataPacket {
    let mut packet = DataPacket::new(universe, "test desk", 100, sequence);
    for (channel, value) in slots {
        packet.dmx[channel - 1] = *value;
    }
    packet
}

/// Encoded snapshot frame holding one universe
pub fn encoded_frame(universe: u16, slots: &[(usize, u8)]) -> Vec<u8> {
    let mut dmx = [0u8; DMX_UNIVERSE_SIZE];
    for (channel, value) in slots {
        dmx[channel - 1] = *value;
    }
    let mut universes = BTreeMap::new();
    universes.insert(universe, UniverseSnapshot::capture(universe, 100, "test desk", dmx));
    SnapshotFrame::new(universes).encode().unwrap()
}

/// Driver factory recording every frame into `log`
pub fn memory_drivers(
    log: &FrameLog,
) -> impl FnMut(&OutputConfig) -> Result<Box<dyn LedDriver>> + '_ {
    move |_| Ok(Box::new(MemoryDriver::with_log(log.clone())))
}

/// Driver factory whose transmits each take `delay`
pub fn slow_drivers(
    log: &FrameLog,
    delay: Duration,
) -> impl FnMut(&OutputConfig) -> Result<Box<dyn LedDriver>> + '_ {
    move |_| Ok(Box::new(MemoryDriver::with_log(log.clone()).with_delay(delay)))
}
