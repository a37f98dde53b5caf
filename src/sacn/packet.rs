//! E1.31 data packet decoding
//!
//! Datagrams are parsed with the `sacn` crate and copied into an owned
//! [`DataPacket`]. Synchronization and discovery packets are reported as
//! decode errors and dropped by the receiver.

use crate::error::{PixelBoxError, Result};
use crate::types::{is_valid_universe, DMX_UNIVERSE_SIZE, SACN_PRIORITY_MAX};
use sacn::packet::{AcnRootLayerProtocol, E131RootLayerData};

/// Null start code, regular dimmer data
pub const START_CODE_DMX: u8 = 0x00;

/// Decoded E1.31 data packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub cid: [u8; 16],
    pub source_name: String,
    pub priority: u8,
    pub sync_address: u16,
    pub sequence: u8,
    /// Source stopped sending this universe
    pub stream_terminated: bool,
    /// Data meant for visualisers, not for output
    pub preview: bool,
    pub universe: u16,
    pub start_code: u8,
    /// Slot values, zero padded to 512
    pub dmx: [u8; DMX_UNIVERSE_SIZE],
}

fn decode_error(message: impl Into<String>) -> PixelBoxError {
    PixelBoxError::ProtocolDecode(message.into())
}

impl DataPacket {
    /// Decode a datagram
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let root = AcnRootLayerProtocol::parse(bytes).map_err(|e| decode_error(e.to_string()))?;
        let cid = *root.pdu.cid.as_bytes();
        let E131RootLayerData::DataPacket(framing) = root.pdu.data else {
            return Err(decode_error("Not an E1.31 data packet"));
        };

        if framing.priority > SACN_PRIORITY_MAX {
            return Err(decode_error(format!(
                "Priority {} above {SACN_PRIORITY_MAX}",
                framing.priority
            )));
        }
        if !is_valid_universe(framing.universe) {
            return Err(decode_error(format!("Universe {} out of range", framing.universe)));
        }

        // Property values start with the start code.
        let values: &[u8] = &framing.data.property_values;
        let Some((&start_code, slots)) = values.split_first() else {
            return Err(decode_error("Packet carries no start code"));
        };
        if slots.len() > DMX_UNIVERSE_SIZE {
            return Err(decode_error(format!("{} slots in one universe", slots.len())));
        }
        let mut dmx = [0u8; DMX_UNIVERSE_SIZE];
        dmx[..slots.len()].copy_from_slice(slots);

        Ok(Self {
            cid,
            source_name: framing.source_name.to_string(),
            priority: framing.priority,
            sync_address: framing.synchronization_address,
            sequence: framing.sequence_number,
            stream_terminated: framing.stream_terminated,
            preview: framing.preview_data,
            universe: framing.universe,
            start_code,
            dmx,
        })
    }

    /// Packet with default framing for `universe`
    pub fn new(universe: u16, source_name: &str, priority: u8, sequence: u8) -> Self {
        Self {
            cid: [0u8; 16],
            source_name: source_name.to_string(),
            priority,
            sync_address: 0,
            sequence,
            stream_terminated: false,
            preview: false,
            universe,
            start_code: START_CODE_DMX,
            dmx: [0u8; DMX_UNIVERSE_SIZE],
        }
    }
}
