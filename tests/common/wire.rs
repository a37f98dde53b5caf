//! E1.31 datagram encoding for loopback tests

use pixelbox::sacn::DataPacket;

const ACN_PACKET_IDENTIFIER: [u8; 12] = [
    0x41, 0x53, 0x43, 0x2d, 0x45, 0x31, 0x2e, 0x31, 0x37, 0x00, 0x00, 0x00,
];

pub const VECTOR_ROOT_E131_DATA: u32 = 0x0000_0004;
pub const VECTOR_ROOT_E131_EXTENDED: u32 = 0x0000_0008;

pub const ROOT_VECTOR: usize = 18;
const HEADER_LEN: usize = 126;

fn flags_len(len: usize) -> [u8; 2] {
    (0x7000u16 | len as u16).to_be_bytes()
}

/// Encode `packet` as a data packet carrying all 512 slots
pub fn encode(packet: &DataPacket) -> Vec<u8> {
    encode_slots(packet, packet.dmx.len())
}

/// Encode `packet` carrying only its first `slots` slots
pub fn encode_slots(packet: &DataPacket, slots: usize) -> Vec<u8> {
    let total = HEADER_LEN + slots;
    let mut bytes = vec![0u8; total];

    bytes[0..2].copy_from_slice(&0x0010u16.to_be_bytes());
    bytes[4..16].copy_from_slice(&ACN_PACKET_IDENTIFIER);
    bytes[16..18].copy_from_slice(&flags_len(total - 16));
    bytes[ROOT_VECTOR..22].copy_from_slice(&VECTOR_ROOT_E131_DATA.to_be_bytes());
    bytes[22..38].copy_from_slice(&packet.cid);

    bytes[38..40].copy_from_slice(&flags_len(total - 38));
    bytes[40..44].copy_from_slice(&0x0000_0002u32.to_be_bytes());
    let name = packet.source_name.as_bytes();
    let name_len = name.len().min(63);
    bytes[44..44 + name_len].copy_from_slice(&name[..name_len]);
    bytes[108] = packet.priority;
    bytes[109..111].copy_from_slice(&packet.sync_address.to_be_bytes());
    bytes[111] = packet.sequence;
    bytes[112] = (u8::from(packet.preview) << 7) | (u8::from(packet.stream_terminated) << 6);
    bytes[113..115].copy_from_slice(&packet.universe.to_be_bytes());

    bytes[115..117].copy_from_slice(&flags_len(total - 115));
    bytes[117] = 0x02;
    bytes[118] = 0xa1;
    bytes[121..123].copy_from_slice(&0x0001u16.to_be_bytes());
    bytes[123..125].copy_from_slice(&((slots + 1) as u16).to_be_bytes());
    bytes[125] = packet.start_code;
    bytes[HEADER_LEN..].copy_from_slice(&packet.dmx[..slots]);

    bytes
}
