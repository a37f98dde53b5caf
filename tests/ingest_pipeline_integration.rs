//! Integration tests for sACN ingest
//!
//! These tests validate the path from packets to the render queue:
//! - Full snapshot map per push
//! - Oldest frame evicted when the queue is full
//! - Real UDP traffic through the receiver thread

mod common;

use common::mock_helpers::dmx_packet;
use common::wire;
use common::{test_timeout, wait_until};
use pixelbox::config::{InputConfig, RenderSettings};
use pixelbox::logging::Logging;
use pixelbox::sacn::{snapshot_channel, DataPacket, SacnManager, SnapshotFrame, SnapshotReceiver};
use serial_test::serial;
use std::net::{Ipv4Addr, UdpSocket};
use std::time::Duration;

fn manager(capacity: usize) -> (SacnManager, SnapshotReceiver) {
    let (tx, rx) = snapshot_channel(capacity);
    let manager = SacnManager::new(tx, &RenderSettings::default());
    manager.register_universe(1);
    manager.register_universe(2);
    (manager, rx)
}

fn next_frame(rx: &SnapshotReceiver) -> SnapshotFrame {
    let payload = rx.recv_timeout(test_timeout()).expect("no frame queued");
    SnapshotFrame::decode(&payload).unwrap()
}

#[test]
fn test_packets_become_full_map_frames() {
    let (manager, rx) = manager(8);

    manager.handle_packet(dmx_packet(1, 1, &[(1, 255)]));
    let first = next_frame(&rx);
    assert_eq!(first.universes.keys().copied().collect::<Vec<_>>(), vec![1]);

    manager.handle_packet(dmx_packet(2, 1, &[(3, 42)]));
    let second = next_frame(&rx);
    assert_eq!(second.universes.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(second.get(1).unwrap().dmx_data.channel(1), Some(255));
    assert_eq!(second.get(2).unwrap().dmx_data.channel(3), Some(42));
    assert_eq!(second.get(2).unwrap().source_name, "test desk");

    assert_eq!(manager.available_universes(), vec![1, 2]);
}

#[test]
fn test_full_queue_evicts_oldest_frame() {
    let (manager, rx) = manager(1);

    manager.handle_packet(dmx_packet(1, 1, &[(1, 1)]));
    manager.handle_packet(dmx_packet(2, 1, &[(1, 2)]));

    assert_eq!(rx.len(), 1);
    assert_eq!(rx.dropped(), 0);
    let frame = next_frame(&rx);
    assert_eq!(frame.len(), 2, "newest frame carries both universes");
}

#[test]
#[serial]
fn test_udp_packets_reach_the_queue() {
    let (mut manager, rx) = manager(8);
    let input = InputConfig {
        bind_address: Ipv4Addr::LOCALHOST,
        port: 0,
        ..Default::default()
    };
    manager
        .start(&input, Logging::disabled().dispatch().clone())
        .unwrap();
    let target = manager.local_addr().unwrap();
    assert!(manager.is_running());

    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let mut packet = dmx_packet(2, 1, &[(1, 1), (2, 2), (3, 3)]);
    packet.cid = [7; 16];
    socket.send_to(&wire::encode(&packet), target).unwrap();

    let frame = next_frame(&rx);
    assert_eq!(frame.get(2).unwrap().dmx_data[..3], [1u8, 2, 3]);

    // Stale sequence from the same source is discarded.
    let mut stale = packet.clone();
    stale.dmx[0] = 200;
    socket.send_to(&wire::encode(&stale), target).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(manager.universe_snapshot(2).unwrap().dmx_data.channel(1), Some(1));

    // Garbage is dropped without stopping the receiver.
    socket.send_to(b"not sacn", target).unwrap();
    let mut next = DataPacket { sequence: 2, ..packet };
    next.dmx[0] = 9;
    socket.send_to(&wire::encode(&next), target).unwrap();
    assert!(wait_until(test_timeout(), || {
        manager.universe_snapshot(2).and_then(|s| s.dmx_data.channel(1)) == Some(9)
    }));

    // Preview data is not shown on the LEDs.
    let mut preview = DataPacket { sequence: 3, ..next.clone() };
    preview.preview = true;
    preview.dmx[0] = 77;
    socket.send_to(&wire::encode(&preview), target).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(manager.universe_snapshot(2).unwrap().dmx_data.channel(1), Some(9));

    manager.stop();
    assert!(!manager.is_running());
}
