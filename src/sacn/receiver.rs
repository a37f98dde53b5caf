//! sACN UDP receiver
//!
//! The receiver owns a UDP socket and a listener thread. Datagrams are decoded
//! by [`DataPacket::parse`]. Packets for registered universes go through a
//! per-universe source tracker (sequence order, priority, data loss timeout)
//! before being handed to a [`ReceiverEvents`] implementation. Preview data
//! never reaches the LEDs.

use super::packet::DataPacket;
use crate::config::{InputConfig, InputMode};
use crate::error::{PixelBoxError, Result};
use crate::types::is_valid_universe;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn, Dispatch};

/// Default sACN port
pub const SACN_PORT: u16 = 5568;

/// E1.31 network data loss timeout
pub const NETWORK_DATA_LOSS_TIMEOUT: Duration = Duration::from_millis(2500);

/// Socket read timeout, bounds how long `stop` waits for the thread
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Largest E1.31 datagram
const RECV_BUFFER_LEN: usize = 1144;

/// Multicast group of a universe (239.255.hi.lo)
pub fn multicast_address(universe: u16) -> Ipv4Addr {
    let [hi, lo] = universe.to_be_bytes();
    Ipv4Addr::new(239, 255, hi, lo)
}

/// Source availability change for one universe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    TimedOut,
}

/// Callbacks invoked from the receiver thread
pub trait ReceiverEvents: Send + Sync {
    /// An accepted packet for a registered universe
    fn on_packet(&self, packet: DataPacket);

    /// A universe gained or lost its source
    fn on_availability(&self, universe: u16, availability: Availability);
}

#[derive(Debug, Clone)]
struct UniverseSource {
    cid: [u8; 16],
    priority: u8,
    last_sequence: u8,
    last_seen: Instant,
    alive: bool,
}

/// Result of feeding one packet to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackOutcome {
    /// Packet should be handed to the manager
    pub deliver: bool,
    pub availability: Option<Availability>,
}

/// Per-universe source bookkeeping
#[derive(Debug, Default)]
pub struct SourceTracker {
    sources: BTreeMap<u16, UniverseSource>,
}

impl SourceTracker {
    /// Apply sequence, priority and termination rules to a packet
    pub fn track(&mut self, packet: &DataPacket, now: Instant) -> TrackOutcome {
        let fresh = UniverseSource {
            cid: packet.cid,
            priority: packet.priority,
            last_sequence: packet.sequence,
            last_seen: now,
            alive: true,
        };

        let source = match self.sources.get_mut(&packet.universe) {
            Some(source) if source.alive => source,
            _ if packet.stream_terminated => return TrackOutcome::default(),
            _ => {
                self.sources.insert(packet.universe, fresh);
                return TrackOutcome {
                    deliver: true,
                    availability: Some(Availability::Available),
                };
            }
        };

        if packet.cid == source.cid {
            if packet.stream_terminated {
                source.alive = false;
                return TrackOutcome {
                    deliver: false,
                    availability: Some(Availability::TimedOut),
                };
            }
            // Sequence numbers wrap; up to 19 behind counts as stale.
            let diff = packet.sequence.wrapping_sub(source.last_sequence) as i8;
            if (-19..=0).contains(&diff) {
                return TrackOutcome::default();
            }
        } else if packet.priority < source.priority || packet.stream_terminated {
            return TrackOutcome::default();
        }

        *source = fresh;
        TrackOutcome {
            deliver: true,
            availability: None,
        }
    }

    /// Mark sources silent for longer than the data loss timeout
    pub fn expire(&mut self, now: Instant) -> Vec<u16> {
        self.sources
            .iter_mut()
            .filter(|(_, s)| s.alive && now.duration_since(s.last_seen) > NETWORK_DATA_LOSS_TIMEOUT)
            .map(|(universe, s)| {
                s.alive = false;
                *universe
            })
            .collect()
    }
}

/// UDP listener for E1.31 data packets
pub struct SacnReceiver {
    socket: Arc<UdpSocket>,
    mode: InputMode,
    interface: Ipv4Addr,
    universes: Arc<RwLock<BTreeSet<u16>>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SacnReceiver {
    /// Bind the socket described by the input config
    pub fn bind(input: &InputConfig) -> Result<Self> {
        let socket = UdpSocket::bind(input.socket_addr())
            .map_err(|e| PixelBoxError::Config(format!("Failed to bind {}: {}", input.socket_addr(), e)))?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;

        info!(
            "sACN receiver bound to {} ({:?})",
            socket.local_addr()?,
            input.mode
        );

        Ok(Self {
            socket: Arc::new(socket),
            mode: input.mode,
            interface: input.bind_address,
            universes: Arc::new(RwLock::new(BTreeSet::new())),
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        })
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Start delivering packets for `universe`
    pub fn register_universe(&self, universe: u16) -> Result<()> {
        if !is_valid_universe(universe) {
            return Err(PixelBoxError::Config(format!(
                "Universe {universe} outside 1..=63999"
            )));
        }
        if self.mode == InputMode::Multicast {
            let group = multicast_address(universe);
            self.socket.join_multicast_v4(&group, &self.interface)?;
            debug!("Joined multicast group {} for universe {}", group, universe);
        }
        self.universes.write().insert(universe);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the listener thread
    pub fn start(&mut self, events: Arc<dyn ReceiverEvents>, dispatch: Dispatch) -> Result<()> {
        if self.thread.is_some() {
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);

        let socket = self.socket.clone();
        let universes = self.universes.clone();
        let running = self.running.clone();
        let handle = std::thread::Builder::new()
            .name("sacn-receiver".to_string())
            .spawn(move || {
                let _log = tracing::dispatcher::set_default(&dispatch);
                listen(&socket, &universes, &running, events.as_ref());
            })?;
        self.thread = Some(handle);
        Ok(())
    }

    /// Stop and join the listener thread
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("sACN receiver thread panicked");
            }
            info!("sACN receiver stopped");
        }
    }
}

impl Drop for SacnReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Hand one decoded packet to `events` if it passes the filters
fn route(
    packet: DataPacket,
    universes: &BTreeSet<u16>,
    tracker: &mut SourceTracker,
    events: &dyn ReceiverEvents,
    now: Instant,
) {
    if !universes.contains(&packet.universe) {
        return;
    }
    if packet.preview {
        trace!("Ignoring preview data for universe {}", packet.universe);
        return;
    }
    let outcome = tracker.track(&packet, now);
    if let Some(availability) = outcome.availability {
        events.on_availability(packet.universe, availability);
    }
    if outcome.deliver {
        events.on_packet(packet);
    }
}

fn listen(
    socket: &UdpSocket,
    universes: &RwLock<BTreeSet<u16>>,
    running: &AtomicBool,
    events: &dyn ReceiverEvents,
) {
    let mut tracker = SourceTracker::default();
    let mut buf = [0u8; RECV_BUFFER_LEN];

    while running.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, from)) => match DataPacket::parse(&buf[..len]) {
                Ok(packet) => {
                    route(packet, &universes.read(), &mut tracker, events, Instant::now())
                }
                Err(e) => trace!("Discarding datagram from {}: {}", from, e),
            },
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                warn!("sACN receive failed: {}", e);
                std::thread::sleep(READ_TIMEOUT);
            }
        }

        for universe in tracker.expire(Instant::now()) {
            events.on_availability(universe, Availability::TimedOut);
        }
    }
}
