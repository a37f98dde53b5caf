//! sACN ingest manager
//!
//! Keeps one snapshot per registered universe and forwards the full snapshot
//! map to the render worker, at most about once per render cycle per universe.
//!
//! # State per universe
//!
//! `Unseen -> Receiving -> (TimedOut <-> Receiving)`. Timeouts are only
//! observational: the last snapshot stays in place.

use super::packet::{DataPacket, START_CODE_DMX};
use super::receiver::{Availability, ReceiverEvents, SacnReceiver};
use super::share::{PushOutcome, SnapshotSender};
use super::snapshot::{SnapshotFrame, UniverseReport, UniverseSnapshot, UniverseState};
use crate::config::{InputConfig, RenderSettings};
use crate::error::Result;
use crate::types::is_valid_universe;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn, Dispatch};

#[derive(Debug, Default)]
struct UniverseSlot {
    state: UniverseState,
    snapshot: Option<UniverseSnapshot>,
    last_push: Option<Instant>,
}

/// Snapshot map and channel producer shared with the receiver thread
///
/// Only the receiver callbacks write the snapshot map.
#[derive(Debug)]
pub struct IngestState {
    slots: RwLock<BTreeMap<u16, UniverseSlot>>,
    queue: Mutex<Option<SnapshotSender>>,
    throttle: Duration,
}

impl IngestState {
    fn new(queue: SnapshotSender, throttle: Duration) -> Self {
        Self {
            slots: RwLock::new(BTreeMap::new()),
            queue: Mutex::new(Some(queue)),
            throttle,
        }
    }

    fn handle_packet(&self, packet: DataPacket) {
        let universe = packet.universe;
        if packet.start_code != START_CODE_DMX {
            trace!(
                "Universe {}: ignoring start code {:#04x}",
                universe,
                packet.start_code
            );
            return;
        }

        let now = Instant::now();
        let frame = {
            let mut slots = self.slots.write();
            let Some(slot) = slots.get_mut(&universe) else {
                trace!("Universe {}: not registered, packet ignored", universe);
                return;
            };

            match &slot.snapshot {
                None => info!(
                    "Universe {}: receiving from [{}] at priority {}",
                    universe, packet.source_name, packet.priority
                ),
                Some(previous)
                    if previous.priority != packet.priority
                        || previous.source_name != packet.source_name =>
                {
                    info!(
                        "Universe {}: source [{}] priority {} -> [{}] priority {}",
                        universe,
                        previous.source_name,
                        previous.priority,
                        packet.source_name,
                        packet.priority
                    )
                }
                Some(_) => {}
            }

            slot.state = UniverseState::Receiving;
            slot.snapshot = Some(UniverseSnapshot::capture(
                universe,
                packet.priority,
                packet.source_name,
                packet.dmx,
            ));

            let due = slot
                .last_push
                .map_or(true, |last| now.duration_since(last) >= self.throttle);
            if !due {
                return;
            }
            slot.last_push = Some(now);

            SnapshotFrame::new(
                slots
                    .iter()
                    .filter_map(|(u, s)| s.snapshot.clone().map(|snap| (*u, snap)))
                    .collect(),
            )
        };

        let queue = self.queue.lock();
        let Some(sender) = queue.as_ref() else {
            trace!("Render queue closed, universe {} not forwarded", universe);
            return;
        };
        match sender.push(&frame) {
            Ok(PushOutcome::Queued) => {}
            Ok(PushOutcome::QueuedAfterEviction) => {
                debug!("Render queue full, evicted one stale frame")
            }
            Err(e) => error!("Dropping update for universe {}: {}", universe, e),
        }
    }

    fn handle_availability(&self, universe: u16, availability: Availability) {
        let mut slots = self.slots.write();
        let Some(slot) = slots.get_mut(&universe) else {
            return;
        };
        match availability {
            Availability::Available => {
                if slot.state != UniverseState::Receiving {
                    info!("Universe {}: source available", universe);
                    slot.state = UniverseState::Receiving;
                }
            }
            Availability::TimedOut => {
                if slot.state == UniverseState::Receiving {
                    warn!("Universe {}: source timed out, keeping last data", universe);
                    slot.state = UniverseState::TimedOut;
                }
            }
        }
    }
}

impl ReceiverEvents for IngestState {
    fn on_packet(&self, packet: DataPacket) {
        self.handle_packet(packet);
    }

    fn on_availability(&self, universe: u16, availability: Availability) {
        self.handle_availability(universe, availability);
    }
}

/// Owns the receiver and the per-universe snapshots
pub struct SacnManager {
    state: Arc<IngestState>,
    receiver: Option<SacnReceiver>,
}

impl SacnManager {
    /// Create a manager pushing into `queue`, throttled per `settings`
    pub fn new(queue: SnapshotSender, settings: &RenderSettings) -> Self {
        Self {
            state: Arc::new(IngestState::new(queue, settings.throttle_interval())),
            receiver: None,
        }
    }

    /// Listen on `universe`; out of range ids are ignored with a warning
    pub fn register_universe(&self, universe: u16) -> bool {
        if !is_valid_universe(universe) {
            warn!("Universe {} outside 1..=63999, not registered", universe);
            return false;
        }
        self.state.slots.write().entry(universe).or_default();
        if let Some(receiver) = &self.receiver {
            if let Err(e) = receiver.register_universe(universe) {
                error!("Failed to listen on universe {}: {}", universe, e);
            }
        }
        debug!("Registered universe {}", universe);
        true
    }

    /// Feed a decoded packet, as the receiver thread does
    pub fn handle_packet(&self, packet: DataPacket) {
        self.state.handle_packet(packet);
    }

    /// Feed a source availability change
    pub fn handle_availability(&self, universe: u16, availability: Availability) {
        self.state.handle_availability(universe, availability);
    }

    /// Bind the socket and start the receiver thread
    pub fn start(&mut self, input: &InputConfig, dispatch: Dispatch) -> Result<()> {
        if self.receiver.is_some() {
            return Ok(());
        }
        let mut receiver = SacnReceiver::bind(input)?;
        for universe in self.registered_universes() {
            receiver.register_universe(universe)?;
        }
        receiver.start(self.state.clone(), dispatch)?;
        self.receiver = Some(receiver);
        Ok(())
    }

    /// Stop the receiver thread
    pub fn stop(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.stop();
        }
    }

    /// Drop the channel producer so the worker sees a disconnect
    pub fn close_queue(&self) {
        if self.state.queue.lock().take().is_some() {
            debug!("Render queue closed");
        }
    }

    /// Receiver socket address while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.receiver.as_ref().and_then(|r| r.local_addr().ok())
    }

    pub fn is_running(&self) -> bool {
        self.receiver.as_ref().is_some_and(SacnReceiver::is_running)
    }

    /// Registered universes, ascending
    pub fn registered_universes(&self) -> Vec<u16> {
        self.state.slots.read().keys().copied().collect()
    }

    /// Universes currently receiving data
    pub fn available_universes(&self) -> Vec<u16> {
        self.state
            .slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.state == UniverseState::Receiving)
            .map(|(universe, _)| *universe)
            .collect()
    }

    /// Latest snapshot of a universe
    pub fn universe_snapshot(&self, universe: u16) -> Option<UniverseSnapshot> {
        self.state
            .slots
            .read()
            .get(&universe)
            .and_then(|slot| slot.snapshot.clone())
    }

    /// Reception state, `Unseen` for unknown universes
    pub fn universe_state(&self, universe: u16) -> UniverseState {
        self.state
            .slots
            .read()
            .get(&universe)
            .map(|slot| slot.state)
            .unwrap_or_default()
    }

    /// State and latest snapshot of every universe that has data
    pub fn universe_report(&self) -> BTreeMap<u16, UniverseReport> {
        self.state
            .slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.snapshot.is_some())
            .map(|(universe, slot)| {
                (
                    *universe,
                    UniverseReport {
                        state: slot.state,
                        snapshot: slot.snapshot.clone(),
                    },
                )
            })
            .collect()
    }
}

impl Drop for SacnManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture_logs;
    use crate::sacn::share::{snapshot_channel, SnapshotReceiver};

    fn manager(capacity: usize) -> (SacnManager, SnapshotReceiver) {
        let (tx, rx) = snapshot_channel(capacity);
        (SacnManager::new(tx, &RenderSettings::default()), rx)
    }

    fn packet(universe: u16, first: u8) -> DataPacket {
        let mut packet = DataPacket::new(universe, "desk", 100, 0);
        packet.dmx[0] = first;
        packet
    }

    fn next_frame(rx: &SnapshotReceiver) -> SnapshotFrame {
        SnapshotFrame::decode(&rx.try_recv().expect("frame queued")).unwrap()
    }

    #[test]
    fn test_out_of_range_registration_is_noop() {
        let (manager, _rx) = manager(4);
        assert!(!manager.register_universe(0));
        assert!(!manager.register_universe(64000));
        assert!(manager.register_universe(1));
        assert_eq!(manager.registered_universes(), vec![1]);
    }

    #[test]
    fn test_first_packet_pushes_snapshot() {
        let (manager, rx) = manager(4);
        manager.register_universe(5);
        assert_eq!(manager.universe_state(5), UniverseState::Unseen);

        manager.handle_packet(packet(5, 255));
        assert_eq!(manager.universe_state(5), UniverseState::Receiving);
        assert_eq!(manager.universe_snapshot(5).unwrap().dmx_data[0], 255);

        let frame = next_frame(&rx);
        assert_eq!(frame.get(5).unwrap().dmx_data[0], 255);
    }

    #[test]
    fn test_alternate_start_code_and_unregistered_ignored() {
        let (manager, rx) = manager(4);
        manager.register_universe(1);

        let mut alt = packet(1, 9);
        alt.start_code = 0xdd;
        manager.handle_packet(alt);
        manager.handle_packet(packet(2, 9));

        assert!(manager.universe_snapshot(1).is_none());
        assert!(manager.universe_snapshot(2).is_none());
        assert!(rx.is_empty());
    }

    #[test]
    fn test_pushes_are_throttled_per_universe() {
        let (manager, rx) = manager(16);
        manager.register_universe(1);
        manager.register_universe(2);

        manager.handle_packet(packet(1, 1));
        manager.handle_packet(packet(1, 2));
        manager.handle_packet(packet(1, 3));
        assert_eq!(rx.len(), 1);
        // Snapshot is still replaced on every packet.
        assert_eq!(manager.universe_snapshot(1).unwrap().dmx_data[0], 3);

        // Never pushed before, so universe 2 goes out at once with the full map.
        manager.handle_packet(packet(2, 7));
        assert_eq!(rx.len(), 2);
        next_frame(&rx);
        let frame = next_frame(&rx);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.get(1).unwrap().dmx_data[0], 3);

        std::thread::sleep(RenderSettings::default().cycle_budget());
        manager.handle_packet(packet(1, 4));
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_overflow_does_not_block_ingest() {
        let (manager, rx) = manager(0);
        manager.register_universe(1);
        let logs = capture_logs(|| manager.handle_packet(packet(1, 1)));

        assert_eq!(rx.dropped(), 1);
        assert_eq!(manager.universe_snapshot(1).unwrap().dmx_data[0], 1);
        let line = logs
            .lines()
            .find(|l| l.contains("Dropping update for universe 1"))
            .expect("overflow logged");
        assert!(line.contains("ERROR"), "{line}");
        assert!(line.contains("Channel overflow"), "{line}");
    }

    #[test]
    fn test_timeout_keeps_snapshot() {
        let (manager, _rx) = manager(4);
        manager.register_universe(3);
        manager.handle_packet(packet(3, 42));

        manager.handle_availability(3, Availability::TimedOut);
        assert_eq!(manager.universe_state(3), UniverseState::TimedOut);
        assert!(manager.available_universes().is_empty());
        assert_eq!(manager.universe_report()[&3].snapshot.as_ref().unwrap().dmx_data[0], 42);

        manager.handle_availability(3, Availability::Available);
        assert_eq!(manager.available_universes(), vec![3]);
    }

    #[test]
    fn test_closed_queue_drops_silently() {
        let (manager, rx) = manager(4);
        manager.register_universe(1);
        manager.close_queue();
        manager.handle_packet(packet(1, 1));
        assert!(rx.recv().is_none());
        assert!(manager.universe_snapshot(1).is_some());
    }
}
