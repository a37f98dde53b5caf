//! sACN (E1.31) ingest
//!
//! - [`packet`] - E1.31 data packet decoding
//! - [`receiver`] - UDP listener thread and source tracking
//! - [`snapshot`] - Universe snapshots and the worker wire format
//! - [`share`] - Bounded snapshot channel with eviction
//! - [`manager`] - Per-universe state, throttling and the query surface

pub mod manager;
pub mod packet;
pub mod receiver;
pub mod share;
pub mod snapshot;

pub use manager::SacnManager;
pub use packet::DataPacket;
pub use receiver::{Availability, ReceiverEvents, SacnReceiver, SACN_PORT};
pub use share::{snapshot_channel, PushOutcome, SnapshotReceiver, SnapshotSender};
pub use snapshot::{DmxData, SnapshotFrame, UniverseReport, UniverseSnapshot, UniverseState};
