//! Universe snapshots and the worker wire format
//!
//! A [`UniverseSnapshot`] is the latest accepted data for one universe. It owns
//! its bytes, so copies can be handed to the render worker without any link
//! back into the ingest state. [`SnapshotFrame`] is what travels through the
//! snapshot channel, JSON encoded.

use crate::error::Result;
use crate::types::DMX_UNIVERSE_SIZE;
use chrono::{DateTime, Local};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;

/// Fixed 512-slot DMX buffer
#[derive(Clone, PartialEq, Eq)]
pub struct DmxData(Box<[u8; DMX_UNIVERSE_SIZE]>);

impl DmxData {
    pub fn new(slots: [u8; DMX_UNIVERSE_SIZE]) -> Self {
        Self(Box::new(slots))
    }

    /// Value at a 1-based DMX channel
    pub fn channel(&self, channel: usize) -> Option<u8> {
        channel.checked_sub(1).and_then(|i| self.0.get(i)).copied()
    }
}

impl Default for DmxData {
    fn default() -> Self {
        Self::new([0u8; DMX_UNIVERSE_SIZE])
    }
}

impl Deref for DmxData {
    type Target = [u8; DMX_UNIVERSE_SIZE];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Debug for DmxData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.0.iter().filter(|v| **v > 0).count();
        write!(f, "DmxData({lit} of {DMX_UNIVERSE_SIZE} slots set)")
    }
}

impl Serialize for DmxData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for DmxData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let slots = Vec::<u8>::deserialize(deserializer)?;
        let slots: [u8; DMX_UNIVERSE_SIZE] = slots
            .try_into()
            .map_err(|v: Vec<u8>| de::Error::invalid_length(v.len(), &"512 DMX slots"))?;
        Ok(Self::new(slots))
    }
}

/// Latest accepted data of one universe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseSnapshot {
    pub universe: u16,
    pub priority: u8,
    pub source_name: String,
    pub dmx_data: DmxData,
    pub captured_at: DateTime<Local>,
}

impl UniverseSnapshot {
    /// Snapshot stamped with the current time
    pub fn capture(
        universe: u16,
        priority: u8,
        source_name: impl Into<String>,
        dmx: [u8; DMX_UNIVERSE_SIZE],
    ) -> Self {
        Self {
            universe,
            priority,
            source_name: source_name.into(),
            dmx_data: DmxData::new(dmx),
            captured_at: Local::now(),
        }
    }

    /// Capture time as RFC 3339 text
    pub fn timestamp(&self) -> String {
        self.captured_at.to_rfc3339()
    }
}

/// One batch of snapshots, keyed by universe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFrame {
    pub universes: BTreeMap<u16, UniverseSnapshot>,
}

impl SnapshotFrame {
    pub fn new(universes: BTreeMap<u16, UniverseSnapshot>) -> Self {
        Self { universes }
    }

    pub fn get(&self, universe: u16) -> Option<&UniverseSnapshot> {
        self.universes.get(&universe)
    }

    pub fn len(&self) -> usize {
        self.universes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.universes.is_empty()
    }

    /// Serialize for the snapshot channel
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize a frame received from the snapshot channel
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Reception state of a registered universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UniverseState {
    /// No packet accepted yet
    #[default]
    Unseen,
    Receiving,
    /// The source went away; the last snapshot is kept
    TimedOut,
}

impl std::fmt::Display for UniverseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            UniverseState::Unseen => "unseen",
            UniverseState::Receiving => "receiving",
            UniverseState::TimedOut => "timed out",
        };
        f.write_str(text)
    }
}

/// Monitoring view of one universe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseReport {
    pub state: UniverseState,
    pub snapshot: Option<UniverseSnapshot>,
}
