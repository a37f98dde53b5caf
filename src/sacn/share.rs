//! Bounded snapshot channel between ingest and the render worker
//!
//! Frames cross the channel JSON encoded. The sending side never blocks: when
//! the channel is full it evicts the oldest queued frame and retries once. If
//! that still fails the frame is dropped and counted.

use super::snapshot::SnapshotFrame;
use crate::error::{PixelBoxError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How a push landed in the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// One stale frame was evicted to make room
    QueuedAfterEviction,
}

/// Create a snapshot channel holding at most `capacity` frames
pub fn snapshot_channel(capacity: usize) -> (SnapshotSender, SnapshotReceiver) {
    let (tx, rx) = bounded(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let sender = SnapshotSender {
        tx,
        evict: rx.clone(),
        dropped: dropped.clone(),
    };
    (sender, SnapshotReceiver { rx, dropped })
}

/// Producer half, owned by the ingest manager
#[derive(Debug)]
pub struct SnapshotSender {
    tx: Sender<Vec<u8>>,
    evict: Receiver<Vec<u8>>,
    dropped: Arc<AtomicU64>,
}

impl SnapshotSender {
    /// Encode and enqueue a frame without blocking
    pub fn push(&self, frame: &SnapshotFrame) -> Result<PushOutcome> {
        self.push_encoded(frame.encode()?)
    }

    /// Enqueue an already encoded frame without blocking
    pub fn push_encoded(&self, payload: Vec<u8>) -> Result<PushOutcome> {
        let payload = match self.tx.try_send(payload) {
            Ok(()) => return Ok(PushOutcome::Queued),
            Err(TrySendError::Full(payload)) => payload,
            Err(TrySendError::Disconnected(_)) => {
                return Err(PixelBoxError::ChannelOverflow(
                    "Render worker channel is closed".to_string(),
                ))
            }
        };

        match self.evict.try_recv() {
            Ok(_stale) => {}
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return Err(PixelBoxError::ChannelOverflow(
                    "Failed to free space in the render queue".to_string(),
                ));
            }
        }

        match self.tx.try_send(payload) {
            Ok(()) => Ok(PushOutcome::QueuedAfterEviction),
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(PixelBoxError::ChannelOverflow(
                    "Render queue still full after eviction".to_string(),
                ))
            }
        }
    }

    /// Frames currently queued
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }

    /// Frames dropped because no room could be made
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half, owned by the render worker
#[derive(Debug, Clone)]
pub struct SnapshotReceiver {
    rx: Receiver<Vec<u8>>,
    dropped: Arc<AtomicU64>,
}

impl SnapshotReceiver {
    /// Block until the next encoded frame, `None` once all senders are gone
    pub fn recv(&self) -> Option<Vec<u8>> {
        self.rx.recv().ok()
    }

    /// Wait at most `timeout` for the next encoded frame
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<Vec<u8>, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Take a frame if one is queued
    pub fn try_recv(&self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }

    /// Underlying channel, for `select!`
    pub fn channel(&self) -> &Receiver<Vec<u8>> {
        &self.rx
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Frames the producer had to drop
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
