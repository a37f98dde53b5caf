//! Render worker loop
//!
//! The worker blocks on the snapshot channel, and for each frame:
//!
//! 1. decodes the frame
//! 2. checks that every hardware buffer has a patch entry (fatal otherwise)
//! 3. remaps every supported output line from its universes
//! 4. transmits each buffer once
//! 5. compares the cycle time against the budget and warns on overrun
//!
//! On exit, for any reason, every output is blacked out.

use super::remap::remap_output;
use super::timing::{CycleStats, CycleTiming};
use crate::config::RenderSettings;
use crate::error::{PixelBoxError, Result};
use crate::fixture::{FixturePatch, PatchTable};
use crate::output::OutputBank;
use crate::sacn::{SnapshotFrame, SnapshotReceiver};
use crate::types::OutputLine;
use crossbeam_channel::{select, Receiver, TryRecvError};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Why the worker loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Stop was requested
    Stopped,
    /// Every snapshot producer went away
    ChannelClosed,
    /// Hardware buffers and patch table disagree
    HardwareMismatch(Vec<OutputLine>),
    /// Worker logging could not be set up; nothing was rendered
    LoggingFailed(String),
    /// A render cycle panicked
    Panicked(String),
}

/// Final state of a worker
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub reason: ExitReason,
    pub stats: CycleStats,
}

/// Render loop state owned by the worker thread
pub struct RenderWorker {
    patch: BTreeMap<OutputLine, Vec<FixturePatch>>,
    bank: OutputBank,
    frames: SnapshotReceiver,
    stop: Receiver<()>,
    budget: Duration,
    stats: CycleStats,
}

impl RenderWorker {
    /// Worker rendering `bank` from its own copy of the patch
    pub fn new(
        patch: &PatchTable,
        bank: OutputBank,
        frames: SnapshotReceiver,
        stop: Receiver<()>,
        settings: &RenderSettings,
    ) -> Self {
        Self {
            patch: patch.outputs().clone(),
            bank,
            frames,
            stop,
            budget: settings.cycle_budget(),
            stats: CycleStats::default(),
        }
    }

    /// Run until stopped, the channel closes or a fatal error occurs
    pub fn run(mut self) -> WorkerReport {
        info!(
            "Render worker started: {} outputs, {:.1}ms cycle budget",
            self.bank.lines().count(),
            self.budget.as_secs_f64() * 1000.0
        );

        let stop = self.stop.clone();
        let frames = self.frames.channel().clone();
        let reason = loop {
            match stop.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break ExitReason::Stopped,
                Err(TryRecvError::Empty) => {}
            }

            select! {
                recv(stop) -> _ => break ExitReason::Stopped,
                recv(frames) -> payload => match payload {
                    Ok(payload) => match self.guarded_cycle(&payload) {
                        Err(message) => {
                            error!("Render cycle panicked: {}", message);
                            break ExitReason::Panicked(message);
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) if e.is_fatal_to_worker() => {
                            error!("Stopping render worker: {}", e);
                            break match e {
                                PixelBoxError::HardwareMismatch(lines) => {
                                    ExitReason::HardwareMismatch(lines)
                                }
                                _ => ExitReason::HardwareMismatch(Vec::new()),
                            };
                        }
                        Ok(Err(e)) => warn!("Render cycle skipped: {}", e),
                    },
                    Err(_) => break ExitReason::ChannelClosed,
                },
            }
        };

        self.shutdown(reason)
    }

    /// Render one frame, turning a panic into its message
    fn guarded_cycle(&mut self, payload: &[u8]) -> std::result::Result<Result<CycleTiming>, String> {
        panic::catch_unwind(AssertUnwindSafe(|| self.render_cycle(payload))).map_err(|payload| {
            payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string())
        })
    }

    /// Render one encoded frame
    pub fn render_cycle(&mut self, payload: &[u8]) -> Result<CycleTiming> {
        let started = Instant::now();

        let frame = match SnapshotFrame::decode(payload) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.record_decode_failure();
                return Err(e.with_context("Failed to decode snapshot frame"));
            }
        };
        let decoded = Instant::now();

        self.check_consistency()?;

        for buffer in self.bank.buffers_mut() {
            let strips = self
                .patch
                .get(&buffer.line())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            if let Err(e) = remap_output(strips, &frame, buffer) {
                warn!("Failed to remap {}: {}", buffer.line(), e);
            }
        }
        let remapped = Instant::now();

        for buffer in self.bank.buffers_mut() {
            if let Err(e) = buffer.transmit() {
                warn!("{}", e);
            }
        }
        let transmitted = Instant::now();

        let timing = CycleTiming {
            deserialize: decoded - started,
            remap: remapped - decoded,
            transmit: transmitted - remapped,
            total: transmitted - started,
        };
        let overrun = timing.overrun(self.budget);
        self.stats.record(timing.total, overrun.is_some());
        if let Some(over) = overrun {
            warn!(
                "cycle overrun by {:.2}ms :: {}",
                over.as_secs_f64() * 1000.0,
                timing
            );
        }

        Ok(timing)
    }

    /// Lines with a buffer but no patch entry
    fn check_consistency(&self) -> Result<()> {
        let missing: Vec<OutputLine> = self
            .bank
            .lines()
            .filter(|line| !self.patch.contains_key(line))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PixelBoxError::HardwareMismatch(missing))
        }
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    fn shutdown(mut self, reason: ExitReason) -> WorkerReport {
        debug!("Render worker exiting: {:?}", reason);
        match self.bank.blackout() {
            Ok(()) => info!("Blackout sent on {} outputs", self.bank.lines().count()),
            Err(e) => error!("Blackout incomplete: {}", e),
        }
        info!("Render worker stopped: {}", self.stats);

        WorkerReport {
            reason,
            stats: self.stats,
        }
    }
}
