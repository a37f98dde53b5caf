//! Render worker
//!
//! The worker runs on its own named thread with its own logging (`worker.log`).
//! It only shares the snapshot channel with the ingest side; the patch table
//! is copied in at spawn time.
//!
//! Stopping sends a stop message, then waits up to a grace period. A worker
//! that does not exit in time is abandoned; the thread cannot be killed.

pub mod remap;
pub mod timing;
pub mod worker;

pub use remap::remap_output;
pub use timing::{CycleStats, CycleTiming};
pub use worker::{ExitReason, RenderWorker, WorkerReport};

use crate::config::{LogSettings, RenderSettings};
use crate::error::Result;
use crate::fixture::PatchTable;
use crate::logging::{Logging, WORKER_LOG};
use crate::output::OutputBank;
use crate::sacn::SnapshotReceiver;
use crossbeam_channel::{bounded, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How a worker shutdown went
#[derive(Debug)]
pub enum ShutdownOutcome {
    /// The worker exited within the grace period
    Graceful(WorkerReport),
    /// The worker did not exit in time and was left behind
    Abandoned,
    /// The worker thread panicked
    Panicked,
    /// Already stopped
    NotRunning,
}

/// Control handle of a running render worker
#[derive(Debug)]
pub struct RenderWorkerHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<WorkerReport>>,
    grace: Duration,
}

impl RenderWorkerHandle {
    /// Start a worker thread rendering `bank` from `frames`
    ///
    /// If the worker's logging cannot be set up, it blacks out every output
    /// and exits before rendering anything.
    pub fn spawn(
        patch: &PatchTable,
        mut bank: OutputBank,
        frames: SnapshotReceiver,
        settings: &RenderSettings,
        log_settings: &LogSettings,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded(1);
        let grace = settings.shutdown_grace();
        let patch = patch.clone();
        let settings = settings.clone();
        let log_settings = log_settings.clone();

        let thread = std::thread::Builder::new()
            .name("render-worker".to_string())
            .spawn(move || {
                let logging = match Logging::init(&log_settings, WORKER_LOG) {
                    Ok(logging) => logging,
                    Err(e) => {
                        let _ = bank.blackout();
                        return WorkerReport {
                            reason: ExitReason::LoggingFailed(e.to_string()),
                            stats: CycleStats::default(),
                        };
                    }
                };
                let _log = logging.install();
                RenderWorker::new(&patch, bank, frames, stop_rx, &settings).run()
            })?;

        info!("Render worker spawned");
        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            grace,
        })
    }

    /// Whether the worker thread is still alive
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Ask the worker to stop and wait up to `grace` for it
    pub fn stop(&mut self, grace: Duration) -> ShutdownOutcome {
        let Some(thread) = self.thread.take() else {
            return ShutdownOutcome::NotRunning;
        };
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.try_send(());
        }

        let deadline = Instant::now() + grace;
        while !thread.is_finished() && Instant::now() < deadline {
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }
        if !thread.is_finished() {
            warn!(
                "Render worker did not stop within {}ms, abandoning it",
                grace.as_millis()
            );
            return ShutdownOutcome::Abandoned;
        }

        match thread.join() {
            Ok(report) => {
                match &report.reason {
                    ExitReason::LoggingFailed(e) => {
                        error!("Render worker exited at startup, logging failed: {}", e)
                    }
                    reason => info!("Render worker joined ({:?})", reason),
                }
                ShutdownOutcome::Graceful(report)
            }
            Err(_) => {
                error!("Render worker panicked");
                ShutdownOutcome::Panicked
            }
        }
    }
}

impl Drop for RenderWorkerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop(self.grace);
        }
    }
}
