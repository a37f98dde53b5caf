//! Application orchestration
//!
//! [`PixelBoxApp`] wires the pieces together in this order: patch table,
//! output bank, snapshot channel, render worker, sACN manager. Stopping runs
//! the reverse: receiver, channel, worker.

use crate::config::{AppConfig, OutputConfig};
use crate::error::{PixelBoxError, Result};
use crate::fixture::{PatchInfo, PatchTable};
use crate::logging::Logging;
use crate::output::{LedDriver, OutputBank, OutputSetup};
use crate::render::{RenderWorkerHandle, ShutdownOutcome};
use crate::sacn::{snapshot_channel, SacnManager, UniverseReport};
use crate::types::OutputLine;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tracing::info;

/// A running sACN to LED bridge
pub struct PixelBoxApp {
    config: AppConfig,
    patch: PatchTable,
    manager: SacnManager,
    worker: Option<RenderWorkerHandle>,
}

impl PixelBoxApp {
    /// Validate `config` and start ingest and rendering
    ///
    /// `driver_factory` builds the LED driver of each drivable output.
    pub fn start<F>(config: AppConfig, logging: &Logging, mut driver_factory: F) -> Result<Self>
    where
        F: FnMut(&OutputConfig) -> Result<Box<dyn LedDriver>>,
    {
        config.validate()?;
        let patch = PatchTable::from_config(&config)?;
        info!(
            "Patched {} strips on {} outputs, universes {:?}",
            patch.len(),
            patch.outputs().len(),
            patch.universes()
        );

        let by_line: BTreeMap<OutputLine, &OutputConfig> =
            config.outputs.values().map(|o| (o.gpio, o)).collect();
        let bank = OutputBank::from_patch(&patch, |line| {
            let output = by_line.get(&line).ok_or_else(|| {
                PixelBoxError::Config(format!("No output configured on {}", line))
            })?;
            Ok(OutputSetup {
                byte_order: Some(output.resolved_byte_order()),
                driver: driver_factory(output)?,
            })
        })?;

        let (tx, rx) = snapshot_channel(config.render.queue_capacity);
        let worker =
            RenderWorkerHandle::spawn(&patch, bank, rx, &config.render, &config.logging)?;

        let mut manager = SacnManager::new(tx, &config.render);
        for universe in patch.universes() {
            manager.register_universe(universe);
        }
        manager.start(&config.input, logging.dispatch().clone())?;

        info!("pixelbox running");
        Ok(Self {
            config,
            patch,
            manager,
            worker: Some(worker),
        })
    }

    /// Stop the receiver, close the channel and stop the worker
    ///
    /// Returns `None` if already stopped.
    pub fn stop(&mut self) -> Option<ShutdownOutcome> {
        let mut worker = self.worker.take()?;
        info!("Stopping pixelbox");
        self.manager.stop();
        self.manager.close_queue();
        Some(worker.stop(self.config.render.shutdown_grace()))
    }

    pub fn patch(&self) -> &PatchTable {
        &self.patch
    }

    /// Ingest manager, for feeding or inspecting universes directly
    pub fn manager(&self) -> &SacnManager {
        &self.manager
    }

    /// Address the sACN receiver listens on
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.manager.local_addr()
    }

    pub fn is_worker_running(&self) -> bool {
        self.worker.as_ref().is_some_and(RenderWorkerHandle::is_running)
    }

    pub fn fixtures_by_output(&self, line: OutputLine) -> Vec<PatchInfo> {
        self.patch.by_output(line).iter().map(|p| p.info()).collect()
    }

    pub fn fixtures_by_universe(&self, universe: u16) -> Vec<PatchInfo> {
        self.patch.by_universe(universe).iter().map(|p| p.info()).collect()
    }

    pub fn fixtures_by_output_universe(&self, line: OutputLine, universe: u16) -> Vec<PatchInfo> {
        self.patch
            .by_output_universe(line, universe)
            .into_iter()
            .map(|p| p.info())
            .collect()
    }

    pub fn all_fixtures(&self) -> Vec<PatchInfo> {
        self.patch.infos()
    }

    /// Universes with at least one patched strip
    pub fn universes(&self) -> Vec<u16> {
        self.patch.universes()
    }

    pub fn available_universes(&self) -> Vec<u16> {
        self.manager.available_universes()
    }

    /// Latest state and snapshot of every universe that has data
    pub fn universe_report(&self) -> BTreeMap<u16, UniverseReport> {
        self.manager.universe_report()
    }
}

impl Drop for PixelBoxApp {
    fn drop(&mut self) {
        self.stop();
    }
}
