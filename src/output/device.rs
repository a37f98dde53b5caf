//! Device-backed and dry-run LED drivers

use super::LedDriver;
use crate::config::OutputConfig;
use crate::error::{PixelBoxError, Result};
use crate::types::OutputLine;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{info, trace};

/// Writes every frame to a character device, FIFO or file
///
/// Devices and FIFOs receive a stream of frames. A regular file only ever
/// holds the latest frame.
#[derive(Debug)]
pub struct DeviceDriver {
    path: PathBuf,
    file: File,
    rewrite: bool,
}

impl DeviceDriver {
    /// Open `path` for writing, creating a regular file if missing
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| {
                PixelBoxError::Config(format!("Failed to open output device {}: {}", path.display(), e))
            })?;
        let rewrite = file.metadata()?.is_file();
        Ok(Self {
            path,
            file,
            rewrite,
        })
    }

    fn write_frame(&mut self, data: &[u8]) -> std::io::Result<()> {
        if self.rewrite {
            self.file.set_len(0)?;
            self.file.seek(SeekFrom::Start(0))?;
        }
        self.file.write_all(data)?;
        self.file.flush()
    }
}

impl LedDriver for DeviceDriver {
    fn kind(&self) -> &'static str {
        "device"
    }

    fn transmit(&mut self, line: OutputLine, data: &[u8]) -> Result<()> {
        self.write_frame(data).map_err(|e| PixelBoxError::Output {
            line,
            message: format!("{}: {}", self.path.display(), e),
        })
    }
}

/// Driver that only traces what would be sent
#[derive(Debug, Default)]
pub struct DryRunDriver {
    frames: u64,
}

impl DryRunDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedDriver for DryRunDriver {
    fn kind(&self) -> &'static str {
        "dry-run"
    }

    fn transmit(&mut self, line: OutputLine, data: &[u8]) -> Result<()> {
        self.frames += 1;
        trace!("{}: frame {} ({} bytes)", line, self.frames, data.len());
        Ok(())
    }
}

/// Driver for an output: its device if configured, a dry run otherwise
pub fn driver_for(output: &OutputConfig) -> Result<Box<dyn LedDriver>> {
    match &output.device {
        Some(path) => {
            let driver = DeviceDriver::open(path)?;
            info!("{}: writing frames to {}", output.gpio, path.display());
            Ok(Box::new(driver))
        }
        None => {
            info!("{}: no device configured, dry run", output.gpio);
            Ok(Box::new(DryRunDriver::new()))
        }
    }
}
