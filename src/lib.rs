//! # pixelbox: sACN to addressable LEDs
//!
//! Receives DMX over sACN (E1.31) and drives addressable LED strips
//! attached to a small set of GPIO output lines. Ingest and rendering run on
//! separate threads connected by a bounded snapshot channel.
//!
//! ## Architecture
//!
//! - **sACN**: UDP receiver, per-universe source tracking and snapshots
//! - **Fixture**: pixel profiles and the patch table mapping strips to
//!   universes and output lines
//! - **Render**: worker thread remapping snapshots into per-line pixel
//!   buffers and transmitting them through an [`output::LedDriver`]
//! - **Communication**: crossbeam channel carrying JSON-encoded frames, the
//!   oldest frame evicted when full
//!
//! ## Logging
//!
//! Each side logs to its own file (`main.log`, `worker.log`) under the
//! configured log directory, see [`logging::Logging`].
//!
//! ## Example
//!
//! ```ignore
//! use pixelbox::{app::PixelBoxApp, config::AppConfig, logging::{Logging, MAIN_LOG}, output::driver_for};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load("config.toml")?;
//!     let logging = Logging::init(&config.logging, MAIN_LOG)?;
//!     let _log = logging.install();
//!
//!     let mut app = PixelBoxApp::start(config, &logging, driver_for)?;
//!     // ... wait for a shutdown signal
//!     app.stop();
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod fixture;
pub mod logging;
pub mod output;
pub mod render;
pub mod sacn;
pub mod types;

// Re-export commonly used types
pub use app::PixelBoxApp;
pub use config::{AppConfig, OutputConfig, StripConfig};
pub use error::{PixelBoxError, Result};
pub use fixture::{FixturePatch, PatchTable, PixelProfile};
pub use sacn::{DataPacket, SacnManager, SnapshotFrame, UniverseSnapshot};
pub use types::{ChannelOrder, OutputLabel, OutputLine, Pixel};
