//! Error handling for pixelbox
//!
//! This module defines the crate-wide error type and a Result alias for use
//! throughout the ingest and render paths.

use crate::types::OutputLine;
use thiserror::Error;

/// Main error type for pixelbox operations
#[derive(Error, Debug)]
pub enum PixelBoxError {
    /// The patch configuration failed validation. Every violation is listed.
    #[error("Invalid configuration:\n{}", .0.join("\n"))]
    ConfigValidation(Vec<String>),

    /// Errors related to loading or saving configuration files
    #[error("Configuration error: {0}")]
    Config(String),

    /// A received packet could not be decoded or is not relevant
    #[error("Protocol decode error: {0}")]
    ProtocolDecode(String),

    /// The worker channel is full and no stale entry could be evicted
    #[error("Channel overflow: {0}")]
    ChannelOverflow(String),

    /// Output lines present in the hardware bank but missing from the patch table
    #[error("Hardware mismatch: outputs {0:?} have buffers but no patched fixtures")]
    HardwareMismatch(Vec<OutputLine>),

    /// A fixture uses a pixel profile the render worker cannot drive
    #[error("Unsupported fixture [{label}] on {output}: pixel type [{profile}] is not supported")]
    UnsupportedFixture {
        output: OutputLine,
        label: String,
        profile: String,
    },

    /// Errors reported by an LED driver while transmitting
    #[error("Output error on {line}: {message}")]
    Output { line: OutputLine, message: String },

    /// A pixel channel value outside the range of its bit depth
    #[error("Pixel value error: {0}")]
    PixelValue(String),

    /// Logger initialization failed
    #[error("Logging error: {0}")]
    Logging(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors on the worker channel
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PixelBoxError>,
    },
}

impl PixelBoxError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PixelBoxError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error must stop the render worker
    pub fn is_fatal_to_worker(&self) -> bool {
        match self {
            PixelBoxError::HardwareMismatch(_) => true,
            PixelBoxError::WithContext { source, .. } => source.is_fatal_to_worker(),
            _ => false,
        }
    }
}

/// Result type alias for pixelbox operations
pub type Result<T> = std::result::Result<T, PixelBoxError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
