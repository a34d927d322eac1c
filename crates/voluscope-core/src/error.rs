//! Error types for voluscope.

use thiserror::Error;

/// The main error type for voluscope operations.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// A volume's backing buffer is shorter than its claimed shape requires.
    ///
    /// This is a data-integrity error and is never silently clamped.
    #[error("volume data too short: expected at least {expected} bytes for {width}x{height}x{depth}x{channels}, got {actual}")]
    DataIntegrity {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
        depth: u32,
        channels: u32,
    },

    /// A segmentation label array does not cover every voxel.
    #[error("segmentation labels length mismatch: expected {expected} entries, got {actual}")]
    LabelLengthMismatch { expected: usize, actual: usize },

    /// Channel count outside the supported 1-4 range.
    #[error("unsupported channel count {0} (must be 1-4)")]
    UnsupportedChannelCount(u32),

    /// A layer with the given key was not found.
    #[error("layer '{0}' not found")]
    LayerNotFound(String),

    /// A track with the given id was not found.
    #[error("track '{0}' not found")]
    TrackNotFound(String),

    /// A color string could not be parsed as `#rrggbb`.
    #[error("invalid hex color '{0}'")]
    InvalidColor(String),

    /// Immersive sessions are not available on this device.
    ///
    /// Surfaced as a rejected request; the desktop viewer stays usable.
    #[error("immersive session unsupported: {0}")]
    VrUnsupported(String),

    /// An immersive session request arrived while one was already in flight.
    #[error("immersive session already {0}")]
    VrSessionBusy(&'static str),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for voluscope operations.
pub type Result<T> = std::result::Result<T, ViewerError>;
