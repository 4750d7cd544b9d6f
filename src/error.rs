//! Error types for the playback engine

use thiserror::Error;

/// Result type alias for playback operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the playback engine
///
/// Both playback errors are fatal to the current session but not to the
/// engine: after either one, the engine is back in `Idle` and a later
/// `play()` starts clean.
#[derive(Debug, Error)]
pub enum Error {
    /// Output device could not be acquired or configured
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Upstream byte source errored mid-read
    #[error("stream read failed: {0}")]
    StreamRead(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
