//! Playback engine configuration

use serde::{Deserialize, Serialize};

/// Sample rate of the playback contract (matches streaming TTS output)
pub const SAMPLE_RATE: u32 = 24_000;

/// Bytes per sample: little-endian 32-bit float PCM, mono
pub const BYTES_PER_SAMPLE: usize = 4;

/// Playback engine configuration
///
/// Serde-enabled so a hosting app can embed it in its own config file the
/// way it would any other subsystem section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
        }
    }
}
