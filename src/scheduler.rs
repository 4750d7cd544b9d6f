//! Gapless playback scheduling
//!
//! Each decoded buffer becomes one playback unit, scheduled to begin
//! exactly where the previous unit ends on the device timeline. The
//! cursor advances at schedule time rather than playback time, so
//! back-to-back starts hold as long as the producer stays ahead of the
//! device clock; if the upstream stream stalls longer than one unit's
//! duration, the result is an audible gap, not an error.

use crate::Result;
use crate::device::{OutputDevice, PlaybackUnit};

/// Schedules decoded sample buffers back-to-back on the device timeline.
///
/// Holds no queue: every call schedules exactly one unit immediately, and
/// only the caller keeps a reference to it.
#[derive(Debug)]
pub struct PlaybackScheduler {
    cursor: f64,
    sample_rate: u32,
}

impl PlaybackScheduler {
    /// Create a scheduler with the cursor at the start of the timeline
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            cursor: 0.0,
            sample_rate,
        }
    }

    /// Schedule one decoded buffer at the next free timeline slot.
    ///
    /// An empty buffer is a no-op: no unit is created and the cursor does
    /// not move. Otherwise the unit starts at the current cursor and the
    /// cursor advances by the buffer's duration.
    ///
    /// # Errors
    ///
    /// Propagates device failures from unit creation or start.
    #[allow(clippy::cast_precision_loss)]
    pub fn schedule_next<D: OutputDevice>(
        &mut self,
        device: &mut D,
        samples: Vec<f32>,
    ) -> Result<Option<D::Unit>> {
        if samples.is_empty() {
            return Ok(None);
        }

        let duration = samples.len() as f64 / f64::from(self.sample_rate);
        tracing::trace!(
            samples = samples.len(),
            offset = self.cursor,
            "scheduling playback unit"
        );

        let mut unit = device.create_unit(samples)?;
        unit.start(self.cursor)?;
        self.cursor += duration;

        Ok(Some(unit))
    }

    /// Timeline offset, in seconds, at which the next unit will begin
    #[must_use]
    pub fn position(&self) -> f64 {
        self.cursor
    }
}
