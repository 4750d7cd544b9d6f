//! Output device abstraction
//!
//! The engine is the sole client of the host audio subsystem and talks to
//! it through these traits: a backend opens one device per session, the
//! device creates playback units, and each unit is scheduled at an offset
//! on the device's own clock. [`CpalBackend`] is the production
//! implementation; tests substitute a scripted stub.

use tokio::sync::oneshot;

use crate::Result;

mod cpal;

pub use self::cpal::CpalBackend;

/// Opens output devices.
///
/// Each `play()` session acquires a fresh device and releases it on stop,
/// so the backend is the long-lived half of the audio seam.
pub trait AudioBackend {
    /// Device type produced by this backend
    type Device: OutputDevice;

    /// Acquire an output device at the given sample rate.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DeviceUnavailable`] if no suitable device
    /// can be acquired or configured.
    fn open(&self, sample_rate: u32) -> Result<Self::Device>;
}

/// One session's exclusive handle to the audio output.
///
/// The device runs its own sample-accurate clock, independent of the
/// control task. Suspending freezes that clock, which freezes every
/// scheduled unit in place; resuming continues them all from where they
/// stopped with no rescheduling.
pub trait OutputDevice: Send {
    /// Playback unit type bound to this device
    type Unit: PlaybackUnit;

    /// Wrap a buffer of samples in a schedulable playback unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the device can no longer accept units.
    fn create_unit(&mut self, samples: Vec<f32>) -> Result<Self::Unit>;

    /// Freeze the device clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying stream rejects the request.
    fn suspend(&mut self) -> Result<()>;

    /// Unfreeze the device clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying stream rejects the request.
    fn resume(&mut self) -> Result<()>;

    /// Release the device, discarding any units that have not finished.
    ///
    /// No audio plays after this returns. Idempotent.
    fn close(&mut self);
}

/// One scheduled block of decoded samples on the device timeline.
pub trait PlaybackUnit: Send {
    /// Schedule the unit to begin at `at` seconds on the device clock.
    ///
    /// Units are started at most once; a second call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the device rejects the unit.
    fn start(&mut self, at: f64) -> Result<()>;

    /// One-shot signal that resolves when the unit finishes playing.
    ///
    /// If the device is closed first, the sender side is dropped and the
    /// receiver resolves with an error instead -- a discarded unit can
    /// never be mistaken for a finished one. Taking the signal twice
    /// yields an already-closed receiver.
    fn finished(&mut self) -> oneshot::Receiver<()>;
}
