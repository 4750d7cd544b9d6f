//! Playback engine state machine
//!
//! Owns the output device for the life of one session and drives the
//! decode-schedule loop: read a chunk, realign it to sample boundaries,
//! schedule the decoded samples at the next free timeline slot. The loop
//! suspends only at the stream read; everything between reads runs under
//! the session lock, so `pause()`/`stop()` arriving from other tasks never
//! interleave with a half-scheduled chunk.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::config::PlaybackConfig;
use crate::decoder::StreamDecoder;
use crate::device::{AudioBackend, OutputDevice, PlaybackUnit};
use crate::scheduler::PlaybackScheduler;
use crate::{Error, Result};

/// Engine lifecycle state, session-scoped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No session; ready for `play()`
    Idle,
    /// Session live: reading, scheduling, or waiting on the last unit
    Playing,
    /// Device clock frozen; `resume()` continues in place
    Paused,
    /// Session ended; equivalent to `Idle` for `play()`
    Stopped,
}

/// Completion callback, invoked exactly once per session that plays its
/// stream to the end
pub type OnComplete = Box<dyn FnOnce() + Send + 'static>;

/// Per-session state, constructed fresh on every `play()` and discarded
/// on `stop()`. Never shared across sessions.
struct Session<D: OutputDevice> {
    device: D,
    decoder: StreamDecoder,
    scheduler: PlaybackScheduler,
    generation: u64,
}

struct Core<D: OutputDevice> {
    state: EngineState,
    session: Option<Session<D>>,
    next_generation: u64,
}

/// Streaming playback engine: turns an incrementally-arriving byte stream
/// of raw PCM into continuous, gapless output with pause, resume, and
/// clean cancellation.
///
/// Cheap to clone; clones share the same engine, so a UI can hold one
/// handle for `pause()`/`stop()` while another task drives `play()`.
pub struct PlaybackEngine<B: AudioBackend> {
    backend: Arc<B>,
    core: Arc<Mutex<Core<B::Device>>>,
    config: PlaybackConfig,
}

impl<B: AudioBackend> Clone for PlaybackEngine<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            core: Arc::clone(&self.core),
            config: self.config.clone(),
        }
    }
}

impl<B> PlaybackEngine<B>
where
    B: AudioBackend + Send + Sync + 'static,
{
    /// Create an engine with no active session
    #[must_use]
    pub fn new(backend: B, config: PlaybackConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            core: Arc::new(Mutex::new(Core {
                state: EngineState::Idle,
                session: None,
                next_generation: 0,
            })),
            config,
        }
    }

    /// Play a byte stream of raw PCM to completion.
    ///
    /// Any live session is stopped first: there is at most one session per
    /// engine, and starting a new one always discards the previous one
    /// without error. Returns once the stream is exhausted; `on_complete`
    /// fires later, exactly once, when the last scheduled unit finishes on
    /// the device. If the stream yields no samples at all, `on_complete`
    /// is never invoked and the engine stays `Playing` until told
    /// otherwise.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceUnavailable`] if no output device could be acquired
    /// (no chunks are read, the engine stays `Idle`);
    /// [`Error::StreamRead`] if the upstream source errors mid-read (the
    /// session is torn down and `on_complete` is not invoked).
    pub async fn play<S>(&self, mut stream: S, on_complete: OnComplete) -> Result<()>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin,
    {
        self.stop();

        let device = self.backend.open(self.config.sample_rate)?;

        let generation = {
            let mut core = self.core.lock().unwrap();
            // A racing play() may have installed a session between our
            // stop() and here; it loses.
            if let Some(mut stale) = core.session.take() {
                stale.device.close();
            }
            let generation = core.next_generation;
            core.next_generation += 1;
            core.session = Some(Session {
                device,
                decoder: StreamDecoder::new(),
                scheduler: PlaybackScheduler::new(self.config.sample_rate),
                generation,
            });
            core.state = EngineState::Playing;
            generation
        };
        tracing::debug!(
            sample_rate = self.config.sample_rate,
            "playback session started"
        );

        let mut last_unit: Option<<B::Device as OutputDevice>::Unit> = None;

        while let Some(read) = stream.next().await {
            let chunk = match read {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.teardown(generation);
                    return Err(Error::StreamRead(e.to_string()));
                }
            };

            let mut core = self.core.lock().unwrap();
            let Some(session) = core
                .session
                .as_mut()
                .filter(|s| s.generation == generation)
            else {
                // Stopped or replaced while suspended at the read; the
                // new owner of the engine carries on without us.
                return Ok(());
            };

            let samples = session.decoder.decode(&chunk);
            match session.scheduler.schedule_next(&mut session.device, samples) {
                Ok(Some(unit)) => last_unit = Some(unit),
                Ok(None) => {}
                Err(e) => {
                    drop(core);
                    self.teardown(generation);
                    return Err(e);
                }
            }
        }

        if let Some(mut unit) = last_unit {
            let finished = unit.finished();
            let engine = self.clone();
            tokio::spawn(async move {
                // A closed device drops the sender, so a discarded session
                // resolves with an error here and completes nothing.
                if finished.await.is_ok() && engine.finish(generation) {
                    tracing::debug!("playback session complete");
                    on_complete();
                }
            });
        }

        Ok(())
    }

    /// Freeze playback. Valid only while `Playing`; otherwise a no-op.
    ///
    /// Pausing suspends the device clock, which freezes every scheduled
    /// unit simultaneously; no offsets are recorded or recomputed.
    pub fn pause(&self) {
        let mut core = self.core.lock().unwrap();
        if core.state != EngineState::Playing {
            return;
        }
        let Some(session) = core.session.as_mut() else {
            return;
        };
        if let Err(e) = session.device.suspend() {
            tracing::warn!(error = %e, "failed to pause playback");
            return;
        }
        core.state = EngineState::Paused;
        tracing::debug!("playback paused");
    }

    /// Continue a paused session. Valid only while `Paused`; otherwise a
    /// no-op. Every unit resumes from its frozen position.
    pub fn resume(&self) {
        let mut core = self.core.lock().unwrap();
        if core.state != EngineState::Paused {
            return;
        }
        let Some(session) = core.session.as_mut() else {
            return;
        };
        if let Err(e) = session.device.resume() {
            tracing::warn!(error = %e, "failed to resume playback");
            return;
        }
        core.state = EngineState::Playing;
        tracing::debug!("playback resumed");
    }

    /// Cancel the session: release the device (discarding any units that
    /// have not finished -- no audio plays after this), drop the pending
    /// bytes, and return to `Idle`. Valid from any state and idempotent.
    pub fn stop(&self) {
        let mut core = self.core.lock().unwrap();
        if let Some(mut session) = core.session.take() {
            session.device.close();
            tracing::debug!("playback session stopped");
        }
        core.state = EngineState::Idle;
    }

    /// Whether a session is actively playing
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state() == EngineState::Playing
    }

    /// Whether a session is paused
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state() == EngineState::Paused
    }

    /// Current engine state
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.core.lock().unwrap().state
    }

    /// Tear the session down if it is still the one we started.
    fn teardown(&self, generation: u64) {
        let mut core = self.core.lock().unwrap();
        if core
            .session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
        {
            if let Some(mut session) = core.session.take() {
                session.device.close();
            }
            core.state = EngineState::Idle;
        }
    }

    /// Last unit finished: stop the session and report whether it was
    /// still live (completion should fire).
    fn finish(&self, generation: u64) -> bool {
        let mut core = self.core.lock().unwrap();
        if core
            .session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
        {
            if let Some(mut session) = core.session.take() {
                session.device.close();
            }
            core.state = EngineState::Idle;
            true
        } else {
            false
        }
    }
}
