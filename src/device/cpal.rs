//! cpal output backend
//!
//! Drives one long-lived cpal output stream per session on a dedicated OS
//! thread: cpal streams are not `Send`, and real-time audio should not
//! share the async runtime's worker threads. The output callback mixes
//! scheduled units against a frame counter that doubles as the device
//! clock, so pausing the stream freezes the counter and with it every
//! unit, wherever it is in playback.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio::sync::oneshot;

use super::{AudioBackend, OutputDevice, PlaybackUnit};
use crate::{Error, Result};

/// One block of samples scheduled on the device timeline.
struct ActiveUnit {
    samples: Vec<f32>,
    start_frame: u64,
    done: Option<oneshot::Sender<()>>,
}

/// Device clock plus every unit that has started and not yet retired.
///
/// The clock is gated on the first scheduled unit so that the time spent
/// waiting for the opening chunk of a stream does not count against the
/// session timeline.
#[derive(Default)]
struct Timeline {
    frame: u64,
    running: bool,
    units: Vec<ActiveUnit>,
}

impl Timeline {
    /// Render one callback buffer and advance the clock.
    #[allow(clippy::cast_possible_truncation)]
    fn render(&mut self, data: &mut [f32], channels: usize) {
        if !self.running {
            data.fill(0.0);
            return;
        }

        for frame_out in data.chunks_mut(channels) {
            let mut sample = 0.0;
            for unit in &self.units {
                if self.frame >= unit.start_frame {
                    let idx = (self.frame - unit.start_frame) as usize;
                    if let Some(s) = unit.samples.get(idx) {
                        sample += s;
                    }
                }
            }
            for out in frame_out.iter_mut() {
                *out = sample;
            }
            self.frame += 1;
        }

        self.retire();
    }

    /// Drop units whose last frame has been rendered, firing their
    /// completion signals.
    fn retire(&mut self) {
        let frame = self.frame;
        self.units.retain_mut(|unit| {
            if unit.start_frame + unit.samples.len() as u64 <= frame {
                if let Some(done) = unit.done.take() {
                    let _ = done.send(());
                }
                false
            } else {
                true
            }
        });
    }
}

/// Control messages for the audio thread
enum Command {
    Suspend,
    Resume,
    Close,
}

/// Opens cpal output devices on the default host
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalBackend;

impl CpalBackend {
    /// Create a backend against the default audio host
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for CpalBackend {
    type Device = CpalDevice;

    fn open(&self, sample_rate: u32) -> Result<CpalDevice> {
        let timeline = Arc::new(Mutex::new(Timeline::default()));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();

        let thread_timeline = Arc::clone(&timeline);
        let handle = thread::Builder::new()
            .name("audio-out".into())
            .spawn(move || run_output(sample_rate, &thread_timeline, &ready_tx, &cmd_rx))
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(CpalDevice {
                timeline,
                cmd_tx,
                handle: Some(handle),
                sample_rate,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(Error::DeviceUnavailable(
                    "audio thread exited before the stream was ready".to_string(),
                ))
            }
        }
    }
}

/// Exclusive handle to one session's cpal output stream
pub struct CpalDevice {
    timeline: Arc<Mutex<Timeline>>,
    cmd_tx: mpsc::Sender<Command>,
    handle: Option<thread::JoinHandle<()>>,
    sample_rate: u32,
}

impl CpalDevice {
    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Error::DeviceUnavailable("audio thread terminated".to_string()))
    }
}

impl OutputDevice for CpalDevice {
    type Unit = CpalUnit;

    fn create_unit(&mut self, samples: Vec<f32>) -> Result<CpalUnit> {
        let (done_tx, done_rx) = oneshot::channel();
        Ok(CpalUnit {
            timeline: Arc::clone(&self.timeline),
            sample_rate: self.sample_rate,
            samples: Some(samples),
            done_tx: Some(done_tx),
            done_rx: Some(done_rx),
        })
    }

    fn suspend(&mut self) -> Result<()> {
        self.send(Command::Suspend)
    }

    fn resume(&mut self) -> Result<()> {
        self.send(Command::Resume)
    }

    fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            // Dropping the unit senders here cancels every pending
            // completion signal before the thread winds down.
            self.timeline.lock().unwrap().units.clear();
            let _ = self.cmd_tx.send(Command::Close);
            let _ = handle.join();
        }
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// One scheduled block of samples, bound to a [`CpalDevice`]
pub struct CpalUnit {
    timeline: Arc<Mutex<Timeline>>,
    sample_rate: u32,
    samples: Option<Vec<f32>>,
    done_tx: Option<oneshot::Sender<()>>,
    done_rx: Option<oneshot::Receiver<()>>,
}

impl PlaybackUnit for CpalUnit {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn start(&mut self, at: f64) -> Result<()> {
        let Some(samples) = self.samples.take() else {
            return Ok(());
        };
        let start_frame = (at * f64::from(self.sample_rate)).round() as u64;

        let mut timeline = self.timeline.lock().unwrap();
        timeline.running = true;
        timeline.units.push(ActiveUnit {
            samples,
            start_frame,
            done: self.done_tx.take(),
        });
        Ok(())
    }

    fn finished(&mut self) -> oneshot::Receiver<()> {
        self.done_rx.take().unwrap_or_else(|| oneshot::channel().1)
    }
}

/// Audio thread body: build the stream, report readiness, then service
/// suspend/resume/close commands until the session ends.
fn run_output(
    sample_rate: u32,
    timeline: &Arc<Mutex<Timeline>>,
    ready_tx: &mpsc::Sender<Result<()>>,
    cmd_rx: &mpsc::Receiver<Command>,
) {
    let stream = match build_stream(sample_rate, timeline) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(Error::DeviceUnavailable(e.to_string())));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            Command::Suspend => {
                if let Err(e) = stream.pause() {
                    tracing::warn!(error = %e, "failed to suspend output stream");
                }
            }
            Command::Resume => {
                if let Err(e) = stream.play() {
                    tracing::warn!(error = %e, "failed to resume output stream");
                }
            }
            Command::Close => break,
        }
    }
    // Stream drops here; any units still on the timeline are discarded.
}

fn build_stream(sample_rate: u32, timeline: &Arc<Mutex<Timeline>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::DeviceUnavailable("no output device available".to_string()))?;

    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
        })
        .ok_or_else(|| Error::DeviceUnavailable("no suitable output config found".to_string()))?;

    let config: StreamConfig = supported_config
        .with_sample_rate(SampleRate(sample_rate))
        .config();
    let channels = config.channels as usize;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate,
        channels = config.channels,
        "output device initialized"
    );

    let timeline = Arc::clone(timeline);
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                timeline.lock().unwrap().render(data, channels);
            },
            |err| {
                tracing::error!(error = %err, "audio output error");
            },
            None,
        )
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(samples: Vec<f32>, start_frame: u64) -> (ActiveUnit, oneshot::Receiver<()>) {
        let (done_tx, done_rx) = oneshot::channel();
        (
            ActiveUnit {
                samples,
                start_frame,
                done: Some(done_tx),
            },
            done_rx,
        )
    }

    #[test]
    fn clock_is_gated_until_first_unit() {
        let mut timeline = Timeline::default();
        let mut buf = [1.0f32; 8];

        timeline.render(&mut buf, 1);
        assert_eq!(timeline.frame, 0);
        assert_eq!(buf, [0.0; 8]);
    }

    #[test]
    fn units_render_back_to_back() {
        let mut timeline = Timeline::default();
        let (first, _rx1) = unit(vec![0.1, 0.2], 0);
        let (second, _rx2) = unit(vec![0.3, 0.4], 2);
        timeline.units.push(first);
        timeline.units.push(second);
        timeline.running = true;

        let mut buf = [0.0f32; 4];
        timeline.render(&mut buf, 1);
        assert_eq!(buf, [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn finished_units_fire_completion_and_retire() {
        let mut timeline = Timeline::default();
        let (active, mut done_rx) = unit(vec![0.5; 4], 0);
        timeline.units.push(active);
        timeline.running = true;

        let mut buf = [0.0f32; 2];
        timeline.render(&mut buf, 1);
        assert_eq!(timeline.units.len(), 1);
        assert!(done_rx.try_recv().is_err());

        timeline.render(&mut buf, 1);
        assert!(timeline.units.is_empty());
        assert!(done_rx.try_recv().is_ok());
    }

    #[test]
    fn stereo_output_duplicates_samples() {
        let mut timeline = Timeline::default();
        let (active, _rx) = unit(vec![0.25, 0.75], 0);
        timeline.units.push(active);
        timeline.running = true;

        let mut buf = [0.0f32; 4];
        timeline.render(&mut buf, 2);
        assert_eq!(buf, [0.25, 0.25, 0.75, 0.75]);
    }
}
