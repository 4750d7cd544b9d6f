//! Shared test utilities
//!
//! A scripted audio backend that records every device interaction and
//! lets tests finish playback units by hand, so the engine state machine
//! can be exercised without audio hardware.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use cadence::{AudioBackend, Error, OutputDevice, PlaybackUnit, Result};
use tokio::sync::oneshot;

/// Everything one stub device has been asked to do
#[derive(Debug, Default)]
pub struct DeviceState {
    pub sample_rate: u32,
    /// (sample count, timeline offset) per started unit, in start order
    pub starts: Vec<(usize, f64)>,
    /// Completion senders per started unit; taken by [`finish_unit`]
    pub senders: Vec<Option<oneshot::Sender<()>>>,
    pub suspends: usize,
    pub resumes: usize,
    pub closed: bool,
}

#[derive(Default)]
pub struct StubState {
    pub opens: usize,
    pub fail_open: bool,
    pub devices: Vec<Arc<Mutex<DeviceState>>>,
}

/// Backend whose devices exist only as interaction logs
#[derive(Clone, Default)]
pub struct StubBackend {
    pub state: Arc<Mutex<StubState>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend with no output device to offer
    pub fn unavailable() -> Self {
        let backend = Self::default();
        backend.state.lock().unwrap().fail_open = true;
        backend
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    /// State of the `index`-th opened device
    pub fn device(&self, index: usize) -> Arc<Mutex<DeviceState>> {
        Arc::clone(&self.state.lock().unwrap().devices[index])
    }
}

impl AudioBackend for StubBackend {
    type Device = StubDevice;

    fn open(&self, sample_rate: u32) -> Result<StubDevice> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(Error::DeviceUnavailable("no output device".to_string()));
        }
        state.opens += 1;
        let device = Arc::new(Mutex::new(DeviceState {
            sample_rate,
            ..DeviceState::default()
        }));
        state.devices.push(Arc::clone(&device));
        Ok(StubDevice { state: device })
    }
}

pub struct StubDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl OutputDevice for StubDevice {
    type Unit = StubUnit;

    fn create_unit(&mut self, samples: Vec<f32>) -> Result<StubUnit> {
        let (done_tx, done_rx) = oneshot::channel();
        Ok(StubUnit {
            device: Arc::clone(&self.state),
            samples: Some(samples),
            done_tx: Some(done_tx),
            done_rx: Some(done_rx),
        })
    }

    fn suspend(&mut self) -> Result<()> {
        self.state.lock().unwrap().suspends += 1;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.state.lock().unwrap().resumes += 1;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        // Dropping the senders cancels any pending completion signal,
        // exactly as a real device discards unfinished units.
        state.senders.clear();
    }
}

pub struct StubUnit {
    device: Arc<Mutex<DeviceState>>,
    samples: Option<Vec<f32>>,
    done_tx: Option<oneshot::Sender<()>>,
    done_rx: Option<oneshot::Receiver<()>>,
}

impl PlaybackUnit for StubUnit {
    fn start(&mut self, at: f64) -> Result<()> {
        if let Some(samples) = self.samples.take() {
            let mut device = self.device.lock().unwrap();
            device.starts.push((samples.len(), at));
            device.senders.push(self.done_tx.take());
        }
        Ok(())
    }

    fn finished(&mut self) -> oneshot::Receiver<()> {
        self.done_rx.take().unwrap_or_else(|| oneshot::channel().1)
    }
}

/// Declare the `index`-th started unit finished, as the device clock would
pub fn finish_unit(device: &Arc<Mutex<DeviceState>>, index: usize) {
    let sender = device.lock().unwrap().senders[index].take();
    if let Some(tx) = sender {
        let _ = tx.send(());
    }
}

/// An in-memory chunked byte stream
pub fn byte_stream(
    chunks: Vec<Vec<u8>>,
) -> impl futures::Stream<Item = std::io::Result<Bytes>> + Send + Unpin {
    tokio_stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
}

/// Encode f32 samples as the little-endian bytes the engine expects
pub fn sample_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
