//! Cadence - Streaming audio playback engine for voice-driven chat UIs
//!
//! Turns an incrementally-arriving byte stream of raw PCM (the shape of a
//! streaming TTS response body) into continuous, gapless sound output,
//! with pause, resume, and clean cancellation. Input is little-endian
//! 32-bit float PCM, mono, 24 kHz; network transport, speech detection,
//! and the chat UI itself stay with the hosting app.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  byte chunks ┌───────────────┐  f32 samples ┌───────────────────┐
//! │ Input stream │ ───────────▶ │ StreamDecoder │ ───────────▶ │ PlaybackScheduler │
//! └──────────────┘              └───────────────┘              └─────────┬─────────┘
//!        ▲                                                               │ units @ offset
//!        │ drives                ┌────────────────┐                      ▼
//!        └────────────────────── │ PlaybackEngine │  owns      ┌──────────────────┐
//!                                │ Idle / Playing │ ─────────▶ │   OutputDevice   │
//!                                │ Paused / Stop  │            │ (cpal or custom) │
//!                                └────────────────┘            └──────────────────┘
//! ```
//!
//! The engine reads chunks, realigns them to the 4-byte sample boundary,
//! and schedules each decoded buffer to start exactly where the previous
//! one ends on the device's own clock. When the stream runs dry, the last
//! unit carries a one-shot completion signal that fires the caller's
//! `on_complete` exactly once -- after the audio has actually finished,
//! not merely after the last byte arrived.

pub mod config;
pub mod decoder;
pub mod device;
pub mod engine;
pub mod error;
pub mod scheduler;

pub use config::{BYTES_PER_SAMPLE, PlaybackConfig, SAMPLE_RATE};
pub use decoder::StreamDecoder;
pub use device::{AudioBackend, CpalBackend, OutputDevice, PlaybackUnit};
pub use engine::{EngineState, OnComplete, PlaybackEngine};
pub use error::{Error, Result};
pub use scheduler::PlaybackScheduler;
