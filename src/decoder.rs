//! Alignment-aware chunk decoding
//!
//! The upstream transport delivers raw little-endian f32 PCM in whatever
//! chunk sizes the network happens to produce, with no respect for sample
//! boundaries. [`StreamDecoder`] realigns: every whole 4-byte sample in
//! `pending ++ incoming` is decoded, and the 0-3 trailing bytes are carried
//! into the next call.

use crate::config::BYTES_PER_SAMPLE;

/// Realigns arbitrary byte chunks to the f32 sample boundary.
///
/// Holds at most [`BYTES_PER_SAMPLE`]` - 1` pending bytes between calls.
/// Pending bytes are session state: they are never flushed, so if the
/// stream ends mid-sample the trailing bytes are silently dropped.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
}

impl StreamDecoder {
    /// Create a decoder with no pending bytes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one incoming chunk, returning every whole sample available.
    ///
    /// Any byte length is valid, including zero: an empty chunk decodes to
    /// zero samples and leaves the pending bytes untouched.
    pub fn decode(&mut self, incoming: &[u8]) -> Vec<f32> {
        let total = self.pending.len() + incoming.len();
        let usable = total - total % BYTES_PER_SAMPLE;

        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(incoming);

        let samples = data[..usable]
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        self.pending = data.split_off(usable);
        samples
    }

    /// Drop any pending bytes
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Number of undecoded trailing bytes carried from the previous chunk
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
