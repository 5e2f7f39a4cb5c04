//! Module: sample
//!
//! Purpose: Microphone sample type and the outbound datagram encoding.
//!
//! Architecture:
//! - One `Sample` per acquisition tick (raw 12-bit ADC reading, or filtered value)
//! - Samples are stored as `i16` in the ring; the wire carries 32-bit integers
//! - A datagram is a bare little-endian `i32` array, no header, one per chunk
//!
//! Safety: Safe. No unsafe blocks.

use crate::error::DeviceError;

/// A single acquisition tick.
///
/// Raw readings are 0..=4095 (12-bit ADC); filtered readings are clamped to
/// the signed 16-bit range, so `i16` holds both.
pub type Sample = i16;

/// Bytes per sample on the wire (`sizeof(int)` on the device).
pub const WIRE_SAMPLE_BYTES: usize = 4;

/// Clamp a filter accumulator to the representable sample range.
#[inline]
pub fn clamp_to_sample(value: f32) -> Sample {
    if value >= i16::MAX as f32 {
        i16::MAX
    } else if value <= i16::MIN as f32 {
        i16::MIN
    } else {
        value as i16
    }
}

/// Reusable encoder for outbound sample datagrams.
///
/// The byte buffer is allocated once at start-up, so encoding a chunk on the
/// streaming path never allocates.
pub struct SampleDatagram {
    bytes: Vec<u8>,
}

impl SampleDatagram {
    /// Allocate a datagram buffer for chunks of `chunk_size` samples.
    ///
    /// # Errors
    ///
    /// `DeviceError::Allocation` if the buffer cannot be reserved.
    pub fn with_chunk_size(chunk_size: usize) -> Result<Self, DeviceError> {
        let len = chunk_size * WIRE_SAMPLE_BYTES;
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| DeviceError::Allocation { what: "sample datagram", bytes: len })?;
        Ok(Self { bytes })
    }

    /// Encode `samples` as little-endian `i32` values.
    ///
    /// Returns the payload slice, `samples.len() * 4` bytes long.
    pub fn encode(&mut self, samples: &[Sample]) -> &[u8] {
        self.bytes.clear();
        for &sample in samples {
            self.bytes.extend_from_slice(&i32::from(sample).to_le_bytes());
        }
        &self.bytes
    }
}

/// Decode a datagram payload back into 32-bit values.
///
/// Trailing bytes that do not form a whole value are ignored. Used by the
/// host tooling and tests acting as the companion server.
pub fn decode_datagram(payload: &[u8]) -> impl Iterator<Item = i32> + '_ {
    payload
        .chunks_exact(WIRE_SAMPLE_BYTES)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
