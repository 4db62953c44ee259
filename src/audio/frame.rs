//! Fixed-size PCM audio frames
//!
//! One frame is the atomic unit moved between the audio device and the
//! network: `frame_size` samples per channel, interleaved, 16-bit signed
//! little-endian. The payload is immutable and cheaply cloneable; ownership
//! moves stage to stage with no aliasing of mutable state.

use bytes::Bytes;

use crate::constants::BYTES_PER_SAMPLE;

/// Immutable interleaved PCM frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    payload: Bytes,
}

impl AudioFrame {
    /// Wrap an already-encoded payload. The caller is responsible for the
    /// length matching the session's frame size; the depacketizer is the
    /// only boundary that enforces it.
    pub fn from_payload(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Encode interleaved i16 samples into a frame
    pub fn from_samples(samples: &[i16]) -> Self {
        let mut buf = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
        for s in samples {
            buf.extend_from_slice(&s.to_le_bytes());
        }
        Self {
            payload: Bytes::from(buf),
        }
    }

    /// A zero-filled frame of the given wire size, substituted on underrun
    pub fn silence(frame_bytes: usize) -> Self {
        Self {
            payload: Bytes::from(vec![0u8; frame_bytes]),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Wire bytes of this frame
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Hand the payload to the packetizer without copying
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Decode back to interleaved i16 samples
    pub fn to_samples(&self) -> Vec<i16> {
        self.payload
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    /// Normalized peak level in [0, 1], for the level meter
    pub fn peak_amplitude(&self) -> f32 {
        let peak = self
            .payload
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|c| i16::from_le_bytes([c[0], c[1]]).unsigned_abs())
            .max()
            .unwrap_or(0);
        peak as f32 / 32_768.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_round_trip() {
        let samples: Vec<i16> = vec![0, -1, 32_767, -32_768, 4096];
        let frame = AudioFrame::from_samples(&samples);
        assert_eq!(frame.len(), samples.len() * 2);
        assert_eq!(frame.to_samples(), samples);
    }

    #[test]
    fn silence_is_zero_filled() {
        let frame = AudioFrame::silence(1024);
        assert_eq!(frame.len(), 1024);
        assert!(frame.as_bytes().iter().all(|&b| b == 0));
        assert_eq!(frame.peak_amplitude(), 0.0);
    }

    #[test]
    fn peak_amplitude_normalized() {
        let frame = AudioFrame::from_samples(&[0, 16_384, -16_384]);
        assert!((frame.peak_amplitude() - 0.5).abs() < 1e-3);

        let full = AudioFrame::from_samples(&[i16::MIN]);
        assert!((full.peak_amplitude() - 1.0).abs() < 1e-6);
    }
}
