//! Frame/datagram conversion
//!
//! The wire format is headerless: one datagram carries exactly one frame of
//! raw interleaved PCM, so packetization is the identity transform. It stays
//! a dedicated seam so framing (sequence numbers, a version byte) can be
//! added later without touching the transport or the buffers.
//!
//! Incoming datagrams shorter than the configured frame are rejected;
//! anything at least frame-sized is accepted and truncated to the frame
//! length. The truncating variant matches the deployed peers, which size
//! their reads by the configured frame and ignore any excess.

use bytes::Bytes;

use crate::audio::frame::AudioFrame;
use crate::error::DataError;

/// Frame bytes to wire bytes. Identity, zero-copy.
pub fn packetize(frame: AudioFrame) -> Bytes {
    frame.into_payload()
}

/// Wire bytes to a frame of exactly `frame_bytes`
pub fn depacketize(data: &[u8], frame_bytes: usize) -> Result<AudioFrame, DataError> {
    if data.len() < frame_bytes {
        return Err(DataError::UndersizedPacket {
            len: data.len(),
            expected: frame_bytes,
        });
    }
    Ok(AudioFrame::from_payload(Bytes::copy_from_slice(
        &data[..frame_bytes],
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_BYTES: usize = 256 * 2 * 2;

    #[test]
    fn packetize_is_identity() {
        let frame = AudioFrame::from_samples(&[7i16; 512]);
        let wire = frame.clone().into_payload();
        assert_eq!(packetize(frame), wire);
        assert_eq!(wire.len(), FRAME_BYTES);
    }

    #[test]
    fn rejects_undersized_datagram() {
        let short = vec![0u8; FRAME_BYTES - 1];
        let err = depacketize(&short, FRAME_BYTES).unwrap_err();
        match err {
            DataError::UndersizedPacket { len, expected } => {
                assert_eq!(len, FRAME_BYTES - 1);
                assert_eq!(expected, FRAME_BYTES);
            }
        }
    }

    #[test]
    fn accepts_exact_datagram() {
        let exact = vec![0x5Au8; FRAME_BYTES];
        let frame = depacketize(&exact, FRAME_BYTES).unwrap();
        assert_eq!(frame.len(), FRAME_BYTES);
        assert_eq!(frame.as_bytes(), &exact[..]);
    }

    #[test]
    fn truncates_oversized_datagram() {
        let mut long = vec![0x11u8; FRAME_BYTES];
        long.extend_from_slice(&[0xFFu8; 64]);
        let frame = depacketize(&long, FRAME_BYTES).unwrap();
        assert_eq!(frame.len(), FRAME_BYTES);
        assert!(frame.as_bytes().iter().all(|&b| b == 0x11));
    }

    #[test]
    fn zero_length_datagram_rejected() {
        assert!(depacketize(&[], FRAME_BYTES).is_err());
    }
}
