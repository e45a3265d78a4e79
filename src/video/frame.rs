//! The encoded frame type shared between the encoder and the MJPEG ring.

use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};

/// A complete JPEG image with no container, plus the wall-clock time it was
/// produced. Immutable after construction.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    data: Bytes,
    /// Milliseconds since UNIX epoch when the frame was produced.
    pub timestamp_ms: u64,
    pub sequence: u64,
}

impl EncodedFrame {
    pub fn new(data: Vec<u8>, sequence: u64) -> Self {
        Self {
            data: Bytes::from(data),
            timestamp_ms: now_ms(),
            sequence,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check that the frame begins with the JPEG SOI marker and ends with EOI.
    /// Used by the encoder to sanity-check its own output and by tests.
    pub fn is_valid_jpeg(&self) -> bool {
        Self::is_valid_jpeg_bytes(&self.data)
    }

    pub fn is_valid_jpeg_bytes(data: &[u8]) -> bool {
        if data.len() < 4 {
            return false;
        }
        let soi = u16::from_be_bytes([data[0], data[1]]);
        let eoi = u16::from_be_bytes([data[data.len() - 2], data[data.len() - 1]]);
        soi == 0xFFD8 && eoi == 0xFFD9
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_jpeg_bytes() {
        let data = vec![0xFF, 0xD8, 0x00, 0x00, 0xFF, 0xD9];
        assert!(EncodedFrame::is_valid_jpeg_bytes(&data));
    }

    #[test]
    fn rejects_truncated_or_bad_markers() {
        assert!(!EncodedFrame::is_valid_jpeg_bytes(&[0xFF, 0xD8]));
        assert!(!EncodedFrame::is_valid_jpeg_bytes(&[0x00, 0x00, 0xFF, 0xD9]));
        assert!(!EncodedFrame::is_valid_jpeg_bytes(&[]));
    }

    #[test]
    fn frame_carries_sequence_and_timestamp() {
        let frame = EncodedFrame::new(vec![0xFF, 0xD8, 0xFF, 0xD9], 7);
        assert_eq!(frame.sequence, 7);
        assert!(frame.timestamp_ms > 0);
        assert!(frame.is_valid_jpeg());
    }
}
