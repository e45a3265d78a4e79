//! The bounded frame ring shared between the encoder-dispatch thread (the
//! single writer) and every client worker thread (many readers).

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::video::frame::EncodedFrame;

/// A FIFO of at most `capacity` encoded frames. Appending past capacity
/// evicts the oldest entry. Every frame is tagged with the ring's
/// monotonically increasing `latest index` at the time it was appended, and
/// readers track their own cursor into that index space rather than into
/// the deque directly, so they can detect how many frames they missed.
pub struct FrameRing {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    frames: VecDeque<Arc<EncodedFrame>>,
    /// Index of the most recently appended frame (1-based; 0 = empty).
    latest_index: u64,
}

impl FrameRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be positive");
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity),
                latest_index: 0,
            }),
            capacity,
        }
    }

    /// Append a frame, evicting the oldest if the ring is full.
    pub fn push(&self, frame: EncodedFrame) {
        let mut inner = self.inner.lock();
        if inner.frames.len() == self.capacity {
            inner.frames.pop_front();
        }
        inner.frames.push_back(Arc::new(frame));
        inner.latest_index += 1;
    }

    /// The current latest index, for a newly connecting client to start its
    /// cursor from.
    pub fn latest_index(&self) -> u64 {
        self.inner.lock().latest_index
    }

    /// A snapshot of everything currently buffered, oldest first, used for a
    /// new client's warm-up write.
    pub fn snapshot(&self) -> Vec<Arc<EncodedFrame>> {
        self.inner.lock().frames.iter().cloned().collect()
    }

    /// All frames appended after `cursor`, oldest first, plus the new
    /// cursor value to remember. Frames evicted before the reader caught up
    /// are silently skipped - the reader jumps straight to the oldest frame
    /// still retained.
    pub fn drain_after(&self, cursor: u64) -> (Vec<Arc<EncodedFrame>>, u64) {
        let inner = self.inner.lock();
        if inner.latest_index <= cursor {
            return (Vec::new(), cursor);
        }
        let held = inner.frames.len() as u64;
        let oldest_index = inner.latest_index.saturating_sub(held);
        let skip_from = cursor.max(oldest_index);
        let skip = (skip_from - oldest_index) as usize;
        let frames = inner.frames.iter().skip(skip).cloned().collect();
        (frames, inner.latest_index)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64) -> EncodedFrame {
        EncodedFrame::new(vec![0xFF, 0xD8, seq as u8, 0xFF, 0xD9], seq)
    }

    #[test]
    fn never_exceeds_capacity() {
        let ring = FrameRing::new(3);
        for i in 0..10 {
            ring.push(frame(i));
        }
        assert_eq!(ring.snapshot().len(), 3);
    }

    #[test]
    fn eviction_keeps_most_recent() {
        let ring = FrameRing::new(2);
        for i in 0..5 {
            ring.push(frame(i));
        }
        let snapshot = ring.snapshot();
        let sequences: Vec<u64> = snapshot.iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, vec![3, 4]);
    }

    #[test]
    fn slow_reader_skips_evicted_frames_without_duplication_or_truncation() {
        let ring = FrameRing::new(3);
        for i in 0..3 {
            ring.push(frame(i));
        }
        let mut cursor = 0;
        let mut seen = Vec::new();

        for i in 3..20 {
            ring.push(frame(i));
            if i % 4 == 0 {
                let (frames, new_cursor) = ring.drain_after(cursor);
                seen.extend(frames.iter().map(|f| f.sequence));
                cursor = new_cursor;
            }
        }
        let (frames, new_cursor) = ring.drain_after(cursor);
        seen.extend(frames.iter().map(|f| f.sequence));
        cursor = new_cursor;
        assert_eq!(cursor, ring.latest_index());

        let mut sorted = seen.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), seen.len(), "no frame delivered twice");
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "monotonically increasing");
    }

    #[test]
    fn cursor_never_exceeds_latest_index() {
        let ring = FrameRing::new(5);
        for i in 0..5 {
            ring.push(frame(i));
        }
        let (_, cursor) = ring.drain_after(0);
        assert!(cursor <= ring.latest_index());
    }
}
