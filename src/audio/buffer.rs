//! Bounded jitter buffer between network and audio timing
//!
//! A small lock-free FIFO decoupling the network loop from the audio
//! callback. Overflow evicts the oldest buffered frame so the queue always
//! holds the most recent audio; underrun returns `None` and the caller
//! substitutes silence. Neither end ever blocks.
//!
//! The same structure carries the sender's outbound queue: the capture
//! callback pushes, the send loop pops, with the identical drop-oldest
//! policy.

use crossbeam::queue::ArrayQueue;

use crate::audio::frame::AudioFrame;

/// Lock-free bounded FIFO of pending audio frames
pub struct JitterBuffer {
    queue: ArrayQueue<AudioFrame>,
}

impl JitterBuffer {
    /// Create a buffer holding at most `capacity` frames
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
        }
    }

    /// Append a frame. At capacity, the oldest frame is evicted and
    /// returned so the caller can count the drop.
    pub fn push(&self, frame: AudioFrame) -> Option<AudioFrame> {
        self.queue.force_push(frame)
    }

    /// Remove and return the oldest frame, or `None` when empty
    pub fn pop(&self) -> Option<AudioFrame> {
        self.queue.pop()
    }

    /// Discard all buffered frames, returning how many were dropped
    pub fn drain(&self) -> usize {
        let mut n = 0;
        while self.queue.pop().is_some() {
            n += 1;
        }
        n
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}
