//! Ordered insertion buffer for out-of-order samples
//!
//! The haptic decoder may emit several keyframes of one effect out of
//! temporal order. This consumer-side buffer keeps samples sorted by
//! ascending presentation timestamp regardless of insertion order, so the
//! scheduler always peeks the earliest pending event.

use std::collections::VecDeque;

use super::types::{Sample, Timestamp};

/// Consumer-side buffer keeping samples in ascending timestamp order
#[derive(Debug)]
pub struct OrderedBuffer<P> {
    buffer: VecDeque<Sample<P>>,
}

impl<P> OrderedBuffer<P> {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
        }
    }

    /// Create an empty buffer with reserved capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    /// Insert a sample at the position that keeps the buffer sorted
    ///
    /// Stable for equal timestamps: a later-arriving sample with the same
    /// timestamp goes after the ones already buffered.
    pub fn insert(&mut self, sample: Sample<P>) {
        let pos = self.buffer.iter().position(|s| s.pts() > sample.pts());
        match pos {
            Some(i) => self.buffer.insert(i, sample),
            None => self.buffer.push_back(sample),
        }
    }

    /// Timestamp of the earliest pending sample
    pub fn peek_front(&self) -> Option<&Sample<P>> {
        self.buffer.front()
    }

    /// Take the earliest pending sample
    pub fn pop_front(&mut self) -> Option<Sample<P>> {
        self.buffer.pop_front()
    }

    /// Earliest pending timestamp
    pub fn front_pts(&self) -> Option<Timestamp> {
        self.buffer.front().map(|s| s.pts())
    }

    /// Number of pending samples
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True when no samples are pending
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard all pending samples
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl<P> Default for OrderedBuffer<P> {
    fn default() -> Self {
        Self::new()
    }
}
