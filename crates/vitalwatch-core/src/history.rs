//! Fixed-capacity ring of recent motion samples.
//!
//! Slots are allocated once at construction. Appending to a full ring
//! overwrites the oldest sample, so memory use never grows after start-up and
//! both append and evict are O(1).

use crate::sample::MotionSample;

/// Ring buffer of the most recent `capacity` samples, oldest first.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    slots: Box<[MotionSample]>,
    /// Index of the oldest sample.
    head: usize,
    len: usize,
}

impl HistoryBuffer {
    /// Create an empty ring. `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be non-zero");
        Self {
            slots: vec![MotionSample::default(); capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append at the tail, evicting the oldest sample first when full.
    /// Returns the evicted sample, if any.
    pub fn push(&mut self, sample: MotionSample) -> Option<MotionSample> {
        let cap = self.slots.len();
        if self.len == cap {
            let evicted = std::mem::replace(&mut self.slots[self.head], sample);
            self.head = (self.head + 1) % cap;
            Some(evicted)
        } else {
            let tail = (self.head + self.len) % cap;
            self.slots[tail] = sample;
            self.len += 1;
            None
        }
    }

    /// Up to `n` samples that precede the `skip_newest` most recent ones, in
    /// arrival order.
    pub fn preceding(&self, skip_newest: usize, n: usize) -> Vec<MotionSample> {
        let end = self.len.saturating_sub(skip_newest);
        let start = end.saturating_sub(n);
        self.iter().skip(start).take(end - start).collect()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = MotionSample> + '_ {
        let cap = self.slots.len();
        (0..self.len).map(move |i| self.slots[(self.head + i) % cap])
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
