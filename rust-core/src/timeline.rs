//! Rolling history of quantized peak values
//!
//! Fixed-capacity circular buffer written once per tick. Slots are addressed
//! with `counter mod capacity`; the counter itself wraps and must not be
//! used as an age.

use serde::Serialize;

/// Reference history length
pub const DEFAULT_TIMELINE_CAPACITY: usize = 50;

/// Upper bound on the write counter before it wraps back to 0
pub const COUNTER_LIMIT: usize = 100_000;

/// Circular history of peak values
///
/// Holds no slots until the first push, so nothing can be read before a
/// sentinel is known.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineBuffer {
    values: Vec<f64>,
    capacity: usize,
    counter: usize,
    /// Counter wraps to 0 on reaching this multiple of the capacity
    wrap: usize,
    initialized: bool,
}

/// Buffer contents in slot order plus the next write slot
///
/// `values` is empty before the first push.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSnapshot {
    pub values: Vec<f64>,
    /// Next slot to be written; also the oldest sample once the buffer is full
    pub write_index: usize,
}

impl TimelineSnapshot {
    /// Values oldest first
    pub fn chronological(&self) -> Vec<f64> {
        let (newer, older) = self.values.split_at(self.write_index);
        older.iter().chain(newer).copied().collect()
    }

    /// Slot written most recently, `None` before the first push
    pub fn latest_index(&self) -> Option<usize> {
        let len = self.values.len();
        (len > 0).then(|| (self.write_index + len - 1) % len)
    }
}

impl TimelineBuffer {
    /// Create a buffer with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: Vec::new(),
            capacity,
            counter: 0,
            wrap: (COUNTER_LIMIT / capacity).max(1) * capacity,
            initialized: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Raw write counter
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// True once the first value has been written
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Slot the next value goes to
    pub fn write_index(&self) -> usize {
        self.counter % self.capacity()
    }

    /// Record one value
    ///
    /// The first write fills every slot with `sentinel` before storing
    /// `value`, so unwritten history reads as "no peak" instead of zero.
    pub fn push(&mut self, value: f64, sentinel: f64) {
        if !self.initialized {
            self.values = vec![sentinel; self.capacity];
            self.initialized = true;
        }

        let slot = self.write_index();
        self.values[slot] = value;
        self.counter += 1;
        if self.counter >= self.wrap {
            self.counter = 0;
        }
    }

    /// Value most recently written, if any
    pub fn latest(&self) -> Option<f64> {
        if !self.initialized {
            return None;
        }
        let cap = self.capacity();
        Some(self.values[(self.write_index() + cap - 1) % cap])
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            values: self.values.clone(),
            write_index: self.write_index(),
        }
    }

    /// Forget all history; the next push re-initializes the buffer
    pub fn reset(&mut self) {
        self.values.clear();
        self.counter = 0;
        self.initialized = false;
    }
}

impl Default for TimelineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TIMELINE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_push_fills_with_sentinel() {
        let mut timeline = TimelineBuffer::new(5);
        assert!(!timeline.is_initialized());
        assert_eq!(timeline.latest(), None);

        let empty = timeline.snapshot();
        assert!(empty.values.is_empty());
        assert_eq!(empty.latest_index(), None);
        assert!(empty.chronological().is_empty());

        timeline.push(27.3, 27.0);
        let snap = timeline.snapshot();
        assert_eq!(snap.values, vec![27.3, 27.0, 27.0, 27.0, 27.0]);
        assert_eq!(snap.write_index, 1);
        assert_eq!(timeline.latest(), Some(27.3));
    }

    #[test]
    fn test_capacity_pushes_fill_each_slot_once() {
        let mut timeline = TimelineBuffer::new(DEFAULT_TIMELINE_CAPACITY);
        for i in 0..DEFAULT_TIMELINE_CAPACITY {
            timeline.push(100.0 + i as f64, 27.0);
        }
        let snap = timeline.snapshot();
        for i in 0..DEFAULT_TIMELINE_CAPACITY {
            assert_eq!(snap.values[i % DEFAULT_TIMELINE_CAPACITY], 100.0 + i as f64);
        }
        assert_eq!(snap.write_index, 0);

        timeline.push(-1.0, 27.0);
        let snap = timeline.snapshot();
        assert_eq!(snap.values[0], -1.0);
        assert_eq!(snap.values[1], 101.0);
        assert_eq!(snap.write_index, 1);
    }

    #[test]
    fn test_chronological_order() {
        let mut timeline = TimelineBuffer::new(4);
        for v in 1..=6 {
            timeline.push(v as f64, 0.0);
        }
        let snap = timeline.snapshot();
        assert_eq!(snap.values, vec![5.0, 6.0, 3.0, 4.0]);
        assert_eq!(snap.chronological(), vec![3.0, 4.0, 5.0, 6.0]);
        assert_eq!(snap.latest_index(), Some(1));
    }

    #[test]
    fn test_counter_wrap_keeps_slot_sequence() {
        let mut timeline = TimelineBuffer::new(50);
        let mut slots = Vec::new();
        for _ in 0..(COUNTER_LIMIT + 3) {
            slots.push(timeline.write_index());
            timeline.push(1.0, 0.0);
        }
        assert!(timeline.counter() < COUNTER_LIMIT);
        for pair in slots.windows(2) {
            assert_eq!(pair[1], (pair[0] + 1) % 50);
        }
    }

    #[test]
    fn test_odd_capacity_wrap() {
        let mut timeline = TimelineBuffer::new(7);
        let wrap = (COUNTER_LIMIT / 7) * 7;
        for _ in 0..wrap {
            timeline.push(1.0, 0.0);
        }
        assert_eq!(timeline.counter(), 0);
        assert_eq!(timeline.write_index(), 0);
    }

    #[test]
    fn test_reset() {
        let mut timeline = TimelineBuffer::new(3);
        timeline.push(1.0, 0.0);
        timeline.reset();
        assert!(!timeline.is_initialized());
        assert!(timeline.snapshot().values.is_empty());
        timeline.push(2.0, 5.0);
        assert_eq!(timeline.snapshot().values, vec![2.0, 5.0, 5.0]);
    }
}
