//! Lock-free trace queue
//!
//! Single-producer/single-consumer hand-off of sweeps from an acquisition
//! thread (or a replay of recorded sweeps) to the tick loop.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

use super::{Trace, TraceSource};
use crate::error::AcquisitionError;

/// Bounded queue of sweeps
pub struct TraceQueue {
    producer: HeapProducer<Trace>,
    consumer: HeapConsumer<Trace>,
    capacity: usize,
}

impl TraceQueue {
    /// Create a new queue holding at most `capacity` sweeps
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::<Trace>::new(capacity);
        let (producer, consumer) = rb.split();

        Self {
            producer,
            consumer,
            capacity,
        }
    }

    /// Split into producer and consumer ends
    pub fn split(self) -> (TraceProducer, TraceConsumer) {
        (
            TraceProducer {
                producer: self.producer,
                capacity: self.capacity,
            },
            TraceConsumer {
                consumer: self.consumer,
                capacity: self.capacity,
            },
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Writing end of a [`TraceQueue`]
pub struct TraceProducer {
    producer: HeapProducer<Trace>,
    capacity: usize,
}

impl TraceProducer {
    /// Enqueue a sweep
    ///
    /// # Returns
    /// The sweep back if the queue is full
    pub fn push(&mut self, trace: Trace) -> Result<(), Trace> {
        self.producer.push(trace)
    }

    /// Number of free slots
    pub fn free_len(&self) -> usize {
        self.producer.free_len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Reading end of a [`TraceQueue`]; acts as a trace source
pub struct TraceConsumer {
    consumer: HeapConsumer<Trace>,
    capacity: usize,
}

impl TraceConsumer {
    /// Number of queued sweeps
    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    /// Drop everything queued so far
    pub fn clear(&mut self) -> usize {
        let mut dropped = 0;
        while self.consumer.pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl TraceSource for TraceConsumer {
    fn next_trace(&mut self) -> Result<Trace, AcquisitionError> {
        self.consumer.pop().ok_or(AcquisitionError::NoData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(offset: f64) -> Trace {
        Trace::new(vec![1.0, 2.0], vec![offset, offset], vec![0.0, 0.0]).unwrap()
    }

    #[test]
    fn test_queue_fifo_order() {
        let (mut producer, mut consumer) = TraceQueue::new(4).split();
        producer.push(trace(1.0)).unwrap();
        producer.push(trace(2.0)).unwrap();
        assert_eq!(consumer.len(), 2);

        assert_eq!(consumer.next_trace().unwrap().magnitudes()[0], 1.0);
        assert_eq!(consumer.next_trace().unwrap().magnitudes()[0], 2.0);
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_queue_overflow_returns_trace() {
        let (mut producer, _consumer) = TraceQueue::new(1).split();
        producer.push(trace(1.0)).unwrap();
        assert_eq!(producer.free_len(), 0);

        let rejected = producer.push(trace(2.0)).unwrap_err();
        assert_eq!(rejected.magnitudes()[0], 2.0);
    }

    #[test]
    fn test_empty_queue_is_no_data() {
        let (_producer, mut consumer) = TraceQueue::new(2).split();
        assert!(matches!(consumer.next_trace(), Err(AcquisitionError::NoData)));
    }

    #[test]
    fn test_clear() {
        let (mut producer, mut consumer) = TraceQueue::new(3).split();
        producer.push(trace(1.0)).unwrap();
        producer.push(trace(2.0)).unwrap();
        assert_eq!(consumer.clear(), 2);
        assert!(consumer.is_empty());
    }
}
