//! FIFO buffer decoupling message production from network draining.
//!
//! One producing context (the periodic simulation tick running
//! lifecycle calls) pushes wire-ready frames; one consuming context
//! (the network adapter) drains them. The buffer is internally locked,
//! so neither side needs external synchronization. Capacity is
//! unbounded: a stalled consumer grows the queue without limit, which
//! is an operational concern for the host to monitor via [`MessageBuffer::len`],
//! not an invariant this type enforces.

use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::Mutex;

/// Ordered queue of wire-ready message frames.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    frames: Mutex<VecDeque<Bytes>>,
}

impl MessageBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a frame. Never fails; order equals emission order.
    pub fn push(&self, frame: Bytes) {
        self.frames.lock().push_back(frame);
    }

    /// Current queue depth.
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    /// Whether the queue is currently observed empty.
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// One-shot lazy drain in FIFO order.
    ///
    /// The iterator pops frames until it observes the buffer empty and
    /// never blocks waiting for new messages. Draining again after new
    /// frames were pushed picks those up; this is not a replay
    /// mechanism.
    pub fn drain(&self) -> Drain<'_> {
        Drain { buffer: self }
    }
}

/// Lazy draining iterator over a [`MessageBuffer`].
///
/// The lock is taken per item, so frames pushed while iterating are
/// still yielded in order.
#[derive(Debug)]
pub struct Drain<'a> {
    buffer: &'a MessageBuffer,
}

impl Iterator for Drain<'_> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        self.buffer.frames.lock().pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_fifo_order() {
        let buffer = MessageBuffer::new();
        buffer.push(Bytes::from_static(b"first"));
        buffer.push(Bytes::from_static(b"second"));
        buffer.push(Bytes::from_static(b"third"));

        let drained: Vec<Bytes> = buffer.drain().collect();
        assert_eq!(drained, vec![
            Bytes::from_static(b"first"),
            Bytes::from_static(b"second"),
            Bytes::from_static(b"third"),
        ]);
    }

    #[test]
    fn test_second_drain_is_empty_until_new_frames() {
        let buffer = MessageBuffer::new();
        buffer.push(Bytes::from_static(b"only"));

        assert_eq!(buffer.drain().count(), 1);
        assert_eq!(buffer.drain().count(), 0);

        buffer.push(Bytes::from_static(b"later"));
        assert_eq!(buffer.drain().count(), 1);
    }

    #[test]
    fn test_queue_depth_is_observable() {
        let buffer = MessageBuffer::new();
        assert!(buffer.is_empty());

        buffer.push(Bytes::from_static(b"frame"));
        buffer.push(Bytes::from_static(b"frame"));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_concurrent_push_and_drain() {
        use std::sync::Arc;

        let buffer = Arc::new(MessageBuffer::new());
        let producer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                for i in 0..1000u32 {
                    buffer.push(Bytes::from(i.to_be_bytes().to_vec()));
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < 1000 {
            for frame in buffer.drain() {
                seen.push(frame);
            }
        }
        producer.join().unwrap();

        // Drained frames preserve emission order.
        for (i, frame) in seen.iter().enumerate() {
            assert_eq!(frame.as_ref(), (i as u32).to_be_bytes());
        }
    }
}
