//! Fixed-capacity ring buffer with oldest-first eviction.
//!
//! [`RingBuffer`] holds at most `capacity` items. Appending at capacity evicts
//! exactly one item (the oldest) and bumps the drop counter. Reads copy the
//! contents out under the lock, so a reader never observes a half-applied
//! append and a concurrent append never disturbs a snapshot already taken.
//!
//! The buffer is guarded by a single [`parking_lot::Mutex`]; every operation
//! is O(1) except the copying reads, which are O(len).
//!
//! # Example
//!
//! ```
//! use wyn_log::buffer::RingBuffer;
//!
//! let buffer = RingBuffer::new(2);
//! buffer.push("a");
//! buffer.push("b");
//! let receipt = buffer.push("c");
//!
//! assert!(receipt.evicted);
//! assert_eq!(buffer.snapshot(), vec!["b", "c"]);
//! assert_eq!(buffer.drop_count(), 1);
//! ```

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Default capacity used by the logger.
pub const DEFAULT_CAPACITY: usize = 2000;

// ---------------------------------------------------------------------------
// PushReceipt
// ---------------------------------------------------------------------------

/// Result of a single append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushReceipt {
    /// Zero-based insertion sequence of the appended item.
    pub sequence: u64,
    /// Whether the append evicted the oldest item.
    pub evicted: bool,
}

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<T>,
    dropped: u64,
    pushed: u64,
}

/// Bounded append-only store. See the [module docs](self).
#[derive(Debug)]
pub struct RingBuffer<T> {
    inner: Mutex<Inner<T>>,
    capacity: usize,
}

impl<T: Clone> RingBuffer<T> {
    /// Create a buffer holding up to `capacity` items. A capacity of zero is
    /// raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                dropped: 0,
                pushed: 0,
            }),
            capacity,
        }
    }

    /// Append an item, evicting the oldest if the buffer is full.
    pub fn push(&self, item: T) -> PushReceipt {
        self.push_with(|_| item)
    }

    /// Append an item built from its insertion sequence.
    ///
    /// `build` runs while the lock is held, so items built this way observe a
    /// total order: sequence numbers and anything `build` reads from a
    /// monotonic source (timestamps) are non-decreasing in buffer order.
    pub fn push_with(&self, build: impl FnOnce(u64) -> T) -> PushReceipt {
        let mut inner = self.inner.lock();
        let sequence = inner.pushed;
        let item = build(sequence);

        let evicted = inner.items.len() >= self.capacity;
        if evicted {
            inner.items.pop_front();
            inner.dropped += 1;
        }
        inner.items.push_back(item);
        inner.pushed += 1;

        PushReceipt { sequence, evicted }
    }

    /// All items, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.lock().items.iter().cloned().collect()
    }

    /// The last `n` items, oldest first.
    pub fn recent(&self, n: usize) -> Vec<T> {
        let inner = self.inner.lock();
        let skip = inner.items.len().saturating_sub(n);
        inner.items.iter().skip(skip).cloned().collect()
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Returns `true` if nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Maximum number of items held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items evicted to make room.
    pub fn drop_count(&self) -> u64 {
        self.inner.lock().dropped
    }

    /// Number of appends since construction.
    pub fn total_pushed(&self) -> u64 {
        self.inner.lock().pushed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fills_then_evicts_oldest() {
        let buffer = RingBuffer::new(3);
        for i in 0..3 {
            assert!(!buffer.push(i).evicted);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.drop_count(), 0);

        let receipt = buffer.push(3);
        assert!(receipt.evicted);
        assert_eq!(receipt.sequence, 3);
        assert_eq!(buffer.snapshot(), vec![1, 2, 3]);
        assert_eq!(buffer.drop_count(), 1);
        assert_eq!(buffer.total_pushed(), 4);
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let buffer = RingBuffer::new(10);
        for i in 0..6 {
            buffer.push(i);
        }
        assert_eq!(buffer.recent(3), vec![3, 4, 5]);
        assert_eq!(buffer.recent(100), vec![0, 1, 2, 3, 4, 5]);
        assert!(buffer.recent(0).is_empty());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let buffer = RingBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push("a");
        buffer.push("b");
        assert_eq!(buffer.snapshot(), vec!["b"]);
    }

    #[test]
    fn push_with_sees_sequence() {
        let buffer = RingBuffer::new(4);
        buffer.push_with(|seq| seq * 10);
        buffer.push_with(|seq| seq * 10);
        assert_eq!(buffer.snapshot(), vec![0, 10]);
    }

    #[test]
    fn concurrent_appends_keep_total_order() {
        let buffer = Arc::new(RingBuffer::new(10_000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        buffer.push_with(|seq| seq);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let items = buffer.snapshot();
        assert_eq!(items.len(), 2000);
        assert!(items.windows(2).all(|w| w[0] < w[1]));
    }
}
