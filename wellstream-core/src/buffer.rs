//! Bounded Ring Buffer for Per-Series History
//!
//! ## Overview
//!
//! Both the stream processor's sliding window and the feature engineer's
//! history are bounded FIFO sequences: append at the tail, and once the
//! buffer is full every append evicts the oldest entry. This module provides
//! that structure with a capacity chosen at runtime from configuration.
//!
//! ### Why a Ring Buffer?
//!
//! - O(1) insertion (overwrites oldest when full)
//! - O(1) access to the most recent entry
//! - O(n) chronological iteration
//! - Storage allocated once, on first fill; never compacted
//!
//! ### Memory Layout
//!
//! ```text
//! RingBuffer with capacity 5, after 7 pushes (values 0..=6):
//! ┌─────┬─────┬─────┬─────┬─────┐
//! │  5  │  6  │  2  │  3  │  4  │  ← physical slots
//! └─────┴─────┴─────┴─────┴─────┘
//!                ↑
//!                └── write_pos = 2 (oldest entry, next overwrite)
//!
//! Logical view: [2, 3, 4, 5, 6]
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use wellstream_core::buffer::RingBuffer;
//!
//! let mut history = RingBuffer::new(3);
//! for value in [1.0, 2.0, 3.0, 4.0] {
//!     history.push(value);
//! }
//!
//! let values: Vec<f64> = history.iter().copied().collect();
//! assert_eq!(values, vec![2.0, 3.0, 4.0]);
//! assert_eq!(history.last(), Some(&4.0));
//! ```

/// Fixed-capacity FIFO ring buffer
///
/// ## Internal Invariants
///
/// - `data.len() <= capacity`
/// - while `data.len() < capacity`, entries sit in push order and
///   `write_pos == data.len()`
/// - once full, the oldest entry lives at `write_pos`
///
/// ## Thread Safety
///
/// Not synchronized. The pipeline mutates buffers from a single worker only.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    write_pos: usize,
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` entries
    ///
    /// A capacity of zero is bumped to one; a window that cannot hold the
    /// current sample is meaningless.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: Vec::new(),
            capacity,
            write_pos: 0,
        }
    }

    /// Appends an entry, evicting the oldest one when full
    ///
    /// Returns the evicted entry, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.data.len() < self.capacity {
            self.data.push(item);
            self.write_pos = self.data.len() % self.capacity;
            return None;
        }

        let evicted = std::mem::replace(&mut self.data[self.write_pos], item);
        self.write_pos = (self.write_pos + 1) % self.capacity;
        Some(evicted)
    }

    /// Get number of stored entries
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.get(self.data.len() - 1)
    }

    /// Entry by logical index (0 = oldest, len-1 = newest)
    ///
    /// ```text
    /// Physical array:  [D, E, A, B, C]  (write_pos = 2)
    /// Logical view:    [A, B, C, D, E]
    /// logical[i] = physical[(write_pos + i) % capacity]
    /// ```
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.data.len() {
            return None;
        }

        let actual_index = if self.is_full() {
            (self.write_pos + index) % self.capacity
        } else {
            index
        };

        self.data.get(actual_index)
    }

    /// Iterate over entries from oldest to newest
    pub fn iter(&self) -> RingBufferIter<'_, T> {
        RingBufferIter {
            buffer: self,
            index: 0,
        }
    }

    /// Iterate over the newest `n` entries, oldest of them first
    pub fn tail(&self, n: usize) -> RingBufferIter<'_, T> {
        RingBufferIter {
            buffer: self,
            index: self.data.len().saturating_sub(n),
        }
    }

    /// Remove every entry, keeping the capacity
    pub fn clear(&mut self) {
        self.data.clear();
        self.write_pos = 0;
    }
}

/// Chronological iterator over a [`RingBuffer`]
pub struct RingBufferIter<'a, T> {
    buffer: &'a RingBuffer<T>,
    index: usize,
}

impl<'a, T> Iterator for RingBufferIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.buffer.get(self.index)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buffer.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<'a, T> ExactSizeIterator for RingBufferIter<'a, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer() {
        let buffer: RingBuffer<f64> = RingBuffer::new(5);
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert!(buffer.last().is_none());
        assert_eq!(buffer.iter().count(), 0);
    }

    #[test]
    fn push_and_retrieve() {
        let mut buffer = RingBuffer::new(5);
        assert!(buffer.push(25.0).is_none());
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.last(), Some(&25.0));
    }

    #[test]
    fn circular_overwrite() {
        let mut buffer = RingBuffer::new(3);

        let mut evicted = Vec::new();
        for i in 0..5 {
            if let Some(old) = buffer.push(i) {
                evicted.push(old);
            }
        }

        assert_eq!(buffer.len(), 3);
        assert!(buffer.is_full());
        assert_eq!(evicted, vec![0, 1]);

        let values: Vec<i32> = buffer.iter().copied().collect();
        assert_eq!(values, vec![2, 3, 4]);
        assert_eq!(buffer.last(), Some(&4));
    }

    #[test]
    fn tail_returns_newest_in_order() {
        let mut buffer = RingBuffer::new(4);
        for i in 0..7 {
            buffer.push(i);
        }

        let tail: Vec<i32> = buffer.tail(2).copied().collect();
        assert_eq!(tail, vec![5, 6]);

        let all: Vec<i32> = buffer.tail(10).copied().collect();
        assert_eq!(all, vec![3, 4, 5, 6]);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut buffer = RingBuffer::new(0);
        buffer.push(1);
        buffer.push(2);
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn clear_resets() {
        let mut buffer = RingBuffer::new(2);
        buffer.push(1);
        buffer.push(2);
        buffer.push(3);
        buffer.clear();
        assert!(buffer.is_empty());

        buffer.push(9);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![9]);
    }
}
