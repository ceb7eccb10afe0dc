//! Fixed-capacity, insertion-ordered ring buffer with overwrite-oldest eviction.
//!
//! Elements are owned by value; eviction hands the oldest element back to the
//! caller (or drops it). Storage is a `Vec<Option<T>>` indexed modulo capacity,
//! so `enqueue`, `dequeue`, `first` and `last` are O(1).

use thiserror::Error;

/// Default history depth: 24 h of 5 minute readings.
pub const DEFAULT_CAPACITY: usize = 288;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RingBufferError {
    #[error("ring buffer is empty")]
    Empty,
    #[error("requested {requested} elements but buffer holds {len}")]
    OutOfRange { requested: usize, len: usize },
    #[error("capacity must be >= 1")]
    ZeroCapacity,
    #[error("capacity {capacity} is below current length {len}")]
    CapacityBelowLen { capacity: usize, len: usize },
}

#[derive(Clone)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    /// Index of the oldest element.
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        Ok(Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            head: 0,
            len: 0,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    #[inline]
    fn slot(&self, offset: usize) -> usize {
        (self.head + offset) % self.capacity()
    }

    /// Append `item` as the newest element. When full, the oldest element is
    /// evicted first and returned.
    pub fn enqueue(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.dequeue().ok()
        } else {
            None
        };
        let tail = self.slot(self.len);
        self.slots[tail] = Some(item);
        self.len += 1;
        evicted
    }

    /// Remove and return the oldest element.
    pub fn dequeue(&mut self) -> Result<T, RingBufferError> {
        if self.is_empty() {
            return Err(RingBufferError::Empty);
        }
        let item = self.slots[self.head].take().ok_or(RingBufferError::Empty)?;
        self.head = self.slot(1);
        self.len -= 1;
        Ok(item)
    }

    fn get(&self, offset: usize) -> Option<&T> {
        if offset >= self.len {
            return None;
        }
        self.slots[self.slot(offset)].as_ref()
    }

    /// Oldest element.
    pub fn first(&self) -> Result<&T, RingBufferError> {
        self.get(0).ok_or(RingBufferError::Empty)
    }

    /// Newest element.
    pub fn last(&self) -> Result<&T, RingBufferError> {
        if self.is_empty() {
            return Err(RingBufferError::Empty);
        }
        self.get(self.len - 1).ok_or(RingBufferError::Empty)
    }

    /// The `n` oldest elements, oldest first.
    pub fn first_n(&self, n: usize) -> Result<Vec<&T>, RingBufferError> {
        if n > self.len {
            return Err(RingBufferError::OutOfRange {
                requested: n,
                len: self.len,
            });
        }
        Ok(self.iter().take(n).collect())
    }

    /// The `n` newest elements, oldest first.
    pub fn last_n(&self, n: usize) -> Result<Vec<&T>, RingBufferError> {
        if n > self.len {
            return Err(RingBufferError::OutOfRange {
                requested: n,
                len: self.len,
            });
        }
        Ok(self.iter().skip(self.len - n).collect())
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    /// Resize the buffer, keeping every element in order.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        if capacity < self.len {
            return Err(RingBufferError::CapacityBelowLen {
                capacity,
                len: self.len,
            });
        }
        let mut slots: Vec<Option<T>> = Vec::with_capacity(capacity);
        while let Ok(item) = self.dequeue() {
            slots.push(Some(item));
        }
        let len = slots.len();
        slots.resize_with(capacity, || None);
        self.slots = slots;
        self.head = 0;
        self.len = len;
        Ok(())
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self {
            slots: std::iter::repeat_with(|| None)
                .take(DEFAULT_CAPACITY)
                .collect(),
            head: 0,
            len: 0,
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("items", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}
