use crate::types::{EyePoses, Pose};
use crate::{Result, RiftlagError};

/// Fixed-capacity circular buffer with a write head.
///
/// `record` writes at the head and advances it by one slot. Reads are relative to the
/// last written slot, so `read_delayed(0)` returns the value recorded by the most recent
/// `record` call.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    head: usize,
    written: usize,
}

impl<T: Clone> RingBuffer<T> {
    /// Create a buffer of `capacity` slots pre-filled with `fill`.
    pub fn new(capacity: usize, fill: T) -> Result<Self> {
        if capacity == 0 {
            return Err(RiftlagError::InvalidCapacity);
        }
        Ok(Self {
            slots: vec![fill; capacity],
            head: 0,
            written: 0,
        })
    }

    /// Forget every recorded value. The head returns to slot 0.
    pub fn reset(&mut self) {
        self.head = 0;
        self.written = 0;
    }
}

impl<T> RingBuffer<T> {
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slot the next `record` call writes to.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Number of slots written so far, saturating at capacity.
    pub fn len(&self) -> usize {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Map a head-relative offset to a slot index. Offset -k is k slots before the head.
    pub fn normalize(&self, offset: isize) -> usize {
        let capacity = self.slots.len() as isize;
        (self.head as isize + offset % capacity).rem_euclid(capacity) as usize
    }

    /// Store `value` at the head and advance the head modulo capacity.
    pub fn record(&mut self, value: T) {
        let head = self.head;
        self.slots[head] = value;
        self.head = self.normalize(1);
        self.written = (self.written + 1).min(self.slots.len());
    }

    /// Value recorded `lag` calls before the most recent one.
    ///
    /// Lags of capacity or more wrap around and yield stale data. Returns `None` while the
    /// addressed slot has not been written in this buffer's lifetime.
    pub fn read_delayed(&self, lag: usize) -> Option<&T> {
        let wrapped = lag % self.slots.len();
        if wrapped >= self.written {
            return None;
        }
        Some(&self.slots[self.normalize(-(wrapped as isize) - 1)])
    }

    /// Raw slot access relative to the head, whether or not it was written.
    pub fn at_offset(&self, offset: isize) -> &T {
        &self.slots[self.normalize(offset)]
    }
}

/// Per-frame left/right pose history.
pub type PoseRingBuffer = RingBuffer<EyePoses>;

/// Default pose history length, in frames.
pub const DEFAULT_POSE_HISTORY: usize = 30;

impl RingBuffer<EyePoses> {
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        RingBuffer::new(capacity, [Pose::IDENTITY; 2])
    }
}
