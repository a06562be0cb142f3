use serde::{Deserialize, Serialize};

/// RingBuffer provides a buffer with a user-defined capacity. As soon as the capacity is reached,
/// the buffer overwrites old values when new values are pushed to it. It is used to keep rolling
/// windows of per-lap quantities, e.g. the recent lap times that form a driver's current pace.
/// It serializes together with the simulation state so that a restored race keeps its rolling
/// windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingBuffer<T> {
    vals: Vec<T>,
    idx: usize,
    capacity: usize,
}

impl<T: Into<f64> + std::marker::Copy> RingBuffer<T> {
    pub fn new(capacity: usize) -> RingBuffer<T> {
        RingBuffer {
            vals: Vec::with_capacity(capacity),
            idx: 0,
            capacity,
        }
    }

    pub fn push(&mut self, val: T) {
        if self.vals.len() < self.capacity {
            self.vals.push(val);
        } else {
            self.vals[self.idx] = val;
            self.idx = (self.idx + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.vals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }

    /// is_full indicates that a complete window of values has been recorded, i.e. that get_avg
    /// reflects the full rolling window and not a shorter warm-up period.
    pub fn is_full(&self) -> bool {
        self.vals.len() == self.capacity
    }

    pub fn get_avg(&self) -> Option<f64> {
        if self.vals.is_empty() {
            return None;
        }
        Some(self.get_sum() / self.vals.len() as f64)
    }

    fn get_sum(&self) -> f64 {
        let mut sum = 0.0;
        for val in self.vals.iter() {
            sum += (*val).into()
        }
        sum
    }
}
