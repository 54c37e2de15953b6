use ringbuffer::{AllocRingBuffer, RingBuffer};

/// Most recent per-step portfolio returns, oldest evicted first.
#[derive(Debug, Clone)]
pub struct ReturnHistory {
    returns: AllocRingBuffer<f64>,
}

impl ReturnHistory {
    /// `capacity` must be positive; the environment config guarantees it.
    pub fn new(capacity: usize) -> Self {
        Self {
            returns: AllocRingBuffer::new(capacity.max(1)),
        }
    }

    pub fn push(&mut self, step_return: f64) {
        self.returns.push(step_return);
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.returns.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.returns.capacity()
    }

    pub fn clear(&mut self) {
        self.returns.clear();
    }

    /// Latest return, if any
    pub fn last(&self) -> Option<f64> {
        self.returns.back().copied()
    }

    /// Contents, oldest first
    pub fn to_vec(&self) -> Vec<f64> {
        self.returns.iter().copied().collect()
    }
}
