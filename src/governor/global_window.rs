//! Bounded window of admitted-request timestamps across all chats
//!
//! Only used for global throughput limiting. Once the capacity is reached
//! the oldest timestamps are dropped, so counts are a lower bound when the
//! capacity is smaller than the hourly limit.

use crate::types::Timestamp;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub(crate) struct GlobalWindow {
    admitted: VecDeque<Timestamp>,
    capacity: usize,
}

impl GlobalWindow {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            admitted: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Record an admission, keeping timestamps ordered
    pub(crate) fn push(&mut self, now: Timestamp) {
        match self.admitted.back() {
            Some(&last) if last > now => {
                let at = self.admitted.partition_point(|&ts| ts <= now);
                self.admitted.insert(at, now);
            }
            _ => self.admitted.push_back(now),
        }
        while self.admitted.len() > self.capacity {
            self.admitted.pop_front();
        }
    }

    /// Admissions with `timestamp > now - window_ms`
    pub(crate) fn count(&self, window_ms: u64, now: Timestamp) -> usize {
        let cutoff = now.saturating_sub(window_ms);
        self.admitted.len() - self.admitted.partition_point(|&ts| ts <= cutoff)
    }

    /// Drop timestamps at or before `cutoff`
    pub(crate) fn prune(&mut self, cutoff: Timestamp) -> usize {
        let expired = self.admitted.partition_point(|&ts| ts <= cutoff);
        self.admitted.drain(..expired);
        expired
    }

    pub(crate) fn len(&self) -> usize {
        self.admitted.len()
    }
}
