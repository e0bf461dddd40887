//! Retention policy and sweep reporting

use crate::config::RetentionConfig;
use crate::types::{Timestamp, duration_ms};
use serde::Serialize;
use std::time::Duration;

/// Maximum age per data class; a zero duration keeps data forever
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    pub events: Duration,
    pub performance: Duration,
    pub chats: Duration,
}

impl RetentionPolicy {
    /// Policy that never deletes anything
    pub const FOREVER: Self = Self {
        events: Duration::ZERO,
        performance: Duration::ZERO,
        chats: Duration::ZERO,
    };

    pub(crate) fn events_cutoff(&self, now: Timestamp) -> Option<Timestamp> {
        cutoff(self.events, now)
    }

    pub(crate) fn performance_cutoff(&self, now: Timestamp) -> Option<Timestamp> {
        cutoff(self.performance, now)
    }

    pub(crate) fn chats_cutoff(&self, now: Timestamp) -> Option<Timestamp> {
        cutoff(self.chats, now)
    }
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            events: config.events,
            performance: config.performance,
            chats: config.chats,
        }
    }
}

/// Entries with `timestamp <= cutoff` are expired; `None` keeps everything
fn cutoff(max_age: Duration, now: Timestamp) -> Option<Timestamp> {
    if max_age.is_zero() {
        return None;
    }
    now.checked_sub(duration_ms(max_age))
}

/// What one retention sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub events_removed: usize,
    pub samples_removed: usize,
    pub chats_removed: usize,
    /// Per-chat window queues dropped once their last event left the hour
    pub window_queues_dropped: usize,
    /// Write-lock acquisitions the sweep was split into
    pub batches: usize,
}

impl SweepReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events_removed == 0 && self.samples_removed == 0 && self.chats_removed == 0
    }
}
