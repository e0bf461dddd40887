//! Default values for configuration fields
//!
//! This module centralizes all default value functions used in serde deserialization.

use super::types::{FailureTier, LimitSet};
use std::time::Duration;

/// Governance is on unless explicitly disabled
#[inline]
pub fn enabled() -> bool {
    true
}

/// Private chats: 10 per minute, 100 per hour, global rapid-fire threshold
#[inline]
pub fn private_limits() -> LimitSet {
    LimitSet {
        per_minute: 10,
        per_hour: 100,
        burst: None,
    }
}

/// Groups: several members share one chat key, so caps and burst are higher
#[inline]
pub fn group_limits() -> LimitSet {
    LimitSet {
        per_minute: 20,
        per_hour: 200,
        burst: Some(8),
    }
}

#[inline]
pub fn supergroup_limits() -> LimitSet {
    LimitSet {
        per_minute: 30,
        per_hour: 300,
        burst: Some(10),
    }
}

#[inline]
pub fn global_per_minute() -> u32 {
    100
}

#[inline]
pub fn global_per_hour() -> u32 {
    2_000
}

/// Retained admission timestamps in the global window
#[inline]
pub fn global_window_capacity() -> usize {
    10_000
}

#[inline]
pub fn rapid_fire_penalty() -> Duration {
    Duration::from_secs(120)
}

/// 3 failures: 5 minutes, 5 failures: 15 minutes, 10 failures: 1 hour
pub fn failure_tiers() -> Vec<FailureTier> {
    vec![
        FailureTier {
            failures: 3,
            duration: Duration::from_secs(5 * 60),
        },
        FailureTier {
            failures: 5,
            duration: Duration::from_secs(15 * 60),
        },
        FailureTier {
            failures: 10,
            duration: Duration::from_secs(60 * 60),
        },
    ]
}

#[inline]
pub fn rapid_fire_count() -> u32 {
    5
}

#[inline]
pub fn rapid_fire_window() -> Duration {
    Duration::from_secs(10)
}

#[inline]
pub fn warning_ratio() -> f64 {
    0.8
}

#[inline]
pub fn warning_suppression() -> Duration {
    Duration::from_secs(5 * 60)
}

#[inline]
pub fn warning_staleness() -> Duration {
    Duration::from_secs(60 * 60)
}

#[inline]
pub fn event_retention() -> Duration {
    Duration::from_secs(30 * 24 * 60 * 60)
}

#[inline]
pub fn performance_retention() -> Duration {
    Duration::from_secs(30 * 24 * 60 * 60)
}

#[inline]
pub fn chat_retention() -> Duration {
    Duration::from_secs(90 * 24 * 60 * 60)
}

/// Soft cap on in-memory request events before oldest-half eviction
#[inline]
pub fn max_events() -> usize {
    50_000
}

/// Soft cap on in-memory performance samples before oldest-half eviction
#[inline]
pub fn max_samples() -> usize {
    50_000
}

#[inline]
pub fn persist_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

#[inline]
pub fn shutdown_timeout() -> Duration {
    crate::constants::storage::DEFAULT_SHUTDOWN_TIMEOUT
}

#[inline]
pub fn maintenance_interval() -> Duration {
    Duration::from_secs(60)
}

/// Entries removed per lock acquisition during a retention sweep
#[inline]
pub fn sweep_chunk() -> usize {
    1_024
}
