//! Admission decisions
//!
//! A decision is always produced; denial is a value, never an error.

use crate::config::LimitSet;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Penalty,
    GlobalLimit,
    RateLimit,
    RapidFire,
}

impl DenyReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Penalty => "penalty",
            Self::GlobalLimit => "global_limit",
            Self::RateLimit => "rate_limit",
            Self::RapidFire => "rapid_fire",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which per-chat window a usage figure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageWindow {
    Minute,
    Hour,
}

/// Recorded requests against one limit
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WindowUsage {
    /// Requests recorded in the window before this decision
    pub used: u64,
    pub limit: u32,
    /// `(used + 1) / limit`: usage if the request being decided is admitted
    pub ratio: f64,
}

impl WindowUsage {
    #[must_use]
    pub fn new(used: u64, limit: u32) -> Self {
        let ratio = if limit == 0 {
            0.0
        } else {
            (used + 1) as f64 / f64::from(limit)
        };
        Self { used, limit, ratio }
    }

    /// The window is full: `used >= limit`
    #[must_use]
    #[inline]
    pub fn exhausted(&self) -> bool {
        self.used >= u64::from(self.limit)
    }
}

/// Per-chat usage at decision time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub minute: WindowUsage,
    pub hour: WindowUsage,
}

impl UsageSnapshot {
    #[must_use]
    pub fn new(minute_used: u64, hour_used: u64, limits: &LimitSet) -> Self {
        Self {
            minute: WindowUsage::new(minute_used, limits.per_minute),
            hour: WindowUsage::new(hour_used, limits.per_hour),
        }
    }

    /// The window closest to its limit and its ratio
    #[must_use]
    pub fn peak(&self) -> (UsageWindow, f64) {
        if self.hour.ratio > self.minute.ratio {
            (UsageWindow::Hour, self.hour.ratio)
        } else {
            (UsageWindow::Minute, self.minute.ratio)
        }
    }
}

/// Attached to an admitted request whose chat is near its limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageWarning {
    pub window: UsageWindow,
    pub ratio: f64,
    pub issued_at: Timestamp,
}

/// Outcome of one admission check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
    /// 0 for admitted requests
    pub retry_after_ms: u64,
    pub usage: UsageSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<UsageWarning>,
}

impl Decision {
    #[must_use]
    pub fn allow(usage: UsageSnapshot, warning: Option<UsageWarning>) -> Self {
        Self {
            allowed: true,
            reason: None,
            retry_after_ms: 0,
            usage,
            warning,
        }
    }

    #[must_use]
    pub fn deny(reason: DenyReason, retry_after_ms: u64, usage: UsageSnapshot) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            retry_after_ms,
            usage,
            warning: None,
        }
    }

    /// Retry hint rounded up to whole seconds
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_ms.div_ceil(1000)
    }
}

/// Seconds until the next fixed wall-clock boundary of a `window_secs` window
///
/// This is a clock-boundary hint, not the expiry of the oldest request in
/// the sliding window.
#[must_use]
pub fn boundary_retry_secs(now: Timestamp, window_secs: u64) -> u64 {
    if window_secs == 0 {
        return 0;
    }
    window_secs - (now / 1000) % window_secs
}
