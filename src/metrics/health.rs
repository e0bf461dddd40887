//! Service health from the recent failure rate

use crate::constants::health::{RECENT_WINDOW_MS, UNHEALTHY_FAILURE_PERCENT};
use crate::store::WindowTotals;
use crate::types::Timestamp;
use serde::Serialize;

/// Health of the request pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Recent failures at or below the threshold, or no recent traffic
    Healthy,
    /// More than half of recent requests failed
    Unhealthy,
}

impl HealthStatus {
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub recent_requests: u64,
    pub recent_failures: u64,
    /// 0 when there were no recent requests
    pub failure_rate_percent: f64,
    pub window_secs: u64,
    pub checked_at: Timestamp,
}

impl HealthReport {
    #[must_use]
    pub fn evaluate(recent: WindowTotals, now: Timestamp) -> Self {
        let failure_rate_percent = if recent.total == 0 {
            0.0
        } else {
            recent.failed as f64 / recent.total as f64 * 100.0
        };
        let status = if failure_rate_percent > UNHEALTHY_FAILURE_PERCENT {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            recent_requests: recent.total,
            recent_failures: recent.failed,
            failure_rate_percent,
            window_secs: RECENT_WINDOW_MS / 1000,
            checked_at: now,
        }
    }
}
