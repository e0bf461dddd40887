//! Global summary type and methods
//!
//! An immutable snapshot composed from the chat aggregates and the
//! performance totals. Request counts come from the aggregates so that a
//! persisted and reloaded store reports the same summary.

use crate::store::{PerformanceTotals, RequestTotals};
use crate::types::{ChatType, Platform};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Snapshot of all-time activity (for display/reporting)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalSummary {
    #[serde(rename = "uptime_secs", serialize_with = "serialize_secs")]
    pub uptime: Duration,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// `(total - failed) / total * 100`, 100 when there were no requests
    pub success_rate_percent: f64,
    pub by_platform: BTreeMap<Platform, u64>,
    pub by_chat_type: BTreeMap<ChatType, u64>,
    pub chats: usize,
    pub performance_samples: u64,
    /// Mean latency of successful samples, 0 when there are none
    pub average_latency_ms: f64,
    /// Mean file size of successful samples, 0 when there are none
    pub average_file_size_bytes: f64,
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}

impl GlobalSummary {
    #[must_use]
    pub fn compose(
        uptime: Duration,
        requests: RequestTotals,
        chats: usize,
        performance: &PerformanceTotals,
    ) -> Self {
        Self {
            uptime,
            total_requests: requests.total,
            successful_requests: requests.successful,
            failed_requests: requests.failed,
            success_rate_percent: success_rate_percent(requests.total, requests.failed),
            by_platform: requests.by_platform,
            by_chat_type: requests.by_chat_type,
            chats,
            performance_samples: performance.overall.samples(),
            average_latency_ms: performance.overall.average_latency_ms(),
            average_file_size_bytes: performance.overall.average_file_size_bytes(),
        }
    }

    /// Same summary with uptime zeroed, for comparisons across restarts
    #[must_use]
    pub fn without_uptime(mut self) -> Self {
        self.uptime = Duration::ZERO;
        self
    }

    /// Format uptime as a human-readable string
    #[must_use]
    pub fn format_uptime(&self) -> String {
        let secs = self.uptime.as_secs();
        let days = secs / 86_400;
        let hours = (secs % 86_400) / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if days > 0 {
            format!("{}d {}h {}m", days, hours, minutes)
        } else if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

/// `(total - failed) / total * 100`, defined as 100 for no requests
#[must_use]
pub fn success_rate_percent(total: u64, failed: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        total.saturating_sub(failed) as f64 / total as f64 * 100.0
    }
}
