//! Per-platform performance view

use super::summary::success_rate_percent;
use crate::store::{PerformanceCounters, PerformanceTotals};
use crate::types::Platform;
use serde::Serialize;

/// Latency, size and error figures for one platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformPerformance {
    pub platform: Platform,
    pub samples: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate_percent: f64,
    pub average_latency_ms: f64,
    pub average_file_size_bytes: f64,
}

impl PlatformPerformance {
    #[must_use]
    pub fn from_counters(platform: Platform, counters: &PerformanceCounters) -> Self {
        Self {
            platform,
            samples: counters.samples(),
            successes: counters.successes,
            failures: counters.failures,
            success_rate_percent: success_rate_percent(counters.samples(), counters.failures),
            average_latency_ms: counters.average_latency_ms(),
            average_file_size_bytes: counters.average_file_size_bytes(),
        }
    }
}

/// One entry per platform, ordered by platform tag
#[must_use]
pub fn platform_breakdown(totals: &PerformanceTotals) -> Vec<PlatformPerformance> {
    totals
        .platforms
        .iter()
        .map(|(platform, counters)| PlatformPerformance::from_counters(platform.clone(), counters))
        .collect()
}
