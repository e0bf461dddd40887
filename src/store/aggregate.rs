//! All-time per-chat aggregates and performance totals
//!
//! Both are derived state: they are only ever advanced by the store's write
//! path (or rebuilt by replaying retained data) and are never rolled back by
//! eviction, because they count all-time activity rather than a window.

use super::events::{PerformanceSample, RequestEvent};
use crate::types::{ChatKey, ChatType, Platform, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary of one chat's activity
///
/// Invariants: `total_requests == successful_requests + failed_requests` and
/// `total_requests == platform_breakdown.values().sum()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAggregate {
    pub chat: ChatKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_name: Option<String>,
    pub chat_type: ChatType,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    #[serde(default)]
    pub platform_breakdown: BTreeMap<Platform, u64>,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
}

impl ChatAggregate {
    /// Zero-valued aggregate returned for unknown chats
    #[must_use]
    pub fn empty(chat: ChatKey) -> Self {
        Self {
            chat,
            chat_name: None,
            chat_type: ChatType::default(),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            platform_breakdown: BTreeMap::new(),
            first_seen: 0,
            last_seen: 0,
        }
    }

    /// Fold one event into the aggregate
    pub fn apply(&mut self, event: &RequestEvent) {
        if self.total_requests == 0 {
            self.first_seen = event.timestamp;
            self.last_seen = event.timestamp;
        } else {
            self.first_seen = self.first_seen.min(event.timestamp);
            self.last_seen = self.last_seen.max(event.timestamp);
        }

        self.total_requests += 1;
        if event.success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
        *self
            .platform_breakdown
            .entry(event.platform.clone())
            .or_insert(0) += 1;

        self.chat_type = event.chat_type;
        if let Some(name) = &event.chat_name {
            self.chat_name = Some(name.clone());
        }
    }

    /// Success rate as a percentage; 100 for a chat with no requests
    #[must_use]
    pub fn success_rate_percent(&self) -> f64 {
        if self.total_requests == 0 {
            100.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64 * 100.0
        }
    }

    /// Check both counting invariants
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let breakdown: u64 = self.platform_breakdown.values().sum();
        self.total_requests == self.successful_requests + self.failed_requests
            && self.total_requests == breakdown
    }
}

/// Latency and size counters for a set of samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceCounters {
    pub successes: u64,
    pub failures: u64,
    /// Sum of latencies over successful samples
    pub total_latency_ms: u64,
    /// Sum of file sizes over successful samples
    pub total_file_size_bytes: u64,
}

impl PerformanceCounters {
    pub fn apply(&mut self, sample: &PerformanceSample) {
        if sample.is_success() {
            self.successes += 1;
            self.total_latency_ms = self.total_latency_ms.saturating_add(sample.latency_ms);
            self.total_file_size_bytes = self
                .total_file_size_bytes
                .saturating_add(sample.file_size_bytes);
        } else {
            self.failures += 1;
        }
    }

    #[must_use]
    #[inline]
    pub fn samples(&self) -> u64 {
        self.successes + self.failures
    }

    /// Mean latency over successful samples, 0 when there are none
    #[must_use]
    pub fn average_latency_ms(&self) -> f64 {
        if self.successes == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.successes as f64
        }
    }

    /// Mean file size over successful samples, 0 when there are none
    #[must_use]
    pub fn average_file_size_bytes(&self) -> f64 {
        if self.successes == 0 {
            0.0
        } else {
            self.total_file_size_bytes as f64 / self.successes as f64
        }
    }
}

/// All-time performance totals, overall and per platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceTotals {
    pub overall: PerformanceCounters,
    #[serde(default)]
    pub platforms: BTreeMap<Platform, PerformanceCounters>,
}

impl PerformanceTotals {
    pub fn apply(&mut self, sample: &PerformanceSample) {
        self.overall.apply(sample);
        self.platforms
            .entry(sample.platform.clone())
            .or_default()
            .apply(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(platform: &str, success: bool, ts: Timestamp) -> RequestEvent {
        RequestEvent::new("42", ChatType::Group, platform, success, ts)
    }

    #[test]
    fn test_empty_aggregate_is_consistent() {
        let agg = ChatAggregate::empty(ChatKey::new("x"));
        assert!(agg.is_consistent());
        assert_eq!(agg.success_rate_percent(), 100.0);
    }

    #[test]
    fn test_apply_counts_and_breakdown() {
        let mut agg = ChatAggregate::empty(ChatKey::new("42"));
        agg.apply(&event("tiktok", true, 100));
        agg.apply(&event("tiktok", false, 200));
        agg.apply(&event("instagram", true, 150));

        assert_eq!(agg.total_requests, 3);
        assert_eq!(agg.successful_requests, 2);
        assert_eq!(agg.failed_requests, 1);
        assert_eq!(agg.platform_breakdown[&Platform::new("tiktok")], 2);
        assert_eq!(agg.platform_breakdown[&Platform::new("instagram")], 1);
        assert_eq!(agg.first_seen, 100);
        assert_eq!(agg.last_seen, 200);
        assert_eq!(agg.chat_type, ChatType::Group);
        assert!(agg.is_consistent());
    }

    #[test]
    fn test_apply_keeps_latest_name() {
        let mut agg = ChatAggregate::empty(ChatKey::new("42"));
        agg.apply(&event("x", true, 1).with_chat_name(Some("Old")));
        agg.apply(&event("x", true, 2));
        assert_eq!(agg.chat_name.as_deref(), Some("Old"));
        agg.apply(&event("x", true, 3).with_chat_name(Some("New")));
        assert_eq!(agg.chat_name.as_deref(), Some("New"));
    }

    #[test]
    fn test_performance_counters_average_only_successes() {
        let mut counters = PerformanceCounters::default();
        counters.apply(&PerformanceSample::success("a", "x", 100, 1_000, 1));
        counters.apply(&PerformanceSample::success("a", "x", 300, 3_000, 2));
        counters.apply(&PerformanceSample::failure("a", "x", 9_999, "boom", 3));

        assert_eq!(counters.samples(), 3);
        assert_eq!(counters.average_latency_ms(), 200.0);
        assert_eq!(counters.average_file_size_bytes(), 2_000.0);
    }

    #[test]
    fn test_performance_counters_no_successes() {
        let mut counters = PerformanceCounters::default();
        counters.apply(&PerformanceSample::failure("a", "x", 50, "boom", 1));
        assert_eq!(counters.average_latency_ms(), 0.0);
        assert_eq!(counters.average_file_size_bytes(), 0.0);
    }

    #[test]
    fn test_performance_totals_per_platform() {
        let mut totals = PerformanceTotals::default();
        totals.apply(&PerformanceSample::success("a", "tiktok", 10, 1, 1));
        totals.apply(&PerformanceSample::success("a", "youtube", 30, 1, 2));
        assert_eq!(totals.overall.successes, 2);
        assert_eq!(totals.platforms.len(), 2);
        assert_eq!(
            totals.platforms[&Platform::new("youtube")].total_latency_ms,
            30
        );
    }
}
