//! Read-side metrics over the event store
//!
//! The aggregator is constructed once at startup and shared by handle. It
//! never writes: every figure is composed from the store's aggregates, logs
//! and performance totals at the time of the call.

mod health;
mod platform;
mod summary;

pub use health::{HealthReport, HealthStatus};
pub use platform::{PlatformPerformance, platform_breakdown};
pub use summary::{GlobalSummary, success_rate_percent};

use crate::constants::health::RECENT_WINDOW_MS;
use crate::store::{ChatAggregate, EventStore, StorageInfo, StoreSnapshot};
use crate::types::{ChatKey, Timestamp};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Thread-safe metrics handle
///
/// Cloning is cheap and shares the start time used for uptime.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    store: EventStore,
    start_time: Instant,
}

impl MetricsAggregator {
    #[must_use]
    pub fn new(store: EventStore) -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                store,
                start_time: Instant::now(),
            }),
        }
    }

    #[must_use]
    #[inline]
    pub fn uptime(&self) -> Duration {
        self.inner.start_time.elapsed()
    }

    /// All-time summary across every chat
    #[must_use]
    pub fn global_summary(&self) -> GlobalSummary {
        let store = &self.inner.store;
        GlobalSummary::compose(
            self.uptime(),
            store.request_totals(),
            store.chat_count(),
            &store.performance_totals(),
        )
    }

    /// Health from the failure rate over the last five minutes
    #[must_use]
    pub fn health_status(&self, now: Timestamp) -> HealthReport {
        HealthReport::evaluate(self.inner.store.window_totals(RECENT_WINDOW_MS, now), now)
    }

    #[must_use]
    pub fn platform_performance(&self) -> Vec<PlatformPerformance> {
        platform_breakdown(&self.inner.store.performance_totals())
    }

    #[must_use]
    pub fn chat(&self, chat: &ChatKey) -> ChatAggregate {
        self.inner.store.get(chat)
    }

    #[must_use]
    pub fn top_chats(&self, n: usize) -> Vec<ChatAggregate> {
        self.inner.store.top_n(n)
    }

    #[must_use]
    pub fn storage_info(&self) -> StorageInfo {
        self.inner.store.storage_info()
    }

    /// Full snapshot for backup
    #[must_use]
    pub fn export(&self, now: Timestamp) -> StoreSnapshot {
        self.inner.store.export(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{PerformanceSample, RequestEvent, StoreOptions};
    use crate::types::ChatType;

    fn aggregator() -> (MetricsAggregator, EventStore) {
        let store = EventStore::new(StoreOptions::default());
        (MetricsAggregator::new(store.clone()), store)
    }

    #[test]
    fn test_summary_composes_counts_and_performance() {
        let (metrics, store) = aggregator();
        store.record(RequestEvent::new("a", ChatType::Private, "tiktok", true, 1));
        store.record(RequestEvent::new("b", ChatType::Group, "youtube", false, 2));
        store.record_performance(PerformanceSample::success("a", "tiktok", 300, 2_048, 1));
        store.record_performance(PerformanceSample::failure("b", "youtube", 900, "timeout", 2));

        let summary = metrics.global_summary();
        assert_eq!(summary.total_requests, 2);
        assert_eq!(summary.failed_requests, 1);
        assert_eq!(summary.success_rate_percent, 50.0);
        assert_eq!(summary.chats, 2);
        assert_eq!(summary.by_chat_type[&ChatType::Group], 1);
        assert_eq!(summary.average_latency_ms, 300.0);
        assert_eq!(summary.average_file_size_bytes, 2_048.0);
    }

    #[test]
    fn test_health_uses_recent_window_only() {
        let (metrics, store) = aggregator();
        let now = 10 * RECENT_WINDOW_MS;
        for i in 0..5 {
            store.record(RequestEvent::new("a", ChatType::Private, "x", false, i));
        }
        store.record(RequestEvent::new("a", ChatType::Private, "x", true, now - 1));

        let report = metrics.health_status(now);
        assert_eq!(report.recent_requests, 1);
        assert!(report.status.is_healthy());
    }

    #[test]
    fn test_unknown_chat_is_zero_valued() {
        let (metrics, _) = aggregator();
        let agg = metrics.chat(&ChatKey::new("ghost"));
        assert_eq!(agg.total_requests, 0);
        assert!(metrics.top_chats(3).is_empty());
    }
}
