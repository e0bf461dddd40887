//! Governance handle
//!
//! Wires the event store, the rate governor and the metrics aggregator
//! together behind one cloneable handle, and supplies `now` from an injected
//! clock. This is the surface the message-handling and reporting layers use.

use crate::config::Config;
use crate::error::StorageError;
use crate::governor::{Decision, PenaltyState, RateGovernor};
use crate::metrics::{GlobalSummary, HealthReport, MetricsAggregator, PlatformPerformance};
use crate::store::{
    ChatAggregate, EventStore, LoadReport, PerformanceSample, RequestEvent, StorageInfo,
    StoreOptions, StoreSnapshot,
};
use crate::types::{ChatKey, ChatType, Clock, Platform, SystemClock, Timestamp};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Everything known about a finished request attempt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestOutcome {
    pub chat: ChatKey,
    #[serde(default)]
    pub chat_type: ChatType,
    pub platform: Platform,
    pub success: bool,
    #[serde(default)]
    pub chat_name: Option<String>,
    /// Present when the attempt was timed; produces a performance sample
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub file_size_bytes: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RequestOutcome {
    #[must_use]
    pub fn new(
        chat: impl Into<ChatKey>,
        chat_type: ChatType,
        platform: impl Into<Platform>,
        success: bool,
    ) -> Self {
        Self {
            chat: chat.into(),
            chat_type,
            platform: platform.into(),
            success,
            chat_name: None,
            latency_ms: None,
            file_size_bytes: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_timing(mut self, latency_ms: u64, file_size_bytes: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self.file_size_bytes = Some(file_size_bytes);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Shared handle to the governance core
#[derive(Debug, Clone)]
pub struct Governance {
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    store: EventStore,
    governor: Arc<RateGovernor>,
    metrics: MetricsAggregator,
}

impl Governance {
    /// Build from a validated configuration, using the system clock
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        let store = EventStore::new(StoreOptions::from_config(&config));
        let governor = Arc::new(RateGovernor::new(&config, store.clone()));
        let metrics = MetricsAggregator::new(store.clone());
        Self {
            config: Arc::new(config),
            clock,
            store,
            governor,
            metrics,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    #[inline]
    pub fn now(&self) -> Timestamp {
        self.clock.now_ms()
    }

    #[must_use]
    pub fn store(&self) -> &EventStore {
        &self.store
    }

    #[must_use]
    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }

    #[must_use]
    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    // ------------------------------------------------------------------------
    // Hot path
    // ------------------------------------------------------------------------

    pub fn decide(&self, chat: &ChatKey, chat_type: ChatType) -> Decision {
        self.governor.decide(chat, chat_type, self.now())
    }

    pub fn record(
        &self,
        chat: impl Into<ChatKey>,
        chat_type: ChatType,
        platform: impl Into<Platform>,
        success: bool,
        chat_name: Option<String>,
    ) {
        let event = RequestEvent::new(chat, chat_type, platform, success, self.now())
            .with_chat_name(chat_name);
        self.store.record(event);
    }

    pub fn record_performance(
        &self,
        chat: impl Into<ChatKey>,
        platform: impl Into<Platform>,
        latency_ms: u64,
        file_size_bytes: u64,
        error: Option<String>,
    ) {
        let now = self.now();
        let sample = match error {
            None => PerformanceSample::success(chat, platform, latency_ms, file_size_bytes, now),
            Some(error) => PerformanceSample::failure(chat, platform, latency_ms, error, now),
        };
        self.store.record_performance(sample);
    }

    pub fn on_failure(&self, chat: &ChatKey) -> Option<PenaltyState> {
        self.governor.on_failure(chat, self.now())
    }

    pub fn on_success(&self, chat: &ChatKey) {
        self.governor.on_success(chat, self.now());
    }

    /// Record an outcome and drive penalty state from it
    ///
    /// Returns the penalty armed by this failure, if any.
    pub fn report_outcome(&self, outcome: RequestOutcome) -> Option<PenaltyState> {
        let RequestOutcome {
            chat,
            chat_type,
            platform,
            success,
            chat_name,
            latency_ms,
            file_size_bytes,
            error,
        } = outcome;

        if let Some(latency_ms) = latency_ms {
            let error = match (success, error) {
                (true, _) => None,
                (false, Some(error)) => Some(error),
                (false, None) => Some("failed".to_string()),
            };
            self.record_performance(
                chat.clone(),
                platform.clone(),
                latency_ms,
                file_size_bytes.unwrap_or(0),
                error,
            );
        }
        self.record(chat.clone(), chat_type, platform, success, chat_name);

        if success {
            self.on_success(&chat);
            None
        } else {
            self.on_failure(&chat)
        }
    }

    // ------------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn global_summary(&self) -> GlobalSummary {
        self.metrics.global_summary()
    }

    #[must_use]
    pub fn health_status(&self) -> HealthReport {
        self.metrics.health_status(self.now())
    }

    #[must_use]
    pub fn chat(&self, chat: &ChatKey) -> ChatAggregate {
        self.metrics.chat(chat)
    }

    #[must_use]
    pub fn top_n(&self, n: usize) -> Vec<ChatAggregate> {
        self.metrics.top_chats(n)
    }

    #[must_use]
    pub fn platform_performance(&self) -> Vec<PlatformPerformance> {
        self.metrics.platform_performance()
    }

    #[must_use]
    pub fn storage_info(&self) -> StorageInfo {
        self.metrics.storage_info()
    }

    #[must_use]
    pub fn export(&self) -> StoreSnapshot {
        self.metrics.export(self.now())
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    pub async fn load(&self) -> LoadReport {
        self.store.load().await
    }

    pub async fn persist(&self) -> Result<(), StorageError> {
        self.store.persist(self.now()).await
    }

    /// Persist with an upper bound; a persist that runs out of time is
    /// logged and abandoned, not retried
    pub async fn persist_with_timeout(&self, limit: Duration) -> Result<(), StorageError> {
        match tokio::time::timeout(limit, self.persist()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "Persist timed out, abandoning");
                Err(StorageError::Timeout(limit))
            }
        }
    }

    /// Final persist on shutdown, bounded by the configured timeout
    pub async fn shutdown(&self) {
        let limit = self.config.storage.shutdown_timeout;
        match self.persist_with_timeout(limit).await {
            Ok(()) => debug!("Final persist complete"),
            Err(e) => warn!(error = %e, "Final persist failed"),
        }
    }
}
