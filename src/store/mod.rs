//! Event store
//!
//! Time-ordered request events and performance samples, together with the
//! per-chat aggregate index they feed. A single `RwLock` guards the logs and
//! the index so that an append and its aggregate update are one atomic unit;
//! readers share the lock and never observe a half-applied event.

mod aggregate;
mod events;
mod index;
mod persistence;
mod retention;
mod window;

pub use aggregate::{ChatAggregate, PerformanceCounters, PerformanceTotals};
pub use events::{PerformanceSample, RequestEvent};
pub use index::RequestTotals;
pub use persistence::{
    LastPersist, LoadReport, PersistedChats, PersistedPerformance, RebuildReport, StoreSnapshot,
};
pub use retention::{RetentionPolicy, SweepReport};

use crate::config::Config;
use crate::constants::window::TRACKED_MS;
use crate::types::{ChatKey, Timestamp};
use events::{Timed, drain_expired, evict_oldest_half, first_after, insert_ordered};
use index::ChatIndex;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use window::WindowIndex;

/// In-memory caps and persistence location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Soft cap on the in-memory event log
    pub max_events: usize,
    /// Soft cap on the in-memory performance log
    pub max_samples: usize,
    /// Directory for persisted collections; `None` disables persistence
    pub data_dir: Option<PathBuf>,
}

impl StoreOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_events: config.retention.max_events,
            max_samples: config.retention.max_samples,
            data_dir: config.storage.data_dir.clone(),
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Default)]
struct StoreState {
    events: VecDeque<RequestEvent>,
    samples: VecDeque<PerformanceSample>,
    chats: ChatIndex,
    windows: WindowIndex,
    requests: RequestTotals,
    performance: PerformanceTotals,
    evicted_events: u64,
    evicted_samples: u64,
}

impl StoreState {
    /// Events for `chat` newer than `now - window_ms`, from the per-chat
    /// queue when it covers the window and from the full log otherwise
    fn window<'a>(
        &'a self,
        chat: &'a ChatKey,
        window_ms: u64,
        now: Timestamp,
    ) -> Box<dyn Iterator<Item = &'a RequestEvent> + 'a> {
        let cutoff = now.saturating_sub(window_ms);
        if window_ms <= TRACKED_MS && self.windows.covers(chat, cutoff) {
            Box::new(self.windows.recent(chat, window_ms, now))
        } else {
            Box::new(
                self.events
                    .range(first_after(&self.events, cutoff)..)
                    .filter(move |e| &e.chat == chat),
            )
        }
    }
}

struct StoreInner {
    state: RwLock<StoreState>,
    options: StoreOptions,
    last_persist: Mutex<Option<LastPersist>>,
}

/// Shared handle to the event store
///
/// Cloning is cheap; every clone sees the same state.
#[derive(Clone)]
pub struct EventStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("EventStore")
            .field("events", &state.events.len())
            .field("samples", &state.samples.len())
            .field("chats", &state.chats.len())
            .finish()
    }
}

/// Request and failure counts over a trailing window, across all chats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowTotals {
    pub total: u64,
    pub failed: u64,
}

/// Sizes and caps of the in-memory collections
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageInfo {
    pub events: usize,
    pub samples: usize,
    pub chats: usize,
    pub max_events: usize,
    pub max_samples: usize,
    pub evicted_events: u64,
    pub evicted_samples: u64,
    pub oldest_event: Option<Timestamp>,
    pub newest_event: Option<Timestamp>,
    pub data_dir: Option<PathBuf>,
    pub last_persist: Option<LastPersist>,
}

impl EventStore {
    #[must_use]
    pub fn new(options: StoreOptions) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState::default()),
                options,
                last_persist: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.inner.options
    }

    /// Append an event and fold it into its chat aggregate
    ///
    /// When the log exceeds its soft cap the oldest half is evicted, except
    /// for anything inside the last tracked hour. Aggregates are all-time
    /// counts and are never rolled back by eviction.
    pub fn record(&self, event: RequestEvent) {
        let mut state = self.inner.state.write();
        state.chats.apply(&event);
        state.requests.apply(&event);
        state.windows.push(&event);
        insert_ordered(&mut state.events, event);

        if state.events.len() > self.inner.options.max_events {
            let protect_after = newest(&state.events).saturating_sub(TRACKED_MS);
            let cap = self.inner.options.max_events;
            let evicted = evict_oldest_half(&mut state.events, cap, protect_after);
            state.evicted_events += evicted as u64;
            if evicted == 0 {
                debug!(
                    len = state.events.len(),
                    cap, "Event log over cap but every entry is inside the tracked hour"
                );
            } else {
                debug!(evicted, remaining = state.events.len(), "Evicted oldest events");
            }
        }
    }

    /// Append a performance sample, with the same eviction policy as events
    pub fn record_performance(&self, sample: PerformanceSample) {
        let mut state = self.inner.state.write();
        state.performance.apply(&sample);
        insert_ordered(&mut state.samples, sample);

        if state.samples.len() > self.inner.options.max_samples {
            let protect_after = newest(&state.samples).saturating_sub(TRACKED_MS);
            let cap = self.inner.options.max_samples;
            let evicted = evict_oldest_half(&mut state.samples, cap, protect_after);
            state.evicted_samples += evicted as u64;
            if evicted > 0 {
                debug!(evicted, remaining = state.samples.len(), "Evicted oldest samples");
            }
        }
    }

    /// Number of events for `chat` with `timestamp > now - window_ms`
    #[must_use]
    pub fn count_in_window(&self, chat: &ChatKey, window_ms: u64, now: Timestamp) -> usize {
        self.inner.state.read().window(chat, window_ms, now).count()
    }

    /// Number of failed events for `chat` with `timestamp > now - window_ms`
    #[must_use]
    pub fn recent_failures(&self, chat: &ChatKey, window_ms: u64, now: Timestamp) -> usize {
        self.inner
            .state
            .read()
            .window(chat, window_ms, now)
            .filter(|e| !e.success)
            .count()
    }

    /// Events for `chat` with `timestamp > now - window_ms`, oldest first
    #[must_use]
    pub fn recent_requests(
        &self,
        chat: &ChatKey,
        window_ms: u64,
        now: Timestamp,
    ) -> Vec<RequestEvent> {
        self.inner
            .state
            .read()
            .window(chat, window_ms, now)
            .cloned()
            .collect()
    }

    /// Totals across all chats with `timestamp > now - window_ms`
    #[must_use]
    pub fn window_totals(&self, window_ms: u64, now: Timestamp) -> WindowTotals {
        let state = self.inner.state.read();
        let cutoff = now.saturating_sub(window_ms);
        state
            .events
            .range(first_after(&state.events, cutoff)..)
            .fold(WindowTotals::default(), |mut totals, e| {
                totals.total += 1;
                if !e.success {
                    totals.failed += 1;
                }
                totals
            })
    }

    /// Aggregate for a chat; zero-valued for chats never seen
    #[must_use]
    pub fn get(&self, chat: &ChatKey) -> ChatAggregate {
        self.inner.state.read().chats.get(chat)
    }

    #[must_use]
    pub fn contains(&self, chat: &ChatKey) -> bool {
        self.inner.state.read().chats.contains(chat)
    }

    /// The `n` most active chats, busiest first, ties by chat key
    #[must_use]
    pub fn top_n(&self, n: usize) -> Vec<ChatAggregate> {
        self.inner.state.read().chats.top_n(n)
    }

    /// Every chat aggregate, ordered by chat key
    #[must_use]
    pub fn chats(&self) -> Vec<ChatAggregate> {
        self.inner.state.read().chats.sorted()
    }

    #[must_use]
    pub fn chat_count(&self) -> usize {
        self.inner.state.read().chats.len()
    }

    /// All-time request totals; chat retention does not lower them
    #[must_use]
    pub fn request_totals(&self) -> RequestTotals {
        self.inner.state.read().requests.clone()
    }

    #[must_use]
    pub fn performance_totals(&self) -> PerformanceTotals {
        self.inner.state.read().performance.clone()
    }

    /// Apply a retention policy
    ///
    /// Each data class is swept in slices of at most `chunk` entries, taking
    /// the write lock once per slice so the hot path is only ever blocked for
    /// a bounded amount of work. Per-chat window queues are trimmed to the
    /// tracked hour on every sweep, even when events are kept forever.
    pub fn sweep(&self, policy: &RetentionPolicy, now: Timestamp, chunk: usize) -> SweepReport {
        let chunk = chunk.max(1);
        let mut report = SweepReport::default();

        let events_cutoff = policy.events_cutoff(now);
        if let Some(cutoff) = events_cutoff {
            loop {
                let mut state = self.inner.state.write();
                report.batches += 1;
                let removed = drain_expired(&mut state.events, cutoff, chunk);
                report.events_removed += removed;
                if removed < chunk {
                    break;
                }
            }
        }

        let window_cutoff = events_cutoff
            .unwrap_or(0)
            .max(now.saturating_sub(TRACKED_MS));
        let queues = {
            let mut state = self.inner.state.write();
            state.windows.mark_pruned(window_cutoff);
            state.windows.keys()
        };
        for batch in queues.chunks(chunk) {
            let mut state = self.inner.state.write();
            report.batches += 1;
            let before = state.windows.len();
            for chat in batch {
                state.windows.prune_chat(chat, window_cutoff);
            }
            report.window_queues_dropped += before - state.windows.len();
        }

        if let Some(cutoff) = policy.performance_cutoff(now) {
            loop {
                let mut state = self.inner.state.write();
                report.batches += 1;
                let removed = drain_expired(&mut state.samples, cutoff, chunk);
                report.samples_removed += removed;
                if removed < chunk {
                    break;
                }
            }
        }

        if let Some(cutoff) = policy.chats_cutoff(now) {
            let chats = self.inner.state.read().chats.keys();
            for batch in chats.chunks(chunk) {
                let mut state = self.inner.state.write();
                report.batches += 1;
                report.chats_removed += batch
                    .iter()
                    .filter(|chat| state.chats.remove_if_stale(chat, cutoff))
                    .count();
            }
        }

        if !report.is_empty() {
            debug!(
                events = report.events_removed,
                samples = report.samples_removed,
                chats = report.chats_removed,
                batches = report.batches,
                "Retention sweep finished"
            );
        }
        if report.window_queues_dropped > 0 {
            debug!(
                queues = report.window_queues_dropped,
                "Dropped idle window queues"
            );
        }
        report
    }

    #[must_use]
    pub fn storage_info(&self) -> StorageInfo {
        let last_persist = self.inner.last_persist.lock().clone();
        let state = self.inner.state.read();
        StorageInfo {
            events: state.events.len(),
            samples: state.samples.len(),
            chats: state.chats.len(),
            max_events: self.inner.options.max_events,
            max_samples: self.inner.options.max_samples,
            evicted_events: state.evicted_events,
            evicted_samples: state.evicted_samples,
            oldest_event: state.events.front().map(|e| e.timestamp),
            newest_event: state.events.back().map(|e| e.timestamp),
            data_dir: self.inner.options.data_dir.clone(),
            last_persist,
        }
    }
}

fn newest<T: Timed>(log: &VecDeque<T>) -> Timestamp {
    log.back().map_or(0, Timed::timestamp)
}
