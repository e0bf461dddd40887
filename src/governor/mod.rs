//! Rate governor
//!
//! Decides admission for each request attempt. Per-chat penalty and warning
//! state lives in a `DashMap`; `decide` holds the chat's entry for the whole
//! check so two concurrent requests for one chat cannot both see it clear.
//! Lock order is chat entry, then the event store, then the global window.

mod decision;
mod global_window;
mod penalty;
mod settings;
mod warning;

pub use decision::{
    Decision, DenyReason, UsageSnapshot, UsageWarning, UsageWindow, WindowUsage,
    boundary_retry_secs,
};
pub use penalty::{PenaltyReason, PenaltyState, PenaltyTable, is_active};
pub use settings::GovernorSettings;
pub use warning::{WarningState, should_warn};

use crate::config::Config;
use crate::constants::failure;
use crate::constants::global::RETRY_AFTER_SECS;
use crate::constants::window::{HOUR_MS, HOUR_SECS, MINUTE_MS, MINUTE_SECS};
use crate::store::EventStore;
use crate::types::{ChatKey, ChatType, Timestamp};
use dashmap::DashMap;
use global_window::GlobalWindow;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// Internal State
// ============================================================================

/// Governor-owned state for one chat
#[derive(Debug, Default, Clone)]
struct ChatState {
    penalty: Option<PenaltyState>,
    warning: Option<WarningState>,
    /// Admission times inside the rapid-fire window, oldest first
    admitted: VecDeque<Timestamp>,
}

impl ChatState {
    fn is_empty(&self) -> bool {
        self.penalty.is_none() && self.warning.is_none() && self.admitted.is_empty()
    }

    /// Drop admissions with `timestamp <= cutoff`
    fn prune_admitted(&mut self, cutoff: Timestamp) {
        while self.admitted.front().is_some_and(|&ts| ts <= cutoff) {
            self.admitted.pop_front();
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    decisions: AtomicU64,
    allowed: AtomicU64,
    denied_penalty: AtomicU64,
    denied_global: AtomicU64,
    denied_rate_limit: AtomicU64,
    denied_rapid_fire: AtomicU64,
    penalties_applied: AtomicU64,
    warnings_issued: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn denied(&self, reason: DenyReason) {
        Self::bump(match reason {
            DenyReason::Penalty => &self.denied_penalty,
            DenyReason::GlobalLimit => &self.denied_global,
            DenyReason::RateLimit => &self.denied_rate_limit,
            DenyReason::RapidFire => &self.denied_rapid_fire,
        });
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Point-in-time governor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GovernorStats {
    pub decisions: u64,
    pub allowed: u64,
    pub denied_penalty: u64,
    pub denied_global: u64,
    pub denied_rate_limit: u64,
    pub denied_rapid_fire: u64,
    pub penalties_applied: u64,
    pub warnings_issued: u64,
    pub active_penalties: usize,
    pub tracked_chats: usize,
    pub global_window_len: usize,
}

/// What one governor sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GovernorSweep {
    pub penalties_expired: usize,
    pub warnings_expired: usize,
    pub global_pruned: usize,
}

/// Admission decision engine
#[derive(Debug)]
pub struct RateGovernor {
    settings: GovernorSettings,
    store: EventStore,
    chats: DashMap<ChatKey, ChatState>,
    global: Mutex<GlobalWindow>,
    counters: Counters,
}

impl RateGovernor {
    #[must_use]
    pub fn new(config: &Config, store: EventStore) -> Self {
        Self::with_settings(GovernorSettings::from_config(config), store)
    }

    #[must_use]
    pub fn with_settings(settings: GovernorSettings, store: EventStore) -> Self {
        let global = Mutex::new(GlobalWindow::new(settings.global_capacity));
        Self {
            settings,
            store,
            chats: DashMap::new(),
            global,
            counters: Counters::default(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &GovernorSettings {
        &self.settings
    }

    /// Decide whether a request from `chat` may proceed at `now`
    ///
    /// Checks run in order: active penalty, global window, per-chat minute
    /// and hour limits, rapid-fire detection. Only an admission consumes
    /// global budget. Rapid-fire counts admissions whose outcome has not
    /// been recorded yet as well as recorded events.
    pub fn decide(&self, chat: &ChatKey, chat_type: ChatType, now: Timestamp) -> Decision {
        Counters::bump(&self.counters.decisions);

        if !self.settings.enabled {
            Counters::bump(&self.counters.allowed);
            return Decision::allow(UsageSnapshot::default(), None);
        }

        let limits = self.settings.limits.for_chat_type(chat_type);
        let mut entry = self.chats.entry(chat.clone()).or_default();

        if let Some(penalty) = &entry.penalty {
            if penalty.is_active(now) {
                let retry = penalty.remaining_ms(now);
                return self.deny(chat, DenyReason::Penalty, retry, UsageSnapshot::default());
            }
            debug!(chat = %chat, reason = %penalty.reason, "Penalty expired");
            entry.penalty = None;
        }

        let minute_used = self.store.count_in_window(chat, MINUTE_MS, now) as u64;
        let hour_used = self.store.count_in_window(chat, HOUR_MS, now) as u64;
        let usage = UsageSnapshot::new(minute_used, hour_used, limits);
        let rapid_window = self.settings.rapid_fire_window_ms;
        let recorded_burst = self.store.count_in_window(chat, rapid_window, now);

        let mut global = self.global.lock();
        if global.count(MINUTE_MS, now) >= self.settings.global_per_minute as usize
            || global.count(HOUR_MS, now) >= self.settings.global_per_hour as usize
        {
            drop(global);
            return self.deny(chat, DenyReason::GlobalLimit, RETRY_AFTER_SECS * 1000, usage);
        }

        if usage.minute.exhausted() {
            drop(global);
            let retry = boundary_retry_secs(now, MINUTE_SECS) * 1000;
            return self.deny(chat, DenyReason::RateLimit, retry, usage);
        }
        if usage.hour.exhausted() {
            drop(global);
            let retry = boundary_retry_secs(now, HOUR_SECS) * 1000;
            return self.deny(chat, DenyReason::RateLimit, retry, usage);
        }

        let threshold = self.settings.rapid_fire_threshold(chat_type);
        entry.prune_admitted(now.saturating_sub(rapid_window));
        let burst = recorded_burst.max(entry.admitted.len());
        if burst >= threshold as usize {
            drop(global);
            let duration = self.settings.penalties.rapid_fire();
            let state = PenaltyState::new(chat.clone(), PenaltyReason::RapidFire, now, duration);
            let retry = state.remaining_ms(now);
            entry.penalty = Some(state);
            Counters::bump(&self.counters.penalties_applied);
            warn!(
                chat = %chat,
                requests = burst,
                window_ms = rapid_window,
                penalty_secs = duration.as_secs(),
                "Rapid-fire detected, chat penalized"
            );
            return self.deny(chat, DenyReason::RapidFire, retry, usage);
        }

        global.push(now);
        drop(global);
        entry.admitted.push_back(now);

        let (window, ratio) = usage.peak();
        let warning = if should_warn(
            entry.warning.as_ref(),
            ratio,
            self.settings.warning_ratio,
            self.settings.warning_suppression_ms,
            now,
        ) {
            entry.warning = Some(WarningState { issued_at: now });
            Counters::bump(&self.counters.warnings_issued);
            debug!(chat = %chat, ratio, "Usage warning issued");
            Some(UsageWarning {
                window,
                ratio,
                issued_at: now,
            })
        } else {
            None
        };

        Counters::bump(&self.counters.allowed);
        Decision::allow(usage, warning)
    }

    fn deny(
        &self,
        chat: &ChatKey,
        reason: DenyReason,
        retry_after_ms: u64,
        usage: UsageSnapshot,
    ) -> Decision {
        self.counters.denied(reason);
        debug!(chat = %chat, reason = ?reason, retry_after_ms, "Request denied");
        Decision::deny(reason, retry_after_ms, usage)
    }

    /// React to a reported failure
    ///
    /// Counts the chat's failures over the trailing failure window in the
    /// event store, so the failed request should be recorded first. Arms
    /// (or re-arms) a penalty once the count reaches the smallest tier.
    pub fn on_failure(&self, chat: &ChatKey, now: Timestamp) -> Option<PenaltyState> {
        if !self.settings.enabled {
            return None;
        }

        let failures = self.store.recent_failures(chat, failure::WINDOW_MS, now);
        let failures = u32::try_from(failures).unwrap_or(u32::MAX);
        let duration = self.settings.penalties.for_failures(failures)?;

        let state = PenaltyState::new(
            chat.clone(),
            PenaltyReason::RepeatedFailures,
            now,
            duration,
        );
        self.chats.entry(chat.clone()).or_default().penalty = Some(state.clone());
        Counters::bump(&self.counters.penalties_applied);
        warn!(
            chat = %chat,
            failures,
            penalty_secs = duration.as_secs(),
            "Repeated failures, chat penalized"
        );
        Some(state)
    }

    /// Clear the chat's warning state once its suppression window is over
    ///
    /// A warning issued less than the suppression window ago is kept, so a
    /// run of successful requests near the limit is warned about only once.
    /// An active penalty is left alone.
    pub fn on_success(&self, chat: &ChatKey, now: Timestamp) {
        let suppression = self.settings.warning_suppression_ms;
        if let Some(mut state) = self.chats.get_mut(chat)
            && state.warning.is_some_and(|w| w.is_stale(suppression, now))
        {
            state.warning = None;
        }
    }

    /// Penalize a chat directly, replacing any current penalty
    pub fn penalize(
        &self,
        chat: &ChatKey,
        reason: PenaltyReason,
        duration: Duration,
        now: Timestamp,
    ) -> PenaltyState {
        let state = PenaltyState::new(chat.clone(), reason, now, duration);
        self.chats.entry(chat.clone()).or_default().penalty = Some(state.clone());
        Counters::bump(&self.counters.penalties_applied);
        info!(chat = %chat, reason = %reason, penalty_secs = duration.as_secs(), "Chat penalized");
        state
    }

    /// Lift a penalty; returns whether one was present
    pub fn clear_penalty(&self, chat: &ChatKey) -> bool {
        let cleared = self
            .chats
            .get_mut(chat)
            .and_then(|mut state| state.penalty.take())
            .is_some();
        if cleared {
            info!(chat = %chat, "Penalty cleared");
        }
        cleared
    }

    /// The chat's penalty if it is active at `now`
    #[must_use]
    pub fn penalty(&self, chat: &ChatKey, now: Timestamp) -> Option<PenaltyState> {
        self.chats
            .get(chat)
            .and_then(|state| state.penalty.clone())
            .filter(|p| p.is_active(now))
    }

    /// The chat's current warning state, if any
    #[must_use]
    pub fn warning(&self, chat: &ChatKey) -> Option<WarningState> {
        self.chats.get(chat).and_then(|state| state.warning)
    }

    /// Drop expired penalties, stale warnings and old global timestamps
    pub fn sweep(&self, now: Timestamp) -> GovernorSweep {
        let mut report = GovernorSweep::default();
        let staleness = self.settings.warning_staleness_ms;
        let rapid_cutoff = now.saturating_sub(self.settings.rapid_fire_window_ms);

        self.chats.retain(|_, state| {
            state.prune_admitted(rapid_cutoff);
            if state.penalty.as_ref().is_some_and(|p| !p.is_active(now)) {
                state.penalty = None;
                report.penalties_expired += 1;
            }
            if state.warning.is_some_and(|w| w.is_stale(staleness, now)) {
                state.warning = None;
                report.warnings_expired += 1;
            }
            !state.is_empty()
        });

        report.global_pruned = self.global.lock().prune(now.saturating_sub(HOUR_MS));

        if report.penalties_expired + report.warnings_expired > 0 {
            debug!(
                penalties = report.penalties_expired,
                warnings = report.warnings_expired,
                global = report.global_pruned,
                "Governor sweep finished"
            );
        }
        report
    }

    #[must_use]
    pub fn stats(&self, now: Timestamp) -> GovernorStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        let active_penalties = self
            .chats
            .iter()
            .filter(|entry| is_active(entry.penalty.as_ref(), now))
            .count();

        GovernorStats {
            decisions: load(&self.counters.decisions),
            allowed: load(&self.counters.allowed),
            denied_penalty: load(&self.counters.denied_penalty),
            denied_global: load(&self.counters.denied_global),
            denied_rate_limit: load(&self.counters.denied_rate_limit),
            denied_rapid_fire: load(&self.counters.denied_rapid_fire),
            penalties_applied: load(&self.counters.penalties_applied),
            warnings_issued: load(&self.counters.warnings_issued),
            active_penalties,
            tracked_chats: self.chats.len(),
            global_window_len: self.global.lock().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RequestEvent, StoreOptions};

    const T0: Timestamp = 1_700_000_000_000;

    fn governor_with(config: &Config) -> (RateGovernor, EventStore) {
        let store = EventStore::new(StoreOptions::default());
        (RateGovernor::new(config, store.clone()), store)
    }

    fn record(store: &EventStore, chat: &str, success: bool, ts: Timestamp) {
        store.record(RequestEvent::new(chat, ChatType::Private, "tiktok", success, ts));
    }

    #[test]
    fn test_disabled_always_allows() {
        let config = Config {
            enabled: false,
            ..Config::default()
        };
        let (governor, store) = governor_with(&config);
        let chat = ChatKey::new("a");
        for i in 0..50 {
            record(&store, "a", false, T0 + i);
        }
        assert!(governor.decide(&chat, ChatType::Private, T0 + 100).allowed);
        assert!(governor.on_failure(&chat, T0 + 100).is_none());
    }

    #[test]
    fn test_fresh_chat_allowed_without_warning() {
        let (governor, _) = governor_with(&Config::default());
        let decision = governor.decide(&ChatKey::new("a"), ChatType::Private, T0);
        assert!(decision.allowed);
        assert!(decision.warning.is_none());
        assert_eq!(decision.retry_after_ms, 0);
    }

    #[test]
    fn test_penalty_retry_is_time_remaining() {
        let (governor, _) = governor_with(&Config::default());
        let chat = ChatKey::new("a");
        governor.penalize(&chat, PenaltyReason::Manual, Duration::from_secs(10), T0);

        let decision = governor.decide(&chat, ChatType::Private, T0 + 4_000);
        assert_eq!(decision.reason, Some(DenyReason::Penalty));
        assert_eq!(decision.retry_after_ms, 6_000);
        assert!(governor.decide(&chat, ChatType::Private, T0 + 10_000).allowed);
    }

    #[test]
    fn test_clear_penalty() {
        let (governor, _) = governor_with(&Config::default());
        let chat = ChatKey::new("a");
        governor.penalize(&chat, PenaltyReason::Manual, Duration::from_secs(60), T0);
        assert!(governor.penalty(&chat, T0).is_some());
        assert!(governor.clear_penalty(&chat));
        assert!(!governor.clear_penalty(&chat));
        assert!(governor.decide(&chat, ChatType::Private, T0 + 1).allowed);
    }

    #[test]
    fn test_on_success_keeps_penalty() {
        let (governor, _) = governor_with(&Config::default());
        let chat = ChatKey::new("a");
        governor.penalize(&chat, PenaltyReason::Manual, Duration::from_secs(60), T0);
        governor.on_success(&chat, T0 + 1);
        assert!(governor.penalty(&chat, T0 + 1).is_some());
    }

    #[test]
    fn test_on_success_keeps_warning_inside_suppression() {
        let (governor, store) = governor_with(&Config::default());
        let chat = ChatKey::new("a");
        for i in 0..8 {
            record(&store, "a", true, T0 + i * 2_000);
        }
        let now = T0 + 16_000;
        assert!(governor.decide(&chat, ChatType::Private, now).warning.is_some());

        governor.on_success(&chat, now + 1);
        assert!(governor.warning(&chat).is_some());

        governor.on_success(&chat, now + 5 * MINUTE_MS);
        assert!(governor.warning(&chat).is_none());
    }

    #[test]
    fn test_pending_admissions_count_toward_rapid_fire() {
        let (governor, _) = governor_with(&Config::default());
        let chat = ChatKey::new("a");

        let decisions: Vec<Decision> = (0..8)
            .map(|i| governor.decide(&chat, ChatType::Private, T0 + i * 200))
            .collect();
        let allowed = decisions.iter().filter(|d| d.allowed).count();
        assert_eq!(allowed, 5);
        assert_eq!(decisions[5].reason, Some(DenyReason::RapidFire));
        assert_eq!(decisions[6].reason, Some(DenyReason::Penalty));
    }

    #[test]
    fn test_admissions_leave_rapid_fire_window() {
        let (governor, _) = governor_with(&Config::default());
        let chat = ChatKey::new("a");
        for i in 0..4 {
            assert!(governor.decide(&chat, ChatType::Private, T0 + i * 1_000).allowed);
        }
        // 10s after the first admission it no longer counts
        assert!(governor.decide(&chat, ChatType::Private, T0 + 10_000).allowed);
        assert!(governor.decide(&chat, ChatType::Private, T0 + 11_000).allowed);
    }

    #[test]
    fn test_sweep_drops_expired_state() {
        let (governor, _) = governor_with(&Config::default());
        let chat = ChatKey::new("a");
        governor.penalize(&chat, PenaltyReason::Manual, Duration::from_secs(1), T0);
        governor.decide(&ChatKey::new("b"), ChatType::Private, T0);

        let report = governor.sweep(T0 + HOUR_MS + 1);
        assert_eq!(report.penalties_expired, 1);
        assert_eq!(report.global_pruned, 1);
        assert_eq!(governor.stats(T0 + HOUR_MS + 1).tracked_chats, 0);
    }

    #[test]
    fn test_stats_count_outcomes() {
        let (governor, _) = governor_with(&Config::default());
        let chat = ChatKey::new("a");
        governor.decide(&chat, ChatType::Private, T0);
        governor.penalize(&chat, PenaltyReason::Manual, Duration::from_secs(60), T0);
        governor.decide(&chat, ChatType::Private, T0 + 1);

        let stats = governor.stats(T0 + 2);
        assert_eq!(stats.decisions, 2);
        assert_eq!(stats.allowed, 1);
        assert_eq!(stats.denied_penalty, 1);
        assert_eq!(stats.active_penalties, 1);
        assert_eq!(stats.global_window_len, 1);
    }
}
