//! Penalty state and the failure-count duration table

use crate::config::PenaltyConfig;
use crate::types::{ChatKey, Timestamp, duration_ms};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why a chat was penalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyReason {
    RapidFire,
    RepeatedFailures,
    /// Applied by an operator rather than by detection
    Manual,
}

impl PenaltyReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RapidFire => "rapid_fire",
            Self::RepeatedFailures => "repeated_failures",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for PenaltyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A temporary deny-all state for one chat
///
/// Active while `now < until`. A new penalty replaces the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyState {
    pub chat: ChatKey,
    pub reason: PenaltyReason,
    pub applied_at: Timestamp,
    pub until: Timestamp,
}

impl PenaltyState {
    #[must_use]
    pub fn new(chat: ChatKey, reason: PenaltyReason, now: Timestamp, duration: Duration) -> Self {
        Self {
            chat,
            reason,
            applied_at: now,
            until: now.saturating_add(duration_ms(duration)),
        }
    }

    #[must_use]
    #[inline]
    pub fn is_active(&self, now: Timestamp) -> bool {
        is_active(Some(self), now)
    }

    /// Milliseconds until the penalty lifts, 0 once expired
    #[must_use]
    pub fn remaining_ms(&self, now: Timestamp) -> u64 {
        self.until.saturating_sub(now)
    }
}

/// Whether a (possibly absent) penalty is in force at `now`
#[must_use]
#[inline]
pub fn is_active(state: Option<&PenaltyState>, now: Timestamp) -> bool {
    state.is_some_and(|p| now < p.until)
}

/// Penalty durations by trigger
///
/// Failure tiers are kept sorted by threshold. The smallest threshold arms a
/// penalty; the duration is the longest among the tiers whose threshold the
/// observed failure count has reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PenaltyTable {
    tiers: Vec<(u32, Duration)>,
    rapid_fire: Duration,
}

impl PenaltyTable {
    #[must_use]
    pub fn new(mut tiers: Vec<(u32, Duration)>, rapid_fire: Duration) -> Self {
        tiers.sort_by_key(|(failures, _)| *failures);
        tiers.dedup_by_key(|(failures, _)| *failures);
        Self { tiers, rapid_fire }
    }

    /// Failure count at which a penalty is armed
    #[must_use]
    pub fn threshold(&self) -> Option<u32> {
        self.tiers.first().map(|(failures, _)| *failures)
    }

    /// Duration for `failures` recent failures, `None` below the threshold
    #[must_use]
    pub fn for_failures(&self, failures: u32) -> Option<Duration> {
        self.tiers
            .iter()
            .take_while(|(threshold, _)| *threshold <= failures)
            .map(|(_, duration)| *duration)
            .max()
    }

    #[must_use]
    pub fn rapid_fire(&self) -> Duration {
        self.rapid_fire
    }
}

impl From<&PenaltyConfig> for PenaltyTable {
    fn from(config: &PenaltyConfig) -> Self {
        Self::new(
            config
                .failure_tiers
                .iter()
                .map(|tier| (tier.failures, tier.duration))
                .collect(),
            config.rapid_fire,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_table() -> PenaltyTable {
        PenaltyTable::from(&PenaltyConfig::default())
    }

    #[test]
    fn test_is_active_boundaries() {
        let state = PenaltyState::new(
            ChatKey::new("a"),
            PenaltyReason::RapidFire,
            1_000,
            Duration::from_secs(2),
        );
        assert_eq!(state.until, 3_000);
        assert!(state.is_active(1_000));
        assert!(state.is_active(2_999));
        assert!(!state.is_active(3_000));
        assert!(!is_active(None, 0));
    }

    #[test]
    fn test_remaining_ms() {
        let state = PenaltyState::new(
            ChatKey::new("a"),
            PenaltyReason::Manual,
            0,
            Duration::from_millis(500),
        );
        assert_eq!(state.remaining_ms(100), 400);
        assert_eq!(state.remaining_ms(900), 0);
    }

    #[test]
    fn test_default_tiers() {
        let table = default_table();
        assert_eq!(table.threshold(), Some(3));
        assert_eq!(table.for_failures(2), None);
        assert_eq!(table.for_failures(3), Some(Duration::from_secs(300)));
        assert_eq!(table.for_failures(4), Some(Duration::from_secs(300)));
        assert_eq!(table.for_failures(5), Some(Duration::from_secs(900)));
        assert_eq!(table.for_failures(10), Some(Duration::from_secs(3600)));
        assert_eq!(table.for_failures(250), Some(Duration::from_secs(3600)));
        assert_eq!(table.rapid_fire(), Duration::from_secs(120));
    }

    #[test]
    fn test_unsorted_tiers_are_sorted() {
        let table = PenaltyTable::new(
            vec![(5, Duration::from_secs(50)), (2, Duration::from_secs(20))],
            Duration::from_secs(1),
        );
        assert_eq!(table.threshold(), Some(2));
        assert_eq!(table.for_failures(4), Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_more_failures_never_shorten_the_penalty() {
        let table = PenaltyTable::new(
            vec![
                (3, Duration::from_secs(60 * 60)),
                (10, Duration::from_secs(5 * 60)),
            ],
            Duration::from_secs(1),
        );
        assert_eq!(table.for_failures(3), Some(Duration::from_secs(60 * 60)));
        assert_eq!(table.for_failures(12), Some(Duration::from_secs(60 * 60)));
    }

    #[test]
    fn test_reason_serializes_snake_case() {
        let json = serde_json::to_string(&PenaltyReason::RepeatedFailures).unwrap();
        assert_eq!(json, "\"repeated_failures\"");
    }
}
