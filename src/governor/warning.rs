//! Usage warnings and their suppression window

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// When a chat was last warned about approaching its limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningState {
    pub issued_at: Timestamp,
}

impl WarningState {
    /// Older than the staleness bound and eligible for sweeping
    #[must_use]
    pub fn is_stale(&self, staleness_ms: u64, now: Timestamp) -> bool {
        now.saturating_sub(self.issued_at) >= staleness_ms
    }
}

/// Whether a warning should be attached to an admitted request
///
/// Requires the usage ratio to reach `threshold` and no warning issued for
/// the chat within the last `suppression_ms`.
#[must_use]
pub fn should_warn(
    state: Option<&WarningState>,
    ratio: f64,
    threshold: f64,
    suppression_ms: u64,
    now: Timestamp,
) -> bool {
    if ratio < threshold {
        return false;
    }
    state.is_none_or(|w| now.saturating_sub(w.issued_at) >= suppression_ms)
}
