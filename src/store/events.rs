//! Immutable request events and performance samples
//!
//! Both logs are kept ordered by timestamp so that window boundaries can be
//! found by binary search and retention can drain from the front.

use crate::types::{ChatKey, ChatType, Platform, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A completed request, reported after the admission decision was acted on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEvent {
    pub timestamp: Timestamp,
    pub chat: ChatKey,
    pub chat_type: ChatType,
    pub platform: Platform,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_name: Option<String>,
}

impl RequestEvent {
    #[must_use]
    pub fn new(
        chat: impl Into<ChatKey>,
        chat_type: ChatType,
        platform: impl Into<Platform>,
        success: bool,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            timestamp,
            chat: chat.into(),
            chat_type,
            platform: platform.into(),
            success,
            chat_name: None,
        }
    }

    /// Attach a display name; blank names are dropped
    #[must_use]
    pub fn with_chat_name(mut self, name: Option<impl Into<String>>) -> Self {
        self.chat_name = name
            .map(Into::into)
            .filter(|n: &String| !n.trim().is_empty());
        self
    }
}

/// Latency and size measurement for one completed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub timestamp: Timestamp,
    pub chat: ChatKey,
    pub platform: Platform,
    pub latency_ms: u64,
    /// Only meaningful when `error` is `None`
    pub file_size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PerformanceSample {
    #[must_use]
    pub fn success(
        chat: impl Into<ChatKey>,
        platform: impl Into<Platform>,
        latency_ms: u64,
        file_size_bytes: u64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            timestamp,
            chat: chat.into(),
            platform: platform.into(),
            latency_ms,
            file_size_bytes,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(
        chat: impl Into<ChatKey>,
        platform: impl Into<Platform>,
        latency_ms: u64,
        error: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            timestamp,
            chat: chat.into(),
            platform: platform.into(),
            latency_ms,
            file_size_bytes: 0,
            error: Some(error.into()),
        }
    }

    #[must_use]
    #[inline]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Anything stored in a time-ordered log
pub(crate) trait Timed {
    fn timestamp(&self) -> Timestamp;
}

impl Timed for RequestEvent {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Timed for PerformanceSample {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Append keeping timestamp order; late arrivals go after equal timestamps
pub(crate) fn insert_ordered<T: Timed>(log: &mut VecDeque<T>, item: T) {
    match log.back() {
        Some(last) if last.timestamp() > item.timestamp() => {
            let ts = item.timestamp();
            let at = log.partition_point(|e| e.timestamp() <= ts);
            log.insert(at, item);
        }
        _ => log.push_back(item),
    }
}

/// Index of the first entry with `timestamp > cutoff`
#[inline]
pub(crate) fn first_after<T: Timed>(log: &VecDeque<T>, cutoff: Timestamp) -> usize {
    log.partition_point(|e| e.timestamp() <= cutoff)
}

/// Drop up to `limit` entries with `timestamp <= cutoff` from the front
pub(crate) fn drain_expired<T: Timed>(
    log: &mut VecDeque<T>,
    cutoff: Timestamp,
    limit: usize,
) -> usize {
    let expired = first_after(log, cutoff).min(limit);
    log.drain(..expired);
    expired
}

/// Evict the oldest half of an over-cap log, never touching entries newer
/// than `protect_after`
///
/// Returns the number of evicted entries. When nothing is old enough the log
/// is left over its cap.
pub(crate) fn evict_oldest_half<T: Timed>(
    log: &mut VecDeque<T>,
    cap: usize,
    protect_after: Timestamp,
) -> usize {
    if log.len() <= cap {
        return 0;
    }
    let evictable = first_after(log, protect_after);
    let evict = (log.len() / 2).min(evictable);
    log.drain(..evict);
    evict
}
