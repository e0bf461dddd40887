//! Core types shared by the store, the governor and the metrics layer
//!
//! Identifiers for chats and platforms, the millisecond clock used for all
//! window arithmetic, and serde helpers for configuration durations.

pub mod chat;
pub mod clock;
pub mod duration;

pub use chat::{ChatKey, ChatType, ParseChatTypeError, Platform};
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use duration::{days_serde, duration_serde};

/// Number of milliseconds in a [`std::time::Duration`], saturating at `u64::MAX`
#[must_use]
#[inline]
pub fn duration_ms(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
