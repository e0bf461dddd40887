//! Constants used throughout the request governor
//!
//! This module centralizes window sizes, thresholds and file names
//! that are fixed by the governance model rather than configured.

use std::time::Duration;

/// Window sizes for per-chat and global accounting
pub mod window {
    /// One minute in milliseconds
    pub const MINUTE_MS: u64 = 60_000;

    /// One hour in milliseconds
    pub const HOUR_MS: u64 = 60 * MINUTE_MS;

    /// Horizon of the per-chat window index and of eviction protection
    ///
    /// No governor window is longer than this, so events newer than
    /// `now - TRACKED_MS` must never be evicted from memory.
    pub const TRACKED_MS: u64 = HOUR_MS;

    /// Minute window in whole seconds (retry hint arithmetic)
    pub const MINUTE_SECS: u64 = MINUTE_MS / 1000;

    /// Hour window in whole seconds (retry hint arithmetic)
    pub const HOUR_SECS: u64 = HOUR_MS / 1000;

    const _TRACKED_COVERS_HOUR: () = assert!(TRACKED_MS >= HOUR_MS);
}

/// Failure-driven penalty constants
pub mod failure {
    /// Trailing window over which failures are counted
    pub const WINDOW_MS: u64 = 10 * super::window::MINUTE_MS;
}

/// Global throughput limiting constants
pub mod global {
    /// Fixed retry hint returned with a global-limit denial
    pub const RETRY_AFTER_SECS: u64 = 60;
}

/// Health evaluation constants
pub mod health {
    /// Trailing window for the recent failure rate
    pub const RECENT_WINDOW_MS: u64 = 5 * super::window::MINUTE_MS;

    /// Failure percentage above which the service is reported unhealthy
    pub const UNHEALTHY_FAILURE_PERCENT: f64 = 50.0;
}

/// Persisted state layout
pub mod storage {
    use super::Duration;

    /// Request events collection
    pub const EVENTS_FILE: &str = "events.json";

    /// Performance samples and totals collection
    pub const PERFORMANCE_FILE: &str = "performance.json";

    /// Chat aggregates collection
    pub const CHATS_FILE: &str = "chats.json";

    /// Suffix for the temporary file written before an atomic rename
    pub const TMP_SUFFIX: &str = "tmp";

    /// Upper bound for a shutdown persist when none is configured
    pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Placeholder identifiers
pub mod chat {
    /// Chat key used when the caller supplies a blank identifier
    ///
    /// The `<unknown>` form sorts before real keys and cannot collide
    /// with numeric chat ids.
    pub const UNKNOWN_CHAT: &str = "<unknown>";

    /// Platform tag used when the caller supplies a blank platform
    pub const UNKNOWN_PLATFORM: &str = "unknown";
}

/// Logging output
pub mod logging {
    /// Log file name inside the log directory
    pub const FILE_PREFIX: &str = "governor.log";
}
