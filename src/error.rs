//! Error types for configuration and storage
//!
//! Decisions never fail, so there is no decision error type. Configuration
//! errors are raised once at startup; storage errors are logged by callers and
//! never reach the request path.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration, detected at startup
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{scope} limit per {window} must be greater than 0")]
    ZeroLimit {
        scope: &'static str,
        window: &'static str,
    },

    #[error("{scope} per-hour limit ({per_hour}) is lower than its per-minute limit ({per_minute})")]
    HourBelowMinute {
        scope: &'static str,
        per_minute: u32,
        per_hour: u32,
    },

    #[error("{scope} burst allowance must be greater than 0 when set")]
    ZeroBurst { scope: &'static str },

    #[error("penalty table must contain at least one failure tier")]
    EmptyPenaltyTable,

    #[error("failure tier threshold must be greater than 0")]
    ZeroFailureThreshold,

    #[error("failure tier {failures} is listed more than once")]
    DuplicateFailureTier { failures: u32 },

    #[error("failure tier {failures} has a shorter penalty than failure tier {lower}")]
    PenaltyTierShrinks { failures: u32, lower: u32 },

    #[error("penalty duration for {trigger} must be greater than 0")]
    ZeroPenaltyDuration { trigger: String },

    #[error("rapid-fire count must be greater than 0")]
    ZeroRapidFireCount,

    #[error("rapid-fire window must be greater than 0")]
    ZeroRapidFireWindow,

    #[error("warning ratio must be within (0, 1], got {0}")]
    InvalidWarningRatio(f64),

    #[error("global window capacity must be greater than 0")]
    ZeroWindowCapacity,

    #[error("global window capacity ({capacity}) is below the global hourly cap ({per_hour})")]
    WindowBelowHourlyCap { capacity: usize, per_hour: u32 },

    #[error("{collection} in-memory cap must be greater than 0")]
    ZeroStoreCap { collection: &'static str },

    #[error("maintenance interval must be greater than 0")]
    ZeroMaintenanceInterval,

    #[error("sweep chunk size must be greater than 0")]
    ZeroSweepChunk,
}

/// Persistence failure; non-fatal, the in-memory state stays authoritative
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {collection}: {source}")]
    Serialize {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("persist did not finish within {0:?}")]
    Timeout(Duration),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::ZeroLimit {
            scope: "private",
            window: "minute",
        };
        assert_eq!(err.to_string(), "private limit per minute must be greater than 0");

        let err = ConfigError::HourBelowMinute {
            scope: "group",
            per_minute: 20,
            per_hour: 10,
        };
        assert!(err.to_string().contains("(10)"));
        assert!(err.to_string().contains("(20)"));
    }

    #[test]
    fn test_storage_error_source() {
        use std::error::Error as _;

        let err = StorageError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/x"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_timeout_message() {
        let err = StorageError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "persist did not finish within 5s");
    }
}
