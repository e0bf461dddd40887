//! Configuration type definitions
//!
//! This module contains all the configuration structures for the governor,
//! the event store and the maintenance task.

use super::defaults;
use crate::types::{ChatType, days_serde, duration_serde};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main governor configuration
///
/// Every section is optional; missing fields fall back to [`defaults`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Master switch; when off every request is admitted
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
    /// Per-chat-type limits
    #[serde(default)]
    pub limits: ChatLimits,
    /// Global throughput limits across all chats
    #[serde(default)]
    pub global: GlobalLimits,
    /// Penalty durations
    #[serde(default)]
    pub penalties: PenaltyConfig,
    /// Rapid-fire detection thresholds
    #[serde(default)]
    pub rapid_fire: RapidFireConfig,
    /// Usage warning behaviour
    #[serde(default)]
    pub warnings: WarningConfig,
    /// Retention per data class
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Background maintenance cadence
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            limits: ChatLimits::default(),
            global: GlobalLimits::default(),
            penalties: PenaltyConfig::default(),
            rapid_fire: RapidFireConfig::default(),
            warnings: WarningConfig::default(),
            retention: RetentionConfig::default(),
            storage: StorageConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

/// Per-minute and per-hour caps for one chat type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimitSet {
    pub per_minute: u32,
    pub per_hour: u32,
    /// Requests tolerated inside the rapid-fire window before the chat is
    /// penalized; falls back to `rapid_fire.count` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst: Option<u32>,
}

/// Limits for each chat type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatLimits {
    #[serde(default = "defaults::private_limits")]
    pub private: LimitSet,
    #[serde(default = "defaults::group_limits")]
    pub group: LimitSet,
    #[serde(default = "defaults::supergroup_limits")]
    pub supergroup: LimitSet,
}

impl ChatLimits {
    /// Limit set selected by chat type
    #[must_use]
    #[inline]
    pub const fn for_chat_type(&self, chat_type: ChatType) -> &LimitSet {
        match chat_type {
            ChatType::Private => &self.private,
            ChatType::Group => &self.group,
            ChatType::Supergroup => &self.supergroup,
        }
    }
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            private: defaults::private_limits(),
            group: defaults::group_limits(),
            supergroup: defaults::supergroup_limits(),
        }
    }
}

/// Global caps shared by every chat
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlobalLimits {
    #[serde(default = "defaults::global_per_minute")]
    pub per_minute: u32,
    #[serde(default = "defaults::global_per_hour")]
    pub per_hour: u32,
    /// Maximum admitted timestamps kept for global counting
    #[serde(default = "defaults::global_window_capacity")]
    pub window_capacity: usize,
}

impl Default for GlobalLimits {
    fn default() -> Self {
        Self {
            per_minute: defaults::global_per_minute(),
            per_hour: defaults::global_per_hour(),
            window_capacity: defaults::global_window_capacity(),
        }
    }
}

/// Penalty duration for a number of recent failures
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureTier {
    pub failures: u32,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

/// Penalty durations by trigger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PenaltyConfig {
    #[serde(
        with = "duration_serde",
        default = "defaults::rapid_fire_penalty"
    )]
    pub rapid_fire: Duration,
    /// Failure tiers; the smallest threshold arms the first penalty
    #[serde(default = "defaults::failure_tiers")]
    pub failure_tiers: Vec<FailureTier>,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            rapid_fire: defaults::rapid_fire_penalty(),
            failure_tiers: defaults::failure_tiers(),
        }
    }
}

/// Rapid-fire detection: `count` requests within `window`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RapidFireConfig {
    #[serde(default = "defaults::rapid_fire_count")]
    pub count: u32,
    #[serde(with = "duration_serde", default = "defaults::rapid_fire_window")]
    pub window: Duration,
}

impl Default for RapidFireConfig {
    fn default() -> Self {
        Self {
            count: defaults::rapid_fire_count(),
            window: defaults::rapid_fire_window(),
        }
    }
}

/// Usage warnings issued when a chat approaches its limits
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WarningConfig {
    /// Usage ratio at which a warning is attached to an admission
    #[serde(default = "defaults::warning_ratio")]
    pub ratio: f64,
    /// Minimum time between two warnings for the same chat
    #[serde(
        with = "duration_serde",
        default = "defaults::warning_suppression"
    )]
    pub suppression: Duration,
    /// Age after which the maintenance sweep forgets a warning
    #[serde(with = "duration_serde", default = "defaults::warning_staleness")]
    pub staleness: Duration,
}

impl Default for WarningConfig {
    fn default() -> Self {
        Self {
            ratio: defaults::warning_ratio(),
            suppression: defaults::warning_suppression(),
            staleness: defaults::warning_staleness(),
        }
    }
}

/// Retention per data class, in days (0 = keep forever)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetentionConfig {
    #[serde(with = "days_serde", default = "defaults::event_retention")]
    pub events: Duration,
    #[serde(with = "days_serde", default = "defaults::performance_retention")]
    pub performance: Duration,
    /// Chat aggregates are dropped by `last_seen` staleness
    #[serde(with = "days_serde", default = "defaults::chat_retention")]
    pub chats: Duration,
    #[serde(default = "defaults::max_events")]
    pub max_events: usize,
    #[serde(default = "defaults::max_samples")]
    pub max_samples: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            events: defaults::event_retention(),
            performance: defaults::performance_retention(),
            chats: defaults::chat_retention(),
            max_events: defaults::max_events(),
            max_samples: defaults::max_samples(),
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory for the persisted collections; persistence is off when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(with = "duration_serde", default = "defaults::persist_interval")]
    pub persist_interval: Duration,
    /// Bound on the final persist during shutdown
    #[serde(with = "duration_serde", default = "defaults::shutdown_timeout")]
    pub shutdown_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            persist_interval: defaults::persist_interval(),
            shutdown_timeout: defaults::shutdown_timeout(),
        }
    }
}

/// Background maintenance cadence
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaintenanceConfig {
    #[serde(
        with = "duration_serde",
        default = "defaults::maintenance_interval"
    )]
    pub interval: Duration,
    #[serde(default = "defaults::sweep_chunk")]
    pub sweep_chunk: usize,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: defaults::maintenance_interval(),
            sweep_chunk: defaults::sweep_chunk(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.enabled);
        assert_eq!(config.limits.private.per_minute, 10);
        assert_eq!(config.limits.private.per_hour, 100);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[limits.group]
per_minute = 3
per_hour = 30
"#,
        )
        .unwrap();
        assert_eq!(config.limits.group.per_minute, 3);
        assert_eq!(config.limits.group.burst, None);
        assert_eq!(config.limits.private, defaults::private_limits());
    }

    #[test]
    fn test_failure_tiers_from_toml() {
        let config: Config = toml::from_str(
            r#"
[penalties]
rapid_fire = 30

[[penalties.failure_tiers]]
failures = 2
duration = 60
"#,
        )
        .unwrap();
        assert_eq!(config.penalties.rapid_fire, Duration::from_secs(30));
        assert_eq!(config.penalties.failure_tiers.len(), 1);
        assert_eq!(config.penalties.failure_tiers[0].failures, 2);
    }

    #[test]
    fn test_limits_for_chat_type() {
        let limits = ChatLimits::default();
        assert_eq!(limits.for_chat_type(ChatType::Private).per_minute, 10);
        assert_eq!(limits.for_chat_type(ChatType::Group).burst, Some(8));
        assert_eq!(limits.for_chat_type(ChatType::Supergroup).per_hour, 300);
    }

    #[test]
    fn test_retention_zero_means_forever() {
        let config: Config = toml::from_str("[retention]\nevents = 0").unwrap();
        assert_eq!(config.retention.events, Duration::ZERO);
        assert_eq!(config.retention.chats, defaults::chat_retention());
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
