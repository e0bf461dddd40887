//! Governor settings resolved from configuration

use super::penalty::PenaltyTable;
use crate::config::{ChatLimits, Config};
use crate::types::{ChatType, duration_ms};

/// Everything the governor reads on the hot path, in milliseconds
#[derive(Debug, Clone, PartialEq)]
pub struct GovernorSettings {
    pub enabled: bool,
    pub limits: ChatLimits,
    pub global_per_minute: u32,
    pub global_per_hour: u32,
    pub global_capacity: usize,
    pub penalties: PenaltyTable,
    pub rapid_fire_count: u32,
    pub rapid_fire_window_ms: u64,
    pub warning_ratio: f64,
    pub warning_suppression_ms: u64,
    pub warning_staleness_ms: u64,
}

impl GovernorSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.enabled,
            limits: config.limits,
            global_per_minute: config.global.per_minute,
            global_per_hour: config.global.per_hour,
            global_capacity: config.global.window_capacity,
            penalties: PenaltyTable::from(&config.penalties),
            rapid_fire_count: config.rapid_fire.count,
            rapid_fire_window_ms: duration_ms(config.rapid_fire.window),
            warning_ratio: config.warnings.ratio,
            warning_suppression_ms: duration_ms(config.warnings.suppression),
            warning_staleness_ms: duration_ms(config.warnings.staleness),
        }
    }

    /// Requests tolerated inside the rapid-fire window for a chat type
    #[must_use]
    pub fn rapid_fire_threshold(&self, chat_type: ChatType) -> u32 {
        self.limits
            .for_chat_type(chat_type)
            .burst
            .unwrap_or(self.rapid_fire_count)
    }
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
