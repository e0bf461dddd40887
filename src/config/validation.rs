//! Configuration validation
//!
//! Runs once at startup so that no limit is ever checked for sanity on the
//! decision path.

use std::collections::HashSet;

use super::types::{Config, LimitSet};
use crate::error::ConfigError;
use crate::types::ChatType;

impl Config {
    /// Validate configuration for correctness
    ///
    /// Hard errors:
    /// - zero or inverted per-chat / global limits
    /// - a global window too small to hold the global hourly cap
    /// - empty, zero or duplicate failure tiers; zero penalty durations
    /// - failure tiers whose penalty shrinks as the threshold grows
    /// - zero rapid-fire count or window
    /// - warning ratio outside (0, 1]
    /// - zero capacities, caps, intervals or chunk sizes
    pub fn validate(&self) -> Result<(), ConfigError> {
        for chat_type in ChatType::ALL {
            validate_limit_set(
                chat_type.as_str(),
                self.limits.for_chat_type(chat_type),
            )?;
        }

        validate_limit_set(
            "global",
            &LimitSet {
                per_minute: self.global.per_minute,
                per_hour: self.global.per_hour,
                burst: None,
            },
        )?;

        if self.global.window_capacity == 0 {
            return Err(ConfigError::ZeroWindowCapacity);
        }
        if self.global.window_capacity < self.global.per_hour as usize {
            return Err(ConfigError::WindowBelowHourlyCap {
                capacity: self.global.window_capacity,
                per_hour: self.global.per_hour,
            });
        }

        self.validate_penalties()?;

        if self.rapid_fire.count == 0 {
            return Err(ConfigError::ZeroRapidFireCount);
        }
        if self.rapid_fire.window.is_zero() {
            return Err(ConfigError::ZeroRapidFireWindow);
        }

        let ratio = self.warnings.ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::InvalidWarningRatio(ratio));
        }

        if self.retention.max_events == 0 {
            return Err(ConfigError::ZeroStoreCap {
                collection: "events",
            });
        }
        if self.retention.max_samples == 0 {
            return Err(ConfigError::ZeroStoreCap {
                collection: "performance samples",
            });
        }

        if self.maintenance.interval.is_zero() {
            return Err(ConfigError::ZeroMaintenanceInterval);
        }
        if self.maintenance.sweep_chunk == 0 {
            return Err(ConfigError::ZeroSweepChunk);
        }

        Ok(())
    }

    fn validate_penalties(&self) -> Result<(), ConfigError> {
        if self.penalties.rapid_fire.is_zero() {
            return Err(ConfigError::ZeroPenaltyDuration {
                trigger: "rapid-fire".to_string(),
            });
        }

        let tiers = &self.penalties.failure_tiers;
        if tiers.is_empty() {
            return Err(ConfigError::EmptyPenaltyTable);
        }

        let mut seen = HashSet::with_capacity(tiers.len());
        for tier in tiers {
            if tier.failures == 0 {
                return Err(ConfigError::ZeroFailureThreshold);
            }
            if !seen.insert(tier.failures) {
                return Err(ConfigError::DuplicateFailureTier {
                    failures: tier.failures,
                });
            }
            if tier.duration.is_zero() {
                return Err(ConfigError::ZeroPenaltyDuration {
                    trigger: format!("{} failures", tier.failures),
                });
            }
        }

        let mut sorted: Vec<_> = tiers.iter().collect();
        sorted.sort_by_key(|tier| tier.failures);
        for pair in sorted.windows(2) {
            if pair[1].duration < pair[0].duration {
                return Err(ConfigError::PenaltyTierShrinks {
                    failures: pair[1].failures,
                    lower: pair[0].failures,
                });
            }
        }

        Ok(())
    }
}

/// Validate a single limit set
fn validate_limit_set(scope: &'static str, limits: &LimitSet) -> Result<(), ConfigError> {
    if limits.per_minute == 0 {
        return Err(ConfigError::ZeroLimit {
            scope,
            window: "minute",
        });
    }
    if limits.per_hour == 0 {
        return Err(ConfigError::ZeroLimit {
            scope,
            window: "hour",
        });
    }
    if limits.per_hour < limits.per_minute {
        return Err(ConfigError::HourBelowMinute {
            scope,
            per_minute: limits.per_minute,
            per_hour: limits.per_hour,
        });
    }
    if limits.burst == Some(0) {
        return Err(ConfigError::ZeroBurst { scope });
    }
    Ok(())
}
