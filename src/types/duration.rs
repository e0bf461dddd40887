//! Duration serialization helpers for configuration files

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Helper for deserializing Duration from seconds
///
/// TOML configs specify intervals and penalty lengths in whole seconds.
pub mod duration_serde {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Helper for deserializing retention periods from whole days
///
/// `0` means "keep forever" and maps to [`Duration::ZERO`].
pub mod days_serde {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs() / SECS_PER_DAY)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let days = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(days.saturating_mul(SECS_PER_DAY)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "duration_serde")]
        interval: Duration,
        #[serde(with = "days_serde")]
        retention: Duration,
    }

    #[test]
    fn test_duration_from_seconds() {
        let w: Wrapper = toml::from_str("interval = 60\nretention = 0").unwrap();
        assert_eq!(w.interval, Duration::from_secs(60));
        assert_eq!(w.retention, Duration::ZERO);
    }

    #[test]
    fn test_retention_from_days() {
        let w: Wrapper = toml::from_str("interval = 1\nretention = 7").unwrap();
        assert_eq!(w.retention, Duration::from_secs(7 * SECS_PER_DAY));
    }

    #[test]
    fn test_serialize_back_to_units() {
        let w = Wrapper {
            interval: Duration::from_secs(300),
            retention: Duration::from_secs(30 * SECS_PER_DAY),
        };
        let s = toml::to_string(&w).unwrap();
        assert!(s.contains("interval = 300"));
        assert!(s.contains("retention = 30"));
    }
}
