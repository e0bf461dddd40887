//! Configuration module
//!
//! This module handles all configuration types and loading
//! for the request governor.

mod defaults;
mod loading;
mod types;
mod validation;

// Re-export public types
pub use loading::{
    ConfigSource, ENV_DATA_DIR, ENV_ENABLED, ENV_GLOBAL_PER_HOUR, ENV_GLOBAL_PER_MINUTE,
    apply_env_overrides, create_default_config, load_config, load_config_with_fallback,
    parse_config,
};
pub use types::{
    ChatLimits, Config, FailureTier, GlobalLimits, LimitSet, MaintenanceConfig, PenaltyConfig,
    RapidFireConfig, RetentionConfig, StorageConfig, WarningConfig,
};

// Re-export default functions for use in tests and other modules
pub use defaults::{
    failure_tiers, group_limits, maintenance_interval, private_limits, supergroup_limits,
    sweep_chunk,
};
