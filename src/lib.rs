//! Request governor
//!
//! Admission control and usage accounting for a request-serving bot:
//!
//! - [`store::EventStore`] keeps time-ordered request events and performance
//!   samples with a per-chat aggregate index
//! - [`governor::RateGovernor`] decides whether a chat may make another
//!   request, using sliding windows, penalties and a global throughput cap
//! - [`metrics::MetricsAggregator`] reports summaries and health over the store
//! - [`service::Governance`] ties the three together behind one handle
//!
//! All window arithmetic is done on millisecond timestamps supplied by a
//! [`types::Clock`], so tests can drive time explicitly.

pub mod args;
pub mod config;
pub mod constants;
pub mod control;
pub mod error;
pub mod governor;
pub mod logging;
pub mod metrics;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod types;

pub use config::{
    Config, ConfigSource, apply_env_overrides, create_default_config, load_config,
    load_config_with_fallback, parse_config,
};
pub use error::{ConfigError, StorageError};
pub use governor::{Decision, DenyReason, PenaltyReason, PenaltyState, RateGovernor};
pub use logging::init_logging;
pub use metrics::{GlobalSummary, HealthReport, HealthStatus, MetricsAggregator};
pub use scheduler::{MaintenanceReport, MaintenanceScheduler, SchedulerHandle};
pub use service::{Governance, RequestOutcome};
pub use store::{ChatAggregate, EventStore, RequestEvent, StoreOptions};
pub use types::{ChatKey, ChatType, Clock, ManualClock, Platform, SystemClock, Timestamp};
