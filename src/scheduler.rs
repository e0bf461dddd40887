//! Background maintenance
//!
//! One task on a fixed cadence: expire governor state, apply retention in
//! bounded slices, and persist the store every `persist_interval`. The
//! scheduler is injected with the governance handle and exposes
//! [`MaintenanceScheduler::run_once`] so tests can drive a cycle directly.

use crate::governor::GovernorSweep;
use crate::service::Governance;
use crate::store::{RetentionPolicy, SweepReport};
use crate::types::{Timestamp, duration_ms};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// What one maintenance cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub governor: GovernorSweep,
    pub retention: SweepReport,
    /// Whether a persist was due this cycle
    pub persist_due: bool,
}

#[derive(Debug)]
pub struct MaintenanceScheduler {
    governance: Governance,
    policy: RetentionPolicy,
    interval: Duration,
    sweep_chunk: usize,
    persist_interval_ms: u64,
    last_persist: Option<Timestamp>,
}

impl MaintenanceScheduler {
    #[must_use]
    pub fn new(governance: Governance) -> Self {
        let config = governance.config();
        let policy = RetentionPolicy::from(&config.retention);
        let interval = config.maintenance.interval;
        let sweep_chunk = config.maintenance.sweep_chunk;
        let persist_interval_ms = duration_ms(config.storage.persist_interval);
        Self {
            governance,
            policy,
            interval,
            sweep_chunk,
            persist_interval_ms,
            last_persist: None,
        }
    }

    /// Sweep governor state and apply retention at `now`
    ///
    /// Persisting is left to the caller; the report says whether one is due.
    pub fn run_once(&mut self, now: Timestamp) -> MaintenanceReport {
        let governor = self.governance.governor().sweep(now);
        let retention = self
            .governance
            .store()
            .sweep(&self.policy, now, self.sweep_chunk);

        let persist_due = self.governance.store().options().data_dir.is_some()
            && self
                .last_persist
                .is_none_or(|last| now.saturating_sub(last) >= self.persist_interval_ms);

        MaintenanceReport {
            governor,
            retention,
            persist_due,
        }
    }

    /// One full cycle including the persist when due
    pub async fn tick(&mut self) -> MaintenanceReport {
        let now = self.governance.now();
        let report = self.run_once(now);
        if report.persist_due {
            self.last_persist = Some(now);
            let limit = self.governance.config().storage.shutdown_timeout.max(self.interval);
            if let Err(e) = self.governance.persist_with_timeout(limit).await {
                warn!(error = %e, "Scheduled persist failed, retrying next cycle");
            }
        }
        report
    }

    /// Run on the configured cadence until shut down
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle { shutdown_tx, task }
    }

    async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            sweep_chunk = self.sweep_chunk,
            "Starting maintenance task"
        );

        // The first persist is one interval after startup, not immediate
        self.last_persist = Some(self.governance.now());

        loop {
            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = shutdown_rx.recv() => {
                    info!("Shutting down maintenance task");
                    break;
                }
            }

            let report = self.tick().await;
            debug!(
                penalties_expired = report.governor.penalties_expired,
                warnings_expired = report.governor.warnings_expired,
                events_removed = report.retention.events_removed,
                samples_removed = report.retention.samples_removed,
                chats_removed = report.retention.chats_removed,
                window_queues_dropped = report.retention.window_queues_dropped,
                persisted = report.persist_due,
                "Maintenance cycle complete"
            );
        }
    }
}

/// Handle to a running maintenance task
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the task to stop and wait for it
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Maintenance task ended abnormally");
        }
    }
}
