//! Durable snapshots of the three store collections
//!
//! Each collection lives in its own JSON file and is written atomically:
//! the bytes go to `<file>.tmp`, are synced, and then renamed over the
//! target. State is cloned under the read lock and serialized after the
//! lock is released, so a persist never holds up the decision path.

use super::aggregate::{ChatAggregate, PerformanceTotals};
use super::events::{PerformanceSample, RequestEvent};
use super::index::{ChatIndex, RequestTotals};
use super::window::WindowIndex;
use super::EventStore;
use crate::constants::storage::{CHATS_FILE, EVENTS_FILE, PERFORMANCE_FILE, TMP_SUFFIX};
use crate::error::StorageError;
use crate::types::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

/// Performance collection: retained samples plus the all-time totals
///
/// Totals are persisted alongside the samples because retention and
/// eviction drop samples without rolling the totals back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedPerformance {
    #[serde(default)]
    pub samples: Vec<PerformanceSample>,
    #[serde(default)]
    pub totals: PerformanceTotals,
}

/// Chat collection: live aggregates plus the all-time request totals
///
/// Totals travel with the aggregates because chat retention drops stale
/// aggregates without rolling the totals back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedChats {
    #[serde(default)]
    pub chats: Vec<ChatAggregate>,
    #[serde(default)]
    pub totals: RequestTotals,
}

/// Full copy of the store, used for backups and for persisting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub exported_at: Timestamp,
    pub events: Vec<RequestEvent>,
    pub performance: PersistedPerformance,
    pub chats: PersistedChats,
}

/// Outcome of the most recent persist attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPersist {
    pub at: Timestamp,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What `load` restored; failed collections are left empty
#[derive(Debug, Default)]
pub struct LoadReport {
    pub events: usize,
    pub samples: usize,
    pub chats: usize,
    pub errors: Vec<StorageError>,
}

impl LoadReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// What a rebuild replayed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub events_replayed: usize,
    pub samples_replayed: usize,
    pub chats: usize,
}

impl EventStore {
    /// Full copy of the current state
    #[must_use]
    pub fn export(&self, now: Timestamp) -> StoreSnapshot {
        let state = self.inner.state.read();
        StoreSnapshot {
            exported_at: now,
            events: state.events.iter().cloned().collect(),
            performance: PersistedPerformance {
                samples: state.samples.iter().cloned().collect(),
                totals: state.performance.clone(),
            },
            chats: PersistedChats {
                chats: state.chats.sorted(),
                totals: state.requests.clone(),
            },
        }
    }

    /// Persist to the configured data directory
    ///
    /// Without a data directory this is a no-op.
    pub async fn persist(&self, now: Timestamp) -> Result<(), StorageError> {
        match self.inner.options.data_dir.clone() {
            Some(dir) => self.persist_to(&dir, now).await,
            None => {
                debug!("No data directory configured, skipping persist");
                Ok(())
            }
        }
    }

    /// Persist all three collections into `dir`
    ///
    /// Every collection is attempted even if an earlier one fails; the first
    /// error is returned.
    pub async fn persist_to(&self, dir: &Path, now: Timestamp) -> Result<(), StorageError> {
        let snapshot = self.export(now);

        let result = write_collections(dir, &snapshot).await;
        let record = LastPersist {
            at: now,
            ok: result.is_ok(),
            error: result.as_ref().err().map(ToString::to_string),
        };
        *self.inner.last_persist.lock() = Some(record);

        match &result {
            Ok(()) => debug!(
                dir = %dir.display(),
                events = snapshot.events.len(),
                samples = snapshot.performance.samples.len(),
                chats = snapshot.chats.chats.len(),
                "Persisted store"
            ),
            Err(e) => warn!(dir = %dir.display(), error = %e, "Persist failed"),
        }
        result
    }

    /// Load from the configured data directory
    pub async fn load(&self) -> LoadReport {
        match self.inner.options.data_dir.clone() {
            Some(dir) => self.load_from(&dir).await,
            None => LoadReport::default(),
        }
    }

    /// Replace the in-memory state with the collections found in `dir`
    ///
    /// A missing file is an empty collection. A file that cannot be read or
    /// parsed is logged, reported, and its collection left empty. Aggregates
    /// are taken as stored; call [`EventStore::rebuild`] to recompute them.
    /// A chat collection saved without request totals has them summed from
    /// its aggregates.
    pub async fn load_from(&self, dir: &Path) -> LoadReport {
        let mut report = LoadReport::default();

        let events: Vec<RequestEvent> =
            read_collection(&dir.join(EVENTS_FILE), &mut report.errors).await;
        let performance: PersistedPerformance =
            read_collection(&dir.join(PERFORMANCE_FILE), &mut report.errors).await;
        let chats: PersistedChats =
            read_collection(&dir.join(CHATS_FILE), &mut report.errors).await;

        report.events = events.len();
        report.samples = performance.samples.len();
        report.chats = chats.chats.len();

        let index = ChatIndex::from_aggregates(chats.chats);
        let requests = if chats.totals.is_empty() {
            index.totals()
        } else {
            chats.totals
        };

        let mut events = VecDeque::from(events);
        events.make_contiguous().sort_by_key(|e| e.timestamp);
        let mut samples = VecDeque::from(performance.samples);
        samples.make_contiguous().sort_by_key(|s| s.timestamp);

        {
            let mut state = self.inner.state.write();
            state.windows = WindowIndex::from_log(&events);
            state.events = events;
            state.samples = samples;
            state.performance = performance.totals;
            state.chats = index;
            state.requests = requests;
            state.evicted_events = 0;
            state.evicted_samples = 0;
        }

        if report.is_clean() {
            info!(
                dir = %dir.display(),
                events = report.events,
                samples = report.samples,
                chats = report.chats,
                "Loaded store"
            );
        } else {
            warn!(
                dir = %dir.display(),
                failed = report.errors.len(),
                "Loaded store with unreadable collections"
            );
        }
        report
    }

    /// Recompute aggregates, request totals and performance totals from the
    /// retained logs
    ///
    /// Activity that has already been pruned is not recoverable, so the
    /// rebuilt counts cover retained data only.
    pub fn rebuild(&self) -> RebuildReport {
        let mut guard = self.inner.state.write();
        let state = &mut *guard;

        let mut chats = ChatIndex::default();
        let mut requests = RequestTotals::default();
        for event in &state.events {
            chats.apply(event);
            requests.apply(event);
        }
        let mut performance = PerformanceTotals::default();
        for sample in &state.samples {
            performance.apply(sample);
        }

        state.windows = WindowIndex::from_log(&state.events);
        state.chats = chats;
        state.requests = requests;
        state.performance = performance;

        let report = RebuildReport {
            events_replayed: state.events.len(),
            samples_replayed: state.samples.len(),
            chats: state.chats.len(),
        };
        info!(
            events = report.events_replayed,
            samples = report.samples_replayed,
            chats = report.chats,
            "Rebuilt aggregates from retained data"
        );
        report
    }
}

async fn write_collections(dir: &Path, snapshot: &StoreSnapshot) -> Result<(), StorageError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StorageError::io(dir, e))?;

    let mut first_error = None;
    let collections = [
        (EVENTS_FILE, to_json("events", &snapshot.events)),
        (PERFORMANCE_FILE, to_json("performance", &snapshot.performance)),
        (CHATS_FILE, to_json("chats", &snapshot.chats)),
    ];
    for (file, bytes) in collections {
        let result = match bytes {
            Ok(bytes) => write_atomic(&dir.join(file), &bytes).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!(file, error = %e, "Failed to persist collection");
            first_error.get_or_insert(e);
        }
    }

    first_error.map_or(Ok(()), Err)
}

fn to_json<T: Serialize>(collection: &'static str, value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|source| StorageError::Serialize { collection, source })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".");
    tmp.push(TMP_SUFFIX);
    PathBuf::from(tmp)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = tmp_path(path);

    let write = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await
    };
    if let Err(e) = write.await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StorageError::io(&tmp, e));
    }

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StorageError::io(path, e));
    }
    Ok(())
}

/// Read one collection; missing files and failures both yield the default
async fn read_collection<T>(path: &Path, errors: &mut Vec<StorageError>) -> T
where
    T: DeserializeOwned + Default,
{
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No persisted collection");
            return T::default();
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read collection");
            errors.push(StorageError::io(path, e));
            return T::default();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(source) => {
            error!(path = %path.display(), error = %source, "Corrupt collection, starting empty");
            errors.push(StorageError::Deserialize {
                path: path.to_path_buf(),
                source,
            });
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RetentionPolicy, StoreOptions};
    use crate::types::{ChatKey, ChatType};
    use tempfile::TempDir;

    fn populated_store() -> EventStore {
        let store = EventStore::new(StoreOptions::default());
        store.record(RequestEvent::new("a", ChatType::Group, "tiktok", true, 1_000));
        store.record(RequestEvent::new("a", ChatType::Group, "tiktok", false, 2_000));
        store.record(RequestEvent::new("b", ChatType::Private, "youtube", true, 3_000));
        store.record_performance(PerformanceSample::success("a", "tiktok", 120, 4_096, 1_000));
        store
    }

    #[test]
    fn test_tmp_path_appends_suffix() {
        let tmp = tmp_path(Path::new("/data/events.json"));
        assert_eq!(tmp, PathBuf::from("/data/events.json.tmp"));
    }

    #[tokio::test]
    async fn test_persist_then_load_restores_state() {
        let dir = TempDir::new().unwrap();
        let store = populated_store();
        store.persist_to(dir.path(), 10_000).await.unwrap();
        assert!(dir.path().join(EVENTS_FILE).exists());
        assert!(!dir.path().join("events.json.tmp").exists());

        let restored = EventStore::new(StoreOptions::default());
        let report = restored.load_from(dir.path()).await;
        assert!(report.is_clean());
        assert_eq!(report.events, 3);
        assert_eq!(report.chats, 2);
        assert_eq!(restored.get(&ChatKey::new("a")), store.get(&ChatKey::new("a")));
        assert_eq!(restored.performance_totals(), store.performance_totals());
        assert_eq!(restored.count_in_window(&ChatKey::new("a"), 60_000, 5_000), 2);
    }

    #[tokio::test]
    async fn test_load_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = EventStore::new(StoreOptions::default());
        let report = store.load_from(&dir.path().join("absent")).await;
        assert!(report.is_clean());
        assert_eq!(store.chat_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_collection_is_reported_and_left_empty() {
        let dir = TempDir::new().unwrap();
        populated_store().persist_to(dir.path(), 10_000).await.unwrap();
        std::fs::write(dir.path().join(CHATS_FILE), b"{not json").unwrap();

        let store = EventStore::new(StoreOptions::default());
        let report = store.load_from(dir.path()).await;
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], StorageError::Deserialize { .. }));
        assert_eq!(store.chat_count(), 0);
        assert_eq!(report.events, 3);
    }

    #[tokio::test]
    async fn test_totals_survive_chat_sweep_and_restart() {
        let dir = TempDir::new().unwrap();
        let store = populated_store();
        let policy = RetentionPolicy {
            chats: std::time::Duration::from_secs(1),
            ..RetentionPolicy::FOREVER
        };
        store.sweep(&policy, 1_000_000, 16);
        assert_eq!(store.chat_count(), 0);
        assert_eq!(store.request_totals().total, 3);

        store.persist_to(dir.path(), 1_000_000).await.unwrap();
        let restored = EventStore::new(StoreOptions::default());
        restored.load_from(dir.path()).await;
        assert_eq!(restored.request_totals(), store.request_totals());
    }

    #[tokio::test]
    async fn test_chats_without_totals_are_summed_on_load() {
        let dir = TempDir::new().unwrap();
        let store = populated_store();
        let chats = serde_json::json!({ "chats": store.chats() });
        std::fs::write(dir.path().join(CHATS_FILE), chats.to_string()).unwrap();

        let restored = EventStore::new(StoreOptions::default());
        let report = restored.load_from(dir.path()).await;
        assert!(report.is_clean());
        assert_eq!(restored.request_totals().total, 3);
        assert_eq!(restored.request_totals().failed, 1);
    }

    #[test]
    fn test_rebuild_recomputes_from_logs() {
        let store = populated_store();
        let report = store.rebuild();
        assert_eq!(report.events_replayed, 3);
        assert_eq!(report.chats, 2);
        assert_eq!(store.get(&ChatKey::new("a")).failed_requests, 1);
        assert_eq!(store.performance_totals().overall.successes, 1);
        assert_eq!(store.request_totals().total, 3);
    }

    #[tokio::test]
    async fn test_persist_records_last_attempt() {
        let dir = TempDir::new().unwrap();
        let store = populated_store();
        assert!(store.storage_info().last_persist.is_none());

        store.persist_to(dir.path(), 42).await.unwrap();
        let last = store.storage_info().last_persist.unwrap();
        assert_eq!(last.at, 42);
        assert!(last.ok);
    }

    #[tokio::test]
    async fn test_persist_without_data_dir_is_noop() {
        let store = populated_store();
        store.persist(1).await.unwrap();
        assert!(store.storage_info().last_persist.is_none());
    }
}
