//! Full backup creation.

use crate::backup::metadata::{
    BackupMetadata, BackupStatus, BackupType, MetadataStore,
};
use crate::backup::validator::BackupValidator;
use crate::backup::{path_with_suffix, sha256_hex, sync_directory};
use crate::config::BackupConfig;
use crate::error::{CoreError, CoreResult};
use crate::maintenance::MaintenanceLock;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use txvault_storage::StorageEngine;

/// zstd level used for compressed artifacts.
const COMPRESSION_LEVEL: i32 = 3;

/// Aggregate view over all tracked backups.
#[derive(Debug, Clone, Serialize)]
pub struct BackupStatusSummary {
    /// Backups tracked in the metadata document.
    pub total: usize,
    /// Count with status completed.
    pub completed: usize,
    /// Count with status validated.
    pub validated: usize,
    /// Count with status failed.
    pub failed: usize,
    /// Count with status corrupted.
    pub corrupted: usize,
    /// Count still pending or in progress.
    pub in_flight: usize,
    /// Total artifact bytes across all backups.
    pub total_size_bytes: u64,
    /// Timestamp of the newest backup, if any.
    pub latest_backup: Option<DateTime<Utc>>,
}

impl BackupStatusSummary {
    /// Aggregates a timestamp-sorted backup list.
    #[must_use]
    pub fn from_backups(backups: &[BackupMetadata]) -> Self {
        let mut summary = Self {
            total: backups.len(),
            completed: 0,
            validated: 0,
            failed: 0,
            corrupted: 0,
            in_flight: 0,
            total_size_bytes: 0,
            latest_backup: backups.last().map(|m| m.timestamp),
        };
        for metadata in backups {
            summary.total_size_bytes += metadata.size_bytes;
            match metadata.status {
                BackupStatus::Completed => summary.completed += 1,
                BackupStatus::Validated => summary.validated += 1,
                BackupStatus::Failed => summary.failed += 1,
                BackupStatus::Corrupted => summary.corrupted += 1,
                BackupStatus::Pending | BackupStatus::InProgress => summary.in_flight += 1,
            }
        }
        summary
    }
}

/// Creates checksummed full backups of a store.
///
/// A backup is a copy of the whole store written through the engine's
/// native snapshot primitive, optionally zstd-compressed, checksummed with
/// SHA-256, and tracked in the shared metadata document. Creation holds the
/// maintenance lock so it cannot interleave with restore or cleanup.
pub struct BackupManager {
    engine: Arc<dyn StorageEngine>,
    live_path: PathBuf,
    backup_dir: PathBuf,
    store: Arc<MetadataStore>,
    config: BackupConfig,
    seq: AtomicU64,
}

impl BackupManager {
    /// Creates a manager over the given engine and backup directory.
    pub fn new(
        engine: Arc<dyn StorageEngine>,
        live_path: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
        store: Arc<MetadataStore>,
        config: BackupConfig,
    ) -> Self {
        Self {
            engine,
            live_path: live_path.into(),
            backup_dir: backup_dir.into(),
            store,
            config,
            seq: AtomicU64::new(0),
        }
    }

    /// Creates a full backup and returns its final metadata.
    ///
    /// On success the metadata's status is `Completed` (or `Validated` when
    /// validate-on-create is enabled). On failure the metadata is persisted
    /// with status `Failed` and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot, compression, checksum, or
    /// metadata write fails.
    pub fn create_full_backup(&self) -> CoreResult<BackupMetadata> {
        let guard = MaintenanceLock::acquire(&self.backup_dir)?;
        let now = Utc::now();
        let backup_id = self.next_backup_id(now);
        let extension = if self.config.compress { "tvb.zst" } else { "tvb" };
        let artifact_path = self.backup_dir.join(format!("{backup_id}.{extension}"));

        self.store.upsert(BackupMetadata {
            backup_id: backup_id.clone(),
            backup_type: BackupType::Full,
            timestamp: now,
            source_path: self.live_path.clone(),
            artifact_path: artifact_path.clone(),
            size_bytes: 0,
            checksum: String::new(),
            status: BackupStatus::InProgress,
            validation_result: None,
            error_message: None,
        })?;

        match self.write_artifact(&artifact_path) {
            Ok((size_bytes, checksum)) => {
                let status = if artifact_path.exists() {
                    BackupStatus::Completed
                } else {
                    BackupStatus::Failed
                };
                self.store.update(&backup_id, |m| {
                    m.size_bytes = size_bytes;
                    m.checksum = checksum.clone();
                    m.status = status;
                })?;
                info!(%backup_id, size_bytes, %status, "backup created");
            }
            Err(err) => {
                warn!(%backup_id, %err, "backup creation failed");
                self.store.update(&backup_id, |m| {
                    m.status = BackupStatus::Failed;
                    m.error_message = Some(err.to_string());
                })?;
                return Err(err);
            }
        }
        drop(guard);

        if self.config.validate_on_create {
            let validator = BackupValidator::new(Arc::clone(&self.store));
            validator.validate_backup(&backup_id)?;
        }

        self.store
            .get(&backup_id)
            .ok_or_else(|| CoreError::BackupNotFound { backup_id })
    }

    /// All tracked backups, oldest first.
    #[must_use]
    pub fn list_backups(&self) -> Vec<BackupMetadata> {
        self.store.list()
    }

    /// Metadata for one backup.
    #[must_use]
    pub fn get_backup(&self, backup_id: &str) -> Option<BackupMetadata> {
        self.store.get(backup_id)
    }

    /// Aggregate counts and sizes across all backups.
    #[must_use]
    pub fn status_summary(&self) -> BackupStatusSummary {
        BackupStatusSummary::from_backups(&self.store.list())
    }

    /// The shared metadata document.
    #[must_use]
    pub fn metadata_store(&self) -> Arc<MetadataStore> {
        Arc::clone(&self.store)
    }

    /// The backup directory.
    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Snapshots the store, optionally compresses, and checksums the result.
    fn write_artifact(&self, artifact_path: &Path) -> CoreResult<(u64, String)> {
        let temp_path = path_with_suffix(artifact_path, ".tmp");
        self.engine.snapshot_to(&temp_path)?;

        if self.config.compress {
            let input = File::open(&temp_path)?;
            let output = File::create(artifact_path)?;
            zstd::stream::copy_encode(input, &output, COMPRESSION_LEVEL)?;
            output.sync_all()?;
            fs::remove_file(&temp_path)?;
        } else {
            fs::rename(&temp_path, artifact_path)?;
        }
        sync_directory(&self.backup_dir)?;

        let size_bytes = fs::metadata(artifact_path)?.len();
        let checksum = sha256_hex(artifact_path)?;
        Ok((size_bytes, checksum))
    }

    /// Builds a unique backup id from the timestamp and process identity.
    fn next_backup_id(&self, now: DateTime<Utc>) -> String {
        let pid = std::process::id();
        loop {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed);
            let id = format!("backup-{}-{pid}-{seq}", now.format("%Y%m%d-%H%M%S"));
            if self.store.get(&id).is_none() {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};
    use txvault_storage::{row, FileEngine, Statement, Value};

    struct Env {
        _dir: TempDir,
        engine: Arc<FileEngine>,
        live_path: PathBuf,
        backup_dir: PathBuf,
        store: Arc<MetadataStore>,
    }

    fn env_with_rows(names: &[&str]) -> Env {
        let dir = tempdir().unwrap();
        let live_path = dir.path().join("store.tvdb");
        let backup_dir = dir.path().join("backups");

        let engine = Arc::new(FileEngine::open(&live_path).unwrap());
        let batch: Vec<_> = names
            .iter()
            .map(|name| {
                Statement::Insert {
                    table: "users".into(),
                    row: row([("name", Value::from(*name))]),
                }
                .into()
            })
            .collect();
        engine.apply_batch(&batch).unwrap();

        let store =
            Arc::new(MetadataStore::open(&dir.path().join("backup_metadata.json")).unwrap());
        Env {
            _dir: dir,
            engine,
            live_path,
            backup_dir,
            store,
        }
    }

    fn manager(env: &Env, config: BackupConfig) -> BackupManager {
        BackupManager::new(
            env.engine.clone(),
            &env.live_path,
            &env.backup_dir,
            Arc::clone(&env.store),
            config,
        )
    }

    #[test]
    fn backup_is_created_validated_and_persisted() {
        let env = env_with_rows(&["ada", "bob"]);
        let mgr = manager(&env, BackupConfig::default());

        let metadata = mgr.create_full_backup().unwrap();
        assert_eq!(metadata.status, BackupStatus::Validated);
        assert!(metadata.artifact_path.exists());
        assert_eq!(metadata.checksum.len(), 64);
        assert!(metadata.size_bytes > 0);

        let report = metadata.validation_result.unwrap();
        assert!(report.checksum_valid);
        assert_eq!(report.table_count, 1);
        assert_eq!(report.record_count, 2);

        // The document survives reopen.
        let reopened = MetadataStore::open(env.store.path()).unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn unvalidated_backup_stays_completed() {
        let env = env_with_rows(&["ada"]);
        let mgr = manager(&env, BackupConfig::new().validate_on_create(false));

        let metadata = mgr.create_full_backup().unwrap();
        assert_eq!(metadata.status, BackupStatus::Completed);
        assert!(metadata.validation_result.is_none());
    }

    #[test]
    fn compressed_artifact_has_zst_extension() {
        let env = env_with_rows(&["ada"]);
        let mgr = manager(&env, BackupConfig::new().compress(true));

        let metadata = mgr.create_full_backup().unwrap();
        assert!(metadata
            .artifact_path
            .to_string_lossy()
            .ends_with(".tvb.zst"));
        assert_eq!(metadata.status, BackupStatus::Validated);

        // No uncompressed intermediate left behind.
        let leftovers: Vec<_> = fs::read_dir(&env.backup_dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn backup_ids_are_unique_within_a_second() {
        let env = env_with_rows(&["ada"]);
        let mgr = manager(&env, BackupConfig::new().validate_on_create(false));

        let first = mgr.create_full_backup().unwrap();
        let second = mgr.create_full_backup().unwrap();
        assert_ne!(first.backup_id, second.backup_id);
        assert_eq!(mgr.list_backups().len(), 2);
    }

    #[test]
    fn status_summary_aggregates() {
        let env = env_with_rows(&["ada"]);
        let mgr = manager(&env, BackupConfig::default());
        mgr.create_full_backup().unwrap();
        mgr.create_full_backup().unwrap();

        let summary = mgr.status_summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.validated, 2);
        assert_eq!(summary.failed, 0);
        assert!(summary.total_size_bytes > 0);
        assert!(summary.latest_backup.is_some());
    }
}
