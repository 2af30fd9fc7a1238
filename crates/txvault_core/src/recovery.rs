//! Restore, point-in-time recovery, and automated disaster recovery.

use crate::backup::{is_compressed, path_with_suffix, sync_directory, MetadataStore};
use crate::error::{CoreError, CoreResult};
use crate::maintenance::MaintenanceLock;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use txvault_storage::{FileEngine, StorageEngine, StorageError};

/// Result of a health probe over the live store.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Whether the store file could be opened at all.
    pub database_accessible: bool,
    /// Whether the integrity check found corruption.
    pub corruption_detected: bool,
    /// Whether a recovery should be initiated.
    pub recovery_needed: bool,
    /// The failure that was observed, if any.
    pub error: Option<String>,
}

impl HealthReport {
    fn healthy() -> Self {
        Self {
            database_accessible: true,
            corruption_detected: false,
            recovery_needed: false,
            error: None,
        }
    }
}

/// Restores backups onto the live store and drives disaster recovery.
///
/// Restores are gated on metadata status: only `Completed` or `Validated`
/// backups qualify. Every restore path holds the maintenance lock, takes a
/// best-effort safety copy of the current live file, and lands the restored
/// bytes through a temporary file and an atomic rename.
pub struct RecoveryCoordinator {
    live_path: PathBuf,
    backup_dir: PathBuf,
    store: Arc<MetadataStore>,
    max_recovery_attempts: usize,
}

impl RecoveryCoordinator {
    /// Creates a coordinator for the given live store and backup directory.
    pub fn new(
        live_path: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
        store: Arc<MetadataStore>,
    ) -> Self {
        Self {
            live_path: live_path.into(),
            backup_dir: backup_dir.into(),
            store,
            max_recovery_attempts: 5,
        }
    }

    /// Bounds how many backup candidates disaster recovery will try.
    #[must_use]
    pub fn max_recovery_attempts(mut self, value: usize) -> Self {
        self.max_recovery_attempts = value;
        self
    }

    /// Restores a backup onto `target` (default: the live store path).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BackupNotFound`] for an unknown id,
    /// [`CoreError::BackupNotRestorable`] when the backup's status is not
    /// `Completed` or `Validated`, or an I/O error when the copy fails.
    pub fn restore_from_backup(
        &self,
        backup_id: &str,
        target: Option<&Path>,
    ) -> CoreResult<bool> {
        let _guard = MaintenanceLock::acquire(&self.backup_dir)?;
        self.restore_locked(backup_id, target)
    }

    /// Restores to the most recent restorable backup at or before
    /// `target_timestamp`, returning its id, or `None` when no backup
    /// qualifies.
    ///
    /// # Errors
    ///
    /// Returns an error when the selected restore fails.
    pub fn point_in_time_recovery(
        &self,
        target_timestamp: DateTime<Utc>,
    ) -> CoreResult<Option<String>> {
        let _guard = MaintenanceLock::acquire(&self.backup_dir)?;

        let candidate = self
            .store
            .list()
            .into_iter()
            .filter(|m| m.status.is_restorable() && m.timestamp <= target_timestamp)
            .max_by_key(|m| m.timestamp);

        let Some(metadata) = candidate else {
            info!(%target_timestamp, "no backup at or before target");
            return Ok(None);
        };

        self.restore_locked(&metadata.backup_id, None)?;
        info!(backup_id = %metadata.backup_id, %target_timestamp, "point-in-time recovery done");
        Ok(Some(metadata.backup_id))
    }

    /// Probes the live store: can it be opened, and is it intact?
    #[must_use]
    pub fn assess_database_health(&self) -> HealthReport {
        let engine = match FileEngine::open(&self.live_path) {
            Ok(engine) => engine,
            Err(err) => {
                return HealthReport {
                    database_accessible: false,
                    corruption_detected: is_corruption(&err),
                    recovery_needed: true,
                    error: Some(err.to_string()),
                }
            }
        };
        match engine.check_integrity() {
            Ok(()) => HealthReport::healthy(),
            Err(err) => HealthReport {
                database_accessible: true,
                corruption_detected: true,
                recovery_needed: true,
                error: Some(err.to_string()),
            },
        }
    }

    /// Restores the newest healthy backup when the live store is damaged.
    ///
    /// A healthy store makes this a no-op returning true. Otherwise the
    /// restorable backups are tried newest-first, up to the attempt bound;
    /// before each attempt an emergency copy of the (possibly corrupt)
    /// live file is kept. Returns true on the first candidate that yields
    /// an accessible, uncorrupted store, false when all are exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error only when the maintenance lock cannot be acquired.
    pub fn initiate_disaster_recovery(&self) -> CoreResult<bool> {
        let health = self.assess_database_health();
        if !health.recovery_needed {
            info!("disaster recovery requested but store is healthy");
            return Ok(true);
        }
        warn!(error = ?health.error, "disaster recovery started");

        let _guard = MaintenanceLock::acquire(&self.backup_dir)?;

        let mut candidates: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|m| m.status.is_restorable())
            .collect();
        candidates.sort_by_key(|m| std::cmp::Reverse(m.timestamp));

        for (attempt, metadata) in candidates
            .iter()
            .take(self.max_recovery_attempts)
            .enumerate()
        {
            self.emergency_copy(attempt);

            if let Err(err) = self.restore_locked(&metadata.backup_id, None) {
                warn!(backup_id = %metadata.backup_id, %err, "restore candidate failed");
                continue;
            }

            let health = self.assess_database_health();
            if !health.recovery_needed {
                info!(backup_id = %metadata.backup_id, attempt, "disaster recovery succeeded");
                return Ok(true);
            }
            warn!(backup_id = %metadata.backup_id, "restored store still unhealthy");
        }

        warn!("disaster recovery exhausted all candidates");
        Ok(false)
    }

    /// Restore body; callers hold the maintenance lock.
    fn restore_locked(&self, backup_id: &str, target: Option<&Path>) -> CoreResult<bool> {
        let metadata = self
            .store
            .get(backup_id)
            .ok_or_else(|| CoreError::BackupNotFound {
                backup_id: backup_id.to_string(),
            })?;

        if !metadata.status.is_restorable() {
            return Err(CoreError::BackupNotRestorable {
                backup_id: backup_id.to_string(),
                status: metadata.status.to_string(),
            });
        }

        let target = target.unwrap_or(&self.live_path);

        // Best-effort safety copy of whatever is live right now.
        if target.exists() {
            let safety = path_with_suffix(target, ".pre-restore");
            if let Err(err) = fs::copy(target, &safety) {
                warn!(%err, "safety copy before restore failed");
            }
        }

        let staging = path_with_suffix(target, ".restore-tmp");
        if is_compressed(&metadata.artifact_path) {
            let input = File::open(&metadata.artifact_path)?;
            let output = File::create(&staging)?;
            zstd::stream::copy_decode(input, &output)?;
            output.sync_all()?;
        } else {
            fs::copy(&metadata.artifact_path, &staging)?;
        }
        fs::rename(&staging, target)?;
        if let Some(parent) = target.parent() {
            sync_directory(parent)?;
        }

        info!(backup_id, target = %target.display(), "backup restored");
        Ok(true)
    }

    /// Keeps a copy of the damaged live file before overwriting it.
    fn emergency_copy(&self, attempt: usize) {
        if !self.live_path.exists() {
            return;
        }
        let copy = path_with_suffix(&self.live_path, &format!(".emergency-{attempt}"));
        if let Err(err) = fs::copy(&self.live_path, &copy) {
            warn!(%err, "emergency copy failed");
        }
    }
}

fn is_corruption(err: &StorageError) -> bool {
    matches!(
        err,
        StorageError::Corrupted(_) | StorageError::ChecksumMismatch { .. } | StorageError::Codec(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::{BackupManager, BackupStatus};
    use crate::config::BackupConfig;
    use tempfile::{tempdir, TempDir};
    use txvault_storage::{row, Statement, Value};

    struct Env {
        dir: TempDir,
        live_path: PathBuf,
        engine: Arc<FileEngine>,
        store: Arc<MetadataStore>,
    }

    impl Env {
        fn manager(&self, config: BackupConfig) -> BackupManager {
            BackupManager::new(
                self.engine.clone(),
                &self.live_path,
                self.dir.path().join("backups"),
                Arc::clone(&self.store),
                config,
            )
        }

        fn recovery(&self) -> RecoveryCoordinator {
            RecoveryCoordinator::new(
                &self.live_path,
                self.dir.path().join("backups"),
                Arc::clone(&self.store),
            )
        }

        fn insert_user(&self, name: &str) {
            self.engine
                .apply_batch(&[Statement::Insert {
                    table: "users".into(),
                    row: row([("name", Value::from(name))]),
                }
                .into()])
                .unwrap();
        }
    }

    fn env() -> Env {
        let dir = tempdir().unwrap();
        let live_path = dir.path().join("store.tvdb");
        let engine = Arc::new(FileEngine::open(&live_path).unwrap());
        let store =
            Arc::new(MetadataStore::open(&dir.path().join("backup_metadata.json")).unwrap());
        Env {
            dir,
            live_path,
            engine,
            store,
        }
    }

    #[test]
    fn restore_puts_backup_bytes_back() {
        let env = env();
        env.insert_user("ada");
        let backup = env.manager(BackupConfig::default()).create_full_backup().unwrap();

        env.insert_user("bob");
        assert_eq!(env.engine.count_records("users").unwrap(), 2);

        assert!(env
            .recovery()
            .restore_from_backup(&backup.backup_id, None)
            .unwrap());
        env.engine.reload().unwrap();
        assert_eq!(env.engine.count_records("users").unwrap(), 1);

        // A safety copy of the pre-restore state was kept.
        assert!(path_with_suffix(&env.live_path, ".pre-restore").exists());
    }

    #[test]
    fn restore_refuses_non_restorable_backups() {
        let env = env();
        env.insert_user("ada");
        let backup = env.manager(BackupConfig::default()).create_full_backup().unwrap();
        env.store
            .update(&backup.backup_id, |m| m.status = BackupStatus::Corrupted)
            .unwrap();

        let err = env
            .recovery()
            .restore_from_backup(&backup.backup_id, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::BackupNotRestorable { .. }));
    }

    #[test]
    fn restore_to_explicit_target() {
        let env = env();
        env.insert_user("ada");
        let backup = env.manager(BackupConfig::default()).create_full_backup().unwrap();

        let target = env.dir.path().join("restored.tvdb");
        env.recovery()
            .restore_from_backup(&backup.backup_id, Some(&target))
            .unwrap();

        let restored = FileEngine::open(&target).unwrap();
        assert_eq!(restored.count_records("users").unwrap(), 1);
    }

    #[test]
    fn compressed_restore_round_trips() {
        let env = env();
        env.insert_user("ada");
        env.insert_user("bob");
        let backup = env
            .manager(BackupConfig::new().compress(true))
            .create_full_backup()
            .unwrap();

        env.insert_user("eve");
        env.recovery()
            .restore_from_backup(&backup.backup_id, None)
            .unwrap();
        env.engine.reload().unwrap();
        assert_eq!(env.engine.count_records("users").unwrap(), 2);
    }

    #[test]
    fn point_in_time_selects_closest_before() {
        let env = env();
        env.insert_user("ada");
        let mgr = env.manager(BackupConfig::default());

        let now = Utc::now();
        let b1 = mgr.create_full_backup().unwrap();
        env.insert_user("bob");
        let b2 = mgr.create_full_backup().unwrap();
        env.insert_user("eve");
        let b3 = mgr.create_full_backup().unwrap();

        // Spread the timestamps: T-2h, T-1h, T.
        env.store
            .update(&b1.backup_id, |m| m.timestamp = now - chrono::Duration::hours(2))
            .unwrap();
        env.store
            .update(&b2.backup_id, |m| m.timestamp = now - chrono::Duration::hours(1))
            .unwrap();
        env.store.update(&b3.backup_id, |m| m.timestamp = now).unwrap();

        let selected = env
            .recovery()
            .point_in_time_recovery(now - chrono::Duration::minutes(30))
            .unwrap();
        assert_eq!(selected.as_deref(), Some(b2.backup_id.as_str()));

        env.engine.reload().unwrap();
        assert_eq!(env.engine.count_records("users").unwrap(), 2);
    }

    #[test]
    fn point_in_time_before_all_backups_is_none() {
        let env = env();
        env.insert_user("ada");
        let mgr = env.manager(BackupConfig::default());
        mgr.create_full_backup().unwrap();

        let selected = env
            .recovery()
            .point_in_time_recovery(Utc::now() - chrono::Duration::hours(3))
            .unwrap();
        assert!(selected.is_none());
    }

    #[test]
    fn health_reports_corruption() {
        let env = env();
        env.insert_user("ada");

        let healthy = env.recovery().assess_database_health();
        assert!(healthy.database_accessible);
        assert!(!healthy.recovery_needed);

        let mut bytes = fs::read(&env.live_path).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        fs::write(&env.live_path, &bytes).unwrap();

        let report = env.recovery().assess_database_health();
        assert!(report.recovery_needed);
        assert!(report.corruption_detected);
        assert!(report.error.is_some());
    }

    #[test]
    fn disaster_recovery_on_healthy_store_is_a_noop() {
        let env = env();
        env.insert_user("ada");
        assert!(env.recovery().initiate_disaster_recovery().unwrap());
    }

    #[test]
    fn disaster_recovery_restores_newest_backup() {
        let env = env();
        env.insert_user("ada");
        env.insert_user("bob");
        let mgr = env.manager(BackupConfig::default());
        mgr.create_full_backup().unwrap();

        env.insert_user("eve");
        mgr.create_full_backup().unwrap();

        // Corrupt the live file.
        fs::write(&env.live_path, b"garbage that is not a store").unwrap();

        assert!(env.recovery().initiate_disaster_recovery().unwrap());

        let recovered = FileEngine::open(&env.live_path).unwrap();
        assert_eq!(recovered.count_records("users").unwrap(), 3);

        // The damaged file was preserved for forensics.
        assert!(path_with_suffix(&env.live_path, ".emergency-0").exists());
    }

    #[test]
    fn disaster_recovery_fails_without_candidates() {
        let env = env();
        env.insert_user("ada");
        fs::write(&env.live_path, b"garbage").unwrap();

        assert!(!env.recovery().initiate_disaster_recovery().unwrap());
    }

    #[test]
    fn disaster_recovery_skips_corrupted_candidates() {
        let env = env();
        env.insert_user("ada");
        let mgr = env.manager(BackupConfig::default());
        mgr.create_full_backup().unwrap();

        env.insert_user("bob");
        let bad = mgr.create_full_backup().unwrap();

        // The newer artifact is damaged and flagged by validation.
        fs::write(&bad.artifact_path, b"broken artifact").unwrap();
        let validator = crate::backup::BackupValidator::new(Arc::clone(&env.store));
        assert!(!validator.validate_backup(&bad.backup_id).unwrap());

        fs::write(&env.live_path, b"garbage").unwrap();
        assert!(env.recovery().initiate_disaster_recovery().unwrap());

        let recovered = FileEngine::open(&env.live_path).unwrap();
        assert_eq!(recovered.count_records("users").unwrap(), 1);
    }
}
