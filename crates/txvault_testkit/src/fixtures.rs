//! Test fixtures: temp-dir backed stores and fully wired backup sites.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use txvault_core::{
    AuditTrail, BackupConfig, BackupManager, BackupValidator, CoordinatorConfig, MetadataStore,
    Operation, RecoveryCoordinator, RetentionManager, RetentionPolicy, TransactionCoordinator,
};
use txvault_storage::{row, FileEngine, Statement, StorageEngine, Value};

/// A file-backed store in a temporary directory.
///
/// The directory lives as long as the fixture.
pub struct TestStore {
    /// The temporary directory holding every file.
    pub dir: TempDir,
    /// Path of the live store file.
    pub live_path: PathBuf,
    /// The engine over the live store.
    pub engine: Arc<FileEngine>,
}

impl TestStore {
    /// Creates an empty store.
    #[must_use]
    pub fn empty() -> Self {
        let dir = TempDir::new().expect("failed to create temp directory");
        let live_path = dir.path().join("store.tvdb");
        let engine = Arc::new(FileEngine::open(&live_path).expect("failed to open store"));
        Self {
            dir,
            live_path,
            engine,
        }
    }

    /// Creates a store with a `users` table holding one row per name.
    #[must_use]
    pub fn seeded(names: &[&str]) -> Self {
        let store = Self::empty();
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
        store
            .engine
            .apply_batch(&batch)
            .expect("failed to seed store");
        store
    }

    /// Builds an insert operation against the `users` table.
    #[must_use]
    pub fn insert_user(name: &str) -> Operation {
        Operation::new(Statement::Insert {
            table: "users".into(),
            row: row([("name", Value::from(name))]),
        })
    }
}

/// A complete backup environment over a seeded store: coordinator, backup
/// manager, validator, retention, and recovery, all sharing one metadata
/// document.
pub struct BackupSite {
    /// The underlying store fixture.
    pub store: TestStore,
    /// Path of the live store file.
    pub live_path: PathBuf,
    /// Transaction coordinator over the store.
    pub coordinator: TransactionCoordinator,
    /// Backup creation.
    pub manager: BackupManager,
    /// Backup verification.
    pub validator: BackupValidator,
    /// Backup pruning.
    pub retention: RetentionManager,
    /// Restore and disaster recovery.
    pub recovery: RecoveryCoordinator,
    /// The shared metadata document.
    pub metadata: Arc<MetadataStore>,
}

impl BackupSite {
    /// Builds a site over a store seeded with the given user names.
    #[must_use]
    pub fn seeded(names: &[&str]) -> Self {
        Self::with_policy(names, RetentionPolicy::default())
    }

    /// Builds a site with a specific retention policy.
    #[must_use]
    pub fn with_policy(names: &[&str], policy: RetentionPolicy) -> Self {
        let store = TestStore::seeded(names);
        let live_path = store.live_path.clone();
        let backup_dir = store.dir.path().join("backups");

        let coordinator = TransactionCoordinator::new(
            store.engine.clone(),
            Arc::new(AuditTrail::new(store.dir.path().join("audit.log"))),
            CoordinatorConfig::default(),
        );

        let metadata = Arc::new(
            MetadataStore::open(&store.dir.path().join("backup_metadata.json"))
                .expect("failed to open metadata document"),
        );
        let manager = BackupManager::new(
            store.engine.clone(),
            &live_path,
            &backup_dir,
            Arc::clone(&metadata),
            BackupConfig::default(),
        );
        let validator = BackupValidator::new(Arc::clone(&metadata));
        let retention = RetentionManager::new(Arc::clone(&metadata), &backup_dir, policy);
        let recovery = RecoveryCoordinator::new(&live_path, &backup_dir, Arc::clone(&metadata));

        Self {
            store,
            live_path,
            coordinator,
            manager,
            validator,
            retention,
            recovery,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txvault_core::{BackupStatus, ExecuteOptions};

    #[test]
    fn seeded_store_has_the_requested_rows() {
        let store = TestStore::seeded(&["ada", "bob", "eve"]);
        assert_eq!(store.engine.count_records("users").unwrap(), 3);
    }

    #[test]
    fn site_wires_coordinator_and_backups_together() {
        let site = BackupSite::seeded(&["ada"]);
        site.coordinator
            .execute(
                vec![TestStore::insert_user("bob")],
                ExecuteOptions::default(),
            )
            .unwrap();

        let backup = site.manager.create_full_backup().unwrap();
        assert_eq!(backup.status, BackupStatus::Validated);
        assert_eq!(backup.validation_result.unwrap().record_count, 2);
    }

    #[test]
    fn site_survives_full_corrupt_and_recover_cycle() {
        let site = BackupSite::seeded(&["ada", "bob"]);
        site.manager.create_full_backup().unwrap();

        site.coordinator
            .execute(
                vec![TestStore::insert_user("eve")],
                ExecuteOptions::default(),
            )
            .unwrap();
        site.manager.create_full_backup().unwrap();

        crate::corruption::overwrite_file(&site.live_path, b"wrecked").unwrap();
        assert!(site.recovery.initiate_disaster_recovery().unwrap());

        let recovered = FileEngine::open(&site.live_path).unwrap();
        assert_eq!(recovered.count_records("users").unwrap(), 3);
    }

    #[test]
    fn retention_pruning_through_the_site() {
        let site = BackupSite::with_policy(&["ada"], RetentionPolicy::new().max_count(2));
        for _ in 0..4 {
            site.manager.create_full_backup().unwrap();
        }
        let report = site.retention.cleanup_old_backups().unwrap();
        assert_eq!(report.retained, 2);
        assert_eq!(site.metadata.len(), 2);
    }
}
