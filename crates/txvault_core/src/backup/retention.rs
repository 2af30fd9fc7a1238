//! Retention pruning of old backups.

use crate::backup::metadata::{BackupMetadata, MetadataStore};
use crate::config::RetentionPolicy;
use crate::error::CoreResult;
use crate::maintenance::MaintenanceLock;
use chrono::{Duration, Utc};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// What a cleanup pass removed and kept.
#[derive(Debug, Clone)]
pub struct CleanupReport {
    /// Ids of backups whose metadata and artifact were deleted.
    pub removed: Vec<String>,
    /// Backups still tracked after the pass.
    pub retained: usize,
}

/// Prunes backups by age and count.
///
/// Age pruning runs first: every backup strictly older than
/// `now - max_age_days` is deleted. If more than `max_count` backups
/// remain, the oldest are deleted until exactly `max_count` are left.
/// With `retain_latest` set, the newest restorable backup survives both
/// phases, so a cleanup pass can never remove the last restore target.
pub struct RetentionManager {
    store: Arc<MetadataStore>,
    backup_dir: PathBuf,
    policy: RetentionPolicy,
}

impl RetentionManager {
    /// Creates a retention manager over the shared metadata document.
    pub fn new(
        store: Arc<MetadataStore>,
        backup_dir: impl Into<PathBuf>,
        policy: RetentionPolicy,
    ) -> Self {
        Self {
            store,
            backup_dir: backup_dir.into(),
            policy,
        }
    }

    /// Runs one cleanup pass under the maintenance lock.
    ///
    /// # Errors
    ///
    /// Returns an error when the metadata document cannot be updated.
    /// Artifact deletions are best-effort and only logged.
    pub fn cleanup_old_backups(&self) -> CoreResult<CleanupReport> {
        let _guard = MaintenanceLock::acquire(&self.backup_dir)?;

        let all = self.store.list();
        let protected: Option<String> = if self.policy.retain_latest {
            all.iter()
                .rev()
                .find(|m| m.status.is_restorable())
                .map(|m| m.backup_id.clone())
        } else {
            None
        };

        let cutoff = Utc::now() - Duration::days(self.policy.max_age_days);
        let mut removed = Vec::new();

        for metadata in &all {
            if protected.as_deref() == Some(metadata.backup_id.as_str()) {
                continue;
            }
            if metadata.timestamp < cutoff {
                self.delete_backup(metadata)?;
                removed.push(metadata.backup_id.clone());
            }
        }

        let mut remaining = self.store.list();
        let mut index = 0;
        while remaining.len() > self.policy.max_count && index < remaining.len() {
            if protected.as_deref() == Some(remaining[index].backup_id.as_str()) {
                index += 1;
                continue;
            }
            let metadata = remaining.remove(index);
            self.delete_backup(&metadata)?;
            removed.push(metadata.backup_id);
        }

        let retained = self.store.len();
        info!(removed = removed.len(), retained, "retention cleanup finished");
        Ok(CleanupReport { removed, retained })
    }

    fn delete_backup(&self, metadata: &BackupMetadata) -> CoreResult<()> {
        if metadata.artifact_path.exists() {
            if let Err(err) = fs::remove_file(&metadata.artifact_path) {
                warn!(backup_id = %metadata.backup_id, %err, "artifact deletion failed");
            }
        }
        self.store.remove(&metadata.backup_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::metadata::{BackupStatus, BackupType};
    use chrono::{DateTime, Utc};
    use tempfile::{tempdir, TempDir};

    struct Env {
        dir: TempDir,
        store: Arc<MetadataStore>,
    }

    fn env() -> Env {
        let dir = tempdir().unwrap();
        let store =
            Arc::new(MetadataStore::open(&dir.path().join("backup_metadata.json")).unwrap());
        Env { dir, store }
    }

    fn add_backup(env: &Env, id: &str, timestamp: DateTime<Utc>, status: BackupStatus) {
        let artifact_path = env.dir.path().join(format!("{id}.tvb"));
        fs::write(&artifact_path, b"artifact-bytes").unwrap();
        env.store
            .upsert(BackupMetadata {
                backup_id: id.to_string(),
                backup_type: BackupType::Full,
                timestamp,
                source_path: env.dir.path().join("store.tvdb"),
                artifact_path,
                size_bytes: 14,
                checksum: "00".repeat(32),
                status,
                validation_result: None,
                error_message: None,
            })
            .unwrap();
    }

    fn retention(env: &Env, policy: RetentionPolicy) -> RetentionManager {
        RetentionManager::new(Arc::clone(&env.store), env.dir.path().join("backups"), policy)
    }

    #[test]
    fn count_rule_keeps_the_newest_max_count() {
        let env = env();
        let now = Utc::now();
        add_backup(&env, "b-old", now - Duration::hours(2), BackupStatus::Validated);
        add_backup(&env, "b-mid", now - Duration::hours(1), BackupStatus::Validated);
        add_backup(&env, "b-new", now, BackupStatus::Validated);

        let report = retention(&env, RetentionPolicy::new().max_count(2))
            .cleanup_old_backups()
            .unwrap();

        assert_eq!(report.removed, vec!["b-old".to_string()]);
        assert_eq!(report.retained, 2);
        assert!(env.store.get("b-mid").is_some());
        assert!(env.store.get("b-new").is_some());
        assert!(!env.dir.path().join("b-old.tvb").exists());
    }

    #[test]
    fn age_rule_removes_expired_backups() {
        let env = env();
        let now = Utc::now();
        add_backup(&env, "b-ancient", now - Duration::days(40), BackupStatus::Validated);
        add_backup(&env, "b-recent", now - Duration::days(1), BackupStatus::Validated);

        let report = retention(&env, RetentionPolicy::new().max_age_days(30))
            .cleanup_old_backups()
            .unwrap();

        assert_eq!(report.removed, vec!["b-ancient".to_string()]);
        assert!(env.store.get("b-recent").is_some());
    }

    #[test]
    fn safeguard_keeps_the_newest_restorable_backup() {
        let env = env();
        let now = Utc::now();
        add_backup(&env, "b-1", now - Duration::days(50), BackupStatus::Validated);
        add_backup(&env, "b-2", now - Duration::days(40), BackupStatus::Validated);

        let report = retention(&env, RetentionPolicy::new().max_age_days(30))
            .cleanup_old_backups()
            .unwrap();

        assert_eq!(report.removed, vec!["b-1".to_string()]);
        assert_eq!(report.retained, 1);
        assert!(env.store.get("b-2").is_some());
    }

    #[test]
    fn safeguard_disabled_reproduces_source_behavior() {
        let env = env();
        let now = Utc::now();
        add_backup(&env, "b-1", now - Duration::days(50), BackupStatus::Validated);
        add_backup(&env, "b-2", now - Duration::days(40), BackupStatus::Validated);

        let report = retention(
            &env,
            RetentionPolicy::new().max_age_days(30).retain_latest(false),
        )
        .cleanup_old_backups()
        .unwrap();

        assert_eq!(report.retained, 0);
        assert_eq!(report.removed.len(), 2);
    }

    #[test]
    fn failed_backups_are_not_protected() {
        let env = env();
        let now = Utc::now();
        add_backup(&env, "b-good", now - Duration::days(45), BackupStatus::Validated);
        add_backup(&env, "b-bad", now - Duration::days(40), BackupStatus::Failed);

        let report = retention(&env, RetentionPolicy::new().max_age_days(30))
            .cleanup_old_backups()
            .unwrap();

        // The newest restorable backup survives; the newer-but-failed one
        // does not.
        assert_eq!(report.removed, vec!["b-bad".to_string()]);
        assert!(env.store.get("b-good").is_some());
    }
}
