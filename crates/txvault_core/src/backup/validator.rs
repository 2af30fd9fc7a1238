//! Backup validation.

use crate::backup::metadata::{BackupStatus, MetadataStore, ValidationReport};
use crate::backup::{is_compressed, sha256_hex};
use crate::error::{CoreError, CoreResult};
use chrono::Utc;
use std::fs::{self, File};
use std::sync::Arc;
use tracing::{info, warn};
use txvault_storage::{FileEngine, StorageEngine};

/// Verifies a backup's integrity and updates its status.
///
/// Validation never raises for a bad backup: corruption is communicated
/// exclusively through the status field and the returned bool. The only
/// errors that propagate are infrastructure failures around the metadata
/// document itself.
pub struct BackupValidator {
    store: Arc<MetadataStore>,
}

impl BackupValidator {
    /// Creates a validator over the shared metadata document.
    #[must_use]
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    /// Validates one backup: existence, checksum, and readability.
    ///
    /// On success the status becomes `Validated` and a
    /// [`ValidationReport`] is stored. On any verification failure the
    /// status becomes `Corrupted` (never `Validated`) and false is
    /// returned. Validation is idempotent: re-running it without mutating
    /// the artifact yields the same status and report.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BackupNotFound`] for an unknown id, or an error
    /// when the metadata document cannot be written.
    pub fn validate_backup(&self, backup_id: &str) -> CoreResult<bool> {
        let metadata = self
            .store
            .get(backup_id)
            .ok_or_else(|| CoreError::BackupNotFound {
                backup_id: backup_id.to_string(),
            })?;

        let mut report = ValidationReport {
            file_exists: metadata.artifact_path.exists(),
            checksum_valid: false,
            database_readable: false,
            table_count: 0,
            record_count: 0,
            timestamp: Utc::now(),
        };

        if !report.file_exists {
            warn!(backup_id, "backup artifact missing");
            self.mark_corrupted(backup_id, report, "artifact file missing")?;
            return Ok(false);
        }

        let actual = match sha256_hex(&metadata.artifact_path) {
            Ok(checksum) => checksum,
            Err(err) => {
                self.mark_corrupted(backup_id, report, &format!("checksum read failed: {err}"))?;
                return Ok(false);
            }
        };
        report.checksum_valid = actual == metadata.checksum;
        if !report.checksum_valid {
            warn!(backup_id, "backup checksum mismatch");
            self.mark_corrupted(backup_id, report, "checksum mismatch")?;
            return Ok(false);
        }

        match self.probe_artifact(&metadata.artifact_path) {
            Ok((table_count, record_count)) => {
                report.database_readable = true;
                report.table_count = table_count;
                report.record_count = record_count;
            }
            Err(err) => {
                self.mark_corrupted(backup_id, report, &format!("artifact unreadable: {err}"))?;
                return Ok(false);
            }
        }

        self.store.update(backup_id, |m| {
            m.status = BackupStatus::Validated;
            m.validation_result = Some(report.clone());
            m.error_message = None;
        })?;
        info!(
            backup_id,
            tables = report.table_count,
            records = report.record_count,
            "backup validated"
        );
        Ok(true)
    }

    /// Opens the artifact as a store in a scratch location and counts its
    /// contents. The scratch file is removed on drop, success or failure.
    fn probe_artifact(&self, artifact_path: &std::path::Path) -> CoreResult<(u64, u64)> {
        let scratch = tempfile::NamedTempFile::new()?;

        if is_compressed(artifact_path) {
            let input = File::open(artifact_path)?;
            zstd::stream::copy_decode(input, scratch.as_file())?;
            scratch.as_file().sync_all()?;
        } else {
            fs::copy(artifact_path, scratch.path())?;
        }

        let engine = FileEngine::open(scratch.path())?;
        let tables = engine.table_names()?;
        let table_count = tables.len() as u64;

        let mut record_count = 0u64;
        for table in &tables {
            match engine.count_records(table) {
                Ok(count) => record_count += count,
                Err(err) => {
                    warn!(table, %err, "skipping table during validation count");
                }
            }
        }
        Ok((table_count, record_count))
    }

    fn mark_corrupted(
        &self,
        backup_id: &str,
        report: ValidationReport,
        message: &str,
    ) -> CoreResult<()> {
        self.store.update(backup_id, |m| {
            m.status = BackupStatus::Corrupted;
            m.validation_result = Some(report.clone());
            m.error_message = Some(message.to_string());
        })?;
        Ok(())
    }
}
