//! Backup metadata document.
//!
//! All backup bookkeeping lives in one JSON document mapping
//! `backup_id -> metadata`. Every mutation rewrites the document through a
//! temporary file and an atomic rename followed by a directory fsync, so a
//! crash mid-write can never tear it.

use crate::error::CoreResult;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Lifecycle status of a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    /// Created but not yet started.
    Pending,
    /// Snapshot in progress.
    InProgress,
    /// Artifact written and checksummed.
    Completed,
    /// Creation failed.
    Failed,
    /// Artifact verified against its checksum and opened successfully.
    Validated,
    /// Artifact missing, checksum mismatch, or unreadable.
    Corrupted,
}

impl BackupStatus {
    /// True when a restore may use this backup.
    #[must_use]
    pub fn is_restorable(&self) -> bool {
        matches!(self, BackupStatus::Completed | BackupStatus::Validated)
    }
}

impl std::fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BackupStatus::Pending => "pending",
            BackupStatus::InProgress => "in_progress",
            BackupStatus::Completed => "completed",
            BackupStatus::Failed => "failed",
            BackupStatus::Validated => "validated",
            BackupStatus::Corrupted => "corrupted",
        };
        write!(f, "{s}")
    }
}

/// Kind of backup. Only full backups exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupType {
    /// A complete copy of the store.
    #[default]
    Full,
}

/// Result of validating a backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether the artifact file exists.
    pub file_exists: bool,
    /// Whether the recomputed checksum matched the recorded one.
    pub checksum_valid: bool,
    /// Whether the artifact opened as a store.
    pub database_readable: bool,
    /// Tables found in the artifact.
    pub table_count: u64,
    /// Records counted across tables (tables that fail to count are skipped).
    pub record_count: u64,
    /// When the validation ran.
    pub timestamp: DateTime<Utc>,
}

/// Everything known about one backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Unique backup id.
    pub backup_id: String,
    /// Kind of backup.
    pub backup_type: BackupType,
    /// When the backup was taken.
    pub timestamp: DateTime<Utc>,
    /// The live store file that was backed up.
    pub source_path: PathBuf,
    /// Where the artifact lives.
    pub artifact_path: PathBuf,
    /// Artifact size in bytes.
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 over the artifact bytes.
    pub checksum: String,
    /// Lifecycle status.
    pub status: BackupStatus,
    /// Present once the backup has been validated.
    pub validation_result: Option<ValidationReport>,
    /// Present when creation or validation failed.
    pub error_message: Option<String>,
}

/// The shared, durably persisted `backup_id -> metadata` document.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, BackupMetadata>>,
}

impl MetadataStore {
    /// Opens the document at `path`, loading existing entries.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing document cannot be read or parsed.
    pub fn open(path: &Path) -> CoreResult<Self> {
        let entries = if path.exists() && fs::metadata(path)?.len() > 0 {
            let data = fs::read(path)?;
            serde_json::from_slice(&data)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    /// Inserts or replaces a backup's metadata and persists the document.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be written.
    pub fn upsert(&self, metadata: BackupMetadata) -> CoreResult<()> {
        let mut entries = self.entries.lock();
        entries.insert(metadata.backup_id.clone(), metadata);
        self.persist(&entries)
    }

    /// Mutates one backup's metadata in place and persists the document.
    ///
    /// Returns false when no backup with this id exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be written.
    pub fn update<F>(&self, backup_id: &str, mutate: F) -> CoreResult<bool>
    where
        F: FnOnce(&mut BackupMetadata),
    {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(backup_id) else {
            return Ok(false);
        };
        mutate(entry);
        self.persist(&entries)?;
        Ok(true)
    }

    /// Removes a backup's metadata and persists the document.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be written.
    pub fn remove(&self, backup_id: &str) -> CoreResult<Option<BackupMetadata>> {
        let mut entries = self.entries.lock();
        let removed = entries.remove(backup_id);
        if removed.is_some() {
            self.persist(&entries)?;
        }
        Ok(removed)
    }

    /// Returns one backup's metadata.
    #[must_use]
    pub fn get(&self, backup_id: &str) -> Option<BackupMetadata> {
        self.entries.lock().get(backup_id).cloned()
    }

    /// Returns all backups sorted by timestamp, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<BackupMetadata> {
        let mut all: Vec<BackupMetadata> = self.entries.lock().values().cloned().collect();
        all.sort_by_key(|m| m.timestamp);
        all
    }

    /// Number of tracked backups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when no backups are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Path of the document file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the document via temp-file-then-rename.
    fn persist(&self, entries: &BTreeMap<String, BackupMetadata>) -> CoreResult<()> {
        let temp_path = super::path_with_suffix(&self.path, ".tmp");
        let data = serde_json::to_vec_pretty(entries)?;

        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        if let Some(parent) = self.path.parent() {
            super::sync_directory(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(id: &str, timestamp: DateTime<Utc>) -> BackupMetadata {
        BackupMetadata {
            backup_id: id.to_string(),
            backup_type: BackupType::Full,
            timestamp,
            source_path: PathBuf::from("/data/store.tvdb"),
            artifact_path: PathBuf::from(format!("/backups/{id}.tvb")),
            size_bytes: 128,
            checksum: "deadbeef".into(),
            status: BackupStatus::Completed,
            validation_result: None,
            error_message: None,
        }
    }

    #[test]
    fn document_round_trips_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup_metadata.json");

        let store = MetadataStore::open(&path).unwrap();
        store.upsert(sample("b1", Utc::now())).unwrap();
        store.upsert(sample("b2", Utc::now())).unwrap();

        let reopened = MetadataStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get("b1").unwrap().size_bytes, 128);
    }

    #[test]
    fn update_mutates_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup_metadata.json");
        let store = MetadataStore::open(&path).unwrap();
        store.upsert(sample("b1", Utc::now())).unwrap();

        let found = store
            .update("b1", |m| {
                m.status = BackupStatus::Corrupted;
                m.error_message = Some("checksum mismatch".into());
            })
            .unwrap();
        assert!(found);
        assert_eq!(store.get("b1").unwrap().status, BackupStatus::Corrupted);

        let missing = store.update("nope", |_| {}).unwrap();
        assert!(!missing);
    }

    #[test]
    fn list_is_sorted_by_timestamp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup_metadata.json");
        let store = MetadataStore::open(&path).unwrap();

        let base = Utc::now();
        store
            .upsert(sample("newest", base + chrono::Duration::hours(2)))
            .unwrap();
        store.upsert(sample("oldest", base)).unwrap();
        store
            .upsert(sample("middle", base + chrono::Duration::hours(1)))
            .unwrap();

        let ids: Vec<String> = store.list().into_iter().map(|m| m.backup_id).collect();
        assert_eq!(ids, vec!["oldest", "middle", "newest"]);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup_metadata.json");
        let store = MetadataStore::open(&path).unwrap();
        store.upsert(sample("b1", Utc::now())).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn restorable_statuses() {
        assert!(BackupStatus::Completed.is_restorable());
        assert!(BackupStatus::Validated.is_restorable());
        assert!(!BackupStatus::Corrupted.is_restorable());
        assert!(!BackupStatus::Failed.is_restorable());
        assert!(!BackupStatus::InProgress.is_restorable());
    }
}
