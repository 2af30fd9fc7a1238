//! Maintenance lock for backup-directory operations.
//!
//! Backup creation, retention cleanup, restore, and disaster recovery all
//! mutate the same artifacts and metadata document. Each of them holds this
//! exclusive advisory lock for its duration, so those operations are
//! mutually exclusive across threads and across processes.

use crate::error::CoreResult;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

/// Lock file name within the backup directory.
const LOCK_FILE: &str = "LOCK";

/// An exclusive advisory lock on a backup directory.
///
/// The lock is held for the lifetime of the value and released on drop.
#[derive(Debug)]
pub struct MaintenanceLock {
    _file: File,
}

impl MaintenanceLock {
    /// Acquires the lock, blocking until it is available.
    ///
    /// Creates the backup directory and its LOCK file if needed.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory or lock file cannot be created,
    /// or the lock operation itself fails.
    pub fn acquire(backup_dir: &Path) -> CoreResult<Self> {
        fs::create_dir_all(backup_dir)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(backup_dir.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }
}
