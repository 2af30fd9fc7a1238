//! Backup subsystem: creation, validation, retention, metadata.

mod manager;
mod metadata;
mod retention;
mod validator;

pub use manager::{BackupManager, BackupStatusSummary};
pub use metadata::{BackupMetadata, BackupStatus, BackupType, MetadataStore, ValidationReport};
pub use retention::{CleanupReport, RetentionManager};
pub use validator::BackupValidator;

use crate::error::CoreResult;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Appends a suffix to a path's file name, keeping the directory.
pub(crate) fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}{suffix}"))
}

/// True when the artifact at `path` is zstd-compressed.
pub(crate) fn is_compressed(path: &Path) -> bool {
    path.extension().map(|e| e == "zst").unwrap_or(false)
}

/// Hex-encoded SHA-256 over a file's bytes, computed streaming.
pub(crate) fn sha256_hex(path: &Path) -> CoreResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    Ok(hex)
}

/// Fsyncs a directory so renames and deletions within it are durable.
#[cfg(unix)]
pub(crate) fn sync_directory(path: &Path) -> CoreResult<()> {
    let dir = File::open(path)?;
    dir.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn sync_directory(_path: &Path) -> CoreResult<()> {
    // NTFS journaling covers metadata durability on Windows.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_keeps_directory_and_name() {
        let p = path_with_suffix(Path::new("/backups/store.tvb"), ".tmp");
        assert_eq!(p, PathBuf::from("/backups/store.tvb.tmp"));
    }
}
