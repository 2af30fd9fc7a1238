//! Byte-level file damage helpers.

use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Flips every bit of the byte at `offset`.
///
/// # Errors
///
/// Returns an error when the file cannot be opened or is shorter than
/// `offset + 1`.
pub fn flip_byte(path: &Path, offset: u64) -> io::Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte)?;
    byte[0] ^= 0xFF;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&byte)?;
    file.sync_all()?;
    Ok(())
}

/// Cuts the file down to `len` bytes.
///
/// # Errors
///
/// Returns an error when the file cannot be opened or truncated.
pub fn truncate_file(path: &Path, len: u64) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    file.sync_all()?;
    Ok(())
}

/// Replaces the file's contents entirely.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn overwrite_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::BackupSite;
    use txvault_core::BackupStatus;

    #[test]
    fn one_flipped_byte_corrupts_a_completed_backup() {
        let site = BackupSite::seeded(&["ada", "bob"]);
        let backup = site.manager.create_full_backup().unwrap();
        assert_eq!(backup.status, BackupStatus::Validated);

        // Flip one byte in the middle of the artifact.
        let offset = backup.size_bytes / 2;
        flip_byte(&backup.artifact_path, offset).unwrap();

        assert!(!site.validator.validate_backup(&backup.backup_id).unwrap());
        let status = site.metadata.get(&backup.backup_id).unwrap().status;
        assert_eq!(status, BackupStatus::Corrupted);
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(8))]

        #[test]
        fn any_flipped_byte_is_caught_by_validation(fraction in 0.0f64..1.0) {
            let site = BackupSite::seeded(&["ada"]);
            let backup = site.manager.create_full_backup().unwrap();

            let offset = ((backup.size_bytes.saturating_sub(1)) as f64 * fraction) as u64;
            flip_byte(&backup.artifact_path, offset).unwrap();

            proptest::prop_assert!(!site.validator.validate_backup(&backup.backup_id).unwrap());
        }
    }

    #[test]
    fn truncated_store_file_fails_health_check() {
        let site = BackupSite::seeded(&["ada"]);
        let live = site.live_path.clone();
        let len = std::fs::metadata(&live).unwrap().len();
        truncate_file(&live, len / 2).unwrap();

        let report = site.recovery.assess_database_health();
        assert!(report.recovery_needed);
    }

    #[test]
    fn overwritten_store_is_inaccessible() {
        let site = BackupSite::seeded(&["ada"]);
        overwrite_file(&site.live_path, b"not a store").unwrap();

        let report = site.recovery.assess_database_health();
        assert!(report.recovery_needed);
        assert!(!report.database_accessible || report.corruption_detected);
    }
}
