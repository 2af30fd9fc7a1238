//! Retention cleanup command.

use std::path::Path;
use txvault_core::{RetentionManager, RetentionPolicy};

/// Prunes old backups by age and count.
pub fn run(
    backup_dir: &Path,
    max_age_days: i64,
    max_count: usize,
    retain_latest: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let metadata_store = super::open_metadata(backup_dir)?;
    let retention = RetentionManager::new(
        metadata_store,
        backup_dir,
        RetentionPolicy::new()
            .max_age_days(max_age_days)
            .max_count(max_count)
            .retain_latest(retain_latest),
    );

    let report = retention.cleanup_old_backups()?;

    println!("✓ Cleanup finished");
    println!("  Removed: {}", report.removed.len());
    for backup_id in &report.removed {
        println!("    - {backup_id}");
    }
    println!("  Retained: {}", report.retained);
    Ok(())
}
