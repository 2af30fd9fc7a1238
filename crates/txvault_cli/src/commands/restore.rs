//! Restore and point-in-time recovery commands.

use chrono::DateTime;
use std::path::Path;
use tracing::info;
use txvault_core::RecoveryCoordinator;

/// Restores one backup onto the live store or an explicit target.
pub fn run(
    store_path: &Path,
    backup_dir: &Path,
    backup_id: &str,
    target: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Restoring backup {backup_id}");

    let metadata_store = super::open_metadata(backup_dir)?;
    let recovery = RecoveryCoordinator::new(store_path, backup_dir, metadata_store);
    recovery.restore_from_backup(backup_id, target)?;

    println!("✓ Backup restored successfully");
    println!("  Backup: {backup_id}");
    println!("  Target: {:?}", target.unwrap_or(store_path));
    Ok(())
}

/// Restores to the most recent backup at or before a timestamp.
pub fn point_in_time(
    store_path: &Path,
    backup_dir: &Path,
    timestamp: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| format!("invalid timestamp '{timestamp}': {e}"))?
        .with_timezone(&chrono::Utc);

    let metadata_store = super::open_metadata(backup_dir)?;
    let recovery = RecoveryCoordinator::new(store_path, backup_dir, metadata_store);

    match recovery.point_in_time_recovery(target)? {
        Some(backup_id) => {
            println!("✓ Restored to backup {backup_id}");
            Ok(())
        }
        None => {
            println!("✗ No backup found at or before {timestamp}");
            Err("No backup qualifies for the requested point in time".into())
        }
    }
}
