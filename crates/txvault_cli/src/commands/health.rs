//! Health probe and disaster recovery commands.

use std::path::Path;
use txvault_core::RecoveryCoordinator;

/// Probes the live store and prints a health report.
pub fn run(store_path: &Path, backup_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let metadata_store = super::open_metadata(backup_dir)?;
    let recovery = RecoveryCoordinator::new(store_path, backup_dir, metadata_store);
    let report = recovery.assess_database_health();

    println!("Store Health");
    println!("============");
    println!("  Accessible: {}", report.database_accessible);
    println!("  Corruption detected: {}", report.corruption_detected);
    println!("  Recovery needed: {}", report.recovery_needed);
    if let Some(error) = &report.error {
        println!("  Error: {error}");
    }

    if report.recovery_needed {
        Err("Store needs recovery".into())
    } else {
        println!("✓ Store is healthy");
        Ok(())
    }
}

/// Runs automated disaster recovery.
pub fn disaster_recovery(
    store_path: &Path,
    backup_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let metadata_store = super::open_metadata(backup_dir)?;
    let recovery = RecoveryCoordinator::new(store_path, backup_dir, metadata_store);

    if recovery.initiate_disaster_recovery()? {
        println!("✓ Disaster recovery succeeded");
        Ok(())
    } else {
        println!("✗ Disaster recovery exhausted all backup candidates");
        Err("Disaster recovery failed".into())
    }
}
