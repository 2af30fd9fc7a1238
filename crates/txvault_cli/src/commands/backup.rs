//! Backup commands: create, list, validate, info, status.

use std::path::Path;
use std::sync::Arc;
use tracing::info;
use txvault_core::{
    BackupConfig, BackupManager, BackupMetadata, BackupStatusSummary, BackupValidator,
};
use txvault_storage::FileEngine;

/// Creates a full backup of the store.
pub fn create(
    store_path: &Path,
    backup_dir: &Path,
    compress: bool,
    validate: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Creating backup of {:?}", store_path);

    let engine = Arc::new(FileEngine::open(store_path)?);
    let metadata_store = super::open_metadata(backup_dir)?;
    let manager = BackupManager::new(
        engine,
        store_path,
        backup_dir,
        metadata_store,
        BackupConfig::new()
            .compress(compress)
            .validate_on_create(validate),
    );

    let metadata = manager.create_full_backup()?;

    println!("✓ Backup created successfully");
    print_metadata(&metadata);
    Ok(())
}

/// Lists all backups, oldest first.
pub fn list(backup_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let metadata_store = super::open_metadata(backup_dir)?;
    let backups = metadata_store.list();

    if backups.is_empty() {
        println!("No backups found in {:?}", backup_dir);
        return Ok(());
    }

    println!(
        "{:<40} {:<12} {:<25} {:>12}",
        "ID", "STATUS", "TIMESTAMP", "SIZE"
    );
    for metadata in backups {
        println!(
            "{:<40} {:<12} {:<25} {:>12}",
            metadata.backup_id,
            metadata.status.to_string(),
            metadata.timestamp.to_rfc3339(),
            format!("{} B", metadata.size_bytes),
        );
    }
    Ok(())
}

/// Validates one backup's integrity.
pub fn validate(backup_dir: &Path, backup_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating backup {backup_id}");

    let metadata_store = super::open_metadata(backup_dir)?;
    let validator = BackupValidator::new(metadata_store.clone());
    let is_valid = validator.validate_backup(backup_id)?;

    if is_valid {
        println!("✓ Backup is valid");
        if let Some(metadata) = metadata_store.get(backup_id) {
            print_metadata(&metadata);
        }
        Ok(())
    } else {
        println!("✗ Backup is invalid or corrupted");
        if let Some(metadata) = metadata_store.get(backup_id) {
            if let Some(message) = &metadata.error_message {
                println!("  Reason: {message}");
            }
        }
        Err("Backup validation failed".into())
    }
}

/// Shows one backup's metadata.
pub fn info(backup_dir: &Path, backup_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let metadata_store = super::open_metadata(backup_dir)?;
    let Some(metadata) = metadata_store.get(backup_id) else {
        return Err(format!("backup not found: {backup_id}").into());
    };

    println!("Backup Information");
    println!("==================");
    print_metadata(&metadata);
    Ok(())
}

/// Shows aggregate status over all backups.
pub fn status(backup_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let metadata_store = super::open_metadata(backup_dir)?;
    let backups = metadata_store.list();
    let summary = BackupStatusSummary::from_backups(&backups);

    println!("Backup Status");
    println!("=============");
    println!("  Total: {}", summary.total);
    println!("  Validated: {}", summary.validated);
    println!("  Completed: {}", summary.completed);
    println!("  Failed: {}", summary.failed);
    println!("  Corrupted: {}", summary.corrupted);
    println!("  In flight: {}", summary.in_flight);
    println!("  Total size: {} bytes", summary.total_size_bytes);
    if let Some(latest) = summary.latest_backup {
        println!("  Latest: {}", latest.to_rfc3339());
    }
    Ok(())
}

fn print_metadata(metadata: &BackupMetadata) {
    println!("  ID: {}", metadata.backup_id);
    println!("  Status: {}", metadata.status);
    println!("  Created: {}", metadata.timestamp.to_rfc3339());
    println!("  Artifact: {:?}", metadata.artifact_path);
    println!("  Size: {} bytes", metadata.size_bytes);
    println!("  SHA-256: {}", metadata.checksum);
    if let Some(report) = &metadata.validation_result {
        println!(
            "  Validation: checksum_valid={}, tables={}, records={}",
            report.checksum_valid, report.table_count, report.record_count
        );
    }
    if let Some(message) = &metadata.error_message {
        println!("  Error: {message}");
    }
}
