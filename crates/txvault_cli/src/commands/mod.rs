//! Command implementations.

pub mod audit;
pub mod backup;
pub mod cleanup;
pub mod health;
pub mod restore;

use std::path::Path;
use std::sync::Arc;
use txvault_core::MetadataStore;

/// Name of the metadata document within the backup directory.
const METADATA_FILE: &str = "backup_metadata.json";

/// Opens the shared metadata document for a backup directory.
pub(crate) fn open_metadata(
    backup_dir: &Path,
) -> Result<Arc<MetadataStore>, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(backup_dir)?;
    Ok(Arc::new(MetadataStore::open(
        &backup_dir.join(METADATA_FILE),
    )?))
}
