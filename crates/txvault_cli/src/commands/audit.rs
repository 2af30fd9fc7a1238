//! Audit log inspection command.

use std::path::Path;
use txvault_core::AuditTrail;

/// Name of the audit log next to the store file.
const AUDIT_LOG: &str = "audit.log";

/// Prints audit entries, newest last.
pub fn run(store_path: &Path, limit: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = store_path
        .parent()
        .map(|p| p.join(AUDIT_LOG))
        .unwrap_or_else(|| AUDIT_LOG.into());

    let trail = AuditTrail::new(log_path.clone());
    let entries = trail.load_log()?;
    if entries.is_empty() {
        println!("No audit entries at {:?}", log_path);
        return Ok(());
    }

    let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
    for entry in entries.iter().skip(skip) {
        let record = entry
            .record_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "{} {} #{} {} {} record={}",
            entry.timestamp.to_rfc3339(),
            entry.transaction_id,
            entry.sequence,
            entry.kind,
            entry.table,
            record,
        );
        if let Some(old) = &entry.old_row {
            println!("    old: {}", serde_json::to_string(old)?);
        }
        if let Some(new) = &entry.new_row {
            println!("    new: {}", serde_json::to_string(new)?);
        }
    }
    Ok(())
}
