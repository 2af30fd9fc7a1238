//! File-backed storage engine.
//!
//! The whole store is persisted as a single file:
//!
//! ```text
//! | magic "TXVF" (4) | version (2) | body (CBOR) | crc32 (4) |
//! ```
//!
//! Every successful batch rewrites the file via a temporary sibling and an
//! atomic rename, followed by a directory fsync, so a crash mid-write can
//! never leave a torn store behind. Opening verifies magic, version, and
//! checksum; a mismatch refuses to open rather than serving corrupt data.

use crate::engine::StorageEngine;
use crate::error::{StorageError, StorageResult};
use crate::memory::{TableSet, DEFAULT_BUSY_TIMEOUT};
use crate::statement::{BatchStatement, StatementOutcome};
use crate::value::{RecordId, Row};
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Magic bytes for store files.
pub const STORE_MAGIC: [u8; 4] = *b"TXVF";
/// Current store format version.
pub const STORE_VERSION: u16 = 1;
/// Header size (magic + version).
const HEADER_SIZE: usize = 4 + 2;
/// Footer size (checksum).
const FOOTER_SIZE: usize = 4;

/// CRC32 over the header and body of a store file.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

/// Encodes a table set into the store file envelope.
fn encode_store(state: &TableSet) -> StorageResult<Vec<u8>> {
    let mut data = Vec::new();
    data.extend_from_slice(&STORE_MAGIC);
    data.extend_from_slice(&STORE_VERSION.to_le_bytes());
    ciborium::into_writer(state, &mut data)
        .map_err(|e| StorageError::Codec(e.to_string()))?;
    let crc = compute_crc32(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

/// Decodes a store file envelope, verifying magic, version, and checksum.
fn decode_store(data: &[u8]) -> StorageResult<TableSet> {
    if data.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(StorageError::corrupted("store file too small"));
    }
    if data[0..4] != STORE_MAGIC {
        return Err(StorageError::corrupted("invalid store magic"));
    }
    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != STORE_VERSION {
        return Err(StorageError::corrupted(format!(
            "unsupported store version: {version}"
        )));
    }

    let checksum_offset = data.len() - FOOTER_SIZE;
    let stored = u32::from_le_bytes([
        data[checksum_offset],
        data[checksum_offset + 1],
        data[checksum_offset + 2],
        data[checksum_offset + 3],
    ]);
    let computed = compute_crc32(&data[..checksum_offset]);
    if stored != computed {
        return Err(StorageError::ChecksumMismatch {
            expected: stored,
            actual: computed,
        });
    }

    ciborium::from_reader(&data[HEADER_SIZE..checksum_offset])
        .map_err(|e| StorageError::Codec(e.to_string()))
}

/// Writes a table set directly to `path` and syncs it.
pub(crate) fn write_store_file(path: &Path, state: &TableSet) -> StorageResult<()> {
    let data = encode_store(state)?;
    let mut file = File::create(path)?;
    file.write_all(&data)?;
    file.sync_all()?;
    Ok(())
}

/// Reads and verifies a table set from `path`.
pub(crate) fn read_store_file(path: &Path) -> StorageResult<TableSet> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    decode_store(&data)
}

/// Fsyncs a directory so renames and deletions within it are durable.
#[cfg(unix)]
fn sync_directory(path: &Path) -> StorageResult<()> {
    let dir = File::open(path)?;
    dir.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> StorageResult<()> {
    // NTFS journaling covers metadata durability on Windows.
    Ok(())
}

/// A file-backed storage engine.
///
/// Semantics match [`crate::MemoryEngine`]; in addition every successful
/// batch persists the whole store atomically, and [`FileEngine::open`]
/// refuses stores that fail checksum verification.
#[derive(Debug)]
pub struct FileEngine {
    path: PathBuf,
    state: RwLock<TableSet>,
    busy_timeout: Duration,
}

impl FileEngine {
    /// Opens or creates a store at `path`.
    ///
    /// A missing or empty file opens as an empty store; the file itself is
    /// created on the first successful batch.
    ///
    /// # Errors
    ///
    /// Returns `Corrupted` or `ChecksumMismatch` when an existing file
    /// fails verification.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Opens a store with a specific write-lock wait bound.
    ///
    /// # Errors
    ///
    /// Same conditions as [`FileEngine::open`].
    pub fn open_with_busy_timeout(path: &Path, busy_timeout: Duration) -> StorageResult<Self> {
        let state = if path.exists() && fs::metadata(path)?.len() > 0 {
            read_store_file(path)?
        } else {
            TableSet::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            state: RwLock::new(state),
            busy_timeout,
        })
    }

    /// Re-reads the store file, replacing in-memory state.
    ///
    /// Required after the file has been rewritten externally, e.g. by a
    /// restore.
    ///
    /// # Errors
    ///
    /// Returns an error when the file fails verification.
    pub fn reload(&self) -> StorageResult<()> {
        let fresh = if self.path.exists() && fs::metadata(&self.path)?.len() > 0 {
            read_store_file(&self.path)?
        } else {
            TableSet::default()
        };
        *self.state.write() = fresh;
        Ok(())
    }

    fn persist(&self, state: &TableSet) -> StorageResult<()> {
        let temp_path = self.path.with_extension("tmp");
        write_store_file(&temp_path, state)?;
        fs::rename(&temp_path, &self.path)?;
        if let Some(parent) = self.path.parent() {
            sync_directory(parent)?;
        }
        Ok(())
    }
}

impl StorageEngine for FileEngine {
    fn apply_batch(&self, batch: &[BatchStatement]) -> StorageResult<Vec<StatementOutcome>> {
        let mut state = self
            .state
            .try_write_for(self.busy_timeout)
            .ok_or(StorageError::Busy {
                waited_ms: self.busy_timeout.as_millis() as u64,
            })?;

        let mut scratch = state.clone();
        let outcomes = scratch.apply_batch_statements(batch)?;

        // Persist before swapping in: a failed write leaves both the file
        // and the in-memory state untouched.
        self.persist(&scratch)?;
        *state = scratch;
        Ok(outcomes)
    }

    fn read_record(&self, table: &str, id: RecordId) -> StorageResult<Option<Row>> {
        Ok(self.state.read().read_record(table, id))
    }

    fn table_names(&self) -> StorageResult<Vec<String>> {
        Ok(self.state.read().tables.keys().cloned().collect())
    }

    fn count_records(&self, table: &str) -> StorageResult<u64> {
        let state = self.state.read();
        let entry = state
            .tables
            .get(table)
            .ok_or_else(|| StorageError::table_not_found(table))?;
        Ok(entry.rows.len() as u64)
    }

    fn snapshot_to(&self, path: &Path) -> StorageResult<()> {
        let state = self.state.read();
        write_store_file(path, &state)
    }

    fn check_integrity(&self) -> StorageResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        read_store_file(&self.path).map(|_| ())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
