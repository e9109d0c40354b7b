//! Snapshot files
//!
//! Checksummed, atomically replaced bincode images.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{GateError, Result};

/// Magic bytes at the start of every snapshot
pub const MAGIC: &[u8; 4] = b"GKVS";

/// Current snapshot format version
pub const VERSION: u16 = 1;

/// Magic (4) + version (2) + crc (4) + payload length (4)
pub const HEADER_SIZE: usize = 14;

/// Serialize `value` and atomically replace the file at `path`
pub fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let payload = bincode::serialize(value)?;
    let crc = crc32fast::hash(&payload);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path);
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_be_bytes())?;
        writer.write_all(&crc.to_be_bytes())?;
        writer.write_all(&(payload.len() as u32).to_be_bytes())?;
        writer.write_all(&payload)?;

        let file = writer.into_inner().map_err(|e| GateError::Io(e.into_error()))?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    sync_parent_dir(path);

    Ok(())
}

/// Read and verify the snapshot at `path`
///
/// Returns:
/// - `Ok(None)` if no snapshot exists
/// - `Ok(Some(value))` if the snapshot verified and decoded
/// - `Err(SnapshotCorruption)` on bad magic, version, length or checksum
pub fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if bytes.len() < HEADER_SIZE {
        return Err(GateError::SnapshotCorruption(format!(
            "{}: file too short ({} bytes)",
            path.display(),
            bytes.len()
        )));
    }

    if &bytes[0..4] != MAGIC {
        return Err(GateError::SnapshotCorruption(format!(
            "{}: bad magic",
            path.display()
        )));
    }

    let version = u16::from_be_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(GateError::SnapshotCorruption(format!(
            "{}: unsupported version {}",
            path.display(),
            version
        )));
    }

    let crc = u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
    let len = u32::from_be_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]) as usize;

    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != len {
        return Err(GateError::SnapshotCorruption(format!(
            "{}: expected {} payload bytes, found {}",
            path.display(),
            len,
            payload.len()
        )));
    }

    if crc32fast::hash(payload) != crc {
        return Err(GateError::SnapshotCorruption(format!(
            "{}: checksum mismatch",
            path.display()
        )));
    }

    let value = bincode::deserialize(payload)?;
    Ok(Some(value))
}

/// "store.snap" → "store.snap.tmp", in the same directory so rename stays atomic
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        tracing::debug!("Could not sync directory {}: {}", parent.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
