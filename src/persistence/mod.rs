//! Snapshot persistence.
//!
//! The store can be written to and read back from a single JSON file. Saves
//! are best effort: a periodic [`SnapshotSaver`] task plus one final save on
//! shutdown. There is no write-ahead log, so writes made after the last save
//! are lost on a crash.
//!
//! Saving writes `<path>.tmp` first and renames it over `path`, so a crash in
//! the middle of a save leaves the previous snapshot intact.

pub mod saver;
pub mod snapshot;

pub use saver::{SnapshotConfig, SnapshotSaver};
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};

use crate::storage::StorageEngine;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from reading or writing snapshot files.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Atomically writes `snapshot` to `path`.
pub fn save(path: &Path, snapshot: &Snapshot) -> Result<(), PersistError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = tmp_path(path);
    let file = File::create(&tmp)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, snapshot)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    drop(writer);

    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), keys = snapshot.key_count(), "Snapshot written");
    Ok(())
}

/// `<path>.tmp`, keeping the full file name so it never equals `path`.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Reads a snapshot from `path`.
///
/// A missing file is a first run, not an error: it yields an empty snapshot.
pub fn load(path: &Path) -> Result<Snapshot, PersistError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Snapshot::default()),
        Err(e) => return Err(e.into()),
    };

    let snapshot: Snapshot = serde_json::from_slice(&data)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(PersistError::UnsupportedVersion {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    Ok(snapshot)
}

/// Captures the engine and saves it. Returns the number of keys written.
pub fn save_engine(engine: &StorageEngine, path: &Path) -> Result<usize, PersistError> {
    let snapshot = engine.snapshot();
    save(path, &snapshot)?;
    Ok(snapshot.key_count())
}
