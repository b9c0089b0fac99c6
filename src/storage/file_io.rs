//! File I/O utilities with atomic writes
//!
//! Provides safe file operations that won't corrupt the settings file on
//! failure, plus the transient file list handed to the archiver.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::ArcsyncError;

/// Read JSON from a file, returning an error if file doesn't exist
pub fn read_json_required<T, P>(path: P) -> Result<T, ArcsyncError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Err(ArcsyncError::Storage(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let file = File::open(path)
        .map_err(|e| ArcsyncError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| ArcsyncError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically (write to temp, then rename)
///
/// The file is either completely written or not modified at all.
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), ArcsyncError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ArcsyncError::Storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    // Same directory as the target so the rename stays atomic
    let temp_path = path.with_extension("json.tmp");

    let file = File::create(&temp_path)
        .map_err(|e| ArcsyncError::Storage(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .map_err(|e| ArcsyncError::Storage(format!("Failed to serialize data: {}", e)))?;

    writer
        .flush()
        .map_err(|e| ArcsyncError::Storage(format!("Failed to flush data: {}", e)))?;

    writer
        .get_ref()
        .sync_all()
        .map_err(|e| ArcsyncError::Storage(format!("Failed to sync data: {}", e)))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        ArcsyncError::Storage(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

/// A file listing source paths one per line, removed when dropped
///
/// The archiver reads it via `@<list>`. Dropping the guard deletes the file on
/// every exit path, including early returns on archiver failure.
#[derive(Debug)]
pub struct FileList {
    path: PathBuf,
}

impl FileList {
    /// Write `entries` to a uniquely named list file inside `dir`
    pub fn create(dir: &Path, entries: &[PathBuf]) -> Result<Self, ArcsyncError> {
        let path = dir.join(format!("filelist-{}.tmp", uuid::Uuid::new_v4()));

        let mut contents = String::new();
        for entry in entries {
            contents.push_str(&entry.to_string_lossy());
            contents.push('\n');
        }

        fs::write(&path, contents).map_err(|e| {
            ArcsyncError::Io(format!("Failed to write file list {}: {}", path.display(), e))
        })?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileList {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove file list");
            }
        }
    }
}
