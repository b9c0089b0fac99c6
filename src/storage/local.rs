//! The local archive directory
//!
//! One flat directory holds every job's archives. arcsync assumes it is the
//! only writer, so no locking is done here.

use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::naming::{is_archive_name, ArchiveFile, ArchiveKind, ArchiveName};
use crate::error::{ArcsyncError, ArcsyncResult};

/// A local file taking part in remote reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFile {
    pub path: PathBuf,
    pub size: u64,
}

impl SyncFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Lists and deletes archives in the local backup directory
#[derive(Debug, Clone)]
pub struct LocalArchiveDir {
    root: PathBuf,
}

impl LocalArchiveDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a named archive would occupy
    pub fn path_for(&self, name: &ArchiveName) -> PathBuf {
        self.root.join(name.file_name())
    }

    /// Create the directory if it does not exist yet
    pub fn ensure_exists(&self) -> ArcsyncResult<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            ArcsyncError::Storage(format!(
                "Failed to create backup directory {}: {}",
                self.root.display(),
                e
            ))
        })
    }

    /// List every archive following the naming convention
    ///
    /// Files with other names are ignored. A missing directory lists as empty.
    /// Anything occupying an archive name is listed, so a directory squatting
    /// on one makes pruning fail instead of being skipped forever.
    pub fn list_all(&self) -> ArcsyncResult<Vec<ArchiveFile>> {
        let mut archives = Vec::new();
        for (path, metadata) in self.scan()? {
            let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(ArchiveName::parse)
            else {
                continue;
            };
            archives.push(ArchiveFile {
                path,
                name,
                size: metadata.len(),
            });
        }
        Ok(archives)
    }

    /// List every file reconciliation treats as an archive
    ///
    /// Uses the same name check remote listings are filtered with, so a file
    /// present on both sides is never seen as remote-only.
    pub fn list_sync_candidates(&self) -> ArcsyncResult<Vec<SyncFile>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|(path, metadata)| {
                metadata.is_file() && path.file_name().and_then(|n| n.to_str()).is_some_and(is_archive_name)
            })
            .map(|(path, metadata)| SyncFile {
                path,
                size: metadata.len(),
            })
            .collect())
    }

    fn scan(&self) -> ArcsyncResult<Vec<(PathBuf, fs::Metadata)>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|e| {
            ArcsyncError::Storage(format!(
                "Failed to read backup directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                ArcsyncError::Storage(format!("Failed to read directory entry: {}", e))
            })?;
            let path = entry.path();
            let metadata = entry.metadata().map_err(|e| {
                ArcsyncError::Storage(format!("Failed to stat {}: {}", path.display(), e))
            })?;
            found.push((path, metadata));
        }

        Ok(found)
    }

    /// List one job's archives of the given kind
    pub fn list_job(&self, job: &str, kind: ArchiveKind) -> ArcsyncResult<Vec<ArchiveFile>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|a| a.name.kind == kind && a.name.belongs_to(job))
            .collect())
    }

    /// Delete one archive
    pub fn delete(&self, path: &Path) -> ArcsyncResult<()> {
        fs::remove_file(path).map_err(|e| {
            ArcsyncError::Storage(format!("Failed to delete {}: {}", path.display(), e))
        })
    }
}
