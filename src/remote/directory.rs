//! Mounted-directory remote store
//!
//! Treats a path (NAS share, external disk) as the remote side. Uploads are
//! copied to a temporary name and renamed so a half-written file never carries
//! an archive name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::RemoteStore;
use crate::error::{ArcsyncError, ArcsyncResult};

pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

fn remote_error(what: &str, path: &Path, e: io::Error) -> ArcsyncError {
    ArcsyncError::Remote(format!("{} {} failed: {}", what, path.display(), e))
}

impl RemoteStore for DirectoryStore {
    fn list(&mut self) -> ArcsyncResult<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| remote_error("list", &self.root, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| remote_error("list", &self.root, e))?;
            let is_file = entry
                .file_type()
                .map_err(|e| remote_error("stat", &entry.path(), e))?
                .is_file();
            if is_file {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn upload(&mut self, local: &Path, remote_name: &str) -> ArcsyncResult<()> {
        let target = self.path(remote_name);
        let partial = self.path(&format!(".{}.part", remote_name));

        fs::copy(local, &partial).map_err(|e| remote_error("upload", &target, e))?;
        fs::rename(&partial, &target).map_err(|e| {
            let _ = fs::remove_file(&partial);
            remote_error("upload", &target, e)
        })
    }

    fn download(&mut self, remote_name: &str, local: &Path) -> ArcsyncResult<()> {
        let source = self.path(remote_name);
        fs::copy(&source, local)
            .map(|_| ())
            .map_err(|e| remote_error("download", &source, e))
    }

    fn size(&mut self, remote_name: &str) -> ArcsyncResult<Option<u64>> {
        let path = self.path(remote_name);
        match fs::metadata(&path) {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(remote_error("stat", &path, e)),
        }
    }

    fn delete(&mut self, remote_name: &str) -> ArcsyncResult<()> {
        let path = self.path(remote_name);
        fs::remove_file(&path).map_err(|e| remote_error("delete", &path, e))
    }

    fn make_dir(&mut self, name: &str) -> ArcsyncResult<()> {
        let path = self.path(name);
        fs::create_dir(&path).map_err(|e| remote_error("mkdir", &path, e))
    }

    fn remove_dir(&mut self, name: &str) -> ArcsyncResult<()> {
        let path = self.path(name);
        fs::remove_dir(&path).map_err(|e| remote_error("rmdir", &path, e))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_upload_list_size_delete() {
        let local_dir = TempDir::new().unwrap();
        let remote_dir = TempDir::new().unwrap();
        let local = local_dir.path().join("F-Logs-2024-01-01-00-00-00.7z");
        fs::write(&local, vec![1u8; 128]).unwrap();

        let mut store = DirectoryStore::new(remote_dir.path());
        store.upload(&local, "F-Logs-2024-01-01-00-00-00.7z").unwrap();

        assert_eq!(store.list().unwrap(), vec!["F-Logs-2024-01-01-00-00-00.7z"]);
        assert_eq!(store.size("F-Logs-2024-01-01-00-00-00.7z").unwrap(), Some(128));

        store.delete("F-Logs-2024-01-01-00-00-00.7z").unwrap();
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.size("F-Logs-2024-01-01-00-00-00.7z").unwrap(), None);
    }

    #[test]
    fn test_download() {
        let local_dir = TempDir::new().unwrap();
        let remote_dir = TempDir::new().unwrap();
        fs::write(remote_dir.path().join("a.7z"), b"abc").unwrap();

        let mut store = DirectoryStore::new(remote_dir.path());
        let target = local_dir.path().join("a.7z");
        store.download("a.7z", &target).unwrap();
        assert_eq!(fs::read(target).unwrap(), b"abc");
    }

    #[test]
    fn test_directories_are_not_listed() {
        let remote_dir = TempDir::new().unwrap();
        let mut store = DirectoryStore::new(remote_dir.path());
        store.make_dir("nested").unwrap();
        assert!(store.list().unwrap().is_empty());
        store.remove_dir("nested").unwrap();
        assert!(!remote_dir.path().join("nested").exists());
    }

    #[test]
    fn test_missing_root_is_remote_error() {
        let mut store = DirectoryStore::new("/nonexistent/arcsync-remote");
        assert!(store.list().unwrap_err().is_remote());
    }
}
