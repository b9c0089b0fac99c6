//! Local-to-remote archive reconciliation
//!
//! The local backup directory is the source of truth. A pass makes the remote
//! folder's archive names equal the local ones: remote archives with no local
//! file of the same name (case-insensitive) are deleted first, then local
//! archives that are missing remotely, or whose remote size does not match,
//! are uploaded.
//!
//! A pass is all-or-abort. The first delete, upload or listing that is still
//! failing after retries ends the pass with an error; nothing after it runs.
//! Because deletes only ever target names absent locally, an aborted pass
//! never leaves a remote archive the local side does not have, beyond ones
//! that were already there.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::archive::naming::is_archive_name;
use crate::display::{format_duration, format_rate, format_size};
use crate::error::{ArcsyncError, ArcsyncResult};
use crate::remote::{RemoteSize, RemoteStore, RetryingStore};
use crate::storage::SyncFile;

/// What to do with one local archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalAction {
    /// No remote file of this name
    Upload,
    /// A remote file with this name exists; compare sizes if enabled
    Verify { remote_name: String },
}

/// The set difference between a local archive set and a remote listing
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan {
    /// Remote archive names with no local counterpart
    pub delete_remote: Vec<String>,
    pub local: Vec<(SyncFile, LocalAction)>,
}

/// Keep only names that follow the archive naming convention
pub fn filter_listing(listing: Vec<String>) -> Vec<String> {
    listing.into_iter().filter(|n| is_archive_name(n)).collect()
}

/// Compare local archives against a remote listing, ignoring case
pub fn plan_reconciliation(local: &[SyncFile], remote_listing: &[String]) -> ReconcilePlan {
    let local_names: HashSet<String> = local.iter().map(|f| f.file_name().to_lowercase()).collect();

    let delete_remote = remote_listing
        .iter()
        .filter(|name| !local_names.contains(&name.to_lowercase()))
        .cloned()
        .collect();

    let local = local
        .iter()
        .map(|file| {
            let local_name = file.file_name();
            let action = remote_listing
                .iter()
                .find(|remote| remote.eq_ignore_ascii_case(&local_name))
                .map(|remote| LocalAction::Verify {
                    remote_name: remote.clone(),
                })
                .unwrap_or(LocalAction::Upload);
            (file.clone(), action)
        })
        .collect();

    ReconcilePlan {
        delete_remote,
        local,
    }
}

/// What a completed pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub uploaded: Vec<String>,
    pub deleted_remote: Vec<String>,
    /// Archives already present remotely and left alone
    pub skipped: Vec<String>,
    pub bytes_uploaded: u64,
    pub elapsed: Duration,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.uploaded.is_empty() && self.deleted_remote.is_empty()
    }
}

/// Drives a remote store to match the local archive set
pub struct ReconciliationEngine<'a, S: RemoteStore> {
    store: &'a mut RetryingStore<S>,
    verify_sizes: bool,
}

impl<'a, S: RemoteStore> ReconciliationEngine<'a, S> {
    pub fn new(store: &'a mut RetryingStore<S>, verify_sizes: bool) -> Self {
        Self {
            store,
            verify_sizes,
        }
    }

    /// List the remote folder, then reconcile against that snapshot
    pub fn run(&mut self, local: &[SyncFile]) -> ArcsyncResult<ReconcileReport> {
        tracing::info!("Starting remote sync: {}", self.store.describe());

        let listing = self.store.list().ok_or_else(|| {
            ArcsyncError::Remote(format!("Could not list {}", self.store.describe()))
        })?;

        self.reconcile(local, &filter_listing(listing))
    }

    /// Reconcile `local` against a point-in-time `remote_listing`
    pub fn reconcile(&mut self, local: &[SyncFile], remote_listing: &[String]) -> ArcsyncResult<ReconcileReport> {
        let started = Instant::now();
        let plan = plan_reconciliation(local, remote_listing);
        let mut report = ReconcileReport::default();

        for name in &plan.delete_remote {
            tracing::info!("Deleting remote: {}", name);
            if !self.store.delete(name) {
                return Err(ArcsyncError::Remote(format!("Delete failed: {}", name)));
            }
            report.deleted_remote.push(name.clone());
        }

        for (file, action) in &plan.local {
            let name = file.file_name();
            if !self.needs_upload(file, action) {
                tracing::debug!("Remote copy is current: {}", name);
                report.skipped.push(name);
                continue;
            }

            let upload_started = Instant::now();
            if !self.store.upload(&file.path, &name) {
                return Err(ArcsyncError::Remote(format!("Upload failed: {}", name)));
            }
            let elapsed = upload_started.elapsed();

            tracing::info!(
                "Upload of: {} ({}) completed in: {} ({})",
                name,
                format_size(file.size),
                format_duration(elapsed),
                format_rate(file.size, elapsed)
            );
            report.bytes_uploaded += file.size;
            report.uploaded.push(name);
        }

        report.elapsed = started.elapsed();
        tracing::info!(
            uploaded = report.uploaded.len(),
            deleted = report.deleted_remote.len(),
            skipped = report.skipped.len(),
            "Remote sync finished in {} ({} uploaded, {})",
            format_duration(report.elapsed),
            format_size(report.bytes_uploaded),
            format_rate(report.bytes_uploaded, report.elapsed)
        );

        Ok(report)
    }

    fn needs_upload(&mut self, file: &SyncFile, action: &LocalAction) -> bool {
        let remote_name = match action {
            LocalAction::Upload => {
                tracing::info!(
                    "File: {} ({}) does not exist on remote. Starting upload.",
                    file.file_name(),
                    format_size(file.size)
                );
                return true;
            }
            LocalAction::Verify { remote_name } => remote_name,
        };

        if !self.verify_sizes {
            return false;
        }

        match self.store.size(remote_name) {
            RemoteSize::Known(bytes) if bytes == file.size => false,
            RemoteSize::Known(bytes) => {
                tracing::info!(
                    "File: {} ({}) size does not match remote size ({}).",
                    file.file_name(),
                    format_size(file.size),
                    format_size(bytes)
                );
                true
            }
            RemoteSize::Missing | RemoteSize::Unknown => {
                tracing::info!(
                    "File: {} ({}) remote size unknown. Uploading again.",
                    file.file_name(),
                    format_size(file.size)
                );
                true
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::remote::RetryPolicy;
    use std::collections::{BTreeMap, HashSet};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// In-memory remote folder with per-name failure injection
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub files: BTreeMap<String, u64>,
        pub fail_list: bool,
        pub fail_size: HashSet<String>,
        pub fail_upload: HashSet<String>,
        pub fail_delete: HashSet<String>,
        pub uploads: Vec<String>,
        pub deletes: Vec<String>,
    }

    impl MemoryStore {
        pub fn with_files(files: &[(&str, u64)]) -> Self {
            Self {
                files: files.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
                ..Self::default()
            }
        }

        fn fail(what: &str) -> ArcsyncError {
            ArcsyncError::Remote(format!("{} refused", what))
        }
    }

    impl RemoteStore for MemoryStore {
        fn list(&mut self) -> ArcsyncResult<Vec<String>> {
            if self.fail_list {
                return Err(Self::fail("list"));
            }
            Ok(self.files.keys().cloned().collect())
        }

        fn upload(&mut self, local: &Path, remote_name: &str) -> ArcsyncResult<()> {
            if self.fail_upload.contains(remote_name) {
                return Err(Self::fail("upload"));
            }
            let size = fs::metadata(local)?.len();
            self.files.insert(remote_name.to_string(), size);
            self.uploads.push(remote_name.to_string());
            Ok(())
        }

        fn download(&mut self, _: &str, _: &Path) -> ArcsyncResult<()> {
            Err(Self::fail("download"))
        }

        fn size(&mut self, remote_name: &str) -> ArcsyncResult<Option<u64>> {
            if self.fail_size.contains(remote_name) {
                return Err(Self::fail("size"));
            }
            Ok(self.files.get(remote_name).copied())
        }

        fn delete(&mut self, remote_name: &str) -> ArcsyncResult<()> {
            if self.fail_delete.contains(remote_name) {
                return Err(Self::fail("delete"));
            }
            self.files.remove(remote_name);
            self.deletes.push(remote_name.to_string());
            Ok(())
        }

        fn make_dir(&mut self, _: &str) -> ArcsyncResult<()> {
            Ok(())
        }

        fn remove_dir(&mut self, _: &str) -> ArcsyncResult<()> {
            Ok(())
        }

        fn describe(&self) -> String {
            "memory".into()
        }
    }

    pub(crate) fn quick() -> RetryPolicy {
        RetryPolicy::new(2, Duration::ZERO)
    }

    fn local_file(dir: &TempDir, name: &str, size: usize) -> SyncFile {
        let path = dir.path().join(name);
        fs::write(&path, vec![0u8; size]).unwrap();
        SyncFile {
            path,
            size: size as u64,
        }
    }

    const A: &str = "F-Logs-2024-01-01-00-00-00.7z";
    const B: &str = "I-Logs-2024-01-02-00-00-00.7z";
    const C: &str = "I-Logs-2024-01-03-00-00-00.7z";
    const OLD: &str = "F-Logs-2023-12-01-00-00-00.7z";

    #[test]
    fn test_plan_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let local = vec![local_file(&dir, A, 1)];
        let remote = vec![A.to_lowercase(), OLD.to_string()];

        let plan = plan_reconciliation(&local, &remote);
        assert_eq!(plan.delete_remote, vec![OLD.to_string()]);
        assert_eq!(
            plan.local[0].1,
            LocalAction::Verify {
                remote_name: A.to_lowercase()
            }
        );
    }

    #[test]
    fn test_filter_listing() {
        let listing = vec![A.to_string(), "readme.txt".into(), ".F-x.7z.part".into()];
        assert_eq!(filter_listing(listing), vec![A.to_string()]);
    }

    #[test]
    fn test_round_trip_makes_remote_equal_local() {
        let dir = TempDir::new().unwrap();
        let local = vec![local_file(&dir, A, 10), local_file(&dir, B, 5), local_file(&dir, C, 7)];
        let mut store = RetryingStore::new(MemoryStore::with_files(&[(B, 5), (OLD, 99)]), quick());

        let report = ReconciliationEngine::new(&mut store, true).run(&local).unwrap();

        let mut uploaded = report.uploaded.clone();
        uploaded.sort();
        assert_eq!(uploaded, vec![A.to_string(), C.to_string()]);
        assert_eq!(report.deleted_remote, vec![OLD.to_string()]);
        assert_eq!(report.skipped, vec![B.to_string()]);
        assert_eq!(report.bytes_uploaded, 17);

        let remote: Vec<_> = store.inner().files.keys().cloned().collect();
        assert_eq!(remote, vec![A.to_string(), B.to_string(), C.to_string()]);
    }

    #[test]
    fn test_second_run_is_noop() {
        let dir = TempDir::new().unwrap();
        let local = vec![local_file(&dir, A, 10), local_file(&dir, B, 5)];
        let mut store = RetryingStore::new(MemoryStore::with_files(&[(OLD, 1)]), quick());

        ReconciliationEngine::new(&mut store, true).run(&local).unwrap();
        let second = ReconciliationEngine::new(&mut store, true).run(&local).unwrap();

        assert!(second.is_noop());
        assert_eq!(second.skipped.len(), 2);
    }

    #[test]
    fn test_size_mismatch_reuploads() {
        let dir = TempDir::new().unwrap();
        let local = vec![local_file(&dir, A, 10)];
        let mut store = RetryingStore::new(MemoryStore::with_files(&[(A, 3)]), quick());

        let report = ReconciliationEngine::new(&mut store, true).run(&local).unwrap();
        assert_eq!(report.uploaded, vec![A.to_string()]);
        assert_eq!(store.inner().files[A], 10);
    }

    #[test]
    fn test_unknown_size_reuploads() {
        let dir = TempDir::new().unwrap();
        let local = vec![local_file(&dir, A, 10)];
        let mut memory = MemoryStore::with_files(&[(A, 10)]);
        memory.fail_size.insert(A.to_string());
        let mut store = RetryingStore::new(memory, quick());

        let report = ReconciliationEngine::new(&mut store, true).run(&local).unwrap();
        assert_eq!(report.uploaded, vec![A.to_string()]);
    }

    #[test]
    fn test_without_size_verification_existing_names_are_skipped() {
        let dir = TempDir::new().unwrap();
        let local = vec![local_file(&dir, A, 10)];
        let mut store = RetryingStore::new(MemoryStore::with_files(&[(A, 3)]), quick());

        let report = ReconciliationEngine::new(&mut store, false).run(&local).unwrap();
        assert!(report.is_noop());
        assert_eq!(store.inner().files[A], 3);
    }

    #[test]
    fn test_delete_failure_aborts_before_uploads() {
        let dir = TempDir::new().unwrap();
        let local = vec![local_file(&dir, A, 10)];
        let mut memory = MemoryStore::with_files(&[(OLD, 1)]);
        memory.fail_delete.insert(OLD.to_string());
        let mut store = RetryingStore::new(memory, quick());

        let err = ReconciliationEngine::new(&mut store, true).run(&local).unwrap_err();
        assert!(err.is_remote());
        assert!(store.inner().uploads.is_empty());
    }

    #[test]
    fn test_upload_failure_aborts_pass() {
        let dir = TempDir::new().unwrap();
        let local = vec![local_file(&dir, A, 10), local_file(&dir, B, 5)];
        let mut memory = MemoryStore::default();
        memory.fail_upload.insert(A.to_string());
        memory.fail_upload.insert(B.to_string());
        let mut store = RetryingStore::new(memory, quick());

        let err = ReconciliationEngine::new(&mut store, true).run(&local).unwrap_err();
        assert!(err.to_string().contains("Upload failed"));
        assert_eq!(store.inner().uploads.len(), 0);
    }

    #[test]
    fn test_list_failure_aborts_pass() {
        let mut memory = MemoryStore::default();
        memory.fail_list = true;
        let mut store = RetryingStore::new(memory, quick());

        assert!(ReconciliationEngine::new(&mut store, true).run(&[]).is_err());
    }

    #[test]
    fn test_foreign_remote_files_are_left_alone() {
        let mut store = RetryingStore::new(MemoryStore::with_files(&[("notes.txt", 1)]), quick());

        let report = ReconciliationEngine::new(&mut store, true).run(&[]).unwrap();
        assert!(report.is_noop());
        assert!(store.inner().files.contains_key("notes.txt"));
    }

    #[test]
    fn test_archive_without_timestamp_present_on_both_sides_is_kept() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("F-manual.7z"), vec![0u8; 4]).unwrap();
        let local = crate::storage::LocalArchiveDir::new(dir.path())
            .list_sync_candidates()
            .unwrap();
        let mut store = RetryingStore::new(MemoryStore::with_files(&[("F-manual.7z", 4)]), quick());

        let report = ReconciliationEngine::new(&mut store, true).run(&local).unwrap();
        assert!(report.deleted_remote.is_empty());
        assert_eq!(report.skipped, vec!["F-manual.7z".to_string()]);
        assert!(store.inner().files.contains_key("F-manual.7z"));
    }

    #[test]
    fn test_archive_without_timestamp_is_uploaded() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("I-manual.7z"), vec![0u8; 6]).unwrap();
        let local = crate::storage::LocalArchiveDir::new(dir.path())
            .list_sync_candidates()
            .unwrap();
        let mut store = RetryingStore::new(MemoryStore::default(), quick());

        let report = ReconciliationEngine::new(&mut store, true).run(&local).unwrap();
        assert_eq!(report.uploaded, vec!["I-manual.7z".to_string()]);
        assert_eq!(store.inner().files["I-manual.7z"], 6);
    }
}
