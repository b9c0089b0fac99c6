//! Backup and listing commands

use crate::backup::{BackupOrchestrator, RunReport};
use crate::config::{ArcsyncPaths, Settings};
use crate::display::format_archive_list;
use crate::error::ArcsyncResult;
use crate::logging::Transcript;
use crate::storage::LocalArchiveDir;

/// Perform one backup run with the persisted settings
pub fn run_backup(
    settings: &Settings,
    paths: &ArcsyncPaths,
    force_full: bool,
    sync: bool,
    transcript: &Transcript,
) -> RunReport {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        jobs = settings.jobs.len(),
        local = %settings.local_backup_dir.display(),
        "Starting backup"
    );
    if settings.jobs.is_empty() {
        tracing::warn!("No backup jobs configured in {}", paths.settings_file().display());
    }

    BackupOrchestrator::from_settings(settings, paths, sync).run(force_full, transcript)
}

/// Print the local archive table
pub fn list_archives(settings: &Settings) -> ArcsyncResult<()> {
    let archives = LocalArchiveDir::new(&settings.local_backup_dir).list_all()?;
    println!("Local archives in {}", settings.local_backup_dir.display());
    println!();
    println!("{}", format_archive_list(&archives));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackupJob;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_run_without_jobs_succeeds() {
        let temp = TempDir::new().unwrap();
        let paths = ArcsyncPaths::with_base_dir(temp.path().to_path_buf());
        let settings = Settings {
            local_backup_dir: temp.path().join("archives"),
            ..Settings::default()
        };

        let report = run_backup(&settings, &paths, false, true, &Transcript::new());
        assert!(report.success());
        assert!(report.completed.is_empty());
    }

    #[test]
    fn test_missing_archiver_fails_job() {
        let temp = TempDir::new().unwrap();
        let paths = ArcsyncPaths::with_base_dir(temp.path().to_path_buf());
        let settings = Settings {
            archiver_path: PathBuf::from("/nonexistent/7z"),
            local_backup_dir: temp.path().join("archives"),
            jobs: vec![BackupJob {
                name: "Logs".into(),
                source_paths: vec![temp.path().to_path_buf()],
                max_full_age_days: 20.0,
                retain_incremental_count: 3,
            }],
            ..Settings::default()
        };

        let report = run_backup(&settings, &paths, false, false, &Transcript::new());
        assert!(!report.success());
        assert_eq!(report.failures[0].job, "Logs");
        assert!(LocalArchiveDir::new(temp.path().join("archives"))
            .list_all()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_list_archives_on_missing_directory() {
        let temp = TempDir::new().unwrap();
        let settings = Settings {
            local_backup_dir: temp.path().join("nothing-here"),
            ..Settings::default()
        };
        list_archives(&settings).unwrap();
    }
}
