//! Backup run sequencing
//!
//! A run processes every job in order (plan, archive, prune), then
//! reconciles the whole local directory with the remote store once, then
//! reports. A failing job is recorded and the next job still runs; a failing
//! reconciliation pass ends the pass. Either marks the run as failed, and the
//! notification is attempted regardless.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;

use super::planner::{Decision, RetentionPlanner};
use crate::archive::naming::{local_now, ArchiveKind};
use crate::archive::tool::{ArchiveOptions, ArchiveTool, SevenZip};
use crate::config::{reveal_secret, ArcsyncPaths, BackupJob, Settings};
use crate::display::{format_duration, format_size};
use crate::error::{ArcsyncError, ArcsyncResult};
use crate::logging::Transcript;
use crate::notify::{self, MailNotifier, Notifier};
use crate::remote::{open_store, RemoteStore, RetryingStore};
use crate::storage::{FileList, LocalArchiveDir};
use crate::sync::{ReconcileReport, ReconciliationEngine};
use crate::system::{self, InhibitGuard};

/// A job that was aborted, and why
#[derive(Debug)]
pub struct JobFailure {
    pub job: String,
    pub error: ArcsyncError,
}

/// A job that produced its archive
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job: String,
    pub decision: Decision,
    pub archive_size: u64,
    pub deleted: Vec<PathBuf>,
    pub elapsed: Duration,
}

/// Everything a run did
#[derive(Debug, Default)]
pub struct RunReport {
    pub completed: Vec<JobOutcome>,
    pub failures: Vec<JobFailure>,
    /// `None` when reconciliation was not configured for this run
    pub sync: Option<ReconcileReport>,
    pub sync_error: Option<ArcsyncError>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.failures.is_empty() && self.sync_error.is_none()
    }
}

struct RemoteTarget {
    store: RetryingStore<Box<dyn RemoteStore>>,
    verify_sizes: bool,
}

struct Notification {
    notifier: Box<dyn Notifier>,
    on_success: bool,
    host: String,
    attachment: Option<PathBuf>,
}

/// Runs every configured job, then syncs and notifies
pub struct BackupOrchestrator {
    local: LocalArchiveDir,
    jobs: Vec<BackupJob>,
    archiver: Box<dyn ArchiveTool>,
    verify_full_archive: bool,
    remote: Option<RemoteTarget>,
    notification: Option<Notification>,
    clock: fn() -> NaiveDateTime,
}

impl BackupOrchestrator {
    pub fn new(local: LocalArchiveDir, jobs: Vec<BackupJob>, archiver: Box<dyn ArchiveTool>) -> Self {
        Self {
            local,
            jobs,
            archiver,
            verify_full_archive: false,
            remote: None,
            notification: None,
            clock: local_now,
        }
    }

    /// Wire up the archiver, remote store and mailer described by `settings`
    ///
    /// `sync` turns reconciliation off for this run even when configured.
    pub fn from_settings(settings: &Settings, paths: &ArcsyncPaths, sync: bool) -> Self {
        let options = ArchiveOptions {
            password: reveal_secret(settings.archive_password.as_ref(), "archive password"),
            compression_level: settings.compression_level,
            encrypt_headers: settings.encrypt_headers,
            timeout: Duration::from_secs(settings.archive_timeout_minutes.saturating_mul(60)),
        };
        let archiver = SevenZip::new(&settings.archiver_path, options);

        let mut orchestrator = Self::new(
            LocalArchiveDir::new(&settings.local_backup_dir),
            settings.jobs.clone(),
            Box::new(archiver),
        )
        .verify_full_archive(settings.verify_full_archive);

        if settings.sync_remote && sync {
            orchestrator = orchestrator.with_remote(open_store(&settings.remote), settings.remote.verify_sizes);
        } else if settings.sync_remote {
            tracing::info!("Remote sync skipped for this run");
        }

        if settings.send_email {
            orchestrator = orchestrator.with_notifier(
                Box::new(MailNotifier::new(settings.email.clone())),
                settings.send_email_on_success,
                system::hostname(),
                Some(paths.log_file()),
            );
        }

        orchestrator
    }

    /// Test each full archive before extending it
    pub fn verify_full_archive(mut self, enabled: bool) -> Self {
        self.verify_full_archive = enabled;
        self
    }

    pub fn with_remote(mut self, store: RetryingStore<Box<dyn RemoteStore>>, verify_sizes: bool) -> Self {
        self.remote = Some(RemoteTarget { store, verify_sizes });
        self
    }

    /// Report runs through `notifier`; `attachment` is sent when it exists
    pub fn with_notifier(
        mut self,
        notifier: Box<dyn Notifier>,
        on_success: bool,
        host: String,
        attachment: Option<PathBuf>,
    ) -> Self {
        self.notification = Some(Notification {
            notifier,
            on_success,
            host,
            attachment,
        });
        self
    }

    /// Replace the source of "now" used for naming and ageing archives
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Execute one complete run
    pub fn run(&mut self, force_full: bool, transcript: &Transcript) -> RunReport {
        let _inhibit = InhibitGuard::acquire();
        let started = Instant::now();
        let mut report = RunReport::default();

        for job in &self.jobs {
            tracing::info!("#### {} ####", job.name);
            match self.run_job(job, force_full) {
                Ok(outcome) => report.completed.push(outcome),
                Err(error) => {
                    tracing::error!(job = %job.name, "Backup job failed: {}", error);
                    report.failures.push(JobFailure {
                        job: job.name.clone(),
                        error,
                    });
                }
            }
        }

        if self.remote.is_some() {
            match self.sync() {
                Ok(sync) => report.sync = Some(sync),
                Err(error) => {
                    tracing::error!("Remote sync failed: {}", error);
                    report.sync_error = Some(error);
                }
            }
        }

        report.elapsed = started.elapsed();
        if report.success() {
            tracing::info!("Backup finished successfully in {}", format_duration(report.elapsed));
        } else {
            tracing::error!(
                failed_jobs = report.failures.len(),
                sync_failed = report.sync_error.is_some(),
                "Backup finished with errors in {}",
                format_duration(report.elapsed)
            );
        }

        self.notify(&report, transcript);
        report
    }

    fn run_job(&self, job: &BackupJob, force_full: bool) -> ArcsyncResult<JobOutcome> {
        let started = Instant::now();
        self.local.ensure_exists()?;

        let planner = RetentionPlanner::new(&self.local);
        let existing_full = self.local.list_job(&job.name, ArchiveKind::Full)?;
        let integrity = self.verify_full_archive.then_some(self.archiver.as_ref());

        let decision = planner.plan_mode(job, force_full, &existing_full, (self.clock)(), integrity);
        tracing::info!(
            job = %job.name,
            "{}. Performing {} backup.",
            capitalize(&decision.reason.to_string()),
            decision.mode().to_string().to_uppercase()
        );

        for source in &job.source_paths {
            if !source.exists() {
                tracing::warn!(job = %job.name, "Source path does not exist: {}", source.display());
            }
        }

        let output = decision.output_path().to_path_buf();
        {
            let file_list = FileList::create(self.local.root(), &job.source_paths)?;
            if let Err(e) = self
                .archiver
                .run(&decision.archive_mode(), &decision.target_full, file_list.path())
            {
                remove_partial(&output);
                return Err(e);
            }
        }

        let archive_size = fs::metadata(&output)
            .map(|m| m.len())
            .map_err(|e| {
                ArcsyncError::Archive(format!(
                    "Archiver reported success but {} is missing: {}",
                    output.display(),
                    e
                ))
            })?;
        tracing::info!(job = %job.name, "Archive file created. Size: {}", format_size(archive_size));

        let deleted = planner.cleanup_local(job, &decision)?;

        Ok(JobOutcome {
            job: job.name.clone(),
            decision,
            archive_size,
            deleted,
            elapsed: started.elapsed(),
        })
    }

    fn sync(&mut self) -> ArcsyncResult<ReconcileReport> {
        let local = self.local.list_sync_candidates()?;
        match self.remote.as_mut() {
            Some(remote) => ReconciliationEngine::new(&mut remote.store, remote.verify_sizes).run(&local),
            None => Ok(ReconcileReport::default()),
        }
    }

    fn notify(&self, report: &RunReport, transcript: &Transcript) {
        let Some(notification) = &self.notification else {
            return;
        };
        let success = report.success();
        if success && !notification.on_success {
            return;
        }

        let subject = notify::subject(success, &notification.host);
        let attachment = notification.attachment.as_deref().filter(|p| p.is_file());
        if let Err(e) = notification
            .notifier
            .send(&subject, &transcript.contents(), attachment)
        {
            tracing::error!("Failed to send notification: {}", e);
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::warn!("Removed incomplete archive: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove incomplete archive {}: {}", path.display(), e),
    }
}
