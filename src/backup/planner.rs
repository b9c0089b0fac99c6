//! Retention planning for one backup job
//!
//! Decides whether a job's next run is a full or an incremental backup, names
//! the archive it will produce, and prunes older local generations so that a
//! job keeps one full archive plus a capped chain of incrementals.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};

use crate::archive::naming::{sort_newest_first, ArchiveFile, ArchiveKind, ArchiveName};
use crate::archive::tool::{ArchiveMode, ArchiveTool};
use crate::config::BackupJob;
use crate::error::ArcsyncResult;
use crate::storage::LocalArchiveDir;

/// Why the planner chose a mode
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionReason {
    /// A full backup was requested for this run
    Forced,
    /// No full archive exists for the job
    NoFullArchive,
    /// More than one full archive matched; the chain is ambiguous
    MultipleFullArchives(usize),
    /// The full archive is older than the job's threshold
    Expired { age_days: f64 },
    /// The full archive failed the integrity test
    CorruptFull,
    /// The full archive is recent enough to extend
    Current { age_days: f64 },
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forced => write!(f, "full backup forced"),
            Self::NoFullArchive => write!(f, "no full backup file found"),
            Self::MultipleFullArchives(n) => write!(f, "{} full backup files found", n),
            Self::Expired { age_days } => write!(f, "full backup is {:.2} days old", age_days),
            Self::CorruptFull => write!(f, "corrupt full backup"),
            Self::Current { age_days } => write!(f, "full backup is {:.2} days old", age_days),
        }
    }
}

/// The plan for one job's run
///
/// The mode is not stored: a decision is incremental exactly when it carries
/// an incremental target.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// New full archive (full mode) or the existing base archive (incremental mode)
    pub target_full: PathBuf,
    /// New incremental archive, present only in incremental mode
    pub target_incremental: Option<PathBuf>,
    /// Whether an existing full archive was found usable as a base
    pub prior_full_valid: bool,
    pub reason: DecisionReason,
}

impl Decision {
    pub fn mode(&self) -> ArchiveKind {
        if self.target_incremental.is_some() {
            ArchiveKind::Incremental
        } else {
            ArchiveKind::Full
        }
    }

    pub fn is_full(&self) -> bool {
        self.mode() == ArchiveKind::Full
    }

    /// The file this run writes
    pub fn output_path(&self) -> &Path {
        self.target_incremental
            .as_deref()
            .unwrap_or(self.target_full.as_path())
    }

    /// How the archiver should be invoked for this decision
    pub fn archive_mode(&self) -> ArchiveMode {
        match &self.target_incremental {
            Some(incremental) => ArchiveMode::Update {
                incremental: incremental.clone(),
            },
            None => ArchiveMode::Create,
        }
    }

    fn is_target(&self, path: &Path) -> bool {
        self.target_full.as_path() == path || self.target_incremental.as_deref() == Some(path)
    }
}

/// Plans modes and prunes generations within one local archive directory
pub struct RetentionPlanner<'a> {
    local: &'a LocalArchiveDir,
}

impl<'a> RetentionPlanner<'a> {
    pub fn new(local: &'a LocalArchiveDir) -> Self {
        Self { local }
    }

    /// Decide between a full and an incremental backup
    ///
    /// `existing_full` are the job's full archives currently on disk. When
    /// `integrity` is given, a full archive that would otherwise be extended is
    /// tested first and replaced if the test fails. The age threshold is
    /// exclusive: an archive exactly `max_full_age_days` old is still extended.
    pub fn plan_mode(
        &self,
        job: &BackupJob,
        force_full: bool,
        existing_full: &[ArchiveFile],
        now: NaiveDateTime,
        integrity: Option<&dyn ArchiveTool>,
    ) -> Decision {
        let base = match existing_full {
            _ if force_full => return self.full(job, now, DecisionReason::Forced),
            [] => return self.full(job, now, DecisionReason::NoFullArchive),
            [single] => single,
            many => {
                return self.full(job, now, DecisionReason::MultipleFullArchives(many.len()))
            }
        };

        let age_days = base.name.age_days(now);
        if age_days > job.max_full_age_days {
            return self.full(job, now, DecisionReason::Expired { age_days });
        }

        if let Some(tool) = integrity {
            if let Err(e) = tool.test(&base.path) {
                tracing::warn!(job = %job.name, archive = %base.file_name(), error = %e, "Full backup failed integrity test");
                return self.full(job, now, DecisionReason::CorruptFull);
            }
        }

        let incremental = self.unused_path(ArchiveName::new(ArchiveKind::Incremental, &job.name, now));
        Decision {
            target_full: base.path.clone(),
            target_incremental: Some(incremental),
            prior_full_valid: true,
            reason: DecisionReason::Current { age_days },
        }
    }

    /// Delete local generations the decision makes obsolete
    ///
    /// The decision's own targets are never deleted, so this can run before or
    /// after the new archive exists with the same result.
    ///
    /// - Full: every other full archive of the job and all its incrementals.
    /// - Incremental: all but the newest `max(retain - 1, 0)` older
    ///   incrementals, leaving room for the one this run produces.
    ///
    /// Stops at the first failed delete.
    pub fn cleanup_local(&self, job: &BackupJob, decision: &Decision) -> ArcsyncResult<Vec<PathBuf>> {
        let mut deleted = Vec::new();

        let keep = if decision.is_full() {
            for full in self.local.list_job(&job.name, ArchiveKind::Full)? {
                if decision.is_target(&full.path) {
                    continue;
                }
                tracing::info!(job = %job.name, "Deleting local: {}", full.file_name());
                self.local.delete(&full.path)?;
                deleted.push(full.path);
            }
            0
        } else {
            job.retain_incremental_count.saturating_sub(1) as usize
        };

        let mut incrementals: Vec<ArchiveFile> = self
            .local
            .list_job(&job.name, ArchiveKind::Incremental)?
            .into_iter()
            .filter(|f| !decision.is_target(&f.path))
            .collect();
        sort_newest_first(&mut incrementals);

        tracing::info!(
            job = %job.name,
            "Found {} existing local incremental files. Will keep: {}",
            incrementals.len(),
            keep.min(incrementals.len())
        );

        for old in incrementals.into_iter().skip(keep) {
            tracing::info!(job = %job.name, "Deleting local: {}", old.file_name());
            self.local.delete(&old.path)?;
            deleted.push(old.path);
        }

        Ok(deleted)
    }

    fn full(&self, job: &BackupJob, now: NaiveDateTime, reason: DecisionReason) -> Decision {
        Decision {
            target_full: self.unused_path(ArchiveName::new(ArchiveKind::Full, &job.name, now)),
            target_incremental: None,
            prior_full_valid: false,
            reason,
        }
    }

    /// Path for a new archive, stepping the timestamp forward if a file with
    /// that name already exists (two runs within the same second).
    fn unused_path(&self, mut name: ArchiveName) -> PathBuf {
        let mut path = self.local.path_for(&name);
        while path.exists() {
            name.timestamp += Duration::seconds(1);
            path = self.local.path_for(&name);
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArcsyncError;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    struct FixedIntegrity(bool);

    impl ArchiveTool for FixedIntegrity {
        fn run(&self, _: &ArchiveMode, _: &Path, _: &Path) -> ArcsyncResult<()> {
            Ok(())
        }

        fn test(&self, _: &Path) -> ArcsyncResult<()> {
            if self.0 {
                Ok(())
            } else {
                Err(ArcsyncError::Archive("Headers Error".into()))
            }
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 30)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn job(retain: u32) -> BackupJob {
        BackupJob {
            name: "Logs".into(),
            source_paths: vec![PathBuf::from("/var/log")],
            max_full_age_days: 20.0,
            retain_incremental_count: retain,
        }
    }

    fn setup() -> (TempDir, LocalArchiveDir) {
        let temp_dir = TempDir::new().unwrap();
        let local = LocalArchiveDir::new(temp_dir.path());
        (temp_dir, local)
    }

    fn put(local: &LocalArchiveDir, kind: ArchiveKind, days_ago: i64) -> PathBuf {
        let name = ArchiveName::new(kind, "Logs", now() - Duration::days(days_ago));
        let path = local.path_for(&name);
        fs::write(&path, b"7z").unwrap();
        path
    }

    fn fulls(local: &LocalArchiveDir) -> Vec<ArchiveFile> {
        local.list_job("Logs", ArchiveKind::Full).unwrap()
    }

    #[test]
    fn test_no_full_means_full() {
        let (_temp, local) = setup();
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(3), false, &[], now(), None);
        assert_eq!(decision.mode(), ArchiveKind::Full);
        assert_eq!(decision.reason, DecisionReason::NoFullArchive);
        assert!(decision.target_incremental.is_none());
        assert_eq!(
            decision.target_full.file_name().unwrap(),
            "F-Logs-2024-06-30-12-00-00.7z"
        );
    }

    #[test]
    fn test_multiple_fulls_means_full() {
        let (_temp, local) = setup();
        put(&local, ArchiveKind::Full, 3);
        put(&local, ArchiveKind::Full, 2);
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(3), false, &fulls(&local), now(), None);
        assert!(decision.is_full());
        assert_eq!(decision.reason, DecisionReason::MultipleFullArchives(2));
    }

    #[test]
    fn test_expired_full_means_full() {
        let (_temp, local) = setup();
        put(&local, ArchiveKind::Full, 25);
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(3), false, &fulls(&local), now(), None);
        assert!(decision.is_full());
        assert!(matches!(decision.reason, DecisionReason::Expired { .. }));
    }

    #[test]
    fn test_young_valid_full_means_incremental() {
        let (_temp, local) = setup();
        let base = put(&local, ArchiveKind::Full, 5);
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(3), false, &fulls(&local), now(), Some(&FixedIntegrity(true)));
        assert_eq!(decision.mode(), ArchiveKind::Incremental);
        assert_eq!(decision.target_full, base);
        assert!(decision.prior_full_valid);
        assert_eq!(
            decision.target_incremental.as_ref().unwrap().file_name().unwrap(),
            "I-Logs-2024-06-30-12-00-00.7z"
        );
        assert_eq!(
            decision.archive_mode(),
            ArchiveMode::Update {
                incremental: decision.target_incremental.clone().unwrap()
            }
        );
    }

    #[test]
    fn test_age_boundary_is_exclusive() {
        let (_temp, local) = setup();
        put(&local, ArchiveKind::Full, 20);
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(3), false, &fulls(&local), now(), None);
        assert_eq!(decision.mode(), ArchiveKind::Incremental);
    }

    #[test]
    fn test_corrupt_full_means_full() {
        let (_temp, local) = setup();
        put(&local, ArchiveKind::Full, 5);
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(3), false, &fulls(&local), now(), Some(&FixedIntegrity(false)));
        assert!(decision.is_full());
        assert_eq!(decision.reason, DecisionReason::CorruptFull);
        assert!(!decision.prior_full_valid);
    }

    #[test]
    fn test_force_full_overrides_everything() {
        let (_temp, local) = setup();
        put(&local, ArchiveKind::Full, 1);
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(3), true, &fulls(&local), now(), Some(&FixedIntegrity(true)));
        assert!(decision.is_full());
        assert_eq!(decision.reason, DecisionReason::Forced);
    }

    #[test]
    fn test_same_second_full_gets_distinct_name() {
        let (_temp, local) = setup();
        let existing = put(&local, ArchiveKind::Full, 0);
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(3), true, &fulls(&local), now(), None);
        assert_ne!(decision.target_full, existing);
        assert_eq!(
            decision.target_full.file_name().unwrap(),
            "F-Logs-2024-06-30-12-00-01.7z"
        );
    }

    #[test]
    fn test_cleanup_full_removes_everything_else() {
        let (_temp, local) = setup();
        put(&local, ArchiveKind::Full, 25);
        for d in 1..=4 {
            put(&local, ArchiveKind::Incremental, d);
        }
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(3), false, &fulls(&local), now(), None);
        let deleted = planner.cleanup_local(&job(3), &decision).unwrap();

        assert_eq!(deleted.len(), 5);
        assert!(fulls(&local).is_empty());
        assert!(local.list_job("Logs", ArchiveKind::Incremental).unwrap().is_empty());
    }

    #[test]
    fn test_cleanup_full_spares_new_target() {
        let (_temp, local) = setup();
        put(&local, ArchiveKind::Full, 25);
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(3), false, &fulls(&local), now(), None);
        fs::write(&decision.target_full, b"new").unwrap();
        planner.cleanup_local(&job(3), &decision).unwrap();

        let remaining = fulls(&local);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].path, decision.target_full);
    }

    #[test]
    fn test_cleanup_incremental_keeps_newest_n_minus_one() {
        let (_temp, local) = setup();
        put(&local, ArchiveKind::Full, 10);
        let newest = put(&local, ArchiveKind::Incremental, 1);
        let second = put(&local, ArchiveKind::Incremental, 2);
        put(&local, ArchiveKind::Incremental, 3);
        put(&local, ArchiveKind::Incremental, 4);
        put(&local, ArchiveKind::Incremental, 5);
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(3), false, &fulls(&local), now(), None);
        let deleted = planner.cleanup_local(&job(3), &decision).unwrap();
        assert_eq!(deleted.len(), 3);

        let mut remaining: Vec<_> = local
            .list_job("Logs", ArchiveKind::Incremental)
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        remaining.sort();
        let mut expected = vec![newest, second];
        expected.sort();
        assert_eq!(remaining, expected);
        assert_eq!(fulls(&local).len(), 1);
    }

    #[test]
    fn test_cleanup_incremental_after_creation_counts_new_one_separately() {
        let (_temp, local) = setup();
        put(&local, ArchiveKind::Full, 10);
        for d in 1..=4 {
            put(&local, ArchiveKind::Incremental, d);
        }
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(3), false, &fulls(&local), now(), None);
        fs::write(decision.output_path(), b"inc").unwrap();
        planner.cleanup_local(&job(3), &decision).unwrap();

        // two older generations plus the one just written
        let remaining = local.list_job("Logs", ArchiveKind::Incremental).unwrap();
        assert_eq!(remaining.len(), 3);
        assert!(remaining.iter().any(|f| f.path == decision.output_path()));
    }

    #[test]
    fn test_cleanup_zero_retention_removes_all_older() {
        let (_temp, local) = setup();
        put(&local, ArchiveKind::Full, 10);
        put(&local, ArchiveKind::Incremental, 1);
        put(&local, ArchiveKind::Incremental, 2);
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(0), false, &fulls(&local), now(), None);
        planner.cleanup_local(&job(0), &decision).unwrap();
        assert!(local.list_job("Logs", ArchiveKind::Incremental).unwrap().is_empty());
    }

    #[test]
    fn test_cleanup_ignores_other_jobs() {
        let (_temp, local) = setup();
        let other = local.path_for(&ArchiveName::new(ArchiveKind::Incremental, "Logs2", now()));
        fs::write(&other, b"x").unwrap();
        let planner = RetentionPlanner::new(&local);

        let decision = planner.plan_mode(&job(3), false, &[], now(), None);
        planner.cleanup_local(&job(3), &decision).unwrap();
        assert!(other.exists());
    }
}
