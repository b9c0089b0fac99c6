//! Backup runs for arcsync
//!
//! # Architecture
//!
//! - `RetentionPlanner`: decides full vs incremental for a job and prunes
//!   older local generations
//! - `BackupOrchestrator`: runs every job, then remote sync, then notifies
//!
//! # Retention Policy
//!
//! Each job keeps exactly one full archive and at most
//! `retain_incremental_count` incrementals based on it. A new full archive
//! starts a new chain: the previous full and all its incrementals are
//! deleted, but only once the new archive exists.
//!
//! # Example
//!
//! ```rust,ignore
//! use arcsync::backup::BackupOrchestrator;
//! use arcsync::config::{ArcsyncPaths, Settings};
//! use arcsync::logging;
//!
//! let paths = ArcsyncPaths::new()?;
//! let settings = Settings::load(&paths)?;
//! let transcript = logging::init(false, Some(&paths.log_file()));
//!
//! let report = BackupOrchestrator::from_settings(&settings, &paths, true).run(false, &transcript);
//! std::process::exit(if report.success() { 0 } else { 1 });
//! ```

mod orchestrator;
mod planner;

pub use orchestrator::{BackupOrchestrator, JobFailure, JobOutcome, RunReport};
pub use planner::{Decision, DecisionReason, RetentionPlanner};
