//! Command-line surface
//!
//! Argument definitions plus the handlers `main` dispatches to.

pub mod configure;
pub mod run;

use clap::Parser;

pub use configure::{apply_secret, run_configure};
pub use run::{list_archives, run_backup};

/// Process exit status for a successful run
pub const EXIT_SUCCESS: u8 = 0;
/// Process exit status for any failure
pub const EXIT_FAILURE: u8 = 1;
/// Reserved for runs that succeed with warnings; not emitted yet
pub const EXIT_WARNING: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "arcsync",
    author = "Kaylee Beyene",
    version,
    about = "Full/incremental 7-Zip backups with remote sync",
    long_about = "arcsync archives configured folders with 7-Zip, keeping one full \
                  archive plus a bounded chain of incrementals per job, then makes a \
                  remote folder mirror the local archive set. Run it from cron or a \
                  systemd timer; with no arguments it performs a backup."
)]
pub struct Cli {
    /// Force a full backup for every job
    #[arg(short, long)]
    pub full: bool,

    /// Enter the stored passwords interactively
    #[arg(long, conflicts_with_all = ["full", "list", "no_sync"])]
    pub configure: bool,

    /// List local archives and exit
    #[arg(short, long, conflicts_with = "full")]
    pub list: bool,

    /// Skip remote sync for this run
    #[arg(long)]
    pub no_sync: bool,

    /// Log debug output
    #[arg(short, long, env = "ARCSYNC_VERBOSE")]
    pub verbose: bool,
}
