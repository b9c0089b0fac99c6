//! The external archiver
//!
//! arcsync never compresses anything itself. It drives a 7-Zip compatible
//! command line: `a` to create a full archive, `u` with update flags to write
//! only what changed since the full archive into a separate incremental
//! container, and `t` to test an archive's integrity. Any non-zero exit status
//! is a failure of the current job.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::crypto::SecureString;
use crate::error::{ArcsyncError, ArcsyncResult};

/// Interval between checks on a running archiver
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 7-Zip update switch for incremental archives: keep the base archive
/// untouched (`-u-`) and write new/changed items, plus deletion markers, into
/// the named secondary archive.
const INCREMENTAL_UPDATE_SWITCH: &str = "-up0q3r2x2y2z0w2!";

/// What the archiver should produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Add everything to a new container
    Create,
    /// Record changes relative to the container into `incremental`
    Update { incremental: PathBuf },
}

/// A component that builds, updates and tests archives
pub trait ArchiveTool {
    /// Run the archiver against `container` with the sources listed in `file_list`
    fn run(&self, mode: &ArchiveMode, container: &Path, file_list: &Path) -> ArcsyncResult<()>;

    /// Check the structural integrity of an existing archive
    fn test(&self, container: &Path) -> ArcsyncResult<()>;
}

/// Options shared by every archiver invocation
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub password: Option<SecureString>,
    pub compression_level: u8,
    pub encrypt_headers: bool,
    pub timeout: Duration,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            password: None,
            compression_level: 9,
            encrypt_headers: false,
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Runs a 7-Zip executable as a child process
#[derive(Debug, Clone)]
pub struct SevenZip {
    executable: PathBuf,
    options: ArchiveOptions,
}

impl SevenZip {
    pub fn new(executable: impl Into<PathBuf>, options: ArchiveOptions) -> Self {
        Self {
            executable: executable.into(),
            options,
        }
    }

    /// Build the argument list for a create or update run
    pub fn build_args(&self, mode: &ArchiveMode, container: &Path, file_list: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(10);

        args.push(match mode {
            ArchiveMode::Create => "a".into(),
            ArchiveMode::Update { .. } => "u".into(),
        });
        args.push(container.as_os_str().to_owned());
        args.push("-t7z".into());
        args.push(format!("-mx={}", self.options.compression_level).into());
        args.push(format!("-mhe={}", if self.options.encrypt_headers { "on" } else { "off" }).into());
        self.push_password(&mut args);

        if let ArchiveMode::Update { incremental } = mode {
            args.push("-ms=off".into());
            args.push("-u-".into());
            let mut switch = OsString::from(INCREMENTAL_UPDATE_SWITCH);
            switch.push(incremental.as_os_str());
            args.push(switch);
        }

        let mut list_arg = OsString::from("@");
        list_arg.push(file_list.as_os_str());
        args.push(list_arg);

        args
    }

    /// Build the argument list for an integrity test
    pub fn build_test_args(&self, container: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["t".into(), container.as_os_str().to_owned()];
        self.push_password(&mut args);
        args
    }

    fn push_password(&self, args: &mut Vec<OsString>) {
        if let Some(password) = self.options.password.as_ref().filter(|p| !p.is_empty()) {
            args.push(format!("-p{}", password.as_str()).into());
        }
    }

    fn execute(&self, args: Vec<OsString>, target: &Path) -> ArcsyncResult<()> {
        let started = Instant::now();
        let mut child = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ArcsyncError::Archive(format!(
                    "Failed to start archiver {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let Some(status) = wait_with_timeout(&mut child, self.options.timeout)? else {
            // A grandchild of a wrapper script may still hold the pipes, so the
            // drain threads are left to finish on their own.
            drop((stdout, stderr));
            return Err(ArcsyncError::ArchiveTimeout {
                archive: target.display().to_string(),
                seconds: self.options.timeout.as_secs(),
            });
        };

        let output = stdout.join().unwrap_or_default();
        let errors = stderr.join().unwrap_or_default();
        if !output.trim().is_empty() {
            tracing::debug!(target: "arcsync::archiver", "{}", output.trim_end());
        }
        if !errors.trim().is_empty() {
            tracing::debug!(target: "arcsync::archiver", "{}", errors.trim_end());
        }

        if status.success() {
            tracing::debug!(elapsed = ?started.elapsed(), archive = %target.display(), "Archiver finished");
            Ok(())
        } else {
            Err(ArcsyncError::Archive(format!(
                "Archiver failed for {} ({}){}",
                target.display(),
                describe_status(status),
                last_line(&errors).map(|l| format!(": {}", l)).unwrap_or_default()
            )))
        }
    }
}

impl ArchiveTool for SevenZip {
    fn run(&self, mode: &ArchiveMode, container: &Path, file_list: &Path) -> ArcsyncResult<()> {
        let target = match mode {
            ArchiveMode::Create => container,
            ArchiveMode::Update { incremental } => incremental.as_path(),
        };
        self.execute(self.build_args(mode, container, file_list), target)
    }

    fn test(&self, container: &Path) -> ArcsyncResult<()> {
        self.execute(self.build_test_args(container), container)
    }
}

/// Read a child pipe to completion on a helper thread so the child never
/// blocks on a full pipe while we poll for exit.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Wait for the child, killing it once `timeout` elapses
///
/// Returns `None` on timeout.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> ArcsyncResult<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL.min(timeout)),
            Err(e) => {
                return Err(ArcsyncError::Archive(format!(
                    "Failed to wait for archiver: {}",
                    e
                )))
            }
        }
    }
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}
