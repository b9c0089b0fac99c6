//! Archive file naming convention
//!
//! Every archive is named `<Kind>-<JobName>-<yyyy-MM-dd-HH-mm-ss>.7z` with
//! Kind `F` (full) or `I` (incremental). The timestamp is fixed width and
//! zero padded: retention orders archives by comparing file names as
//! lowercase strings, which matches chronological order only while this
//! format holds. Changing `TIMESTAMP_FORMAT` means revisiting
//! `sort_newest_first`.

use std::fmt;
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};

/// Archive file extension, without the dot
pub const EXTENSION: &str = "7z";

/// Timestamp layout embedded in archive names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Rendered width of `TIMESTAMP_FORMAT`
const TIMESTAMP_LEN: usize = 19;

/// Full or incremental generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Full,
    Incremental,
}

impl ArchiveKind {
    /// File name prefix for this kind
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Full => "F",
            Self::Incremental => "I",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "F" | "f" => Some(Self::Full),
            "I" | "i" => Some(Self::Incremental),
            _ => None,
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Incremental => write!(f, "incremental"),
        }
    }
}

/// A parsed archive file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub kind: ArchiveKind,
    pub job: String,
    pub timestamp: NaiveDateTime,
}

impl ArchiveName {
    /// Name a new archive for `job` stamped with `timestamp`
    pub fn new(kind: ArchiveKind, job: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            kind,
            job: job.into(),
            timestamp,
        }
    }

    /// Parse a file name following the convention
    ///
    /// Prefix and extension are matched case-insensitively. Job names may
    /// themselves contain dashes; the timestamp is taken from the end.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = strip_suffix_ignore_case(file_name, &format!(".{}", EXTENSION))?;

        let kind = ArchiveKind::from_prefix(stem.get(..1)?)?;
        let rest = stem.get(1..)?.strip_prefix('-')?;

        let split = rest.len().checked_sub(TIMESTAMP_LEN)?;
        if !rest.is_char_boundary(split) {
            return None;
        }
        let (job_part, stamp) = rest.split_at(split);
        let job = job_part.strip_suffix('-')?;
        if job.is_empty() {
            return None;
        }

        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;

        Some(Self::new(kind, job, timestamp))
    }

    /// Render the file name
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.{}",
            self.kind.prefix(),
            self.job,
            self.timestamp.format(TIMESTAMP_FORMAT),
            EXTENSION
        )
    }

    /// Whether this archive belongs to `job`
    pub fn belongs_to(&self, job: &str) -> bool {
        self.job.eq_ignore_ascii_case(job)
    }

    /// Age of the archive in fractional days at `now`
    pub fn age_days(&self, now: NaiveDateTime) -> f64 {
        (now - self.timestamp).num_seconds() as f64 / 86_400.0
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// An archive present in the local backup directory
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub name: ArchiveName,
    /// Size in bytes at the time the directory was listed
    pub size: u64,
}

impl ArchiveFile {
    /// The file name as it appears on disk
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.file_name())
    }

    pub fn kind(&self) -> ArchiveKind {
        self.name.kind
    }
}

/// Whether a bare file name looks like one of our archives
///
/// Reconciliation filters both the local directory and remote listings with
/// this: prefix `F-`/`I-` and the archive extension, both case-insensitive.
/// Unlike `ArchiveName::parse` this does not require a valid timestamp, so
/// hand-made archives with our prefix are still mirrored.
pub fn is_archive_name(file_name: &str) -> bool {
    let has_ext = strip_suffix_ignore_case(file_name, &format!(".{}", EXTENSION)).is_some();
    let prefix = file_name.get(..2).map(|p| p.to_ascii_uppercase());
    has_ext && matches!(prefix.as_deref(), Some("F-") | Some("I-"))
}

/// Sort archives newest first by case-insensitive file name
///
/// This deliberately compares names, not parsed timestamps; see the module
/// docs for why that is only valid with the fixed-width format.
pub fn sort_newest_first(files: &mut [ArchiveFile]) {
    files.sort_by_key(|f| std::cmp::Reverse(f.file_name().to_lowercase()));
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    if !s.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = s.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

/// Current local time at the resolution archive names carry
pub fn local_now() -> NaiveDateTime {
    use chrono::Timelike;
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
