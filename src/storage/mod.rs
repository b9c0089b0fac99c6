//! Local storage for arcsync
//!
//! - `file_io`: atomic JSON writes and the archiver's transient file list
//! - `local`: listing and deleting archives in the local backup directory

pub mod file_io;
pub mod local;

pub use file_io::FileList;
pub use local::{LocalArchiveDir, SyncFile};
