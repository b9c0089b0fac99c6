//! Archives: how they are named and how they are produced
//!
//! - `naming`: the `F-`/`I-` file name convention and its ordering rules
//! - `tool`: the external 7-Zip compatible archiver

pub mod naming;
pub mod tool;

pub use naming::{is_archive_name, local_now, sort_newest_first, ArchiveFile, ArchiveKind, ArchiveName};
pub use tool::{ArchiveMode, ArchiveOptions, ArchiveTool, SevenZip};
