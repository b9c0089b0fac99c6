//! arcsync - rotating 7-Zip backups with remote reconciliation
//!
//! This library drives an external 7-Zip compatible archiver to keep one full
//! archive plus a bounded chain of incremental archives per backup job in a
//! local directory, then makes a remote folder hold exactly the same set of
//! archives. It is meant to be started periodically by cron or a systemd
//! timer.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Paths, settings and validation
//! - `error`: Custom error types
//! - `crypto`: Machine-bound protection for stored passwords
//! - `storage`: Local archive directory and file helpers
//! - `archive`: Archive naming convention and the external archiver
//! - `backup`: Full/incremental planning and the run orchestrator
//! - `remote`: Remote stores (SFTP, mounted directory) and retries
//! - `sync`: Local-to-remote reconciliation
//! - `notify`: Run report delivery by mail
//! - `system`: Sleep inhibition and host name
//! - `logging`: Console, file and transcript logging
//! - `display`: Size/duration formatting and archive tables
//! - `cli`: Command-line surface
//!
//! # Example
//!
//! ```rust,ignore
//! use arcsync::config::{ArcsyncPaths, Settings};
//!
//! let paths = ArcsyncPaths::new()?;
//! let settings = Settings::load(&paths)?;
//! ```

pub mod archive;
pub mod backup;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod display;
pub mod error;
pub mod logging;
pub mod notify;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod system;

pub use error::{ArcsyncError, ArcsyncResult};
