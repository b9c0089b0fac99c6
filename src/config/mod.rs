//! Configuration module for arcsync
//!
//! This module provides configuration management including:
//! - Base directory resolution
//! - Settings persistence and validation
//! - Access to machine-protected credentials

pub mod paths;
pub mod settings;

pub use paths::ArcsyncPaths;
pub use settings::{reveal_secret, BackupJob, EmailSettings, RemoteProtocol, RemoteSettings, Settings};
