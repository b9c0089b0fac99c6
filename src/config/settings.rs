//! Persisted settings for arcsync
//!
//! Holds the archiver options, the list of backup jobs, and the remote-sync
//! and notification settings. Passwords are stored as machine-protected
//! `EncryptedData` blobs, never in plain text.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::ArcsyncPaths;
use crate::crypto::{self, EncryptedData, SecureString};
use crate::error::ArcsyncError;
use crate::storage::file_io::{read_json_required, write_json_atomic};

/// A named set of source paths archived together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupJob {
    /// Job name, unique within the settings file; part of every archive name
    pub name: String,

    /// Files and directories handed to the archiver, in order
    pub source_paths: Vec<PathBuf>,

    /// Age after which the full archive is replaced instead of extended
    pub max_full_age_days: f64,

    /// Incremental generations kept locally, including the one about to be made
    pub retain_incremental_count: u32,
}

/// Transport used to reach the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoteProtocol {
    /// SSH file transfer
    #[default]
    Sftp,
    /// A mounted directory (NAS share, USB disk)
    Directory,
}

/// Remote store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    #[serde(default)]
    pub protocol: RemoteProtocol,

    /// Host name, or the mount path for `directory`
    #[serde(default)]
    pub address: String,

    #[serde(default = "default_sftp_port")]
    pub port: u16,

    /// Folder on the remote side holding the archives
    #[serde(default)]
    pub folder: String,

    #[serde(default)]
    pub user: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<EncryptedData>,

    /// Compare remote sizes before deciding a same-named archive is current
    #[serde(default = "default_true")]
    pub verify_sizes: bool,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Reuse one connection for the whole pass. Some servers misbehave with
    /// persistent sessions outside their root directory, so this is off by
    /// default.
    #[serde(default)]
    pub keep_alive: bool,
}

/// Mail notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    /// sendmail-compatible program used to deliver the message
    #[serde(default = "default_mail_command")]
    pub command: String,

    #[serde(default)]
    pub server: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub use_tls: bool,

    #[serde(default)]
    pub user: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<EncryptedData>,

    #[serde(default)]
    pub recipient: String,
}

/// User settings for arcsync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Path of the 7-Zip executable
    #[serde(default = "default_archiver_path")]
    pub archiver_path: PathBuf,

    /// 7-Zip compression level (0-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u8,

    /// Encrypt archive headers (file names) as well as contents
    #[serde(default)]
    pub encrypt_headers: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_password: Option<EncryptedData>,

    /// Ceiling on a single archiver invocation
    #[serde(default = "default_archive_timeout_minutes")]
    pub archive_timeout_minutes: u64,

    /// Test the existing full archive before extending it
    #[serde(default = "default_true")]
    pub verify_full_archive: bool,

    /// Directory holding every job's archives
    pub local_backup_dir: PathBuf,

    #[serde(default)]
    pub jobs: Vec<BackupJob>,

    #[serde(default)]
    pub sync_remote: bool,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub send_email: bool,

    #[serde(default)]
    pub send_email_on_success: bool,

    #[serde(default)]
    pub email: EmailSettings,
}

fn default_schema_version() -> u32 {
    1
}

fn default_archiver_path() -> PathBuf {
    PathBuf::from("7z")
}

fn default_compression_level() -> u8 {
    9
}

fn default_archive_timeout_minutes() -> u64 {
    30
}

fn default_sftp_port() -> u16 {
    22
}

fn default_smtp_port() -> u16 {
    587
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    10
}

fn default_mail_command() -> String {
    "msmtp".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            protocol: RemoteProtocol::default(),
            address: String::new(),
            port: default_sftp_port(),
            folder: String::new(),
            user: String::new(),
            password: None,
            verify_sizes: true,
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            keep_alive: false,
        }
    }
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            command: default_mail_command(),
            server: String::new(),
            port: default_smtp_port(),
            use_tls: true,
            user: String::new(),
            password: None,
            recipient: String::new(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            archiver_path: default_archiver_path(),
            compression_level: default_compression_level(),
            encrypt_headers: false,
            archive_password: None,
            archive_timeout_minutes: default_archive_timeout_minutes(),
            verify_full_archive: true,
            local_backup_dir: PathBuf::from("backups"),
            jobs: Vec::new(),
            sync_remote: false,
            remote: RemoteSettings::default(),
            send_email: false,
            send_email_on_success: false,
            email: EmailSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk
    ///
    /// A missing or unparseable file is a configuration error: no run is
    /// attempted without one.
    pub fn load(paths: &ArcsyncPaths) -> Result<Self, ArcsyncError> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            return Err(ArcsyncError::Config(format!(
                "Settings file does not exist: {}. Run with --configure to create one.",
                settings_path.display()
            )));
        }

        let settings: Settings = read_json_required(&settings_path)
            .map_err(|e| ArcsyncError::Config(format!("Failed to load settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from disk, or fall back to defaults if the file doesn't exist
    pub fn load_or_default(paths: &ArcsyncPaths) -> Result<Self, ArcsyncError> {
        if paths.settings_file().exists() {
            read_json_required(paths.settings_file())
                .map_err(|e| ArcsyncError::Config(format!("Failed to load settings: {}", e)))
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to disk atomically
    pub fn save(&self, paths: &ArcsyncPaths) -> Result<(), ArcsyncError> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }

    /// Copy the current settings file aside before it is overwritten
    ///
    /// Returns `false` when there was nothing to copy.
    pub fn backup_existing(paths: &ArcsyncPaths) -> Result<bool, ArcsyncError> {
        let current = paths.settings_file();
        if !current.exists() {
            return Ok(false);
        }

        std::fs::copy(&current, paths.settings_backup_file()).map_err(|e| {
            ArcsyncError::Io(format!("Failed to back up settings file: {}", e))
        })?;
        Ok(true)
    }

    /// Check the settings for values the backup run cannot work with
    pub fn validate(&self) -> Result<(), ArcsyncError> {
        if self.compression_level > 9 {
            return Err(ArcsyncError::Validation(format!(
                "compression_level must be between 0 and 9, got {}",
                self.compression_level
            )));
        }

        if self.sync_remote && self.remote.retry_attempts == 0 {
            return Err(ArcsyncError::Validation(
                "remote.retry_attempts must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                return Err(ArcsyncError::Validation("Job name cannot be empty".into()));
            }
            if job.name.contains(['/', '\\']) {
                return Err(ArcsyncError::Validation(format!(
                    "Job name cannot contain path separators: {}",
                    job.name
                )));
            }
            if !seen.insert(job.name.to_lowercase()) {
                return Err(ArcsyncError::Validation(format!(
                    "Duplicate job name: {}",
                    job.name
                )));
            }
            if job.source_paths.is_empty() {
                return Err(ArcsyncError::Validation(format!(
                    "Job '{}' has no source paths",
                    job.name
                )));
            }
            if job.max_full_age_days.is_nan() || job.max_full_age_days < 0.0 {
                return Err(ArcsyncError::Validation(format!(
                    "Job '{}' has an invalid max_full_age_days: {}",
                    job.name, job.max_full_age_days
                )));
            }
        }

        Ok(())
    }
}

/// Decrypt an optional stored secret
///
/// A secret that cannot be decrypted (copied from another machine, corrupted)
/// is treated as absent and reported as a warning.
pub fn reveal_secret(secret: Option<&EncryptedData>, what: &str) -> Option<SecureString> {
    let encrypted = secret?;
    match crypto::unprotect(encrypted) {
        Ok(value) if value.is_empty() => None,
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(secret = what, error = %e, "Stored secret could not be decrypted; ignoring it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_job(name: &str) -> BackupJob {
        BackupJob {
            name: name.to_string(),
            source_paths: vec![PathBuf::from("/var/log")],
            max_full_age_days: 20.0,
            retain_incremental_count: 3,
        }
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.compression_level, 9);
        assert_eq!(settings.archive_timeout_minutes, 30);
        assert_eq!(settings.remote.retry_attempts, 3);
        assert_eq!(settings.remote.retry_delay_secs, 10);
        assert!(settings.remote.verify_sizes);
        assert!(!settings.remote.keep_alive);
    }

    #[test]
    fn test_load_missing_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ArcsyncPaths::with_base_dir(temp_dir.path().to_path_buf());

        let err = Settings::load(&paths).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_load_corrupt_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ArcsyncPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(paths.settings_file(), "{ not json").unwrap();

        let err = Settings::load(&paths).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ArcsyncPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut settings = Settings::default();
        settings.jobs.push(sample_job("Logs"));
        settings.sync_remote = true;
        settings.remote.address = "backup.example.com".into();
        settings.save(&paths).unwrap();

        let loaded = Settings::load(&paths).unwrap();
        assert_eq!(loaded.jobs, vec![sample_job("Logs")]);
        assert_eq!(loaded.remote.address, "backup.example.com");
        assert!(loaded.sync_remote);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "local_backup_dir": "/srv/bak",
            "jobs": [{"name": "Logs", "source_paths": ["/var/log"], "max_full_age_days": 20, "retain_incremental_count": 3}],
            "remote": {"address": "ftp.example.com"},
            "email": {}
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.archiver_path, PathBuf::from("7z"));
        assert_eq!(settings.remote.port, 22);
        assert_eq!(settings.email.command, "msmtp");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_remote_and_email_sections_are_optional() {
        let json = r#"{
            "local_backup_dir": "/srv/bak",
            "sync_remote": false,
            "send_email": false
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.remote.retry_attempts, 3);
        assert_eq!(settings.email.command, "msmtp");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_backup_existing() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ArcsyncPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert!(!Settings::backup_existing(&paths).unwrap());

        Settings::default().save(&paths).unwrap();
        assert!(Settings::backup_existing(&paths).unwrap());
        assert!(paths.settings_backup_file().exists());
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut settings = Settings::default();
        settings.jobs = vec![sample_job("Logs"), sample_job("logs")];
        assert!(settings.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.jobs = vec![sample_job("a/b")];
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.compression_level = 12;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        let mut job = sample_job("Logs");
        job.source_paths.clear();
        settings.jobs = vec![job];
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.sync_remote = true;
        settings.remote.retry_attempts = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_reveal_missing_secret() {
        assert!(reveal_secret(None, "archive password").is_none());
    }
}
