//! Path management for arcsync
//!
//! Resolves where the settings file, its backup copy and the conventional log
//! file live. Archives themselves go wherever `Settings::local_backup_dir`
//! points.
//!
//! ## Path Resolution Order
//!
//! 1. `ARCSYNC_HOME` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/arcsync` or `~/.config/arcsync`
//! 3. Windows: `%APPDATA%\arcsync`

use std::path::PathBuf;

use crate::error::ArcsyncError;

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "ARCSYNC_HOME";

/// Manages all paths used by arcsync
#[derive(Debug, Clone)]
pub struct ArcsyncPaths {
    /// Base directory for settings and logs
    base_dir: PathBuf,
}

impl ArcsyncPaths {
    /// Create a new ArcsyncPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if no home/config directory can be determined.
    pub fn new() -> Result<Self, ArcsyncError> {
        let base_dir = match std::env::var(HOME_ENV) {
            Ok(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Create ArcsyncPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the path of the copy made before `--configure` overwrites settings
    pub fn settings_backup_file(&self) -> PathBuf {
        self.base_dir.join("config.json.bak")
    }

    /// Get the conventional log file path, attached to notifications if present
    pub fn log_file(&self) -> PathBuf {
        self.base_dir.join("arcsync.log")
    }

    /// Ensure the base directory exists
    pub fn ensure_directories(&self) -> Result<(), ArcsyncError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| ArcsyncError::Io(format!("Failed to create base directory: {}", e)))
    }
}

/// Resolve the default base directory path based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, ArcsyncError> {
    let config_base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => {
            let home = std::env::var("HOME").map_err(|_| {
                ArcsyncError::Config("Could not determine HOME directory".into())
            })?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(config_base.join("arcsync"))
}

/// Resolve the default base directory path based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, ArcsyncError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| ArcsyncError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("arcsync"))
}
