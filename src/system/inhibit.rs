//! Keeping the machine awake while a run is in progress
//!
//! On Linux an idle/sleep inhibitor lock is held by a `systemd-inhibit`
//! child for as long as the guard lives. Dropping the guard kills the child,
//! which releases the lock, so every exit path out of a run restores normal
//! power management. Where no inhibitor is available the guard is inert.

use std::process::{Child, Command, Stdio};

const INHIBIT_COMMAND: &str = "systemd-inhibit";

pub struct InhibitGuard {
    child: Option<Child>,
}

impl InhibitGuard {
    /// Take the inhibitor lock, warning if it cannot be held
    pub fn acquire() -> Self {
        if !cfg!(target_os = "linux") {
            return Self::inert();
        }

        let spawned = Command::new(INHIBIT_COMMAND)
            .args([
                "--what=sleep:idle",
                "--who=arcsync",
                "--why=Backup in progress",
                "--mode=block",
                "sleep",
                "infinity",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => {
                tracing::debug!(pid = child.id(), "Sleep inhibitor acquired");
                Self { child: Some(child) }
            }
            Err(e) => {
                tracing::warn!("Could not prevent system sleep: {}", e);
                Self::inert()
            }
        }
    }

    /// A guard that holds nothing
    pub fn inert() -> Self {
        Self { child: None }
    }

    pub fn is_held(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for InhibitGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                tracing::warn!("Failed to release sleep inhibitor: {}", e);
            }
            let _ = child.wait();
            tracing::debug!("Sleep inhibitor released");
        }
    }
}
