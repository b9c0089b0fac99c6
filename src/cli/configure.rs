//! Interactive credential entry (`--configure`)
//!
//! Prompts for the three stored passwords with hidden input. An empty answer
//! keeps whatever is stored. Everything else in the settings file is edited
//! by hand.

use crate::config::{ArcsyncPaths, Settings};
use crate::crypto::{machine_key, protect_with, DerivedKey, EncryptedData, SecureString};
use crate::error::{ArcsyncError, ArcsyncResult};

/// Run the credential flow and persist the result
pub fn run_configure(paths: &ArcsyncPaths) -> ArcsyncResult<()> {
    let mut settings = Settings::load_or_default(paths)?;
    let existed = paths.settings_file().exists();

    println!("arcsync configuration");
    println!("=====================");
    println!("Settings file: {}", paths.settings_file().display());
    println!("Leave a prompt empty to keep the current value.");
    println!();

    let key = machine_key()?;
    let mut changed = false;
    changed |= update_secret(&mut settings.archive_password, "Archive password", &key)?;
    changed |= update_secret(&mut settings.remote.password, "Remote password", &key)?;
    changed |= update_secret(&mut settings.email.password, "Email password", &key)?;

    if existed && !changed {
        println!();
        println!("No changes made.");
        return Ok(());
    }

    if Settings::backup_existing(paths)? {
        println!("Previous settings copied to {}", paths.settings_backup_file().display());
    }
    settings.save(paths)?;

    println!("Settings saved to {}", paths.settings_file().display());
    if !existed {
        println!("Edit it to add backup jobs, then run arcsync without arguments.");
    }
    Ok(())
}

/// Store `input` in `slot` unless it is empty
///
/// Returns whether the slot changed.
pub fn apply_secret(slot: &mut Option<EncryptedData>, input: &SecureString, key: &DerivedKey) -> ArcsyncResult<bool> {
    if input.is_empty() {
        return Ok(false);
    }
    *slot = Some(protect_with(input.as_str(), key)?);
    Ok(true)
}

fn update_secret(slot: &mut Option<EncryptedData>, label: &str, key: &DerivedKey) -> ArcsyncResult<bool> {
    let state = if slot.is_some() { "set" } else { "not set" };
    let input = prompt_secret(&format!("{} [{}]: ", label, state))?;
    apply_secret(slot, &input, key)
}

/// Prompt for a secret (hidden input)
fn prompt_secret(prompt: &str) -> ArcsyncResult<SecureString> {
    rpassword::prompt_password(prompt)
        .map(SecureString::from)
        .map_err(|e| ArcsyncError::Config(format!("Failed to read input: {}", e)))
}
