//! Host integration: sleep inhibition and host identification

pub mod inhibit;

pub use inhibit::InhibitGuard;

/// This machine's host name, for notification subjects
pub fn hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
