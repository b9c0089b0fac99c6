//! Run notifications
//!
//! After a run the transcript is sent to the operator: always when the run
//! failed, and on success only when asked to.

pub mod mail;

use std::path::Path;

use crate::error::ArcsyncResult;

pub use mail::MailNotifier;

/// Delivers a run summary somewhere a human will read it
pub trait Notifier {
    fn send(&self, subject: &str, body: &str, attachment: Option<&Path>) -> ArcsyncResult<()>;
}

/// Subject line for a run on `host`
pub fn subject(success: bool, host: &str) -> String {
    if success {
        format!("Backup successful on {}", host)
    } else {
        format!("Backup failed on {}", host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject() {
        assert_eq!(subject(true, "nas"), "Backup successful on nas");
        assert_eq!(subject(false, "nas"), "Backup failed on nas");
    }
}
