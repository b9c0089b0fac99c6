//! Bounded retries for remote operations
//!
//! Every remote primitive is retried the same way: up to `attempts` tries with
//! a fixed pause between failures. The first success wins. When all attempts
//! fail the caller gets a definitive failure value (`None`, `false`,
//! `RemoteSize::Unknown`) rather than an error, and must treat it as
//! "unavailable after retries", which is different from a confirmed negative
//! such as `RemoteSize::Missing`.

use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::config::RemoteSettings;
use crate::error::ArcsyncResult;

use super::RemoteStore;

/// How often and how patiently to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    pub fn from_settings(settings: &RemoteSettings) -> Self {
        Self::new(
            settings.retry_attempts,
            Duration::from_secs(settings.retry_delay_secs),
        )
    }
}

/// Run `op` until it succeeds or the policy is exhausted
///
/// At least one attempt is always made. There is no pause after the final
/// failure.
pub fn retry<T, F>(policy: &RetryPolicy, operation: &str, mut op: F) -> Option<T>
where
    F: FnMut() -> ArcsyncResult<T>,
{
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        match op() {
            Ok(value) => return Some(value),
            Err(e) => {
                tracing::warn!(operation, attempt, attempts, error = %e, "Remote operation failed");
                if attempt < attempts {
                    thread::sleep(policy.delay);
                }
            }
        }
    }

    tracing::error!(operation, attempts, "Remote operation unavailable after retries");
    None
}

/// Outcome of a remote size query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteSize {
    /// The file exists with this many bytes
    Known(u64),
    /// The store confirmed the file does not exist
    Missing,
    /// The size could not be determined within the retry budget
    Unknown,
}

/// A remote store whose every operation goes through `retry`
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: RemoteStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn describe(&self) -> String {
        self.inner.describe()
    }

    #[must_use]
    pub fn list(&mut self) -> Option<Vec<String>> {
        let inner = &mut self.inner;
        retry(&self.policy, "list", || inner.list())
    }

    #[must_use]
    pub fn upload(&mut self, local: &Path, remote_name: &str) -> bool {
        let inner = &mut self.inner;
        retry(&self.policy, "upload", || inner.upload(local, remote_name)).is_some()
    }

    #[must_use]
    pub fn download(&mut self, remote_name: &str, local: &Path) -> bool {
        let inner = &mut self.inner;
        retry(&self.policy, "download", || inner.download(remote_name, local)).is_some()
    }

    #[must_use]
    pub fn size(&mut self, remote_name: &str) -> RemoteSize {
        let inner = &mut self.inner;
        match retry(&self.policy, "size", || inner.size(remote_name)) {
            Some(Some(bytes)) => RemoteSize::Known(bytes),
            Some(None) => RemoteSize::Missing,
            None => RemoteSize::Unknown,
        }
    }

    #[must_use]
    pub fn delete(&mut self, remote_name: &str) -> bool {
        let inner = &mut self.inner;
        retry(&self.policy, "delete", || inner.delete(remote_name)).is_some()
    }

    #[must_use]
    pub fn make_dir(&mut self, name: &str) -> bool {
        let inner = &mut self.inner;
        retry(&self.policy, "mkdir", || inner.make_dir(name)).is_some()
    }

    #[must_use]
    pub fn remove_dir(&mut self, name: &str) -> bool {
        let inner = &mut self.inner;
        retry(&self.policy, "rmdir", || inner.remove_dir(name)).is_some()
    }
}
