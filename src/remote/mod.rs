//! Remote archive storage
//!
//! A `RemoteStore` is a flat folder of files reachable over some transport.
//! Its primitives are single attempts that may fail transiently; callers go
//! through `RetryingStore`, which applies the same bounded retry policy to
//! every primitive and turns an exhausted operation into a definitive
//! "unavailable" answer instead of an error.

pub mod directory;
pub mod retry;
pub mod sftp;

use std::path::Path;

use crate::config::{reveal_secret, RemoteProtocol, RemoteSettings};
use crate::error::ArcsyncResult;

pub use directory::DirectoryStore;
pub use retry::{retry, RemoteSize, RetryPolicy, RetryingStore};
pub use sftp::SftpStore;

/// Single-attempt operations against a remote folder
///
/// Names are bare file names relative to the store's folder.
pub trait RemoteStore {
    /// Names of the files in the folder
    fn list(&mut self) -> ArcsyncResult<Vec<String>>;

    fn upload(&mut self, local: &Path, remote_name: &str) -> ArcsyncResult<()>;

    fn download(&mut self, remote_name: &str, local: &Path) -> ArcsyncResult<()>;

    /// Size in bytes, or `Ok(None)` when the file is known not to exist
    fn size(&mut self, remote_name: &str) -> ArcsyncResult<Option<u64>>;

    fn delete(&mut self, remote_name: &str) -> ArcsyncResult<()>;

    fn make_dir(&mut self, name: &str) -> ArcsyncResult<()>;

    fn remove_dir(&mut self, name: &str) -> ArcsyncResult<()>;

    /// Human readable location, for log lines
    fn describe(&self) -> String;
}

impl<S: RemoteStore + ?Sized> RemoteStore for Box<S> {
    fn list(&mut self) -> ArcsyncResult<Vec<String>> {
        (**self).list()
    }

    fn upload(&mut self, local: &Path, remote_name: &str) -> ArcsyncResult<()> {
        (**self).upload(local, remote_name)
    }

    fn download(&mut self, remote_name: &str, local: &Path) -> ArcsyncResult<()> {
        (**self).download(remote_name, local)
    }

    fn size(&mut self, remote_name: &str) -> ArcsyncResult<Option<u64>> {
        (**self).size(remote_name)
    }

    fn delete(&mut self, remote_name: &str) -> ArcsyncResult<()> {
        (**self).delete(remote_name)
    }

    fn make_dir(&mut self, name: &str) -> ArcsyncResult<()> {
        (**self).make_dir(name)
    }

    fn remove_dir(&mut self, name: &str) -> ArcsyncResult<()> {
        (**self).remove_dir(name)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Build the store described by the settings, wrapped in its retry policy
pub fn open_store(settings: &RemoteSettings) -> RetryingStore<Box<dyn RemoteStore>> {
    let store: Box<dyn RemoteStore> = match settings.protocol {
        RemoteProtocol::Sftp => Box::new(SftpStore::new(
            settings.address.clone(),
            settings.port,
            settings.user.clone(),
            reveal_secret(settings.password.as_ref(), "remote password").unwrap_or_default(),
            settings.folder.clone(),
            settings.keep_alive,
        )),
        RemoteProtocol::Directory => {
            Box::new(DirectoryStore::new(Path::new(&settings.address).join(&settings.folder)))
        }
    };

    RetryingStore::new(store, RetryPolicy::from_settings(settings))
}
