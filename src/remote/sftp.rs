//! SFTP remote store
//!
//! Integration caveat: some servers misbehave when one SSH session is kept
//! open and reused for operations outside the login directory. With
//! `keep_alive` off (the default) every operation opens and closes its own
//! session, which is slower but predictable. With it on, a single session is
//! reused and dropped after any failure so the next attempt reconnects.

use std::fs::File;
use std::io;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ssh2::{ErrorCode, Session, Sftp};

use super::RemoteStore;
use crate::crypto::SecureString;
use crate::error::{ArcsyncError, ArcsyncResult};

/// libssh2's SFTP status for a missing file
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Socket timeout for every blocking SSH call
const SESSION_TIMEOUT: Duration = Duration::from_secs(120);

/// Archives stored in a folder on an SSH server
pub struct SftpStore {
    address: String,
    port: u16,
    user: String,
    password: SecureString,
    folder: PathBuf,
    keep_alive: bool,
    session: Option<Session>,
}

impl SftpStore {
    pub fn new(
        address: String,
        port: u16,
        user: String,
        password: SecureString,
        folder: String,
        keep_alive: bool,
    ) -> Self {
        Self {
            address,
            port,
            user,
            password,
            folder: PathBuf::from(folder),
            keep_alive,
            session: None,
        }
    }

    fn connect(&self) -> ArcsyncResult<Session> {
        let tcp = TcpStream::connect((self.address.as_str(), self.port)).map_err(|e| {
            ArcsyncError::Remote(format!(
                "Failed to connect to {}:{}: {}",
                self.address, self.port, e
            ))
        })?;

        let mut session = Session::new().map_err(ssh_error("create session"))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(SESSION_TIMEOUT.as_millis() as u32);
        session.handshake().map_err(ssh_error("handshake"))?;

        session
            .userauth_password(&self.user, self.password.as_str())
            .map_err(|e| ArcsyncError::Remote(format!("SSH authentication failed: {}", e)))?;
        if !session.authenticated() {
            return Err(ArcsyncError::Remote("SSH authentication failed".into()));
        }

        Ok(session)
    }

    /// Run `op` with an SFTP channel on a fresh or cached session
    fn with_sftp<T>(&mut self, op: impl FnOnce(&Sftp, &Path) -> ArcsyncResult<T>) -> ArcsyncResult<T> {
        let session = match self.session.take() {
            Some(session) => session,
            None => self.connect()?,
        };

        let result = session
            .sftp()
            .map_err(ssh_error("open sftp channel"))
            .and_then(|sftp| op(&sftp, &self.folder));

        if self.keep_alive && result.is_ok() {
            self.session = Some(session);
        } else {
            let _ = session.disconnect(None, "arcsync done", None);
        }

        result
    }

    fn remote_path(folder: &Path, name: &str) -> PathBuf {
        if folder.as_os_str().is_empty() {
            PathBuf::from(name)
        } else {
            folder.join(name)
        }
    }
}

impl RemoteStore for SftpStore {
    fn list(&mut self) -> ArcsyncResult<Vec<String>> {
        self.with_sftp(|sftp, folder| {
            let dir = if folder.as_os_str().is_empty() {
                Path::new(".")
            } else {
                folder
            };
            let entries = sftp.readdir(dir).map_err(ssh_error("list"))?;
            Ok(entries
                .into_iter()
                .filter(|(_, stat)| stat.is_file())
                .filter_map(|(path, _)| path.file_name().map(|n| n.to_string_lossy().into_owned()))
                .collect())
        })
    }

    fn upload(&mut self, local: &Path, remote_name: &str) -> ArcsyncResult<()> {
        self.with_sftp(|sftp, folder| {
            let mut source = File::open(local).map_err(|e| {
                ArcsyncError::Io(format!("Failed to open {}: {}", local.display(), e))
            })?;
            let mut target = sftp
                .create(&Self::remote_path(folder, remote_name))
                .map_err(ssh_error("create remote file"))?;
            io::copy(&mut source, &mut target)
                .map_err(|e| ArcsyncError::Remote(format!("Upload of {} failed: {}", remote_name, e)))?;
            Ok(())
        })
    }

    fn download(&mut self, remote_name: &str, local: &Path) -> ArcsyncResult<()> {
        self.with_sftp(|sftp, folder| {
            let mut source = sftp
                .open(&Self::remote_path(folder, remote_name))
                .map_err(ssh_error("open remote file"))?;
            let mut target = File::create(local).map_err(|e| {
                ArcsyncError::Io(format!("Failed to create {}: {}", local.display(), e))
            })?;
            io::copy(&mut source, &mut target).map_err(|e| {
                ArcsyncError::Remote(format!("Download of {} failed: {}", remote_name, e))
            })?;
            Ok(())
        })
    }

    fn size(&mut self, remote_name: &str) -> ArcsyncResult<Option<u64>> {
        self.with_sftp(|sftp, folder| {
            match sftp.stat(&Self::remote_path(folder, remote_name)) {
                Ok(stat) => Ok(stat.size),
                Err(e) if e.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => Ok(None),
                Err(e) => Err(ArcsyncError::Remote(format!("stat {} failed: {}", remote_name, e))),
            }
        })
    }

    fn delete(&mut self, remote_name: &str) -> ArcsyncResult<()> {
        self.with_sftp(|sftp, folder| {
            sftp.unlink(&Self::remote_path(folder, remote_name))
                .map_err(ssh_error("delete"))
        })
    }

    fn make_dir(&mut self, name: &str) -> ArcsyncResult<()> {
        self.with_sftp(|sftp, folder| {
            sftp.mkdir(&Self::remote_path(folder, name), 0o755)
                .map_err(ssh_error("mkdir"))
        })
    }

    fn remove_dir(&mut self, name: &str) -> ArcsyncResult<()> {
        self.with_sftp(|sftp, folder| {
            sftp.rmdir(&Self::remote_path(folder, name))
                .map_err(ssh_error("rmdir"))
        })
    }

    fn describe(&self) -> String {
        format!(
            "sftp://{}@{}:{}/{}",
            self.user,
            self.address,
            self.port,
            self.folder.display()
        )
    }
}

fn ssh_error(what: &'static str) -> impl Fn(ssh2::Error) -> ArcsyncError {
    move |e| ArcsyncError::Remote(format!("SFTP {} failed: {}", what, e))
}
