//! Logging setup
//!
//! Every log line goes to three places: the console (stderr), an append-only
//! `arcsync.log` in the base directory, and an in-memory transcript of the
//! current run. The transcript becomes the body of the notification mail.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Captured log output of the current process
#[derive(Clone, Default)]
pub struct Transcript(Arc<Mutex<Vec<u8>>>);

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything logged so far
    pub fn contents(&self) -> String {
        match self.0.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().map(|buf| buf.is_empty()).unwrap_or(true)
    }
}

pub struct TranscriptWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for Transcript {
    type Writer = TranscriptWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TranscriptWriter(Arc::clone(&self.0))
    }
}

impl io::Write for TranscriptWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "transcript lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber and return the run transcript
///
/// When a subscriber is already installed (as in tests) the transcript is
/// still returned but stays empty.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Transcript {
    let transcript = Transcript::new();

    let mut file_error = None;
    let file_layer = log_file.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        ),
        Err(e) => {
            file_error = Some((path.to_path_buf(), e));
            None
        }
    });

    let installed = tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .without_time()
                .with_writer(transcript.clone()),
        )
        .try_init();

    if installed.is_ok() {
        if let Some((path, e)) = file_error {
            tracing::warn!("Cannot write log file {}: {}", path.display(), e);
        }
    }

    transcript
}
