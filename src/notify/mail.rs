//! Mail delivery through a sendmail-compatible command
//!
//! The message is assembled here as MIME text and piped to the configured
//! command (`msmtp` by default), which owns the SMTP conversation. The SMTP
//! password never appears on the command line: it is handed to the child in
//! `ARCSYNC_SMTP_PASSWORD` and read back with `--passwordeval`.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Local;
use uuid::Uuid;

use super::Notifier;
use crate::config::{reveal_secret, EmailSettings};
use crate::crypto::SecureString;
use crate::error::{ArcsyncError, ArcsyncResult};

/// Environment variable the mail command reads the SMTP password from
pub const PASSWORD_ENV: &str = "ARCSYNC_SMTP_PASSWORD";

/// Base64 line length for attachments
const LINE_WIDTH: usize = 76;

pub struct MailNotifier {
    settings: EmailSettings,
    password: Option<SecureString>,
}

impl MailNotifier {
    pub fn new(settings: EmailSettings) -> Self {
        let password = reveal_secret(settings.password.as_ref(), "email password");
        Self { settings, password }
    }

    /// Arguments for the mail command, recipient last
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--host={}", self.settings.server),
            format!("--port={}", self.settings.port),
            format!("--tls={}", if self.settings.use_tls { "on" } else { "off" }),
        ];

        if !self.settings.user.is_empty() {
            args.push("--auth=on".into());
            args.push(format!("--user={}", self.settings.user));
            args.push(format!("--from={}", self.settings.user));
        }
        if self.password.is_some() {
            args.push(format!("--passwordeval=printenv {}", PASSWORD_ENV));
        }

        args.push("--".into());
        args.push(self.settings.recipient.clone());
        args
    }

    /// Render the full MIME message
    pub fn build_message(&self, subject: &str, body: &str, attachment: Option<&Path>) -> ArcsyncResult<String> {
        let mut message = String::new();
        message.push_str(&format!("From: {}\r\n", self.settings.user));
        message.push_str(&format!("To: {}\r\n", self.settings.recipient));
        message.push_str(&format!("Subject: {}\r\n", subject));
        message.push_str(&format!("Date: {}\r\n", Local::now().to_rfc2822()));
        message.push_str("MIME-Version: 1.0\r\n");

        let attachment = match attachment {
            Some(path) => Some(read_attachment(path)?),
            None => None,
        };

        let Some((file_name, content)) = attachment else {
            message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
            message.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
            message.push_str(&crlf(body));
            return Ok(message);
        };

        let boundary = format!("arcsync-{}", Uuid::new_v4().simple());
        message.push_str(&format!(
            "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n",
            boundary
        ));

        message.push_str(&format!("--{}\r\n", boundary));
        message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        message.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
        message.push_str(&crlf(body));
        message.push_str("\r\n");

        message.push_str(&format!("--{}\r\n", boundary));
        message.push_str(&format!(
            "Content-Type: text/plain; charset=utf-8; name=\"{}\"\r\n",
            file_name
        ));
        message.push_str("Content-Transfer-Encoding: base64\r\n");
        message.push_str(&format!(
            "Content-Disposition: attachment; filename=\"{}\"\r\n\r\n",
            file_name
        ));
        let encoded = STANDARD.encode(content);
        for line in encoded.as_bytes().chunks(LINE_WIDTH) {
            message.push_str(&String::from_utf8_lossy(line));
            message.push_str("\r\n");
        }
        message.push_str(&format!("--{}--\r\n", boundary));

        Ok(message)
    }
}

impl Notifier for MailNotifier {
    fn send(&self, subject: &str, body: &str, attachment: Option<&Path>) -> ArcsyncResult<()> {
        let message = self.build_message(subject, body, attachment)?;

        let mut command = Command::new(&self.settings.command);
        command
            .args(self.build_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(password) = &self.password {
            command.env(PASSWORD_ENV, password.as_str());
        }

        let mut child = command.spawn().map_err(|e| {
            ArcsyncError::Notification(format!(
                "Failed to start mail command {}: {}",
                self.settings.command, e
            ))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.as_bytes()).map_err(|e| {
                ArcsyncError::Notification(format!("Failed to write message: {}", e))
            })?;
        }

        let output = child.wait_with_output().map_err(|e| {
            ArcsyncError::Notification(format!("Mail command did not finish: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArcsyncError::Notification(format!(
                "Mail command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        tracing::info!(recipient = %self.settings.recipient, "Notification sent: {}", subject);
        Ok(())
    }
}

fn read_attachment(path: &Path) -> ArcsyncResult<(String, Vec<u8>)> {
    let content = fs::read(path).map_err(|e| {
        ArcsyncError::Notification(format!("Failed to read attachment {}: {}", path.display(), e))
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    Ok((file_name, content))
}

fn crlf(text: &str) -> String {
    let mut out: String = text.lines().collect::<Vec<_>>().join("\r\n");
    out.push_str("\r\n");
    out
}
