use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::TransferError;

// ─── Protocol ────────────────────────────────────────────────────────

/// Which backend the orchestrator builds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Ftp,
    Sftp,
    /// OpenSSH `scp`/`ssh` tools driven as subprocesses.
    Scp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ftp => write!(f, "FTP"),
            Protocol::Sftp => write!(f, "SFTP"),
            Protocol::Scp => write!(f, "SCP"),
        }
    }
}

// ─── Connection parameters ───────────────────────────────────────────

/// Immutable connection parameters captured when a backend is built.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    host: String,
    port: u16,
    username: String,
    password: Option<String>,
    private_key_path: Option<PathBuf>,
    host_key_fingerprint: Option<String>,
    timeout_ms: u32,
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: None,
            private_key_path: None,
            host_key_fingerprint: None,
            timeout_ms: 30_000,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    pub fn with_host_key_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.host_key_fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn private_key_path(&self) -> Option<&std::path::Path> {
        self.private_key_path.as_deref()
    }

    pub fn host_key_fingerprint(&self) -> Option<&str> {
        self.host_key_fingerprint.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    /// `host:port`, bracketing bare IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

// Passwords never reach logs through `{:?}`.
impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("private_key_path", &self.private_key_path)
            .field("host_key_fingerprint", &self.host_key_fingerprint)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

// ─── Outcome ─────────────────────────────────────────────────────────

/// Result of an upload that reached the transport.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Success { remote_path: String },
    Failure { cause: TransferError },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success { .. })
    }

    pub fn remote_path(&self) -> Option<&str> {
        match self {
            UploadOutcome::Success { remote_path } => Some(remote_path),
            UploadOutcome::Failure { .. } => None,
        }
    }
}
