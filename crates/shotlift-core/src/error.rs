//! Transfer error type shared by every backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised transfer error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferError {
    pub kind: TransferErrorKind,
    pub message: String,
    /// FTP reply code that triggered the error, if any.
    pub code: Option<u16>,
    /// Host the failing session was talking to.
    pub host: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransferErrorKind {
    /// TCP / DNS / handshake failure.
    ConnectionFailed,
    /// Credentials rejected while establishing the session.
    AuthFailed,
    /// Server returned a 4xx/5xx for a command.
    CommandRejected,
    /// Data channel could not be established (PASV/EPSV failed).
    DataChannelFailed,
    /// Transfer aborted or incomplete.
    TransferFailed,
    /// The remote parent directory of the target does not exist.
    DirectoryMissing,
    /// File/directory not found on the server.
    NotFound,
    /// Permission denied on the server.
    PermissionDenied,
    /// Server sent an un-parseable response.
    ProtocolError,
    /// An I/O error on the local side.
    IoError,
    /// Operation timed out.
    Timeout,
    /// Operation not valid for the item's current state.
    InvalidOperation,
    /// Config / parameter validation error.
    InvalidConfig,
    /// External transfer tool is not installed.
    ToolNotFound,
    /// Upload abandoned by the duplicate resolver.
    Aborted,
    /// Catch-all.
    Unknown,
}

pub type TransferResult<T> = Result<T, TransferError>;

// ── Construction helpers ─────────────────────────────────────────────

impl TransferError {
    pub fn new(kind: TransferErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
            host: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn connection_failed(host: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::ConnectionFailed, msg).with_host(host)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::AuthFailed, msg)
    }

    pub fn command_rejected(code: u16, msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::CommandRejected, msg).with_code(code)
    }

    pub fn data_channel(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::DataChannelFailed, msg)
    }

    pub fn transfer_failed(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::TransferFailed, msg)
    }

    pub fn directory_missing(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::DirectoryMissing, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::NotFound, msg)
    }

    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::ProtocolError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::IoError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::Timeout, msg)
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::InvalidOperation, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::InvalidConfig, msg)
    }

    pub fn tool_not_found(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::ToolNotFound, msg)
    }

    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::Aborted, msg)
    }

    /// Classify an FTP reply code into the most appropriate error kind.
    ///
    /// 550/553 on a store usually means the parent directory is missing;
    /// callers that know better can re-tag the kind.
    pub fn from_ftp_reply(code: u16, text: &str) -> Self {
        let lower = text.to_lowercase();
        let kind = match code {
            421 => TransferErrorKind::ConnectionFailed,
            425 | 426 => TransferErrorKind::DataChannelFailed,
            430 | 530 => TransferErrorKind::AuthFailed,
            450 | 550 | 553 => {
                if lower.contains("permission") || lower.contains("denied") {
                    TransferErrorKind::PermissionDenied
                } else if lower.contains("directory")
                    || lower.contains("not found")
                    || lower.contains("no such")
                {
                    TransferErrorKind::DirectoryMissing
                } else {
                    TransferErrorKind::NotFound
                }
            }
            451 | 452 | 552 => TransferErrorKind::TransferFailed,
            500..=504 => TransferErrorKind::CommandRejected,
            _ if code >= 400 => TransferErrorKind::CommandRejected,
            _ => TransferErrorKind::Unknown,
        };
        Self {
            kind,
            message: text.to_string(),
            code: Some(code),
            host: None,
        }
    }

    // ── Classification ───────────────────────────────────────────

    /// Whether the session could not be established at all.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self.kind,
            TransferErrorKind::ConnectionFailed
                | TransferErrorKind::AuthFailed
                | TransferErrorKind::Timeout
        )
    }

    /// Whether a store could succeed after creating the parent directory.
    pub fn is_directory_missing(&self) -> bool {
        matches!(
            self.kind,
            TransferErrorKind::DirectoryMissing | TransferErrorKind::NotFound
        )
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, &self.host) {
            (Some(code), Some(host)) => {
                write!(f, "[{:?} {} @ {}] {}", self.kind, code, host, self.message)
            }
            (Some(code), None) => write!(f, "[{:?} {}] {}", self.kind, code, self.message),
            (None, Some(host)) => write!(f, "[{:?} @ {}] {}", self.kind, host, self.message),
            (None, None) => write!(f, "[{:?}] {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for TransferError {}

impl From<std::io::Error> for TransferError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(format!("I/O timeout: {}", e))
        } else {
            Self::io_error(e.to_string())
        }
    }
}

impl From<TransferError> for String {
    fn from(e: TransferError) -> String {
        e.message
    }
}
