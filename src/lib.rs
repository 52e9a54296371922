//! # shotlift
//!
//! Screenshot upload engine. Captures and files are handed to an
//! [`UploadManager`], which builds one backend (FTP, SFTP or SCP) from the
//! current [`Settings`] and runs every upload and undo on its own task.
//!
//! Member crates:
//! - `shotlift-core`: contract, data model, paths, settings, logging
//! - `shotlift-ftp`: FTP backend
//! - `shotlift-sftp`: SFTP backend (libssh2)
//! - `shotlift-scp`: SCP backend (OpenSSH tools)
//! - `shotlift-manager`: orchestration, history, failure reporting

pub mod console;

pub use shotlift_core::{
    paths, Artifact, BackendOptions, BackendShared, CaptureSource, ConnectionInfo, DuplicateDecision,
    DuplicateRequest, DuplicateResolver, FileArtifact, MemoryArtifact, Protocol, Settings, SettingsError,
    TransferBackend, TransferError, TransferErrorKind, TransferEvent, TransferEvents, TransferItem, TransferResult,
    UploadOutcome,
};
pub use shotlift_ftp::FtpBackend;
pub use shotlift_manager::{
    BackendFactory, DefaultBackendFactory, HistoryStack, LogSink, NotificationSink, UploadManager, UploadTicket,
    IMAGE_EXTENSIONS,
};
pub use shotlift_scp::ScpBackend;
pub use shotlift_sftp::SftpBackend;
